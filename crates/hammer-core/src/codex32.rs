//! Codex32 (BIP-93) share strings
//!
//! A codex32 string is laid out as:
//!
//! | Field       | Length  | Notes                                  |
//! |-------------|---------|----------------------------------------|
//! | hrp         | any     | human-readable prefix, usually `ms`    |
//! | separator   | 1       | the character `1`                      |
//! | threshold   | 1       | `0` or `2`..`9`                        |
//! | id          | 4       | bech32 characters                      |
//! | share index | 1       | `s` for the unshared secret            |
//! | payload     | 26-103  | secret data, 5 bits per character      |
//! | checksum    | 13 / 15 | BCH residue, long form above 93 chars  |

use std::fmt;
use std::str::FromStr;

use crate::error::Codex32Error;
use crate::gf32::Fe;

pub type Result<T> = std::result::Result<T, Codex32Error>;

const SHORT_MIN_LEN: usize = 48;
const SHORT_MAX_LEN: usize = 93;
const LONG_MIN_LEN: usize = 125;
const LONG_MAX_LEN: usize = 127;
const SHORT_CHECKSUM_LEN: usize = 13;
const LONG_CHECKSUM_LEN: usize = 15;

/// Number of characters between the separator and the payload.
const HEADER_LEN: usize = 6;

#[rustfmt::skip]
const SHORT_GENERATOR: [Fe; SHORT_CHECKSUM_LEN] = [
    Fe::E, Fe::M, Fe::_3, Fe::G, Fe::Q, Fe::E,
    Fe::E, Fe::E, Fe::L, Fe::M, Fe::C, Fe::S,
    Fe::S,
];
#[rustfmt::skip]
const SHORT_INITIAL: [Fe; SHORT_CHECKSUM_LEN] = [
    Fe::Q, Fe::Q, Fe::Q, Fe::Q, Fe::Q, Fe::Q,
    Fe::Q, Fe::Q, Fe::Q, Fe::Q, Fe::Q, Fe::Q,
    Fe::P,
];
#[rustfmt::skip]
const SHORT_TARGET: [Fe; SHORT_CHECKSUM_LEN] = [
    Fe::S, Fe::E, Fe::C, Fe::R, Fe::E, Fe::T,
    Fe::S, Fe::H, Fe::A, Fe::R, Fe::E, Fe::_3,
    Fe::_2,
];

#[rustfmt::skip]
const LONG_GENERATOR: [Fe; LONG_CHECKSUM_LEN] = [
    Fe::_0, Fe::_2, Fe::E, Fe::_6, Fe::F, Fe::E,
    Fe::_4, Fe::X, Fe::H, Fe::_4, Fe::X, Fe::_9,
    Fe::K, Fe::Y, Fe::H,
];
#[rustfmt::skip]
const LONG_INITIAL: [Fe; LONG_CHECKSUM_LEN] = [
    Fe::Q, Fe::Q, Fe::Q, Fe::Q, Fe::Q, Fe::Q,
    Fe::Q, Fe::Q, Fe::Q, Fe::Q, Fe::Q, Fe::Q,
    Fe::Q, Fe::Q, Fe::P,
];
#[rustfmt::skip]
const LONG_TARGET: [Fe; LONG_CHECKSUM_LEN] = [
    Fe::S, Fe::E, Fe::C, Fe::R, Fe::E, Fe::T,
    Fe::S, Fe::H, Fe::A, Fe::R, Fe::E, Fe::_3,
    Fe::_2, Fe::E, Fe::X,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    None,
    Lower,
    Upper,
}

/// BCH checksum engine. Consumes one element at a time and keeps the
/// residue of the input polynomial modulo the generator.
#[derive(Debug, Clone)]
pub struct Engine {
    case: Case,
    generator: &'static [Fe],
    residue: Vec<Fe>,
    target: &'static [Fe],
}

impl Engine {
    /// Engine for strings of at most 93 characters.
    pub fn short() -> Self {
        Self {
            case: Case::None,
            generator: &SHORT_GENERATOR,
            residue: SHORT_INITIAL.to_vec(),
            target: &SHORT_TARGET,
        }
    }

    /// Engine for strings of 125 to 127 characters.
    pub fn long() -> Self {
        Self {
            case: Case::None,
            generator: &LONG_GENERATOR,
            residue: LONG_INITIAL.to_vec(),
            target: &LONG_TARGET,
        }
    }

    pub fn residue(&self) -> &[Fe] {
        &self.residue
    }

    pub fn is_valid(&self) -> bool {
        self.residue == self.target
    }

    /// Feed the human-readable prefix: high bits of every character, a
    /// `q` separator, then the low bits of every character.
    pub fn input_hrp(&mut self, hrp: &str) -> Result<()> {
        for c in hrp.chars() {
            self.set_case(c)?;
            let b = c.to_ascii_lowercase() as u8;
            self.input_fe(Fe::from_low_bits(b >> 5));
        }
        self.input_fe(Fe::Q);
        for c in hrp.chars() {
            let b = c.to_ascii_lowercase() as u8;
            self.input_fe(Fe::from_low_bits(b & 0x1f));
        }
        Ok(())
    }

    pub fn input_char(&mut self, c: char) -> Result<()> {
        self.set_case(c)?;
        let e = Fe::from_char(c).ok_or(Codex32Error::InvalidCharacter(c))?;
        self.input_fe(e);
        Ok(())
    }

    pub fn input_data(&mut self, data: &str) -> Result<()> {
        data.chars().try_for_each(|c| self.input_char(c))
    }

    /// Feed the target residue. The resulting residue is the checksum
    /// that makes the input valid.
    pub fn input_target(&mut self) {
        for &e in self.target {
            self.input_fe(e);
        }
    }

    pub fn input_fe(&mut self, e: Fe) {
        let n = self.residue.len();
        let shifted = self.residue[0];
        self.residue.copy_within(1.., 0);
        self.residue[n - 1] = e;
        for (r, &g) in self.residue.iter_mut().zip(self.generator) {
            *r += g * shifted;
        }
    }

    fn set_case(&mut self, c: char) -> Result<()> {
        if !c.is_ascii() {
            return Err(Codex32Error::InvalidCase);
        }
        if !c.is_ascii_alphabetic() {
            return Ok(());
        }
        let case = if c.is_ascii_lowercase() {
            Case::Lower
        } else {
            Case::Upper
        };
        match self.case {
            Case::None => {
                self.case = case;
                Ok(())
            }
            current if current == case => Ok(()),
            _ => Err(Codex32Error::InvalidCase),
        }
    }
}

/// A codex32 string with a valid checksum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Codex32 {
    s: String,
    /// Byte offset of the data part (one past the separator).
    data_start: usize,
    threshold: u8,
    share_index: Fe,
    checksum_len: usize,
}

/// A codex32 string broken into its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parts<'a> {
    pub hrp: &'a str,
    pub threshold: u8,
    pub id: &'a str,
    pub share_index: Fe,
    pub payload: &'a str,
    pub checksum: &'a str,
}

impl Codex32 {
    /// Parse and validate a codex32 string.
    pub fn parse(s: &str) -> Result<Self> {
        let mut engine = match s.len() {
            SHORT_MIN_LEN..=SHORT_MAX_LEN => Engine::short(),
            LONG_MIN_LEN..=LONG_MAX_LEN => Engine::long(),
            n => return Err(Codex32Error::InvalidLength(n)),
        };
        let (hrp, data) = split_hrp(s);
        engine.input_hrp(hrp)?;
        engine.input_data(data)?;
        if !engine.is_valid() {
            return Err(Codex32Error::InvalidChecksum);
        }
        Self::from_checked(s.to_string())
    }

    /// Build the string for the secret `data`. The threshold and share
    /// index characters follow the case of `hrp`.
    pub fn new_seed(
        hrp: &str,
        threshold: u8,
        id: &str,
        share_index: char,
        data: &[u8],
    ) -> Result<Self> {
        let id_len = id.chars().count();
        if id_len != 4 {
            return Err(Codex32Error::InvalidIdLength(id_len));
        }
        let index = Fe::from_char(share_index).ok_or(Codex32Error::InvalidShareIndex(share_index))?;
        let threshold_char = threshold_char(threshold)?;
        let upper = hrp.chars().any(|c| c.is_ascii_uppercase());
        let recase = |c: char| if upper { c.to_ascii_uppercase() } else { c };

        let mut s = String::with_capacity(hrp.len() + 1 + HEADER_LEN + data.len() * 2 + LONG_CHECKSUM_LEN);
        s.push_str(hrp);
        s.push('1');
        s.push(recase(threshold_char));
        s.push_str(id);
        s.push(recase(index.to_char()));
        for v in convert_bits(data.iter().copied(), 8, 5, true) {
            s.push(recase(Fe::from_low_bits(v).to_char()));
        }

        let mut engine = if s.len() <= SHORT_MAX_LEN - SHORT_CHECKSUM_LEN {
            Engine::short()
        } else {
            Engine::long()
        };
        let (hrp, body) = split_hrp(&s);
        engine.input_hrp(hrp)?;
        engine.input_data(body)?;
        engine.input_target();
        let checksum: String = engine.residue().iter().map(|e| recase(e.to_char())).collect();
        s.push_str(&checksum);
        Self::parse(&s)
    }

    /// Derive the share at `target` from `shares` by Lagrange
    /// interpolation. Index `s` recovers the secret.
    pub fn interpolate(shares: &[Codex32], target: char) -> Result<Self> {
        let first = shares.first().ok_or(Codex32Error::InsufficientShares)?;
        let target = Fe::from_char(target).ok_or(Codex32Error::InvalidShareIndex(target))?;
        let p0 = first.parts();
        for share in shares {
            let p = share.parts();
            if share.s.len() != first.s.len() {
                return Err(Codex32Error::MismatchedLength);
            }
            if p.hrp != p0.hrp {
                return Err(Codex32Error::MismatchedHrp);
            }
            if p.threshold != p0.threshold {
                return Err(Codex32Error::MismatchedThreshold);
            }
            if p.id != p0.id {
                return Err(Codex32Error::MismatchedId);
            }
        }

        let mut mult = Fe::P;
        for share in shares {
            if share.share_index == target {
                return Ok(share.clone());
            }
            mult *= share.share_index + target;
        }
        if usize::from(p0.threshold) > shares.len() {
            return Err(Codex32Error::InsufficientShares);
        }

        let elements: Vec<Vec<Fe>> = shares.iter().map(Codex32::data_elements).collect();
        let mut result = vec![Fe::Q; elements[0].len()];
        for (i, si) in shares.iter().enumerate() {
            let mut inv = Fe::P;
            for (j, sj) in shares.iter().enumerate() {
                let m = if i == j {
                    target
                } else {
                    if si.share_index == sj.share_index {
                        return Err(Codex32Error::RepeatedIndex(si.share_index.to_char()));
                    }
                    si.share_index
                };
                inv *= sj.share_index + m;
            }
            let coeff = mult / inv;
            for (r, &e) in result.iter_mut().zip(&elements[i]) {
                *r += coeff * e;
            }
        }

        let upper = p0.hrp.chars().any(|c| c.is_ascii_uppercase());
        let mut s = String::with_capacity(first.s.len());
        s.push_str(p0.hrp);
        s.push('1');
        for e in result {
            let c = e.to_char();
            s.push(if upper { c.to_ascii_uppercase() } else { c });
        }
        Self::parse(&s)
    }

    /// The secret bytes. Trailing bits that do not fill a byte are dropped.
    pub fn seed(&self) -> Vec<u8> {
        let payload = self.parts().payload;
        let values = payload
            .chars()
            .filter_map(Fe::from_char)
            .map(Fe::to_u8);
        convert_bits(values, 5, 8, false)
    }

    /// Identifier, threshold (1 for unshared secrets) and share index.
    pub fn split(&self) -> (&str, u8, char) {
        let p = self.parts();
        let threshold = if p.threshold == 0 { 1 } else { p.threshold };
        (p.id, threshold, p.share_index.to_char())
    }

    pub fn parts(&self) -> Parts<'_> {
        let data = &self.s[self.data_start..];
        let payload_end = data.len() - self.checksum_len;
        Parts {
            hrp: &self.s[..self.data_start - 1],
            threshold: self.threshold,
            id: &data[1..5],
            share_index: self.share_index,
            payload: &data[HEADER_LEN..payload_end],
            checksum: &data[payload_end..],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.s
    }

    /// Data part of the string, including the checksum, as elements.
    fn data_elements(&self) -> Vec<Fe> {
        self.s[self.data_start..]
            .chars()
            .filter_map(Fe::from_char)
            .collect()
    }

    /// Split a checksummed string into fields and apply the sanity checks.
    fn from_checked(s: String) -> Result<Self> {
        let (hrp, data) = split_hrp(&s);
        let data_start = s.len() - data.len();
        let checksum_len = if s.len() <= SHORT_MAX_LEN {
            SHORT_CHECKSUM_LEN
        } else {
            LONG_CHECKSUM_LEN
        };
        if data.len() < HEADER_LEN + checksum_len || hrp.len() + 1 != data_start {
            return Err(Codex32Error::InvalidLength(s.len()));
        }
        let mut chars = data.chars();
        let t = chars.next().unwrap_or('1');
        let threshold = match t.to_digit(10) {
            Some(d) if d != 1 => d as u8,
            _ => return Err(Codex32Error::InvalidThreshold(t)),
        };
        let idx_char = data[5..].chars().next().unwrap_or('1');
        let share_index = Fe::from_char(idx_char).ok_or(Codex32Error::InvalidCharacter(idx_char))?;
        if threshold == 0 && share_index != Fe::S {
            return Err(Codex32Error::InvalidShareIndex(idx_char));
        }
        let payload_len = data.len() - HEADER_LEN - checksum_len;
        let incomplete = (payload_len * 5) % 8;
        if incomplete > 4 {
            return Err(Codex32Error::IncompleteGroup(incomplete));
        }
        Ok(Self {
            s,
            data_start,
            threshold,
            share_index,
            checksum_len,
        })
    }
}

impl fmt::Display for Codex32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.s)
    }
}

impl FromStr for Codex32 {
    type Err = Codex32Error;

    fn from_str(s: &str) -> Result<Self> {
        Codex32::parse(s)
    }
}

fn threshold_char(threshold: u8) -> Result<char> {
    match threshold {
        0 | 2..=9 => Ok(char::from(b'0' + threshold)),
        t => Err(Codex32Error::InvalidThreshold(
            char::from_digit(u32::from(t), 36).unwrap_or('?'),
        )),
    }
}

/// Split at the last separator. Strings without one have an empty prefix.
fn split_hrp(s: &str) -> (&str, &str) {
    match s.rfind('1') {
        Some(i) => (&s[..i], &s[i + 1..]),
        None => ("", s),
    }
}

/// Regroup `from`-bit values into `to`-bit values. With `pad`, a final
/// partial group is right-padded with zeros; otherwise it is dropped.
pub(crate) fn convert_bits(values: impl Iterator<Item = u8>, from: u32, to: u32, pad: bool) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mask = (1u32 << to) - 1;
    let mut out = Vec::new();
    for v in values {
        acc = (acc << from) | u32::from(v);
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & mask) as u8);
        }
        acc &= (1 << bits) - 1;
    }
    if pad && bits > 0 {
        out.push(((acc << (to - bits)) & mask) as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(s: &str) -> Codex32 {
        Codex32::parse(s).unwrap_or_else(|e| panic!("{s}: {e}"))
    }

    #[test]
    fn bip93_vector_1() {
        let c = share("ms10testsxxxxxxxxxxxxxxxxxxxxxxxxxx4nzvca9cmczlw");
        assert_eq!(
            c.parts(),
            Parts {
                hrp: "ms",
                threshold: 0,
                id: "test",
                share_index: Fe::S,
                payload: "xxxxxxxxxxxxxxxxxxxxxxxxxx",
                checksum: "4nzvca9cmczlw",
            }
        );
        assert_eq!(hex::encode(c.seed()), "318c6318c6318c6318c6318c6318c631");
        assert_eq!(c.split(), ("test", 1, 's'));
    }

    #[test]
    fn bip93_vector_2() {
        let shares = [
            share("MS12NAMEA320ZYXWVUTSRQPNMLKJHGFEDCAXRPP870HKKQRM"),
            share("MS12NAMECACDEFGHJKLMNPQRSTUVWXYZ023FTR2GDZMPY6PN"),
        ];
        let d = Codex32::interpolate(&shares, 'D').unwrap();
        assert_eq!(d.as_str(), "MS12NAMEDLL4F8JLH4E5VDVULDLFXU2JHDNLSM97XVENRXEG");
        let s = Codex32::interpolate(&shares, 'S').unwrap();
        assert_eq!(s.as_str(), "MS12NAMES6XQGUZTTXKEQNJSJZV4JV3NZ5K3KWGSPHUH6EVW");
        assert_eq!(hex::encode(s.seed()), "d1808e096b35b209ca12132b264662a5");
    }

    #[test]
    fn bip93_vector_3() {
        let shares = [
            share("ms13cashsllhdmn9m42vcsamx24zrxgs3qqjzqud4m0d6nln"),
            share("ms13casha320zyxwvutsrqpnmlkjhgfedca2a8d0zehn8a0t"),
            share("ms13cashcacdefghjklmnpqrstuvwxyz023949xq35my48dr"),
        ];
        let cases = [
            ('d', "ms13cashd0wsedstcdcts64cd7wvy4m90lm28w4ffupqs7rm"),
            ('e', "ms13casheekgpemxzshcrmqhaydlp6yhms3ws7320xyxsar9"),
            ('f', "ms13cashf8jh6sdrkpyrsp5ut94pj8ktehhw2hfvyrj48704"),
        ];
        for (idx, want) in cases {
            let got = Codex32::interpolate(&shares, idx).unwrap();
            assert_eq!(got.as_str(), want, "share {idx}");
        }
        // Asking for an input share returns it unchanged.
        let a = Codex32::interpolate(&shares, 'a').unwrap();
        assert_eq!(a, shares[1]);
    }

    #[test]
    fn bip93_vector_4() {
        let data = hex::decode("ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100").unwrap();
        let seed = Codex32::new_seed("ms", 0, "leet", 's', &data).unwrap();
        assert_eq!(
            seed.as_str(),
            "ms10leetsllhdmn9m42vcsamx24zrxgs3qrl7ahwvhw4fnzrhve25gvezzyqqtum9pgv99ycma"
        );
        assert_eq!(seed.seed(), data);

        // Any choice of padding bits decodes to the same secret.
        for alt in [
            "ms10leetsllhdmn9m42vcsamx24zrxgs3qrl7ahwvhw4fnzrhve25gvezzyqpj82dp34u6lqtd",
            "ms10leetsllhdmn9m42vcsamx24zrxgs3qrl7ahwvhw4fnzrhve25gvezzyqzsrs4pnh7jmpj5",
            "ms10leetsllhdmn9m42vcsamx24zrxgs3qrl7ahwvhw4fnzrhve25gvezzyqrfcpap2w8dqezy",
            "ms10leetsllhdmn9m42vcsamx24zrxgs3qrl7ahwvhw4fnzrhve25gvezzyq0pgjxpzx0ysaam",
        ] {
            assert_eq!(share(alt).seed(), data, "{alt}");
        }
    }

    #[test]
    fn bip93_vector_5() {
        let long = share(
            "MS100C8VSM32ZXFGUHPCHTLUPZRY9X8GF2TVDW0S3JN54KHCE6MUA7LQPZYGSFJD6AN074RXVCEMLH8WU3TK925ACDEFGHJKLMNPQRSTUVWXY06FHPV80UNDVARHRAK",
        );
        assert_eq!(
            hex::encode(long.seed()),
            "dc5423251cb87175ff8110c8531d0952d8d73e1194e95b5f19d6f9df7c01111104c9baecdfea8cccc677fb9ddc8aec5553b86e528bcadfdcc201c17c638c47e9"
        );
    }

    #[test]
    fn bad_checksums() {
        for s in [
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxve740yyge2ghq",
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxve740yyge2ghp",
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxxxlk3yepcstwr",
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxx6pgnv7jnpcsp",
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxme084q0vpht7pe0",
        ] {
            assert_eq!(Codex32::parse(s), Err(Codex32Error::InvalidChecksum), "{s}");
        }
    }

    #[test]
    fn wrong_checksum_lengths() {
        for s in [
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxurfvwmdcmymdufv",
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxcsyppjkd8lz4hx3",
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxu6hwvl5p0l9xf3c",
        ] {
            assert!(
                matches!(
                    Codex32::parse(s),
                    Err(Codex32Error::InvalidChecksum | Codex32Error::InvalidLength(_))
                ),
                "{s}"
            );
        }
    }

    #[test]
    fn improper_lengths() {
        for s in [
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxw0a4c70rfefn4",
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxk4pavy5n46nea",
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxx9lrwar5zwng4w",
            "ms12fauxxxxxxxxxxxxxxxxxxxxxxxxxxzhddxw99w7xws",
            "ms12fauxxxxxxxxxxxxxxxxxxxxxxxxxxxx42cux6um92rz",
        ] {
            assert!(
                matches!(
                    Codex32::parse(s),
                    Err(Codex32Error::InvalidLength(_) | Codex32Error::IncompleteGroup(_))
                ),
                "{s}"
            );
        }
    }

    #[test]
    fn invalid_share_index() {
        assert!(matches!(
            Codex32::parse("ms10fauxxxxxxxxxxxxxxxxxxxxxxxxxxxx0z26tfn0ulw3p"),
            Err(Codex32Error::InvalidShareIndex(_))
        ));
    }

    #[test]
    fn invalid_threshold() {
        assert!(matches!(
            Codex32::parse("ms1fauxxxxxxxxxxxxxxxxxxxxxxxxxxxxxda3kr3s0s2swg"),
            Err(Codex32Error::InvalidThreshold(_))
        ));
    }

    #[test]
    fn invalid_case() {
        for s in [
            "Ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxuqxkk05lyf3x2",
            "mS10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxuqxkk05lyf3x2",
            "MS10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxuqxkk05lyf3x2",
            "ms10FAUXsxxxxxxxxxxxxxxxxxxxxxxxxxxuqxkk05lyf3x2",
            "ms10fauxSxxxxxxxxxxxxxxxxxxxxxxxxxxuqxkk05lyf3x2",
            "ms10fauxsXXXXXXXXXXXXXXXXXXXXXXXXXXuqxkk05lyf3x2",
            "ms10fauxsxxxxxxxxxxxxxxxxxxxxxxxxxxUQXKK05LYF3X2",
        ] {
            assert_eq!(Codex32::parse(s), Err(Codex32Error::InvalidCase), "{s}");
        }
    }

    #[test]
    fn new_seed_argument_checks() {
        let data = [0u8; 16];
        assert_eq!(
            Codex32::new_seed("ms", 0, "lee", 's', &data),
            Err(Codex32Error::InvalidIdLength(3))
        );
        assert_eq!(
            Codex32::new_seed("ms", 0, "leet", 'b', &data),
            Err(Codex32Error::InvalidShareIndex('b'))
        );
        assert!(matches!(
            Codex32::new_seed("ms", 1, "leet", 's', &data),
            Err(Codex32Error::InvalidThreshold(_))
        ));
        assert!(matches!(
            Codex32::new_seed("ms", 10, "leet", 's', &data),
            Err(Codex32Error::InvalidThreshold(_))
        ));
    }

    #[test]
    fn new_seed_matches_hrp_case() {
        let data = hex::decode("d1808e096b35b209ca12132b264662a5").unwrap();
        let seed = Codex32::new_seed("MS", 2, "NAME", 's', &data).unwrap();
        assert_eq!(seed.as_str(), seed.as_str().to_ascii_uppercase());
        assert!(seed.as_str().starts_with("MS12NAMES"));
        assert_eq!(seed.seed(), data);
    }

    #[test]
    fn interpolation_errors() {
        let a = share("ms13casha320zyxwvutsrqpnmlkjhgfedca2a8d0zehn8a0t");
        let c = share("ms13cashcacdefghjklmnpqrstuvwxyz023949xq35my48dr");
        let other = share("MS12NAMEA320ZYXWVUTSRQPNMLKJHGFEDCAXRPP870HKKQRM");
        assert_eq!(Codex32::interpolate(&[], 's'), Err(Codex32Error::InsufficientShares));
        assert_eq!(
            Codex32::interpolate(&[a.clone(), c.clone()], 's'),
            Err(Codex32Error::InsufficientShares)
        );
        assert_eq!(
            Codex32::interpolate(&[a.clone(), c.clone()], 'b'),
            Err(Codex32Error::InvalidShareIndex('b'))
        );
        assert_eq!(
            Codex32::interpolate(&[a.clone(), other], 's'),
            Err(Codex32Error::MismatchedHrp)
        );
        assert_eq!(
            Codex32::interpolate(&[a.clone(), c, a], 's'),
            Err(Codex32Error::RepeatedIndex('a'))
        );
    }

    #[test]
    fn engine_target_produces_valid_checksum() {
        let mut engine = Engine::short();
        engine.input_hrp("ms").unwrap();
        engine.input_data(&format!("0tests{}", "x".repeat(26))).unwrap();
        engine.input_target();
        let checksum: String = engine.residue().iter().map(|e| e.to_char()).collect();
        assert_eq!(checksum, "4nzvca9cmczlw");
    }
}
