//! BIP-39 mnemonic phrases over the English wordlist

use std::fmt;
use std::sync::OnceLock;

use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CoreError, Result};

const WORDLIST: &str = include_str!("bip39/english.txt");

/// Number of words in the list.
pub const NUM_WORDS: u16 = 2048;

/// Shortest and longest word labels.
pub const SHORTEST_WORD: usize = 3;
pub const LONGEST_WORD: usize = 8;

const WORD_BITS: usize = 11;
const SEED_ROUNDS: u32 = 2048;

fn wordlist() -> &'static [&'static str] {
    static WORDS: OnceLock<Vec<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| WORDLIST.lines().collect())
}

/// Index of a word in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Zeroize)]
pub struct Word(u16);

impl Word {
    pub fn new(index: u16) -> Option<Word> {
        (index < NUM_WORDS).then_some(Word(index))
    }

    pub fn index(self) -> u16 {
        self.0
    }

    pub fn label(self) -> &'static str {
        wordlist()[self.0 as usize]
    }

    /// Map five dice rolls (1-6) to a word. The last die acts as a coin
    /// toss selecting the sub-column. Returns `None` for rolls outside
    /// the table.
    pub fn from_dice(roll: [u8; 5]) -> Option<Word> {
        const ROWS_PER_SUBCOLUMN: usize = 5 * 16;
        const ROWS_PER_PAGE: usize = 13 * 16;

        let mut digits = [0usize; 5];
        for (i, &d) in roll.iter().enumerate() {
            if !(1..=6).contains(&d) {
                return None;
            }
            let d = usize::from(d - 1);
            digits[i] = if i == roll.len() - 1 { usize::from(d >= 3) } else { d };
        }
        let page = digits[0];
        let subcol = digits[4];
        let row = digits[1] * 36 + digits[2] * 6 + digits[3];
        if row >= ROWS_PER_PAGE {
            return None;
        }
        let column = row / ROWS_PER_SUBCOLUMN;
        let subrows = (ROWS_PER_PAGE - column * ROWS_PER_SUBCOLUMN).min(ROWS_PER_SUBCOLUMN);
        let word = column * 2 * ROWS_PER_SUBCOLUMN
            + row % ROWS_PER_SUBCOLUMN
            + subrows * subcol
            + page * 2 * ROWS_PER_PAGE;
        u16::try_from(word).ok().and_then(Word::new)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The first word that sorts at or after `prefix`, and whether it
/// starts with `prefix`.
pub fn closest_word(prefix: &str) -> Option<(Word, bool)> {
    let words = wordlist();
    let i = words.partition_point(|w| *w < prefix);
    let w = words.get(i)?;
    Some((Word(i as u16), w.starts_with(prefix)))
}

/// A mnemonic phrase. Construction through [`Mnemonic::new`] or the
/// parse functions guarantees a valid checksum.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
pub struct Mnemonic(Vec<Word>);

impl Mnemonic {
    /// Encode entropy of 16 to 32 bytes, a multiple of 4.
    pub fn new(entropy: &[u8]) -> Result<Self> {
        if !(16..=32).contains(&entropy.len()) || entropy.len() % 4 != 0 {
            return Err(CoreError::Mnemonic(format!(
                "invalid entropy length {}",
                entropy.len()
            )));
        }
        let check_bits = entropy.len() / 4;
        let mut bits = BitWriter::default();
        for &b in entropy {
            bits.push(u32::from(b), 8);
        }
        bits.push(u32::from(checksum(entropy)), check_bits);
        let words = bits.chunks(WORD_BITS).map(|w| Word(w as u16)).collect();
        Ok(Self(words))
    }

    /// Wrap words without checking the checksum. Use [`Mnemonic::valid`]
    /// or [`Mnemonic::fix_checksum`] afterwards.
    pub fn from_words(words: Vec<Word>) -> Self {
        Self(words)
    }

    /// Parse words separated by single spaces, each an exact list entry.
    pub fn parse(phrase: &str) -> Result<Self> {
        let mut words = Vec::new();
        for w in phrase.split(' ') {
            match closest_word(w) {
                Some((word, _)) if word.label() == w => words.push(word),
                _ => return Err(CoreError::Mnemonic(format!("unknown word {w:?}"))),
            }
        }
        Self::checked(words)
    }

    /// Parse words abbreviated to unique prefixes of at least 3 letters.
    pub fn parse_prefix(phrase: &str) -> Result<Self> {
        let mut words = Vec::new();
        for w in phrase.split(' ') {
            if words.len() == 24 {
                return Err(CoreError::Mnemonic("mnemonic too long".into()));
            }
            match closest_word(w) {
                Some((word, true)) if w.len() >= SHORTEST_WORD => words.push(word),
                _ => return Err(CoreError::Mnemonic(format!("unknown word {w:?}"))),
            }
        }
        Self::checked(words)
    }

    fn checked(words: Vec<Word>) -> Result<Self> {
        let m = Self(words);
        if !m.valid() {
            return Err(CoreError::Mnemonic("invalid checksum".into()));
        }
        Ok(m)
    }

    pub fn words(&self) -> &[Word] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reports whether the last word carries the correct checksum.
    pub fn valid(&self) -> bool {
        if self.0.is_empty() || self.0.len() % 3 != 0 || self.0.len() > 24 {
            return false;
        }
        let (entropy, _) = self.split();
        self.0.last() == Some(&checksum_word(&entropy))
    }

    /// Copy with the last word replaced by the correct checksum word.
    pub fn fix_checksum(&self) -> Self {
        let mut m = self.clone();
        if m.0.len() % 3 == 0 && !m.0.is_empty() {
            let (entropy, _) = m.split();
            if let Some(last) = m.0.last_mut() {
                *last = checksum_word(&entropy);
            }
        }
        m
    }

    /// The encoded entropy, or `None` for an invalid mnemonic.
    pub fn entropy(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.valid().then(|| self.split().0)
    }

    /// BIP-39 seed: PBKDF2-HMAC-SHA512 over the phrase.
    pub fn seed(&self, password: &str) -> Zeroizing<[u8; 64]> {
        let phrase = Zeroizing::new(self.to_string());
        let salt = Zeroizing::new(format!("mnemonic{password}"));
        let mut seed = Zeroizing::new([0u8; 64]);
        pbkdf2::pbkdf2_hmac::<Sha512>(phrase.as_bytes(), salt.as_bytes(), SEED_ROUNDS, &mut seed[..]);
        seed
    }

    /// Separate entropy bits from checksum bits.
    fn split(&self) -> (Zeroizing<Vec<u8>>, u8) {
        let check_bits = self.0.len() / 3;
        let ent_bits = self.0.len() * WORD_BITS - check_bits;
        let mut bits = BitWriter::default();
        for w in &self.0 {
            bits.push(u32::from(w.0), WORD_BITS);
        }
        let mut entropy = Zeroizing::new(Vec::with_capacity(ent_bits / 8));
        let mut chunks = bits.chunks(8);
        for _ in 0..ent_bits / 8 {
            entropy.push(chunks.next().unwrap_or(0) as u8);
        }
        let check = bits.tail(check_bits) as u8;
        (entropy, check)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, w) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(w.label())?;
        }
        Ok(())
    }
}

/// The first `len/4` bits of SHA-256(entropy).
pub fn checksum(entropy: &[u8]) -> u8 {
    let check_bits = (entropy.len() / 4).min(8);
    let h = Sha256::digest(entropy);
    if check_bits == 0 {
        return 0;
    }
    h[0] >> (8 - check_bits)
}

/// The final word for `entropy`: its trailing bits followed by the checksum.
pub fn checksum_word(entropy: &[u8]) -> Word {
    let check_bits = entropy.len() / 4;
    let last = u32::from(entropy.last().copied().unwrap_or(0));
    let w = (last << check_bits) | u32::from(checksum(entropy));
    Word((w % u32::from(NUM_WORDS)) as u16)
}

/// Big-endian bit accumulator.
#[derive(Default)]
struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    fn push(&mut self, value: u32, n: usize) {
        for i in (0..n).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
    }

    fn chunks(&self, n: usize) -> impl Iterator<Item = u32> + '_ {
        self.bits
            .chunks_exact(n)
            .map(|c| c.iter().fold(0u32, |acc, &b| acc << 1 | u32::from(b)))
    }

    fn tail(&self, n: usize) -> u32 {
        let start = self.bits.len().saturating_sub(n);
        self.bits[start..]
            .iter()
            .fold(0u32, |acc, &b| acc << 1 | u32::from(b))
    }
}

impl Drop for BitWriter {
    fn drop(&mut self) {
        self.bits.zeroize();
    }
}
