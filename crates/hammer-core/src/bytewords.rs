//! Bytewords minimal encoding
//!
//! Each byte is written as the first and last letter of its word in the
//! 256-word list. A big-endian CRC32 of the payload is appended before
//! encoding.

use std::sync::OnceLock;

use crate::error::{CoreError, Result};

/// Two-letter abbreviations, indexed by byte value.
const ABBREV: &[u8; 512] = b"aeadaoaxaaahamatayasbkbdbnbtbabsbebybgbwbbbzcmchcscfcycwcecackctcxclcpcndkdadsdidedtdrdndwdpdmdldyeheyeoeeecenemetesftfrfnfsfmfhfzfpfwfxfyfefgflfdgagegrgsgtglgwgdgygmgughgohfhghdhkhthphhhlhyhehnhsidiaieihiyioisinimjejzjnjtjljojsjpjkjykpkoktkskkknkgkekikblblalylflslrlplnltloldlelulklgmnmymhmemomumwmdmtmsmknlnyndnsntnnnenboyoeotoxonolospdptpkpypspmplpepfpaprqdqzrerprlrorhrdrkrfryrnrsrtsesasrssskswstspsosgsbsfsntotktitttdtetytltbtstptatnuyuoutueurvtvyvovlvevwvavdvswlwdwmwpwewywswtwnwzwfwkykynylyaytzszoztzczezm";

/// Byte value for every lowercase letter pair, or `None`.
fn lookup_table() -> &'static [[Option<u8>; 26]; 26] {
    static TABLE: OnceLock<[[Option<u8>; 26]; 26]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [[None; 26]; 26];
        for (b, pair) in ABBREV.chunks(2).enumerate() {
            t[(pair[0] - b'a') as usize][(pair[1] - b'a') as usize] = Some(b as u8);
        }
        t
    })
}

pub fn encode(data: &[u8]) -> String {
    let check = crc32fast::hash(data).to_be_bytes();
    let mut out = String::with_capacity((data.len() + 4) * 2);
    for &b in data.iter().chain(check.iter()) {
        let i = b as usize * 2;
        out.push(ABBREV[i] as char);
        out.push(ABBREV[i + 1] as char);
    }
    out
}

/// Decode a minimal bytewords string in either case and verify its checksum.
pub fn decode(src: &str) -> Result<Vec<u8>> {
    let src = src.as_bytes();
    if src.len() % 2 == 1 {
        return Err(CoreError::Bytewords("truncated input".into()));
    }
    if src.len() / 2 < 4 {
        return Err(CoreError::Bytewords("input too short".into()));
    }
    let table = lookup_table();
    let mut dst = src
        .chunks(2)
        .map(|pair| {
            let l1 = pair[0].to_ascii_lowercase().wrapping_sub(b'a') as usize;
            let l2 = pair[1].to_ascii_lowercase().wrapping_sub(b'a') as usize;
            table
                .get(l1)
                .and_then(|row| row.get(l2))
                .copied()
                .flatten()
                .ok_or_else(|| CoreError::Bytewords("invalid word".into()))
        })
        .collect::<Result<Vec<u8>>>()?;
    let split = dst.len() - 4;
    let got = u32::from_be_bytes([dst[split], dst[split + 1], dst[split + 2], dst[split + 3]]);
    dst.truncate(split);
    if got != crc32fast::hash(&dst) {
        return Err(CoreError::Bytewords("crc32 checksum mismatch".into()));
    }
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors() {
        let cases = [
            ("aeadaolazmjendeoti", "00010280ff"),
            (
                "taaddwoeadgdstaslplabghydrpfmkbggufgludprfgmaotpiecffltntddwgmrp",
                "d9012ca20150c7098580125e2ab0981253468b2dbc5202d8641947da",
            ),
        ];
        for (bw, want) in cases {
            let want = hex::decode(want).unwrap();
            assert_eq!(decode(bw).unwrap(), want);
            assert_eq!(decode(&bw.to_uppercase()).unwrap(), want);
            assert_eq!(encode(&want), bw);
        }
    }

    #[test]
    fn rejects_bad_input() {
        assert!(decode("").is_err());
        assert!(decode("aea").is_err());
        assert!(decode("aeadao").is_err());
        assert!(decode("taaddwoeadgdstaslplabghydrpfmkbggufgludprfgmaotpiecffltntddwgmrs").is_err());
        assert!(decode("zzadaolazmjendeoti").is_err());
        assert!(decode("1eadaolazmjendeoti").is_err());
    }
}
