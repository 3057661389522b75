//! SeedQR and CompactSeedQR payloads
//!
//! SeedQR is the decimal word indices, four digits each. CompactSeedQR is
//! the raw mnemonic entropy, 16 or 32 bytes.

use crate::bip39::{Mnemonic, Word};
use crate::error::{CoreError, Result};

/// SeedQR payload of a valid mnemonic.
pub fn qr(m: &Mnemonic) -> Result<Vec<u8>> {
    if !m.valid() {
        return Err(CoreError::SeedQr("invalid mnemonic".into()));
    }
    Ok(m.words()
        .iter()
        .flat_map(|w| format!("{:04}", w.index()).into_bytes())
        .collect())
}

/// CompactSeedQR payload of a valid mnemonic.
pub fn compact_qr(m: &Mnemonic) -> Result<Vec<u8>> {
    m.entropy()
        .map(|e| e.to_vec())
        .ok_or_else(|| CoreError::SeedQr("invalid mnemonic".into()))
}

/// Decode either format, trying SeedQR first.
pub fn parse(qr: &[u8]) -> Option<Mnemonic> {
    parse_seed_qr(qr).or_else(|| parse_compact_seed_qr(qr))
}

fn parse_seed_qr(qr: &[u8]) -> Option<Mnemonic> {
    if qr.is_empty() || qr.len() % 4 != 0 {
        return None;
    }
    let words = qr
        .chunks(4)
        .map(|c| {
            let digits = std::str::from_utf8(c).ok()?;
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            Word::new(digits.parse().ok()?)
        })
        .collect::<Option<Vec<_>>>()?;
    let m = Mnemonic::from_words(words);
    m.valid().then_some(m)
}

fn parse_compact_seed_qr(qr: &[u8]) -> Option<Mnemonic> {
    match qr.len() {
        16 | 32 => Mnemonic::new(qr).ok(),
        _ => None,
    }
}
