//! Property-based tests for hammer-core using proptest
//!
//! These tests verify invariants that should hold for all valid inputs.

use hammer_core::{
    bip32::{Path, HARDENED},
    bip39::Mnemonic,
    bytewords,
    codex32::Codex32,
    fountain, seedqr, ur,
};
use proptest::prelude::*;

// ============================================
// Strategies
// ============================================

fn arb_entropy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 16),
        prop::collection::vec(any::<u8>(), 20),
        prop::collection::vec(any::<u8>(), 24),
        prop::collection::vec(any::<u8>(), 28),
        prop::collection::vec(any::<u8>(), 32),
    ]
}

fn arb_codex32_secret() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 16),
        prop::collection::vec(any::<u8>(), 32),
        prop::collection::vec(any::<u8>(), 64),
    ]
}

fn arb_path() -> impl Strategy<Value = Path> {
    prop::collection::vec((0u32..HARDENED, any::<bool>()), 0..6).prop_map(|comps| {
        Path::new(
            comps
                .into_iter()
                .map(|(c, h)| if h { c + HARDENED } else { c })
                .collect(),
        )
    })
}

// ============================================
// Codex32
// ============================================

proptest! {
    #[test]
    fn codex32_secret_recovers_from_any_two_shares(
        (secret, other) in arb_codex32_secret().prop_flat_map(|s| {
            let n = s.len();
            (Just(s), prop::collection::vec(any::<u8>(), n))
        }),
        upper in any::<bool>(),
    ) {
        let hrp = if upper { "MS" } else { "ms" };
        let s = Codex32::new_seed(hrp, 2, if upper { "TEST" } else { "test" }, 's', &secret).unwrap();
        let a = Codex32::new_seed(hrp, 2, if upper { "TEST" } else { "test" }, 'a', &other).unwrap();
        prop_assert_eq!(s.seed(), secret.clone());

        let c = Codex32::interpolate(&[s.clone(), a.clone()], 'c').unwrap();
        let d = Codex32::interpolate(&[s.clone(), a.clone()], 'd').unwrap();
        for pair in [[a.clone(), c.clone()], [c.clone(), d.clone()], [d, a]] {
            let recovered = Codex32::interpolate(&pair, 's').unwrap();
            prop_assert_eq!(recovered.seed(), secret.clone());
            prop_assert_eq!(recovered.as_str(), s.as_str());
        }
        let parsed = Codex32::parse(c.as_str()).unwrap();
        prop_assert_eq!(parsed.as_str(), c.as_str());
    }

    #[test]
    fn codex32_single_error_is_detected(secret in arb_codex32_secret(), pos in any::<prop::sample::Index>()) {
        let s = Codex32::new_seed("ms", 0, "leet", 's', &secret).unwrap();
        let text = s.as_str();
        // Skip the prefix; flip one data character to a different one.
        let i = 3 + pos.index(text.len() - 3);
        let orig = text.as_bytes()[i] as char;
        let replacement = if orig == 'q' { 'p' } else { 'q' };
        let mut corrupted = text.to_string();
        corrupted.replace_range(i..i + 1, &replacement.to_string());
        prop_assert!(Codex32::parse(&corrupted).is_err());
    }
}

// ============================================
// BIP-39 and SeedQR
// ============================================

proptest! {
    #[test]
    fn mnemonic_entropy_round_trip(entropy in arb_entropy()) {
        let m = Mnemonic::new(&entropy).unwrap();
        prop_assert!(m.valid());
        prop_assert_eq!(m.len(), entropy.len() * 3 / 4);
        prop_assert_eq!(&m.entropy().unwrap()[..], &entropy[..]);
        prop_assert_eq!(Mnemonic::parse(&m.to_string()).unwrap(), m.clone());

        let qr = seedqr::qr(&m).unwrap();
        prop_assert_eq!(seedqr::parse(&qr).unwrap(), m);
    }
}

// ============================================
// Uniform Resources
// ============================================

proptest! {
    #[test]
    fn bytewords_round_trip(data in prop::collection::vec(any::<u8>(), 0..200)) {
        let enc = bytewords::encode(&data);
        prop_assert_eq!(enc.len(), (data.len() + 4) * 2);
        prop_assert_eq!(bytewords::decode(&enc).unwrap(), data);
    }

    #[test]
    fn fountain_recovers_from_any_order(
        message in prop::collection::vec(any::<u8>(), 1..600),
        seq_len in 2usize..8,
        order in Just((1u32..=8).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let mut d = fountain::Decoder::new();
        for seq_num in order.into_iter().filter(|&n| n as usize <= seq_len) {
            d.add(&fountain::encode(&message, seq_num, seq_len).unwrap()).unwrap();
        }
        prop_assert_eq!(d.result().unwrap().unwrap(), message);
    }

    #[test]
    fn ur_single_part_round_trip(message in prop::collection::vec(any::<u8>(), 0..100)) {
        let s = ur::encode("bytes", &message, 1, 1).unwrap();
        let mut d = ur::Decoder::new();
        d.add(&s.to_uppercase()).unwrap();
        prop_assert_eq!(d.result().unwrap().unwrap(), ("bytes".to_string(), message));
    }

    #[test]
    fn path_format_round_trip(path in arb_path()) {
        let s = path.to_string();
        prop_assert_eq!(Path::parse(&s).unwrap(), path);
    }
}
