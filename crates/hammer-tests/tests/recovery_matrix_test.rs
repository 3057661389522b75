//! Every M-of-N layout up to 15 keys restores its descriptor
//!
//! For each scheme every M-sized subset of shares is decoded; this is the
//! slowest test in the workspace.

use hammer_core::bip32::{self, ExtendedKey, Network};
use hammer_core::{KeyDescriptor, Mnemonic, MultisigKind, OutputDescriptor, Script};
use hammer_engrave::backup::{recoverable, share_layout};

const MAX_KEYS: usize = 15;

fn keys(n: usize) -> Vec<KeyDescriptor> {
    let path = Script::P2wsh.derivation_path();
    (0..n)
        .map(|i| {
            let m = Mnemonic::new(&[i as u8 + 1; 16]).unwrap();
            let master = ExtendedKey::from_seed(&*m.seed(""), Network::Mainnet).unwrap();
            let (mfp, xpub) = bip32::derive(&master, &path).unwrap();
            KeyDescriptor {
                network: Network::Mainnet,
                master_fingerprint: mfp,
                derivation_path: path.clone(),
                children: Vec::new(),
                key_data: xpub.public_key_bytes(),
                chain_code: *xpub.chain_code(),
                parent_fingerprint: xpub.parent_fingerprint(),
            }
        })
        .collect()
}

fn descriptor(threshold: usize, keys: &[KeyDescriptor]) -> OutputDescriptor {
    let (script, kind) = if keys.len() == 1 {
        (Script::P2wpkh, MultisigKind::Singlesig)
    } else {
        (Script::P2wsh, MultisigKind::SortedMulti)
    };
    OutputDescriptor {
        title: "MATRIX".into(),
        script,
        kind,
        threshold,
        keys: keys.to_vec(),
    }
}

#[test]
fn every_scheme_is_recoverable() {
    let all = keys(MAX_KEYS);
    for n in 1..=MAX_KEYS {
        for m in 1..=n {
            let desc = descriptor(m, &all[..n]);
            assert!(recoverable(&desc), "{m}-of-{n}");
        }
    }
}

#[test]
fn fragments_cover_every_share() {
    for n in 1..=MAX_KEYS {
        for m in 1..=n {
            let mut seen = vec![false; n];
            for k in 0..n {
                let (seq_len, shares) = share_layout(m, n, k);
                assert!(seq_len >= 1, "{m}-of-{n}");
                for frag in shares.iter().flatten() {
                    // Fragment indices never exceed the sequence length.
                    assert!(*frag < seq_len, "{m}-of-{n} share {k}: {frag}");
                }
                seen[k] = !shares.is_empty();
            }
            assert!(seen.iter().all(|s| *s), "{m}-of-{n}");
        }
    }
}

#[test]
fn thresholds_above_key_count_are_rejected() {
    let all = keys(3);
    assert!(!recoverable(&descriptor(4, &all)));
    assert!(!recoverable(&descriptor(1, &[])));
}
