//! End-to-end workflow tests for the Hammer stack
//!
//! These tests walk a multisig backup from fresh entropy through plate
//! layout, a simulated engraving session and finally recovery of the
//! descriptor from a quorum of engraved shares.

use hammer_core::bip32::{self, ExtendedKey, Network};
use hammer_core::urtypes::{self, UrValue};
use hammer_core::{
    ur, Codex32, KeyDescriptor, Mnemonic, MultisigKind, OutputDescriptor, Script,
};
use hammer_engrave::backup::{self, share_layout, split_ur};
use hammer_engrave::{measure, Command, Instruction, PlateSize};
use hammer_mjolnir::{Cmd, CmdType, Driver, Options, Position, Simulator, PARAMS};

// ============================================================================
// Helpers
// ============================================================================

fn entropy(fill: u8) -> Vec<u8> {
    (0..16u8).map(|i| i.wrapping_mul(31) ^ fill).collect()
}

fn key_descriptor(mnemonic: &Mnemonic, script: Script) -> KeyDescriptor {
    let path = script.derivation_path();
    let master = ExtendedKey::from_seed(&*mnemonic.seed(""), Network::Testnet).unwrap();
    let (mfp, xpub) = bip32::derive(&master, &path).unwrap();
    KeyDescriptor {
        network: Network::Testnet,
        master_fingerprint: mfp,
        derivation_path: path,
        children: Vec::new(),
        key_data: xpub.public_key_bytes(),
        chain_code: *xpub.chain_code(),
        parent_fingerprint: xpub.parent_fingerprint(),
    }
}

fn to_cmds(plan: impl Iterator<Item = Instruction>) -> Vec<Cmd> {
    plan.map(|ins| {
        let (x, y) = (ins.coord.x as u32, ins.coord.y as u32);
        if ins.line {
            Cmd::line_to(x, y)
        } else {
            Cmd::move_to(x, y)
        }
    })
    .collect()
}

fn recover(parts: &[&String]) -> Option<OutputDescriptor> {
    let mut d = ur::Decoder::new();
    for p in parts {
        d.add(p).unwrap();
    }
    let (typ, enc) = d.result().unwrap()?;
    match urtypes::parse(&typ, &enc).unwrap() {
        UrValue::Output(desc) => Some(desc),
        other => panic!("unexpected UR value {other:?}"),
    }
}

// ============================================================================
// Workflow
// ============================================================================

/// A 2-of-3 wallet backed up on three plates and restored from two.
#[tokio::test]
async fn test_full_backup_lifecycle() {
    // ==========================================
    // STEP 1: Generate the three seeds
    // ==========================================
    let mut mnemonics = Vec::new();
    for fill in [0x11u8, 0x22, 0x33] {
        let data = entropy(fill);
        // The same entropy as a codex32 secret share and a mnemonic.
        let share = Codex32::new_seed("ms", 0, "leet", 's', &data).unwrap();
        let parsed = Codex32::parse(&share.to_string()).unwrap();
        assert_eq!(parsed.seed(), data);

        let m = Mnemonic::new(&data).unwrap();
        assert_eq!(m.len(), 12);
        assert!(m.valid());
        assert_eq!(m.entropy().unwrap().as_slice(), data.as_slice());
        mnemonics.push(m);
    }

    // ==========================================
    // STEP 2: Assemble the wallet descriptor
    // ==========================================
    let keys: Vec<_> = mnemonics
        .iter()
        .map(|m| key_descriptor(m, Script::P2wsh))
        .collect();
    let desc = OutputDescriptor {
        title: backup::title_string(&hammer_engrave::MONO, "Family Vault"),
        script: Script::P2wsh,
        kind: MultisigKind::SortedMulti,
        threshold: 2,
        keys,
    };
    assert_eq!(desc.title, "FAMILY VAULT");
    assert!(backup::recoverable(&desc));

    // ==========================================
    // STEP 3: Lay out every plate
    // ==========================================
    let mut shares = Vec::new();
    let mut plates: Vec<(PlateSize, Command)> = Vec::new();
    for (key_idx, m) in mnemonics.iter().enumerate() {
        let seed = backup::Seed {
            title: desc.title.clone(),
            key_idx,
            mnemonic: m.clone(),
            keys: desc.keys.len(),
            master_fingerprint: desc.keys[key_idx].master_fingerprint,
            size: PlateSize::Small,
        };
        let front = backup::fit_seed(&PARAMS, &seed).unwrap();
        let back = backup::fit_descriptor(&PARAMS, &desc, key_idx).unwrap();

        for (size, cmd) in [&front, &back] {
            let bed = size.bounds().scale(PARAMS.millimeter);
            let b = measure(cmd);
            assert!(b.within(&bed), "plate {key_idx}: {b:?} outside {bed:?}");
        }
        plates.push(front);
        plates.push(back);
        shares.push(split_ur(&desc, key_idx).unwrap());
    }
    // 2-of-3: one fragment each on the first two shares, both on the third.
    for (k, want) in [vec![0], vec![1], vec![0, 1]].into_iter().enumerate() {
        assert_eq!(share_layout(2, 3, k), (2, vec![want]));
        assert_eq!(shares[k].len(), 1);
        assert!(shares[k][0].starts_with("UR:CRYPTO-OUTPUT/"));
    }

    // ==========================================
    // STEP 4: Engrave the first plate
    // ==========================================
    let (_, front) = &plates[0];
    let mut sim = Simulator::new();
    let opts = Options {
        end: Some(Position { x: 500, y: 500 }),
        ..Options::default()
    };
    Driver::new(&mut sim)
        .engrave(&opts, || front.steps())
        .await
        .unwrap();

    let cmds = sim.cmds();
    let program = to_cmds(front.steps());
    assert_eq!(cmds[0], Cmd::move_to(0, 0));
    assert_eq!(cmds.last(), Some(&Cmd::move_to(500, 500)));
    let n = cmds.len();
    assert_eq!(&cmds[n - 1 - program.len()..n - 1], program.as_slice());

    // ==========================================
    // STEP 5: Restore from any two shares
    // ==========================================
    for (a, b) in [(0, 1), (0, 2), (1, 2)] {
        let parts: Vec<&String> = shares[a].iter().chain(&shares[b]).collect();
        let got = recover(&parts).unwrap_or_else(|| panic!("shares {a},{b} incomplete"));
        assert_eq!(got, desc, "shares {a},{b}");
    }

    // A single share is not enough.
    for s in &shares[..2] {
        assert!(recover(&s.iter().collect::<Vec<_>>()).is_none());
    }
}

/// The seed side of a plate made from a codex32 backup.
#[test]
fn test_codex32_shares_to_plate() {
    // BIP-93 test vector 3: three shares of a 3-of-n secret.
    let shares: Vec<Codex32> = [
        "ms13cashsllhdmn9m42vcsamx24zrxgs3qqjzqud4m0d6nln",
        "ms13casha320zyxwvutsrqpnmlkjhgfedca2a8d0zehn8a0t",
        "ms13cashcacdefghjklmnpqrstuvwxyz023949xq35my48dr",
    ]
    .iter()
    .map(|s| Codex32::parse(s).unwrap())
    .collect();

    let d = Codex32::interpolate(&shares, 'd').unwrap();
    assert_eq!(d.as_str(), "ms13cashd0wsedstcdcts64cd7wvy4m90lm28w4ffupqs7rm");

    let secret = Codex32::interpolate(&shares, 's').unwrap();
    let m = Mnemonic::new(&secret.seed()).unwrap();
    let key = key_descriptor(&m, Script::P2wpkh);
    let seed = backup::Seed {
        title: "CASH".into(),
        key_idx: 0,
        mnemonic: m,
        keys: 1,
        master_fingerprint: key.master_fingerprint,
        size: PlateSize::Small,
    };
    let (size, cmd) = backup::fit_seed(&PARAMS, &seed).unwrap();
    assert_eq!(size, PlateSize::Small);
    let b = measure(&cmd);
    assert!(b.width() > 0 && b.height() > 0);
}

/// Dry runs trace the plate outline without lowering the needle.
#[tokio::test]
async fn test_dry_run_session() {
    let m = Mnemonic::new(&entropy(0x44)).unwrap();
    let key = key_descriptor(&m, Script::P2wpkh);
    let desc = OutputDescriptor {
        title: "SOLO".into(),
        script: Script::P2wpkh,
        kind: MultisigKind::Singlesig,
        threshold: 1,
        keys: vec![key],
    };
    let (_, back) = backup::fit_descriptor(&PARAMS, &desc, 0).unwrap();
    let dry = Command::dry_run(back);

    let mut sim = Simulator::new();
    Driver::new(&mut sim)
        .engrave(&Options::default(), || dry.steps())
        .await
        .unwrap();
    assert!(sim.cmds().len() > 10);
    assert!(sim.cmds().iter().all(|c| c.kind == CmdType::MoveTo));
}
