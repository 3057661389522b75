//! Seed and key diagnostics: `seed`, `interpolate`, `derive` and `rand`

use std::io::{Read, Write};

use anyhow::Context;
use clap::ValueEnum;
use hammer_core::{bip32, Codex32, ExtendedKey, Mnemonic, Network, Path};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::UsageError;

const MIN_SEED_LEN: usize = 16;
const MAX_SEED_LEN: usize = 64;
const MAX_THRESHOLD: u8 = 9;
const ID_LEN: usize = 4;

/// Output of `hammer derive`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Extended public key
    Xpub,
    /// Extended private key
    Xprv,
    /// Compressed public key, hex
    Pubkey,
    /// Private key, hex
    Privkey,
    /// Master fingerprint and derived xpub, as a descriptor key
    Key,
}

/// Validated parameters of `hammer seed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConf {
    pub hrp: String,
    /// Encoded threshold: 0 for an unshared secret.
    pub threshold: u8,
    pub id: String,
    pub seed_len: usize,
    pub index: char,
}

impl SeedConf {
    pub fn new(hrp: &str, threshold: u8, id: &str, seed_len: usize, idx: &str) -> anyhow::Result<Self> {
        if hrp.is_empty() || !hrp.is_ascii() {
            return Err(UsageError::new(format!("invalid hrp {hrp:?}")).into());
        }
        if threshold == 0 || threshold > MAX_THRESHOLD {
            return Err(UsageError::new(format!("invalid threshold: {threshold}")).into());
        }
        if id.chars().count() != ID_LEN {
            return Err(UsageError::new(format!("id must be {ID_LEN} characters: {id:?}")).into());
        }
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&seed_len) {
            return Err(UsageError::new(format!(
                "seed length {seed_len} not in range [{MIN_SEED_LEN},{MAX_SEED_LEN}]"
            ))
            .into());
        }
        let upper = hrp.chars().any(|c| c.is_ascii_uppercase());
        let id = if upper {
            id.to_ascii_uppercase()
        } else {
            id.to_ascii_lowercase()
        };
        Ok(Self {
            hrp: hrp.to_string(),
            // Zero is the encoding of a single share.
            threshold: if threshold == 1 { 0 } else { threshold },
            id,
            seed_len,
            index: share_index(idx)?,
        })
    }
}

fn share_index(s: &str) -> anyhow::Result<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c.to_ascii_lowercase()),
        _ => Err(UsageError::new(format!("invalid share index: {s:?}")).into()),
    }
}

/// Read exactly `conf.seed_len` bytes of entropy and print their codex32
/// encoding.
pub fn gen_seed(conf: &SeedConf, stdin: &mut dyn Read, stdout: &mut dyn Write) -> anyhow::Result<()> {
    let mut seed = Zeroizing::new(Vec::new());
    stdin.read_to_end(&mut seed).context("reading entropy")?;
    if seed.len() != conf.seed_len {
        return Err(UsageError::new(format!(
            "read {} bytes of entropy, expected {}",
            seed.len(),
            conf.seed_len
        ))
        .into());
    }
    let key = Codex32::new_seed(&conf.hrp, conf.threshold, &conf.id, conf.index, &seed)?;
    writeln!(stdout, "{key}")?;
    Ok(())
}

/// Parse one codex32 share per non-empty line.
pub fn parse_shares(input: &str) -> anyhow::Result<Vec<Codex32>> {
    input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| Codex32::parse(l).with_context(|| format!("share {l:?}")))
        .collect()
}

pub fn interpolate(idx: &str, stdin: &mut dyn Read, stdout: &mut dyn Write) -> anyhow::Result<()> {
    let mut input = String::new();
    stdin.read_to_string(&mut input).context("reading shares")?;
    let shares = parse_shares(&input)?;
    let target = share_index(idx)?;
    let share = Codex32::interpolate(&shares, target)?;
    writeln!(stdout, "{share}")?;
    Ok(())
}

/// Master key from an extended key, a mnemonic, or codex32 shares.
fn master_key(input: &str, network: Network, passphrase: &str) -> anyhow::Result<ExtendedKey> {
    if input.contains(' ') {
        let m = Mnemonic::parse(input)?;
        let seed = m.seed(passphrase);
        return Ok(ExtendedKey::from_seed(&seed[..], network)?);
    }
    if let Ok(key) = input.parse::<ExtendedKey>() {
        return Ok(key);
    }
    let shares = parse_shares(input)?;
    let secret = Codex32::interpolate(&shares, 's')?;
    let seed = Zeroizing::new(secret.seed());
    Ok(ExtendedKey::from_seed(&seed, network)?)
}

pub fn derive(
    format: Format,
    path: &str,
    testnet: bool,
    passphrase: &str,
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
) -> anyhow::Result<()> {
    let path = Path::parse(path)?;
    let mut input = Zeroizing::new(String::new());
    stdin.read_to_string(&mut input).context("reading input")?;
    let network = if testnet { Network::Testnet } else { Network::Mainnet };
    let master = master_key(input.trim(), network, passphrase)?;
    let key = master.derive_path(&path)?;
    tracing::debug!(path = %path, depth = key.depth(), "derived key");
    match format {
        Format::Xpub => writeln!(stdout, "{}", key.public())?,
        Format::Xprv => {
            if !key.is_private() {
                return Err(UsageError::new("cannot derive a private key from a public key").into());
            }
            writeln!(stdout, "{key}")?
        }
        Format::Pubkey => writeln!(stdout, "{}", hex::encode(key.public_key_bytes()))?,
        Format::Privkey => {
            let secret = key
                .secret_bytes()
                .ok_or_else(|| UsageError::new("cannot derive a private key from a public key"))?;
            writeln!(stdout, "{}", hex::encode(&secret[..]))?
        }
        Format::Key => {
            let (mfp, xpub) = bip32::derive(&master, &path)?;
            writeln!(stdout, "[{:08x}{}]{}", mfp, path.encode(), xpub)?
        }
    }
    Ok(())
}

pub fn gen_rand(n: usize, stdout: &mut dyn Write) -> anyhow::Result<()> {
    if n < MIN_SEED_LEN {
        return Err(UsageError::new(format!("length must be at least {MIN_SEED_LEN}")).into());
    }
    let mut buf = Zeroizing::new(vec![0u8; n]);
    OsRng.fill_bytes(&mut buf);
    stdout.write_all(&buf)?;
    Ok(())
}
