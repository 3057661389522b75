//! `hammer firmware`: hash, sign and inspect RP2350 images
//!
//! Signing is external: `hash` prints the digest to sign and `sign` writes
//! the resulting public key and signature into a copy of the image.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use hammer_picobin::{Image, PUBKEY_LEN, SIGNATURE_LEN};

use crate::commands::FirmwareCommands;
use crate::error::UsageError;

pub fn run(cmd: FirmwareCommands, stdout: &mut dyn Write) -> anyhow::Result<()> {
    match cmd {
        FirmwareCommands::Hash { image, address } => {
            let data = read(&image)?;
            let img = parse(&image, &data)?;
            let digest = img
                .hash_data(address)
                .with_context(|| format!("{}: hashing", image.display()))?;
            writeln!(stdout, "{}", hex::encode(digest))?;
        }
        FirmwareCommands::Sign {
            image,
            pubkey,
            signature,
            output,
        } => {
            let pubkey: [u8; PUBKEY_LEN] = decode_fixed("public key", &pubkey)?;
            let signature: [u8; SIGNATURE_LEN] = decode_fixed("signature", &signature)?;
            let data = read(&image)?;
            let signed = parse(&image, &data)?
                .sign(&pubkey, &signature)
                .with_context(|| format!("{}: signing", image.display()))?;
            std::fs::write(&output, &signed)
                .with_context(|| format!("writing {}", output.display()))?;
            tracing::info!("Signed {} -> {}", image.display(), output.display());
        }
        FirmwareCommands::Extract { image } => {
            let data = read(&image)?;
            let (key, sig) = parse(&image, &data)?
                .signature()
                .with_context(|| format!("{}: extracting", image.display()))?;
            writeln!(stdout, "pubkey {}", hex::encode(key))?;
            writeln!(stdout, "signature {}", hex::encode(sig))?;
        }
    }
    Ok(())
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn parse<'a>(path: &Path, data: &'a [u8]) -> anyhow::Result<Image<'a>> {
    Image::parse(data).with_context(|| format!("{}: invalid image", path.display()))
}

fn decode_fixed<const N: usize>(what: &str, s: &str) -> anyhow::Result<[u8; N]> {
    let bytes = hex::decode(s).map_err(|_| UsageError::new(format!("invalid {what} {s:?}")))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        UsageError::new(format!("got {} {what} bytes, expected {N}", bytes.len())).into()
    })
}

/// Parse a decimal or `0x` prefixed address.
pub fn parse_address(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("invalid address {s:?}"))
}
