//! Hammer Core - Seed and descriptor codecs for metal backups
//!
//! This crate holds the data formats engraved by the Hammer stack: codex32
//! shares over GF(32), BIP-39 mnemonics, BIP-32 keys, SeedQR payloads and
//! the Uniform Resources family (bytewords, fountain codes, registry types).

pub mod bip32;
pub mod bip39;
pub mod bytewords;
pub mod codex32;
pub mod descriptor;
pub mod error;
pub mod fountain;
pub mod gf32;
pub mod seedqr;
pub mod ur;
pub mod urtypes;
pub mod xoshiro;

pub use bip32::{ExtendedKey, Network, Path};
pub use bip39::{Mnemonic, Word};
pub use codex32::Codex32;
pub use error::{Codex32Error, CoreError, Result};
pub use gf32::Fe;
pub use urtypes::{Derivation, KeyDescriptor, MultisigKind, OutputDescriptor, Script};

/// UR type of an output descriptor.
pub const UR_CRYPTO_OUTPUT: &str = "crypto-output";

/// UR type of a single extended key.
pub const UR_CRYPTO_HDKEY: &str = "crypto-hdkey";
