//! Error types for the Hammer core codecs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failure modes of codex32 parsing, construction and interpolation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codex32Error {
    /// The BCH residue does not match the target residue
    #[error("invalid checksum")]
    InvalidChecksum,

    /// String length outside [48,93] and [125,127]
    #[error("invalid length {0}")]
    InvalidLength(usize),

    /// The payload leaves a partial group of more than 4 bits
    #[error("incomplete group of {0} bits")]
    IncompleteGroup(usize),

    #[error("invalid share index {0:?}")]
    InvalidShareIndex(char),

    #[error("invalid threshold {0:?}")]
    InvalidThreshold(char),

    /// Mixed upper and lower case characters
    #[error("invalid case")]
    InvalidCase,

    #[error("invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("insufficient shares")]
    InsufficientShares,

    #[error("mismatched share length")]
    MismatchedLength,

    #[error("mismatched id")]
    MismatchedId,

    #[error("mismatched human-readable prefix")]
    MismatchedHrp,

    #[error("mismatched threshold")]
    MismatchedThreshold,

    /// Identifiers are exactly four characters
    #[error("invalid id length {0}")]
    InvalidIdLength(usize),

    #[error("repeated share index {0:?}")]
    RepeatedIndex(char),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("codex32: {0}")]
    Codex32(#[from] Codex32Error),

    /// Invalid or unparseable BIP-39 mnemonic
    #[error("invalid mnemonic: {0}")]
    Mnemonic(String),

    /// BIP-32 derivation or extended key error
    #[error("bip32: {0}")]
    Bip32(String),

    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("bytewords: {0}")]
    Bytewords(String),

    #[error("fountain: {0}")]
    Fountain(String),

    #[error("ur: {0}")]
    Ur(String),

    /// Malformed CBOR or registry type
    #[error("cbor: {0}")]
    Cbor(String),

    /// Textual output descriptor parse error
    #[error("descriptor: {0}")]
    Descriptor(String),

    #[error("seedqr: {0}")]
    SeedQr(String),
}
