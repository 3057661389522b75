//! Error types for tag emulation and NDEF decoding

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NfcError>;

#[derive(Error, Debug)]
pub enum NfcError {
    #[error("write request too short")]
    ShortWrite,

    /// The declared data length disagrees with the request
    #[error("invalid size in write request")]
    InvalidWriteSize,

    /// Writes must continue where the previous one ended
    #[error("non-contiguous write at offset {offset}, expected {expected}")]
    NonContiguousWrite { offset: usize, expected: usize },

    #[error("expected start record")]
    ExpectedStartRecord,

    #[error("unexpected start record")]
    UnexpectedStartRecord,

    #[error("text language too long")]
    TextLanguageTooLong,

    #[error("record is not valid UTF-8")]
    InvalidUtf8,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<NfcError> for io::Error {
    fn from(e: NfcError) -> Self {
        match e {
            NfcError::Io(e) => e,
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
