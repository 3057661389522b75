//! Error types for the engraver driver

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Error, Debug)]
pub enum DriverError {
    /// The engraving was cancelled by the host or the machine
    #[error("cancelled")]
    Cancelled,

    #[error("unexpected reply: expected {expected:#04x?}, got {got:#04x}")]
    UnexpectedReply { expected: Vec<u8>, got: u8 },

    /// More batches than the 16-bit batch counter holds
    #[error("program too large: {0} instructions")]
    ProgramTooLarge(usize),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("no serial device specified")]
    NoDevice,

    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
