//! Error types for engraving plans and plate layouts

use hammer_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngraveError>;

#[derive(Error, Debug)]
pub enum EngraveError {
    /// The face has no glyph for the character
    #[error("unsupported rune {0:?}")]
    UnsupportedRune(char),

    #[error("QR encoding failed: {0}")]
    Qr(String),

    /// No plate size holds the drawing inside its safety margin
    #[error("output descriptor is too large to backup")]
    DescriptorTooLarge,

    #[error("seed does not fit the plate")]
    SeedTooLarge,

    #[error("invalid plate: {0}")]
    InvalidPlate(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<qrcode::types::QrError> for EngraveError {
    fn from(e: qrcode::types::QrError) -> Self {
        EngraveError::Qr(e.to_string())
    }
}
