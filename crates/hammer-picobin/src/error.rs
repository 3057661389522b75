//! Error types for firmware image handling

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PicobinError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PicobinError {
    #[error("missing block header")]
    MissingHeader,

    #[error("missing block footer")]
    MissingFooter,

    #[error("zero-sized block item")]
    ZeroSizedItem,

    /// The LAST item disagrees with the sum of item sizes
    #[error("mismatched total item size")]
    MismatchedSize,

    #[error("invalid SIGNATURE item size")]
    InvalidSignatureSize,

    /// More blocks than any sane image links together
    #[error("block loop too long")]
    LoopTooLong,

    /// A required item is absent from the image
    #[error("missing {0} item")]
    MissingItem(&'static str),

    #[error("unknown HASH_DEF hash algorithm {0:#04x}")]
    UnknownHashAlgorithm(u8),

    #[error("HASH_VALUE is not last in block")]
    HashValueNotLast,

    /// Offset or length pointing outside the image
    #[error("image truncated at offset {0:#x}")]
    Truncated(usize),

    #[error("load map entry out of range")]
    InvalidLoadMap,
}
