//! Hammer Picobin - RP2350 firmware image signing
//!
//! Walks the block loop of a picobin image (RP2350 datasheet, section 5.9),
//! computes the digest its signature covers, and rewrites the image with a
//! secp256k1 public key and signature.

pub mod block;
pub mod error;

pub use block::{Image, ItemHeader, PUBKEY_LEN, SIGNATURE_LEN};
pub use error::{PicobinError, Result};

/// Flash address RP2350 images are loaded at.
pub const FLASH_BASE: u32 = 0x1000_0000;
