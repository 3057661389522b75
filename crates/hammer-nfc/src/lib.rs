//! Hammer NFC - Tag emulation for receiving data over NFC
//!
//! A phone or other NFC writer sees [`type4::Tag`] as an empty, writable
//! NDEF tag. Whatever it writes comes out of the tag as a byte stream of
//! NDEF messages, which [`ndef::RecordReader`] turns into text and URI
//! records.

pub mod error;
pub mod ndef;
pub mod type4;

pub use error::{NfcError, Result};
pub use ndef::{MessageReader, Record, RecordReader};
pub use type4::{Device, Tag};
