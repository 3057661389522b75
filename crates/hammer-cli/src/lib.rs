//! Hammer CLI - Command-line tools for the Hammer engraving stack
//!
//! The `hammer` binary manipulates codex32 seeds and BIP-32 keys, engraves
//! backup plates (or renders PNG previews of them), and re-signs RP2350
//! firmware images.

pub mod commands;
pub mod error;
pub mod firmware;
pub mod plate;
pub mod seed;

pub use commands::{run, Cli, Commands};
pub use error::{exit_code, UsageError};
