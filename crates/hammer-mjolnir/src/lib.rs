//! Hammer Mjolnir - Driver for the Mjolnir engraving machine
//!
//! The engraver speaks a half-duplex framed protocol over a serial line:
//! the host issues commands, the machine answers with single status bytes,
//! and programs are streamed in fixed-size batches on request. [`Driver`]
//! runs an engraving session over any async transport; [`Simulator`] plays
//! the machine side in process.

pub mod config;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod serial;
pub mod sim;

use hammer_engrave::Params;

pub use config::{Options, Position};
pub use driver::{safe_point, Driver};
pub use error::{DriverError, Result};
pub use sim::{Cmd, CmdType, Simulator};

/// Machine units per millimeter.
pub const MILLIMETER: i32 = 126;

/// Diameter of the engraved line in machine units.
pub const STROKE_WIDTH: i32 = 38;

pub const PARAMS: Params = Params {
    millimeter: MILLIMETER,
    stroke_width: STROKE_WIDTH,
};
