//! Mjolnir wire format
//!
//! | Host frame         | Bytes                                   |
//! |--------------------|-----------------------------------------|
//! | init               | `00`                                    |
//! | cancel             | `af`                                    |
//! | set speed          | `30 print:u16le move:u16le e6 00`       |
//! | set delays         | `31 down:u8 up:u8`                      |
//! | move to origin     | `21 50`                                 |
//! | init program       | `60 batches:u16le`                      |
//! | move / line / nop  | `80`/`00`/`ff` then `x:u24le y:u24le z:u24le` |
//!
//! Program frames are [`CMD_SIZE`] bytes and travel in batches of
//! [`PROG_BATCH_SIZE`]; the device asks for each batch with
//! [`BUFFER_PROGRAM`].

use hammer_engrave::{Instruction, Point};

/// Bytes per program frame.
pub const CMD_SIZE: usize = 10;

/// Program frames per batch.
pub const PROG_BATCH_SIZE: usize = 80;

pub const INIT: u8 = 0x00;
pub const CANCEL: u8 = 0xaf;
pub const SET_SPEED: u8 = 0x30;
pub const SET_DELAYS: u8 = 0x31;
pub const MOVE_TO_ORIGIN: u8 = 0x21;
pub const MOVE_TO_ORIGIN_EXTRA: u8 = 0x50;
pub const MOVE_TO_ORIGIN_RESPONSE: u8 = 0x00;
pub const INIT_PROGRAM: u8 = 0x60;
pub const MOVE: u8 = 0x80;
pub const LINE: u8 = 0x00;
pub const NOP: u8 = 0xff;

pub const INITIALIZED: u8 = 0x00;
pub const CANCELLING: u8 = 0x62;
pub const CANCELLED: u8 = 0x65;
pub const BUFFER_PROGRAM: u8 = 0x60;
pub const PROGRAM_STEP: u8 = 0x6f;
pub const PROGRAM_COMPLETE: u8 = 0x6a;

/// Largest coordinate a frame can carry.
pub const MAX_COORD: i32 = 0xff_ffff;

/// Padding frame.
pub const NOP_FRAME: [u8; CMD_SIZE] = [NOP; CMD_SIZE];

/// Batches announced for a program of `count` frames. There is always at
/// least one trailing batch of padding, without which the engraver never
/// reports completion.
pub fn batches(count: usize) -> usize {
    (count + 2 * PROG_BATCH_SIZE - 1) / PROG_BATCH_SIZE
}

/// Little-endian 24-bit coordinates with a zero Z axis.
///
/// # Panics
///
/// On coordinates outside `[0, 0xffffff]`; plans are laid out on the machine
/// bed, so such a point is a layout bug.
pub fn coords(p: Point) -> [u8; 9] {
    assert!(
        (0..=MAX_COORD).contains(&p.x) && (0..=MAX_COORD).contains(&p.y),
        "({}, {}) out of range",
        p.x,
        p.y
    );
    let (x, y) = (p.x as u32, p.y as u32);
    [
        x as u8,
        (x >> 8) as u8,
        (x >> 16) as u8,
        y as u8,
        (y >> 8) as u8,
        (y >> 16) as u8,
        0,
        0,
        0,
    ]
}

pub fn parse_coords(data: &[u8]) -> (u32, u32) {
    let le24 = |b: &[u8]| u32::from(b[0]) | u32::from(b[1]) << 8 | u32::from(b[2]) << 16;
    (le24(&data[0..3]), le24(&data[3..6]))
}

pub fn frame(ins: Instruction) -> [u8; CMD_SIZE] {
    let mut f = [0u8; CMD_SIZE];
    f[0] = if ins.line { LINE } else { MOVE };
    f[1..].copy_from_slice(&coords(ins.coord));
    f
}
