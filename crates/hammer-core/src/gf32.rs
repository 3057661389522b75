//! GF(32) arithmetic over the bech32 alphabet
//!
//! Elements are the integers 0..32, each identified with one bech32
//! character. Addition is XOR; multiplication and division go through
//! discrete log tables with generator `z` (2).

use std::{fmt, ops};

/// The bech32 alphabet in element order.
pub const ALPHABET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Discrete log of each element. Entry 0 is unused.
#[rustfmt::skip]
const LOG: [u8; 32] = [
     0,  0,  1, 14,  2, 28, 15, 22,
     3,  5, 29, 26, 16,  7, 23, 11,
     4, 25,  6, 10, 30, 13, 27, 21,
    17, 18,  8, 19, 24,  9, 12, 20,
];

/// Powers of the generator.
#[rustfmt::skip]
const EXP: [u8; 31] = [
     1,  2,  4,  8, 16,  9, 18, 13,
    26, 29, 19, 15, 30, 21,  3,  6,
    12, 24, 25, 27, 31, 23,  7, 14,
    28, 17, 11, 22,  5, 10, 20,
];

/// ASCII to element, either case; -1 marks characters outside the alphabet.
#[rustfmt::skip]
const FROM_ASCII: [i8; 128] = [
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1,
    15, -1, 10, 17, 21, 20, 26, 30,  7,  5, -1, -1, -1, -1, -1, -1,
    -1, 29, -1, 24, 13, 25,  9,  8, 23, -1, 18, 22, 31, 27, 19, -1,
     1,  0,  3, 16, 11, 28, 12, 14,  6,  4,  2, -1, -1, -1, -1, -1,
    -1, 29, -1, 24, 13, 25,  9,  8, 23, -1, 18, 22, 31, 27, 19, -1,
     1,  0,  3, 16, 11, 28, 12, 14,  6,  4,  2, -1, -1, -1, -1, -1,
];

/// An element of GF(32).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct Fe(u8);

impl Fe {
    pub const Q: Fe = Fe(0);
    pub const P: Fe = Fe(1);
    pub const Z: Fe = Fe(2);
    pub const R: Fe = Fe(3);
    pub const Y: Fe = Fe(4);
    pub const _9: Fe = Fe(5);
    pub const X: Fe = Fe(6);
    pub const _8: Fe = Fe(7);
    pub const G: Fe = Fe(8);
    pub const F: Fe = Fe(9);
    pub const _2: Fe = Fe(10);
    pub const T: Fe = Fe(11);
    pub const V: Fe = Fe(12);
    pub const D: Fe = Fe(13);
    pub const W: Fe = Fe(14);
    pub const _0: Fe = Fe(15);
    pub const S: Fe = Fe(16);
    pub const _3: Fe = Fe(17);
    pub const J: Fe = Fe(18);
    pub const N: Fe = Fe(19);
    pub const _5: Fe = Fe(20);
    pub const _4: Fe = Fe(21);
    pub const K: Fe = Fe(22);
    pub const H: Fe = Fe(23);
    pub const C: Fe = Fe(24);
    pub const E: Fe = Fe(25);
    pub const _6: Fe = Fe(26);
    pub const M: Fe = Fe(27);
    pub const U: Fe = Fe(28);
    pub const A: Fe = Fe(29);
    pub const _7: Fe = Fe(30);
    pub const L: Fe = Fe(31);

    /// Element from its 5-bit value. Returns `None` for values >= 32.
    pub fn from_u8(v: u8) -> Option<Fe> {
        (v < 32).then_some(Fe(v))
    }

    /// Element from the low 5 bits of `v`.
    pub(crate) fn from_low_bits(v: u8) -> Fe {
        Fe(v & 0x1f)
    }

    /// Element for a bech32 character, case-insensitive.
    pub fn from_char(c: char) -> Option<Fe> {
        let c = u32::from(c);
        if c >= 128 {
            return None;
        }
        u8::try_from(FROM_ASCII[c as usize]).ok().map(Fe)
    }

    /// Lowercase bech32 character of the element.
    pub fn to_char(self) -> char {
        ALPHABET.as_bytes()[self.0 as usize] as char
    }

    pub fn to_u8(self) -> u8 {
        self.0
    }

    /// All 32 elements in numeric order.
    pub fn all() -> impl Iterator<Item = Fe> {
        (0..32).map(Fe)
    }
}

impl ops::Add for Fe {
    type Output = Fe;
    fn add(self, other: Fe) -> Fe {
        Fe(self.0 ^ other.0)
    }
}

impl ops::AddAssign for Fe {
    fn add_assign(&mut self, other: Fe) {
        *self = *self + other;
    }
}

// Characteristic 2: subtraction is addition.
impl ops::Sub for Fe {
    type Output = Fe;
    fn sub(self, other: Fe) -> Fe {
        self + other
    }
}

impl ops::SubAssign for Fe {
    fn sub_assign(&mut self, other: Fe) {
        *self = *self - other;
    }
}

impl ops::Mul for Fe {
    type Output = Fe;
    fn mul(self, other: Fe) -> Fe {
        if self.0 == 0 || other.0 == 0 {
            return Fe(0);
        }
        let l = LOG[self.0 as usize] as usize + LOG[other.0 as usize] as usize;
        Fe(EXP[l % 31])
    }
}

impl ops::MulAssign for Fe {
    fn mul_assign(&mut self, other: Fe) {
        *self = *self * other;
    }
}

impl ops::Div for Fe {
    type Output = Fe;

    /// Panics when dividing by zero.
    fn div(self, other: Fe) -> Fe {
        if other.0 == 0 {
            panic!("gf32: division of {self} by zero");
        }
        if self.0 == 0 {
            return Fe(0);
        }
        let l = 31 + LOG[self.0 as usize] as usize - LOG[other.0 as usize] as usize;
        Fe(EXP[l % 31])
    }
}

impl ops::DivAssign for Fe {
    fn div_assign(&mut self, other: Fe) {
        *self = *self / other;
    }
}

impl fmt::Display for Fe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_char(), f)
    }
}
