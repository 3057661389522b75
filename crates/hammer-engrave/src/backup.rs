//! Plate layouts and the M-of-N descriptor share scheme
//!
//! A backup is one plate per key. The front of a plate carries the seed
//! words, a CompactSeedQR and the plate metadata; the back carries the wallet
//! output descriptor as one or more `crypto-output` URs, each written out as
//! text next to its QR code.
//!
//! The descriptor is split so that any M of the N plates restore it. UR
//! fountain parts may XOR several fragments together, which the layout
//! exploits:
//!
//! | Setup      | Parts | Share k carries                        |
//! |------------|-------|----------------------------------------|
//! | n - m <= 1 | m     | `{k}` for k < m, the last `{0..m}`     |
//! | 2-of-4     | 4     | `{0},{1}` / `{2},{3}` / `{0,2},{1,3}` / `{0,1,2},{1,2,3}` |
//! | 3-of-5     | 6     | `{k}` and `{5, k-1, k+1}` (mod 5)      |
//! | otherwise  | 1     | the complete descriptor                |

use std::fmt;
use std::str::FromStr;

use hammer_core::bip39::{Mnemonic, LONGEST_WORD};
use hammer_core::urtypes::{self, OutputDescriptor, UrValue};
use hammer_core::{fountain, seedqr, ur, UR_CRYPTO_OUTPUT};
use qrcode::EcLevel;

use crate::command::{Command, Params, Point, Qr, Rect, Text};
use crate::error::{EngraveError, Result};
use crate::font::{Face, MONO};
use crate::measure::{measure, normalize};

/// Longest title engraved on a plate.
pub const MAX_TITLE_LEN: usize = 18;

/// Version label engraved on the seed side.
pub const VERSION: &str = "V1";

const OUTER_MARGIN: i32 = 3;
const INNER_MARGIN: i32 = 10;
const META_MARGIN: i32 = 4;

const PLATE_FONT_SIZE: f32 = 4.1;
const PLATE_FONT_SIZE_UR: f32 = 3.8;
const PLATE_SMALL_FONT_SIZE: f32 = 3.0;

/// Words in the first seed column.
const MAX_COL1: usize = 16;
/// Words above the QR in the second column.
const MAX_COL2: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlateSize {
    Small,
    Square,
    Large,
}

impl PlateSize {
    /// Sizes in the order they are tried when fitting a layout.
    pub const ALL: [PlateSize; 3] = [PlateSize::Small, PlateSize::Square, PlateSize::Large];

    /// Plate area on the engraver bed, in millimeters.
    pub fn bounds(self) -> Rect {
        let (w, h) = self.dims();
        let (x, y) = self.offset();
        Rect::new(x, y, x + w, y + h)
    }

    fn dims(self) -> (i32, i32) {
        match self {
            PlateSize::Small => (85, 55),
            PlateSize::Square => (85, 85),
            PlateSize::Large => (85, 134),
        }
    }

    fn offset(self) -> (i32, i32) {
        const X: i32 = 97;
        match self {
            PlateSize::Square => (X, 49),
            _ => (X, 0),
        }
    }
}

impl fmt::Display for PlateSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlateSize::Small => "small",
            PlateSize::Square => "square",
            PlateSize::Large => "large",
        })
    }
}

impl FromStr for PlateSize {
    type Err = EngraveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "small" | "sh01" => Ok(PlateSize::Small),
            "square" | "sh02" => Ok(PlateSize::Square),
            "large" | "sh03" => Ok(PlateSize::Large),
            _ => Err(EngraveError::InvalidPlate(format!("unknown plate size {s:?}"))),
        }
    }
}

/// Front side of a plate.
#[derive(Debug, Clone)]
pub struct Seed {
    pub title: String,
    pub key_idx: usize,
    pub mnemonic: Mnemonic,
    pub keys: usize,
    pub master_fingerprint: u32,
    pub size: PlateSize,
}

/// Back side of a plate.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub descriptor: OutputDescriptor,
    pub key_idx: usize,
    pub size: PlateSize,
}

/// Upper-case `s` and keep the first [`MAX_TITLE_LEN`] characters the face
/// can engrave.
pub fn title_string(face: &Face, s: &str) -> String {
    s.to_uppercase()
        .chars()
        .filter(|&c| face.supports(c))
        .take(MAX_TITLE_LEN)
        .collect()
}

pub fn engrave_seed(params: &Params, plate: &Seed) -> Result<Command> {
    engrave_side(params, plate.size, |dims| front_side_seed(params, plate, dims))?
        .ok_or(EngraveError::SeedTooLarge)
}

pub fn engrave_descriptor(params: &Params, plate: &Descriptor) -> Result<Command> {
    engrave_side(params, plate.size, |dims| {
        let urs = split_ur(&plate.descriptor, plate.key_idx)?;
        descriptor_side(params, &MONO, &urs, plate.size, dims)
    })?
    .ok_or(EngraveError::DescriptorTooLarge)
}

/// Engrave the descriptor side on the smallest plate that holds it.
pub fn fit_descriptor(
    params: &Params,
    descriptor: &OutputDescriptor,
    key_idx: usize,
) -> Result<(PlateSize, Command)> {
    for size in PlateSize::ALL {
        let plate = Descriptor {
            descriptor: descriptor.clone(),
            key_idx,
            size,
        };
        match engrave_descriptor(params, &plate) {
            Ok(cmd) => return Ok((size, cmd)),
            Err(EngraveError::DescriptorTooLarge) => {
                tracing::debug!(%size, "descriptor does not fit");
            }
            Err(e) => return Err(e),
        }
    }
    Err(EngraveError::DescriptorTooLarge)
}

/// Engrave the seed side on the smallest plate that holds it.
pub fn fit_seed(params: &Params, plate: &Seed) -> Result<(PlateSize, Command)> {
    for size in PlateSize::ALL {
        let plate = Seed { size, ..plate.clone() };
        match engrave_seed(params, &plate) {
            Ok(cmd) => return Ok((size, cmd)),
            Err(EngraveError::SeedTooLarge) => {
                tracing::debug!(%size, "seed does not fit");
            }
            Err(e) => return Err(e),
        }
    }
    Err(EngraveError::SeedTooLarge)
}

// Lays out one side in plate-local units, then places it on the bed.
// `None` when the drawing leaves the safety margin.
fn engrave_side(
    params: &Params,
    size: PlateSize,
    eng: impl FnOnce(Point) -> Result<Command>,
) -> Result<Option<Command>> {
    let b = size.bounds().scale(params.millimeter);
    let plate = b.size();
    let side = eng(plate)?;
    let bounds = measure(&side);
    let margin = params.i(OUTER_MARGIN);
    let safe = Rect::new(margin, margin, plate.x - margin, plate.y - margin);
    if !bounds.within(&safe) {
        tracing::debug!(?bounds, ?safe, "layout exceeds safety margin");
        return Ok(None);
    }
    Ok(Some(Command::offset(b.min.x, b.min.y, side)))
}

/// Fragment index sets carried by share `key_idx` of an M-of-N setup,
/// with the number of fragments the data is split into.
pub fn share_layout(threshold: usize, keys: usize, key_idx: usize) -> (usize, Vec<Vec<usize>>) {
    let (m, n) = (threshold.max(1), keys);
    if n <= m + 1 {
        let share = if key_idx < m { vec![key_idx] } else { (0..m).collect() };
        return (m, vec![share]);
    }
    match (m, n) {
        (2, 4) => {
            let shares = match key_idx {
                0 => vec![vec![0], vec![1]],
                1 => vec![vec![2], vec![3]],
                2 => vec![vec![0, 2], vec![1, 3]],
                _ => vec![vec![0, 2, 1], vec![1, 3, 2]],
            };
            (m * 2, shares)
        }
        (3, 5) => {
            let second = vec![n, (key_idx + n - 1) % n, (key_idx + 1) % n];
            (m * 2, vec![vec![key_idx], second])
        }
        _ => (1, vec![vec![0]]),
    }
}

/// The upper-case URs engraved on share `key_idx`.
pub fn split_ur(desc: &OutputDescriptor, key_idx: usize) -> Result<Vec<String>> {
    if key_idx >= desc.keys.len() {
        return Err(EngraveError::InvalidPlate(format!(
            "key {key_idx} out of range for {} keys",
            desc.keys.len()
        )));
    }
    let (seq_len, shares) = share_layout(desc.threshold, desc.keys.len(), key_idx);
    let data = desc.encode()?;
    let check = fountain::checksum(&data);
    shares
        .iter()
        .map(|frag| {
            let seq_num = fountain::seq_num_for(seq_len, check, frag).ok_or_else(|| {
                EngraveError::InvalidPlate(format!("no fountain part mixes fragments {frag:?}"))
            })?;
            tracing::debug!(key_idx, seq_num, seq_len, ?frag, "share part");
            Ok(ur::encode(UR_CRYPTO_OUTPUT, &data, seq_num, seq_len)?.to_uppercase())
        })
        .collect()
}

/// Whether every M-sized subset of the shares restores `desc`.
pub fn recoverable(desc: &OutputDescriptor) -> bool {
    let n = desc.keys.len();
    if n == 0 || n > 63 || desc.threshold > n {
        return false;
    }
    let Ok(shares) = (0..n).map(|k| split_ur(desc, k)).collect::<Result<Vec<_>>>() else {
        return false;
    };
    let m = desc.threshold.max(1) as u32;
    let all = (1u64 << n) - 1;
    (1..=all)
        .filter(|c| c.count_ones() == m)
        .all(|c| restores(desc, &shares, c))
}

fn restores(desc: &OutputDescriptor, shares: &[Vec<String>], mut chosen: u64) -> bool {
    let mut d = ur::Decoder::new();
    while chosen != 0 {
        let share = chosen.trailing_zeros() as usize;
        chosen &= !(1 << share);
        for part in &shares[share] {
            if d.add(part).is_err() {
                return false;
            }
        }
    }
    match d.result() {
        Ok(Some((typ, enc))) => {
            matches!(urtypes::parse(&typ, &enc), Ok(UrValue::Output(got)) if got == *desc)
        }
        _ => false,
    }
}

fn front_side_seed(params: &Params, plate: &Seed, plate_dims: Point) -> Result<Command> {
    let face = &MONO;
    let font = params.f(PLATE_FONT_SIZE);
    let small_font = params.f(PLATE_SMALL_FONT_SIZE);
    let words = plate.mnemonic.len();
    let mut cmds = Vec::new();

    let end_col1 = words.min(MAX_COL1);
    let (col1, col1b) = normalize(word_column(face, font, &plate.mnemonic, 0, end_col1)?);

    let margin = params.i(OUTER_MARGIN);
    let inner_margin = params.i(INNER_MARGIN);
    let meta_margin = params.i(META_MARGIN);
    let page = format!("{}/{}", plate.key_idx + 1, plate.keys);
    let mfp = format!("{:08X}", plate.master_fingerprint);
    let small = |s: &str| -> Result<Command> { Ok(Text::new(face, small_font, s)?.into()) };
    let quarter = -std::f64::consts::FRAC_PI_2;

    match plate.size {
        PlateSize::Small => {
            let (pagec, _) = normalize(small(&page)?);
            cmds.push(Command::offset(
                margin,
                plate_dims.y - inner_margin,
                Command::rotate(quarter, pagec),
            ));
            let (mfpc, sz) = normalize(Command::rotate(quarter, small(&mfp)?));
            cmds.push(Command::offset(margin, (plate_dims.y - sz.y) / 2, mfpc));
            let (ver, _) = normalize(Command::rotate(quarter, small(VERSION)?));
            cmds.push(Command::offset(margin, inner_margin, ver));
        }
        _ => {
            let offy = (plate_dims.y - col1b.y) / 2 - meta_margin;
            let (pagec, sz) = normalize(small(&page)?);
            cmds.push(Command::offset(inner_margin, offy - sz.y, pagec));
            let (mfpc, sz) = normalize(small(&mfp)?);
            cmds.push(Command::offset((plate_dims.x - sz.x) / 2, offy - sz.y, mfpc));
            let (ver, sz) = normalize(small(VERSION)?);
            cmds.push(Command::offset(plate_dims.x - sz.x - inner_margin, offy - sz.y, ver));
        }
    }

    let col_top = (plate_dims.y - col1b.y) / 2;
    cmds.push(Command::offset(inner_margin, col_top, col1));

    let end_col2 = (end_col1 + MAX_COL2).min(words);
    let (col2, _) = normalize(word_column(face, font, &plate.mnemonic, end_col1, end_col2)?);
    cmds.push(Command::offset(params.i(44), col_top, col2));

    let payload = seedqr::compact_qr(&plate.mnemonic)?;
    let (qr, sz) = normalize(Qr::new(params.stroke_width, 3, EcLevel::Q, &payload)?.into());
    cmds.push(Command::offset(
        params.i(60) - sz.x / 2,
        (plate_dims.y - sz.y) / 2,
        qr,
    ));

    if plate.size != PlateSize::Small {
        let (col2, col2b) = normalize(word_column(face, font, &plate.mnemonic, end_col2, words)?);
        cmds.push(Command::offset(
            params.i(44),
            (plate_dims.y + col1b.y) / 2 - col2b.y,
            col2,
        ));
    } else if end_col2 < words {
        return Err(EngraveError::SeedTooLarge);
    }

    let title = title_string(face, &plate.title);
    match plate.size {
        PlateSize::Small => {
            let (t, sz) = normalize(Command::rotate(quarter, small(&title)?));
            cmds.push(Command::offset(
                plate_dims.x - margin - sz.x,
                (plate_dims.y - sz.y) / 2,
                t,
            ));
        }
        _ => {
            let offy = (plate_dims.y + col1b.y) / 2 + meta_margin;
            let (t, sz) = normalize(small(&title)?);
            cmds.push(Command::offset((plate_dims.x - sz.x) / 2, offy, t));
        }
    }

    let all = Command::Sequence(cmds);
    if plate.size == PlateSize::Large {
        // Clear the screw holes in the middle of the plate.
        return Ok(Command::offset(0, params.f(24.5), all));
    }
    Ok(all)
}

fn word_column(
    face: &'static Face,
    em: i32,
    mnemonic: &Mnemonic,
    start: usize,
    end: usize,
) -> Result<Command> {
    let mut cmds = Vec::new();
    let mut y = 0;
    for (i, w) in mnemonic.words().iter().enumerate().take(end).skip(start) {
        let num = Text::new(face, em, format!("{:2} ", i + 1))?;
        let d = num.measure();
        let word = format!("{:<width$}", w.label().to_uppercase(), width = LONGEST_WORD);
        cmds.push(Command::offset(0, y, num.into()));
        cmds.push(Command::offset(d.x, y, Text::new(face, em, word)?.into()));
        y += d.y;
    }
    Ok(Command::Sequence(cmds))
}

fn descriptor_side(
    params: &Params,
    face: &'static Face,
    urs: &[String],
    size: PlateSize,
    plate_dims: Point,
) -> Result<Command> {
    let font = params.f(PLATE_FONT_SIZE_UR);
    let mut cmds = Vec::new();

    let glyph = face.decode('W').ok_or(EngraveError::UnsupportedRune('W'))?;
    let char_width = glyph.advance * font / face.metrics().height;
    let mut margin = params.i(OUTER_MARGIN);
    let inner_margin = params.i(INNER_MARGIN);
    if size == PlateSize::Large {
        margin = inner_margin;
    }
    let hole_chars = div_ceil(inner_margin - margin, char_width);
    let hole_lines = div_ceil(inner_margin - margin, font);
    let width = plate_dims.x - 2 * margin;
    let chars_per_line = width / char_width;
    let qr_border = params.i(2);
    let mut offy = params.i(OUTER_MARGIN);

    for (i, ur) in urs.iter().enumerate() {
        let (qr, qrsz) = normalize(Qr::new(params.stroke_width, 2, EcLevel::M, ur.as_bytes())?.into());
        let chars_per_qr_line = (width - 2 * qr_border - qrsz.x) / char_width;
        let qr_lines = (qrsz.y + 2 * qr_border + font - 1) / font;
        let qr_line_start = hole_lines;
        let mut rest = ur.as_str();
        let mut lineno = 0;
        while !rest.is_empty() {
            let mut n = chars_per_line;
            let mut offx = 0;
            let is_qr_line = qr_line_start <= lineno && lineno < qr_line_start + qr_lines;
            if is_qr_line {
                n = chars_per_qr_line;
            }
            // Keep clear of the screw holes on the first and last lines.
            let hole_line = offy + lineno * font < inner_margin
                || offy + (lineno + 1) * font > plate_dims.y - inner_margin;
            if hole_line {
                if !is_qr_line {
                    n -= hole_chars;
                }
                n -= hole_chars;
                offx = hole_chars * char_width;
            }
            let n = (n.max(1) as usize).min(rest.len());
            let (line, tail) = rest.split_at(n);
            rest = tail;
            cmds.push(Command::offset(
                offx + margin,
                offy + lineno * font,
                Text::new(face, font, line)?.into(),
            ));
            lineno += 1;
        }
        let qrx = plate_dims.x - qrsz.x - margin - qr_border;
        let qry = qr_line_start * font + (qr_lines * font - qrsz.y) / 2;
        cmds.push(Command::offset(qrx, offy + qry, qr));
        offy += lineno * font;
        if i + 1 != urs.len() {
            offy += params.i(1);
        }
    }
    Ok(Command::Sequence(cmds))
}

fn div_ceil(a: i32, b: i32) -> i32 {
    if a <= 0 {
        return 0;
    }
    (a + b - 1) / b
}
