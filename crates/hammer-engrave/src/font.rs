//! Built-in monospace stroke font
//!
//! Glyphs are polylines on a small integer grid. The pen origin sits on the
//! baseline at the left edge of the cell; y grows downwards, so capitals span
//! `y = -9..=0`.
//!
//! | Metric  | Units |
//! |---------|-------|
//! | height  | 12    |
//! | ascent  | 10    |
//! | advance | 8     |

use crate::command::Point;

/// One polyline: a move to the first point, lines through the rest.
pub type Stroke = &'static [(i8, i8)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub ascent: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOp {
    MoveTo,
    LineTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub op: SegmentOp,
    pub arg: Point,
}

#[derive(Debug, Clone, Copy)]
pub struct Glyph {
    pub advance: i32,
    strokes: &'static [Stroke],
}

impl Glyph {
    pub fn segments(&self) -> Segments {
        Segments {
            strokes: self.strokes,
            stroke: 0,
            point: 0,
        }
    }
}

/// Iterator over a glyph's segments.
#[derive(Debug, Clone, Default)]
pub struct Segments {
    strokes: &'static [Stroke],
    stroke: usize,
    point: usize,
}

impl Iterator for Segments {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        loop {
            let stroke = self.strokes.get(self.stroke)?;
            match stroke.get(self.point) {
                Some(&(x, y)) => {
                    let op = if self.point == 0 {
                        SegmentOp::MoveTo
                    } else {
                        SegmentOp::LineTo
                    };
                    self.point += 1;
                    return Some(Segment {
                        op,
                        arg: Point::new(x.into(), y.into()),
                    });
                }
                None => {
                    self.stroke += 1;
                    self.point = 0;
                }
            }
        }
    }
}

/// A vector font face.
#[derive(Debug)]
pub struct Face {
    metrics: Metrics,
    advance: i32,
    glyphs: fn(char) -> Option<&'static [Stroke]>,
}

/// The monospace engraving face.
pub static MONO: Face = Face {
    metrics: Metrics {
        ascent: 10,
        height: 12,
    },
    advance: 8,
    glyphs: mono_glyph,
};

impl Face {
    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn decode(&self, ch: char) -> Option<Glyph> {
        (self.glyphs)(ch).map(|strokes| Glyph {
            advance: self.advance,
            strokes,
        })
    }

    pub fn supports(&self, ch: char) -> bool {
        (self.glyphs)(ch).is_some()
    }
}

const O_RING: Stroke = &[(1, -9), (5, -9), (6, -8), (6, -1), (5, 0), (1, 0), (0, -1), (0, -8), (1, -9)];
const P_BOWL: Stroke = &[(0, 0), (0, -9), (5, -9), (6, -8), (6, -5), (5, -4), (0, -4)];

fn mono_glyph(ch: char) -> Option<&'static [Stroke]> {
    let strokes: &'static [Stroke] = match ch {
        ' ' => &[],
        'A' => &[&[(0, 0), (0, -6), (3, -9), (6, -6), (6, 0)], &[(0, -4), (6, -4)]],
        'B' => &[
            &[(0, 0), (0, -9), (4, -9), (6, -7), (4, -5), (0, -5)],
            &[(4, -5), (6, -3), (6, -2), (4, 0), (0, 0)],
        ],
        'C' => &[&[(6, -8), (5, -9), (1, -9), (0, -8), (0, -1), (1, 0), (5, 0), (6, -1)]],
        'D' => &[&[(0, 0), (0, -9), (4, -9), (6, -7), (6, -2), (4, 0), (0, 0)]],
        'E' => &[&[(6, -9), (0, -9), (0, 0), (6, 0)], &[(0, -5), (4, -5)]],
        'F' => &[&[(6, -9), (0, -9), (0, 0)], &[(0, -5), (4, -5)]],
        'G' => &[&[
            (6, -8),
            (5, -9),
            (1, -9),
            (0, -8),
            (0, -1),
            (1, 0),
            (5, 0),
            (6, -1),
            (6, -4),
            (3, -4),
        ]],
        'H' => &[&[(0, 0), (0, -9)], &[(6, 0), (6, -9)], &[(0, -5), (6, -5)]],
        'I' => &[&[(1, -9), (5, -9)], &[(3, -9), (3, 0)], &[(1, 0), (5, 0)]],
        'J' => &[&[(6, -9), (6, -1), (5, 0), (1, 0), (0, -1), (0, -3)]],
        'K' => &[&[(0, 0), (0, -9)], &[(6, -9), (0, -3)], &[(2, -5), (6, 0)]],
        'L' => &[&[(0, -9), (0, 0), (6, 0)]],
        'M' => &[&[(0, 0), (0, -9), (3, -5), (6, -9), (6, 0)]],
        'N' => &[&[(0, 0), (0, -9), (6, 0), (6, -9)]],
        'O' => &[O_RING],
        'P' => &[P_BOWL],
        'Q' => &[O_RING, &[(3, -3), (6, 0)]],
        'R' => &[P_BOWL, &[(3, -4), (6, 0)]],
        'S' => &[&[
            (6, -8),
            (5, -9),
            (1, -9),
            (0, -8),
            (0, -6),
            (1, -5),
            (5, -4),
            (6, -3),
            (6, -1),
            (5, 0),
            (1, 0),
            (0, -1),
        ]],
        'T' => &[&[(0, -9), (6, -9)], &[(3, -9), (3, 0)]],
        'U' => &[&[(0, -9), (0, -1), (1, 0), (5, 0), (6, -1), (6, -9)]],
        'V' => &[&[(0, -9), (3, 0), (6, -9)]],
        'W' => &[&[(0, -9), (1, 0), (3, -5), (5, 0), (6, -9)]],
        'X' => &[&[(0, -9), (6, 0)], &[(6, -9), (0, 0)]],
        'Y' => &[&[(0, -9), (3, -5), (6, -9)], &[(3, -5), (3, 0)]],
        'Z' => &[&[(0, -9), (6, -9), (0, 0), (6, 0)]],
        '0' => &[O_RING, &[(5, -8), (1, -1)]],
        '1' => &[&[(1, -7), (3, -9), (3, 0)], &[(1, 0), (5, 0)]],
        '2' => &[&[(0, -8), (1, -9), (5, -9), (6, -8), (6, -6), (0, 0), (6, 0)]],
        '3' => &[
            &[(0, -8), (1, -9), (5, -9), (6, -8), (6, -6), (5, -5), (2, -5)],
            &[(5, -5), (6, -4), (6, -1), (5, 0), (1, 0), (0, -1)],
        ],
        '4' => &[&[(5, 0), (5, -9), (0, -3), (6, -3)]],
        '5' => &[&[
            (6, -9),
            (0, -9),
            (0, -5),
            (5, -5),
            (6, -4),
            (6, -1),
            (5, 0),
            (1, 0),
            (0, -1),
        ]],
        '6' => &[&[
            (5, -9),
            (2, -9),
            (0, -7),
            (0, -1),
            (1, 0),
            (5, 0),
            (6, -1),
            (6, -4),
            (5, -5),
            (0, -5),
        ]],
        '7' => &[&[(0, -9), (6, -9), (2, 0)]],
        '8' => &[&[
            (1, -5),
            (0, -6),
            (0, -8),
            (1, -9),
            (5, -9),
            (6, -8),
            (6, -6),
            (5, -5),
            (1, -5),
            (0, -4),
            (0, -1),
            (1, 0),
            (5, 0),
            (6, -1),
            (6, -4),
            (5, -5),
        ]],
        '9' => &[&[
            (6, -4),
            (1, -4),
            (0, -5),
            (0, -8),
            (1, -9),
            (5, -9),
            (6, -8),
            (6, -2),
            (4, 0),
            (1, 0),
        ]],
        '/' => &[&[(0, 0), (6, -9)]],
        ':' => &[&[(3, -7), (3, -6)], &[(3, -2), (3, -1)]],
        '-' => &[&[(1, -4), (5, -4)]],
        '.' => &[&[(3, -1), (3, 0)]],
        ',' => &[&[(3, -1), (2, 1)]],
        '\'' => &[&[(3, -9), (3, -7)]],
        '#' => &[
            &[(2, -8), (1, -1)],
            &[(5, -8), (4, -1)],
            &[(0, -6), (6, -6)],
            &[(0, -3), (6, -3)],
        ],
        '(' => &[&[(4, -9), (2, -7), (2, -2), (4, 0)]],
        ')' => &[&[(2, -9), (4, -7), (4, -2), (2, 0)]],
        _ => return None,
    };
    Some(strokes)
}
