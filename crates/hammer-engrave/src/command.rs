//! Engraving command trees and their lazy instruction streams
//!
//! A [`Command`] is an immutable tree of drawing primitives. [`Command::steps`]
//! flattens it into absolute [`Instruction`]s without materialising the
//! whole program, so a plate with thousands of strokes can be streamed to
//! the engraver or a rasterizer straight from the tree.

use std::ops::{Add, Sub};
use std::slice;
use std::str::Chars;

use qrcode::{Color, EcLevel, QrCode};

use crate::error::{EngraveError, Result};
use crate::font::{Face, SegmentOp, Segments};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis aligned rectangle; `max` is inclusive for measured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: Point::new(x0, y0),
            max: Point::new(x1, y1),
        }
    }

    pub fn size(&self) -> Point {
        self.max - self.min
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }

    /// Whether `self` lies inside `outer`, edges included.
    pub fn within(&self, outer: &Rect) -> bool {
        self.min.x >= outer.min.x
            && self.min.y >= outer.min.y
            && self.max.x <= outer.max.x
            && self.max.y <= outer.max.y
    }

    pub fn scale(&self, k: i32) -> Rect {
        Rect::new(self.min.x * k, self.min.y * k, self.max.x * k, self.max.y * k)
    }
}

/// One step of an engraving program: move the needle up to `coord`, or
/// engrave a straight line to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub line: bool,
    pub coord: Point,
}

impl Instruction {
    pub const fn move_to(coord: Point) -> Self {
        Self { line: false, coord }
    }

    pub const fn line_to(coord: Point) -> Self {
        Self { line: true, coord }
    }
}

/// Conversion from millimeters to machine units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    /// Machine units per millimeter
    pub millimeter: i32,
    /// Diameter of an engraved line in machine units
    pub stroke_width: i32,
}

impl Params {
    /// Fractional millimeters, truncated to machine units.
    pub fn f(&self, mm: f32) -> i32 {
        (mm * self.millimeter as f32) as i32
    }

    pub fn i(&self, mm: i32) -> i32 {
        mm * self.millimeter
    }
}

/// Integer affine transform `[a, b, c, d, e, f]` mapping
/// `(x, y)` to `(a·x + b·y + c, d·x + e·y + f)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affine([i32; 6]);

impl Affine {
    pub const IDENTITY: Affine = Affine([1, 0, 0, 0, 1, 0]);

    pub const fn offset(x: i32, y: i32) -> Self {
        Affine([1, 0, x, 0, 1, y])
    }

    /// Rotation with sine and cosine rounded to integers, so only
    /// multiples of a quarter turn are exact.
    pub fn rotation(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        let (s, c) = (s.round() as i32, c.round() as i32);
        Affine([c, -s, 0, s, c, 0])
    }

    /// `self ∘ inner`: apply `inner` first.
    pub fn compose(&self, inner: &Affine) -> Affine {
        let [a0, a1, a2, a3, a4, a5] = self.0;
        let [b0, b1, b2, b3, b4, b5] = inner.0;
        Affine([
            a0 * b0 + a1 * b3,
            a0 * b1 + a1 * b4,
            a0 * b2 + a1 * b5 + a2,
            a3 * b0 + a4 * b3,
            a3 * b1 + a4 * b4,
            a3 * b2 + a4 * b5 + a5,
        ])
    }

    pub fn apply(&self, p: Point) -> Point {
        let m = &self.0;
        Point::new(
            p.x * m[0] + p.y * m[1] + m[2],
            p.x * m[3] + p.y * m[4] + m[5],
        )
    }
}

/// A tree of engraving primitives.
#[derive(Debug, Clone)]
pub enum Command {
    Move(Point),
    Line(Point),
    Text(Text),
    Qr(Qr),
    Transform(Affine, Box<Command>),
    Sequence(Vec<Command>),
    /// Replays the inner command with every line turned into a move.
    DryRun(Box<Command>),
}

impl Command {
    pub fn offset(x: i32, y: i32, cmd: Command) -> Command {
        Command::Transform(Affine::offset(x, y), Box::new(cmd))
    }

    pub fn rotate(radians: f64, cmd: Command) -> Command {
        Command::Transform(Affine::rotation(radians), Box::new(cmd))
    }

    pub fn dry_run(cmd: Command) -> Command {
        Command::DryRun(Box::new(cmd))
    }

    /// Closed outline of `r`.
    pub fn rect(r: Rect) -> Command {
        Command::Sequence(vec![
            Command::Move(r.min),
            Command::Line(Point::new(r.max.x, r.min.y)),
            Command::Line(r.max),
            Command::Line(Point::new(r.min.x, r.max.y)),
            Command::Line(r.min),
        ])
    }

    pub fn steps(&self) -> Steps<'_> {
        Steps {
            stack: vec![Frame {
                ctx: Ctx::ROOT,
                kind: FrameKind::Commands(slice::from_ref(self).iter()),
            }],
        }
    }
}

impl From<Text> for Command {
    fn from(t: Text) -> Self {
        Command::Text(t)
    }
}

impl From<Qr> for Command {
    fn from(q: Qr) -> Self {
        Command::Qr(q)
    }
}

impl From<Vec<Command>> for Command {
    fn from(cmds: Vec<Command>) -> Self {
        Command::Sequence(cmds)
    }
}

/// A run of text set in a stroke face at `em` machine units per em.
#[derive(Debug, Clone)]
pub struct Text {
    face: &'static Face,
    em: i32,
    text: String,
    line_height: i32,
}

impl Text {
    /// Fails on the first character the face cannot draw.
    pub fn new(face: &'static Face, em: i32, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if let Some(ch) = text.chars().find(|&c| c != '\n' && !face.supports(c)) {
            return Err(EngraveError::UnsupportedRune(ch));
        }
        Ok(Self {
            face,
            em,
            text,
            line_height: 1,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Pen advance of the last line and the total line height.
    pub fn measure(&self) -> Point {
        let m = self.face.metrics();
        let mut x = 0;
        let mut lines = 1;
        for ch in self.text.chars() {
            if ch == '\n' {
                x = 0;
                lines += 1;
                continue;
            }
            if let Some(g) = self.face.decode(ch) {
                x += g.advance * self.em / m.height;
            }
        }
        Point::new(x, self.em * self.line_height * lines)
    }

    fn cursor(&self) -> TextCursor<'_> {
        let m = self.face.metrics();
        TextCursor {
            text: self,
            chars: self.text.chars(),
            pen: Point::new(0, (m.ascent * self.em + m.height - 1) / m.height),
            segs: Segments::default(),
            advance: 0,
        }
    }
}

/// A QR symbol engraved as horizontal strokes.
///
/// Every module is `scale` strokes tall and `scale · stroke_width` wide.
#[derive(Debug, Clone)]
pub struct Qr {
    modules: Vec<bool>,
    dim: usize,
    stroke_width: i32,
    scale: i32,
}

impl Qr {
    pub fn new(stroke_width: i32, scale: i32, level: EcLevel, content: &[u8]) -> Result<Self> {
        let code = QrCode::with_error_correction_level(content, level)?;
        let dim = code.width();
        let modules = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();
        Ok(Self {
            modules,
            dim,
            stroke_width,
            scale,
        })
    }

    /// Modules per side.
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn dark(&self, x: i64, y: usize) -> bool {
        usize::try_from(x)
            .ok()
            .filter(|&x| x < self.dim)
            .and_then(|x| self.modules.get(y * self.dim + x))
            .copied()
            .unwrap_or(false)
    }

    fn cursor(&self) -> QrCursor<'_> {
        QrCursor {
            qr: self,
            line: 0,
            x: -1,
            draw: false,
            first_x: 0,
            pending: None,
        }
    }
}

/// Lazy iterator over the instructions of a [`Command`].
pub struct Steps<'a> {
    stack: Vec<Frame<'a>>,
}

#[derive(Debug, Clone, Copy)]
struct Ctx {
    affine: Affine,
    dry: bool,
}

impl Ctx {
    const ROOT: Ctx = Ctx {
        affine: Affine::IDENTITY,
        dry: false,
    };

    fn apply(&self, ins: Instruction) -> Instruction {
        Instruction {
            line: ins.line && !self.dry,
            coord: self.affine.apply(ins.coord),
        }
    }
}

struct Frame<'a> {
    ctx: Ctx,
    kind: FrameKind<'a>,
}

enum FrameKind<'a> {
    Commands(slice::Iter<'a, Command>),
    Text(TextCursor<'a>),
    Qr(QrCursor<'a>),
}

enum Step<'a> {
    Emit(Instruction),
    Enter(&'a Command),
    Done,
}

impl<'a> Steps<'a> {
    fn enter(&mut self, cmd: &'a Command, ctx: Ctx) {
        let (ctx, kind) = match cmd {
            Command::Move(_) | Command::Line(_) => (ctx, FrameKind::Commands(slice::from_ref(cmd).iter())),
            Command::Text(t) => (ctx, FrameKind::Text(t.cursor())),
            Command::Qr(q) => (ctx, FrameKind::Qr(q.cursor())),
            Command::Sequence(cmds) => (ctx, FrameKind::Commands(cmds.iter())),
            Command::Transform(a, inner) => (
                Ctx {
                    affine: ctx.affine.compose(a),
                    dry: ctx.dry,
                },
                FrameKind::Commands(slice::from_ref(inner.as_ref()).iter()),
            ),
            Command::DryRun(inner) => (
                Ctx {
                    affine: ctx.affine,
                    dry: true,
                },
                FrameKind::Commands(slice::from_ref(inner.as_ref()).iter()),
            ),
        };
        self.stack.push(Frame { ctx, kind });
    }
}

impl<'a> Iterator for Steps<'a> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Instruction> {
        loop {
            let frame = self.stack.last_mut()?;
            let ctx = frame.ctx;
            let step = match &mut frame.kind {
                FrameKind::Text(c) => c.next().map_or(Step::Done, Step::Emit),
                FrameKind::Qr(c) => c.next().map_or(Step::Done, Step::Emit),
                FrameKind::Commands(iter) => match iter.next() {
                    None => Step::Done,
                    Some(Command::Move(p)) => Step::Emit(Instruction::move_to(*p)),
                    Some(Command::Line(p)) => Step::Emit(Instruction::line_to(*p)),
                    Some(cmd) => Step::Enter(cmd),
                },
            };
            match step {
                Step::Emit(ins) => return Some(ctx.apply(ins)),
                Step::Enter(cmd) => self.enter(cmd, ctx),
                Step::Done => {
                    self.stack.pop();
                }
            }
        }
    }
}

struct TextCursor<'a> {
    text: &'a Text,
    chars: Chars<'a>,
    pen: Point,
    segs: Segments,
    advance: i32,
}

impl Iterator for TextCursor<'_> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Instruction> {
        let t = self.text;
        let height = t.face.metrics().height;
        loop {
            if let Some(seg) = self.segs.next() {
                let p = self.pen + Point::new(seg.arg.x * t.em / height, seg.arg.y * t.em / height);
                return Some(match seg.op {
                    SegmentOp::MoveTo => Instruction::move_to(p),
                    SegmentOp::LineTo => Instruction::line_to(p),
                });
            }
            self.pen.x += self.advance;
            self.advance = 0;
            let ch = self.chars.next()?;
            if ch == '\n' {
                self.pen.x = 0;
                self.pen.y += t.em * t.line_height;
                continue;
            }
            if let Some(g) = t.face.decode(ch) {
                self.segs = g.segments();
                self.advance = g.advance * t.em / height;
            }
        }
    }
}

// Serpentine scan: even lines run left to right, odd lines right to left,
// each dark run becoming one stroke inset by half the stroke width.
struct QrCursor<'a> {
    qr: &'a Qr,
    line: usize,
    x: i64,
    draw: bool,
    first_x: i64,
    pending: Option<Point>,
}

impl Iterator for QrCursor<'_> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Instruction> {
        let qr = self.qr;
        let dim = qr.dim as i64;
        let scale = qr.scale.max(1) as usize;
        let sw = i64::from(qr.stroke_width);
        let module = i64::from(qr.scale) * sw;
        loop {
            if let Some(end) = self.pending.take() {
                return Some(Instruction::line_to(end));
            }
            if self.line >= qr.dim * scale {
                return None;
            }
            if self.x > dim {
                self.line += 1;
                self.x = -1;
                self.draw = false;
                continue;
            }
            let rev = self.line % 2 != 0;
            let radius = if rev { -(sw / 2) } else { sw / 2 };
            let (xl, px) = if rev {
                let xl = dim - 1 - self.x;
                (xl, xl - 1)
            } else {
                (self.x, self.x)
            };
            self.x += 1;
            let on = qr.dark(px, self.line / scale);
            if !self.draw && on {
                self.draw = true;
                self.first_x = xl;
            } else if self.draw && !on {
                self.draw = false;
                let y = self.line as i64 * sw;
                let start = Point::new((self.first_x * module + radius) as i32, y as i32);
                self.pending = Some(Point::new((xl * module - radius) as i32, y as i32));
                return Some(Instruction::move_to(start));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::MONO;

    fn collect(cmd: &Command) -> Vec<Instruction> {
        cmd.steps().collect()
    }

    #[test]
    fn nested_transforms() {
        let inner = Command::Sequence(vec![
            Command::Move(Point::new(1, 2)),
            Command::Line(Point::new(3, 4)),
        ]);
        let cmd = Command::offset(10, 20, Command::rotate(std::f64::consts::FRAC_PI_2, inner));
        assert_eq!(
            collect(&cmd),
            vec![
                Instruction::move_to(Point::new(8, 21)),
                Instruction::line_to(Point::new(6, 23)),
            ]
        );
    }

    #[test]
    fn dry_run_only_moves() {
        let cmd = Command::Sequence(vec![
            Command::Line(Point::new(1, 1)),
            Command::dry_run(Command::rect(Rect::new(0, 0, 5, 5))),
            Command::Line(Point::new(2, 2)),
        ]);
        let steps = collect(&cmd);
        assert_eq!(steps.len(), 7);
        assert!(steps[0].line);
        assert!(steps[1..6].iter().all(|s| !s.line));
        assert!(steps[6].line);
    }

    #[test]
    fn text_layout() {
        let em = 120;
        let t = Text::new(&MONO, em, "L-").unwrap();
        let steps = collect(&Command::from(t.clone()));
        // Baseline at ceil(10 * 120 / 12) = 100, one unit is 10.
        assert_eq!(steps[0], Instruction::move_to(Point::new(0, 10)));
        assert_eq!(steps[1], Instruction::line_to(Point::new(0, 100)));
        assert_eq!(steps[2], Instruction::line_to(Point::new(60, 100)));
        assert_eq!(steps[3], Instruction::move_to(Point::new(90, 60)));
        assert_eq!(steps[4], Instruction::line_to(Point::new(130, 60)));
        assert_eq!(t.measure(), Point::new(160, 120));
    }

    #[test]
    fn text_newlines() {
        let t = Text::new(&MONO, 12, "1\n2").unwrap();
        assert_eq!(t.measure(), Point::new(8, 24));
        let last = collect(&Command::from(t)).last().copied().unwrap();
        assert_eq!(last, Instruction::line_to(Point::new(6, 22)));
    }

    #[test]
    fn text_rejects_unsupported() {
        assert!(matches!(
            Text::new(&MONO, 10, "ok"),
            Err(EngraveError::UnsupportedRune('o'))
        ));
    }

    #[test]
    fn qr_strokes_cover_dark_modules() {
        let sw = 10;
        let scale = 2;
        let qr = Qr::new(sw, scale, EcLevel::L, b"HAMMER").unwrap();
        let dim = qr.dim();
        let steps = collect(&Command::from(qr.clone()));
        assert!(!steps.is_empty());
        assert_eq!(steps.len() % 2, 0);

        let module = (scale * sw) as i64;
        let mut covered = vec![false; dim * dim];
        for pair in steps.chunks(2) {
            let (start, end) = (pair[0], pair[1]);
            assert!(!start.line && end.line);
            assert_eq!(start.coord.y, end.coord.y);
            let line = (start.coord.y / sw) as usize;
            let y = line / scale as usize;
            let (lo, hi) = if start.coord.x < end.coord.x {
                (start.coord.x, end.coord.x)
            } else {
                (end.coord.x, start.coord.x)
            };
            // Strokes are inset by half the stroke width on both ends.
            let first = (i64::from(lo) - i64::from(sw / 2)) / module;
            let last = (i64::from(hi) + i64::from(sw / 2)) / module;
            for x in first..last {
                assert!(qr.dark(x, y), "stroke over light module {x},{y}");
                covered[y * dim + x as usize] = true;
            }
        }
        for y in 0..dim {
            for x in 0..dim {
                assert_eq!(covered[y * dim + x], qr.dark(x as i64, y), "module {x},{y}");
            }
        }
    }

    #[test]
    fn qr_alternates_direction() {
        let qr = Qr::new(10, 1, EcLevel::L, b"A").unwrap();
        let steps = collect(&Command::from(qr));
        // The top row of a finder pattern is a dark run from the left edge.
        assert_eq!(steps[0], Instruction::move_to(Point::new(5, 0)));
        assert_eq!(steps[1], Instruction::line_to(Point::new(65, 0)));
        let second: Vec<_> = steps.iter().filter(|s| s.coord.y == 10).collect();
        assert!(second[0].coord.x > second[1].coord.x);
    }

    #[test]
    fn affine_compose_matches_nesting() {
        let a = Affine::offset(3, -2);
        let b = Affine::rotation(-std::f64::consts::FRAC_PI_2);
        let p = Point::new(5, 7);
        assert_eq!(a.compose(&b).apply(p), a.apply(b.apply(p)));
        assert_eq!(Affine::IDENTITY.compose(&a), a);
    }
}
