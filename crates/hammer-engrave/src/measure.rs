//! Instruction sinks and bounding boxes

use crate::command::{Command, Instruction, Point, Rect};

/// Consumer of engraving instructions in machine units.
pub trait Sink {
    fn move_to(&mut self, p: Point);

    fn line_to(&mut self, p: Point);

    fn instruction(&mut self, ins: Instruction) {
        if ins.line {
            self.line_to(ins.coord)
        } else {
            self.move_to(ins.coord)
        }
    }
}

/// Feed every instruction of `plan` into `sink`.
pub fn replay<S: Sink + ?Sized>(plan: impl IntoIterator<Item = Instruction>, sink: &mut S) {
    for ins in plan {
        sink.instruction(ins);
    }
}

/// Bounds of the engraved lines. Moves alone do not count.
#[derive(Debug, Default)]
pub struct Measure {
    pen: Point,
    bounds: Option<Rect>,
}

impl Measure {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bounds, or the zero rectangle when nothing was engraved.
    pub fn bounds(&self) -> Rect {
        self.bounds.unwrap_or_default()
    }

    fn expand(&mut self, p: Point) {
        let b = self.bounds.get_or_insert(Rect { min: p, max: p });
        b.min.x = b.min.x.min(p.x);
        b.min.y = b.min.y.min(p.y);
        b.max.x = b.max.x.max(p.x);
        b.max.y = b.max.y.max(p.y);
    }
}

impl Sink for Measure {
    fn move_to(&mut self, p: Point) {
        self.pen = p;
    }

    fn line_to(&mut self, p: Point) {
        let from = self.pen;
        self.expand(from);
        self.expand(p);
        self.pen = p;
    }
}

pub fn measure(cmd: &Command) -> Rect {
    let mut m = Measure::new();
    replay(cmd.steps(), &mut m);
    m.bounds()
}

/// Translate `cmd` so its bounds start at the origin, returning the size.
pub fn normalize(cmd: Command) -> (Command, Point) {
    let b = measure(&cmd);
    (Command::offset(-b.min.x, -b.min.y, cmd), b.size())
}
