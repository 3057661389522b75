//! Hammer Engrave - Engraving plans for metal seed backups
//!
//! Plates are described as [`Command`] trees in machine units: text in the
//! built-in stroke font, QR symbols drawn as serpentine strokes, and affine
//! placement. The trees stream lazily into any [`Sink`], be it the engraver
//! driver, the bounding-box [`Measure`] or the preview [`Rasterizer`].

pub mod backup;
pub mod command;
pub mod error;
pub mod font;
pub mod measure;
pub mod raster;

pub use backup::{Descriptor, PlateSize, Seed};
pub use command::{Affine, Command, Instruction, Params, Point, Qr, Rect, Steps, Text};
pub use error::{EngraveError, Result};
pub use font::{Face, MONO};
pub use measure::{measure, Measure, Sink};
pub use qrcode::EcLevel;
pub use raster::Rasterizer;
