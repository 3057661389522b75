//! Driver options

use std::path::{Path, PathBuf};

use hammer_engrave::Point;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

/// Configuration directory under the platform config dir
const CONFIG_DIR_NAME: &str = "hammer";

/// Configuration file name
const CONFIG_FILE_NAME: &str = "driver.json";

const DEFAULT_MOVE_SPEED: f32 = 0.5;
const DEFAULT_PRINT_SPEED: f32 = 0.1;

/// Fastest and slowest raw speed values.
const RAW_FASTEST: f32 = 30.0;
const RAW_SLOWEST: f32 = 1000.0;

/// Needle position in machine units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl From<Position> for Point {
    fn from(p: Position) -> Self {
        Point::new(p.x, p.y)
    }
}

/// Engraving speeds and parking position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    /// Needle-up speed in [0,1], 1 being fastest
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,

    /// Engraving speed in [0,1], 1 being fastest
    #[serde(default = "default_print_speed")]
    pub print_speed: f32,

    /// Where to park after engraving; the safe point and home otherwise
    #[serde(default)]
    pub end: Option<Position>,
}

fn default_move_speed() -> f32 {
    DEFAULT_MOVE_SPEED
}

fn default_print_speed() -> f32 {
    DEFAULT_PRINT_SPEED
}

impl Default for Options {
    fn default() -> Self {
        Self {
            move_speed: DEFAULT_MOVE_SPEED,
            print_speed: DEFAULT_PRINT_SPEED,
            end: None,
        }
    }
}

impl Options {
    /// Default options file, `<config dir>/hammer/driver.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load and validate options from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let opts: Self = serde_json::from_str(&content)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("move_speed", self.move_speed), ("print_speed", self.print_speed)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(DriverError::InvalidOptions(format!(
                    "{name} {v} outside [0,1]"
                )));
            }
        }
        if let Some(end) = self.end {
            if !(0..=0xff_ffff).contains(&end.x) || !(0..=0xff_ffff).contains(&end.y) {
                return Err(DriverError::InvalidOptions(format!(
                    "end point ({}, {}) out of range",
                    end.x, end.y
                )));
            }
        }
        Ok(())
    }

    pub fn raw_move_speed(&self) -> u16 {
        raw_speed(self.move_speed)
    }

    pub fn raw_print_speed(&self) -> u16 {
        raw_speed(self.print_speed)
    }
}

/// Map a [0,1] speed onto the machine's [1000,30] range.
pub fn raw_speed(s: f32) -> u16 {
    let s = s.clamp(0.0, 1.0);
    (s * RAW_FASTEST + (1.0 - s) * RAW_SLOWEST).round() as u16
}
