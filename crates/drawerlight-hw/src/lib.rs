//! Drawerlight Hardware Library
//!
//! Provides hardware abstraction for the per-drawer indicator matrix of a
//! parts cabinet: coordinate mapping, GPIO output lines, a serialized line
//! controller and the diagnostic sweep sequencer.

pub mod controller;
pub mod coordinate;
pub mod error;
pub mod line;
pub mod pinmap;
pub mod sequencer;

pub use controller::{LineController, TeardownReport};
pub use coordinate::Coordinate;
pub use error::{Error, Result};
pub use line::{OutputLine, SimulatedBank, SimulatedLine, SysfsLine};
pub use pinmap::PinMap;
pub use sequencer::{SequencePhase, Sequencer};

/// Cabinet dimensions
pub const ROWS: u8 = 8;
pub const COLS: u8 = 4;

/// Rows that carry an indicator line. Row 8 is wired without LEDs.
pub const LED_ROWS: u8 = 7;

/// Total number of drawer slots.
pub const DRAWER_COUNT: usize = ROWS as usize * COLS as usize;

/// Default BCM channel catalog, assigned in row-major order.
pub const DEFAULT_CHANNELS: [u32; 28] = [
    2, 3, 4, 14, 15, 18, 17, 27, 22, 23, 24, 10, 9, 25, 11, 8, 7, 1, 12, 16, 20, 21, 19, 26, 13,
    6, 5, 0,
];
