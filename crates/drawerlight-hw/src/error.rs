//! Error types for the drawerlight hardware library.

use thiserror::Error;

use crate::Coordinate;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when driving the indicator matrix.
#[derive(Error, Debug)]
pub enum Error {
    /// The coordinate has no physical line (e.g. every drawer in row 8).
    #[error("Drawer {0} has no assigned LED line")]
    NotAssigned(Coordinate),

    /// A drawer id could not be parsed or lies outside the cabinet.
    #[error("Invalid drawer id: {0}")]
    InvalidCoordinate(String),

    /// GPIO access failed.
    #[error("GPIO {channel} error: {source}")]
    Gpio {
        channel: u32,
        #[source]
        source: std::io::Error,
    },

    /// A diagnostic sequence is already running.
    #[error("Diagnostic sequence already running")]
    SequenceRunning,
}

impl Error {
    /// Wraps an I/O error raised while touching a GPIO channel.
    pub fn gpio(channel: u32, source: std::io::Error) -> Self {
        Error::Gpio { channel, source }
    }
}
