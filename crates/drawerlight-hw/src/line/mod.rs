//! Output line backends.
//!
//! Each indicator LED hangs off one GPIO channel. The controller only talks
//! to the [`OutputLine`] trait so the same logic runs against sysfs GPIO on
//! the Pi and against the in-memory bank when no GPIO is present.

mod simulated;
mod sysfs;

pub use simulated::{SimulatedBank, SimulatedLine};
pub use sysfs::{SysfsLine, SYSFS_GPIO_ROOT};

use crate::Result;

/// A single physical output channel.
pub trait OutputLine: Send {
    /// Returns the channel number (BCM numbering on a Pi).
    fn channel(&self) -> u32;

    /// Claims the channel and configures it as an output driven off.
    fn configure_output(&mut self) -> Result<()>;

    /// Drives the indicator on or off.
    fn write(&mut self, on: bool) -> Result<()>;

    /// Returns the channel to the system.
    fn release(&mut self) -> Result<()>;
}
