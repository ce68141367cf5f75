//! Linux sysfs GPIO backend (`/sys/class/gpio`).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::OutputLine;
use crate::{Error, Result};

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// GPIO output driven through the sysfs interface.
pub struct SysfsLine {
    channel: u32,
    root: PathBuf,
    active_low: bool,
    exported: bool,
}

impl SysfsLine {
    /// Creates a line handle. Nothing is touched until [`OutputLine::configure_output`].
    pub fn new<P: AsRef<Path>>(root: P, channel: u32, active_low: bool) -> Self {
        Self {
            channel,
            root: root.as_ref().to_path_buf(),
            active_low,
            exported: false,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.channel))
    }

    fn level(&self, on: bool) -> bool {
        on != self.active_low
    }

    fn write_attr(&self, path: &Path, value: &str) -> Result<()> {
        fs::write(path, value).map_err(|e| Error::gpio(self.channel, e))
    }
}

impl OutputLine for SysfsLine {
    fn channel(&self) -> u32 {
        self.channel
    }

    fn configure_output(&mut self) -> Result<()> {
        if !self.pin_dir().exists() {
            match fs::write(self.root.join("export"), self.channel.to_string()) {
                Ok(()) => self.exported = true,
                // Already exported by someone else
                Err(e) if e.kind() == ErrorKind::ResourceBusy => {}
                Err(e) => return Err(Error::gpio(self.channel, e)),
            }
        }

        // "low"/"high" set the direction and the initial level in one write
        let initial = if self.level(false) { "high" } else { "low" };
        self.write_attr(&self.pin_dir().join("direction"), initial)?;
        debug!("GPIO {} configured as output ({})", self.channel, initial);
        Ok(())
    }

    fn write(&mut self, on: bool) -> Result<()> {
        let value = if self.level(on) { "1" } else { "0" };
        self.write_attr(&self.pin_dir().join("value"), value)
    }

    fn release(&mut self) -> Result<()> {
        if !self.exported {
            return Ok(());
        }
        self.write_attr(&self.root.join("unexport"), &self.channel.to_string())?;
        self.exported = false;
        debug!("GPIO {} unexported", self.channel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_root(channels: &[u32]) -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        for ch in channels {
            fs::create_dir(dir.path().join(format!("gpio{}", ch))).unwrap();
        }
        dir
    }

    fn read(dir: &TempDir, rel: &str) -> String {
        fs::read_to_string(dir.path().join(rel)).unwrap()
    }

    #[test]
    fn test_configure_and_write() {
        let root = fake_root(&[17]);
        let mut line = SysfsLine::new(root.path(), 17, false);
        line.configure_output().unwrap();
        assert_eq!(read(&root, "gpio17/direction"), "low");

        line.write(true).unwrap();
        assert_eq!(read(&root, "gpio17/value"), "1");
        line.write(false).unwrap();
        assert_eq!(read(&root, "gpio17/value"), "0");
    }

    #[test]
    fn test_active_low_inverts_levels() {
        let root = fake_root(&[4]);
        let mut line = SysfsLine::new(root.path(), 4, true);
        line.configure_output().unwrap();
        assert_eq!(read(&root, "gpio4/direction"), "high");
        line.write(true).unwrap();
        assert_eq!(read(&root, "gpio4/value"), "0");
    }

    #[test]
    fn test_preexported_line_is_not_unexported() {
        let root = fake_root(&[22]);
        let mut line = SysfsLine::new(root.path(), 22, false);
        line.configure_output().unwrap();
        line.release().unwrap();
        assert!(!root.path().join("unexport").exists());
    }

    #[test]
    fn test_missing_root_reports_channel() {
        let mut line = SysfsLine::new("/nonexistent/gpio", 9, false);
        match line.configure_output() {
            Err(Error::Gpio { channel, .. }) => assert_eq!(channel, 9),
            other => panic!("expected GPIO error, got {:?}", other),
        }
    }
}
