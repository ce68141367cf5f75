//! Configuration management.

use anyhow::{Context, Result};
use drawerlight_hw::{line::SYSFS_GPIO_ROOT, DEFAULT_CHANNELS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address (e.g., "0.0.0.0:5000")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Drawer record file
    #[serde(default = "default_data_file")]
    pub data_file: String,

    /// GPIO configuration
    #[serde(default)]
    pub gpio: GpioConfig,

    /// Web UI configuration
    #[serde(default)]
    pub web: WebConfig,

    /// D-Bus configuration
    #[serde(default)]
    pub dbus: DbusConfig,
}

/// Which output line backend drives the LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackend {
    /// Sysfs when the GPIO root exists, simulated otherwise.
    #[default]
    Auto,
    /// Linux sysfs GPIO.
    Sysfs,
    /// In-memory lines (headless).
    Simulated,
}

/// GPIO configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    #[serde(default)]
    pub backend: GpioBackend,

    /// Sysfs GPIO root
    #[serde(default = "default_gpio_root")]
    pub root: String,

    /// Drive the pin low to light the LED (LED anode tied to the supply)
    #[serde(default)]
    pub active_low: bool,

    /// Channel catalog, assigned to drawers in row-major order
    #[serde(default = "default_channels")]
    pub channels: Vec<u32>,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: GpioBackend::default(),
            root: default_gpio_root(),
            active_low: false,
            channels: default_channels(),
        }
    }
}

/// Web UI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

/// D-Bus bus selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbusBusType {
    /// Try the session bus first, fall back to the system bus.
    #[default]
    Auto,
    Session,
    System,
}

/// D-Bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbusConfig {
    #[serde(default = "default_true")]
    pub enable: bool,

    #[serde(default)]
    pub bus: DbusBusType,
}

impl Default for DbusConfig {
    fn default() -> Self {
        Self {
            enable: true,
            bus: DbusBusType::default(),
        }
    }
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_data_file() -> String {
    "drawers.json".to_string()
}

fn default_gpio_root() -> String {
    SYSFS_GPIO_ROOT.to_string()
}

fn default_channels() -> Vec<u32> {
    DEFAULT_CHANNELS.to_vec()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults when the file is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            warn!(
                "Configuration file {:?} not found, using defaults",
                path.as_ref()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_file: default_data_file(),
            gpio: GpioConfig::default(),
            web: WebConfig::default(),
            dbus: DbusConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.listen, "0.0.0.0:5000");
        assert_eq!(config.gpio.backend, GpioBackend::Auto);
        assert_eq!(config.gpio.channels, DEFAULT_CHANNELS);
        assert!(config.web.enable);
        assert_eq!(config.dbus.bus, DbusBusType::Auto);
    }

    #[test]
    fn test_partial_gpio_section() {
        let config: Config = toml::from_str(
            r#"
            data_file = "/var/lib/drawerlight/drawers.json"

            [gpio]
            backend = "simulated"
            active_low = true
            channels = [5, 6, 13]
            "#,
        )
        .unwrap();
        assert_eq!(config.gpio.backend, GpioBackend::Simulated);
        assert!(config.gpio.active_low);
        assert_eq!(config.gpio.channels, [5, 6, 13]);
        assert_eq!(config.gpio.root, "/sys/class/gpio");
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default("/nonexistent/drawerlight.toml").unwrap();
        assert_eq!(config.data_file, "drawers.json");
    }
}
