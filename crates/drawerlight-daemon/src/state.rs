//! Application state management.

use anyhow::{Context, Result};
use drawerlight_hw::{
    Coordinate, Error as HwError, LineController, OutputLine, PinMap, SequencePhase, Sequencer,
    SimulatedBank, SysfsLine, TeardownReport,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, GpioBackend, GpioConfig};
use crate::store::{self, DrawerSet, DrawerStore, SearchHit, StoreError};

/// Snapshot reported by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub success: bool,
    pub status: &'static str,
    pub led_count: usize,
    pub led_states: BTreeMap<String, bool>,
    pub sequence: String,
    pub backend: &'static str,
    pub timestamp: String,
}

/// Result of a highlight request.
#[derive(Debug, Clone, Serialize)]
pub struct HighlightOutcome {
    pub results: Vec<SearchHit>,
    /// New state of every line that was toggled.
    pub toggled: BTreeMap<String, bool>,
}

/// A timestamped export of the drawer records.
pub struct Export {
    pub filename: String,
    pub body: Vec<u8>,
}

/// Shared application state.
pub struct AppState {
    /// LED line owner
    controller: Arc<LineController>,

    /// Diagnostic sweep runner
    sequencer: Sequencer,

    /// Drawer record persistence
    store: DrawerStore,

    /// Name of the active line backend
    backend: &'static str,
}

/// Builds a controller from `open` and initializes it.
fn init_controller<F>(pin_map: &PinMap, open: F) -> Result<Arc<LineController>, HwError>
where
    F: FnMut(u32) -> Box<dyn OutputLine>,
{
    let controller = LineController::new(pin_map.clone(), open);
    if let Err(e) = controller.initialize() {
        let report = controller.teardown();
        if !report.is_clean() {
            warn!("{} lines could not be released", report.failures.len());
        }
        return Err(e);
    }
    Ok(Arc::new(controller))
}

fn open_sysfs(pin_map: &PinMap, gpio: &GpioConfig) -> Result<Arc<LineController>, HwError> {
    let root = gpio.root.clone();
    let active_low = gpio.active_low;
    init_controller(pin_map, move |ch| {
        Box::new(SysfsLine::new(&root, ch, active_low))
    })
}

fn open_simulated(pin_map: &PinMap) -> Result<Arc<LineController>, HwError> {
    let bank = SimulatedBank::new();
    init_controller(pin_map, move |ch| Box::new(bank.line(ch)))
}

/// Opens the configured backend. `auto` falls back to headless mode.
fn open_controller(gpio: &GpioConfig) -> Result<(Arc<LineController>, &'static str)> {
    let pin_map = PinMap::build(&gpio.channels);

    match gpio.backend {
        GpioBackend::Sysfs => {
            let controller = open_sysfs(&pin_map, gpio).context("Failed to open sysfs GPIO")?;
            Ok((controller, "sysfs"))
        }
        GpioBackend::Simulated => Ok((open_simulated(&pin_map)?, "simulated")),
        GpioBackend::Auto => {
            if Path::new(&gpio.root).exists() {
                match open_sysfs(&pin_map, gpio) {
                    Ok(controller) => return Ok((controller, "sysfs")),
                    Err(e) => warn!("GPIO unavailable: {}. Running in headless mode.", e),
                }
            } else {
                warn!(
                    "GPIO root {} not found. Running in headless mode.",
                    gpio.root
                );
            }
            Ok((open_simulated(&pin_map)?, "simulated"))
        }
    }
}

impl AppState {
    /// Creates a new application state.
    pub fn new(config: &Config) -> Result<Self> {
        let (controller, backend) = open_controller(&config.gpio)?;
        info!(
            "LED backend: {} ({} lines)",
            backend,
            controller.assigned_count()
        );
        log_pin_table(controller.pin_map());

        let sequencer = Sequencer::new(controller.clone());
        let store = DrawerStore::new(&config.data_file);
        info!("Drawer data file: {:?}", store.path());

        Ok(Self {
            controller,
            sequencer,
            store,
            backend,
        })
    }

    /// Name of the active line backend.
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Number of drawers with an LED.
    pub fn led_count(&self) -> usize {
        self.controller.assigned_count()
    }

    /// Toggles one drawer's LED.
    pub fn toggle(&self, id: &str) -> Result<bool, HwError> {
        let coord: Coordinate = id.parse()?;
        let state = self.controller.toggle(coord)?;
        info!("LED {} toggled {}", coord, if state { "on" } else { "off" });
        Ok(state)
    }

    /// Forces one drawer's LED on or off.
    pub fn set_state(&self, id: &str, on: bool) -> Result<bool, HwError> {
        let coord: Coordinate = id.parse()?;
        self.controller.set_state(coord, on)
    }

    /// Reads one drawer's LED.
    pub fn get_state(&self, id: &str) -> Result<bool, HwError> {
        let coord: Coordinate = id.parse()?;
        Ok(self.controller.get_state(coord))
    }

    /// Drives every LED on or off.
    pub fn set_all(&self, on: bool) -> Result<(), HwError> {
        self.controller.set_all(on)?;
        info!("All LEDs {}", if on { "on" } else { "off" });
        Ok(())
    }

    /// State of every drawer keyed by id.
    pub fn led_states(&self) -> BTreeMap<String, bool> {
        self.controller
            .snapshot()
            .into_iter()
            .map(|(c, on)| (c.to_string(), on))
            .collect()
    }

    /// Starts the diagnostic sweep in the background.
    pub fn run_diagnostic(&self) -> Result<(), HwError> {
        self.sequencer.start()
    }

    /// Cancels a running sweep. Returns false if none was running.
    pub fn stop_diagnostic(&self) -> bool {
        self.sequencer.cancel()
    }

    /// Current sweep phase.
    pub fn diagnostic_phase(&self) -> SequencePhase {
        self.sequencer.phase()
    }

    /// Status snapshot.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            success: true,
            status: "online",
            led_count: self.led_count(),
            led_states: self.led_states(),
            sequence: self.diagnostic_phase().to_string(),
            backend: self.backend,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Loads all drawer records.
    pub fn drawers(&self) -> DrawerSet {
        self.store.load()
    }

    /// Replaces all drawer records.
    pub fn replace_drawers(&self, drawers: &DrawerSet) -> Result<(), StoreError> {
        self.store.save(drawers)
    }

    /// Serializes the records for download, named by the current time.
    pub fn export(&self) -> Result<Export> {
        let drawers = self.store.load();
        let body = serde_json::to_vec_pretty(&drawers).context("Failed to serialize drawers")?;
        let filename = format!(
            "drawers_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        Ok(Export { filename, body })
    }

    /// Searches drawer records.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        store::search(&self.store.load(), query)
    }

    /// Searches and toggles the LED of every matching drawer.
    ///
    /// This toggles rather than forcing the LEDs on, so repeating a search
    /// flips its drawers back off and overlapping searches can leave lit
    /// drawers that no longer match. Drawers without an LED are reported
    /// but not touched.
    pub fn highlight(&self, query: &str) -> HighlightOutcome {
        let results = self.search(query);
        let mut toggled = BTreeMap::new();

        for hit in &results {
            let Ok(coord) = Coordinate::new(hit.row, hit.col) else {
                continue;
            };
            match self.controller.toggle(coord) {
                Ok(state) => {
                    toggled.insert(coord.to_string(), state);
                }
                Err(HwError::NotAssigned(_)) => {}
                Err(e) => warn!("Failed to highlight drawer {}: {}", coord, e),
            }
        }

        info!(
            "Highlight '{}': {} matches, {} LEDs toggled",
            query,
            results.len(),
            toggled.len()
        );
        HighlightOutcome { results, toggled }
    }

    /// Stops any sweep and releases the GPIO lines.
    pub async fn shutdown(&self) -> TeardownReport {
        self.sequencer.shutdown().await;
        let report = self.controller.teardown();
        for (channel, message) in &report.failures {
            warn!("GPIO {} teardown: {}", channel, message);
        }
        report
    }
}

/// Logs the drawer to GPIO assignment, one line per row.
fn log_pin_table(pin_map: &PinMap) {
    let mut rows: BTreeMap<u8, Vec<String>> = BTreeMap::new();
    for (coord, channel) in pin_map.assigned() {
        rows.entry(coord.row())
            .or_default()
            .push(format!("{}: GPIO {}", coord, channel));
    }
    for entries in rows.values() {
        info!("  {}", entries.join(" | "));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::GpioConfig;
    use crate::store::DrawerRecord;
    use tempfile::TempDir;

    pub(crate) fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = Config {
            data_file: dir
                .path()
                .join("drawers.json")
                .to_string_lossy()
                .to_string(),
            gpio: GpioConfig {
                backend: GpioBackend::Simulated,
                ..GpioConfig::default()
            },
            ..Config::default()
        };
        (AppState::new(&config).expect("state"), dir)
    }

    fn record(id: &str, name: &str, items: &[&str]) -> DrawerRecord {
        let coord: Coordinate = id.parse().unwrap();
        DrawerRecord {
            name: name.to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
            ..DrawerRecord::empty(coord)
        }
    }

    #[test]
    fn test_toggle_and_status() {
        let (state, _dir) = test_state();
        assert!(state.toggle("1-1").unwrap());
        let status = state.status();
        assert_eq!(status.led_count, 28);
        assert_eq!(status.led_states.len(), 32);
        assert!(status.led_states["1-1"]);
        assert_eq!(status.sequence, "idle");
        assert_eq!(status.backend, "simulated");
    }

    #[test]
    fn test_invalid_and_unassigned_ids() {
        let (state, _dir) = test_state();
        assert!(matches!(
            state.toggle("9-9"),
            Err(HwError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            state.set_state("8-2", true),
            Err(HwError::NotAssigned(_))
        ));
        assert!(!state.get_state("8-2").unwrap());
    }

    #[test]
    fn test_highlight_toggles_matches() {
        let (state, _dir) = test_state();
        let mut drawers = store::default_set();
        drawers.insert("1-1".into(), record("1-1", "LEDs", &["red 5mm x20"]));
        drawers.insert("3-2".into(), record("3-2", "Resistors", &["220R red-red-brown"]));
        drawers.insert("8-1".into(), record("8-1", "Spare red wire", &[]));
        state.replace_drawers(&drawers).unwrap();

        let outcome = state.highlight("red");
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.toggled.len(), 2);
        assert!(state.get_state("1-1").unwrap());
        assert!(state.get_state("3-2").unwrap());

        // a repeated search toggles them back off
        let again = state.highlight("red");
        assert_eq!(again.toggled.get("1-1"), Some(&false));
        assert!(!state.get_state("3-2").unwrap());
    }

    #[test]
    fn test_export_names_file_by_timestamp() {
        let (state, _dir) = test_state();
        let export = state.export().unwrap();
        assert!(export.filename.starts_with("drawers_"));
        assert!(export.filename.ends_with(".json"));
        let parsed: DrawerSet = serde_json::from_slice(&export.body).unwrap();
        assert_eq!(parsed.len(), 32);
    }

    #[tokio::test]
    async fn test_shutdown_releases_lines() {
        let (state, _dir) = test_state();
        state.set_all(true).unwrap();
        let report = state.shutdown().await;
        assert_eq!(report.released, 28);
        assert!(report.is_clean());
        assert!(state.led_states().values().all(|on| !on));
    }
}
