//! Serialized owner of the indicator lines.
//!
//! All hardware writes go through one mutex so two writes never interleave
//! on the bank. The on/off table lives behind its own lock and is only
//! updated while the write lock is held, which lets readers take a
//! snapshot without waiting on GPIO.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::{Coordinate, Error, OutputLine, PinMap, Result, DRAWER_COUNT};

type Slots = Vec<Option<Box<dyn OutputLine>>>;

/// Outcome of [`LineController::teardown`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    /// Lines released without error.
    pub released: usize,
    /// `(channel, message)` for every step that failed.
    pub failures: Vec<(u32, String)>,
}

impl TeardownReport {
    /// True when every line was released cleanly.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Indicator matrix controller.
pub struct LineController {
    pin_map: PinMap,
    slots: Mutex<Slots>,
    state: RwLock<[bool; DRAWER_COUNT]>,
}

impl LineController {
    /// Creates a controller, opening one line per assigned coordinate.
    ///
    /// Lines are not touched until [`LineController::initialize`].
    pub fn new<F>(pin_map: PinMap, mut open: F) -> Self
    where
        F: FnMut(u32) -> Box<dyn OutputLine>,
    {
        let mut slots: Slots = (0..DRAWER_COUNT).map(|_| None).collect();
        for (coord, channel) in pin_map.assigned() {
            slots[coord.index()] = Some(open(channel));
        }

        Self {
            pin_map,
            slots: Mutex::new(slots),
            state: RwLock::new([false; DRAWER_COUNT]),
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, coord: Coordinate, value: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner)[coord.index()] = value;
    }

    /// Configures every assigned line as an output and drives it off.
    ///
    /// Safe to call again; all lines are re-driven off. Every line is
    /// attempted and the first failure is returned.
    pub fn initialize(&self) -> Result<()> {
        let mut slots = self.lock_slots();
        let mut first_err = None;

        for (coord, _) in self.pin_map.assigned() {
            let Some(line) = slots[coord.index()].as_mut() else {
                continue;
            };
            let result = line.configure_output().and_then(|_| line.write(false));
            if let Err(e) = result {
                warn!("Failed to initialize drawer {}: {}", coord, e);
                first_err.get_or_insert(e);
            }
        }

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = [false; DRAWER_COUNT];
        drop(slots);

        match first_err {
            Some(e) => Err(e),
            None => {
                info!("Initialized {} LED lines", self.pin_map.assigned_count());
                Ok(())
            }
        }
    }

    /// Writes one line. Caller holds the slot lock.
    fn write_locked(&self, slots: &mut Slots, coord: Coordinate, value: bool) -> Result<bool> {
        let channel = self
            .pin_map
            .channel(coord)
            .ok_or(Error::NotAssigned(coord))?;
        let line = slots[coord.index()].as_mut().ok_or_else(|| {
            Error::gpio(
                channel,
                io::Error::new(io::ErrorKind::NotConnected, "line released"),
            )
        })?;

        line.write(value)?;
        self.store(coord, value);
        debug!("Drawer {} (GPIO {}) -> {}", coord, channel, value);
        Ok(value)
    }

    /// Drives one drawer's indicator and returns the applied value.
    pub fn set_state(&self, coord: Coordinate, value: bool) -> Result<bool> {
        if self.pin_map.channel(coord).is_none() {
            return Err(Error::NotAssigned(coord));
        }
        let mut slots = self.lock_slots();
        self.write_locked(&mut slots, coord, value)
    }

    /// Current state of one drawer. Unassigned drawers always read false.
    pub fn get_state(&self, coord: Coordinate) -> bool {
        self.state.read().unwrap_or_else(PoisonError::into_inner)[coord.index()]
    }

    /// Inverts one drawer's indicator and returns the new value.
    pub fn toggle(&self, coord: Coordinate) -> Result<bool> {
        if self.pin_map.channel(coord).is_none() {
            return Err(Error::NotAssigned(coord));
        }
        let mut slots = self.lock_slots();
        let current = self.get_state(coord);
        self.write_locked(&mut slots, coord, !current)
    }

    /// Drives every assigned indicator to `value`.
    ///
    /// Every line is attempted under a single acquisition of the write lock,
    /// so concurrent calls resolve last-writer-wins. The first failure is
    /// returned.
    pub fn set_all(&self, value: bool) -> Result<()> {
        let mut slots = self.lock_slots();
        let mut first_err = None;
        for (coord, _) in self.pin_map.assigned() {
            if let Err(e) = self.write_locked(&mut slots, coord, value) {
                warn!("Failed to set drawer {}: {}", coord, e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// State of every drawer in row-major order.
    pub fn snapshot(&self) -> Vec<(Coordinate, bool)> {
        let state = *self.state.read().unwrap_or_else(PoisonError::into_inner);
        Coordinate::all().map(|c| (c, state[c.index()])).collect()
    }

    /// The pin assignment this controller was built from.
    pub fn pin_map(&self) -> &PinMap {
        &self.pin_map
    }

    /// Number of drawers with a physical line.
    pub fn assigned_count(&self) -> usize {
        self.pin_map.assigned_count()
    }

    /// Channel driving `coord`, if it has one.
    pub fn line_for(&self, coord: Coordinate) -> Option<u32> {
        self.pin_map.channel(coord)
    }

    /// Drives every line off and releases it.
    ///
    /// Failures are logged and collected; they never abort the teardown.
    /// Writes after teardown fail with a GPIO error.
    pub fn teardown(&self) -> TeardownReport {
        let mut slots = self.lock_slots();
        let mut report = TeardownReport::default();

        for slot in slots.iter_mut() {
            let Some(mut line) = slot.take() else {
                continue;
            };
            let channel = line.channel();
            let result = line.write(false).and_then(|_| line.release());
            match result {
                Ok(()) => report.released += 1,
                Err(e) => {
                    warn!("Failed to release GPIO {}: {}", channel, e);
                    report.failures.push((channel, e.to_string()));
                }
            }
        }

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = [false; DRAWER_COUNT];
        info!(
            "Released {} LED lines ({} failures)",
            report.released,
            report.failures.len()
        );
        report
    }
}
