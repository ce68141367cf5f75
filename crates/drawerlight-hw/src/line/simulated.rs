//! In-memory GPIO bank for headless mode and tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::OutputLine;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct BankState {
    levels: HashMap<u32, bool>,
    failing: HashSet<u32>,
    history: Vec<(u32, bool)>,
}

/// Shared set of simulated channels.
///
/// Lines handed out by [`SimulatedBank::line`] write into the bank, so the
/// bank can be inspected after the lines have been moved into a controller.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBank {
    state: Arc<Mutex<BankState>>,
}

impl SimulatedBank {
    /// Creates an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BankState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a line handle for `channel`.
    pub fn line(&self, channel: u32) -> SimulatedLine {
        SimulatedLine {
            channel,
            bank: self.clone(),
        }
    }

    /// Current level of a configured channel.
    pub fn level(&self, channel: u32) -> Option<bool> {
        self.lock().levels.get(&channel).copied()
    }

    /// Makes every subsequent operation on `channel` fail (or succeed again).
    pub fn set_failing(&self, channel: u32, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing.insert(channel);
        } else {
            state.failing.remove(&channel);
        }
    }

    /// Every successful write in order, as `(channel, on)`.
    pub fn history(&self) -> Vec<(u32, bool)> {
        self.lock().history.clone()
    }

    /// Number of channels currently claimed.
    pub fn configured_count(&self) -> usize {
        self.lock().levels.len()
    }

    fn check(&self, state: &BankState, channel: u32) -> Result<()> {
        if state.failing.contains(&channel) {
            return Err(Error::gpio(
                channel,
                io::Error::other("simulated failure"),
            ));
        }
        Ok(())
    }
}

/// One channel of a [`SimulatedBank`].
#[derive(Debug)]
pub struct SimulatedLine {
    channel: u32,
    bank: SimulatedBank,
}

impl OutputLine for SimulatedLine {
    fn channel(&self) -> u32 {
        self.channel
    }

    fn configure_output(&mut self) -> Result<()> {
        let mut state = self.bank.lock();
        self.bank.check(&state, self.channel)?;
        state.levels.insert(self.channel, false);
        Ok(())
    }

    fn write(&mut self, on: bool) -> Result<()> {
        let mut state = self.bank.lock();
        self.bank.check(&state, self.channel)?;
        if !state.levels.contains_key(&self.channel) {
            return Err(Error::gpio(
                self.channel,
                io::Error::new(io::ErrorKind::NotConnected, "channel not configured"),
            ));
        }
        state.levels.insert(self.channel, on);
        state.history.push((self.channel, on));
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let mut state = self.bank.lock();
        self.bank.check(&state, self.channel)?;
        state.levels.remove(&self.channel);
        Ok(())
    }
}
