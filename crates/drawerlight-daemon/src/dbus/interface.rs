//! D-Bus interface implementation using zbus.
//!
//! Provides the `org.drawerlight.Daemon1` interface.

use std::sync::Arc;

use drawerlight_hw::Error as HwError;
use tracing::{debug, info, warn};
use zbus::{interface, Connection};

use crate::config::DbusBusType;
use crate::state::AppState;

/// Maps hardware errors onto D-Bus errors.
fn to_fdo(e: HwError) -> zbus::fdo::Error {
    match e {
        HwError::NotAssigned(_) | HwError::InvalidCoordinate(_) => {
            zbus::fdo::Error::InvalidArgs(e.to_string())
        }
        _ => zbus::fdo::Error::Failed(e.to_string()),
    }
}

/// D-Bus interface implementation for the drawerlight daemon.
pub struct Daemon1Interface {
    state: Arc<AppState>,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
}

impl Daemon1Interface {
    /// Creates a new D-Bus interface.
    pub fn new(state: Arc<AppState>, shutdown_tx: tokio::sync::mpsc::Sender<()>) -> Self {
        Self { state, shutdown_tx }
    }
}

#[interface(name = "org.drawerlight.Daemon1")]
impl Daemon1Interface {
    /// Toggles one drawer's LED and returns the new state.
    fn toggle(&self, drawer: &str) -> zbus::fdo::Result<bool> {
        let on = self.state.toggle(drawer).map_err(to_fdo)?;
        debug!("D-Bus: Toggle({}) -> {}", drawer, on);
        Ok(on)
    }

    /// Forces one drawer's LED on or off.
    fn set_state(&self, drawer: &str, on: bool) -> zbus::fdo::Result<bool> {
        let on = self.state.set_state(drawer, on).map_err(to_fdo)?;
        debug!("D-Bus: SetState({}, {})", drawer, on);
        Ok(on)
    }

    /// Reads one drawer's LED.
    fn get_state(&self, drawer: &str) -> zbus::fdo::Result<bool> {
        self.state.get_state(drawer).map_err(to_fdo)
    }

    /// Switches every LED on or off.
    fn set_all(&self, on: bool) -> zbus::fdo::Result<()> {
        self.state.set_all(on).map_err(to_fdo)?;
        debug!("D-Bus: SetAll({})", on);
        Ok(())
    }

    /// Starts the diagnostic sweep.
    fn run_diagnostic(&self) -> zbus::fdo::Result<()> {
        self.state.run_diagnostic().map_err(to_fdo)?;
        debug!("D-Bus: RunDiagnostic");
        Ok(())
    }

    /// Cancels the diagnostic sweep. Returns false if none was running.
    fn stop_diagnostic(&self) -> bool {
        self.state.stop_diagnostic()
    }

    /// Searches drawers and toggles each match.
    /// Returns (drawer, new state) for every toggled LED.
    fn highlight(&self, query: &str) -> Vec<(String, bool)> {
        let outcome = self.state.highlight(query);
        debug!(
            "D-Bus: Highlight({}) -> {} matches",
            query,
            outcome.results.len()
        );
        outcome.toggled.into_iter().collect()
    }

    /// Returns (drawer, state) for every drawer.
    fn get_led_states(&self) -> Vec<(String, bool)> {
        self.state.led_states().into_iter().collect()
    }

    /// Shuts down the daemon.
    async fn quit(&self) -> zbus::fdo::Result<()> {
        info!("D-Bus: Quit requested");
        self.shutdown_tx
            .send(())
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok(())
    }

    // Properties

    /// Number of drawers with an LED.
    #[zbus(property)]
    fn assigned_lines(&self) -> u32 {
        self.state.led_count() as u32
    }

    /// Current diagnostic phase.
    #[zbus(property)]
    fn diagnostic_phase(&self) -> String {
        self.state.diagnostic_phase().to_string()
    }

    /// Active LED backend (sysfs or simulated).
    #[zbus(property)]
    fn backend(&self) -> String {
        self.state.backend().to_string()
    }
}

/// Connects to the appropriate D-Bus bus based on configuration.
async fn connect_to_bus(bus_type: DbusBusType) -> anyhow::Result<(Connection, &'static str)> {
    match bus_type {
        DbusBusType::Session => {
            let conn = Connection::session()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to session bus: {}", e))?;
            Ok((conn, "session"))
        }
        DbusBusType::System => {
            let conn = Connection::system()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to system bus: {}", e))?;
            Ok((conn, "system"))
        }
        DbusBusType::Auto => match Connection::session().await {
            Ok(conn) => Ok((conn, "session")),
            Err(session_err) => {
                warn!(
                    "Session bus unavailable ({}), trying system bus",
                    session_err
                );
                let conn = Connection::system().await.map_err(|system_err| {
                    anyhow::anyhow!(
                        "Failed to connect to any D-Bus: session={}, system={}",
                        session_err,
                        system_err
                    )
                })?;
                Ok((conn, "system"))
            }
        },
    }
}

/// Runs the D-Bus server.
pub async fn run_dbus_server(
    state: Arc<AppState>,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
    bus_type: DbusBusType,
) -> anyhow::Result<Connection> {
    let interface = Daemon1Interface::new(state, shutdown_tx);

    let (connection, bus_name) = connect_to_bus(bus_type).await?;

    connection
        .object_server()
        .at("/org/drawerlight/Daemon", interface)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to register object: {}", e))?;

    connection
        .request_name("org.drawerlight.Daemon")
        .await
        .map_err(|e| anyhow::anyhow!("Failed to request bus name: {}", e))?;

    info!(
        "D-Bus service registered at org.drawerlight.Daemon on {} bus",
        bus_name
    );
    Ok(connection)
}
