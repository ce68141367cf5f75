//! D-Bus client library for communicating with the drawerlight daemon.

use anyhow::{Context, Result};
use tracing::debug;
use zbus::{names::BusName, proxy, Connection};

/// Well-known bus name of the daemon.
pub const SERVICE_NAME: &str = "org.drawerlight.Daemon";

/// D-Bus bus type selection.
#[derive(Debug, Clone, Copy, Default)]
pub enum BusType {
    /// Session bus (user session).
    Session,
    /// System bus (system-wide).
    System,
    /// Try session first, fall back to system.
    #[default]
    Auto,
}

/// D-Bus proxy for the drawerlight daemon.
#[proxy(
    interface = "org.drawerlight.Daemon1",
    default_service = "org.drawerlight.Daemon",
    default_path = "/org/drawerlight/Daemon"
)]
trait Daemon1 {
    /// Toggles a drawer LED, returning the new state.
    fn toggle(&self, drawer: &str) -> zbus::Result<bool>;

    /// Forces a drawer LED on or off.
    fn set_state(&self, drawer: &str, on: bool) -> zbus::Result<bool>;

    /// Reads a drawer LED.
    fn get_state(&self, drawer: &str) -> zbus::Result<bool>;

    /// Switches every LED on or off.
    fn set_all(&self, on: bool) -> zbus::Result<()>;

    /// Starts the diagnostic sweep.
    fn run_diagnostic(&self) -> zbus::Result<()>;

    /// Cancels the diagnostic sweep.
    fn stop_diagnostic(&self) -> zbus::Result<bool>;

    /// Searches drawers and toggles the matches.
    fn highlight(&self, query: &str) -> zbus::Result<Vec<(String, bool)>>;

    /// Returns (drawer, state) for every drawer.
    fn get_led_states(&self) -> zbus::Result<Vec<(String, bool)>>;

    /// Shuts down the daemon.
    fn quit(&self) -> zbus::Result<()>;

    /// Number of drawers with an LED.
    #[zbus(property)]
    fn assigned_lines(&self) -> zbus::Result<u32>;

    /// Current diagnostic phase.
    #[zbus(property)]
    fn diagnostic_phase(&self) -> zbus::Result<String>;

    /// Active LED backend.
    #[zbus(property)]
    fn backend(&self) -> zbus::Result<String>;
}

/// D-Bus client wrapper for the daemon.
pub struct DaemonClient {
    proxy: Daemon1Proxy<'static>,
}

impl DaemonClient {
    /// Connects with auto bus detection.
    pub async fn connect() -> Result<Self> {
        Self::connect_with_bus(BusType::Auto).await
    }

    /// Connects to the daemon on the given bus.
    pub async fn connect_with_bus(bus_type: BusType) -> Result<Self> {
        let connection = match bus_type {
            BusType::Session => {
                debug!("Connecting to session bus");
                Connection::session()
                    .await
                    .context("Failed to connect to session bus")?
            }
            BusType::System => {
                debug!("Connecting to system bus");
                Connection::system()
                    .await
                    .context("Failed to connect to system bus")?
            }
            BusType::Auto => {
                // Prefer whichever bus actually has the daemon
                if let Ok(conn) = Connection::session().await {
                    if Self::service_exists(&conn).await {
                        debug!("Found daemon on session bus");
                        conn
                    } else {
                        debug!("Daemon not on session bus, trying system bus");
                        let sys_conn = Connection::system()
                            .await
                            .context("Failed to connect to system bus")?;
                        if !Self::service_exists(&sys_conn).await {
                            anyhow::bail!(
                                "Daemon service not found on session or system bus. Is drawerlightd running?"
                            );
                        }
                        debug!("Found daemon on system bus");
                        sys_conn
                    }
                } else {
                    debug!("Session bus unavailable, trying system bus");
                    Connection::system()
                        .await
                        .context("Failed to connect to any D-Bus")?
                }
            }
        };

        let proxy = Daemon1Proxy::new(&connection)
            .await
            .context("Failed to create D-Bus proxy")?;

        Ok(Self { proxy })
    }

    async fn service_exists(conn: &Connection) -> bool {
        use zbus::fdo::DBusProxy;
        let Ok(name) = BusName::try_from(SERVICE_NAME) else {
            return false;
        };
        match DBusProxy::new(conn).await {
            Ok(dbus_proxy) => dbus_proxy.name_has_owner(name).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Toggles a drawer LED.
    pub async fn toggle(&self, drawer: &str) -> Result<bool> {
        self.proxy
            .toggle(drawer)
            .await
            .with_context(|| format!("Failed to toggle drawer {}", drawer))
    }

    /// Forces a drawer LED on or off.
    pub async fn set_state(&self, drawer: &str, on: bool) -> Result<bool> {
        self.proxy
            .set_state(drawer, on)
            .await
            .with_context(|| format!("Failed to set drawer {}", drawer))
    }

    /// Reads a drawer LED.
    pub async fn get_state(&self, drawer: &str) -> Result<bool> {
        self.proxy
            .get_state(drawer)
            .await
            .with_context(|| format!("Failed to read drawer {}", drawer))
    }

    /// Switches every LED on or off.
    pub async fn set_all(&self, on: bool) -> Result<()> {
        self.proxy
            .set_all(on)
            .await
            .context("Failed to set all LEDs via D-Bus")
    }

    /// Starts the diagnostic sweep.
    pub async fn run_diagnostic(&self) -> Result<()> {
        self.proxy
            .run_diagnostic()
            .await
            .context("Failed to start diagnostic via D-Bus")
    }

    /// Cancels the diagnostic sweep. Returns false if none was running.
    pub async fn stop_diagnostic(&self) -> Result<bool> {
        self.proxy
            .stop_diagnostic()
            .await
            .context("Failed to stop diagnostic via D-Bus")
    }

    /// Searches drawers and toggles every match.
    pub async fn highlight(&self, query: &str) -> Result<Vec<(String, bool)>> {
        self.proxy
            .highlight(query)
            .await
            .context("Failed to highlight via D-Bus")
    }

    /// Returns (drawer, state) for every drawer.
    pub async fn get_led_states(&self) -> Result<Vec<(String, bool)>> {
        self.proxy
            .get_led_states()
            .await
            .context("Failed to get LED states via D-Bus")
    }

    /// Shuts down the daemon.
    pub async fn quit(&self) -> Result<()> {
        self.proxy
            .quit()
            .await
            .context("Failed to quit daemon via D-Bus")
    }

    /// Number of drawers with an LED.
    pub async fn assigned_lines(&self) -> Result<u32> {
        self.proxy
            .assigned_lines()
            .await
            .context("Failed to get assigned lines via D-Bus")
    }

    /// Current diagnostic phase.
    pub async fn diagnostic_phase(&self) -> Result<String> {
        self.proxy
            .diagnostic_phase()
            .await
            .context("Failed to get diagnostic phase via D-Bus")
    }

    /// Active LED backend.
    pub async fn backend(&self) -> Result<String> {
        self.proxy
            .backend()
            .await
            .context("Failed to get backend via D-Bus")
    }
}
