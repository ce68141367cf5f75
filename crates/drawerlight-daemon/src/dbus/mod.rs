//! D-Bus interface for the drawerlight daemon.
//!
//! Provides the `org.drawerlight.Daemon1` interface on the session or system bus.

mod interface;

pub use interface::run_dbus_server;
