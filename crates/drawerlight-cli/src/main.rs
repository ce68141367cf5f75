//! Drawerlight Control Tool
//!
//! CLI for controlling the drawerlight daemon via D-Bus.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drawerlight_client::{BusType, DaemonClient};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum CliBusType {
    /// Try session bus first, fall back to system bus
    #[default]
    Auto,
    /// Use session bus (for user services)
    Session,
    /// Use system bus (for system services)
    System,
}

impl From<CliBusType> for BusType {
    fn from(bus: CliBusType) -> Self {
        match bus {
            CliBusType::Auto => BusType::Auto,
            CliBusType::Session => BusType::Session,
            CliBusType::System => BusType::System,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        self == Switch::On
    }
}

#[derive(Parser)]
#[command(name = "drawerlightctl")]
#[command(about = "Control tool for the drawerlight daemon")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// D-Bus bus type to use
    #[arg(long, default_value = "auto", value_enum)]
    bus: CliBusType,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drawer LED commands
    Led {
        #[command(subcommand)]
        action: LedCommands,
    },
    /// Diagnostic sweep commands
    Diagnostic {
        #[command(subcommand)]
        action: DiagnosticCommands,
    },
    /// Search drawers and toggle the LED of every match
    Highlight {
        /// Text to look for in drawer names, items and notes
        query: String,
    },
    /// Daemon control commands
    Daemon {
        #[command(subcommand)]
        action: DaemonCommands,
    },
}

#[derive(Subcommand)]
enum LedCommands {
    /// Toggle one drawer's LED
    Toggle {
        /// Drawer as row-col (e.g., 3-2)
        drawer: String,
    },
    /// Force one drawer's LED on or off
    Set {
        /// Drawer as row-col (e.g., 3-2)
        drawer: String,
        #[arg(value_enum)]
        state: Switch,
    },
    /// Switch every LED on or off
    All {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Show one drawer's LED
    Get {
        /// Drawer as row-col (e.g., 3-2)
        drawer: String,
    },
    /// Show every LED
    Status,
}

#[derive(Subcommand)]
enum DiagnosticCommands {
    /// Start the diagnostic sweep
    Start,
    /// Stop a running sweep
    Stop,
    /// Show the current phase
    Status,
}

#[derive(Subcommand)]
enum DaemonCommands {
    /// Check if daemon is running
    Status,
    /// Request daemon shutdown
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!("Using {:?} bus", cli.bus);
    let client = DaemonClient::connect_with_bus(cli.bus.into())
        .await
        .context("Failed to connect to daemon. Is drawerlightd running?")?;

    match cli.command {
        Commands::Led { action } => handle_led(action, &client).await,
        Commands::Diagnostic { action } => handle_diagnostic(action, &client).await,
        Commands::Highlight { query } => handle_highlight(&query, &client).await,
        Commands::Daemon { action } => handle_daemon(action, &client).await,
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

async fn handle_led(action: LedCommands, client: &DaemonClient) -> Result<()> {
    match action {
        LedCommands::Toggle { drawer } => {
            let on = client.toggle(&drawer).await?;
            println!("Drawer {}: {}", drawer, on_off(on));
        }
        LedCommands::Set { drawer, state } => {
            let on = client.set_state(&drawer, state.is_on()).await?;
            println!("Drawer {}: {}", drawer, on_off(on));
        }
        LedCommands::All { state } => {
            client.set_all(state.is_on()).await?;
            println!("All LEDs {}", on_off(state.is_on()));
        }
        LedCommands::Get { drawer } => {
            let on = client.get_state(&drawer).await?;
            println!("Drawer {}: {}", drawer, on_off(on));
        }
        LedCommands::Status => {
            let states = client.get_led_states().await?;
            let lit = states.iter().filter(|(_, on)| *on).count();
            println!("LED Status ({} of {} on):", lit, states.len());
            for (drawer, on) in states {
                println!("  {}: {}", drawer, on_off(on));
            }
        }
    }

    Ok(())
}

async fn handle_diagnostic(action: DiagnosticCommands, client: &DaemonClient) -> Result<()> {
    match action {
        DiagnosticCommands::Start => {
            client.run_diagnostic().await?;
            println!("Diagnostic sweep started");
        }
        DiagnosticCommands::Stop => {
            if client.stop_diagnostic().await? {
                println!("Diagnostic sweep stopped");
            } else {
                println!("No diagnostic sweep running");
            }
        }
        DiagnosticCommands::Status => {
            let phase = client.diagnostic_phase().await?;
            println!("Diagnostic phase: {}", phase);
        }
    }

    Ok(())
}

async fn handle_highlight(query: &str, client: &DaemonClient) -> Result<()> {
    let toggled = client.highlight(query).await?;
    if toggled.is_empty() {
        println!("No drawer LEDs matched '{}'", query);
    } else {
        for (drawer, on) in toggled {
            println!("  {}: {}", drawer, on_off(on));
        }
    }
    Ok(())
}

async fn handle_daemon(action: DaemonCommands, client: &DaemonClient) -> Result<()> {
    match action {
        DaemonCommands::Status => {
            let lines = client.assigned_lines().await?;
            let backend = client.backend().await?;
            let phase = client.diagnostic_phase().await?;
            println!("Daemon: running");
            println!("  Backend: {}", backend);
            println!("  LED lines: {}", lines);
            println!("  Diagnostic: {}", phase);
        }
        DaemonCommands::Quit => {
            client.quit().await?;
            println!("Shutdown request sent to daemon");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_led_all() {
        let cli = Cli::try_parse_from(["drawerlightctl", "led", "all", "on"]).unwrap();
        match cli.command {
            Commands::Led {
                action: LedCommands::All { state },
            } => assert_eq!(state, Switch::On),
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_switch() {
        assert!(Cli::try_parse_from(["drawerlightctl", "led", "all", "dim"]).is_err());
    }

    #[test]
    fn test_parse_highlight_with_bus() {
        let cli =
            Cli::try_parse_from(["drawerlightctl", "--bus", "system", "highlight", "resistor"])
                .unwrap();
        assert!(matches!(cli.bus, CliBusType::System));
        match cli.command {
            Commands::Highlight { query } => assert_eq!(query, "resistor"),
            _ => panic!("unexpected command"),
        }
    }
}
