//! co2-monitor: shows the latest CO2 reading from a remote endpoint.
//!
//! Startup:
//! 1. Parses the command line and reads `.env` plus the process environment.
//! 2. Loads and validates the configuration.
//! 3. Sets up logging; warnings reach the console until the UI starts.
//! 4. Runs the inline terminal UI until a key is pressed.
//!
//! Exits with status 1 and `could not start program: <error>` if the terminal
//! UI cannot be started.

use std::sync::Arc;

use anyhow::{Context, Result};

mod cli;
mod config;
mod error;
mod logging;
mod poller;
mod reading;
mod service;
mod ui;

use cli::Cli;
use config::{AppConfig, EnvVars};
use poller::HttpPoller;
use service::Monitor;
use ui::TerminalGuard;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let env = EnvVars::load(&cli.env_file);
    let mut config = AppConfig::load(&cli.config, &env)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    config.apply_cli_overrides(&cli)?;

    let (log_target, console) = logging::init(&config.logging)?;
    tracing::info!("co2-monitor {} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Logging to {:?}", log_target);

    for warning in env.warnings() {
        tracing::warn!("{}", warning);
    }
    if !env.dotenv_loaded() {
        tracing::warn!("Error loading .env file {}", cli.env_file);
    }
    if config.api_key().is_none() {
        tracing::warn!("X_API_KEY is not set, polling unauthenticated");
    }

    let poller = HttpPoller::from_config(&config).context("failed to create HTTP client")?;
    tracing::info!("Polling {}", poller.endpoint());

    console.release();

    let mut guard = match TerminalGuard::new() {
        Ok(guard) => guard,
        Err(e) => {
            tracing::error!("Terminal UI failed to start: {}", e);
            println!("could not start program: {e}");
            std::process::exit(1);
        }
    };

    let monitor = Monitor::new(Arc::new(config), Arc::new(poller))
        .with_terminal_input()
        .with_signal_handling();

    let result = monitor.run(guard.terminal_mut()).await;
    drop(guard);

    match result {
        Ok(_) => {
            tracing::info!("co2-monitor stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Terminal UI failed: {}", e);
            println!("could not start program: {e}");
            std::process::exit(1);
        }
    }
}
