//! Command-line interface argument parsing.
//!
//! Every flag is optional; with none given the monitor runs from the
//! configuration file and environment alone.

use gumdrop::Options;

/// Default configuration file, read if present
pub const DEFAULT_CONFIG_PATH: &str = "co2-monitor.toml";

/// Default environment file, read if present
pub const DEFAULT_ENV_FILE: &str = ".env";

/// co2-monitor: show the latest CO2 reading from a remote sensor endpoint
#[derive(Debug, Options)]
pub struct Cli {
    /// Print help message
    #[options(help = "print help message")]
    pub help: bool,

    /// Path to configuration file
    #[options(
        short = "c",
        help = "path to configuration file",
        meta = "PATH",
        default = "co2-monitor.toml"
    )]
    pub config: String,

    /// Path to the .env file
    #[options(
        short = "e",
        help = "path to .env file",
        meta = "PATH",
        default = ".env"
    )]
    pub env_file: String,

    /// Endpoint to poll (overrides config file and API_URL)
    #[options(short = "u", help = "endpoint to poll", meta = "URL")]
    pub url: Option<String>,

    /// Poll interval in seconds (overrides config file)
    #[options(short = "i", help = "seconds between polls", meta = "SECS")]
    pub interval: Option<u64>,

    /// Log level filter
    #[options(short = "l", help = "log level (trace, debug, info, warn, error)", meta = "LEVEL")]
    pub log_level: Option<String>,

    /// Log file path
    #[options(no_short, help = "append logs to this file", meta = "PATH")]
    pub log_file: Option<String>,
}

impl Cli {
    /// Parse command-line arguments, exiting on `--help` or bad input
    pub fn parse_args() -> Self {
        Self::parse_args_default_or_exit()
    }
}
