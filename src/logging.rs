//! Tracing subscriber setup.
//!
//! The terminal belongs to the UI, so events never go to stdout: they are
//! appended to the configured log file, or written to stderr when stderr is
//! redirected away from the terminal. Until the UI takes the screen, warnings
//! are also echoed to the console through a [`ConsoleHandoff`].

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, EitherWriter, MakeWriterExt};

use crate::config::LoggingConfig;
use crate::error::{Result, ServiceError};

/// Where log events end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(String),
    Stderr,
    /// Interactive terminal: warnings reach the console only before the UI
    /// starts
    Console,
}

impl LogTarget {
    /// Pick the log destination for `config`.
    pub fn select(config: &LoggingConfig, stderr_is_tty: bool) -> Self {
        match &config.file {
            Some(path) if !path.trim().is_empty() => LogTarget::File(path.clone()),
            _ if !stderr_is_tty => LogTarget::Stderr,
            _ => LogTarget::Console,
        }
    }
}

/// Stderr writer that goes quiet once the UI owns the terminal
#[derive(Debug, Clone, Default)]
pub struct ConsoleHandoff {
    released: Arc<AtomicBool>,
}

impl ConsoleHandoff {
    /// Stop writing to the console. Call before the UI starts drawing.
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl<'a> MakeWriter<'a> for ConsoleHandoff {
    type Writer = EitherWriter<io::Stderr, io::Sink>;

    fn make_writer(&'a self) -> Self::Writer {
        if self.is_released() {
            EitherWriter::B(io::sink())
        } else {
            EitherWriter::A(io::stderr())
        }
    }
}

/// Build the level filter, accepting either a bare level or a full
/// `EnvFilter` directive string.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| ServiceError::LoggingError(format!("invalid log level {level:?}: {e}")).into())
}

/// Install the global subscriber.
///
/// The returned handoff must be released before the terminal UI starts.
pub fn init(config: &LoggingConfig) -> Result<(LogTarget, ConsoleHandoff)> {
    let target = LogTarget::select(config, atty::is(atty::Stream::Stderr));
    let filter = build_filter(&config.level)?;
    let console = ConsoleHandoff::default();

    let writer = match &target {
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(
                Mutex::new(file).and(console.clone().with_max_level(Level::WARN)),
            )
        }
        LogTarget::Stderr => BoxMakeWriter::new(io::stderr),
        LogTarget::Console => BoxMakeWriter::new(console.clone().with_max_level(Level::WARN)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| ServiceError::LoggingError(e.to_string()))?;

    Ok((target, console))
}
