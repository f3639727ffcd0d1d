//! Custom error types for the co2-monitor application.
//!
//! This module defines domain-specific error types using thiserror,
//! providing clear error messages and proper error context propagation.

use thiserror::Error;

/// Errors produced by a single poll of the readings endpoint.
///
/// Poll errors are data: they are rendered in place of the last reading and
/// never terminate the UI loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollError {
    /// Network, DNS, connect, timeout or body read failure
    #[error("Error: {0}")]
    Transport(String),

    /// The endpoint answered 200 but the body was not a valid reading
    #[error("Error: {0}")]
    Decode(String),

    /// Any status other than 200. Not surfaced to the user.
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
}

impl PollError {
    /// Build a transport error from any error, keeping its source chain.
    pub fn transport(err: &(dyn std::error::Error + 'static)) -> Self {
        PollError::Transport(error_chain(err))
    }

    /// HTTP-like status attached to the error, if any.
    ///
    /// Decode failures are tagged as server-class errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            PollError::Transport(_) => None,
            PollError::Decode(_) => Some(500),
            PollError::UnexpectedStatus(code) => Some(*code),
        }
    }

    /// Whether this outcome should replace the currently displayed result.
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, PollError::UnexpectedStatus(_))
    }
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        PollError::transport(&err)
    }
}

/// Join an error and all of its sources with `": "`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Errors related to application configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Errors related to the UI
#[derive(Debug, Error)]
pub enum UiError {
    #[error("Terminal initialization failed: {0}")]
    InitializationError(String),

    #[error("Terminal rendering failed: {0}")]
    RenderError(String),
}

/// Errors related to the background tasks
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Signal handling error: {0}")]
    SignalError(String),

    #[error("Logging setup failed: {0}")]
    LoggingError(String),
}

/// Application-level errors that can wrap other error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("UI error: {0}")]
    Ui(#[from] UiError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
