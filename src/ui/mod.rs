//! Terminal UI module using ratatui.
//!
//! This module provides the inline terminal view of the latest reading,
//! its state machine and keyboard input.

pub mod app;
pub mod input;
pub mod terminal;
pub mod widgets;

pub use app::{App, Effect, Message};
pub use input::run_input_reader;
pub use terminal::TerminalGuard;
