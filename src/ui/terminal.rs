//! Terminal setup and restoration.

use std::io::{self, Stdout};

use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::{Terminal, TerminalOptions, Viewport};

use crate::error::{Result, UiError};

/// Rows reserved below the prompt: blank, status, blank, help, trailing blank
pub const INLINE_HEIGHT: u16 = 5;

pub type MonitorTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Raw-mode inline terminal, restored on drop
pub struct TerminalGuard {
    terminal: MonitorTerminal,
}

impl TerminalGuard {
    pub fn new() -> Result<Self> {
        if !atty::is(atty::Stream::Stdout) {
            return Err(UiError::InitializationError("stdout is not a terminal".to_string()).into());
        }

        terminal::enable_raw_mode()
            .map_err(|e| UiError::InitializationError(format!("cannot enable raw mode: {e}")))?;

        let options = TerminalOptions {
            viewport: Viewport::Inline(INLINE_HEIGHT),
        };
        match Terminal::with_options(CrosstermBackend::new(io::stdout()), options) {
            Ok(mut terminal) => {
                let _ = terminal.hide_cursor();
                Ok(Self { terminal })
            }
            Err(e) => {
                let _ = terminal::disable_raw_mode();
                Err(UiError::InitializationError(e.to_string()).into())
            }
        }
    }

    pub fn terminal_mut(&mut self) -> &mut MonitorTerminal {
        &mut self.terminal
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Restore terminal state
        let _ = terminal::disable_raw_mode();
        let _ = self.terminal.show_cursor();
    }
}
