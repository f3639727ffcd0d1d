//! Application state management for the TUI.
//!
//! The state only changes through [`App::update`], a pure transition from
//! `(state, message)` to `(state, effect)`. Effects are carried out by the
//! event loop.

use crossterm::event::KeyEvent;

use crate::poller::PollGate;
use crate::reading::PollResult;

/// Spinner animation frames
pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Instruction line shown under the reading
pub const HELP_TEXT: &str = "Press any key to exit";

/// Shown until the first result arrives
pub const WAITING_TEXT: &str = "Waiting for first reading...";

/// Messages consumed by the event loop
#[derive(Debug)]
pub enum Message {
    /// Advance the spinner
    Tick,
    /// Outcome of one poll
    Polled(PollResult),
    /// A key was pressed
    Key(KeyEvent),
    /// The process was asked to terminate
    Shutdown,
}

/// What the event loop must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Re-arm the poller with the given gate
    SchedulePoll(PollGate),
    /// Stop the loop after a final render
    Quit,
}

/// Application state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct App {
    /// Most recent surfaced poll result
    last_result: Option<PollResult>,
    /// Whether a reading has ever been received
    has_reading: bool,
    /// Current spinner frame index
    spinner_frame: usize,
    /// Whether the application is shutting down
    quitting: bool,
}

impl App {
    /// Initial state and the effect that arms the first poll
    pub fn init() -> (Self, Effect) {
        let app = Self::default();
        let gate = app.next_gate();
        (app, Effect::SchedulePoll(gate))
    }

    /// Apply one message.
    pub fn update(mut self, message: Message) -> (Self, Effect) {
        if self.quitting {
            return (self, Effect::None);
        }

        match message {
            Message::Key(key) => {
                tracing::info!("Key {:?} pressed, quitting", key.code);
                self.quitting = true;
                (self, Effect::Quit)
            }
            Message::Shutdown => {
                tracing::info!("Shutdown requested, quitting");
                self.quitting = true;
                (self, Effect::Quit)
            }
            Message::Tick => {
                self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
                (self, Effect::None)
            }
            Message::Polled(result) => {
                let gate = match result {
                    Err(ref e) if !e.is_surfaced() => {
                        if self.has_reading {
                            PollGate::AfterInterval
                        } else {
                            PollGate::NextPulse
                        }
                    }
                    result => {
                        self.has_reading |= result.is_ok();
                        self.last_result = Some(result);
                        self.next_gate()
                    }
                };
                (self, Effect::SchedulePoll(gate))
            }
        }
    }

    /// Gate for the next poll: immediate until a reading has been received
    pub fn next_gate(&self) -> PollGate {
        if !self.has_reading {
            PollGate::Immediate
        } else {
            PollGate::AfterInterval
        }
    }

    pub fn has_reading(&self) -> bool {
        self.has_reading
    }

    pub fn last_result(&self) -> Option<&PollResult> {
        self.last_result.as_ref()
    }

    pub fn spinner_frame(&self) -> usize {
        self.spinner_frame
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    pub fn spinner_glyph(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame() % SPINNER_FRAMES.len()]
    }

    /// Error message or formatted reading
    pub fn status_text(&self) -> String {
        match &self.last_result {
            None => WAITING_TEXT.to_string(),
            Some(Ok(reading)) => reading.summary(),
            Some(Err(e)) => e.to_string(),
        }
    }

    /// Whether the status line shows an error
    pub fn has_error(&self) -> bool {
        matches!(self.last_result, Some(Err(_)))
    }

    /// Plain-text rendering of the whole view
    pub fn view(&self) -> String {
        let mut s = format!(
            "\n {} {} \n\n {}\n",
            self.spinner_glyph(),
            self.status_text(),
            HELP_TEXT
        );
        if self.quitting {
            s.push('\n');
        }
        s
    }
}
