//! Input handling for the TUI.
//!
//! Terminal events are read asynchronously and translated into event loop
//! messages. Any key press ends the program.

use crossterm::event::{Event, EventStream, KeyEventKind};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::app::Message;

/// Translate a terminal event into a message, if it is one we react to.
///
/// Only presses count; release and repeat events reported by terminals with
/// keyboard enhancement are ignored.
pub fn map_event(event: Event) -> Option<Message> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(Message::Key(key)),
        _ => None,
    }
}

/// Spawn-able loop forwarding key presses from the terminal.
pub async fn run_input_reader(events: mpsc::UnboundedSender<Message>, cancel: CancellationToken) {
    let mut stream = EventStream::new();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                if let Some(message) = map_event(event) {
                    if events.send(message).is_err() {
                        break;
                    }
                }
            }
            Some(Err(e)) => {
                tracing::error!("Failed to read terminal input: {}", e);
                break;
            }
            None => break,
        }
    }

    tracing::debug!("Input reader stopped");
}
