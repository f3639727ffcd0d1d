//! Service layer tying the producers to the event loop.
//!
//! The spinner ticker, pulse generator, poller, and optionally the keyboard
//! reader and signal listener run as tasks in one [`JoinSet`], all feeding a
//! single channel. The event loop is the only consumer and the only place
//! state changes. When it ends every task is cancelled and joined.

use futures_util::StreamExt;
use ratatui::{Terminal, backend::Backend};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::error::{Result, ServiceError, UiError};
use crate::poller::{self, PollGate, ReadingSource};
use crate::ui::{self, App, Effect, Message};

/// Polls a reading source and shows the result until asked to quit
pub struct Monitor<S: ?Sized> {
    config: Arc<AppConfig>,
    source: Arc<S>,
    events_tx: mpsc::UnboundedSender<Message>,
    events_rx: mpsc::UnboundedReceiver<Message>,
    terminal_input: bool,
    signals: bool,
}

impl<S: ReadingSource + ?Sized + 'static> Monitor<S> {
    /// Create a monitor without keyboard or signal producers
    pub fn new(config: Arc<AppConfig>, source: Arc<S>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            source,
            events_tx,
            events_rx,
            terminal_input: false,
            signals: false,
        }
    }

    /// Read key presses from the real terminal
    pub fn with_terminal_input(mut self) -> Self {
        self.terminal_input = true;
        self
    }

    /// Turn SIGINT, SIGTERM and SIGHUP into a shutdown
    pub fn with_signal_handling(mut self) -> Self {
        self.signals = true;
        self
    }

    /// Extra producer handle for the event stream
    #[cfg(test)]
    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.events_tx.clone()
    }

    /// Run until the user quits; returns the final state.
    pub async fn run<B: Backend>(self, terminal: &mut Terminal<B>) -> Result<App> {
        let Monitor {
            config,
            source,
            events_tx,
            mut events_rx,
            terminal_input,
            signals,
        } = self;

        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();
        let (pulse_tx, pulse_rx) = mpsc::channel(1);

        tasks.spawn(run_spinner_ticker(
            config.ui.spinner_period(),
            events_tx.clone(),
            cancel.clone(),
        ));
        tasks.spawn(poller::run_pulse_generator(
            config.poll.pulse_period(),
            pulse_tx,
            cancel.clone(),
        ));
        tasks.spawn(poller::run_poller(
            source,
            config.poll.interval(),
            poll_rx,
            pulse_rx,
            events_tx.clone(),
            cancel.clone(),
        ));

        if terminal_input {
            tasks.spawn(ui::run_input_reader(events_tx.clone(), cancel.clone()));
        }

        if signals {
            let events = events_tx.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                if let Err(e) = run_signal_listener(events, cancel).await {
                    tracing::error!("{}", e);
                }
            });
        }

        // Only producers hold senders from here on.
        drop(events_tx);

        let (app, effect) = App::init();
        let result = event_loop(terminal, app, effect, &mut events_rx, &poll_tx).await;

        cancel.cancel();
        tasks.shutdown().await;
        tracing::info!("All tasks stopped");

        result
    }
}

/// Consume messages until a transition asks to quit.
///
/// Renders before waiting for each message and once more after quitting.
pub async fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    initial: Effect,
    events: &mut mpsc::UnboundedReceiver<Message>,
    polls: &mpsc::UnboundedSender<PollGate>,
) -> Result<App> {
    apply(initial, polls);

    loop {
        draw(terminal, &app)?;

        let Some(message) = events.recv().await else {
            tracing::warn!("All event producers stopped");
            break;
        };

        let (next, effect) = app.update(message);
        app = next;

        if effect == Effect::Quit {
            draw(terminal, &app)?;
            break;
        }
        apply(effect, polls);
    }

    Ok(app)
}

fn apply(effect: Effect, polls: &mpsc::UnboundedSender<PollGate>) {
    if let Effect::SchedulePoll(gate) = effect {
        if polls.send(gate).is_err() {
            tracing::warn!("Poller is gone, cannot schedule next poll");
        }
    }
}

fn draw<B: Backend>(terminal: &mut Terminal<B>, app: &App) -> Result<()> {
    terminal
        .draw(|frame| {
            let area = frame.area();
            ui::widgets::render_reading_panel(frame, area, app)
        })
        .map_err(|e| UiError::RenderError(e.to_string()))?;
    Ok(())
}

/// Spawn-able loop emitting a spinner tick every `period`
pub async fn run_spinner_ticker(
    period: Duration,
    events: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if events.send(Message::Tick).is_err() {
                    break;
                }
            }
        }
    }
}

/// Forward the first termination signal as a shutdown message
pub async fn run_signal_listener(
    events: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut signals = Signals::new([SIGTERM, SIGINT, SIGHUP])
        .map_err(|e| ServiceError::SignalError(e.to_string()))?;
    let handle = signals.handle();

    tokio::select! {
        _ = cancel.cancelled() => {}
        signal = signals.next() => {
            if let Some(signal) = signal {
                tracing::info!("Received signal {}, shutting down", signal);
                let _ = events.send(Message::Shutdown);
            }
        }
    }

    handle.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PollError;
    use crate::poller::MockReadingSource;
    use crate::reading::Reading;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;
    use std::sync::Mutex;
    use tokio::time::{Instant, sleep};

    fn sample() -> Reading {
        Reading::from_json(br#"{"created_at":"2024-01-01T12:00:00Z","co2":450,"temp":21.5}"#)
            .unwrap()
    }

    fn key_press() -> Message {
        Message::Key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE))
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_shows_first_reading_then_quits() {
        let mut source = MockReadingSource::new();
        source.expect_fetch().returning(|| Ok(sample()));

        let monitor = Monitor::new(Arc::new(AppConfig::default()), Arc::new(source));
        let keys = monitor.sender();
        let mut terminal = Terminal::new(TestBackend::new(60, 5)).unwrap();

        let (app, _) = tokio::join!(monitor.run(&mut terminal), async move {
            sleep(Duration::from_secs(1)).await;
            keys.send(key_press()).unwrap();
        });

        let app = app.unwrap();
        assert!(app.is_quitting());
        assert!(matches!(app.last_result(), Some(Ok(r)) if r.co2 == 450));
        assert!(app.view().ends_with("\n\n"));
        assert!(screen_text(&terminal).contains("CO2: 450"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repolls_after_interval() {
        let polls = Arc::new(Mutex::new(Vec::new()));
        let recorded = polls.clone();

        let mut source = MockReadingSource::new();
        source.expect_fetch().returning(move || {
            recorded.lock().unwrap().push(Instant::now());
            Ok(sample())
        });

        let monitor = Monitor::new(Arc::new(AppConfig::default()), Arc::new(source));
        let keys = monitor.sender();
        let mut terminal = Terminal::new(TestBackend::new(60, 5)).unwrap();
        let start = Instant::now();

        let (app, _) = tokio::join!(monitor.run(&mut terminal), async move {
            sleep(Duration::from_secs(25)).await;
            keys.send(key_press()).unwrap();
        });

        let app = app.unwrap();
        assert!(app.view().contains("CO2: 450"));

        let polls = polls.lock().unwrap();
        assert_eq!(polls.len(), 3);
        assert!(polls[0] - start < Duration::from_millis(100));
        for pair in polls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_before_first_reading_repolls_immediately() {
        let polls = Arc::new(Mutex::new(Vec::new()));
        let recorded = polls.clone();

        let mut source = MockReadingSource::new();
        source.expect_fetch().returning(move || {
            let mut polls = recorded.lock().unwrap();
            polls.push(Instant::now());
            if polls.len() == 1 {
                Err(PollError::Transport("connection refused".to_string()))
            } else {
                Ok(sample())
            }
        });

        let monitor = Monitor::new(Arc::new(AppConfig::default()), Arc::new(source));
        let keys = monitor.sender();
        let mut terminal = Terminal::new(TestBackend::new(60, 5)).unwrap();

        let (app, _) = tokio::join!(monitor.run(&mut terminal), async move {
            sleep(Duration::from_secs(5)).await;
            keys.send(key_press()).unwrap();
        });

        let app = app.unwrap();
        assert!(app.has_reading());
        assert!(screen_text(&terminal).contains("CO2: 450"));

        let polls = polls.lock().unwrap();
        assert_eq!(polls.len(), 2);
        assert!(polls[1] - polls[0] < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_keeps_waiting_message() {
        let polls = Arc::new(Mutex::new(0usize));
        let counted = polls.clone();

        let mut source = MockReadingSource::new();
        source.expect_fetch().returning(move || {
            *counted.lock().unwrap() += 1;
            Err(PollError::UnexpectedStatus(500))
        });

        let monitor = Monitor::new(Arc::new(AppConfig::default()), Arc::new(source));
        let keys = monitor.sender();
        let mut terminal = Terminal::new(TestBackend::new(60, 5)).unwrap();

        let (app, _) = tokio::join!(monitor.run(&mut terminal), async move {
            sleep(Duration::from_secs(15)).await;
            keys.send(Message::Shutdown).unwrap();
        });

        let app = app.unwrap();
        assert!(app.last_result().is_none());
        assert!(screen_text(&terminal).contains(ui::app::WAITING_TEXT));

        // Retried on each pulse, never faster.
        let polls = *polls.lock().unwrap();
        assert!(polls > 2);
        assert!(polls <= 160);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_loop_ends_when_producers_stop() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (poll_tx, mut poll_rx) = mpsc::unbounded_channel();
        let mut terminal = Terminal::new(TestBackend::new(60, 5)).unwrap();

        events_tx.send(Message::Tick).unwrap();
        drop(events_tx);

        let (app, effect) = App::init();
        let app = event_loop(&mut terminal, app, effect, &mut events_rx, &poll_tx)
            .await
            .unwrap();

        assert_eq!(app.spinner_frame(), 1);
        assert!(!app.is_quitting());
        assert_eq!(poll_rx.recv().await, Some(PollGate::Immediate));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spinner_ticker_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_spinner_ticker(
            Duration::from_millis(100),
            tx,
            cancel.clone(),
        ));

        let start = Instant::now();
        assert!(matches!(rx.recv().await, Some(Message::Tick)));
        assert!(matches!(rx.recv().await, Some(Message::Tick)));
        assert_eq!(start.elapsed(), Duration::from_millis(200));

        cancel.cancel();
        handle.await.unwrap();
    }
}
