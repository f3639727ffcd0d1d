//! Polling of the remote readings endpoint.
//!
//! This module defines the [`ReadingSource`] trait, its HTTP implementation
//! and the background tasks that decide when the next poll happens.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::error::PollError;
use crate::reading::{PollResult, Reading};
use crate::ui::Message;

/// Header carrying the static API key
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Something that can be asked for the latest reading
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Perform one poll
    async fn fetch(&self) -> PollResult;
}

/// Polls an HTTP endpoint with an optional API key
#[derive(Debug, Clone)]
pub struct HttpPoller {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPoller {
    /// Create a poller with its own HTTP client.
    ///
    /// The client keeps no idle connections, so every poll opens a fresh
    /// connection and releases it when the response is consumed.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PollError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self::with_client(client, endpoint, api_key))
    }

    /// Create a poller around an existing client
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    /// Create a poller from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, PollError> {
        Self::new(
            config.poll.api_url.clone(),
            config.api_key().map(str::to_string),
            config.poll.timeout(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReadingSource for HttpPoller {
    async fn fetch(&self) -> PollResult {
        let mut request = self.client.get(&self.endpoint);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PollError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        Reading::from_json(&body)
    }
}

/// How long to wait before the next poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollGate {
    /// Poll right away
    Immediate,
    /// Poll on the next activity pulse
    NextPulse,
    /// Wait for the poll interval, then for an activity pulse
    AfterInterval,
}

/// Block until `gate` allows the next poll.
///
/// A closed pulse channel counts as a pulse so polling never stalls on a
/// dead pulse generator.
pub async fn wait_for_gate(gate: PollGate, interval: Duration, pulses: &mut mpsc::Receiver<()>) {
    match gate {
        PollGate::Immediate => return,
        PollGate::NextPulse => {}
        PollGate::AfterInterval => tokio::time::sleep(interval).await,
    }

    if pulses.recv().await.is_none() {
        tracing::debug!("Pulse channel closed, polling without pulse");
    }
}

/// Spawn-able loop emitting an activity pulse every `period`.
///
/// The pulse channel holds at most one pending pulse; the generator waits
/// for it to be taken before producing the next one.
pub async fn run_pulse_generator(
    period: Duration,
    pulses: mpsc::Sender<()>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if pulses.send(()).await.is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!("Pulse generator stopped");
}

/// Spawn-able poll loop.
///
/// Waits for a re-arm request, satisfies its gate, polls `source` and
/// emits exactly one [`Message::Polled`] per cycle.
pub async fn run_poller<S: ReadingSource + ?Sized>(
    source: Arc<S>,
    interval: Duration,
    mut requests: mpsc::UnboundedReceiver<PollGate>,
    mut pulses: mpsc::Receiver<()>,
    events: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
) {
    tracing::info!("Poller started (interval: {}s)", interval.as_secs());

    loop {
        let gate = tokio::select! {
            _ = cancel.cancelled() => break,
            gate = requests.recv() => match gate {
                Some(gate) => gate,
                None => break,
            },
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = async {
                wait_for_gate(gate, interval, &mut pulses).await;
                source.fetch().await
            } => result,
        };

        match &result {
            Ok(reading) => tracing::debug!(
                co2 = reading.co2,
                temperature = reading.temperature,
                "Poll succeeded"
            ),
            Err(PollError::UnexpectedStatus(code)) => {
                tracing::warn!("Endpoint answered with status {}, retrying later", code)
            }
            Err(e) => tracing::error!(status = ?e.status(), "Poll failed: {}", e),
        }

        if events.send(Message::Polled(result)).is_err() {
            tracing::debug!("Event channel closed, stopping poller");
            break;
        }
    }

    tracing::info!("Poller stopped");
}
