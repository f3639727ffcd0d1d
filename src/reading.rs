//! Sensor readings as delivered by the remote endpoint.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::PollError;

/// Display format of the reading timestamp
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One decoded sensor sample.
///
/// The timestamp keeps the offset it was sent with, so it is displayed in
/// the sender's local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub created_at: DateTime<FixedOffset>,
    pub co2: i64,
    #[serde(rename = "temp")]
    pub temperature: f32,
}

/// Outcome of one poll attempt
pub type PollResult = Result<Reading, PollError>;

impl Reading {
    /// Decode a reading from a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, PollError> {
        serde_json::from_slice(body).map_err(|e| PollError::Decode(e.to_string()))
    }

    /// `CO2: 450; Temp: 21.5; 2024-01-01 12:00:00`
    pub fn summary(&self) -> String {
        format!(
            "CO2: {}; Temp: {:.1}; {}",
            self.co2,
            self.temperature,
            self.created_at.format(TIMESTAMP_FORMAT)
        )
    }
}
