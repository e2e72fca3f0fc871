//! Core data model types for proctor.
//!
//! These types describe timer configuration, the observable timer state, the
//! attempt session and the wire shape of the remote remaining-time report.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message the backend sends once it has force-submitted an attempt.
pub const AUTO_SUBMITTED_MESSAGE: &str = "Assessment has been auto-submitted";

/// Default period of the local decrement loop.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Default period of the remote resync loop.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for a single [`AssessmentTimer`](crate::timer::AssessmentTimer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    /// Countdown length applied when the attempt starts, in seconds.
    pub initial_duration: u64,
    /// How often the local countdown decrements by one second.
    pub tick_interval: Duration,
    /// How often the countdown is reconciled with the backend.
    pub resync_interval: Duration,
    /// Sentinel `message` that marks a server-side auto-submission.
    pub auto_submit_message: String,
}

impl TimerConfig {
    pub fn new(initial_duration: u64) -> Self {
        Self {
            initial_duration,
            tick_interval: DEFAULT_TICK_INTERVAL,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            auto_submit_message: AUTO_SUBMITTED_MESSAGE.to_string(),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    pub fn with_auto_submit_message(mut self, message: impl Into<String>) -> Self {
        self.auto_submit_message = message.into();
        self
    }
}

/// Snapshot of a timer's observable state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    /// Seconds left on the local countdown. Never negative.
    pub seconds_remaining: u64,
    /// Whether the decrement and resync loops are live.
    pub is_running: bool,
    /// Whether a `begin_attempt` call is in flight.
    pub is_starting: bool,
    /// Most recent start or resync failure, cleared by a successful resync.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Whether the remote attempt has been started.
    pub has_started: bool,
}

/// One started attempt, created by the first successful `start()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSession {
    /// Externally supplied assessment identifier.
    pub assessment_id: String,
    /// Locally generated id used to correlate log lines.
    pub session_id: Uuid,
    /// When the backend acknowledged the start.
    pub started_at: DateTime<Utc>,
}

impl AttemptSession {
    pub fn new(assessment_id: &str) -> Self {
        Self {
            assessment_id: assessment_id.to_string(),
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

/// Body of `GET /time_remaining/{assessment_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRemaining {
    /// Remaining time in (fractional) minutes.
    #[serde(default)]
    pub time_remaining: Option<f64>,
    /// Free-form status message; equals the sentinel after auto-submission.
    #[serde(default)]
    pub message: Option<String>,
}

impl TimeRemaining {
    pub fn minutes(minutes: f64) -> Self {
        Self {
            time_remaining: Some(minutes),
            message: None,
        }
    }

    pub fn auto_submitted(message: &str) -> Self {
        Self {
            time_remaining: Some(0.0),
            message: Some(message.to_string()),
        }
    }

    /// Whether the backend reports that it already auto-submitted the attempt.
    pub fn is_auto_submitted(&self, sentinel: &str) -> bool {
        self.message.as_deref() == Some(sentinel)
    }

    /// Authoritative remaining time in whole seconds.
    ///
    /// Returns `None` when the report carries no time at all. Negative and
    /// non-finite values clamp to zero.
    pub fn authoritative_seconds(&self) -> Option<u64> {
        self.time_remaining.map(minutes_to_seconds)
    }
}

/// Convert fractional minutes to whole seconds, flooring and clamping at zero.
pub fn minutes_to_seconds(minutes: f64) -> u64 {
    if !minutes.is_finite() || minutes <= 0.0 {
        return 0;
    }
    (minutes * 60.0).floor() as u64
}

/// Render seconds as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}
