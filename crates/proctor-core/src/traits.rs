//! Core trait definitions for the attempt backend and timer observers.
//!
//! The backend trait is implemented by the `proctor-client` crate; the
//! observer trait is implemented by whoever renders the countdown.

use async_trait::async_trait;

use crate::model::TimeRemaining;

// ---------------------------------------------------------------------------
// Attempt backend trait
// ---------------------------------------------------------------------------

/// The remote service that owns the authoritative attempt clock.
#[async_trait]
pub trait AttemptBackend: Send + Sync {
    /// Human-readable backend name (e.g. "http").
    fn name(&self) -> &str;

    /// Begin a timed attempt. Success means the server clock is running.
    async fn begin_attempt(&self, assessment_id: &str) -> anyhow::Result<()>;

    /// Fetch the authoritative remaining time for an attempt.
    async fn time_remaining(&self, assessment_id: &str) -> anyhow::Result<TimeRemaining>;
}

// ---------------------------------------------------------------------------
// Timer observer trait
// ---------------------------------------------------------------------------

/// Callbacks fired by a running timer.
///
/// Called from the timer's background tasks with no internal lock held.
/// At most one of `on_time_up` and `on_auto_submit` ever fires per timer.
pub trait TimerEvents: Send + Sync {
    /// The local countdown reached zero.
    fn on_time_up(&self);

    /// The backend reported that it already auto-submitted the attempt.
    fn on_auto_submit(&self);

    /// The local countdown advanced.
    fn on_tick(&self, _seconds_remaining: u64) {}

    /// A resync replaced the local countdown with the authoritative value.
    fn on_sync(&self, _seconds_remaining: u64) {}
}

/// Observer that ignores every event.
pub struct NoopEvents;

impl TimerEvents for NoopEvents {
    fn on_time_up(&self) {}
    fn on_auto_submit(&self) {}
}
