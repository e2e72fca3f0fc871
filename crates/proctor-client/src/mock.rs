//! Mock backend for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use proctor_core::error::BackendError;
use proctor_core::model::TimeRemaining;
use proctor_core::traits::AttemptBackend;

/// A scripted attempt backend for exercising timers without a server.
///
/// Remaining-time replies are served in order; the last one repeats.
/// `Err` entries surface as network errors.
pub struct MockBackend {
    replies: Mutex<VecDeque<Result<TimeRemaining, String>>>,
    /// Number of `begin_attempt` calls that fail before one succeeds.
    start_failures: AtomicU32,
    latency: Duration,
    begin_calls: AtomicU32,
    sync_calls: AtomicU32,
}

impl MockBackend {
    pub fn new(replies: Vec<Result<TimeRemaining, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            start_failures: AtomicU32::new(0),
            latency: Duration::ZERO,
            begin_calls: AtomicU32::new(0),
            sync_calls: AtomicU32::new(0),
        }
    }

    /// A backend that always reports the same remaining minutes.
    pub fn with_minutes(minutes: f64) -> Self {
        Self::new(vec![Ok(TimeRemaining::minutes(minutes))])
    }

    /// Fail the first `count` start calls with a network error.
    pub fn failing_starts(self, count: u32) -> Self {
        self.start_failures.store(count, Ordering::Relaxed);
        self
    }

    /// Delay every remaining-time reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue another remaining-time reply.
    pub fn push_reply(&self, reply: Result<TimeRemaining, String>) {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner).push_back(reply);
    }

    pub fn begin_calls(&self) -> u32 {
        self.begin_calls.load(Ordering::Relaxed)
    }

    pub fn sync_calls(&self) -> u32 {
        self.sync_calls.load(Ordering::Relaxed)
    }

    fn next_reply(&self) -> Result<TimeRemaining, String> {
        let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        if replies.len() > 1 {
            replies
                .pop_front()
                .unwrap_or_else(|| Err("no scripted reply".into()))
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or_else(|| Err("no scripted reply".into()))
        }
    }
}

#[async_trait]
impl AttemptBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn begin_attempt(&self, _assessment_id: &str) -> anyhow::Result<()> {
        self.begin_calls.fetch_add(1, Ordering::Relaxed);
        let pending = self.start_failures.load(Ordering::Relaxed);
        if pending > 0 {
            self.start_failures.store(pending - 1, Ordering::Relaxed);
            return Err(BackendError::Network("mock start failure".into()).into());
        }
        Ok(())
    }

    async fn time_remaining(&self, _assessment_id: &str) -> anyhow::Result<TimeRemaining> {
        self.sync_calls.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.next_reply()
            .map_err(|msg| BackendError::Network(msg).into())
    }
}
