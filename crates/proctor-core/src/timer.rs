//! Countdown timer for a timed assessment attempt.
//!
//! The backend owns the real clock. Locally we run two tokio tasks:
//! a decrement loop that ticks the countdown every `tick_interval`, and a
//! resync loop that replaces the local value with the authoritative one
//! every `resync_interval`. Both tasks are owned by the timer as an explicit
//! pair of `JoinHandle`s and are aborted together on pause, on a terminal
//! transition, and on disposal.
//!
//! Every state write is guarded by a generation counter (bumped whenever the
//! loops are spawned or halted) and a disposed flag, so a task or network
//! call that outlives its loops can never touch the state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::model::{AttemptSession, TimerConfig, TimerState};
use crate::traits::{AttemptBackend, TimerEvents};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Client-side countdown that periodically reconciles with the backend.
///
/// Spawning happens on the ambient Tokio runtime, so `start()` and
/// `resume()` must be called from within one. Dropping the timer disposes it.
pub struct AssessmentTimer {
    shared: Arc<Shared>,
}

struct Shared {
    assessment_id: String,
    config: TimerConfig,
    backend: Arc<dyn AttemptBackend>,
    events: Arc<dyn TimerEvents>,
    state: Mutex<Inner>,
    loops: Mutex<LoopHandles>,
    disposed: AtomicBool,
}

#[derive(Default)]
struct Inner {
    view: TimerState,
    session: Option<AttemptSession>,
    generation: u64,
    /// Set once `on_time_up` or `on_auto_submit` has fired.
    finished: bool,
}

#[derive(Default)]
struct LoopHandles {
    countdown: Option<JoinHandle<()>>,
    resync: Option<JoinHandle<()>>,
}

impl LoopHandles {
    fn abort(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        if let Some(handle) = self.resync.take() {
            handle.abort();
        }
    }
}

enum Tick {
    Remaining(u64),
    Expired,
    Stale,
}

enum SyncOutcome {
    Synced(u64),
    AutoSubmitted,
    Failed,
    Discarded,
}

impl AssessmentTimer {
    pub fn new(
        assessment_id: impl Into<String>,
        config: TimerConfig,
        backend: Arc<dyn AttemptBackend>,
        events: Arc<dyn TimerEvents>,
    ) -> Self {
        let inner = Inner {
            view: TimerState {
                seconds_remaining: config.initial_duration,
                ..TimerState::default()
            },
            ..Inner::default()
        };

        Self {
            shared: Arc::new(Shared {
                assessment_id: assessment_id.into(),
                config,
                backend,
                events,
                state: Mutex::new(inner),
                loops: Mutex::new(LoopHandles::default()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn assessment_id(&self) -> &str {
        &self.shared.assessment_id
    }

    /// Snapshot of the current timer state.
    pub fn state(&self) -> TimerState {
        self.shared.lock_state().view.clone()
    }

    /// The attempt session, once `start()` has succeeded.
    pub fn session(&self) -> Option<AttemptSession> {
        self.shared.lock_state().session.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Begin the remote attempt and start both loops.
    ///
    /// No-op once an attempt has started or while a start is in flight. On
    /// failure the error is recorded in `last_error`, the timer stays idle,
    /// and the caller may retry.
    pub async fn start(&self) -> anyhow::Result<()> {
        let shared = &self.shared;
        {
            let mut st = shared.lock_state();
            if shared.is_disposed() {
                anyhow::bail!("timer for '{}' has been disposed", shared.assessment_id);
            }
            if st.finished {
                anyhow::bail!("attempt for '{}' has already finished", shared.assessment_id);
            }
            if st.view.has_started || st.view.is_starting {
                debug!(assessment = %shared.assessment_id, "start ignored, attempt already started");
                return Ok(());
            }
            st.view.is_starting = true;
        }

        info!(
            assessment = %shared.assessment_id,
            backend = shared.backend.name(),
            "starting attempt"
        );
        let result = shared.backend.begin_attempt(&shared.assessment_id).await;

        let generation = {
            let mut st = shared.lock_state();
            st.view.is_starting = false;
            if shared.is_disposed() {
                debug!(assessment = %shared.assessment_id, "discarding start result after disposal");
                anyhow::bail!(
                    "timer for '{}' was disposed while starting",
                    shared.assessment_id
                );
            }

            if st.finished {
                anyhow::bail!(
                    "attempt for '{}' finished while starting",
                    shared.assessment_id
                );
            }

            if let Err(e) = result {
                warn!(assessment = %shared.assessment_id, "failed to start attempt: {e:#}");
                st.view.last_error = Some(format!("{e:#}"));
                return Err(e);
            }

            let session = AttemptSession::new(&shared.assessment_id);
            info!(
                assessment = %shared.assessment_id,
                session = %session.session_id,
                seconds = shared.config.initial_duration,
                "attempt started"
            );
            st.session = Some(session);
            st.view.has_started = true;
            st.view.is_running = true;
            st.view.seconds_remaining = shared.config.initial_duration;
            st.view.last_error = None;
            st.generation += 1;
            st.generation
        };

        shared.spawn_loops(generation);
        Ok(())
    }

    /// Cancel both loops without contacting the backend.
    pub fn pause(&self) {
        self.shared.halt();
        info!(assessment = %self.shared.assessment_id, "timer paused");
    }

    /// Same effect as [`pause`](Self::pause).
    pub fn stop(&self) {
        self.shared.halt();
        info!(assessment = %self.shared.assessment_id, "timer stopped");
    }

    /// Restart both loops from the current countdown value.
    ///
    /// Returns `false` (and does nothing) if the attempt never started, is
    /// already running, has finished, has no time left, or was disposed.
    pub fn resume(&self) -> bool {
        let shared = &self.shared;
        let generation = {
            let mut st = shared.lock_state();
            if shared.is_disposed()
                || !st.view.has_started
                || st.view.is_running
                || st.finished
                || st.view.seconds_remaining == 0
            {
                return false;
            }
            st.view.is_running = true;
            st.generation += 1;
            st.generation
        };

        info!(
            assessment = %shared.assessment_id,
            seconds = self.state().seconds_remaining,
            "timer resumed"
        );
        shared.spawn_loops(generation);
        true
    }

    /// Reconcile with the backend once, right now.
    ///
    /// Returns the authoritative seconds (`Some(0)` after auto-submission),
    /// or `None` if the call failed or the timer was disposed meanwhile.
    pub async fn sync_now(&self) -> Option<u64> {
        match self.shared.resync(None).await {
            SyncOutcome::Synced(seconds) => Some(seconds),
            SyncOutcome::AutoSubmitted => Some(0),
            SyncOutcome::Failed | SyncOutcome::Discarded => None,
        }
    }

    /// Cancel both loops for good. Later network results are discarded.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.halt();
        debug!(assessment = %self.shared.assessment_id, "timer disposed");
    }
}

impl Drop for AssessmentTimer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, Inner> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_loops(&self) -> MutexGuard<'_, LoopHandles> {
        self.loops.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn spawn_loops(self: &Arc<Self>, generation: u64) {
        let mut loops = self.lock_loops();
        if self.is_disposed() || self.lock_state().generation != generation {
            return;
        }
        loops.abort();
        loops.countdown = Some(tokio::spawn(run_countdown(Arc::clone(self), generation)));
        loops.resync = Some(tokio::spawn(run_resync(Arc::clone(self), generation)));
    }

    fn halt(&self) {
        {
            let mut st = self.lock_state();
            st.generation += 1;
            st.view.is_running = false;
        }
        self.lock_loops().abort();
    }

    fn apply_tick(&self, generation: u64) -> Tick {
        let mut st = self.lock_state();
        if self.is_disposed() || st.generation != generation {
            return Tick::Stale;
        }

        st.view.seconds_remaining = st.view.seconds_remaining.saturating_sub(1);
        if st.view.seconds_remaining > 0 {
            return Tick::Remaining(st.view.seconds_remaining);
        }

        st.view.is_running = false;
        st.generation += 1;
        if st.finished {
            return Tick::Stale;
        }
        st.finished = true;
        Tick::Expired
    }

    /// One reconciliation round. `generation` is `Some` for loop ticks,
    /// which must be dropped once their loop has been halted.
    async fn resync(&self, generation: Option<u64>) -> SyncOutcome {
        let result = self.backend.time_remaining(&self.assessment_id).await;

        let mut st = self.lock_state();
        if self.is_disposed() {
            debug!(assessment = %self.assessment_id, "discarding resync result after disposal");
            return SyncOutcome::Discarded;
        }
        if generation.is_some_and(|g| g != st.generation) {
            return SyncOutcome::Discarded;
        }

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!(assessment = %self.assessment_id, "resync failed, keeping local countdown: {e:#}");
                st.view.last_error = Some(format!("{e:#}"));
                return SyncOutcome::Failed;
            }
        };

        if report.is_auto_submitted(&self.config.auto_submit_message) {
            st.view.seconds_remaining = 0;
            st.view.is_running = false;
            st.view.last_error = None;
            st.generation += 1;
            let first = !st.finished;
            st.finished = true;
            drop(st);

            self.lock_loops().abort();
            if first {
                info!(assessment = %self.assessment_id, "attempt auto-submitted by the server");
                self.events.on_auto_submit();
            }
            return SyncOutcome::AutoSubmitted;
        }

        let Some(seconds) = report.authoritative_seconds() else {
            warn!(assessment = %self.assessment_id, "resync response carried no remaining time");
            st.view.last_error = Some("response carried no remaining time".to_string());
            return SyncOutcome::Failed;
        };

        // A finished attempt keeps its terminal state.
        if st.finished {
            return SyncOutcome::Synced(seconds);
        }

        let local = st.view.seconds_remaining;
        st.view.seconds_remaining = seconds;
        st.view.last_error = None;
        // No decrement loop will observe a zero set while halted.
        let expired = seconds == 0 && !st.view.is_running;
        if expired {
            st.finished = true;
            st.generation += 1;
        }
        drop(st);

        debug!(assessment = %self.assessment_id, local, authoritative = seconds, "resynced countdown");
        self.events.on_sync(seconds);
        if expired {
            info!(assessment = %self.assessment_id, "time is up");
            self.events.on_time_up();
        }
        SyncOutcome::Synced(seconds)
    }
}

fn ticker(period: Duration) -> Interval {
    let period = period.max(MIN_PERIOD);
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run_countdown(shared: Arc<Shared>, generation: u64) {
    let mut ticker = ticker(shared.config.tick_interval);
    loop {
        ticker.tick().await;
        match shared.apply_tick(generation) {
            Tick::Remaining(seconds) => shared.events.on_tick(seconds),
            Tick::Expired => {
                info!(assessment = %shared.assessment_id, "time is up");
                shared.events.on_tick(0);
                shared.events.on_time_up();
                shared.lock_loops().abort();
                return;
            }
            Tick::Stale => return,
        }
    }
}

async fn run_resync(shared: Arc<Shared>, generation: u64) {
    let mut ticker = ticker(shared.config.resync_interval);
    loop {
        ticker.tick().await;
        match shared.resync(Some(generation)).await {
            SyncOutcome::Synced(_) | SyncOutcome::Failed => {}
            SyncOutcome::AutoSubmitted | SyncOutcome::Discarded => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;

    use super::*;
    use crate::error::BackendError;
    use crate::model::{TimeRemaining, AUTO_SUBMITTED_MESSAGE};

    const HOUR: Duration = Duration::from_secs(3600);

    /// Scripted backend. `None` entries in `reports` fail with a network error;
    /// the last entry repeats forever.
    #[derive(Default)]
    struct StubBackend {
        begin_calls: AtomicU32,
        sync_calls: AtomicU32,
        begin_failures: AtomicU32,
        begin_latency: Duration,
        sync_latency: Duration,
        reports: Mutex<VecDeque<Option<TimeRemaining>>>,
    }

    impl StubBackend {
        fn with_reports(reports: Vec<Option<TimeRemaining>>) -> Self {
            Self {
                reports: Mutex::new(reports.into()),
                ..Self::default()
            }
        }

        fn begin_calls(&self) -> u32 {
            self.begin_calls.load(Ordering::SeqCst)
        }

        fn sync_calls(&self) -> u32 {
            self.sync_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AttemptBackend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }

        async fn begin_attempt(&self, _assessment_id: &str) -> anyhow::Result<()> {
            self.begin_calls.fetch_add(1, Ordering::SeqCst);
            if !self.begin_latency.is_zero() {
                time::sleep(self.begin_latency).await;
            }
            let remaining = self.begin_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.begin_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(BackendError::Network("connection refused".into()).into());
            }
            Ok(())
        }

        async fn time_remaining(&self, _assessment_id: &str) -> anyhow::Result<TimeRemaining> {
            self.sync_calls.fetch_add(1, Ordering::SeqCst);
            if !self.sync_latency.is_zero() {
                time::sleep(self.sync_latency).await;
            }
            let next = {
                let mut reports = self.reports.lock().unwrap();
                if reports.len() > 1 {
                    reports.pop_front().flatten()
                } else {
                    reports.front().cloned().flatten()
                }
            };
            next.ok_or_else(|| BackendError::Network("connection reset".into()).into())
        }
    }

    #[derive(Default)]
    struct Recorder {
        time_up: AtomicU32,
        auto_submit: AtomicU32,
        ticks: AtomicU32,
        syncs: Mutex<Vec<u64>>,
    }

    impl Recorder {
        fn time_up(&self) -> u32 {
            self.time_up.load(Ordering::SeqCst)
        }

        fn auto_submit(&self) -> u32 {
            self.auto_submit.load(Ordering::SeqCst)
        }

        fn ticks(&self) -> u32 {
            self.ticks.load(Ordering::SeqCst)
        }
    }

    impl TimerEvents for Recorder {
        fn on_time_up(&self) {
            self.time_up.fetch_add(1, Ordering::SeqCst);
        }

        fn on_auto_submit(&self) {
            self.auto_submit.fetch_add(1, Ordering::SeqCst);
        }

        fn on_tick(&self, _seconds_remaining: u64) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_sync(&self, seconds_remaining: u64) {
            self.syncs.lock().unwrap().push(seconds_remaining);
        }
    }

    fn timer_with(
        config: TimerConfig,
        backend: &Arc<StubBackend>,
        events: &Arc<Recorder>,
    ) -> AssessmentTimer {
        AssessmentTimer::new(
            "exam-101",
            config,
            Arc::clone(backend) as Arc<dyn AttemptBackend>,
            Arc::clone(events) as Arc<dyn TimerEvents>,
        )
    }

    async fn advance(ms: u64) {
        time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_reaches_zero_and_fires_once() {
        for duration in [1u64, 3, 7] {
            let backend = Arc::new(StubBackend::default());
            let events = Arc::new(Recorder::default());
            let timer = timer_with(
                TimerConfig::new(duration).with_resync_interval(HOUR),
                &backend,
                &events,
            );

            timer.start().await.unwrap();
            advance(duration * 1000 + 500).await;

            let state = timer.state();
            assert_eq!(state.seconds_remaining, 0, "duration {duration}");
            assert!(!state.is_running);
            assert_eq!(events.time_up(), 1);

            advance(10_000).await;
            assert_eq!(events.time_up(), 1, "time up must fire exactly once");
            assert_eq!(events.auto_submit(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn initial_state_before_start() {
        let backend = Arc::new(StubBackend::default());
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(300), &backend, &events);

        let state = timer.state();
        assert_eq!(state.seconds_remaining, 300);
        assert!(!state.has_started);
        assert!(!state.is_running);
        assert!(timer.session().is_none());

        advance(5_000).await;
        assert_eq!(timer.state().seconds_remaining, 300);
        assert_eq!(backend.sync_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_a_noop() {
        let backend = Arc::new(StubBackend::default());
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(60), &backend, &events);

        timer.start().await.unwrap();
        advance(2_500).await;
        timer.start().await.unwrap();

        assert_eq!(backend.begin_calls(), 1);
        assert_eq!(timer.state().seconds_remaining, 58, "restart must not reset");
        let session = timer.session().unwrap();
        assert_eq!(session.assessment_id, "exam-101");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_starts_issue_one_call() {
        let backend = Arc::new(StubBackend {
            begin_latency: Duration::from_millis(300),
            ..StubBackend::default()
        });
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(60), &backend, &events);

        let (a, b) = tokio::join!(timer.start(), timer.start());
        a.unwrap();
        b.unwrap();

        assert_eq!(backend.begin_calls(), 1);
        assert!(timer.state().is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_is_recorded_and_retryable() {
        let backend = Arc::new(StubBackend {
            begin_failures: AtomicU32::new(1),
            ..StubBackend::default()
        });
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(60), &backend, &events);

        let err = timer.start().await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        let state = timer.state();
        assert!(!state.has_started);
        assert!(!state.is_running);
        assert!(!state.is_starting);
        assert!(state.last_error.unwrap().contains("connection refused"));

        advance(3_000).await;
        assert_eq!(timer.state().seconds_remaining, 60, "idle timer must not count");

        timer.start().await.unwrap();
        let state = timer.state();
        assert!(state.is_running);
        assert!(state.last_error.is_none());
        assert_eq!(backend.begin_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_overrides_local_countdown() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::minutes(0.5),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(60).with_resync_interval(Duration::from_millis(2_500)),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        advance(3_200).await;

        // ticks at 1s and 2s, resync to 30 at 2.5s, tick at 3s
        assert_eq!(timer.state().seconds_remaining, 29);
        assert_eq!(*events.syncs.lock().unwrap(), vec![30]);
    }

    #[tokio::test(start_paused = true)]
    async fn negative_authoritative_time_clamps_to_zero() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::minutes(-2.0),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(60).with_resync_interval(Duration::from_millis(2_500)),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        advance(2_600).await;
        assert_eq!(timer.state().seconds_remaining, 0);

        advance(500).await;
        assert_eq!(events.time_up(), 1);
        assert!(!timer.state().is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_now_clamps_non_finite_time() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::minutes(f64::NAN),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(60), &backend, &events);

        assert_eq!(timer.sync_now().await, Some(0));
        assert_eq!(timer.state().seconds_remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_time_counts_as_failed_resync() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(TimeRemaining {
            time_remaining: None,
            message: Some("attempt in progress".into()),
        })]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(60), &backend, &events);

        timer.start().await.unwrap();
        advance(1_500).await;
        assert_eq!(timer.sync_now().await, None);

        let state = timer.state();
        assert_eq!(state.seconds_remaining, 59);
        assert!(state.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_resync_keeps_counting() {
        let backend = Arc::new(StubBackend::with_reports(vec![None]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(30).with_resync_interval(Duration::from_millis(2_000)),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        advance(4_500).await;

        let state = timer.state();
        assert_eq!(state.seconds_remaining, 26);
        assert!(state.is_running);
        assert!(state.last_error.unwrap().contains("connection reset"));
        assert_eq!(backend.sync_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_resync_clears_last_error() {
        let backend = Arc::new(StubBackend::with_reports(vec![
            None,
            Some(TimeRemaining::minutes(1.0)),
        ]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(120).with_resync_interval(Duration::from_millis(2_300)),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        advance(2_400).await;
        assert!(timer.state().last_error.is_some());

        // second resync lands at 4.6s, before the tick at 5s
        advance(2_300).await;
        let state = timer.state();
        assert!(state.last_error.is_none());
        assert_eq!(state.seconds_remaining, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_submit_stops_loops_and_fires_once() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::auto_submitted(AUTO_SUBMITTED_MESSAGE),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(60).with_resync_interval(Duration::from_millis(2_000)),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        advance(2_500).await;

        let state = timer.state();
        assert_eq!(state.seconds_remaining, 0);
        assert!(!state.is_running);
        assert_eq!(events.auto_submit(), 1);

        advance(100_000).await;
        assert_eq!(events.auto_submit(), 1);
        assert_eq!(events.time_up(), 0, "auto-submit must never report time up");
        assert_eq!(backend.sync_calls(), 1, "resync loop must stop");

        // An explicit sync after the fact reports zero but fires nothing new.
        assert_eq!(timer.sync_now().await, Some(0));
        assert_eq!(events.auto_submit(), 1);
        assert!(!timer.resume());
    }

    #[tokio::test(start_paused = true)]
    async fn custom_sentinel_is_honoured() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::auto_submitted("closed by proctor"),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(60).with_auto_submit_message("closed by proctor"),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        assert_eq!(timer.sync_now().await, Some(0));
        assert_eq!(events.auto_submit(), 1);
        assert!(!timer.state().is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_then_resume_continues_from_paused_value() {
        let backend = Arc::new(StubBackend::default());
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(20).with_resync_interval(HOUR),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        advance(5_500).await;
        assert_eq!(timer.state().seconds_remaining, 15);

        timer.pause();
        assert!(!timer.state().is_running);
        advance(10_000).await;
        assert_eq!(timer.state().seconds_remaining, 15);

        assert!(timer.resume());
        assert!(!timer.resume(), "already running");
        advance(3_500).await;
        assert_eq!(timer.state().seconds_remaining, 12);
        assert_eq!(backend.begin_calls(), 1, "resume must not restart the attempt");
    }

    #[tokio::test(start_paused = true)]
    async fn resume_requires_a_started_unfinished_timer() {
        let backend = Arc::new(StubBackend::default());
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(2).with_resync_interval(HOUR),
            &backend,
            &events,
        );

        assert!(!timer.resume(), "never started");

        timer.start().await.unwrap();
        advance(2_500).await;
        assert_eq!(events.time_up(), 1);
        assert!(!timer.resume(), "time is up");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_without_remote_calls() {
        let backend = Arc::new(StubBackend::default());
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(60).with_resync_interval(Duration::from_secs(5)),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        timer.stop();
        advance(30_000).await;

        assert_eq!(timer.state().seconds_remaining, 60);
        assert_eq!(backend.sync_calls(), 0);
        assert_eq!(backend.begin_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_discards_in_flight_resync() {
        let backend = Arc::new(StubBackend {
            sync_latency: Duration::from_secs(5),
            ..StubBackend::with_reports(vec![Some(TimeRemaining::minutes(1.0))])
        });
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(100), &backend, &events);

        timer.start().await.unwrap();
        // resync fires at 10s and would land at 15s
        advance(12_500).await;
        assert_eq!(backend.sync_calls(), 1);
        assert_eq!(timer.state().seconds_remaining, 88);

        timer.dispose();
        advance(20_000).await;

        let state = timer.state();
        assert_eq!(state.seconds_remaining, 88);
        assert!(!state.is_running);
        assert!(events.syncs.lock().unwrap().is_empty());
        assert!(timer.is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_discards_in_flight_sync_now() {
        let backend = Arc::new(StubBackend {
            sync_latency: Duration::from_secs(5),
            ..StubBackend::with_reports(vec![Some(TimeRemaining::minutes(1.0))])
        });
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(50).with_resync_interval(HOUR),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        let (synced, ()) = tokio::join!(timer.sync_now(), async {
            advance(1_500).await;
            timer.dispose();
        });

        assert_eq!(synced, None);
        assert_eq!(timer.state().seconds_remaining, 49);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_submit_before_start_blocks_the_attempt() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::auto_submitted(AUTO_SUBMITTED_MESSAGE),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(5), &backend, &events);

        assert_eq!(timer.sync_now().await, Some(0));
        assert_eq!(events.auto_submit(), 1);

        let err = timer.start().await.unwrap_err();
        assert!(err.to_string().contains("already finished"));
        assert_eq!(backend.begin_calls(), 0);

        advance(10_000).await;
        let state = timer.state();
        assert!(!state.has_started);
        assert!(!state.is_running);
        assert_eq!(state.seconds_remaining, 0);
        assert_eq!(events.auto_submit(), 1);
        assert_eq!(events.time_up(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sync_before_start_reports_time_up() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::minutes(0.0),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(60), &backend, &events);

        assert_eq!(timer.sync_now().await, Some(0));
        assert_eq!(events.time_up(), 1);
        assert!(timer.start().await.is_err());
        assert_eq!(backend.begin_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sync_while_paused_fires_time_up_once() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::minutes(0.0),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(60).with_resync_interval(HOUR),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        advance(2_500).await;
        timer.pause();

        assert_eq!(timer.sync_now().await, Some(0));
        assert_eq!(events.time_up(), 1);
        assert!(!timer.resume());

        advance(10_000).await;
        assert_eq!(timer.sync_now().await, Some(0));
        let state = timer.state();
        assert_eq!(state.seconds_remaining, 0);
        assert!(!state.is_running);
        assert_eq!(events.time_up(), 1);
        assert_eq!(events.auto_submit(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sync_while_running_expires_on_next_tick() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::minutes(0.0),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(60).with_resync_interval(HOUR),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        advance(1_500).await;
        assert_eq!(timer.sync_now().await, Some(0));
        assert_eq!(events.time_up(), 0);

        advance(1_000).await;
        assert_eq!(events.time_up(), 1);
        assert!(!timer.state().is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn start_after_dispose_fails() {
        let backend = Arc::new(StubBackend::default());
        let events = Arc::new(Recorder::default());
        let timer = timer_with(TimerConfig::new(60), &backend, &events);

        timer.dispose();
        assert!(timer.start().await.is_err());
        assert_eq!(backend.begin_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_cancels_both_loops() {
        let backend = Arc::new(StubBackend::with_reports(vec![Some(
            TimeRemaining::minutes(5.0),
        )]));
        let events = Arc::new(Recorder::default());
        let timer = timer_with(
            TimerConfig::new(600).with_resync_interval(Duration::from_secs(2)),
            &backend,
            &events,
        );

        timer.start().await.unwrap();
        advance(3_500).await;
        let ticks = events.ticks();
        let syncs = backend.sync_calls();
        drop(timer);

        advance(60_000).await;
        assert_eq!(events.ticks(), ticks);
        assert_eq!(backend.sync_calls(), syncs);
    }
}
