//! The `proctor run` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use proctor_client::create_backend;
use proctor_core::error::is_permanent;
use proctor_core::{format_clock, AssessmentTimer, TimerEvents};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    TimeUp,
    AutoSubmitted,
}

/// Console countdown renderer.
struct ConsoleEvents {
    finished: mpsc::UnboundedSender<Finish>,
}

impl TimerEvents for ConsoleEvents {
    fn on_time_up(&self) {
        let _ = self.finished.send(Finish::TimeUp);
    }

    fn on_auto_submit(&self) {
        let _ = self.finished.send(Finish::AutoSubmitted);
    }

    fn on_tick(&self, seconds_remaining: u64) {
        eprint!("\r  Time remaining: {}   ", format_clock(seconds_remaining));
    }

    fn on_sync(&self, seconds_remaining: u64) {
        tracing::debug!("server reports {} left", format_clock(seconds_remaining));
    }
}

pub async fn execute(
    assessment: String,
    duration: Option<u64>,
    api_url: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let assessment = assessment.trim().to_string();
    anyhow::ensure!(!assessment.is_empty(), "assessment id must not be empty");

    let config = super::load_config(api_url, config_path.as_deref())?;
    let duration = duration.unwrap_or(config.default_duration_secs);
    anyhow::ensure!(duration >= 1, "duration must be at least 1 second");

    let backend = create_backend(&config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let timer = AssessmentTimer::new(
        assessment.as_str(),
        config.timer_config(duration),
        backend,
        Arc::new(ConsoleEvents { finished: tx }),
    );

    start_with_retries(&timer, config.max_retries, config.retry_delay()).await?;
    eprintln!(
        "Attempt started: {assessment} ({} on the clock)",
        format_clock(duration)
    );

    let outcome = tokio::select! {
        finish = rx.recv() => finish,
        Ok(()) = tokio::signal::ctrl_c() => None,
    };
    eprintln!();

    match outcome {
        Some(Finish::TimeUp) => println!("Time is up for {assessment}."),
        Some(Finish::AutoSubmitted) => {
            println!("{assessment} was auto-submitted by the server.")
        }
        None => {
            timer.dispose();
            println!(
                "Interrupted with {} remaining.",
                format_clock(timer.state().seconds_remaining)
            );
        }
    }

    Ok(())
}

/// Start the attempt, retrying transient failures with exponential backoff.
async fn start_with_retries(
    timer: &AssessmentTimer,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<()> {
    let mut last_error = None;
    let mut delay = initial_delay;

    for retry in 0..=max_retries {
        if retry > 0 {
            eprintln!(
                "  Retrying start in {}ms ({retry}/{max_retries})",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }

        match timer.start().await {
            Ok(()) => return Ok(()),
            Err(e) if is_permanent(&e) => {
                return Err(e.context(format!(
                    "cannot start attempt '{}'",
                    timer.assessment_id()
                )));
            }
            Err(e) => {
                tracing::warn!("start failed for {}: {e:#}", timer.assessment_id());
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("unknown error"))
        .context(format!(
            "gave up starting attempt '{}' after {} retries",
            timer.assessment_id(),
            max_retries
        )))
}
