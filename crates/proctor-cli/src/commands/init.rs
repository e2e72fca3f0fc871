//! The `proctor init` command.

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    let path = std::path::Path::new("proctor.toml");
    if path.exists() {
        println!("proctor.toml already exists, skipping.");
    } else {
        std::fs::write(path, SAMPLE_CONFIG).context("failed to write proctor.toml")?;
        println!("Created proctor.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point base_url at your LMS API and export PROCTOR_TOKEN");
    println!("  2. Run: proctor remaining --assessment <id>");
    println!("  3. Run: proctor run --assessment <id> --duration 1800");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# proctor configuration

base_url = "http://localhost:8000"
token = "${PROCTOR_TOKEN}"
request_timeout_secs = 30

# Countdown used when --duration is not given
default_duration_secs = 3600

# Local countdown tick and server resync periods
tick_interval_ms = 1000
resync_interval_ms = 10000

# Message the server returns once it has auto-submitted an attempt
auto_submit_message = "Assessment has been auto-submitted"

# Retries for a failed attempt start
max_retries = 3
retry_delay_ms = 1000
"#;
