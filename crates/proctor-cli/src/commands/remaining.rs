//! The `proctor remaining` command.

use std::path::PathBuf;

use anyhow::Result;
use futures::future::join_all;

use proctor_client::create_backend;
use proctor_core::{format_clock, TimeRemaining};

/// Outcome of one remaining-time query.
struct Row {
    assessment_id: String,
    seconds: Option<u64>,
    status: &'static str,
    error: Option<String>,
}

impl Row {
    fn new(assessment_id: &str, result: Result<TimeRemaining>, sentinel: &str) -> Self {
        let (seconds, status, error) = match result {
            Ok(report) if report.is_auto_submitted(sentinel) => (Some(0), "auto-submitted", None),
            Ok(report) => match report.authoritative_seconds() {
                Some(0) => (Some(0), "expired", None),
                Some(seconds) => (Some(seconds), "running", None),
                None => (
                    None,
                    "error",
                    Some("response carried no remaining time".to_string()),
                ),
            },
            Err(e) => (None, "error", Some(format!("{e:#}"))),
        };

        Self {
            assessment_id: assessment_id.to_string(),
            seconds,
            status,
            error,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "assessment_id": self.assessment_id,
            "seconds_remaining": self.seconds,
            "status": self.status,
            "error": self.error,
        })
    }
}

pub async fn execute(
    assessments: String,
    format: String,
    api_url: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let ids: Vec<&str> = assessments
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    anyhow::ensure!(!ids.is_empty(), "at least one assessment id is required");

    let config = super::load_config(api_url, config_path.as_deref())?;
    let backend = create_backend(&config)?;

    let results = join_all(ids.iter().map(|id| backend.time_remaining(id))).await;
    let rows: Vec<Row> = ids
        .iter()
        .zip(results)
        .map(|(id, result)| Row::new(id, result, &config.auto_submit_message))
        .collect();

    match format.as_str() {
        "json" => {
            let json: Vec<serde_json::Value> = rows.iter().map(Row::to_json).collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => print_table(&rows),
    }

    let failed = rows.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        for row in rows.iter().filter(|r| r.error.is_some()) {
            eprintln!(
                "  {}: {}",
                row.assessment_id,
                row.error.as_deref().unwrap_or_default()
            );
        }
        anyhow::bail!("{failed} of {} queries failed", rows.len());
    }

    Ok(())
}

fn print_table(rows: &[Row]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Assessment", "Remaining", "Status"]);

    for row in rows {
        table.add_row(vec![
            Cell::new(&row.assessment_id),
            Cell::new(row.seconds.map(format_clock).unwrap_or_else(|| "-".into())),
            Cell::new(row.status),
        ]);
    }

    println!("{table}");
}
