//! Per-cycle prepaid usage summary.

use std::fmt::Write;

use anyhow::{Context, Result};
use ph_core::{AllocationEngine, ClientId, PrepaidMonthSummary};
use ph_db::Database;

/// Builds the usage summary for all of a client's entries.
pub fn build(db: &mut Database, client_id: &ClientId) -> Result<Vec<PrepaidMonthSummary>> {
    let client = db
        .get_client(client_id)
        .context("failed to look up client")?
        .with_context(|| format!("unknown client: {client_id}"))?;

    let entries = db
        .list_entries(client_id, None, None)
        .context("failed to list entries")?;

    let engine = AllocationEngine::new(Some(&client), None, db);
    engine
        .build_summary(&entries)
        .context("failed to build summary")
}

/// Format summaries for human-readable output.
pub fn format_summaries(summaries: &[PrepaidMonthSummary]) -> String {
    let mut output = String::new();

    if summaries.is_empty() {
        writeln!(output, "No prepaid usage: no active plan or no dated entries.").unwrap();
        return output;
    }

    writeln!(
        output,
        "{:<10}  {:>7}  {:>8}  {:>9}",
        "Cycle", "Plan", "Consumed", "Remaining"
    )
    .unwrap();
    for summary in summaries {
        writeln!(
            output,
            "{:<10}  {:>7}  {:>8}  {:>9}",
            summary.allocation_month.format("%Y-%m-%d").to_string(),
            summary.plan_hours.to_string(),
            summary.consumed_hours.to_string(),
            summary.remaining_hours.to_string(),
        )
        .unwrap();
    }

    output
}

/// Runs the summary command.
pub fn run(db: &mut Database, client: &str, json: bool) -> Result<()> {
    let client_id = ClientId::new(client).context("invalid client ID")?;
    let summaries = build(db, &client_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        print!("{}", format_summaries(&summaries));
    }

    Ok(())
}
