//! Time entry commands.

use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ph_core::{ClientId, EntryId, Hours};
use ph_db::{Database, TimeEntryRecord};
use uuid::Uuid;

use super::util::parse_datetime;

/// Arguments for adding a time entry.
pub struct AddArgs {
    pub client: String,
    pub hours: String,
    pub start: Option<String>,
    pub id: Option<String>,
    pub description: Option<String>,
}

/// Adds a time entry and prints its ID.
pub fn add(db: &mut Database, args: AddArgs) -> Result<()> {
    let client_id = ClientId::new(args.client).context("invalid client ID")?;
    db.get_client(&client_id)
        .context("failed to look up client")?
        .with_context(|| format!("unknown client: {client_id}"))?;

    let hours: Hours = args
        .hours
        .parse()
        .with_context(|| format!("invalid hours: {}", args.hours))?;
    let start = args.start.as_deref().map(parse_datetime).transpose()?;

    let id = match args.id {
        Some(id) => EntryId::new(id).context("invalid entry ID")?,
        None => EntryId::new(Uuid::new_v4().to_string()).context("invalid entry ID")?,
    };

    let record = TimeEntryRecord {
        id,
        client_id,
        start_time: start,
        duration_seconds: hours.to_seconds(),
        billable: true,
        description: args.description,
    };
    db.insert_entries(std::slice::from_ref(&record))
        .context("failed to save entry")?;
    println!("{}", record.id);
    Ok(())
}

/// Format entries for human-readable output.
pub fn format_entries(entries: &[TimeEntryRecord]) -> String {
    let mut output = String::new();

    if entries.is_empty() {
        writeln!(output, "No entries.").unwrap();
        return output;
    }

    writeln!(
        output,
        "{:<36}  {:<20}  {:>6}  {:>8}  Description",
        "ID", "Start", "Hours", "Billable"
    )
    .unwrap();
    for entry in entries {
        let start = entry
            .start_time
            .map_or_else(|| "-".to_string(), format_start);
        let billable = if entry.billable { "yes" } else { "no" };
        writeln!(
            output,
            "{:<36}  {:<20}  {:>6}  {:>8}  {}",
            entry.id,
            start,
            Hours::from_seconds(entry.duration_seconds).to_string(),
            billable,
            entry.description.as_deref().unwrap_or(""),
        )
        .unwrap();
    }

    output
}

fn format_start(start: DateTime<Utc>) -> String {
    start.format("%Y-%m-%d %H:%M").to_string()
}

/// Runs the entry list command.
pub fn list(
    db: &Database,
    client: &str,
    from: Option<&str>,
    to: Option<&str>,
    json: bool,
) -> Result<()> {
    let client_id = ClientId::new(client).context("invalid client ID")?;
    let from = from.map(parse_datetime).transpose()?;
    let to = to.map(parse_datetime).transpose()?;

    let entries = db
        .list_entries(&client_id, from, to)
        .context("failed to list entries")?;

    if json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "id": entry.id,
                    "client_id": entry.client_id,
                    "start_time": entry.start_time.map(|t| t.to_rfc3339()),
                    "duration_seconds": entry.duration_seconds,
                    "hours": Hours::from_seconds(entry.duration_seconds),
                    "billable": entry.billable,
                    "description": entry.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", format_entries(&entries));
    }

    Ok(())
}
