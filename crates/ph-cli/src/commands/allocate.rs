//! Allocation command.
//!
//! Loads a client's time entries, runs the allocation engine against the
//! stored consumption ledger, and persists the resulting billable flags.

use std::fmt::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ph_core::{AllocationEngine, ClientId, InvoiceId, ProcessOutcome};
use ph_db::Database;

use super::util::parse_datetime;

/// Arguments for an allocation run.
pub struct RunArgs {
    pub client: String,
    pub invoice: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub json: bool,
}

/// Loads entries, allocates, and writes back billable flags.
///
/// Returns the allocation outcome so callers (and tests) can inspect it.
pub fn allocate(
    db: &mut Database,
    client_id: &ClientId,
    invoice: Option<InvoiceId>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<ProcessOutcome> {
    let client = db
        .get_client(client_id)
        .context("failed to look up client")?
        .with_context(|| format!("unknown client: {client_id}"))?;

    let mut entries = db
        .list_entries(client_id, from, to)
        .context("failed to list entries")?;

    tracing::debug!(
        client = %client_id,
        entry_count = entries.len(),
        "loaded entries for allocation"
    );

    let outcome = AllocationEngine::new(Some(&client), invoice, db)
        .process(&mut entries)
        .context("allocation failed")?;

    db.update_billable_flags(&entries)
        .context("failed to update billable flags")?;

    Ok(outcome)
}

/// Format an allocation outcome for human-readable output.
pub fn format_outcome(outcome: &ProcessOutcome) -> String {
    let mut output = String::new();

    if outcome.entries.is_empty() {
        writeln!(output, "No entries to allocate.").unwrap();
        return output;
    }

    writeln!(
        output,
        "{:<36}  {:<10}  {:>7}  {:>8}",
        "Entry", "Cycle", "Prepaid", "Billable"
    )
    .unwrap();
    for entry in &outcome.entries {
        let cycle = entry
            .allocation_month
            .map_or_else(|| "-".to_string(), |m| m.format("%Y-%m-%d").to_string());
        writeln!(
            output,
            "{:<36}  {:<10}  {:>7}  {:>8}",
            entry.entry_id,
            cycle,
            entry.prepaid_hours.to_string(),
            entry.billable_hours.to_string(),
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(
        output,
        "Total prepaid: {} h across {} entries",
        outcome.total_prepaid_hours,
        outcome.entries.len()
    )
    .unwrap();

    output
}

/// Runs the allocate command.
pub fn run(db: &mut Database, args: RunArgs) -> Result<()> {
    let client_id = ClientId::new(args.client).context("invalid client ID")?;
    let invoice = args
        .invoice
        .map(InvoiceId::new)
        .transpose()
        .context("invalid invoice ID")?;
    let from = args.from.as_deref().map(parse_datetime).transpose()?;
    let to = args.to.as_deref().map(parse_datetime).transpose()?;

    let outcome = allocate(db, &client_id, invoice, from, to)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", format_outcome(&outcome));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ph_core::{EntryId, Hours};
    use ph_db::{ClientRecord, TimeEntryRecord};

    fn seed(db: &mut Database, plan_centihours: i64) -> ClientId {
        let id = ClientId::new("acme").unwrap();
        db.upsert_client(&ClientRecord {
            id: id.clone(),
            name: None,
            prepaid_enabled: true,
            prepaid_hours_monthly: Hours::from_centihours(plan_centihours),
            cycle_anchor_day: 1,
        })
        .unwrap();
        id
    }

    fn entry(id: &str, minutes_offset: i64, seconds: i64) -> TimeEntryRecord {
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()
            + chrono::Duration::minutes(minutes_offset);
        TimeEntryRecord {
            id: EntryId::new(id).unwrap(),
            client_id: ClientId::new("acme").unwrap(),
            start_time: Some(start),
            duration_seconds: seconds,
            billable: true,
            description: None,
        }
    }

    #[test]
    fn allocate_persists_flags_and_ledger() {
        let mut db = Database::open_in_memory().unwrap();
        let client_id = seed(&mut db, 500);
        db.insert_entries(&[entry("e1", 0, 3 * 3600), entry("e2", 60, 4 * 3600)])
            .unwrap();

        let outcome = allocate(&mut db, &client_id, None, None, None).unwrap();
        assert_eq!(outcome.total_prepaid_hours, Hours::from_centihours(500));

        // e1 fully prepaid, e2 split.
        let entries = db.list_entries(&client_id, None, None).unwrap();
        let e1 = entries.iter().find(|e| e.id.as_str() == "e1").unwrap();
        let e2 = entries.iter().find(|e| e.id.as_str() == "e2").unwrap();
        assert!(!e1.billable);
        assert!(e2.billable);

        let rows = db.ledger_rows_for_client(&client_id).unwrap();
        let total: i64 = rows.iter().map(|r| r.seconds_consumed).sum();
        assert_eq!(total, 18_000);
    }

    #[test]
    fn allocate_unknown_client_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let id = ClientId::new("nobody").unwrap();
        assert!(allocate(&mut db, &id, None, None, None).is_err());
    }

    #[test]
    fn format_reports_totals() {
        let mut db = Database::open_in_memory().unwrap();
        let client_id = seed(&mut db, 500);
        db.insert_entries(&[entry("e1", 0, 3600)]).unwrap();

        let outcome = allocate(&mut db, &client_id, None, None, None).unwrap();
        let output = format_outcome(&outcome);
        assert!(output.contains("Total prepaid: 1.00 h"));
    }
}
