//! Consumption ledger inspection.

use std::fmt::Write;

use anyhow::{Context, Result};
use ph_core::{ClientId, Hours, InvoiceId, LedgerRow};
use ph_db::Database;

use super::util::parse_date;

/// Arguments for the ledger command.
pub struct RunArgs {
    pub client: String,
    pub month: Option<String>,
    pub invoice: Option<String>,
    pub json: bool,
}

/// Format ledger rows for human-readable output.
pub fn format_rows(rows: &[LedgerRow]) -> String {
    let mut output = String::new();

    if rows.is_empty() {
        writeln!(output, "No ledger rows.").unwrap();
        return output;
    }

    writeln!(
        output,
        "{:<10}  {:<36}  {:<16}  {:>8}  {:>7}",
        "Cycle", "Entry", "Invoice", "Seconds", "Hours"
    )
    .unwrap();
    let mut total_seconds = 0;
    for row in rows {
        let invoice = row
            .invoice_id
            .as_ref()
            .map_or("-", ph_core::InvoiceId::as_str);
        writeln!(
            output,
            "{:<10}  {:<36}  {:<16}  {:>8}  {:>7}",
            row.allocation_month.format("%Y-%m-%d").to_string(),
            row.entry_id,
            invoice,
            row.seconds_consumed,
            Hours::from_seconds(row.seconds_consumed).to_string(),
        )
        .unwrap();
        total_seconds += row.seconds_consumed;
    }

    writeln!(output).unwrap();
    writeln!(
        output,
        "Total consumed: {} h ({total_seconds} s)",
        Hours::from_seconds(total_seconds)
    )
    .unwrap();

    output
}

/// Runs the ledger command.
pub fn run(db: &Database, args: RunArgs) -> Result<()> {
    let client_id = ClientId::new(args.client).context("invalid client ID")?;

    let rows = if let Some(invoice) = args.invoice {
        let invoice = InvoiceId::new(invoice).context("invalid invoice ID")?;
        db.ledger_rows_for_invoice(&client_id, &invoice)
    } else if let Some(month) = args.month {
        let cycle = parse_date(&month)?;
        db.ledger_rows_for_cycle(&client_id, cycle)
    } else {
        db.ledger_rows_for_client(&client_id)
    }
    .context("failed to read ledger")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", format_rows(&rows));
    }

    Ok(())
}
