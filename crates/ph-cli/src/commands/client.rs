//! Client management commands.

use std::fmt::Write;

use anyhow::{Context, Result};
use ph_core::{ClientId, Hours};
use ph_db::{ClientRecord, Database};

/// Arguments for adding or updating a client.
pub struct AddArgs {
    pub id: String,
    pub name: Option<String>,
    pub prepaid_hours: String,
    pub anchor_day: u32,
    pub disabled: bool,
}

/// Adds or updates a client and prints its ID.
pub fn add(db: &mut Database, args: AddArgs) -> Result<()> {
    if !(1..=31).contains(&args.anchor_day) {
        anyhow::bail!("anchor day must be between 1 and 31, got {}", args.anchor_day);
    }
    let hours: Hours = args
        .prepaid_hours
        .parse()
        .with_context(|| format!("invalid prepaid hours: {}", args.prepaid_hours))?;

    let record = ClientRecord {
        id: ClientId::new(args.id).context("invalid client ID")?,
        name: args.name,
        prepaid_enabled: !args.disabled,
        prepaid_hours_monthly: hours,
        cycle_anchor_day: args.anchor_day,
    };
    db.upsert_client(&record).context("failed to save client")?;
    println!("{}", record.id);
    Ok(())
}

/// Format clients for human-readable output.
pub fn format_clients(clients: &[ClientRecord]) -> String {
    let mut output = String::new();

    if clients.is_empty() {
        writeln!(output, "No clients.").unwrap();
        writeln!(output).unwrap();
        writeln!(output, "Hint: Run 'ph client add <id> --prepaid-hours 5' to add one.").unwrap();
        return output;
    }

    writeln!(
        output,
        "{:<16}  {:<22}  {:>7}  {:>8}  {:>6}",
        "ID", "Name", "Plan", "Hours/mo", "Anchor"
    )
    .unwrap();
    for client in clients {
        let name = client.name.as_deref().unwrap_or("(unnamed)");
        let plan = if client.prepaid_enabled { "active" } else { "off" };
        writeln!(
            output,
            "{:<16}  {:<22}  {:>7}  {:>8}  {:>6}",
            client.id,
            name,
            plan,
            client.prepaid_hours_monthly.to_string(),
            client.cycle_anchor_day,
        )
        .unwrap();
    }

    output
}

/// Runs the client list command.
pub fn list(db: &Database, json: bool) -> Result<()> {
    let clients = db.list_clients().context("failed to list clients")?;

    if json {
        let rows: Vec<serde_json::Value> = clients
            .iter()
            .map(|client| {
                serde_json::json!({
                    "id": client.id,
                    "name": client.name,
                    "prepaid_enabled": client.prepaid_enabled,
                    "prepaid_hours_monthly": client.prepaid_hours_monthly,
                    "cycle_anchor_day": client.cycle_anchor_day,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", format_clients(&clients));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_args(id: &str, hours: &str) -> AddArgs {
        AddArgs {
            id: id.to_string(),
            name: Some("Acme Corp".to_string()),
            prepaid_hours: hours.to_string(),
            anchor_day: 1,
            disabled: false,
        }
    }

    #[test]
    fn add_persists_the_client() {
        let mut db = Database::open_in_memory().unwrap();
        add(&mut db, add_args("acme", "5")).unwrap();

        let stored = db
            .get_client(&ClientId::new("acme").unwrap())
            .unwrap()
            .expect("client exists");
        assert!(stored.prepaid_enabled);
        assert_eq!(stored.prepaid_hours_monthly, Hours::from_centihours(500));
    }

    #[test]
    fn add_rejects_bad_hours_and_anchor() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(add(&mut db, add_args("acme", "abc")).is_err());

        let mut args = add_args("acme", "5");
        args.anchor_day = 0;
        assert!(add(&mut db, args).is_err());
    }

    #[test]
    fn format_lists_plan_state() {
        let clients = vec![
            ClientRecord {
                id: ClientId::new("acme").unwrap(),
                name: Some("Acme Corp".to_string()),
                prepaid_enabled: true,
                prepaid_hours_monthly: Hours::from_centihours(500),
                cycle_anchor_day: 1,
            },
            ClientRecord {
                id: ClientId::new("globex").unwrap(),
                name: None,
                prepaid_enabled: false,
                prepaid_hours_monthly: Hours::ZERO,
                cycle_anchor_day: 15,
            },
        ];
        let output = format_clients(&clients);
        assert!(output.contains("active"));
        assert!(output.contains("off"));
        assert!(output.contains("(unnamed)"));
    }

    #[test]
    fn format_empty_shows_hint() {
        let output = format_clients(&[]);
        assert!(output.contains("No clients."));
    }
}
