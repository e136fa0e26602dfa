use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ph_cli::commands::{allocate, client, entry, ledger, summary};
use ph_cli::{Cli, ClientAction, Commands, Config, EntryAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(ph_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = ph_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match cli.command {
        Some(Commands::Client { action }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                ClientAction::Add {
                    id,
                    name,
                    prepaid_hours,
                    anchor_day,
                    disabled,
                } => client::add(
                    &mut db,
                    client::AddArgs {
                        id,
                        name,
                        prepaid_hours,
                        anchor_day,
                        disabled,
                    },
                )?,
                ClientAction::List { json } => client::list(&db, json)?,
            }
        }
        Some(Commands::Entry { action }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                EntryAction::Add {
                    client,
                    hours,
                    start,
                    id,
                    description,
                } => entry::add(
                    &mut db,
                    entry::AddArgs {
                        client,
                        hours,
                        start,
                        id,
                        description,
                    },
                )?,
                EntryAction::List {
                    client,
                    from,
                    to,
                    json,
                } => entry::list(&db, &client, from.as_deref(), to.as_deref(), json)?,
            }
        }
        Some(Commands::Allocate {
            client,
            invoice,
            from,
            to,
            json,
        }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            allocate::run(
                &mut db,
                allocate::RunArgs {
                    client,
                    invoice,
                    from,
                    to,
                    json,
                },
            )?;
        }
        Some(Commands::Summary { client, json }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            summary::run(&mut db, &client, json)?;
        }
        Some(Commands::Ledger {
            client,
            month,
            invoice,
            json,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            ledger::run(
                &db,
                ledger::RunArgs {
                    client,
                    month,
                    invoice,
                    json,
                },
            )?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
