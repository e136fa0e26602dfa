//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Prepaid hours tracker.
///
/// Allocates each client's tracked time against their prepaid monthly pool
/// and keeps an auditable consumption ledger that survives invoice
/// regeneration.
#[derive(Debug, Parser)]
#[command(name = "ph", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage clients and their prepaid plans.
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },

    /// Manage time entries.
    Entry {
        #[command(subcommand)]
        action: EntryAction,
    },

    /// Allocate a client's entries against their prepaid pool.
    Allocate {
        /// The client to allocate for.
        #[arg(long)]
        client: String,

        /// Invoice to tie the allocations to. Re-running with the same
        /// invoice supersedes its previous allocations.
        #[arg(long)]
        invoice: Option<String>,

        /// Only allocate entries starting at or after this time
        /// (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,

        /// Only allocate entries starting before this time
        /// (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show per-cycle prepaid usage for a client.
    Summary {
        /// The client to summarize.
        #[arg(long)]
        client: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show consumption ledger rows for a client.
    Ledger {
        /// The client whose ledger to show.
        #[arg(long)]
        client: String,

        /// Restrict to one billing cycle by its start date (YYYY-MM-DD).
        #[arg(long, conflicts_with = "invoice")]
        month: Option<String>,

        /// Restrict to rows tied to one invoice.
        #[arg(long)]
        invoice: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Client management actions.
#[derive(Debug, Subcommand)]
pub enum ClientAction {
    /// Add or update a client.
    Add {
        /// The client ID.
        id: String,

        /// Human-readable name.
        #[arg(long)]
        name: Option<String>,

        /// Prepaid hours granted each billing cycle (e.g. 5 or 2.5).
        #[arg(long, default_value = "0")]
        prepaid_hours: String,

        /// Day of month the billing cycle starts on (1-31).
        #[arg(long, default_value_t = 1)]
        anchor_day: u32,

        /// Create the client with the prepaid plan disabled.
        #[arg(long)]
        disabled: bool,
    },

    /// List all clients.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Time entry actions.
#[derive(Debug, Subcommand)]
pub enum EntryAction {
    /// Add a time entry.
    Add {
        /// The client the entry belongs to.
        #[arg(long)]
        client: String,

        /// Duration in hours (e.g. 1.5).
        #[arg(long)]
        hours: String,

        /// When work started (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Entry ID; generated when omitted.
        #[arg(long)]
        id: Option<String>,

        /// Short description of the work.
        #[arg(long)]
        description: Option<String>,
    },

    /// List a client's time entries.
    List {
        /// The client whose entries to list.
        #[arg(long)]
        client: String,

        /// Only entries starting at or after this time
        /// (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,

        /// Only entries starting before this time (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
