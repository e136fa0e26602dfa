//! CLI subcommand implementations.

pub mod allocate;
pub mod client;
pub mod entry;
pub mod ledger;
pub mod summary;
pub mod util;
