//! Prepaid hours tracker CLI library.
//!
//! This crate provides the CLI interface for the prepaid hours tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, ClientAction, Commands, EntryAction};
pub use config::Config;
