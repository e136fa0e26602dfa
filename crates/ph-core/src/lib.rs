//! Core domain logic for the prepaid hours tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Allocation: deciding, per time entry and billing cycle, how many hours
//!   draw from a client's prepaid pool versus bill at the normal rate
//! - The consumption ledger abstraction the engine records against
//! - Plan and billing-cycle resolution
//! - Fixed-point hour arithmetic (two-decimal hours, whole-second ledger)

mod allocation;
pub mod hours;
pub mod ledger;
pub mod plan;
pub mod types;

pub use allocation::{AllocationEngine, BillableEntry, ProcessOutcome, ProcessedTimeEntry};
pub use hours::{Hours, ParseHoursError};
pub use ledger::{LedgerRow, LedgerStore, PrepaidMonthSummary};
pub use plan::{PrepaidClient, PrepaidPlan, monthly_cycle_start};
pub use types::{ClientId, EntryId, InvoiceId, ValidationError};
