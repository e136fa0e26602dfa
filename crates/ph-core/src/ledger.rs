//! Consumption ledger abstraction.
//!
//! One ledger row records the prepaid portion (in whole seconds) that a
//! single time entry drew from a client's cycle allowance, optionally tagged
//! with the invoice that generated it. Rows are created by the allocation
//! engine, deleted in bulk when an invoice's allocation is reset, and never
//! updated in place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::hours::Hours;
use crate::types::{ClientId, EntryId, InvoiceId};

/// A single consumption ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub client_id: ClientId,
    pub entry_id: EntryId,
    /// The invoice this allocation belongs to, if it was made while
    /// generating one. `None` for ad hoc allocation runs.
    pub invoice_id: Option<InvoiceId>,
    /// The cycle key: start date of the billing cycle the hours were drawn
    /// from.
    pub allocation_month: NaiveDate,
    /// The prepaid portion only, in whole seconds.
    pub seconds_consumed: i64,
}

/// Persistence contract for the consumption ledger.
///
/// The engine performs a bounded, sequential series of calls against this
/// trait during one allocation run; the store decides how they map onto the
/// surrounding transaction.
pub trait LedgerStore {
    type Error: std::error::Error;

    /// Deletes every ledger row tied to `invoice` for `client` and restores
    /// the persisted `billable` flag on the time entries those rows
    /// referenced. Implementations must flush the deletion before returning
    /// so that subsequent reads in the same run observe it.
    ///
    /// Returns the IDs of the entries whose flags were restored.
    fn reset_invoice(
        &mut self,
        client: &ClientId,
        invoice: &InvoiceId,
    ) -> Result<Vec<EntryId>, Self::Error>;

    /// Sums `seconds_consumed` over the client's rows for one cycle,
    /// excluding rows tied to `exclude_invoice` (the invoice currently being
    /// regenerated). Rows without an invoice always count.
    fn consumed_seconds(
        &self,
        client: &ClientId,
        cycle: NaiveDate,
        exclude_invoice: Option<&InvoiceId>,
    ) -> Result<i64, Self::Error>;

    /// Appends one allocation row.
    fn record(&mut self, row: LedgerRow) -> Result<(), Self::Error>;
}

/// Read-only usage projection for one billing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepaidMonthSummary {
    pub allocation_month: NaiveDate,
    pub plan_hours: Hours,
    pub consumed_hours: Hours,
    /// Allowance left in the cycle; never negative.
    pub remaining_hours: Hours,
}
