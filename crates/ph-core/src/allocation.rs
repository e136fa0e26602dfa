//! Prepaid hours allocation.
//!
//! Given a client with a monthly prepaid plan, decides per time entry how
//! many hours are drawn from the cycle's prepaid pool versus billed at the
//! normal rate, and keeps the consumption ledger reconciled so that
//! recomputing an invoice's allocation is idempotent.
//!
//! # Algorithm Summary
//!
//! 1. Sort entries chronologically (missing start times first)
//! 2. Reset any ledger rows tied to the invoice being regenerated
//! 3. Load competing consumption per touched cycle, excluding that invoice
//! 4. Walk entries in order, claiming prepaid hours against the remaining
//!    allowance and recording one ledger row per claim

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::hours::Hours;
use crate::ledger::{LedgerRow, LedgerStore, PrepaidMonthSummary};
use crate::plan::PrepaidClient;
use crate::types::{EntryId, InvoiceId};

/// A time entry suitable for allocation.
///
/// This trait allows the engine to work with different entry representations
/// (e.g., stored rows from ph-db, or test fixtures). The `billable` flag is
/// the one piece of entry state the engine mutates: it is overwritten in
/// memory during allocation, and the caller owns persisting it.
pub trait BillableEntry {
    /// Returns the entry's identifier.
    fn id(&self) -> &EntryId;

    /// Returns when work started, if known.
    fn start_time(&self) -> Option<DateTime<Utc>>;

    /// Returns the entry's duration in seconds.
    fn duration_seconds(&self) -> i64;

    /// Returns the current billable flag.
    fn billable(&self) -> bool;

    /// Overwrites the billable flag.
    fn set_billable(&mut self, billable: bool);
}

/// Per-entry allocation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedTimeEntry {
    pub entry_id: EntryId,
    /// Start date of the cycle the entry was allocated against. `None` when
    /// the entry has no start time or no client reference was given.
    pub allocation_month: Option<NaiveDate>,
    pub prepaid_hours: Hours,
    pub billable_hours: Hours,
}

/// Result of one allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    /// One result per input entry, in chronological order.
    pub entries: Vec<ProcessedTimeEntry>,
    /// Sum of prepaid hours claimed across all entries.
    pub total_prepaid_hours: Hours,
}

/// The allocation engine, bound to a client and optionally to the invoice
/// being (re)generated.
///
/// The engine is synchronous and keeps its per-cycle "consumed so far" cache
/// local to a single [`process`](Self::process) call; nothing is shared
/// across calls. It provides no locking: two concurrent runs for the same
/// client and overlapping cycles can both observe the same remaining
/// allowance, so callers must serialize allocation per client.
pub struct AllocationEngine<'a, C, L> {
    client: Option<&'a C>,
    invoice: Option<InvoiceId>,
    ledger: &'a mut L,
}

impl<'a, C: PrepaidClient, L: LedgerStore> AllocationEngine<'a, C, L> {
    /// Creates an engine. With `client` absent or its plan disabled, the
    /// engine runs in pass-through mode: every hour bills at the normal rate
    /// and nothing is persisted.
    pub fn new(client: Option<&'a C>, invoice: Option<InvoiceId>, ledger: &'a mut L) -> Self {
        Self {
            client,
            invoice,
            ledger,
        }
    }

    /// Allocates prepaid hours to `entries`.
    ///
    /// Entries are sorted in place by ascending start time (entries without a
    /// start time first); results come back in that order, one per entry.
    /// Earliest-started entries have first claim on a cycle's pool; no other
    /// priority applies.
    ///
    /// Side effects: ledger rows are created (and the bound invoice's prior
    /// rows deleted), and each allocated entry's `billable` flag is
    /// overwritten in memory. The caller owns the commit boundary; only the
    /// idempotency reset is flushed eagerly.
    ///
    /// An empty slice returns an empty outcome without touching the ledger:
    /// the bound invoice's prior rows are only superseded when there are
    /// entries to allocate in their place.
    pub fn process<E: BillableEntry>(
        &mut self,
        entries: &mut [E],
    ) -> Result<ProcessOutcome, L::Error> {
        if entries.is_empty() {
            return Ok(ProcessOutcome {
                entries: Vec::new(),
                total_prepaid_hours: Hours::ZERO,
            });
        }
        entries.sort_by_key(BillableEntry::start_time);

        let Some(client) = self.client.filter(|client| client.plan_enabled()) else {
            return Ok(self.pass_through(entries));
        };

        if let Some(invoice) = &self.invoice {
            let restored = self.ledger.reset_invoice(client.id(), invoice)?;
            tracing::debug!(
                invoice = %invoice,
                entries_restored = restored.len(),
                "reset prior invoice allocations"
            );
        }

        // Competing consumption per touched cycle, loaded once and then
        // advanced in memory as this run claims hours.
        let mut consumed = self.load_consumed(client, entries)?;

        let plan_hours = client.plan_hours();
        let mut results = Vec::with_capacity(entries.len());
        let mut total_prepaid = Hours::ZERO;

        for entry in entries.iter_mut() {
            let hours = Hours::from_seconds(entry.duration_seconds());
            let cycle = entry.start_time().map(|start| client.cycle_start(start));

            let Some(cycle) = cycle else {
                results.push(zero_allocation(entry, None, hours));
                continue;
            };
            if !hours.is_positive() {
                results.push(zero_allocation(entry, Some(cycle), hours));
                continue;
            }

            let consumed_so_far = consumed.entry(cycle).or_insert(Hours::ZERO);
            let remaining = plan_hours.saturating_sub(*consumed_so_far);
            let prepaid = hours.min(remaining);
            let billable = hours - prepaid;

            if prepaid.is_positive() {
                self.ledger.record(LedgerRow {
                    client_id: client.id().clone(),
                    entry_id: entry.id().clone(),
                    invoice_id: self.invoice.clone(),
                    allocation_month: cycle,
                    seconds_consumed: prepaid.to_seconds(),
                })?;
                *consumed_so_far += prepaid;
                entry.set_billable(billable.is_positive());
            } else {
                entry.set_billable(true);
            }

            total_prepaid += prepaid;
            results.push(ProcessedTimeEntry {
                entry_id: entry.id().clone(),
                allocation_month: Some(cycle),
                prepaid_hours: prepaid,
                billable_hours: billable,
            });
        }

        tracing::debug!(
            entry_count = results.len(),
            total_prepaid = %total_prepaid,
            "allocation complete"
        );

        Ok(ProcessOutcome {
            entries: results,
            total_prepaid_hours: total_prepaid,
        })
    }

    /// Builds the per-cycle usage projection for `entries`.
    ///
    /// Read-only: computes consumed/remaining with the same
    /// competing-consumption rule as [`process`](Self::process) (still
    /// excluding the bound invoice's rows), but resets nothing, writes
    /// nothing, and leaves entries untouched. Returns one summary per
    /// distinct cycle, sorted by cycle start; empty when the plan is
    /// disabled or no client is bound.
    pub fn build_summary<E: BillableEntry>(
        &self,
        entries: &[E],
    ) -> Result<Vec<PrepaidMonthSummary>, L::Error> {
        let Some(client) = self.client.filter(|client| client.plan_enabled()) else {
            return Ok(Vec::new());
        };

        let cycles: BTreeSet<NaiveDate> = entries
            .iter()
            .filter_map(BillableEntry::start_time)
            .map(|start| client.cycle_start(start))
            .collect();

        let plan_hours = client.plan_hours();
        let mut summaries = Vec::with_capacity(cycles.len());
        for cycle in cycles {
            let seconds =
                self.ledger
                    .consumed_seconds(client.id(), cycle, self.invoice.as_ref())?;
            let consumed_hours = Hours::from_seconds(seconds);
            summaries.push(PrepaidMonthSummary {
                allocation_month: cycle,
                plan_hours,
                consumed_hours,
                remaining_hours: plan_hours.saturating_sub(consumed_hours),
            });
        }
        Ok(summaries)
    }

    /// Pass-through mode: full duration billable, no prepaid draw, no ledger
    /// or flag mutation. With a client bound (plan merely disabled) the
    /// allocation month is still resolved for display; with no client it is
    /// `None`.
    fn pass_through<E: BillableEntry>(&self, entries: &[E]) -> ProcessOutcome {
        let results = entries
            .iter()
            .map(|entry| {
                let hours = Hours::from_seconds(entry.duration_seconds());
                let cycle = self.client.and_then(|client| {
                    entry.start_time().map(|start| client.cycle_start(start))
                });
                zero_allocation(entry, cycle, hours)
            })
            .collect();
        ProcessOutcome {
            entries: results,
            total_prepaid_hours: Hours::ZERO,
        }
    }

    fn load_consumed<E: BillableEntry>(
        &self,
        client: &C,
        entries: &[E],
    ) -> Result<BTreeMap<NaiveDate, Hours>, L::Error> {
        let cycles: BTreeSet<NaiveDate> = entries
            .iter()
            .filter_map(BillableEntry::start_time)
            .map(|start| client.cycle_start(start))
            .collect();

        let mut consumed = BTreeMap::new();
        for cycle in cycles {
            let seconds =
                self.ledger
                    .consumed_seconds(client.id(), cycle, self.invoice.as_ref())?;
            consumed.insert(cycle, Hours::from_seconds(seconds));
        }
        tracing::debug!(cycle_count = consumed.len(), "loaded competing consumption");
        Ok(consumed)
    }
}

fn zero_allocation<E: BillableEntry>(
    entry: &E,
    cycle: Option<NaiveDate>,
    hours: Hours,
) -> ProcessedTimeEntry {
    ProcessedTimeEntry {
        entry_id: entry.id().clone(),
        allocation_month: cycle,
        prepaid_hours: Hours::ZERO,
        billable_hours: if hours.is_positive() { hours } else { Hours::ZERO },
    }
}
