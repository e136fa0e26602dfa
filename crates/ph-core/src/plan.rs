//! Prepaid plan and billing cycle resolution.
//!
//! The allocation engine consumes cycle resolution through the
//! [`PrepaidClient`] trait; it never computes cycle boundaries itself. The
//! canonical implementation is [`PrepaidPlan`], a monthly cycle anchored on a
//! day of the month.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::hours::Hours;
use crate::types::{ClientId, ValidationError};

/// A client with (or without) a prepaid hours plan.
///
/// This trait is the engine's view of the client entity: whether the plan is
/// active, how many hours each cycle grants, and which cycle a timestamp
/// falls in.
pub trait PrepaidClient {
    /// The client's identifier, used to key ledger rows.
    fn id(&self) -> &ClientId;

    /// Whether the prepaid plan is active.
    fn plan_enabled(&self) -> bool;

    /// The per-cycle allowance.
    fn plan_hours(&self) -> Hours;

    /// Maps a timestamp to the start date of the billing cycle containing it.
    fn cycle_start(&self, at: DateTime<Utc>) -> NaiveDate;
}

/// A monthly prepaid plan anchored on a day of the month.
///
/// Cycles run from the anchor day (clamped to the month's length) to the day
/// before the next month's anchor. An anchor day of 1 gives plain calendar
/// months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepaidPlan {
    client_id: ClientId,
    enabled: bool,
    hours_per_cycle: Hours,
    anchor_day: u32,
}

impl PrepaidPlan {
    /// Creates an active plan. The anchor day must be in 1..=31.
    pub fn new(
        client_id: ClientId,
        hours_per_cycle: Hours,
        anchor_day: u32,
    ) -> Result<Self, ValidationError> {
        if !(1..=31).contains(&anchor_day) {
            return Err(ValidationError::AnchorDayOutOfRange { value: anchor_day });
        }
        Ok(Self {
            client_id,
            enabled: true,
            hours_per_cycle,
            anchor_day,
        })
    }

    /// Creates a disabled plan: the engine passes every entry through at the
    /// normal rate, but cycle resolution stays available for display.
    #[must_use]
    pub const fn disabled(client_id: ClientId) -> Self {
        Self {
            client_id,
            enabled: false,
            hours_per_cycle: Hours::ZERO,
            anchor_day: 1,
        }
    }

    /// Returns the anchor day of month.
    #[must_use]
    pub const fn anchor_day(&self) -> u32 {
        self.anchor_day
    }
}

impl PrepaidClient for PrepaidPlan {
    fn id(&self) -> &ClientId {
        &self.client_id
    }

    fn plan_enabled(&self) -> bool {
        self.enabled
    }

    fn plan_hours(&self) -> Hours {
        self.hours_per_cycle
    }

    fn cycle_start(&self, at: DateTime<Utc>) -> NaiveDate {
        monthly_cycle_start(self.anchor_day, at)
    }
}

/// Maps a timestamp to the start of the anchored monthly cycle containing it.
///
/// Shared by [`PrepaidPlan`] and by storage-layer client records that carry
/// the same anchored-month plan shape.
#[must_use]
pub fn monthly_cycle_start(anchor_day: u32, at: DateTime<Utc>) -> NaiveDate {
    let date = at.date_naive();
    let anchor = month_anchor(date.year(), date.month(), anchor_day);
    if date >= anchor {
        anchor
    } else {
        let (year, month) = if date.month() == 1 {
            (date.year() - 1, 12)
        } else {
            (date.year(), date.month() - 1)
        };
        month_anchor(year, month, anchor_day)
    }
}

/// The anchor day within a given month, clamped to the month's length
/// (e.g. anchor 31 in February resolves to the 28th or 29th).
fn month_anchor(year: i32, month: u32, anchor_day: u32) -> NaiveDate {
    (1..=anchor_day.min(31))
        .rev()
        .find_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn plan(anchor_day: u32) -> PrepaidPlan {
        PrepaidPlan::new(
            ClientId::new("acme").unwrap(),
            Hours::from_centihours(500),
            anchor_day,
        )
        .unwrap()
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }

    #[test]
    fn anchor_day_one_gives_calendar_months() {
        let plan = plan(1);
        assert_eq!(plan.cycle_start(at(2025, 3, 1)), date(2025, 3, 1));
        assert_eq!(plan.cycle_start(at(2025, 3, 31)), date(2025, 3, 1));
    }

    #[test]
    fn timestamps_before_anchor_fall_in_previous_cycle() {
        let plan = plan(15);
        assert_eq!(plan.cycle_start(at(2025, 3, 14)), date(2025, 2, 15));
        assert_eq!(plan.cycle_start(at(2025, 3, 15)), date(2025, 3, 15));
        assert_eq!(plan.cycle_start(at(2025, 3, 16)), date(2025, 3, 15));
    }

    #[test]
    fn january_wraps_to_previous_year() {
        let plan = plan(15);
        assert_eq!(plan.cycle_start(at(2025, 1, 10)), date(2024, 12, 15));
    }

    #[test]
    fn anchor_clamps_to_month_length() {
        let plan = plan(31);
        // February has no 31st; the cycle starts on the 28th.
        assert_eq!(plan.cycle_start(at(2025, 2, 28)), date(2025, 2, 28));
        assert_eq!(plan.cycle_start(at(2025, 2, 27)), date(2025, 1, 31));
        // Leap year.
        assert_eq!(plan.cycle_start(at(2024, 2, 29)), date(2024, 2, 29));
    }

    #[test]
    fn rejects_out_of_range_anchor() {
        let client = ClientId::new("acme").unwrap();
        assert!(PrepaidPlan::new(client.clone(), Hours::ZERO, 0).is_err());
        assert!(PrepaidPlan::new(client, Hours::ZERO, 32).is_err());
    }

    #[test]
    fn disabled_plan_still_resolves_cycles() {
        let plan = PrepaidPlan::disabled(ClientId::new("acme").unwrap());
        assert!(!plan.plan_enabled());
        assert_eq!(plan.cycle_start(at(2025, 6, 20)), date(2025, 6, 1));
    }
}
