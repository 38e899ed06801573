//! Forward projection of period, fertile window and ovulation.
//!
//! Everything is anchored on the start of the most recent cycle:
//! - next period starts `round(avg cycle length)` days after the anchor
//! - it lasts `round(avg period length)` days
//! - ovulation falls a fixed [`LUTEAL_PHASE_DAYS`] before the next period
//! - the fertile window is the [`FERTILE_DAYS_BEFORE_OVULATION`] days before
//!   ovulation; the ovulation day itself is reported separately

use crate::{Cycle, CycleStats};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Days between ovulation and the next period, regardless of cycle length
pub const LUTEAL_PHASE_DAYS: i64 = 14;

/// Length of the fertile window preceding ovulation
pub const FERTILE_DAYS_BEFORE_OVULATION: i64 = 5;

/// Predicted events derived from the most recent cycle.
///
/// There is no "empty" projection: without cycle history, or when a predicted
/// date would fall outside the supported calendar, callers get `None` from
/// [`Projection::from_cycles`] and must handle it.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Projection {
    /// Start of the most recent observed cycle
    pub anchor: NaiveDate,
    pub next_period_start: NaiveDate,
    pub next_period_end: NaiveDate,
    pub ovulation_day: NaiveDate,
    pub fertile_start: NaiveDate,
}

impl Projection {
    /// Project from the most recent cycle, or `None` without history
    pub fn from_cycles(cycles: &[Cycle], stats: &CycleStats) -> Option<Self> {
        let anchor = cycles.iter().map(|c| c.start_date).max()?;
        Self::from_anchor(anchor, stats)
    }

    /// `None` when any projected date leaves chrono's date range
    pub fn from_anchor(anchor: NaiveDate, stats: &CycleStats) -> Option<Self> {
        let cycle_length = stats.rounded_cycle_length();
        let period_length = stats.rounded_period_length();

        let shift = |date: NaiveDate, days: i64| date.checked_add_signed(Duration::days(days));
        let next_period_start = shift(anchor, cycle_length)?;
        let next_period_end = shift(next_period_start, period_length - 1)?;
        let ovulation_day = shift(anchor, cycle_length - LUTEAL_PHASE_DAYS)?;
        let fertile_start = shift(ovulation_day, -FERTILE_DAYS_BEFORE_OVULATION)?;

        tracing::debug!(
            "Projected from {}: period {}..={}, ovulation {}",
            anchor,
            next_period_start,
            next_period_end,
            ovulation_day
        );

        Some(Self {
            anchor,
            next_period_start,
            next_period_end,
            ovulation_day,
            fertile_start,
        })
    }

    /// Inclusive fertile interval; its last day is the ovulation day
    pub fn fertile_window(&self) -> (NaiveDate, NaiveDate) {
        (self.fertile_start, self.ovulation_day)
    }

    pub fn is_in_predicted_period(&self, date: NaiveDate) -> bool {
        date >= self.next_period_start && date <= self.next_period_end
    }

    /// Within the fertile interval but not the ovulation day
    pub fn is_fertile(&self, date: NaiveDate) -> bool {
        date >= self.fertile_start && date <= self.ovulation_day && date != self.ovulation_day
    }

    pub fn is_ovulation(&self, date: NaiveDate) -> bool {
        date == self.ovulation_day
    }

    /// Day of the current cycle, 1 on the anchor date.
    ///
    /// Dates before the anchor return `None`.
    pub fn cycle_day(&self, today: NaiveDate) -> Option<i64> {
        let elapsed = (today - self.anchor).num_days();
        (elapsed >= 0).then_some(elapsed + 1)
    }

    /// Days from `today` until the predicted period starts (negative once late)
    pub fn days_until_next_period(&self, today: NaiveDate) -> i64 {
        (self.next_period_start - today).num_days()
    }
}
