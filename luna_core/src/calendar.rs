//! Per-day calendar classification.
//!
//! Observed bleeding always wins over anything predicted for the same date.

use crate::{DailyLog, Error, Projection, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DayKind {
    Period,
    Ovulation,
    Fertile,
    PredictedPeriod,
    None,
}

impl DayKind {
    /// Single-character marker for compact month grids
    pub fn marker(&self) -> char {
        match self {
            DayKind::Period => '●',
            DayKind::Ovulation => '◆',
            DayKind::Fertile => '+',
            DayKind::PredictedPeriod => '○',
            DayKind::None => '·',
        }
    }
}

impl fmt::Display for DayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DayKind::Period => "period",
            DayKind::Ovulation => "ovulation",
            DayKind::Fertile => "fertile",
            DayKind::PredictedPeriod => "predicted-period",
            DayKind::None => "none",
        };
        f.write_str(s)
    }
}

/// Observed bleeding days plus the current projection
pub struct Calendar<'a> {
    bleeding: HashSet<NaiveDate>,
    projection: Option<&'a Projection>,
}

impl<'a> Calendar<'a> {
    pub fn new(logs: &[DailyLog], projection: Option<&'a Projection>) -> Self {
        let bleeding = logs
            .iter()
            .filter(|log| log.is_flow_positive())
            .map(|log| log.date)
            .collect();
        Self {
            bleeding,
            projection,
        }
    }

    pub fn classify(&self, date: NaiveDate) -> DayKind {
        if self.bleeding.contains(&date) {
            return DayKind::Period;
        }
        let Some(p) = self.projection else {
            return DayKind::None;
        };
        if p.is_ovulation(date) {
            DayKind::Ovulation
        } else if p.is_fertile(date) {
            DayKind::Fertile
        } else if p.is_in_predicted_period(date) {
            DayKind::PredictedPeriod
        } else {
            DayKind::None
        }
    }

    /// Every day of a month with its classification
    pub fn month(&self, year: i32, month: u32) -> Result<Vec<(NaiveDate, DayKind)>> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::invalid("month", format!("{}-{:02} is not a month", year, month)))?;

        Ok(first
            .iter_days()
            .take_while(|date| date.month() == month)
            .map(|date| (date, self.classify(date)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CycleStats, Flow};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn projection() -> Projection {
        // ovulation 2024-03-15, fertile 03-10..=03-14, period 03-29..=04-02
        Projection::from_anchor(d(2024, 3, 1), &CycleStats::default()).unwrap()
    }

    #[test]
    fn test_precedence() {
        let p = projection();
        let logs = vec![
            DailyLog::new(d(2024, 3, 15)).with_flow(Flow::Light),
            DailyLog::new(d(2024, 3, 12)).with_flow(Flow::None),
        ];
        let cal = Calendar::new(&logs, Some(&p));

        // Observed bleeding overrides the predicted ovulation day
        assert_eq!(cal.classify(d(2024, 3, 15)), DayKind::Period);
        // A "none" flow log is not bleeding
        assert_eq!(cal.classify(d(2024, 3, 12)), DayKind::Fertile);
        assert_eq!(cal.classify(d(2024, 3, 9)), DayKind::None);
        assert_eq!(cal.classify(d(2024, 3, 30)), DayKind::PredictedPeriod);
        assert_eq!(cal.classify(d(2024, 4, 3)), DayKind::None);

        let cal = Calendar::new(&[], Some(&p));
        assert_eq!(cal.classify(d(2024, 3, 15)), DayKind::Ovulation);
    }

    #[test]
    fn test_without_projection_only_observed() {
        let logs = vec![DailyLog::new(d(2024, 3, 1)).with_flow(Flow::Heavy)];
        let cal = Calendar::new(&logs, None);

        assert_eq!(cal.classify(d(2024, 3, 1)), DayKind::Period);
        assert_eq!(cal.classify(d(2024, 3, 15)), DayKind::None);
    }

    #[test]
    fn test_month_view() {
        let p = projection();
        let cal = Calendar::new(&[], Some(&p));

        let feb = cal.month(2024, 2).unwrap();
        assert_eq!(feb.len(), 29);

        let march = cal.month(2024, 3).unwrap();
        assert_eq!(march.len(), 31);
        let fertile = march.iter().filter(|(_, k)| *k == DayKind::Fertile).count();
        assert_eq!(fertile, 5);
        let predicted = march
            .iter()
            .filter(|(_, k)| *k == DayKind::PredictedPeriod)
            .count();
        assert_eq!(predicted, 3);

        assert!(cal.month(2024, 13).is_err());
    }

    #[test]
    fn test_last_month_of_calendar() {
        let cal = Calendar::new(&[], None);

        let last = cal.month(NaiveDate::MAX.year(), 12).unwrap();
        assert_eq!(last.len(), 31);
        assert_eq!(last.last().map(|(date, _)| *date), Some(NaiveDate::MAX));

        let first = cal.month(NaiveDate::MIN.year(), 1).unwrap();
        assert_eq!(first.len(), 31);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(DayKind::PredictedPeriod.to_string(), "predicted-period");
        assert_eq!(
            serde_json::to_string(&DayKind::PredictedPeriod).unwrap(),
            "\"predicted-period\""
        );
    }
}
