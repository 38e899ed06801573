//! Aggregate statistics over a user's cycles.

use crate::Cycle;
use serde::Serialize;
use std::fmt;

/// Cycle length assumed when no cycle has a known length yet
pub const DEFAULT_CYCLE_LENGTH: f64 = 28.0;

/// Period length assumed when no cycles exist
pub const DEFAULT_PERIOD_LENGTH: f64 = 5.0;

/// Qualitative bucket for cycle-length variability
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Regularity {
    High,
    Moderate,
    Low,
}

impl Regularity {
    /// High up to 2 days of deviation, Moderate up to 5, Low beyond
    pub fn from_variability(variability: f64) -> Self {
        if variability <= 2.0 {
            Regularity::High
        } else if variability <= 5.0 {
            Regularity::Moderate
        } else {
            Regularity::Low
        }
    }
}

impl fmt::Display for Regularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regularity::High => "High",
            Regularity::Moderate => "Moderate",
            Regularity::Low => "Low",
        };
        f.write_str(s)
    }
}

/// Snapshot computed on read, never stored.
///
/// Means are kept unrounded; use the `rounded_*` accessors for anything shown
/// to a user or used for date arithmetic.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CycleStats {
    pub average_cycle_length: f64,
    pub average_period_length: f64,
    pub variability: f64,
    /// Cycles with a known length (all but the most recent)
    pub completed_cycles: usize,
    pub total_cycles: usize,
}

impl CycleStats {
    pub fn from_cycles(cycles: &[Cycle]) -> Self {
        let lengths: Vec<f64> = cycles
            .iter()
            .filter_map(|c| c.cycle_length)
            .map(f64::from)
            .collect();

        let average_cycle_length = mean(&lengths).unwrap_or(DEFAULT_CYCLE_LENGTH);

        let periods: Vec<f64> = cycles.iter().map(|c| f64::from(c.period_length)).collect();
        let average_period_length = mean(&periods).unwrap_or(DEFAULT_PERIOD_LENGTH);

        let variability = if lengths.len() >= 2 {
            let sum_sq: f64 = lengths
                .iter()
                .map(|len| (len - average_cycle_length).powi(2))
                .sum();
            (sum_sq / lengths.len() as f64).sqrt()
        } else {
            0.0
        };

        Self {
            average_cycle_length,
            average_period_length,
            variability,
            completed_cycles: lengths.len(),
            total_cycles: cycles.len(),
        }
    }

    pub fn rounded_cycle_length(&self) -> i64 {
        self.average_cycle_length.round() as i64
    }

    pub fn rounded_period_length(&self) -> i64 {
        self.average_period_length.round() as i64
    }

    pub fn regularity(&self) -> Regularity {
        Regularity::from_variability(self.variability)
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::from_cycles(&[])
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    /// Build cycles with the given lengths, plus a trailing open cycle
    fn cycles_with_lengths(lengths: &[u32], period_length: u32) -> Vec<Cycle> {
        let mut start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut cycles = Vec::new();
        for len in lengths {
            cycles.push(Cycle {
                start_date: start,
                end_date: start + Duration::days(i64::from(period_length) - 1),
                period_length,
                cycle_length: Some(*len),
            });
            start += Duration::days(i64::from(*len));
        }
        cycles.push(Cycle {
            start_date: start,
            end_date: start + Duration::days(i64::from(period_length) - 1),
            period_length,
            cycle_length: None,
        });
        cycles
    }

    #[test]
    fn test_defaults_without_cycles() {
        let stats = CycleStats::from_cycles(&[]);
        assert_eq!(stats.average_cycle_length, 28.0);
        assert_eq!(stats.average_period_length, 5.0);
        assert_eq!(stats.variability, 0.0);
        assert_eq!(stats.regularity(), Regularity::High);
        assert_eq!(stats, CycleStats::default());
    }

    #[test]
    fn test_single_open_cycle_keeps_default_cycle_length() {
        let cycles = cycles_with_lengths(&[], 4);
        let stats = CycleStats::from_cycles(&cycles);

        assert_eq!(stats.average_cycle_length, 28.0);
        assert_eq!(stats.average_period_length, 4.0);
        assert_eq!(stats.completed_cycles, 0);
        assert_eq!(stats.total_cycles, 1);
    }

    #[test]
    fn test_variability_scenario() {
        let cycles = cycles_with_lengths(&[26, 28, 30], 5);
        let stats = CycleStats::from_cycles(&cycles);

        assert_eq!(stats.average_cycle_length, 28.0);
        assert!((stats.variability - 1.633).abs() < 0.001);
        assert_eq!(stats.regularity(), Regularity::High);
    }

    #[test]
    fn test_one_known_length_has_zero_variability() {
        let cycles = cycles_with_lengths(&[40], 5);
        let stats = CycleStats::from_cycles(&cycles);
        assert_eq!(stats.average_cycle_length, 40.0);
        assert_eq!(stats.variability, 0.0);
    }

    #[test]
    fn test_regularity_boundaries() {
        assert_eq!(Regularity::from_variability(2.0), Regularity::High);
        assert_eq!(Regularity::from_variability(2.01), Regularity::Moderate);
        assert_eq!(Regularity::from_variability(5.0), Regularity::Moderate);
        assert_eq!(Regularity::from_variability(5.01), Regularity::Low);

        // [26, 30] deviates by exactly 2, [23, 33] by exactly 5
        let stats = CycleStats::from_cycles(&cycles_with_lengths(&[26, 30], 5));
        assert_eq!(stats.variability, 2.0);
        assert_eq!(stats.regularity(), Regularity::High);

        let stats = CycleStats::from_cycles(&cycles_with_lengths(&[23, 33], 5));
        assert_eq!(stats.variability, 5.0);
        assert_eq!(stats.regularity(), Regularity::Moderate);

        let stats = CycleStats::from_cycles(&cycles_with_lengths(&[21, 35], 5));
        assert_eq!(stats.regularity(), Regularity::Low);
    }

    #[test]
    fn test_rounding_only_on_surface() {
        let cycles = cycles_with_lengths(&[28, 29], 4);
        let stats = CycleStats::from_cycles(&cycles);

        assert_eq!(stats.average_cycle_length, 28.5);
        assert_eq!(stats.rounded_cycle_length(), 29);
        assert_eq!(stats.variability, 0.5);
    }
}
