//! Groups bleeding days into cycles.
//!
//! Flow-positive logs are sorted by date and walked once. A log no more than
//! [`MAX_GAP_DAYS`] after the previous bleeding day extends the current
//! period, which tolerates a single unlogged day. Anything further apart
//! starts a new period.

use crate::{Cycle, DailyLog};
use chrono::NaiveDate;

/// Largest day gap between two bleeding logs of the same period
pub const MAX_GAP_DAYS: i64 = 2;

/// Derive the full cycle set from a user's logs, oldest first.
///
/// The result depends only on the set of logs, not on their order, so
/// running it twice over the same logs yields identical cycles.
pub fn segment(logs: &[DailyLog]) -> Vec<Cycle> {
    let mut days: Vec<NaiveDate> = logs
        .iter()
        .filter(|log| log.is_flow_positive())
        .map(|log| log.date)
        .collect();
    days.sort();
    days.dedup();

    let mut periods: Vec<Vec<NaiveDate>> = Vec::new();
    for day in days {
        match periods.last_mut() {
            Some(current)
                if current
                    .last()
                    .is_some_and(|prev| (day - *prev).num_days() <= MAX_GAP_DAYS) =>
            {
                current.push(day);
            }
            _ => periods.push(vec![day]),
        }
    }

    let starts: Vec<NaiveDate> = periods.iter().map(|p| p[0]).collect();

    let cycles: Vec<Cycle> = periods
        .iter()
        .enumerate()
        .map(|(i, period)| {
            let start_date = period[0];
            let cycle_length = starts
                .get(i + 1)
                .map(|next| (*next - start_date).num_days() as u32);

            Cycle {
                start_date,
                end_date: period[period.len() - 1],
                period_length: period.len() as u32,
                cycle_length,
            }
        })
        .collect();

    tracing::debug!("Segmented {} bleeding logs into {} cycles", logs.len(), cycles.len());
    cycles
}

/// Most recent cycle first, the order consumers display
pub fn most_recent_first(mut cycles: Vec<Cycle>) -> Vec<Cycle> {
    cycles.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Flow;
    use chrono::Duration;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n - 1)
    }

    fn bleeding(n: i64, flow: Flow) -> DailyLog {
        DailyLog::new(day(n)).with_flow(flow)
    }

    #[test]
    fn test_no_bleeding_logs_yield_no_cycles() {
        assert!(segment(&[]).is_empty());

        let logs = vec![
            DailyLog::new(day(1)),
            DailyLog::new(day(2)).with_flow(Flow::None),
        ];
        assert!(segment(&logs).is_empty());
    }

    #[test]
    fn test_two_period_scenario() {
        let mut logs = vec![
            bleeding(1, Flow::Medium),
            bleeding(2, Flow::Heavy),
            bleeding(3, Flow::Medium),
            bleeding(4, Flow::Light),
        ];
        for n in 29..=33 {
            logs.push(bleeding(n, Flow::Medium));
        }

        let cycles = segment(&logs);
        assert_eq!(
            cycles,
            vec![
                Cycle {
                    start_date: day(1),
                    end_date: day(4),
                    period_length: 4,
                    cycle_length: Some(28),
                },
                Cycle {
                    start_date: day(29),
                    end_date: day(33),
                    period_length: 5,
                    cycle_length: None,
                },
            ]
        );
    }

    #[test]
    fn test_gap_of_two_days_merges() {
        let logs = vec![bleeding(1, Flow::Heavy), bleeding(3, Flow::Light)];
        let cycles = segment(&logs);

        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].end_date, day(3));
        assert_eq!(cycles[0].period_length, 2);
    }

    #[test]
    fn test_gap_of_three_days_splits() {
        let logs = vec![bleeding(1, Flow::Heavy), bleeding(4, Flow::Light)];
        let cycles = segment(&logs);

        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].cycle_length, Some(3));
        assert_eq!(cycles[1].cycle_length, None);
    }

    #[test]
    fn test_gap_measured_from_last_day_of_segment() {
        // 1, 3, 5, 7 chain together even though 7 is six days after 1
        let logs: Vec<_> = [1, 3, 5, 7]
            .iter()
            .map(|n| bleeding(*n, Flow::Medium))
            .collect();

        let cycles = segment(&logs);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].period_length, 4);
    }

    #[test]
    fn test_none_flow_days_are_ignored() {
        let logs = vec![
            bleeding(1, Flow::Heavy),
            DailyLog::new(day(2)).with_flow(Flow::None),
            DailyLog::new(day(3)),
            bleeding(4, Flow::Light),
        ];

        // day 2 and 3 do not bridge the gap
        assert_eq!(segment(&logs).len(), 2);
    }

    #[test]
    fn test_single_segment_has_no_cycle_length() {
        let cycles = segment(&[bleeding(10, Flow::Light)]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].period_length, 1);
        assert_eq!(cycles[0].cycle_length, None);
    }

    #[test]
    fn test_idempotent_and_order_independent() {
        let logs = vec![
            bleeding(30, Flow::Light),
            bleeding(2, Flow::Heavy),
            bleeding(58, Flow::Medium),
            bleeding(1, Flow::Medium),
            bleeding(31, Flow::Medium),
        ];
        let mut reversed = logs.clone();
        reversed.reverse();

        let first = segment(&logs);
        assert_eq!(first, segment(&logs));
        assert_eq!(first, segment(&reversed));
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_most_recent_first() {
        let logs = vec![bleeding(1, Flow::Heavy), bleeding(29, Flow::Heavy)];
        let cycles = most_recent_first(segment(&logs));
        assert_eq!(cycles[0].start_date, day(29));
        assert_eq!(cycles[1].start_date, day(1));
    }
}
