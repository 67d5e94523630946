//! Batch grouping: deciding when accumulated per-step artifacts should
//! be concatenated and released.
//!
//! A pure state machine over an externally driven, strictly increasing
//! stream of (run date, lead time) steps. The caller owns the
//! accumulation list and performs the concatenation on a crossing.

use chrono::{DateTime, Datelike, Utc};

use nwp_common::{ExtractError, ExtractResult};

/// Grouping granularity for final artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// One artifact per calendar day of the run date
    Daily,
    /// One artifact per calendar month of the run date
    Monthly,
    /// One artifact per forecast run
    SingleForecast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKey {
    Day(i32, u32, u32),
    Month(i32, u32),
    Run(DateTime<Utc>),
}

/// Detects group boundaries across a monotonically advancing step
/// sequence.
#[derive(Debug, Clone)]
pub struct BatchGrouper {
    grouping: Grouping,
    last: Option<(DateTime<Utc>, u32)>,
}

impl BatchGrouper {
    pub fn new(grouping: Grouping) -> Self {
        Self {
            grouping,
            last: None,
        }
    }

    /// Advance to the next step; true means the previous group ended and
    /// its accumulated artifacts should be concatenated before this
    /// step's artifact is appended.
    ///
    /// Steps must be strictly increasing in (date, term) order; anything
    /// else is a caller bug.
    pub fn advance(&mut self, date: DateTime<Utc>, term: u32) -> ExtractResult<bool> {
        if let Some((last_date, last_term)) = self.last {
            if (date, term) <= (last_date, last_term) {
                return Err(ExtractError::GroupingInconsistency(format!(
                    "step ({}, {}) does not advance past ({}, {})",
                    date, term, last_date, last_term
                )));
            }
        }

        let crossed = match self.last {
            None => false,
            Some((last_date, _)) => self.group_key(last_date) != self.group_key(date),
        };

        self.last = Some((date, term));
        Ok(crossed)
    }

    fn group_key(&self, date: DateTime<Utc>) -> GroupKey {
        match self.grouping {
            Grouping::Daily => GroupKey::Day(date.year(), date.month(), date.day()),
            Grouping::Monthly => GroupKey::Month(date.year(), date.month()),
            Grouping::SingleForecast => GroupKey::Run(date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_boundary() {
        let mut grouper = BatchGrouper::new(Grouping::Daily);

        // (day1, 6), (day1, 12): same group; (day2, 6): boundary
        assert!(!grouper.advance(run(2024, 3, 15), 6).unwrap());
        assert!(!grouper.advance(run(2024, 3, 15), 12).unwrap());
        assert!(grouper.advance(run(2024, 3, 16), 6).unwrap());
    }

    #[test]
    fn test_monthly_boundary() {
        let mut grouper = BatchGrouper::new(Grouping::Monthly);

        assert!(!grouper.advance(run(2024, 3, 15), 6).unwrap());
        assert!(!grouper.advance(run(2024, 3, 31), 6).unwrap());
        assert!(grouper.advance(run(2024, 4, 1), 6).unwrap());
    }

    #[test]
    fn test_single_forecast_boundary() {
        let mut grouper = BatchGrouper::new(Grouping::SingleForecast);

        assert!(!grouper.advance(run(2024, 3, 15), 1).unwrap());
        assert!(!grouper.advance(run(2024, 3, 15), 2).unwrap());
        assert!(grouper.advance(run(2024, 3, 16), 1).unwrap());
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let mut grouper = BatchGrouper::new(Grouping::Daily);

        grouper.advance(run(2024, 3, 15), 12).unwrap();
        let err = grouper.advance(run(2024, 3, 15), 6).unwrap_err();
        assert!(matches!(err, ExtractError::GroupingInconsistency(_)));

        // A repeated step is equally inconsistent
        let mut grouper = BatchGrouper::new(Grouping::Daily);
        grouper.advance(run(2024, 3, 15), 6).unwrap();
        assert!(grouper.advance(run(2024, 3, 15), 6).is_err());
    }
}
