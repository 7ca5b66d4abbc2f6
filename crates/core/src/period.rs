use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive date window used to filter records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    /// Bounds given in either order are normalized.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Open-ended range from `start` onward.
    pub fn since(start: NaiveDate) -> Self {
        DateRange::new(start, NaiveDate::MAX)
    }

    /// Open-ended range up to and including `end`.
    pub fn until(end: NaiveDate) -> Self {
        DateRange::new(NaiveDate::MIN, end)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
