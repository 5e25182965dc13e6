//! Per-run ingest accounting.

use std::fmt;
use std::ops::{Add, AddAssign};

/// Outcome of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// Already present in the corpus
    Cached,
    /// Refused before parsing (fast-mode size cut, hard limit)
    Skipped,
    Inserted,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub cached: usize,
    pub skipped: usize,
    pub inserted: usize,
    pub failed: usize,
}

impl Statistics {
    pub fn record(&mut self, insertion: Insertion) {
        match insertion {
            Insertion::Cached => self.cached += 1,
            Insertion::Skipped => self.skipped += 1,
            Insertion::Inserted => self.inserted += 1,
            Insertion::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.cached + self.skipped + self.inserted + self.failed
    }
}

impl Add for Statistics {
    type Output = Statistics;

    fn add(self, other: Statistics) -> Statistics {
        Statistics {
            cached: self.cached + other.cached,
            skipped: self.skipped + other.skipped,
            inserted: self.inserted + other.inserted,
            failed: self.failed + other.failed,
        }
    }
}

impl AddAssign for Statistics {
    fn add_assign(&mut self, other: Statistics) {
        *self = *self + other;
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted: {}, cached: {}, skipped: {}, failed: {}",
            self.inserted, self.cached, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_and_summing() {
        let mut first = Statistics::default();
        first.record(Insertion::Inserted);
        first.record(Insertion::Cached);

        let mut second = Statistics::default();
        second.record(Insertion::Failed);

        let combined = first + second;
        assert_eq!(combined.inserted, 1);
        assert_eq!(combined.cached, 1);
        assert_eq!(combined.failed, 1);
        assert_eq!(combined.total(), 3);
    }
}
