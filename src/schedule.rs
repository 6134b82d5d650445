//! Merged discontinuity schedule.
//!
//! Every current source may contribute a list of times at which its
//! behaviour changes abruptly. The solver must land on each of these times
//! exactly, so all lists are merged into one strictly-ascending,
//! deduplicated sequence before integration starts. The schedule is
//! immutable afterwards; a cursor tracks which entries have been consumed.

use crate::quantity::Time;
use crate::solver::SolverError;

/// Ordered, deduplicated sequence of discontinuity times with a consume
/// cursor.
#[derive(Debug, Clone)]
pub struct EventSchedule {
    times: Vec<Time>,
    cursor: usize,
}

impl EventSchedule {
    /// Merges the per-source time lists into one schedule.
    ///
    /// Coincident times from different sources collapse to a single entry.
    /// Negative or non-finite times are a configuration error.
    pub fn merge<L>(lists: impl IntoIterator<Item = L>) -> Result<Self, SolverError>
    where
        L: IntoIterator<Item = Time>,
    {
        let mut times: Vec<Time> = lists.into_iter().flatten().collect();
        for &t in &times {
            if !t.is_finite() {
                return Err(SolverError::InvalidConfig(
                    "discontinuity time is not finite".into(),
                ));
            }
            if t.value() < 0.0 {
                return Err(SolverError::InvalidConfig(format!(
                    "discontinuity time {} is negative",
                    t
                )));
            }
        }
        times.sort_by(|a, b| a.partial_cmp(b).expect("times are finite"));
        times.dedup();
        Ok(Self { times, cursor: 0 })
    }

    /// The next unconsumed entry, if any.
    pub fn peek(&self) -> Option<Time> {
        self.times.get(self.cursor).copied()
    }

    /// Marks the next entry as consumed.
    pub fn consume(&mut self) {
        debug_assert!(self.cursor < self.times.len());
        self.cursor += 1;
    }

    /// Consumes every entry at or before `t` (used to skip entries that
    /// precede the configured start time).
    pub fn advance_past(&mut self, t: Time) {
        while let Some(next) = self.peek() {
            if next > t {
                break;
            }
            self.cursor += 1;
        }
    }

    /// Whether any unconsumed entry lies strictly before `limit`.
    pub fn has_entry_before(&self, limit: Time) -> bool {
        self.peek().map_or(false, |t| t < limit)
    }

    /// Whether every entry has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.times.len()
    }

    /// All entries, consumed or not.
    pub fn times(&self) -> &[Time] {
        &self.times
    }
}
