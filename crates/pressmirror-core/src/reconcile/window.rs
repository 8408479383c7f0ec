//! Overlapping poll windows and the delta between them.

use serde::Serialize;
use std::collections::BTreeSet;

use pressmirror_types::{ChangeEvent, ChangeType};

/// Inclusive `[start, end]` range of unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollWindow {
    pub start: i64,
    pub end: i64,
}

impl PollWindow {
    /// Window queried by the cycle whose checkpoint is `last_check`:
    /// `[last_check - overlap - interval, last_check - interval]`.
    pub fn for_check(last_check: i64, interval: i64, overlap: i64) -> Self {
        Self { start: last_check - overlap - interval, end: last_check - interval }
    }

    /// The current window and the one the previous cycle queried.
    pub fn pair(last_check: i64, interval: i64, overlap: i64) -> (Self, Self) {
        (
            Self::for_check(last_check, interval, overlap),
            Self::for_check(last_check - interval, interval, overlap),
        )
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Ids grouped by change type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSets {
    pub updates: BTreeSet<String>,
    pub deletes: BTreeSet<String>,
}

impl ChangeSets {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ChangeEvent>) -> Self {
        let mut sets = Self::default();
        for event in events {
            let target = match event.change_type {
                ChangeType::Update => &mut sets.updates,
                ChangeType::Delete => &mut sets.deletes,
            };
            target.insert(event.target_id.clone());
        }
        sets
    }

    /// Ids in `self` that `earlier` did not already report, per type.
    pub fn newer_than(&self, earlier: &ChangeSets) -> ChangeSets {
        ChangeSets {
            updates: self.updates.difference(&earlier.updates).cloned().collect(),
            deletes: self.deletes.difference(&earlier.deletes).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len() + self.deletes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Events at the given timestamps, ids named after the timestamp.
    fn events_in(window: PollWindow, stamps: &[i64]) -> Vec<ChangeEvent> {
        stamps
            .iter()
            .filter(|ts| window.contains(**ts))
            .map(|ts| ChangeEvent::new(ChangeType::Update, ts.to_string()))
            .collect()
    }

    #[test]
    fn test_window_pair() {
        let (current, previous) = PollWindow::pair(1000, 60, 300);
        assert_eq!(current, PollWindow { start: 640, end: 940 });
        assert_eq!(previous, PollWindow { start: 580, end: 880 });
    }

    #[test]
    fn test_delta_reports_only_tail_of_current_window() {
        let (current, previous) = PollWindow::pair(1000, 60, 300);
        let stamps = [600, 700, 879, 880, 881, 900, 940, 941];

        let now = ChangeSets::from_events(&events_in(current, &stamps));
        let before = ChangeSets::from_events(&events_in(previous, &stamps));
        let delta = now.newer_than(&before);

        let expected: BTreeSet<String> = ["881", "900", "940"].iter().map(|s| s.to_string()).collect();
        assert_eq!(delta.updates, expected);
        assert!(delta.deletes.is_empty());
    }

    #[test]
    fn test_consecutive_cycles_report_each_event_once() {
        let (interval, overlap) = (60, 300);
        let stamps: Vec<i64> = (0..2000).step_by(7).collect();
        let mut seen: Vec<String> = Vec::new();

        for last_check in (1000..1600).step_by(interval as usize) {
            let (current, previous) = PollWindow::pair(last_check, interval, overlap);
            let delta = ChangeSets::from_events(&events_in(current, &stamps))
                .newer_than(&ChangeSets::from_events(&events_in(previous, &stamps)));
            seen.extend(delta.updates);
        }

        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), seen.len(), "an event was reported twice");

        // Every event between the first and last cycle's delta range is covered.
        let covered: Vec<i64> = stamps.iter().copied().filter(|t| *t > 880 && *t <= 1480).collect();
        for ts in covered {
            assert!(seen.contains(&ts.to_string()), "event at {ts} missed");
        }
    }

    #[test]
    fn test_same_id_different_types_are_independent() {
        let earlier = ChangeSets::from_events(&[ChangeEvent::new(ChangeType::Update, "a")]);
        let later = ChangeSets::from_events(&[
            ChangeEvent::new(ChangeType::Update, "a"),
            ChangeEvent::new(ChangeType::Delete, "a"),
        ]);
        let delta = later.newer_than(&earlier);
        assert!(delta.updates.is_empty());
        assert!(delta.deletes.contains("a"));
        assert_eq!(delta.len(), 1);
    }
}
