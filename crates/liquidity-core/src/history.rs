use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::{DeltaSet, Verdict};

pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// One recorded refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub deltas: DeltaSet,
    pub verdict: Verdict,
}

/// Bounded ring buffer of recent refreshes for time-series display.
///
/// Oldest entries are evicted first once `capacity` is reached.
#[derive(Debug, Clone, Serialize)]
pub struct DeltaHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl Default for DeltaHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl DeltaHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlowKind;
    use chrono::Duration;

    fn entry(minute: i64) -> HistoryEntry {
        HistoryEntry {
            recorded_at: Utc::now() + Duration::minutes(minute),
            deltas: DeltaSet::empty(60),
            verdict: Verdict::from(FlowKind::Neutral),
        }
    }

    #[test]
    fn test_history_evicts_oldest_first() {
        let mut history = DeltaHistory::new(3);
        let entries: Vec<_> = (0..5).map(entry).collect();
        for e in &entries {
            history.push(e.clone());
        }

        assert_eq!(history.len(), 3);
        let kept: Vec<_> = history.iter().map(|e| e.recorded_at).collect();
        assert_eq!(
            kept,
            entries[2..].iter().map(|e| e.recorded_at).collect::<Vec<_>>()
        );
        assert_eq!(history.latest().unwrap().recorded_at, entries[4].recorded_at);
    }

    #[test]
    fn test_history_zero_capacity_keeps_one() {
        let mut history = DeltaHistory::new(0);
        history.push(entry(0));
        history.push(entry(1));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }
}
