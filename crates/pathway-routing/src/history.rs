//! Bounded log of recent outcomes

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use pathway_config::HistoryConfig;

use crate::outcome::{RequestOutcome, now_millis};

/// Append-only outcome log bounded by entry count and age
pub struct OutcomeHistory {
    entries: Mutex<VecDeque<RequestOutcome>>,
    max_entries: usize,
    retention: Duration,
}

impl OutcomeHistory {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries: config.max_entries,
            retention: config.retention,
        }
    }

    fn prune(&self, entries: &mut VecDeque<RequestOutcome>) {
        while entries.len() > self.max_entries {
            entries.pop_front();
        }

        let retention_ms = u64::try_from(self.retention.as_millis()).unwrap_or(u64::MAX);
        let cutoff = now_millis().saturating_sub(retention_ms);
        while entries.front().is_some_and(|o| o.recorded_at_ms < cutoff) {
            entries.pop_front();
        }
    }

    pub fn push(&self, outcome: RequestOutcome) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(outcome);
        self.prune(&mut entries);
    }

    /// Most recent outcomes, newest first
    pub fn recent(&self, limit: usize) -> Vec<RequestOutcome> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut entries);
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent outcomes for one model, newest first
    pub fn for_model(&self, model_id: &str, limit: usize) -> Vec<RequestOutcome> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut entries);
        entries
            .iter()
            .rev()
            .filter(|o| o.model_id == model_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
