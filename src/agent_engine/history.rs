use serde::{Deserialize, Serialize};

use crate::agent_engine::action::ActionDescriptor;
use crate::executor::dispatcher::DispatchOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: u32,
    pub ts: i64,
    pub action: ActionDescriptor,
    /// Reply text the action was parsed from.
    pub raw: String,
    /// `None` for actions that are never dispatched (DONE, unknown kinds).
    pub outcome: Option<DispatchOutcome>,
}

/// Append-only record of the actions taken during one run.
#[derive(Debug, Default)]
pub struct ActionHistory {
    entries: Vec<HistoryEntry>,
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: u32, action: ActionDescriptor, raw: &str) {
        self.entries.push(HistoryEntry {
            step,
            ts: chrono::Utc::now().timestamp_millis(),
            action,
            raw: raw.to_string(),
            outcome: None,
        });
    }

    /// Attaches the dispatch outcome to the most recent entry.
    pub fn record_outcome(&mut self, outcome: DispatchOutcome) {
        if let Some(last) = self.entries.last_mut() {
            last.outcome = Some(outcome);
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<HistoryEntry> {
        self.entries
    }

    /// One line per action, oldest first, as shown to the model.
    pub fn render(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| match &e.outcome {
                Some(outcome) => format!("- {} (result: {})", e.action, outcome),
                None => format!("- {}", e.action),
            })
            .collect()
    }
}
