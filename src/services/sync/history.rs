use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub(crate) const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SyncStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SyncOutcome {
    pub(crate) time: String,
    pub(crate) status: SyncStatus,
    #[serde(default)]
    pub(crate) pulled: usize,
    #[serde(default)]
    pub(crate) pushed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

/// The most recent sync outcomes, oldest first, capped at [`HISTORY_LIMIT`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct SyncHistory {
    entries: VecDeque<SyncOutcome>,
}

impl SyncHistory {
    pub(crate) fn push(&mut self, outcome: SyncOutcome) {
        self.entries.push_back(outcome);
        while self.entries.len() > HISTORY_LIMIT {
            self.entries.pop_front();
        }
    }

    pub(crate) fn latest(&self) -> Option<&SyncOutcome> {
        self.entries.back()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &SyncOutcome> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize) -> SyncOutcome {
        SyncOutcome {
            time: format!("2025-03-10T12:{index:02}:00Z"),
            status: SyncStatus::Success,
            pulled: index,
            pushed: 0,
            message: None,
        }
    }

    #[test]
    fn keeps_only_the_last_ten() {
        let mut history = SyncHistory::default();
        for index in 0..15 {
            history.push(outcome(index));
        }

        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.iter().next().map(|entry| entry.pulled), Some(5));
        assert_eq!(history.latest().map(|entry| entry.pulled), Some(14));
    }

    #[test]
    fn serializes_as_plain_list() {
        let mut history = SyncHistory::default();
        history.push(SyncOutcome {
            message: Some("timeout".to_string()),
            status: SyncStatus::Failed,
            ..outcome(1)
        });

        let encoded = serde_json::to_value(&history).expect("encode");
        assert_eq!(encoded[0]["status"], "failed");
        assert_eq!(encoded[0]["message"], "timeout");

        let decoded: SyncHistory = serde_json::from_value(encoded).expect("decode");
        assert_eq!(decoded, history);
    }
}
