use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::bundle::StudyStats;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Merged<T> {
    pub(crate) items: Vec<T>,
    pub(crate) added: usize,
    pub(crate) skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MergeCounts {
    pub(crate) added: usize,
    pub(crate) skipped: usize,
}

impl<T> Merged<T> {
    pub(crate) fn counts(&self) -> MergeCounts {
        MergeCounts { added: self.added, skipped: self.skipped }
    }
}

/// Appends every incoming item whose key is not present yet.
///
/// Local items are kept in order and never replaced. Duplicates inside
/// `incoming` count as skipped after the first occurrence.
pub(crate) fn merge_collections<T, K, F>(local: Vec<T>, incoming: Vec<T>, key_fn: F) -> Merged<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = local.iter().map(&key_fn).collect::<HashSet<_>>();
    let mut items = local;
    let mut added = 0;
    let mut skipped = 0;

    for item in incoming {
        if seen.insert(key_fn(&item)) {
            items.push(item);
            added += 1;
        } else {
            skipped += 1;
        }
    }

    Merged { items, added, skipped }
}

/// Counters merge by maximum; exam history merges by `date`.
pub(crate) fn merge_study_stats(
    local: StudyStats,
    incoming: StudyStats,
) -> (StudyStats, MergeCounts) {
    let StudyStats { total_questions, correct_answers, total_study_time, exam_records, mut extra } =
        local;

    let history =
        merge_collections(exam_records, incoming.exam_records, |entry| entry.date.clone());
    let counts = history.counts();

    for (key, value) in incoming.extra {
        extra.entry(key).or_insert(value);
    }

    let merged = StudyStats {
        total_questions: total_questions.max(incoming.total_questions),
        correct_answers: correct_answers.max(incoming.correct_answers),
        total_study_time: total_study_time.max(incoming.total_study_time),
        exam_records: history.items,
        extra,
    };

    (merged, counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sync::bundle::{Counter, Entry, ExamEntry};
    use serde_json::{json, Map};

    fn entry(id: &str, content: &str) -> Entry {
        let mut fields = Map::new();
        fields.insert("content".to_string(), json!(content));
        Entry::new(id, fields)
    }

    fn exam(date: &str, score: u64) -> ExamEntry {
        let mut fields = Map::new();
        fields.insert("score".to_string(), json!(score));
        ExamEntry { date: date.to_string(), fields }
    }

    #[test]
    fn overlapping_ids_are_skipped() {
        let local = vec![entry("q2", "local copy")];
        let incoming = vec![entry("q1", "one"), entry("q2", "remote copy"), entry("q3", "three")];

        let merged = merge_collections(local, incoming, |item| item.id.clone());

        assert_eq!(merged.added, 2);
        assert_eq!(merged.skipped, 1);
        let ids = merged.items.iter().map(|item| item.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["q2", "q1", "q3"]);
        assert_eq!(merged.items[0].fields["content"], json!("local copy"));
    }

    #[test]
    fn duplicates_inside_incoming_are_added_once() {
        let merged = merge_collections(
            Vec::new(),
            vec![entry("a", "first"), entry("a", "second")],
            |item| item.id.clone(),
        );

        assert_eq!(merged.added, 1);
        assert_eq!(merged.skipped, 1);
        assert_eq!(merged.items[0].fields["content"], json!("first"));
    }

    #[test]
    fn merging_twice_adds_nothing_new() {
        let incoming = vec![entry("a", "x"), entry("b", "y")];
        let first = merge_collections(Vec::new(), incoming.clone(), |item| item.id.clone());
        let second = merge_collections(first.items.clone(), incoming, |item| item.id.clone());

        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.items, first.items);
    }

    #[test]
    fn works_for_plain_values() {
        let merged = merge_collections(vec![1, 2], vec![2, 3, 4], |value| *value);
        assert_eq!(merged.items, vec![1, 2, 3, 4]);
        assert_eq!(merged.counts(), MergeCounts { added: 2, skipped: 1 });
    }

    #[test]
    fn study_stats_take_maximum_counters() {
        let local = StudyStats {
            total_questions: Counter::from(40),
            correct_answers: Counter::from(10),
            total_study_time: Counter::from(900),
            exam_records: vec![exam("2025-03-01", 70)],
            ..StudyStats::default()
        };
        let incoming = StudyStats {
            total_questions: Counter::from(25),
            correct_answers: Counter::from(20),
            total_study_time: Counter::from(1200),
            exam_records: vec![exam("2025-03-01", 95), exam("2025-03-02", 88)],
            ..StudyStats::default()
        };

        let (stats, counts) = merge_study_stats(local, incoming);

        assert_eq!(stats.total_questions, Counter::from(40));
        assert_eq!(stats.correct_answers, Counter::from(20));
        assert_eq!(stats.total_study_time, Counter::from(1200));
        assert_eq!(stats.exam_records.len(), 2);
        assert_eq!(stats.exam_records[0].fields["score"], json!(70));
        assert_eq!(counts, MergeCounts { added: 1, skipped: 1 });
    }
}
