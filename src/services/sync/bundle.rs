use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// The four collections a sync document can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum DataType {
    PublicQuestions,
    PersonalQuestions,
    MistakeBank,
    StudyStats,
}

impl DataType {
    pub(crate) const ALL: [DataType; 4] =
        [Self::PublicQuestions, Self::PersonalQuestions, Self::MistakeBank, Self::StudyStats];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::PublicQuestions => "publicQuestions",
            Self::PersonalQuestions => "personalQuestions",
            Self::MistakeBank => "mistakeBank",
            Self::StudyStats => "studyStats",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value.trim())
    }

    /// Parses a comma separated list such as `publicQuestions,mistakeBank`.
    /// An empty or absent list selects every type.
    pub(crate) fn parse_list(value: Option<&str>) -> Result<Vec<Self>, String> {
        let Some(raw) = value.filter(|raw| !raw.trim().is_empty()) else {
            return Ok(Self::ALL.to_vec());
        };

        let mut selected = Vec::new();
        for part in raw.split(',') {
            let kind = Self::parse(part).ok_or_else(|| part.trim().to_string())?;
            if !selected.contains(&kind) {
                selected.push(kind);
            }
        }
        Ok(selected)
    }
}

/// A question or mistake as it travels between devices. Only `id` is
/// interpreted; everything else is carried as-is.
///
/// Browser clients often use millisecond timestamps as ids, so a numeric
/// `id` is accepted. `id` holds its decimal text as the merge key and the
/// number is written back unchanged on export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEntry", into = "WireEntry")]
pub(crate) struct Entry {
    pub(crate) id: String,
    numeric_id: Option<Number>,
    pub(crate) fields: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct WireEntry {
    id: Value,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Entry {
    pub(crate) fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self { id: id.into(), numeric_id: None, fields }
    }
}

impl TryFrom<WireEntry> for Entry {
    type Error = String;

    fn try_from(wire: WireEntry) -> Result<Self, Self::Error> {
        match wire.id {
            Value::String(id) => Ok(Self::new(id, wire.fields)),
            Value::Number(number) => {
                Ok(Self { id: number.to_string(), numeric_id: Some(number), fields: wire.fields })
            }
            other => Err(format!("`id` must be a string or a number, got {other}")),
        }
    }
}

impl From<Entry> for WireEntry {
    fn from(entry: Entry) -> Self {
        let id = match entry.numeric_id {
            Some(number) => Value::Number(number),
            None => Value::String(entry.id),
        };
        Self { id, fields: entry.fields }
    }
}

/// A study counter. Integers stay integers on the wire and fractional
/// values such as study time are kept as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct Counter(Number);

impl Counter {
    pub(crate) fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or(0.0)
    }

    pub(crate) fn max(self, other: Self) -> Self {
        if other.as_f64() > self.as_f64() {
            other
        } else {
            self
        }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self(Number::from(0u64))
    }
}

impl From<u64> for Counter {
    fn from(value: u64) -> Self {
        Self(Number::from(value))
    }
}

/// One finished exam in the study history, keyed by its `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ExamEntry {
    pub(crate) date: String,
    #[serde(flatten)]
    pub(crate) fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudyStats {
    #[serde(default)]
    pub(crate) total_questions: Counter,
    #[serde(default)]
    pub(crate) correct_answers: Counter,
    /// Seconds.
    #[serde(default)]
    pub(crate) total_study_time: Counter,
    #[serde(default)]
    pub(crate) exam_records: Vec<ExamEntry>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

/// Everything a user keeps locally and syncs: both question banks, the
/// mistake bank and study statistics. Stored per user on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudyBundle {
    #[serde(default)]
    pub(crate) public_questions: Vec<Entry>,
    #[serde(default)]
    pub(crate) personal_questions: Vec<Entry>,
    #[serde(default)]
    pub(crate) mistake_bank: Vec<Entry>,
    #[serde(default)]
    pub(crate) study_stats: StudyStats,
}

impl StudyBundle {
    pub(crate) fn count(&self, kind: DataType) -> usize {
        match kind {
            DataType::PublicQuestions => self.public_questions.len(),
            DataType::PersonalQuestions => self.personal_questions.len(),
            DataType::MistakeBank => self.mistake_bank.len(),
            DataType::StudyStats => self.study_stats.exam_records.len(),
        }
    }

    /// The id-keyed collection behind `kind`; `None` for study statistics.
    pub(crate) fn entries(&self, kind: DataType) -> Option<&Vec<Entry>> {
        match kind {
            DataType::PublicQuestions => Some(&self.public_questions),
            DataType::PersonalQuestions => Some(&self.personal_questions),
            DataType::MistakeBank => Some(&self.mistake_bank),
            DataType::StudyStats => None,
        }
    }

    pub(crate) fn entries_mut(&mut self, kind: DataType) -> Option<&mut Vec<Entry>> {
        match kind {
            DataType::PublicQuestions => Some(&mut self.public_questions),
            DataType::PersonalQuestions => Some(&mut self.personal_questions),
            DataType::MistakeBank => Some(&mut self.mistake_bank),
            DataType::StudyStats => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_keeps_unknown_fields() {
        let raw = json!({"id": "q1", "content": "2 + 2?", "answer": "4", "tags": ["math"]});
        let entry: Entry = serde_json::from_value(raw.clone()).expect("decode");

        assert_eq!(entry.id, "q1");
        assert_eq!(entry.fields.get("answer"), Some(&json!("4")));
        assert_eq!(serde_json::to_value(&entry).expect("encode"), raw);
    }

    #[test]
    fn entry_without_id_is_rejected() {
        assert!(serde_json::from_value::<Entry>(json!({"content": "orphan"})).is_err());
    }

    #[test]
    fn numeric_ids_are_keyed_by_their_text_and_exported_as_numbers() {
        let raw = json!({"id": 1710000000000u64, "content": "timestamp id"});
        let entry: Entry = serde_json::from_value(raw.clone()).expect("decode");

        assert_eq!(entry.id, "1710000000000");
        assert_eq!(serde_json::to_value(&entry).expect("encode"), raw);
    }

    #[test]
    fn ids_that_are_neither_text_nor_numbers_are_rejected() {
        assert!(serde_json::from_value::<Entry>(json!({"id": null})).is_err());
        assert!(serde_json::from_value::<Entry>(json!({"id": ["q1"]})).is_err());
    }

    #[test]
    fn fractional_counters_are_kept() {
        let stats: StudyStats =
            serde_json::from_value(json!({"totalStudyTime": 12.5, "totalQuestions": 3}))
                .expect("decode");

        assert_eq!(stats.total_study_time.as_f64(), 12.5);
        let encoded = serde_json::to_value(&stats).expect("encode");
        assert_eq!(encoded["totalStudyTime"], json!(12.5));
        assert_eq!(encoded["totalQuestions"], json!(3));
    }

    #[test]
    fn counter_max_compares_across_integer_and_float() {
        let whole = Counter::from(12);
        let fractional: Counter = serde_json::from_value(json!(12.5)).expect("decode");

        assert_eq!(whole.max(fractional.clone()), fractional);
        assert_eq!(fractional.max(Counter::from(13)), Counter::from(13));
    }

    #[test]
    fn study_stats_use_camel_case() {
        let stats: StudyStats = serde_json::from_value(json!({
            "totalQuestions": 12,
            "correctAnswers": 9,
            "totalStudyTime": 600,
            "examRecords": [{"date": "2025-03-01T10:00:00Z", "score": 80}],
            "streakDays": 3
        }))
        .expect("decode");

        assert_eq!(stats.total_questions, Counter::from(12));
        assert_eq!(stats.exam_records.len(), 1);
        assert_eq!(stats.extra.get("streakDays"), Some(&json!(3)));
    }

    #[test]
    fn data_type_list_parsing() {
        assert_eq!(DataType::parse_list(None).unwrap(), DataType::ALL.to_vec());
        assert_eq!(
            DataType::parse_list(Some("mistakeBank, publicQuestions,mistakeBank")).unwrap(),
            vec![DataType::MistakeBank, DataType::PublicQuestions]
        );
        assert_eq!(DataType::parse_list(Some("mistakes")), Err("mistakes".to_string()));
    }
}
