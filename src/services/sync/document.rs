//! The portable sync document and the export/import operations over a
//! [`StudyBundle`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;

use super::bundle::{DataType, Entry, StudyBundle, StudyStats};
use super::merge::{merge_collections, merge_study_stats, MergeCounts};
use crate::core::time::format_offset;

pub(crate) const FORMAT_VERSION: &str = "2.0";

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum SyncError {
    #[error("sync document is missing `{0}`")]
    MissingField(&'static str),
    #[error("`dataTypes` must not be empty")]
    EmptyDataTypes,
    #[error("unknown data type `{0}`")]
    UnknownDataType(String),
    #[error("malformed sync document: {0}")]
    Malformed(String),
    #[error("failed to encode {0}: {1}")]
    Encode(&'static str, String),
}

/// Wire form of an export. Payloads stay raw JSON until import so one bad
/// collection cannot spoil the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SyncDocument {
    #[serde(default)]
    pub(crate) version: String,
    #[serde(default)]
    pub(crate) device_id: String,
    #[serde(default)]
    pub(crate) export_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) data_types: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) stats: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) public_questions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) personal_questions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) mistake_bank: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) study_stats: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImportFailure {
    pub(crate) data_type: DataType,
    pub(crate) message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ImportReport {
    pub(crate) results: BTreeMap<DataType, MergeCounts>,
    pub(crate) errors: Vec<ImportFailure>,
}

impl ImportReport {
    pub(crate) fn added(&self) -> usize {
        self.results.values().map(|counts| counts.added).sum()
    }

    pub(crate) fn skipped(&self) -> usize {
        self.results.values().map(|counts| counts.skipped).sum()
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl SyncDocument {
    pub(crate) fn from_value(value: Value) -> Result<Self, SyncError> {
        serde_json::from_value(value).map_err(|err| SyncError::Malformed(err.to_string()))
    }

    pub(crate) fn from_slice(raw: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(raw).map_err(|err| SyncError::Malformed(err.to_string()))
    }

    pub(crate) fn payload(&self, kind: DataType) -> Option<&Value> {
        match kind {
            DataType::PublicQuestions => self.public_questions.as_ref(),
            DataType::PersonalQuestions => self.personal_questions.as_ref(),
            DataType::MistakeBank => self.mistake_bank.as_ref(),
            DataType::StudyStats => self.study_stats.as_ref(),
        }
    }

    fn payload_mut(&mut self, kind: DataType) -> &mut Option<Value> {
        match kind {
            DataType::PublicQuestions => &mut self.public_questions,
            DataType::PersonalQuestions => &mut self.personal_questions,
            DataType::MistakeBank => &mut self.mistake_bank,
            DataType::StudyStats => &mut self.study_stats,
        }
    }

    /// Checks the header and returns the data types this document asks to
    /// import. Without `dataTypes`, every type that carries a payload is used.
    pub(crate) fn validate(&self) -> Result<Vec<DataType>, SyncError> {
        if self.version.trim().is_empty() {
            return Err(SyncError::MissingField("version"));
        }
        if self.export_time.trim().is_empty() {
            return Err(SyncError::MissingField("exportTime"));
        }
        if self.device_id.trim().is_empty() {
            return Err(SyncError::MissingField("deviceId"));
        }

        match &self.data_types {
            None => Ok(DataType::ALL
                .into_iter()
                .filter(|kind| self.payload(*kind).is_some())
                .collect()),
            Some(names) if names.is_empty() => Err(SyncError::EmptyDataTypes),
            Some(names) => {
                let mut selected = Vec::with_capacity(names.len());
                for name in names {
                    let kind = DataType::parse(name)
                        .ok_or_else(|| SyncError::UnknownDataType(name.clone()))?;
                    if !selected.contains(&kind) {
                        selected.push(kind);
                    }
                }
                Ok(selected)
            }
        }
    }
}

pub(crate) fn export_document(
    bundle: &StudyBundle,
    device_id: &str,
    types: &[DataType],
    now: OffsetDateTime,
) -> Result<SyncDocument, SyncError> {
    let mut document = SyncDocument {
        version: FORMAT_VERSION.to_string(),
        device_id: device_id.to_string(),
        export_time: format_offset(now),
        data_types: Some(types.iter().map(|kind| kind.as_str().to_string()).collect()),
        ..SyncDocument::default()
    };

    for kind in types.iter().copied() {
        let payload = match bundle.entries(kind) {
            Some(entries) => serde_json::to_value(entries),
            None => serde_json::to_value(&bundle.study_stats),
        }
        .map_err(|err| SyncError::Encode(kind.as_str(), err.to_string()))?;

        *document.payload_mut(kind) = Some(payload);
        document.stats.insert(kind.as_str().to_string(), Value::from(bundle.count(kind)));
    }

    Ok(document)
}

/// Merges `document` into `bundle`.
///
/// A document that fails validation leaves `bundle` untouched. A payload
/// that cannot be decoded is reported in [`ImportReport::errors`] while the
/// remaining types are still merged.
pub(crate) fn import_document(
    bundle: &mut StudyBundle,
    document: &SyncDocument,
) -> Result<ImportReport, SyncError> {
    let selected = document.validate()?;
    let mut report = ImportReport::default();

    for kind in selected {
        let Some(payload) = document.payload(kind) else {
            continue;
        };

        let outcome = match bundle.entries_mut(kind) {
            Some(local) => serde_json::from_value::<Vec<Entry>>(payload.clone()).map(|incoming| {
                let merged =
                    merge_collections(std::mem::take(local), incoming, |entry| entry.id.clone());
                let counts = merged.counts();
                *local = merged.items;
                counts
            }),
            None => serde_json::from_value::<StudyStats>(payload.clone()).map(|incoming| {
                let (merged, counts) =
                    merge_study_stats(std::mem::take(&mut bundle.study_stats), incoming);
                bundle.study_stats = merged;
                counts
            }),
        };

        match outcome {
            Ok(counts) => {
                report.results.insert(kind, counts);
            }
            Err(err) => {
                tracing::warn!(data_type = kind.as_str(), error = %err, "Skipping sync payload");
                report.errors.push(ImportFailure { data_type: kind, message: err.to_string() });
            }
        }
    }

    Ok(report)
}
