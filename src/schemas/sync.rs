use serde::{Deserialize, Serialize};

use crate::services::sync::ImportReport;

#[derive(Debug, Deserialize)]
pub(crate) struct ExportQuery {
    /// Comma separated data type names; all types when absent.
    #[serde(default)]
    pub(crate) types: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImportResponse {
    pub(crate) added: usize,
    pub(crate) skipped: usize,
    #[serde(flatten)]
    pub(crate) report: ImportReport,
}

#[derive(Debug, Serialize)]
pub(crate) struct SyncStatusResponse {
    pub(crate) status: String,
    pub(crate) format_version: String,
    pub(crate) server_time: String,
}
