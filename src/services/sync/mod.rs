//! Sync documents, the id-based merge and the client agent that drives a
//! round trip against the server.

mod bundle;
mod document;
mod history;
mod manager;
mod merge;
mod server;
mod storage;
mod transport;

pub(crate) use bundle::{DataType, StudyBundle};
pub(crate) use document::{
    export_document, import_document, ImportReport, SyncDocument, FORMAT_VERSION,
};
pub(crate) use history::SyncStatus;
pub(crate) use manager::{SyncManager, SyncRun};
pub(crate) use server::{compose_bundle, ServerRows};
pub(crate) use storage::FileStorage;
pub(crate) use transport::HttpTransport;

#[cfg(test)]
pub(crate) use storage::MemoryStorage;
#[cfg(test)]
pub(crate) use transport::{SyncTransport, TransportError};
