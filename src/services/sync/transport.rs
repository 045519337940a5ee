use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use super::bundle::DataType;
use super::document::{ImportReport, SyncDocument};
use crate::core::config::SyncSettings;

#[derive(Debug, Error)]
pub(crate) enum TransportError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server returned {status} for {url}: {message}")]
    Status { url: String, status: u16, message: String },
    #[error("unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

/// The server side of a sync round.
#[async_trait]
pub(crate) trait SyncTransport: Send + Sync {
    async fn pull(&self, types: &[DataType]) -> Result<SyncDocument, TransportError>;
    async fn push(&self, document: &SyncDocument) -> Result<ImportReport, TransportError>;
    /// Succeeds when the server answers at all.
    async fn probe(&self) -> Result<(), TransportError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: Client,
    settings: SyncSettings,
}

impl HttpTransport {
    pub(crate) fn from_settings(settings: &SyncSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self { client, settings: settings.clone() })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.settings.access_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.settings.access_token)
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: String,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|source| TransportError::Request { url: url.clone(), source })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request { url: url.clone(), source })?;

        decode_envelope(&url, status, &body)
    }
}

fn decode_envelope<T: DeserializeOwned>(
    url: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<T, TransportError> {
    let envelope = serde_json::from_slice::<Envelope<T>>(body).map_err(|err| {
        if status.is_success() {
            TransportError::InvalidResponse { url: url.to_string(), message: err.to_string() }
        } else {
            TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: String::from_utf8_lossy(body).into_owned(),
            }
        }
    })?;

    if !status.is_success() || !envelope.success {
        return Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            message: envelope.message,
        });
    }

    envelope.data.ok_or_else(|| TransportError::InvalidResponse {
        url: url.to_string(),
        message: "response carried no data".to_string(),
    })
}

fn types_query(types: &[DataType]) -> String {
    types.iter().map(|kind| kind.as_str()).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn pull(&self, types: &[DataType]) -> Result<SyncDocument, TransportError> {
        let url = self.settings.endpoint("/sync/export");
        let request = self.client.get(&url).query(&[("types", types_query(types))]);
        self.send(url, request).await
    }

    async fn push(&self, document: &SyncDocument) -> Result<ImportReport, TransportError> {
        let url = self.settings.endpoint("/sync/import");
        let request = self.client.post(&url).json(document);
        self.send(url, request).await
    }

    async fn probe(&self) -> Result<(), TransportError> {
        let url = self.settings.endpoint("/sync/status");
        let request = self.client.get(&url).timeout(Duration::from_secs(5));
        self.send::<serde_json::Value>(url, request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_data_is_returned() {
        let body = serde_json::to_vec(&json!({
            "success": true,
            "message": "ok",
            "data": {"version": "2.0", "deviceId": "server", "exportTime": "2025-03-10T12:00:00Z"}
        }))
        .unwrap();

        let document: SyncDocument =
            decode_envelope("http://server/sync/export", StatusCode::OK, &body).expect("decode");
        assert_eq!(document.device_id, "server");
    }

    #[test]
    fn error_envelope_keeps_server_message() {
        let body = serde_json::to_vec(&json!({
            "success": false,
            "message": "Could not validate credentials",
            "data": null
        }))
        .unwrap();

        let result = decode_envelope::<SyncDocument>("u", StatusCode::UNAUTHORIZED, &body);
        assert!(matches!(
            result,
            Err(TransportError::Status { status: 401, ref message, .. })
                if message == "Could not validate credentials"
        ));
    }

    #[test]
    fn non_json_success_is_invalid_response() {
        let result = decode_envelope::<SyncDocument>("u", StatusCode::OK, b"<html>");
        assert!(matches!(result, Err(TransportError::InvalidResponse { .. })));
    }

    #[test]
    fn types_are_joined_with_commas() {
        assert_eq!(
            types_query(&[DataType::PersonalQuestions, DataType::StudyStats]),
            "personalQuestions,studyStats"
        );
    }
}
