//! Persistence service client.
//!
//! Thin HTTP wrapper over `/api/model` and `/api/layout`. Response parsing is
//! kept in free functions so it can be tested without a server.

use crate::config::SyncConfig;
use crate::layout_record::LayoutRecord;
use crate::source::ClassRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The service answered with a non-success status.
    #[error("service returned status {status}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("response parse failed: {0}")]
    Parse(String),
}

/// Source of structural records and store for layout records. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_model(&self) -> Result<Vec<ClassRecord>, BackendError>;

    /// Returns an empty record when none has been saved yet.
    async fn fetch_layout(&self) -> Result<LayoutRecord, BackendError>;

    async fn save_layout(&self, record: &LayoutRecord) -> Result<(), BackendError>;
}

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &SyncConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| BackendError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_text(&self, path: &str) -> Result<(u16, String), BackendError> {
        let url = self.url(path);
        let request_error = |e: reqwest::Error| BackendError::Request {
            url: url.clone(),
            message: e.to_string(),
        };
        let response = self.http.get(&url).send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(request_error)?;
        Ok((status, text))
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn fetch_model(&self) -> Result<Vec<ClassRecord>, BackendError> {
        let (status, text) = self.get_text("/api/model").await?;
        if !(200..300).contains(&status) {
            return Err(BackendError::Status { status, body: text });
        }
        parse_model(&text)
    }

    async fn fetch_layout(&self) -> Result<LayoutRecord, BackendError> {
        let (status, text) = self.get_text("/api/layout").await?;
        if status == 404 {
            return Ok(LayoutRecord::default());
        }
        if !(200..300).contains(&status) {
            return Err(BackendError::Status { status, body: text });
        }
        parse_layout(&text)
    }

    async fn save_layout(&self, record: &LayoutRecord) -> Result<(), BackendError> {
        let url = self.url("/api/layout");
        let request_error = |e: reqwest::Error| BackendError::Request {
            url: url.clone(),
            message: e.to_string(),
        };
        let response = self
            .http
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.map_err(request_error)?;
            return Err(BackendError::Status { status, body });
        }
        Ok(())
    }
}

fn parse_model(json: &str) -> Result<Vec<ClassRecord>, BackendError> {
    serde_json::from_str(json).map_err(|e| BackendError::Parse(e.to_string()))
}

fn parse_layout(json: &str) -> Result<LayoutRecord, BackendError> {
    serde_json::from_str(json).map_err(|e| BackendError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let config = SyncConfig {
            api_url: "http://example.test:8000/".to_string(),
            ..SyncConfig::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.url("/api/layout"), "http://example.test:8000/api/layout");
    }

    #[test]
    fn parse_model_reads_record_list() {
        let records = parse_model(r#"[{"name": "A", "type": "interface"}]"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, "interface");
    }

    #[test]
    fn parse_layout_rejects_wrong_shape() {
        let err = parse_layout(r#"{"positions": []}"#).unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
        assert!(parse_layout(r#"{"positions": {}}"#).unwrap().positions.is_empty());
    }
}
