//! HTTP client for the answering backend (`POST /query`, `GET /`).

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::protocol::{BackendErrorBody, HealthResponse, QueryRequest, QueryResponse};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{config::DEFAULT_RESPONSE_TIMEOUT_SECS, ResponseProducer};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to reach answer backend: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("answer backend returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("answer backend returned an empty answer")]
    EmptyAnswer,
    #[error("answer backend did not respond within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    /// `base_url` is expected to be normalised by [`crate::prepare_backend_url`].
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
        }
    }

    /// Upper bound on every request, connect through body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthResponse, BackendError> {
        self.bounded(async {
            let response = self.http.get(format!("{}/", self.base_url)).send().await?;
            let response = Self::check_status(response).await?;
            Ok(response.json().await?)
        })
        .await
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, BackendError> {
        debug!(mode = %request.mode, "sending query to answer backend");
        let body: QueryResponse = self
            .bounded(async {
                let response = self
                    .http
                    .post(format!("{}/query", self.base_url))
                    .json(request)
                    .send()
                    .await?;
                let response = Self::check_status(response).await?;
                Ok(response.json().await?)
            })
            .await?;
        if body.answer.trim().is_empty() {
            return Err(BackendError::EmptyAnswer);
        }
        debug!(
            sources = body.source_documents.len(),
            "answer backend responded"
        );
        Ok(body)
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                warn!(base_url = %self.base_url, timeout = ?self.timeout, "answer backend timed out");
                Err(BackendError::Timeout(self.timeout))
            }
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<BackendErrorBody>(&raw)
            .map(|body| body.detail)
            .unwrap_or(raw);
        warn!(%status, %detail, "answer backend rejected request");
        Err(BackendError::Status { status, detail })
    }
}

#[async_trait]
impl ResponseProducer for BackendClient {
    async fn produce(&self, request: &QueryRequest) -> anyhow::Result<String> {
        Ok(self.query(request).await?.answer)
    }
}
