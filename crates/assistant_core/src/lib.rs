//! Client-side state machines of the study assistant: the conversation
//! controller (message log, answer mode, single in-flight response) and the
//! ingestion controller (per-file admission and lifecycle tracking).

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{domain::FileDescriptor, protocol::QueryRequest};

pub mod backend;
pub mod config;
pub mod conversation;
pub mod error;
pub mod ingestion;
pub mod templates;

pub use backend::{BackendClient, BackendError};
pub use config::{load_settings, prepare_backend_url, Settings};
pub use conversation::{ConversationController, ConversationEvent, SubmitOutcome};
pub use error::ControllerError;
pub use ingestion::{format_size, AdmissionReport, IngestionController, IngestionEvent};

/// Produces exactly one answer per request. The mode decides the shape of
/// the answer, never whether it is correct.
#[async_trait]
pub trait ResponseProducer: Send + Sync {
    async fn produce(&self, request: &QueryRequest) -> Result<String>;
}

/// Processes one admitted file. Resolves once per file.
#[async_trait]
pub trait IngestionProcessor: Send + Sync {
    async fn process(&self, file: &FileDescriptor) -> Result<IngestionReport>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub detail: Option<String>,
}

/// Answers from the canned template catalogue after a fixed latency.
#[derive(Debug, Clone)]
pub struct CannedResponseProducer {
    latency: Duration,
}

impl CannedResponseProducer {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for CannedResponseProducer {
    fn default() -> Self {
        Self::new(Duration::from_millis(config::DEFAULT_RESPONSE_LATENCY_MS))
    }
}

#[async_trait]
impl ResponseProducer for CannedResponseProducer {
    async fn produce(&self, request: &QueryRequest) -> Result<String> {
        tokio::time::sleep(self.latency).await;
        Ok(templates::canned_answer(request.mode).to_string())
    }
}

/// Marks every file processed after a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedIngestionProcessor {
    delay: Duration,
}

impl SimulatedIngestionProcessor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedIngestionProcessor {
    fn default() -> Self {
        Self::new(Duration::from_millis(config::DEFAULT_INGESTION_DELAY_MS))
    }
}

#[async_trait]
impl IngestionProcessor for SimulatedIngestionProcessor {
    async fn process(&self, file: &FileDescriptor) -> Result<IngestionReport> {
        tokio::time::sleep(self.delay).await;
        Ok(IngestionReport {
            detail: Some(format!("{} ready", file.name)),
        })
    }
}

pub struct MissingResponseProducer;

#[async_trait]
impl ResponseProducer for MissingResponseProducer {
    async fn produce(&self, request: &QueryRequest) -> Result<String> {
        Err(anyhow!(
            "answer backend unavailable for {} request",
            request.mode
        ))
    }
}

/// Picks the answer source described by `settings`: the HTTP backend when a
/// URL is configured, the canned catalogue otherwise.
pub fn response_producer_from_settings(settings: &Settings) -> Result<Arc<dyn ResponseProducer>> {
    match settings.backend_url.as_deref() {
        Some(raw) => {
            let base_url = prepare_backend_url(raw)?;
            Ok(Arc::new(
                BackendClient::new(base_url).with_timeout(settings.response_timeout()),
            ))
        }
        None => Ok(Arc::new(CannedResponseProducer::new(settings.response_latency()))),
    }
}

pub fn ingestion_processor_from_settings(settings: &Settings) -> Arc<dyn IngestionProcessor> {
    Arc::new(SimulatedIngestionProcessor::new(settings.ingestion_delay()))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
