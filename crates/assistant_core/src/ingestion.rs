//! Ingestion controller: per-candidate admission by media type, then one
//! independent, cancellable completion per admitted file.

use std::{collections::HashMap, sync::Arc};

use shared::domain::{FileCandidate, FileDescriptor, FileEntry, FileId, FileStatus};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::ControllerError, IngestionProcessor, IngestionReport};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Human-readable size, two decimals, in mebibytes.
pub fn format_size(size_bytes: u64) -> String {
    format!("{:.2} MB", size_bytes as f64 / BYTES_PER_MB)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionEvent {
    Admitted(FileEntry),
    Rejected(ControllerError),
    Completed(FileDescriptor),
    Failed { id: FileId, error: ControllerError },
    Removed(FileId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionReport {
    pub admitted: Vec<FileEntry>,
    pub rejected: usize,
    pub total: usize,
    pub closed: bool,
    accepted_media_type: String,
}

impl AdmissionReport {
    /// Aggregate notice for the caller when any candidate was turned away.
    pub fn rejection(&self) -> Option<ControllerError> {
        (self.rejected > 0).then(|| ControllerError::ValidationRejected {
            rejected: self.rejected,
            total: self.total,
            accepted: self.accepted_media_type.clone(),
        })
    }
}

pub struct IngestionController {
    processor: Arc<dyn IngestionProcessor>,
    accepted_media_type: String,
    inner: Mutex<IngestionState>,
    session: CancellationToken,
    events: broadcast::Sender<IngestionEvent>,
}

#[derive(Default)]
struct IngestionState {
    files: HashMap<FileId, TrackedFile>,
    order: Vec<FileId>,
    closed: bool,
}

struct TrackedFile {
    entry: FileEntry,
    cancel: CancellationToken,
}

impl IngestionController {
    pub fn new(
        processor: Arc<dyn IngestionProcessor>,
        accepted_media_type: impl Into<String>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            processor,
            accepted_media_type: accepted_media_type.into().trim().to_string(),
            inner: Mutex::new(IngestionState::default()),
            session: CancellationToken::new(),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<IngestionEvent> {
        self.events.subscribe()
    }

    pub fn accepted_media_type(&self) -> &str {
        &self.accepted_media_type
    }

    fn accepts(&self, candidate: &FileCandidate) -> bool {
        candidate
            .media_type
            .trim()
            .eq_ignore_ascii_case(&self.accepted_media_type)
    }

    pub async fn add_files(
        self: &Arc<Self>,
        candidates: impl IntoIterator<Item = FileCandidate>,
    ) -> AdmissionReport {
        let candidates: Vec<FileCandidate> = candidates.into_iter().collect();
        let total = candidates.len();
        let mut report = AdmissionReport {
            admitted: Vec::new(),
            rejected: 0,
            total,
            closed: false,
            accepted_media_type: self.accepted_media_type.clone(),
        };

        let mut scheduled = Vec::new();
        {
            let mut guard = self.inner.lock().await;
            if guard.closed {
                warn!(total, "ignoring files offered after shutdown");
                report.closed = true;
                return report;
            }

            for candidate in candidates {
                if !self.accepts(&candidate) {
                    debug!(name = %candidate.name, media_type = %candidate.media_type, "candidate rejected");
                    report.rejected += 1;
                    continue;
                }

                let id = FileId::random();
                let size_display = format_size(candidate.size_bytes);
                let entry = FileEntry {
                    id,
                    name: candidate.name.clone(),
                    size_display: size_display.clone(),
                    status: FileStatus::Uploading,
                };
                let cancel = self.session.child_token();
                guard.files.insert(
                    id,
                    TrackedFile {
                        entry: entry.clone(),
                        cancel: cancel.clone(),
                    },
                );
                guard.order.push(id);

                scheduled.push((
                    FileDescriptor {
                        id,
                        name: candidate.name,
                        size_bytes: candidate.size_bytes,
                        size_display,
                        media_type: candidate.media_type,
                    },
                    cancel,
                ));
                report.admitted.push(entry);
            }
        }

        info!(
            admitted = report.admitted.len(),
            rejected = report.rejected,
            total,
            "file batch admitted"
        );
        for entry in &report.admitted {
            let _ = self.events.send(IngestionEvent::Admitted(entry.clone()));
        }
        if let Some(rejection) = report.rejection() {
            let _ = self.events.send(IngestionEvent::Rejected(rejection));
        }

        for (descriptor, cancel) in scheduled {
            self.spawn_ingestion(descriptor, cancel);
        }

        report
    }

    fn spawn_ingestion(self: &Arc<Self>, descriptor: FileDescriptor, cancel: CancellationToken) {
        let controller = Arc::clone(self);
        let processor = Arc::clone(&self.processor);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(file_id = %descriptor.id, "ingestion cancelled");
                    return;
                }
                result = processor.process(&descriptor) => result.map_err(|error| format!("{error:#}")),
            };
            controller.finish_entry(&descriptor, outcome).await;
        });
    }

    /// Moves a still-uploading entry to its terminal state. Removed or
    /// already-finished entries are left untouched.
    pub(crate) async fn finish_entry(
        &self,
        descriptor: &FileDescriptor,
        outcome: Result<IngestionReport, String>,
    ) -> bool {
        let event = {
            let mut guard = self.inner.lock().await;
            let Some(tracked) = guard.files.get_mut(&descriptor.id) else {
                debug!(file_id = %descriptor.id, "completion for removed file ignored");
                return false;
            };
            if tracked.entry.status.is_terminal() {
                debug!(file_id = %descriptor.id, "completion for finished file ignored");
                return false;
            }

            match outcome {
                Ok(report) => {
                    tracked.entry.status = FileStatus::Complete;
                    info!(
                        file_id = %descriptor.id,
                        name = %descriptor.name,
                        detail = report.detail.as_deref().unwrap_or_default(),
                        "ingestion complete"
                    );
                    IngestionEvent::Completed(descriptor.clone())
                }
                Err(reason) => {
                    warn!(file_id = %descriptor.id, name = %descriptor.name, %reason, "ingestion failed");
                    tracked.entry.status = FileStatus::Error {
                        reason: reason.clone(),
                    };
                    IngestionEvent::Failed {
                        id: descriptor.id,
                        error: ControllerError::IngestionFailed {
                            file: descriptor.name.clone(),
                            reason,
                        },
                    }
                }
            }
        };

        let _ = self.events.send(event);
        true
    }

    /// Idempotent. A pending completion for the removed entry is cancelled
    /// and can no longer touch the collection.
    pub async fn remove_file(&self, id: FileId) -> bool {
        let removed = {
            let mut guard = self.inner.lock().await;
            let removed = guard.files.remove(&id);
            if removed.is_some() {
                guard.order.retain(|tracked| *tracked != id);
            }
            removed
        };

        let Some(tracked) = removed else {
            return false;
        };
        tracked.cancel.cancel();
        info!(file_id = %id, name = %tracked.entry.name, "file removed");
        let _ = self.events.send(IngestionEvent::Removed(id));
        true
    }

    /// Session teardown: cancels every outstanding completion and drops the
    /// collection.
    pub async fn shutdown(&self) {
        let dropped = {
            let mut guard = self.inner.lock().await;
            guard.closed = true;
            guard.order.clear();
            guard.files.drain().count()
        };
        self.session.cancel();
        info!(dropped, "ingestion session shut down");
    }

    /// Tracked entries in admission order.
    pub async fn entries(&self) -> Vec<FileEntry> {
        let guard = self.inner.lock().await;
        guard
            .order
            .iter()
            .filter_map(|id| guard.files.get(id))
            .map(|tracked| tracked.entry.clone())
            .collect()
    }

    pub async fn entry(&self, id: FileId) -> Option<FileEntry> {
        let guard = self.inner.lock().await;
        guard.files.get(&id).map(|tracked| tracked.entry.clone())
    }
}

#[cfg(test)]
#[path = "tests/ingestion_tests.rs"]
mod tests;
