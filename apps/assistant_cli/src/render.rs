//! Text rendering of controller state for the terminal.

use assistant_core::{ConversationEvent, IngestionEvent};
use shared::{
    domain::{FileEntry, FileStatus, MessageKind, Role},
    error::ApiError,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Feeds every received event to `emit` until the controller drops its
/// sender. Falling behind skips the overwritten events and keeps going.
pub async fn pump_events<E: Clone>(
    stream: &'static str,
    mut events: broadcast::Receiver<E>,
    mut emit: impl FnMut(&E),
) {
    loop {
        match events.recv().await {
            Ok(event) => emit(&event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(stream, skipped, "event printer fell behind; some lines were not shown");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

pub fn conversation_line(event: &ConversationEvent) -> Option<String> {
    match event {
        ConversationEvent::MessageAppended(message) if message.role == Role::Assistant => {
            Some(match message.kind {
                MessageKind::Text => format!("assistant> {}", message.text),
                MessageKind::Error => format!("assistant (error)> {}", message.text),
            })
        }
        ConversationEvent::MessageAppended(_) => None,
        ConversationEvent::PendingChanged(true) => Some("... thinking".to_string()),
        ConversationEvent::PendingChanged(false) => None,
        ConversationEvent::ModeChanged(mode) => Some(format!(
            "answer mode: {} ({})",
            mode.label(),
            mode.instruction()
        )),
    }
}

pub fn ingestion_line(event: &IngestionEvent) -> Option<String> {
    match event {
        IngestionEvent::Admitted(entry) => Some(format!("uploading {}", entry_line(entry))),
        IngestionEvent::Rejected(error) => Some(api_line(ApiError::from(error.clone()))),
        IngestionEvent::Completed(file) => Some(format!("{} is ready ({})", file.name, file.id)),
        IngestionEvent::Failed { error, .. } => Some(api_line(ApiError::from(error.clone()))),
        IngestionEvent::Removed(id) => Some(format!("removed {id}")),
    }
}

fn api_line(error: ApiError) -> String {
    format!("upload [{}]: {}", error.code.as_str(), error.message)
}

pub fn entry_line(entry: &FileEntry) -> String {
    let status = match &entry.status {
        FileStatus::Uploading => "Uploading...".to_string(),
        FileStatus::Complete => "Ready".to_string(),
        FileStatus::Error { reason } => format!("Failed: {reason}"),
    };
    format!(
        "{}  {}  {}  {}",
        entry.id, entry.name, entry.size_display, status
    )
}
