//! Conversation controller: ordered message log, answer mode and a single
//! in-flight response production guarded by a request token.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use shared::{
    domain::{AnswerMode, Message, MessageId, MessageKind, RequestToken, Role},
    error::ErrorCode,
    protocol::QueryRequest,
};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::ControllerError, templates, ResponseProducer};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const CANCELLED_RESPONSE_TEXT: &str = "Response cancelled before an answer arrived.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A user message was appended and one production dispatched.
    Dispatched(RequestToken),
    /// Nothing left after trimming.
    Empty,
    /// A response is still pending; the text was ignored.
    Busy,
    /// The session was shut down.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    MessageAppended(Message),
    PendingChanged(bool),
    ModeChanged(AnswerMode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub draft: String,
    pub pending: bool,
    pub mode: AnswerMode,
}

pub struct ConversationController {
    producer: Arc<dyn ResponseProducer>,
    response_timeout: Duration,
    inner: Mutex<ConversationState>,
    session: CancellationToken,
    events: broadcast::Sender<ConversationEvent>,
}

struct ConversationState {
    messages: Vec<Message>,
    draft: String,
    mode: AnswerMode,
    next_message_id: u64,
    next_request_token: u64,
    in_flight: Option<InFlightResponse>,
    closed: bool,
}

struct InFlightResponse {
    token: RequestToken,
    cancel: CancellationToken,
}

impl ConversationState {
    fn append(&mut self, role: Role, kind: MessageKind, text: String) -> Message {
        let message = Message {
            id: MessageId(self.next_message_id),
            role,
            kind,
            text,
            sent_at: Utc::now(),
        };
        self.next_message_id += 1;
        self.messages.push(message.clone());
        message
    }
}

impl ConversationController {
    pub fn new(producer: Arc<dyn ResponseProducer>, response_timeout: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut state = ConversationState {
            messages: Vec::new(),
            draft: String::new(),
            mode: AnswerMode::default(),
            next_message_id: 1,
            next_request_token: 1,
            in_flight: None,
            closed: false,
        };
        state.append(
            Role::Assistant,
            MessageKind::Text,
            templates::WELCOME_MESSAGE.to_string(),
        );

        Arc::new(Self {
            producer,
            response_timeout,
            inner: Mutex::new(state),
            session: CancellationToken::new(),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    /// Applies to the next submission only.
    pub async fn set_mode(&self, mode: AnswerMode) {
        let changed = {
            let mut guard = self.inner.lock().await;
            let changed = guard.mode != mode;
            guard.mode = mode;
            changed
        };
        if changed {
            debug!(%mode, "answer mode changed");
            let _ = self.events.send(ConversationEvent::ModeChanged(mode));
        }
    }

    pub async fn set_draft(&self, text: impl Into<String>) {
        self.inner.lock().await.draft = text.into();
    }

    pub async fn submit_draft(self: &Arc<Self>) -> SubmitOutcome {
        let draft = self.inner.lock().await.draft.clone();
        self.submit(&draft).await
    }

    pub async fn submit(self: &Arc<Self>, text: &str) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Empty;
        }

        let (user_message, token, request, cancel) = {
            let mut guard = self.inner.lock().await;
            if guard.closed {
                return SubmitOutcome::Closed;
            }
            if let Some(in_flight) = &guard.in_flight {
                debug!(pending = %in_flight.token, "ignoring submit while a response is pending");
                return SubmitOutcome::Busy;
            }

            let user_message = guard.append(Role::User, MessageKind::Text, text.to_string());
            guard.draft.clear();

            let token = RequestToken(guard.next_request_token);
            guard.next_request_token += 1;
            let cancel = self.session.child_token();
            guard.in_flight = Some(InFlightResponse {
                token,
                cancel: cancel.clone(),
            });

            let request = QueryRequest {
                question: text.to_string(),
                mode: guard.mode,
            };
            (user_message, token, request, cancel)
        };

        info!(%token, mode = %request.mode, "dispatching response production");
        let _ = self
            .events
            .send(ConversationEvent::MessageAppended(user_message));
        let _ = self.events.send(ConversationEvent::PendingChanged(true));

        let controller = Arc::clone(self);
        let producer = Arc::clone(&self.producer);
        let timeout = self.response_timeout;
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%token, "response production cancelled");
                    return;
                }
                result = tokio::time::timeout(timeout, producer.produce(&request)) => match result {
                    Ok(Ok(answer)) => Ok(answer),
                    Ok(Err(error)) => Err(ControllerError::ProductionFailed {
                        code: ErrorCode::Backend,
                        reason: format!("{error:#}"),
                    }),
                    Err(_) => Err(ControllerError::ProductionFailed {
                        code: ErrorCode::Timeout,
                        reason: format!("no answer within {}s", timeout.as_secs()),
                    }),
                },
            };
            controller.commit_response(token, outcome).await;
        });

        SubmitOutcome::Dispatched(token)
    }

    /// Appends the assistant message for `token` if it still holds the
    /// in-flight slot. Returns false for stale or cancelled requests.
    pub(crate) async fn commit_response(
        &self,
        token: RequestToken,
        outcome: Result<String, ControllerError>,
    ) -> bool {
        let message = {
            let mut guard = self.inner.lock().await;
            match &guard.in_flight {
                Some(in_flight) if in_flight.token == token => {}
                _ => {
                    debug!(%token, "dropping stale response");
                    return false;
                }
            }
            guard.in_flight = None;

            match outcome {
                Ok(answer) => guard.append(Role::Assistant, MessageKind::Text, answer),
                Err(error) => {
                    warn!(%token, %error, "response production failed");
                    guard.append(
                        Role::Assistant,
                        MessageKind::Error,
                        format!("Sorry, I couldn't answer that: {error}"),
                    )
                }
            }
        };

        info!(%token, message_id = %message.id, "response committed");
        let _ = self.events.send(ConversationEvent::MessageAppended(message));
        let _ = self.events.send(ConversationEvent::PendingChanged(false));
        true
    }

    /// Abandons the pending production, closing it with an error-kind
    /// assistant message so the user message is still answered exactly once.
    pub async fn cancel_pending(&self) -> bool {
        let message = {
            let mut guard = self.inner.lock().await;
            let Some(in_flight) = guard.in_flight.take() else {
                return false;
            };
            in_flight.cancel.cancel();
            info!(token = %in_flight.token, "pending response cancelled");
            guard.append(
                Role::Assistant,
                MessageKind::Error,
                CANCELLED_RESPONSE_TEXT.to_string(),
            )
        };

        let _ = self.events.send(ConversationEvent::MessageAppended(message));
        let _ = self.events.send(ConversationEvent::PendingChanged(false));
        true
    }

    /// Session teardown: cancels outstanding work and refuses further input.
    pub async fn shutdown(&self) {
        let was_pending = {
            let mut guard = self.inner.lock().await;
            guard.closed = true;
            guard.in_flight.take().is_some()
        };
        self.session.cancel();
        info!(was_pending, "conversation session shut down");
        if was_pending {
            let _ = self.events.send(ConversationEvent::PendingChanged(false));
        }
    }

    pub async fn snapshot(&self) -> ConversationSnapshot {
        let guard = self.inner.lock().await;
        ConversationSnapshot {
            messages: guard.messages.clone(),
            draft: guard.draft.clone(),
            pending: guard.in_flight.is_some(),
            mode: guard.mode,
        }
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.lock().await.messages.clone()
    }

    pub async fn is_pending(&self) -> bool {
        self.inner.lock().await.in_flight.is_some()
    }

    pub async fn mode(&self) -> AnswerMode {
        self.inner.lock().await.mode
    }
}

#[cfg(test)]
#[path = "tests/conversation_tests.rs"]
mod tests;
