use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard};

use client_logging::{client_debug, client_info, client_warn};
use futures_util::StreamExt;
use kb_core::{update, ChatChange, ChatMsg, ChatSession, Session, StreamEvent};

use crate::api::KbApi;
use crate::stream::decode_events;
use crate::{ClientError, ClientEvent, ClientSink, Diagnostic, TranscriptUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Input was empty or another exchange holds the generation lock.
    Rejected,
    Done,
    Failed,
}

/// Drives chat exchanges for one session, one at a time.
pub struct ChatController {
    api: Arc<dyn KbApi>,
    session: Session,
    state: Mutex<ChatSession>,
    sink: Arc<dyn ClientSink>,
}

/// Releases the generation lock on every way out of [`ChatController::send`],
/// including cancellation of the send future.
struct ReleaseOnDrop<'a> {
    controller: &'a ChatController,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.controller.apply(ChatMsg::Released);
    }
}

impl ChatController {
    pub fn new(api: Arc<dyn KbApi>, session: Session, sink: Arc<dyn ClientSink>) -> Self {
        Self {
            api,
            session,
            state: Mutex::new(ChatSession::new()),
            sink,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> ChatSession {
        self.lock().clone()
    }

    pub fn clear_transcript(&self) {
        self.lock().clear_transcript();
        self.sink.emit(ClientEvent::Transcript(TranscriptUpdate::Cleared));
    }

    fn lock(&self) -> MutexGuard<'_, ChatSession> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn apply(&self, msg: ChatMsg) -> Vec<ChatChange> {
        let changes = {
            let mut guard = self.lock();
            let current = std::mem::take(&mut *guard);
            let (next, changes) = update(current, msg);
            *guard = next;
            changes
        };
        for change in &changes {
            self.publish(change);
        }
        changes
    }

    fn publish(&self, change: &ChatChange) {
        let event = match change {
            ChatChange::Dispatch { .. } => return,
            ChatChange::SearchResults(payload) => {
                client_debug!("Search results received: {}", payload);
                return;
            }
            ChatChange::TranscriptCleared => ClientEvent::Transcript(TranscriptUpdate::Cleared),
            ChatChange::TranscriptAppended(text) => {
                ClientEvent::Transcript(TranscriptUpdate::Appended(text.clone()))
            }
            ChatChange::Progress(label) => ClientEvent::Progress(label.clone()),
            ChatChange::Status(status) => ClientEvent::Status(status.clone()),
        };
        self.sink.emit(event);
    }

    /// Runs one exchange to completion. A send while another is in flight is a no-op.
    pub async fn send(&self, message: &str) -> ChatOutcome {
        let changes = self.apply(ChatMsg::SendRequested(message.to_string()));
        let Some(message) = changes.into_iter().find_map(|change| match change {
            ChatChange::Dispatch { message } => Some(message),
            _ => None,
        }) else {
            client_debug!("Chat send rejected (empty input or generation in progress)");
            return ChatOutcome::Rejected;
        };

        let _release = ReleaseOnDrop { controller: self };
        client_info!("Chat exchange started session={}", self.session);
        match self.exchange(&message).await {
            Ok(()) => ChatOutcome::Done,
            Err(err) => {
                client_warn!("Chat exchange failed: {}", err);
                self.apply(ChatMsg::StreamFailed(err.message.clone()));
                ChatOutcome::Failed
            }
        }
    }

    async fn exchange(&self, message: &str) -> Result<(), ClientError> {
        let body = self.api.open_chat(message, &self.session).await?;
        self.apply(ChatMsg::StreamOpened);

        let sink = self.sink.clone();
        let mut events = pin!(decode_events(body, move |diagnostic| {
            sink.emit(ClientEvent::Diagnostic(diagnostic))
        }));

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    self.sink.emit(ClientEvent::Diagnostic(Diagnostic::StreamReadFailed {
                        reason: err.to_string(),
                    }));
                    return Err(err);
                }
            };
            let finished = event == StreamEvent::Done;
            self.apply(ChatMsg::Event(event));
            if finished {
                return Ok(());
            }
        }

        self.apply(ChatMsg::StreamEnded);
        Ok(())
    }
}
