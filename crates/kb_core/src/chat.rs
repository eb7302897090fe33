use serde_json::Value;

use crate::StreamEvent;

pub const STATUS_IDLE: &str = "Idle";
pub const STATUS_REQUESTING: &str = "Requesting...";
pub const STATUS_RECEIVING: &str = "Receiving stream...";
pub const STATUS_COMPLETED: &str = "Completed";
pub const PROGRESS_ANALYZING: &str = "Analyzing your question...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatMsg {
    /// User asked to send a message.
    SendRequested(String),
    /// Response headers arrived with a readable body.
    StreamOpened,
    /// One decoded stream event.
    Event(StreamEvent),
    /// Transport signalled end of stream.
    StreamEnded,
    /// Opening or reading the stream failed.
    StreamFailed(String),
    /// Exchange is over, whatever the path out.
    Released,
}

/// Observable consequence of applying a [`ChatMsg`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChatChange {
    /// The message was accepted; open the stream for it.
    Dispatch { message: String },
    TranscriptCleared,
    TranscriptAppended(String),
    /// Progress label replaced; an empty string clears it.
    Progress(String),
    Status(String),
    SearchResults(Value),
}

/// State of one chat conversation: the generation lock plus what the user sees.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatSession {
    phase: ChatPhase,
    transcript: String,
    progress: String,
    status: String,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            status: STATUS_IDLE.to_string(),
            ..Self::default()
        }
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn progress(&self) -> &str {
        &self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// The generation lock: held while an exchange is in flight.
    pub fn is_generating(&self) -> bool {
        matches!(self.phase, ChatPhase::Sending | ChatPhase::Streaming)
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    fn set_status(&mut self, status: impl Into<String>, changes: &mut Vec<ChatChange>) {
        self.status = status.into();
        changes.push(ChatChange::Status(self.status.clone()));
    }

    fn set_progress(&mut self, progress: impl Into<String>, changes: &mut Vec<ChatChange>) {
        let progress = progress.into();
        if self.progress != progress {
            self.progress = progress;
            changes.push(ChatChange::Progress(self.progress.clone()));
        }
    }

    fn apply_event(&mut self, event: StreamEvent, changes: &mut Vec<ChatChange>) {
        match event {
            StreamEvent::Chunk { content } => {
                self.transcript.push_str(&content);
                changes.push(ChatChange::TranscriptAppended(content));
                self.set_progress("", changes);
            }
            StreamEvent::Progress { content } => {
                self.set_progress(content.clone(), changes);
                self.set_status(content, changes);
            }
            StreamEvent::SearchResults { payload } => {
                changes.push(ChatChange::SearchResults(payload));
            }
            StreamEvent::Error { message } => {
                let marker = format!("\n[Error]: {message}");
                self.transcript.push_str(&marker);
                changes.push(ChatChange::TranscriptAppended(marker));
            }
            StreamEvent::Done => {
                self.phase = ChatPhase::Done;
                self.set_status(STATUS_COMPLETED, changes);
            }
        }
    }
}

/// Pure update function: applies a message to the session and returns what changed.
pub fn update(mut state: ChatSession, msg: ChatMsg) -> (ChatSession, Vec<ChatChange>) {
    let mut changes = Vec::new();
    match msg {
        ChatMsg::SendRequested(message) => {
            if message.is_empty() || state.is_generating() {
                return (state, changes);
            }
            state.phase = ChatPhase::Sending;
            state.transcript.clear();
            changes.push(ChatChange::TranscriptCleared);
            state.set_progress(PROGRESS_ANALYZING, &mut changes);
            state.set_status(STATUS_REQUESTING, &mut changes);
            changes.push(ChatChange::Dispatch { message });
        }
        ChatMsg::StreamOpened => {
            if state.phase == ChatPhase::Sending {
                state.phase = ChatPhase::Streaming;
                state.set_status(STATUS_RECEIVING, &mut changes);
            }
        }
        ChatMsg::Event(event) => {
            if state.phase == ChatPhase::Streaming {
                state.apply_event(event, &mut changes);
            }
        }
        ChatMsg::StreamEnded => {
            if state.phase == ChatPhase::Streaming {
                state.phase = ChatPhase::Done;
                state.set_status(STATUS_COMPLETED, &mut changes);
            }
        }
        ChatMsg::StreamFailed(reason) => {
            if state.is_generating() {
                state.phase = ChatPhase::Failed;
                state.set_status(format!("An error occurred: {reason}"), &mut changes);
            }
        }
        ChatMsg::Released => {
            if state.is_generating() {
                state.phase = ChatPhase::Failed;
                state.set_status("Interrupted", &mut changes);
            }
            state.set_progress("", &mut changes);
        }
    }
    (state, changes)
}
