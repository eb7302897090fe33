use std::fmt;

use kb_core::{BatchSummary, Notice, Role};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Externally visible status line.
    Status(String),
    /// Transient progress label; empty when cleared.
    Progress(String),
    Transcript(TranscriptUpdate),
    Notice(Notice),
    FilesRefreshed(Vec<String>),
    LoggedIn { role: Role },
    LoggedOut { reason: LogoutReason },
    UploadProgress(BatchSummary),
    Diagnostic(Diagnostic),
    CommandFinished(CommandKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptUpdate {
    Cleared,
    Appended(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    UserRequested,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Login,
    Logout,
    RefreshFiles,
    Delete,
    Chat,
    Upload,
}

/// Failures that are swallowed by policy and only reported for observability.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    MalformedFrame { payload: String },
    PollFailed { filename: String, reason: String },
    StreamReadFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    AuthExpired,
    PermissionDenied,
    InvalidCredentials,
    NotLoggedIn,
    TooManyFiles { count: usize, max: usize },
    HttpStatus(u16),
    MissingBody,
    Decode,
    Timeout,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::AuthExpired => write!(f, "authorization expired"),
            FailureKind::PermissionDenied => write!(f, "permission denied"),
            FailureKind::InvalidCredentials => write!(f, "invalid credentials"),
            FailureKind::NotLoggedIn => write!(f, "not logged in"),
            FailureKind::TooManyFiles { count, max } => {
                write!(f, "too many files ({count}, max {max})")
            }
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::MissingBody => write!(f, "response has no body"),
            FailureKind::Decode => write!(f, "undecodable response"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ClientError {
    pub kind: FailureKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn status(code: u16, message: impl Into<String>) -> Self {
        let kind = match code {
            401 => FailureKind::AuthExpired,
            403 => FailureKind::PermissionDenied,
            other => FailureKind::HttpStatus(other),
        };
        Self::new(kind, message)
    }

    pub fn is_auth_expired(&self) -> bool {
        self.kind == FailureKind::AuthExpired
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ClientError::new(FailureKind::Decode, err.to_string());
    }
    ClientError::new(FailureKind::Network, err.to_string())
}
