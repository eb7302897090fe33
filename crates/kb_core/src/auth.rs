use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Root,
    User,
}

impl Role {
    /// Anything other than `root` is an ordinary user.
    pub fn parse(raw: &str) -> Self {
        if raw == "root" {
            Role::Root
        } else {
            Role::User
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Root => "root",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthState {
    pub token: String,
    pub role: Role,
}

impl AuthState {
    pub fn new(token: impl Into<String>, role: Role) -> Self {
        Self {
            token: token.into(),
            role,
        }
    }
}

// Keeps bearer tokens out of logs.
impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Durable side-store that lets a login survive restarts.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<AuthState>;
    fn save(&self, state: &AuthState);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<AuthState>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: AuthState) -> Self {
        Self {
            slot: Mutex::new(Some(state)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<AuthState> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, state: &AuthState) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(state.clone());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
