use std::fmt;

/// Identifies the logical conversation to the backend. Lives as long as the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    session_id: String,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    /// `session-<unix millis>-<9 random alphanumerics>`
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self::new(format!("session-{millis}-{}", &random[..9]))
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.session_id)
    }
}
