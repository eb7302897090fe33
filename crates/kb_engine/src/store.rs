use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use client_logging::{client_error, client_warn};
use kb_core::{AuthState, CredentialStore, Role};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("credential file is not valid: {0}")]
    Format(#[from] serde_json::Error),
}

/// On-disk layout: the two keys the client has always persisted.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    access_token: String,
    user_role: Option<String>,
}

/// Keeps the login in a small JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Option<AuthState>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let stored: StoredCredentials = serde_json::from_str(&content)?;
        if stored.access_token.is_empty() {
            return Ok(None);
        }
        let role = stored
            .user_role
            .as_deref()
            .map(Role::parse)
            .unwrap_or(Role::User);
        Ok(Some(AuthState::new(stored.access_token, role)))
    }

    /// Writes to a temp file in the same directory, then renames over the target.
    pub fn write(&self, state: &AuthState) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let stored = StoredCredentials {
            access_token: state.token.clone(),
            user_role: Some(state.role.as_str().to_string()),
        };
        let content = serde_json::to_string_pretty(&stored)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    pub fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<AuthState> {
        match self.read() {
            Ok(state) => state,
            Err(err) => {
                client_warn!("Ignoring saved credentials at {:?}: {}", self.path, err);
                None
            }
        }
    }

    fn save(&self, state: &AuthState) {
        if let Err(err) = self.write(state) {
            client_error!("Failed to save credentials to {:?}: {}", self.path, err);
        }
    }

    fn clear(&self) {
        if let Err(err) = self.remove() {
            client_error!("Failed to clear credentials at {:?}: {}", self.path, err);
        }
    }
}
