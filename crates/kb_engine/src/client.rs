use std::sync::Arc;

use client_logging::{client_info, client_warn};
use kb_core::{ChatSession, CredentialStore, Notice, Role, Session};

use crate::api::{publish_file_list, HttpKbApi, KbApi};
use crate::auth::AuthSession;
use crate::chat::{ChatController, ChatOutcome};
use crate::transport::AuthTransport;
use crate::upload::{UploadFile, UploadOrchestrator, UploadOutcome};
use crate::{
    ClientConfig, ClientError, ClientEvent, ClientSink, CommandKind, FailureKind, LogoutReason,
};

/// Everything a front end needs: login state, file library, chat and uploads.
pub struct KbClient {
    auth: Arc<AuthSession>,
    api: Arc<dyn KbApi>,
    chat: Arc<ChatController>,
    uploads: UploadOrchestrator,
    sink: Arc<dyn ClientSink>,
}

impl KbClient {
    /// Builds a client talking HTTP to `config.base_url`, restoring any saved login.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        sink: Arc<dyn ClientSink>,
    ) -> Result<Self, ClientError> {
        let auth = Arc::new(AuthSession::restore(store));
        let transport = AuthTransport::new(config.clone(), auth.clone(), sink.clone())?;
        let api: Arc<dyn KbApi> = Arc::new(HttpKbApi::new(transport));
        Ok(Self::with_api(config, auth, api, sink))
    }

    pub fn with_api(
        config: ClientConfig,
        auth: Arc<AuthSession>,
        api: Arc<dyn KbApi>,
        sink: Arc<dyn ClientSink>,
    ) -> Self {
        let chat = Arc::new(ChatController::new(
            api.clone(),
            Session::generate(),
            sink.clone(),
        ));
        {
            // Weak: the transport behind `chat` already holds `auth`.
            let chat = Arc::downgrade(&chat);
            let sink = sink.clone();
            auth.on_expired(move || {
                if let Some(chat) = chat.upgrade() {
                    clear_account_view(&chat, sink.as_ref());
                }
            });
        }
        let uploads = UploadOrchestrator::new(api.clone(), auth.clone(), config, sink.clone());
        Self {
            auth,
            api,
            chat,
            uploads,
            sink,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.auth.is_logged_in()
    }

    pub fn role(&self) -> Option<Role> {
        self.auth.role()
    }

    pub fn session(&self) -> &Session {
        self.chat.session()
    }

    pub fn chat_snapshot(&self) -> ChatSession {
        self.chat.snapshot()
    }

    fn status(&self, status: &str) {
        self.sink.emit(ClientEvent::Status(status.to_string()));
    }

    fn notice(&self, notice: Notice) {
        self.sink.emit(ClientEvent::Notice(notice));
    }

    pub(crate) fn emit_finished(&self, kind: CommandKind) {
        self.sink.emit(ClientEvent::CommandFinished(kind));
    }

    /// Announces a login restored from the durable store and loads the file list.
    pub async fn restore(&self) -> bool {
        let Some(role) = self.auth.role() else {
            return false;
        };
        self.sink.emit(ClientEvent::LoggedIn { role });
        let _ = self.refresh_files().await;
        true
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Role, ClientError> {
        self.status("Logging in...");
        match self.api.login(username, password).await {
            Ok(state) => {
                let role = state.role;
                self.auth.sign_in(state);
                client_info!("Logged in as {} role={}", username, role);
                self.sink.emit(ClientEvent::LoggedIn { role });
                self.status("Login successful");
                let _ = self.refresh_files().await;
                Ok(role)
            }
            Err(err) => {
                client_warn!("Login failed: {}", err);
                self.status("Login failed");
                Err(err)
            }
        }
    }

    pub fn logout(&self) {
        self.auth.sign_out();
        clear_account_view(&self.chat, self.sink.as_ref());
        self.sink.emit(ClientEvent::LoggedOut {
            reason: LogoutReason::UserRequested,
        });
        self.status("Logged out");
    }

    pub async fn refresh_files(&self) -> Result<Vec<String>, ClientError> {
        publish_file_list(self.api.as_ref(), self.sink.as_ref()).await
    }

    pub async fn delete_file(&self, filename: &str) -> Result<(), ClientError> {
        match self.api.delete_file(filename).await {
            Ok(()) => {
                self.notice(Notice::success(format!("File \"{filename}\" deleted")));
                let _ = self.refresh_files().await;
                Ok(())
            }
            Err(err) => {
                let notice = match &err.kind {
                    FailureKind::AuthExpired => {
                        Notice::error("Login expired, please log in again")
                    }
                    FailureKind::PermissionDenied => {
                        Notice::error("Permission denied: only root may delete files")
                    }
                    FailureKind::HttpStatus(_) => {
                        Notice::error(format!("Delete failed: {}", err.message))
                    }
                    _ => Notice::error("Delete failed, check that the backend is running"),
                };
                self.notice(notice);
                Err(err)
            }
        }
    }

    pub async fn chat(&self, message: &str) -> ChatOutcome {
        self.chat.send(message).await
    }

    pub async fn upload(&self, files: Vec<UploadFile>) -> Result<UploadOutcome, ClientError> {
        self.uploads.run(files).await
    }
}

/// What the user saw while logged in goes away on every kind of logout.
fn clear_account_view(chat: &ChatController, sink: &dyn ClientSink) {
    chat.clear_transcript();
    sink.emit(ClientEvent::FilesRefreshed(Vec::new()));
}
