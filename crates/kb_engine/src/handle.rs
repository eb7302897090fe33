use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use client_logging::{client_error, client_info};
use kb_core::CredentialStore;
use tokio::sync::mpsc as async_mpsc;

use crate::client::KbClient;
use crate::sink::ChannelSink;
use crate::upload::UploadFile;
use crate::{ClientConfig, ClientError, ClientEvent, CommandKind};

#[derive(Debug, Clone)]
pub enum ClientCommand {
    Login { username: String, password: String },
    Logout,
    RefreshFiles,
    Delete { filename: String },
    Chat { message: String },
    Upload { files: Vec<UploadFile> },
}

impl ClientCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            ClientCommand::Login { .. } => CommandKind::Login,
            ClientCommand::Logout => CommandKind::Logout,
            ClientCommand::RefreshFiles => CommandKind::RefreshFiles,
            ClientCommand::Delete { .. } => CommandKind::Delete,
            ClientCommand::Chat { .. } => CommandKind::Chat,
            ClientCommand::Upload { .. } => CommandKind::Upload,
        }
    }
}

/// Runs a [`KbClient`] on a single-threaded runtime owned by a worker thread.
///
/// Commands become cooperative tasks on that one thread; everything they
/// report comes back as [`ClientEvent`]s.
pub struct ClientHandle {
    cmd_tx: async_mpsc::UnboundedSender<ClientCommand>,
    event_rx: mpsc::Receiver<ClientEvent>,
}

impl ClientHandle {
    pub fn spawn(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        let (cmd_tx, mut cmd_rx) = async_mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();
        let client = Arc::new(KbClient::new(
            config,
            store,
            Arc::new(ChannelSink::new(event_tx)),
        )?);

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    client_error!("Could not start client runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                client.restore().await;
                while let Some(command) = cmd_rx.recv().await {
                    let client = client.clone();
                    tokio::spawn(async move {
                        handle_command(&client, command).await;
                    });
                }
                client_info!("Client command channel closed");
            });
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn submit(&self, command: ClientCommand) {
        let _ = self.cmd_tx.send(command);
    }

    /// Blocks for the next event; `None` once the worker has stopped.
    pub fn recv(&self) -> Option<ClientEvent> {
        self.event_rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

async fn handle_command(client: &KbClient, command: ClientCommand) {
    let kind = command.kind();
    match command {
        ClientCommand::Login { username, password } => {
            let _ = client.login(&username, &password).await;
        }
        ClientCommand::Logout => client.logout(),
        ClientCommand::RefreshFiles => {
            let _ = client.refresh_files().await;
        }
        ClientCommand::Delete { filename } => {
            let _ = client.delete_file(&filename).await;
        }
        ClientCommand::Chat { message } => {
            client.chat(&message).await;
        }
        ClientCommand::Upload { files } => {
            let _ = client.upload(files).await;
        }
    }
    client.emit_finished(kind);
}
