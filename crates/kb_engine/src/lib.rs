//! Knowledge-base client engine: HTTP transport, streaming chat and upload orchestration.
mod api;
mod auth;
mod chat;
mod client;
mod config;
mod handle;
mod sink;
mod store;
mod stream;
mod transport;
mod types;
mod upload;

pub use api::{ByteStream, HttpKbApi, KbApi};
pub use auth::AuthSession;
pub use chat::{ChatController, ChatOutcome};
pub use client::KbClient;
pub use config::{parse_base_url, ClientConfig, DEFAULT_BASE_URL};
pub use handle::{ClientCommand, ClientHandle};
pub use sink::{ChannelSink, ClientSink, NullSink};
pub use store::{FileCredentialStore, StoreError};
pub use stream::decode_events;
pub use transport::AuthTransport;
pub use types::{
    ClientError, ClientEvent, CommandKind, Diagnostic, FailureKind, LogoutReason,
    TranscriptUpdate,
};
pub use upload::{UploadFile, UploadOrchestrator, UploadOutcome};
