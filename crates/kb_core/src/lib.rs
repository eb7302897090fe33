//! Knowledge-base client core: pure state machines and protocol decoding.
mod auth;
mod chat;
mod frame;
mod notice;
mod session;
mod upload;

pub use auth::{AuthState, CredentialStore, MemoryCredentialStore, Role};
pub use chat::{
    update, ChatChange, ChatMsg, ChatPhase, ChatSession, PROGRESS_ANALYZING, STATUS_COMPLETED,
    STATUS_IDLE, STATUS_RECEIVING, STATUS_REQUESTING,
};
pub use frame::{decode_line, Frame, FrameDecoder, StreamEvent, DONE_SENTINEL, FRAME_PREFIX};
pub use notice::{Notice, NoticeKind, NOTICE_DURATION};
pub use session::Session;
pub use upload::{
    reconcile_with_listing, BatchSummary, JobStatus, PollStatus, UploadBatch, UploadJob,
};
