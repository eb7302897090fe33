use std::sync::mpsc;

use crate::ClientEvent;

/// Receives everything the client wants the user (or a test) to observe.
pub trait ClientSink: Send + Sync {
    fn emit(&self, event: ClientEvent);
}

pub struct ChannelSink {
    tx: mpsc::Sender<ClientEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ClientEvent>) -> Self {
        Self { tx }
    }
}

impl ClientSink for ChannelSink {
    fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards events. Useful when only the return values matter.
#[derive(Debug, Default)]
pub struct NullSink;

impl ClientSink for NullSink {
    fn emit(&self, _event: ClientEvent) {}
}
