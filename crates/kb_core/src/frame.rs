use serde_json::Value;

/// Prefix that marks a frame line in the chat stream.
pub const FRAME_PREFIX: &str = "data: ";
/// Payload that terminates the chat stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded event from the chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental assistant text.
    Chunk { content: String },
    /// Transient status label, never part of the transcript.
    Progress { content: String },
    /// Retrieval diagnostics; logged, not rendered.
    SearchResults { payload: Value },
    /// Failure reported inside an otherwise healthy connection.
    Error { message: String },
    /// Terminal sentinel.
    Done,
}

/// Outcome of decoding one complete line.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(StreamEvent),
    /// A frame whose payload was not valid JSON. Dropped by consumers.
    Malformed { payload: String },
}

/// Incremental decoder for the `data: <json>` line protocol.
///
/// Bytes are buffered until a newline arrives, so frames and multi-byte
/// characters split across reads are reassembled before decoding. Once the
/// `[DONE]` sentinel is seen the decoder is finished and ignores further input.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feeds one read from the transport and returns the frames it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        if self.finished {
            return Vec::new();
        }
        self.pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.decode_into(&line[..line.len() - 1], &mut frames);
            if self.finished {
                self.pending.clear();
                break;
            }
        }
        frames
    }

    /// Flushes a trailing line that was not newline-terminated at end of stream.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if !self.finished && !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.decode_into(&line, &mut frames);
        }
        self.finished = true;
        frames
    }

    fn decode_into(&mut self, raw: &[u8], frames: &mut Vec<Frame>) {
        let text = String::from_utf8_lossy(raw);
        let line = text.strip_suffix('\r').unwrap_or(&text);
        if let Some(frame) = decode_line(line) {
            if frame == Frame::Event(StreamEvent::Done) {
                self.finished = true;
            }
            frames.push(frame);
        }
    }
}

/// Decodes a single complete line. Lines without the frame prefix, and frames
/// that carry no recognised event, yield `None`.
pub fn decode_line(line: &str) -> Option<Frame> {
    let payload = line.strip_prefix(FRAME_PREFIX)?;
    if payload == DONE_SENTINEL {
        return Some(Frame::Event(StreamEvent::Done));
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => {
            return Some(Frame::Malformed {
                payload: payload.to_string(),
            })
        }
    };
    decode_payload(&value).map(Frame::Event)
}

fn decode_payload(value: &Value) -> Option<StreamEvent> {
    let kind = value.get("type").and_then(Value::as_str);
    let content = value.get("content");

    match kind {
        Some("chunk") if is_truthy(content) => {
            return Some(StreamEvent::Chunk {
                content: text_of(content),
            })
        }
        Some("progress") => {
            return Some(StreamEvent::Progress {
                content: text_of(content),
            })
        }
        Some("search_results") => {
            return Some(StreamEvent::SearchResults {
                payload: value.clone(),
            })
        }
        _ => {}
    }

    // A chunk without content falls through to the error check.
    let error = value.get("error");
    if is_truthy(error) {
        return Some(StreamEvent::Error {
            message: text_of(error),
        });
    }
    None
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
