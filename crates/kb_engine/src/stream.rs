use std::collections::VecDeque;

use bytes::Bytes;
use client_logging::client_debug;
use futures_util::{stream, Stream, StreamExt};
use kb_core::{Frame, FrameDecoder, StreamEvent};

use crate::{ClientError, Diagnostic};

struct DecodeState<S, F> {
    bytes: S,
    decoder: FrameDecoder,
    ready: VecDeque<StreamEvent>,
    on_diagnostic: F,
    ended: bool,
}

impl<S, F: FnMut(Diagnostic)> DecodeState<S, F> {
    fn absorb(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            match frame {
                Frame::Event(event) => self.ready.push_back(event),
                // Best-effort parse: undecodable frames are dropped, only reported.
                Frame::Malformed { payload } => {
                    client_debug!("Dropping malformed frame ({} bytes)", payload.len());
                    (self.on_diagnostic)(Diagnostic::MalformedFrame { payload });
                }
            }
        }
        if self.decoder.is_finished() {
            self.ended = true;
        }
    }
}

/// Turns a chunked chat body into a lazy, ordered sequence of [`StreamEvent`]s.
///
/// The sequence ends at transport end-of-stream or right after `Done`, whichever
/// comes first. A transport error is yielded once and ends the sequence.
pub fn decode_events<S, F>(
    bytes: S,
    on_diagnostic: F,
) -> impl Stream<Item = Result<StreamEvent, ClientError>>
where
    S: Stream<Item = Result<Bytes, ClientError>> + Unpin,
    F: FnMut(Diagnostic),
{
    let state = DecodeState {
        bytes,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        on_diagnostic,
        ended: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), state));
            }
            if state.ended {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(&chunk);
                    state.absorb(frames);
                }
                Some(Err(err)) => {
                    state.ended = true;
                    return Some((Err(err), state));
                }
                None => {
                    let frames = state.decoder.finish();
                    state.absorb(frames);
                    state.ended = true;
                }
            }
        }
    })
}
