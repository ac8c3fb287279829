//! Streaming response assembly: incremental UTF-8 decoding, frame splitting
//! and frame parsing for the backend's event stream.
//!
//! The backend sends one event per paragraph:
//!
//! ```text
//! data: {"type":"token","content":"<fragment>"}\n\n
//! data: [DONE]\n\n
//! ```
//!
//! Transport chunks land on arbitrary byte boundaries, so decoding and
//! framing both carry state across calls.

use serde::Deserialize;

use crate::error::StreamError;

/// Frame delimiter of the wire protocol.
const FRAME_DELIMITER: &str = "\n\n";
/// Only frames carrying this prefix mean anything; the rest is keep-alive
/// noise such as comment lines.
const DATA_PREFIX: &str = "data: ";
/// Marker the backend sends after the last event of a turn.
const DONE_MARKER: &str = "[DONE]";

/// One parsed event from the backend stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental content for the current assistant message.
    Token(String),
    /// Progress notice, shown outside the message history.
    Status(String),
    /// Backend-reported failure; ends the turn.
    Error(String),
    /// End of the assistant turn.
    Done,
    /// A prefixed frame that didn't parse. The stream continues.
    ParseFailure { raw: String },
}

impl StreamEvent {
    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }
}

/// Payload of a `data:` frame. A `type` outside this closed set fails to
/// decode and becomes [`StreamEvent::ParseFailure`].
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WirePayload {
    Token { content: String },
    Status { content: String },
    Error { content: String },
}

/// Incremental UTF-8 decoder for transport chunks.
///
/// A multi-byte character split across a chunk boundary is held back until
/// its remaining bytes arrive. Invalid sequences inside a chunk decode to
/// U+FFFD; only bytes still undecodable when the stream ends are fatal.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning the text that is complete so far.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::new();
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        // Invalid sequence inside the chunk: replace it and
                        // keep going.
                        Some(len) => {
                            out.push('\u{FFFD}');
                            rest = &tail[len..];
                        }
                        // Incomplete trailing character: hold the bytes for
                        // the next chunk.
                        None => {
                            rest = tail;
                            break;
                        }
                    }
                }
            }
        }
        self.pending = rest.to_vec();
        out
    }

    /// Flush at end of stream. Fails if a partial character never completed.
    pub fn finish(&mut self) -> Result<(), StreamError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            self.pending.clear();
            Err(StreamError::Decode)
        }
    }
}

/// Splits decoded text into complete frames, retaining the trailing partial
/// frame across calls.
#[derive(Debug, Default)]
pub struct EventFramer {
    pending: String,
}

impl EventFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return every frame it completed. The final
    /// segment stays buffered until its delimiter arrives; a partial frame
    /// carries no guaranteed meaning, so if the stream ends first it is
    /// dropped rather than guessed at.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.pending.push_str(fragment);

        let mut frames = Vec::new();
        while let Some(boundary) = self.pending.find(FRAME_DELIMITER) {
            frames.push(self.pending[..boundary].to_string());
            self.pending.drain(..boundary + FRAME_DELIMITER.len());
        }
        frames
    }

    /// Leftover text that never completed a frame. Diagnostic only, read
    /// when the stream ends.
    pub fn remainder(&self) -> &str {
        &self.pending
    }
}

/// Interpret one frame. Frames without the `data: ` prefix are comments or
/// keep-alives and yield `None`; every prefixed frame yields exactly one
/// event.
pub fn parse_frame(frame: &str) -> Option<StreamEvent> {
    let payload = frame.strip_prefix(DATA_PREFIX)?;

    if payload == DONE_MARKER {
        return Some(StreamEvent::Done);
    }

    let event = match serde_json::from_str::<WirePayload>(payload) {
        Ok(WirePayload::Token { content }) => StreamEvent::Token(content),
        Ok(WirePayload::Status { content }) => StreamEvent::Status(content),
        Ok(WirePayload::Error { content }) => StreamEvent::Error(content),
        Err(_) => StreamEvent::ParseFailure {
            raw: payload.to_string(),
        },
    };
    Some(event)
}
