//! Chat history types and the accumulator that folds stream events into
//! them.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::stream::StreamEvent;

/// A chat message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Whether the current turn has an assistant message open for appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Streaming,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    /// The backend finished the message, or the stream closed cleanly.
    Completed,
    /// The backend reported an error; the turn is over.
    Failed(String),
}

/// Folds stream events into the message history.
///
/// One assistant message per turn: the first Token opens it, later Tokens
/// append to it, a terminal event seals it. Only the last message is ever
/// mutated, and only between the first Token and the terminal event;
/// everything before it is frozen.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    phase: Phase,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new turn.
    pub fn begin_turn(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Apply one event to the history. Token contents concatenate in arrival
    /// order no matter how the transport chunked or framed the bytes.
    /// Returns the outcome for terminal events.
    pub fn apply(
        &mut self,
        event: StreamEvent,
        history: &mut Vec<ChatMessage>,
    ) -> Option<TurnEnd> {
        match event {
            StreamEvent::Token(content) => {
                match self.phase {
                    Phase::Idle => {
                        history.push(ChatMessage {
                            role: ChatRole::Assistant,
                            content,
                        });
                        self.phase = Phase::Streaming;
                    }
                    Phase::Streaming => {
                        if let Some(last) = history.last_mut() {
                            last.content.push_str(&content);
                        }
                    }
                }
                None
            }
            StreamEvent::Status(note) => {
                debug!(status = %note, "backend status notice");
                None
            }
            StreamEvent::Error(message) => {
                self.phase = Phase::Idle;
                Some(TurnEnd::Failed(message))
            }
            StreamEvent::Done => {
                self.phase = Phase::Idle;
                Some(TurnEnd::Completed)
            }
            StreamEvent::ParseFailure { raw } => {
                warn!(frame = %raw, "dropping malformed stream frame");
                None
            }
        }
    }

    /// Seal any open message without a terminal event, e.g. when the caller
    /// cancels the turn.
    pub fn seal(&mut self) {
        self.phase = Phase::Idle;
    }

    /// True while the last history entry is still open for appending.
    pub fn is_streaming(&self) -> bool {
        self.phase == Phase::Streaming
    }
}
