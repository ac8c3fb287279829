//! One request/response turn against the backend's streaming chat endpoint.
//!
//! [`ChatClient::start_session`] spawns a task that owns the decoding,
//! framing and parsing of the response stream and delivers events over a
//! channel, in arrival order, until a terminal event or a fatal failure.
//! Dropping or cancelling the returned handle stops the turn; nothing sent
//! after that point can be observed by the caller.

use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::StreamError;
use crate::stream::{parse_frame, EventFramer, StreamEvent, Utf8Decoder};

/// Request body for the streaming chat endpoint.
#[derive(Serialize)]
struct ChatRequest {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
}

/// Progress delivered from the streaming task to the caller loop.
#[derive(Debug)]
pub enum SessionUpdate {
    /// One parsed event.
    Event(StreamEvent),
    /// The session died before reaching a terminal event.
    Failed(StreamError),
}

/// Client for the chat backend.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Start one streaming turn.
    pub fn start_session(&self, message: String, system_prompt: Option<String>) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();
        let task = tokio::spawn(async move {
            if let Err(err) = client.run_stream(message, system_prompt, &tx).await {
                let _ = tx.send(SessionUpdate::Failed(err));
            }
        });
        SessionHandle { updates: rx, task }
    }

    async fn run_stream(
        &self,
        message: String,
        system_prompt: Option<String>,
        updates: &mpsc::UnboundedSender<SessionUpdate>,
    ) -> Result<(), StreamError> {
        let url = format!("{}/v1/chat/stream", self.base_url);
        let request = ChatRequest {
            message,
            system_prompt,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let mut decoder = Utf8Decoder::new();
        let mut framer = EventFramer::new();
        let mut chunks = response.bytes_stream();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            let text = decoder.push(&chunk);
            for frame in framer.push(&text) {
                if let Some(event) = parse_frame(&frame) {
                    let terminal = event.is_terminal();
                    if updates.send(SessionUpdate::Event(event)).is_err() {
                        // Receiver dropped: the caller cancelled this turn.
                        return Ok(());
                    }
                    if terminal {
                        return Ok(());
                    }
                }
            }
        }

        decoder.finish()?;
        if !framer.remainder().is_empty() {
            debug!(
                remainder = %framer.remainder(),
                "discarding unterminated trailing frame"
            );
        }
        // Stream ended without a terminal event: implicit completion.
        let _ = updates.send(SessionUpdate::Event(StreamEvent::Done));
        Ok(())
    }
}

/// A live streaming turn: the update channel plus its cancellation handle.
pub struct SessionHandle {
    updates: mpsc::UnboundedReceiver<SessionUpdate>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Next update, or `None` once the task is gone and the channel drained.
    pub async fn recv(&mut self) -> Option<SessionUpdate> {
        self.updates.recv().await
    }

    /// Abort the turn. Consumes the handle, so no update delivered after
    /// this point can ever be observed.
    pub fn cancel(self) {
        self.task.abort();
        info!("chat session cancelled");
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    async fn collect_updates(handle: &mut SessionHandle) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = handle.recv().await {
            let terminal = match &update {
                SessionUpdate::Event(event) => event.is_terminal(),
                SessionUpdate::Failed(_) => true,
            };
            updates.push(update);
            if terminal {
                break;
            }
        }
        updates
    }

    #[tokio::test]
    async fn streams_tokens_then_done() {
        let body = "data: {\"type\":\"token\",\"content\":\"Hel\"}\n\n\
                    data: {\"type\":\"token\",\"content\":\"lo\"}\n\n\
                    data: [DONE]\n\n";
        let base = spawn_one_shot_server(sse_response(body)).await;

        let client = ChatClient::new(&base);
        let mut handle = client.start_session("hi".to_string(), None);
        let updates = collect_updates(&mut handle).await;

        let events: Vec<_> = updates
            .iter()
            .map(|u| match u {
                SessionUpdate::Event(e) => e.clone(),
                SessionUpdate::Failed(err) => panic!("unexpected failure: {}", err),
            })
            .collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Token("Hel".to_string()),
                StreamEvent::Token("lo".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn non_success_status_surfaces_body_detail() {
        let base =
            spawn_one_shot_server(error_response("500 Internal Server Error", "overloaded")).await;

        let client = ChatClient::new(&base);
        let mut handle = client.start_session("hi".to_string(), None);
        let updates = collect_updates(&mut handle).await;

        assert_eq!(updates.len(), 1);
        match &updates[0] {
            SessionUpdate::Failed(StreamError::Api { status, message }) => {
                assert_eq!(*status, 500);
                assert!(message.contains("overloaded"));
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn end_of_stream_without_done_is_implicit_completion() {
        let body = "data: {\"type\":\"token\",\"content\":\"hi\"}\n\n";
        let base = spawn_one_shot_server(sse_response(body)).await;

        let client = ChatClient::new(&base);
        let mut handle = client.start_session("hi".to_string(), None);
        let updates = collect_updates(&mut handle).await;

        assert_eq!(updates.len(), 2);
        assert!(matches!(
            &updates[0],
            SessionUpdate::Event(StreamEvent::Token(t)) if t == "hi"
        ));
        assert!(matches!(&updates[1], SessionUpdate::Event(StreamEvent::Done)));
    }

    #[tokio::test]
    async fn noise_is_skipped_and_malformed_frames_are_non_fatal() {
        let body = ": keep-alive\n\n\
                    data: not-json\n\n\
                    data: {\"type\":\"token\",\"content\":\"ok\"}\n\n\
                    data: [DONE]\n\n";
        let base = spawn_one_shot_server(sse_response(body)).await;

        let client = ChatClient::new(&base);
        let mut handle = client.start_session("hi".to_string(), None);
        let updates = collect_updates(&mut handle).await;

        let events: Vec<_> = updates
            .iter()
            .map(|u| match u {
                SessionUpdate::Event(e) => e.clone(),
                SessionUpdate::Failed(err) => panic!("unexpected failure: {}", err),
            })
            .collect();
        // The keep-alive comment never becomes an event at all.
        assert_eq!(
            events,
            vec![
                StreamEvent::ParseFailure {
                    raw: "not-json".to_string()
                },
                StreamEvent::Token("ok".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn error_event_is_terminal() {
        let body = "data: {\"type\":\"token\",\"content\":\"part\"}\n\n\
                    data: {\"type\":\"error\",\"content\":\"model crashed\"}\n\n\
                    data: {\"type\":\"token\",\"content\":\"never seen\"}\n\n";
        let base = spawn_one_shot_server(sse_response(body)).await;

        let client = ChatClient::new(&base);
        let mut handle = client.start_session("hi".to_string(), None);
        let updates = collect_updates(&mut handle).await;

        let events: Vec<_> = updates
            .iter()
            .map(|u| match u {
                SessionUpdate::Event(e) => e.clone(),
                SessionUpdate::Failed(err) => panic!("unexpected failure: {}", err),
            })
            .collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Token("part".to_string()),
                StreamEvent::Error("model crashed".to_string()),
            ]
        );
    }
}
