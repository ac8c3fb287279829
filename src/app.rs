use tracing::{info, warn};

use crate::chat::{ChatMessage, ChatRole, MessageAccumulator, TurnEnd};
use crate::config::Config;
use crate::error::StreamError;
use crate::session::{ChatClient, SessionHandle, SessionUpdate};
use crate::stream::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

fn greeting() -> ChatMessage {
    ChatMessage {
        role: ChatRole::Assistant,
        content: "Hi there! I'm Charla, an AI assistant. I can help you with things like \
                  answering questions, providing information, and helping with tasks. How \
                  can I help you?"
            .to_string(),
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation state
    pub chat_messages: Vec<ChatMessage>,
    pub accumulator: MessageAccumulator,

    // Session state: `busy` is true from send until the terminal outcome,
    // whichever path gets there first.
    pub busy: bool,
    pub session: Option<SessionHandle>,

    // Composer state
    pub input: String,
    pub cursor: usize, // cursor position in input, in characters

    // Transcript scroll state (chat area size is updated during render)
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Transient feedback
    pub status_line: Option<String>,
    pub last_error: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Backend
    pub client: ChatClient,
    pub system_prompt: Option<String>,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let client = ChatClient::new(&config.resolved_api_url());

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            chat_messages: vec![greeting()],
            accumulator: MessageAccumulator::new(),

            busy: false,
            session: None,

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            status_line: None,
            last_error: None,

            animation_frame: 0,

            client,
            system_prompt: config.system_prompt.clone(),
        }
    }

    /// Send the composer content as a new user message and start a
    /// streaming turn. Refused while a turn is already in flight.
    pub fn send_message(&mut self) {
        if self.busy {
            return;
        }
        let content = self.input.trim().to_string();
        if content.is_empty() {
            return;
        }

        self.input.clear();
        self.cursor = 0;
        self.last_error = None;

        self.chat_messages.push(ChatMessage {
            role: ChatRole::User,
            content: content.clone(),
        });

        self.accumulator.begin_turn();
        self.busy = true;
        self.scroll_to_bottom();

        self.session = Some(self.client.start_session(content, self.system_prompt.clone()));
        info!("chat turn started");
    }

    /// Fold one update from the streaming task into the app state.
    pub fn apply_update(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Event(event) => {
                if let StreamEvent::Status(note) = &event {
                    self.status_line = Some(note.clone());
                }
                let follow = matches!(event, StreamEvent::Token(_));
                match self.accumulator.apply(event, &mut self.chat_messages) {
                    Some(TurnEnd::Completed) => self.finish_turn(None),
                    Some(TurnEnd::Failed(message)) => {
                        self.finish_turn(Some(StreamError::Application(message)));
                    }
                    None => {}
                }
                if follow {
                    self.scroll_to_bottom();
                }
            }
            SessionUpdate::Failed(err) => self.finish_turn(Some(err)),
        }
    }

    /// The single cleanup path for a turn. Every outcome funnels through
    /// here, so `busy` is cleared exactly once no matter how the turn ended.
    pub fn finish_turn(&mut self, error: Option<StreamError>) {
        if !self.busy {
            return;
        }

        self.accumulator.seal();
        self.session = None;
        self.busy = false;
        self.status_line = None;

        if let Some(err) = error {
            warn!(error = %err, "chat turn failed");
            self.last_error = Some(err.to_string());
        } else {
            info!("chat turn finished");
        }
    }

    /// Abort the in-flight turn. Content accumulated so far stays in the
    /// history; updates still in flight can never be observed.
    pub fn cancel_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
            self.finish_turn(None);
        }
    }

    /// Clear the conversation back to the greeting. Refused mid-turn.
    pub fn reset_conversation(&mut self) {
        if self.busy {
            return;
        }
        self.chat_messages = vec![greeting()];
        self.chat_scroll = 0;
        self.last_error = None;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.busy {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Estimated rendered line count of the transcript at the given wrap
    /// width, including the thinking indicator while busy.
    pub fn chat_line_count(&self, wrap_width: usize) -> u16 {
        let wrap_width = wrap_width.max(1);
        let mut total_lines: u16 = 0;

        for msg in &self.chat_messages {
            total_lines += 1; // Role line ("You:" or "AI:")
            let mut content_lines = 0u16;
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    content_lines += 1; // Empty line still takes one line
                } else {
                    content_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += content_lines.max(1);
            total_lines += 1; // Blank line after message
        }

        if self.busy {
            total_lines += 2; // "AI:" + "Thinking..."
        }

        total_lines
    }

    /// Scroll the transcript so the newest content is visible.
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };
        let total_lines = self.chat_line_count(wrap_width);

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines - visible_height;
        } else {
            self.chat_scroll = 0;
        }
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testutil::*;

    fn test_app(base_url: &str) -> App {
        let config = Config {
            api_url: Some(base_url.to_string()),
            system_prompt: None,
        };
        App::new(&config)
    }

    /// Pump session updates until the turn reaches its terminal outcome.
    async fn drain_turn(app: &mut App) {
        while app.session.is_some() {
            let update = match app.session.as_mut() {
                Some(session) => session.recv().await,
                None => break,
            };
            match update {
                Some(update) => app.apply_update(update),
                None => app.finish_turn(None),
            }
        }
    }

    #[tokio::test]
    async fn full_turn_accumulates_split_tokens() {
        let body = "data: {\"type\":\"token\",\"content\":\"Hel\"}\n\n\
                    data: {\"type\":\"token\",\"content\":\"lo\"}\n\n\
                    data: [DONE]\n\n";
        let base = spawn_one_shot_server(sse_response(body)).await;
        let mut app = test_app(&base);

        app.input = "say hello".to_string();
        app.send_message();
        assert!(app.busy);
        assert!(app.input.is_empty());
        // Greeting + user message so far.
        assert_eq!(app.chat_messages.len(), 2);
        assert_eq!(app.chat_messages[1].role, ChatRole::User);

        drain_turn(&mut app).await;

        assert!(!app.busy);
        assert!(app.session.is_none());
        assert!(app.last_error.is_none());
        assert_eq!(app.chat_messages.len(), 3);
        let reply = &app.chat_messages[2];
        assert_eq!(reply.role, ChatRole::Assistant);
        assert_eq!(reply.content, "Hello");
    }

    #[tokio::test]
    async fn failed_request_surfaces_error_without_assistant_message() {
        let base =
            spawn_one_shot_server(error_response("500 Internal Server Error", "overloaded")).await;
        let mut app = test_app(&base);

        app.input = "hi".to_string();
        app.send_message();
        drain_turn(&mut app).await;

        assert!(!app.busy);
        assert_eq!(app.chat_messages.len(), 2); // greeting + user only
        let error = app.last_error.as_deref().unwrap();
        assert!(error.contains("overloaded"), "got: {}", error);
    }

    #[tokio::test]
    async fn backend_error_event_keeps_partial_content() {
        let body = "data: {\"type\":\"token\",\"content\":\"part\"}\n\n\
                    data: {\"type\":\"error\",\"content\":\"model crashed\"}\n\n";
        let base = spawn_one_shot_server(sse_response(body)).await;
        let mut app = test_app(&base);

        app.input = "hi".to_string();
        app.send_message();
        drain_turn(&mut app).await;

        assert!(!app.busy);
        assert_eq!(app.chat_messages.len(), 3);
        assert_eq!(app.chat_messages[2].content, "part");
        assert!(app.last_error.as_deref().unwrap().contains("model crashed"));
    }

    #[tokio::test]
    async fn cancellation_keeps_partial_content_and_clears_busy() {
        let head = sse_response("data: {\"type\":\"token\",\"content\":\"partial\"}\n\n");
        let base = spawn_stalling_server(head).await;
        let mut app = test_app(&base);

        app.input = "hi".to_string();
        app.send_message();
        assert!(app.busy);

        // Wait for the one token the stub delivers, then cancel mid-stream.
        let update = app
            .session
            .as_mut()
            .expect("session running")
            .recv()
            .await
            .expect("token update");
        app.apply_update(update);
        assert_eq!(app.chat_messages[2].content, "partial");

        app.cancel_session();

        assert!(!app.busy);
        assert!(app.session.is_none());
        assert!(app.last_error.is_none());
        assert_eq!(app.chat_messages[2].content, "partial");
    }

    #[tokio::test]
    async fn send_is_refused_while_busy() {
        let head = sse_response("");
        let base = spawn_stalling_server(head).await;
        let mut app = test_app(&base);

        app.input = "first".to_string();
        app.send_message();
        let history_len = app.chat_messages.len();

        app.input = "second".to_string();
        app.send_message();

        assert_eq!(app.chat_messages.len(), history_len);
        assert_eq!(app.input, "second");

        app.cancel_session();
    }

    #[tokio::test]
    async fn status_notice_is_transient() {
        let body = "data: {\"type\":\"status\",\"content\":\"searching\"}\n\n\
                    data: {\"type\":\"token\",\"content\":\"hi\"}\n\n\
                    data: [DONE]\n\n";
        let base = spawn_one_shot_server(sse_response(body)).await;
        let mut app = test_app(&base);

        app.input = "hi".to_string();
        app.send_message();

        let update = app
            .session
            .as_mut()
            .expect("session running")
            .recv()
            .await
            .expect("status update");
        app.apply_update(update);
        assert_eq!(app.status_line.as_deref(), Some("searching"));

        drain_turn(&mut app).await;
        // Cleared at turn end; the history never saw it.
        assert!(app.status_line.is_none());
        assert_eq!(app.chat_messages[2].content, "hi");
    }

    #[test]
    fn reset_restores_the_greeting() {
        let mut app = test_app("http://localhost:0");
        app.chat_messages.push(ChatMessage {
            role: ChatRole::User,
            content: "hi".to_string(),
        });
        app.last_error = Some("old error".to_string());

        app.reset_conversation();

        assert_eq!(app.chat_messages.len(), 1);
        assert_eq!(app.chat_messages[0].role, ChatRole::Assistant);
        assert!(app.last_error.is_none());
    }
}
