use thiserror::Error;

/// Fatal session errors. Exactly one of these (or a clean completion) ends a
/// turn. A single malformed frame is not fatal; it surfaces as
/// [`crate::stream::StreamEvent::ParseFailure`] and the stream continues.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream ended while a multi-byte character was still incomplete.
    #[error("response stream ended with an undecodable byte sequence")]
    Decode,

    /// Transport-level failure: connection refused, DNS, mid-stream drop.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The backend reported an error through the event stream itself.
    #[error("assistant error: {0}")]
    Application(String),
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            StreamError::Network(format!("connection failed: {}", err))
        } else if err.is_timeout() {
            StreamError::Network(format!("request timed out: {}", err))
        } else {
            StreamError::Network(err.to_string())
        }
    }
}
