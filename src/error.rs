//! Error taxonomy for session operations.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Closed set of failure kinds a session operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter)]
pub enum ErrorKind {
    /// Creation parameters (pool, length, id) were rejected.
    InvalidParameters,
    /// Guess text does not fit the game's pool or length.
    InvalidGuess,
    /// The game is already solved.
    AlreadySolved,
    /// The game or guess id is unknown to the server.
    NotFound,
    /// No response was received (connectivity or timeout).
    NetworkFailure,
    /// 5xx, an unrecognized status, or a malformed success payload.
    ServerFault,
    /// The operation is not allowed in the current session state.
    ///
    /// Raised only by the session service itself, never by the classifier.
    InvalidState,
}

impl ErrorKind {
    /// True when a caller-side retry could plausibly succeed.
    ///
    /// The engine itself never retries.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::NetworkFailure | Self::ServerFault)
    }
}

/// Diagnostic body carried by every 4xx/5xx response.
///
/// Only `status` is interpreted; the rest is forwarded untouched to error observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, new)]
pub struct ErrorBody {
    /// HTTP status echoed by the server.
    status: u16,
    /// Human-readable message.
    message: Option<String>,
    /// Server timestamp, kept verbatim.
    #[serde(default)]
    #[new(default)]
    timestamp: Option<String>,
    /// Reason phrase (e.g. "Not Found").
    #[serde(default)]
    #[new(default)]
    error: Option<String>,
    /// Request path the error refers to.
    #[serde(default)]
    #[new(default)]
    path: Option<String>,
    /// Free-form validation details.
    #[serde(default)]
    #[new(default)]
    details: Option<serde_json::Value>,
}

/// A classified, immutable failure of a session operation.
#[derive(Debug, Clone, Display, Error)]
#[display("{}: {} at {}:{}", kind, message, file, line)]
pub struct SessionError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    body: Option<ErrorBody>,
    line: u32,
    file: &'static str,
}

impl SessionError {
    /// Creates a new error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            status: None,
            body: None,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Shorthand for [`ErrorKind::InvalidParameters`].
    #[track_caller]
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameters, message)
    }

    /// Shorthand for [`ErrorKind::InvalidGuess`].
    #[track_caller]
    pub fn invalid_guess(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidGuess, message)
    }

    /// Shorthand for [`ErrorKind::AlreadySolved`].
    #[track_caller]
    pub fn already_solved(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadySolved, message)
    }

    /// Shorthand for [`ErrorKind::NotFound`].
    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for [`ErrorKind::ServerFault`].
    #[track_caller]
    pub fn server_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerFault, message)
    }

    /// Shorthand for [`ErrorKind::InvalidState`].
    #[track_caller]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    /// Attaches the HTTP status and diagnostic body of the response.
    pub fn with_response(mut self, status: u16, body: Option<ErrorBody>) -> Self {
        self.status = Some(status);
        self.body = body;
        self
    }

    /// The failure kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message describing the failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Server diagnostic body, when one was returned.
    pub fn body(&self) -> Option<&ErrorBody> {
        self.body.as_ref()
    }

    /// Source location where the error was raised.
    pub fn location(&self) -> (&'static str, u32) {
        (self.file, self.line)
    }
}
