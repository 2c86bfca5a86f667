//! Maps transport outcomes onto the closed error taxonomy.
//!
//! The classifier only labels. It never retries or recovers.

use tracing::{debug, instrument};

use crate::error::{ErrorKind, SessionError};
use crate::transport::TransportFailure;

/// Remote operation a transport outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Operation {
    /// `POST /games`.
    CreateGame,
    /// `GET /games/{id}`.
    FetchGame,
    /// `DELETE /games/{id}`.
    DeleteGame,
    /// `POST /games/{id}/guesses`.
    SubmitGuess,
    /// `GET /games/{id}/guesses/{guessId}`.
    FetchGuess,
}

impl Operation {
    /// True for operations addressed to an existing game id.
    pub fn targets_id(self) -> bool {
        !matches!(self, Self::CreateGame)
    }
}

/// Kind for a response status on the given operation.
#[instrument]
pub fn kind_for_status(operation: Operation, status: u16) -> ErrorKind {
    match (status, operation) {
        (400, Operation::CreateGame) => ErrorKind::InvalidParameters,
        (400, Operation::SubmitGuess) => ErrorKind::InvalidGuess,
        (404, op) if op.targets_id() => ErrorKind::NotFound,
        (409, Operation::SubmitGuess) => ErrorKind::AlreadySolved,
        _ => ErrorKind::ServerFault,
    }
}

/// Classifies a failed transport call into a [`SessionError`].
///
/// The server's error body, when present, is attached unchanged.
#[track_caller]
pub fn classify(operation: Operation, failure: TransportFailure) -> SessionError {
    let error = match failure {
        TransportFailure::NoResponse { reason } => SessionError::new(
            ErrorKind::NetworkFailure,
            format!("{} received no response: {}", operation, reason),
        ),
        TransportFailure::Malformed { reason } => SessionError::server_fault(format!(
            "{} returned a malformed payload: {}",
            operation, reason
        )),
        TransportFailure::Status { status, body } => {
            let kind = kind_for_status(operation, status);
            let message = body
                .as_ref()
                .and_then(|b| b.message().clone())
                .unwrap_or_else(|| format!("{} failed with status {}", operation, status));
            SessionError::new(kind, message).with_response(status, body)
        }
    };
    debug!(%operation, kind = %error.kind(), "Classified transport failure");
    error
}
