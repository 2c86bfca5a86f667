//! Boundary to the remote codebreaker service.
//!
//! The session service only talks to the [`Transport`] trait; [`HttpTransport`]
//! is the production implementation.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use derive_more::Display;

use crate::error::ErrorBody;
use crate::model::{Game, Guess};

/// Raw outcome of a failed transport call, before classification.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum TransportFailure {
    /// No response arrived (connect error, timeout, broken connection).
    #[display("no response: {}", reason)]
    NoResponse {
        /// Description of the underlying failure.
        reason: String,
    },
    /// The server answered with a non-success status.
    #[display("status {}", status)]
    Status {
        /// HTTP status code.
        status: u16,
        /// Decoded error body, when the payload parsed.
        body: Option<ErrorBody>,
    },
    /// The server answered with success but the body could not be decoded.
    #[display("malformed response: {}", reason)]
    Malformed {
        /// Decoder message.
        reason: String,
    },
}

impl TransportFailure {
    /// Shorthand for a status failure without a body.
    pub fn status(status: u16) -> Self {
        Self::Status { status, body: None }
    }
}

/// Resource contract of the codebreaker service.
///
/// Implementations perform exactly one request per call and never retry.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// `POST /games` with `{pool, length}`.
    async fn create_game(&self, game: &Game) -> Result<Game, TransportFailure>;

    /// `GET /games/{id}`.
    async fn fetch_game(&self, game_id: &str) -> Result<Game, TransportFailure>;

    /// `DELETE /games/{id}`.
    async fn delete_game(&self, game_id: &str) -> Result<(), TransportFailure>;

    /// `POST /games/{id}/guesses` with `{text}`.
    async fn submit_guess(&self, game_id: &str, text: &str) -> Result<Guess, TransportFailure>;

    /// `GET /games/{id}/guesses/{guessId}`.
    async fn fetch_guess(&self, game_id: &str, guess_id: &str) -> Result<Guess, TransportFailure>;
}
