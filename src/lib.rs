//! Codebreaker client - session engine for a remote code-guessing game
//!
//! This library plays one game of codebreaker (Mastermind) against a REST
//! service: it validates input locally, serializes guesses, classifies every
//! failure and notifies observers of each change.
//!
//! # Architecture
//!
//! - **Model**: `Game` and `Guess` entities with their invariants
//! - **Validation**: local checks run before any request is sent
//! - **Transport**: the `Transport` seam and its `reqwest` implementation
//! - **Classifier**: maps transport outcomes to `ErrorKind`
//! - **Hub**: per-kind observer channels with replay of the last value
//! - **Service**: the session state machine tying it all together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use codebreaker::{ClientConfig, HttpTransport, SessionService};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::default().with_env_overrides();
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let service = SessionService::with_transport(transport);
//!
//! let _sub = service.hub().solved().subscribe(|solved| {
//!     if *solved {
//!         println!("Solved!");
//!     }
//! });
//!
//! service.start_session("ABCDE", 2).await?;
//! let guess = service.submit_guess("AB").await?;
//! println!("{} exact, {} near", guess.exact_matches(), guess.near_matches());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod classifier;
mod config;
mod error;
mod hub;
mod model;
mod service;
mod transport;
mod validation;

// Crate-level exports - Errors
pub use error::{ErrorBody, ErrorKind, SessionError};

// Crate-level exports - Classification
pub use classifier::{Operation, classify, kind_for_status};

// Crate-level exports - Entities
pub use model::{Game, GameBuilder, Guess, GuessBuilder};

// Crate-level exports - Validation
pub use validation::{
    MAX_CODE_LENGTH, MAX_POOL_SIZE, MIN_CODE_LENGTH, MIN_POOL_SIZE, validate_game_id,
    validate_guess, validate_new_game,
};

// Crate-level exports - Transport
pub use transport::{HttpTransport, Transport, TransportFailure};

// Crate-level exports - Observers
pub use hub::{Channel, ObserverHub, Subscription};

// Crate-level exports - Configuration
pub use config::{BASE_URL_ENV, ClientConfig, ConfigError, LOG_FILTER_ENV};

// Crate-level exports - Session
pub use service::{SessionService, SessionState};
