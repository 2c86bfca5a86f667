//! REST transport over `reqwest`.

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::{Transport, TransportFailure};
use crate::config::{ClientConfig, ConfigError};
use crate::error::ErrorBody;
use crate::model::{Game, Guess};

/// Body of `POST /games`.
#[derive(Debug, Serialize)]
struct CreateGameRequest<'a> {
    pool: &'a str,
    length: usize,
}

/// Body of `POST /games/{id}/guesses`.
#[derive(Debug, Serialize)]
struct SubmitGuessRequest<'a> {
    text: &'a str,
}

/// HTTP implementation of [`Transport`].
///
/// Game and guess ids are opaque: each one is percent-encoded as a single
/// path segment, so `/`, `?` or `#` inside an id never change the target.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport from client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the base URL is unusable or the HTTP client
    /// cannot be built.
    #[instrument(skip(config), fields(base_url = %config.base_url()))]
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(config.base_url(), client)
    }

    /// Creates a transport around an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `base_url` does not parse or cannot carry a
    /// path (e.g. `mailto:` URLs).
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ConfigError::new(format!("Invalid base_url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::new(format!(
                "base_url '{}' cannot carry a path",
                base_url
            )));
        }
        Ok(Self { base_url, client })
    }

    /// Root URL requests are issued against.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL extended by `segments`, each percent-encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Never fails: `with_client` rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn games_url(&self) -> Url {
        self.endpoint(&["games"])
    }

    fn game_url(&self, game_id: &str) -> Url {
        self.endpoint(&["games", game_id])
    }

    fn guesses_url(&self, game_id: &str) -> Url {
        self.endpoint(&["games", game_id, "guesses"])
    }

    fn guess_url(&self, game_id: &str, guess_id: &str) -> Url {
        self.endpoint(&["games", game_id, "guesses", guess_id])
    }

    /// Sends a request, mapping send errors to [`TransportFailure::NoResponse`]
    /// and non-success statuses to [`TransportFailure::Status`].
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, TransportFailure> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, timeout = e.is_timeout(), connect = e.is_connect(), "Request failed without response");
            TransportFailure::NoResponse {
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            warn!(error = %e, %status, "Failed to read response body");
            TransportFailure::NoResponse {
                reason: format!("failed to read response body: {}", e),
            }
        })?;
        debug!(%status, len = bytes.len(), "Received response");

        if status.is_success() {
            Ok(bytes.to_vec())
        } else {
            let body = serde_json::from_slice::<ErrorBody>(&bytes).ok();
            if body.is_none() {
                debug!(%status, "Error response had no decodable body");
            }
            Err(TransportFailure::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransportFailure> {
        serde_json::from_slice(bytes).map_err(|e| {
            warn!(error = %e, "Failed to decode response payload");
            TransportFailure::Malformed {
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, game), fields(pool = %game.pool(), length = *game.length()))]
    async fn create_game(&self, game: &Game) -> Result<Game, TransportFailure> {
        debug!("Creating game via REST");
        let body = CreateGameRequest {
            pool: game.pool(),
            length: *game.length(),
        };
        let bytes = self.send(self.client.post(self.games_url()).json(&body)).await?;
        Self::decode(&bytes)
    }

    #[instrument(skip(self))]
    async fn fetch_game(&self, game_id: &str) -> Result<Game, TransportFailure> {
        debug!("Fetching game via REST");
        let bytes = self.send(self.client.get(self.game_url(game_id))).await?;
        Self::decode(&bytes)
    }

    #[instrument(skip(self))]
    async fn delete_game(&self, game_id: &str) -> Result<(), TransportFailure> {
        debug!("Deleting game via REST");
        self.send(self.client.delete(self.game_url(game_id))).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn submit_guess(&self, game_id: &str, text: &str) -> Result<Guess, TransportFailure> {
        debug!("Submitting guess via REST");
        let body = SubmitGuessRequest { text };
        let bytes = self
            .send(self.client.post(self.guesses_url(game_id)).json(&body))
            .await?;
        Self::decode(&bytes)
    }

    #[instrument(skip(self))]
    async fn fetch_guess(&self, game_id: &str, guess_id: &str) -> Result<Guess, TransportFailure> {
        debug!("Fetching guess via REST");
        let bytes = self.send(self.client.get(self.guess_url(game_id, guess_id))).await?;
        Self::decode(&bytes)
    }
}
