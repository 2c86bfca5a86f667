//! Session state machine: owns the cached game and orders remote calls.
//!
//! ```text
//! Uninitialized ─start─▶ Starting ─ok─▶ Active ⇄ Submitting ─solved─▶ Completed
//!        ▲                  │                                            │
//!        └──────failed──────┘            delete (any state) ─▶ Terminated
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::classifier::{Operation, classify};
use crate::error::{ErrorKind, SessionError};
use crate::hub::ObserverHub;
use crate::model::{Game, Guess};
use crate::transport::Transport;
use crate::validation;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, strum::Display)]
pub enum SessionState {
    /// No game has been created or resumed.
    #[default]
    Uninitialized,
    /// A creation request is in flight.
    Starting,
    /// A game is in progress and accepts guesses.
    Active,
    /// A guess is in flight.
    Submitting,
    /// The game has been solved.
    Completed,
    /// The game was deleted.
    Terminated,
}

impl SessionState {
    /// True when a new session may be started.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Terminated)
    }

    /// True when guesses may be submitted or queued.
    pub fn accepts_guesses(self) -> bool {
        matches!(self, Self::Active | Self::Submitting)
    }
}

#[derive(Debug, Default)]
struct Cache {
    state: SessionState,
    game: Option<Arc<Game>>,
}

/// Plays one codebreaker game against a [`Transport`].
///
/// Construct one per game at the composition root and share it by reference.
/// All methods take `&self`; the service is `Send + Sync`.
#[derive(Debug)]
pub struct SessionService {
    transport: Arc<dyn Transport>,
    hub: Arc<ObserverHub>,
    cache: Mutex<Cache>,
    state_tx: watch::Sender<SessionState>,
    // start/delete/resume never overlap each other
    lifecycle: tokio::sync::Mutex<()>,
    // fair mutex: queued guesses are dispatched in arrival order
    submissions: tokio::sync::Mutex<()>,
}

impl SessionService {
    /// Creates a service that publishes to `hub`.
    #[instrument(skip_all)]
    pub fn new(transport: Arc<dyn Transport>, hub: Arc<ObserverHub>) -> Self {
        info!("Creating SessionService");
        let (state_tx, _rx) = watch::channel(SessionState::Uninitialized);
        Self {
            transport,
            hub,
            cache: Mutex::new(Cache::default()),
            state_tx,
            lifecycle: tokio::sync::Mutex::new(()),
            submissions: tokio::sync::Mutex::new(()),
        }
    }

    /// Creates a service with its own, fresh hub.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, Arc::new(ObserverHub::new()))
    }

    /// The hub this service publishes to.
    pub fn hub(&self) -> &Arc<ObserverHub> {
        &self.hub
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.cache().state
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the cached game, if any.
    pub fn game(&self) -> Option<Arc<Game>> {
        self.cache().game.clone()
    }

    /// Creates a new game with the given pool and code length.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the session is uninitialized or terminated,
    /// `InvalidParameters` for a bad pool or length (no request is sent),
    /// otherwise the classified transport failure.
    #[instrument(skip(self, pool))]
    pub async fn start_session(
        &self,
        pool: impl Into<String>,
        length: usize,
    ) -> Result<Arc<Game>, SessionError> {
        let pool = pool.into();
        let _lifecycle = self.lifecycle.lock().await;

        let prior = self.state();
        if !prior.can_start() {
            return Err(self.fail(SessionError::invalid_state(format!(
                "cannot start a session while {}",
                prior
            ))));
        }
        let request = Game::builder()
            .pool(pool)
            .length(length)
            .build()
            .map_err(|e| self.fail(e))?;

        self.set_state(SessionState::Starting);
        info!(pool = %request.pool(), length, "Starting session");

        let created = match self.transport.create_game(&request).await {
            Ok(game) => game,
            Err(failure) => {
                self.set_state(prior);
                return Err(self.fail(classify(Operation::CreateGame, failure)));
            }
        };

        if let Err(reason) = Self::check_created(&request, &created) {
            self.set_state(prior);
            return Err(self.fail(SessionError::server_fault(reason)));
        }

        let game = Arc::new(created);
        self.adopt(Arc::clone(&game));
        info!(game_id = ?game.id(), "Session started");
        Ok(game)
    }

    /// Fetches a game by id and makes it the current session.
    ///
    /// Usable from any state, e.g. to resume a game after a restart.
    ///
    /// # Errors
    ///
    /// `InvalidParameters` for a blank id, otherwise the classified failure.
    #[instrument(skip(self))]
    pub async fn get_session(&self, game_id: &str) -> Result<Arc<Game>, SessionError> {
        validation::validate_game_id(game_id).map_err(|e| self.fail(e))?;
        let _lifecycle = self.lifecycle.lock().await;
        let _turn = self.submissions.lock().await;

        let fetched = self
            .transport
            .fetch_game(game_id)
            .await
            .map_err(|failure| self.fail(classify(Operation::FetchGame, failure)))?;

        if let Err(reason) = Self::check_fetched(game_id, &fetched) {
            return Err(self.fail(SessionError::server_fault(reason)));
        }

        let game = Arc::new(fetched);
        self.adopt(Arc::clone(&game));
        info!(guesses = game.guesses().len(), solved = *game.solved(), "Session resumed");
        Ok(game)
    }

    /// Deletes the current game on the server and terminates the session.
    ///
    /// Deleting when there is no game, or when the server no longer knows the
    /// id, succeeds.
    ///
    /// # Errors
    ///
    /// The classified failure for anything other than success or 404.
    #[instrument(skip(self))]
    pub async fn delete_session(&self) -> Result<(), SessionError> {
        let _lifecycle = self.lifecycle.lock().await;

        let Some(game_id) = self.current_id() else {
            debug!(state = %self.state(), "No game to delete");
            return Ok(());
        };

        match self.transport.delete_game(&game_id).await {
            Ok(()) => info!(%game_id, "Game deleted"),
            Err(failure) => {
                let error = classify(Operation::DeleteGame, failure);
                if error.kind() != ErrorKind::NotFound {
                    return Err(self.fail(error));
                }
                warn!(%game_id, "Game already absent on server; treating delete as done");
            }
        }

        {
            let mut cache = self.cache();
            cache.game = None;
            cache.state = SessionState::Terminated;
        }
        self.state_tx.send_replace(SessionState::Terminated);
        self.hub.reset_session();
        Ok(())
    }

    /// Submits a guess for the current game.
    ///
    /// Calls made while another guess is in flight wait their turn in FIFO
    /// order. Local validation happens before the call first suspends.
    ///
    /// # Errors
    ///
    /// `InvalidGuess` or `AlreadySolved` from local validation (no request is
    /// sent), `InvalidState` without an active game, `NotFound` if the session
    /// changed while the guess was queued, otherwise the classified failure.
    #[instrument(skip(self, text))]
    pub async fn submit_guess(&self, text: impl Into<String>) -> Result<Guess, SessionError> {
        let text = text.into();
        let target = self.submittable(None, &text).map_err(|e| self.fail(e))?;
        let Some(game_id) = target.id().clone() else {
            return Err(self.fail(SessionError::invalid_state("current game has no id")));
        };

        let _turn = self.submissions.lock().await;
        // Re-check against whatever earlier guesses left behind.
        self.submittable(Some(&game_id), &text)
            .map_err(|e| self.fail(e))?;

        self.set_state(SessionState::Submitting);
        debug!(%game_id, %text, "Submitting guess");

        match self.transport.submit_guess(&game_id, &text).await {
            Ok(guess) => self.apply_guess(&game_id, guess).await,
            Err(failure) => {
                let error = classify(Operation::SubmitGuess, failure);
                if error.kind() == ErrorKind::AlreadySolved {
                    warn!(%game_id, "Server reports game solved; reconciling");
                    self.reconcile(&game_id).await;
                } else {
                    self.finish_submission(&game_id);
                }
                Err(self.fail(error))
            }
        }
    }

    /// Fetches a single guess of the current game. Never changes state.
    ///
    /// # Errors
    ///
    /// `InvalidState` without a current game, otherwise the classified failure.
    #[instrument(skip(self))]
    pub async fn get_guess(&self, guess_id: &str) -> Result<Guess, SessionError> {
        let Some(game_id) = self.current_id() else {
            return Err(self.fail(SessionError::invalid_state("no current game")));
        };
        let guess = self
            .transport
            .fetch_guess(&game_id, guess_id)
            .await
            .map_err(|failure| self.fail(classify(Operation::FetchGuess, failure)))?;
        debug!(%game_id, guess_id, exact = *guess.exact_matches(), "Fetched guess");
        Ok(guess)
    }

    fn cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_id(&self) -> Option<String> {
        self.cache().game.as_ref().and_then(|g| g.id().clone())
    }

    fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut self.cache().state, state);
        if previous != state {
            debug!(from = %previous, to = %state, "State transition");
            self.state_tx.send_replace(state);
        }
    }

    /// Publishes `error` on the error channel and hands it back.
    fn fail(&self, error: SessionError) -> SessionError {
        let (file, line) = error.location();
        warn!(
            kind = %error.kind(),
            message = error.message(),
            status = ?error.status(),
            file,
            line,
            "Operation failed"
        );
        self.hub.error().publish(Arc::new(error.clone()));
        error
    }

    /// Returns the cached game if `text` may be submitted to it now.
    fn submittable(&self, expected_id: Option<&str>, text: &str) -> Result<Arc<Game>, SessionError> {
        let (state, game) = {
            let cache = self.cache();
            (cache.state, cache.game.clone())
        };
        if let Some(expected) = expected_id
            && !game.as_ref().is_some_and(|g| g.has_id(expected))
        {
            return Err(SessionError::not_found(format!(
                "game {} was replaced or deleted before the guess was sent",
                expected
            )));
        }
        let Some(game) = game else {
            return Err(SessionError::invalid_state(format!(
                "no game to guess against while {}",
                state
            )));
        };
        if state != SessionState::Completed && !state.accepts_guesses() {
            return Err(SessionError::invalid_state(format!(
                "cannot guess while {}",
                state
            )));
        }
        validation::validate_guess(&game, text)?;
        Ok(game)
    }

    /// Current game, if it is still `game_id` and a guess is in flight.
    fn in_flight_game(&self, game_id: &str) -> Option<Arc<Game>> {
        let cache = self.cache();
        match &cache.game {
            Some(game) if game.has_id(game_id) && cache.state == SessionState::Submitting => {
                Some(Arc::clone(game))
            }
            _ => None,
        }
    }

    /// Returns to `Active` after a guess, unless the session moved on.
    fn finish_submission(&self, game_id: &str) {
        if self.in_flight_game(game_id).is_some() {
            self.set_state(SessionState::Active);
        }
    }

    async fn apply_guess(&self, game_id: &str, guess: Guess) -> Result<Guess, SessionError> {
        let Some(current) = self.in_flight_game(game_id) else {
            warn!(%game_id, "Session ended while guess was in flight; result not applied");
            return Ok(guess);
        };

        if let Err(reason) = guess.check_against(&current) {
            self.finish_submission(game_id);
            return Err(self.fail(SessionError::server_fault(format!(
                "guess response is inconsistent: {}",
                reason
            ))));
        }

        let snapshot = Arc::new(guess.clone());
        if !*guess.solution() {
            let updated = Arc::new(current.with_guess(guess.clone()));
            {
                let mut cache = self.cache();
                cache.game = Some(Arc::clone(&updated));
            }
            self.set_state(SessionState::Active);
            self.hub.guess().publish(snapshot);
            self.hub.game().publish(updated);
            info!(
                exact = *guess.exact_matches(),
                near = *guess.near_matches(),
                "Guess applied"
            );
            return Ok(guess);
        }

        self.hub.guess().publish(snapshot);
        info!(%game_id, "Guess solved the game; fetching revealed secret");

        // The guess payload never carries the secret; the canonical game does.
        let canonical = match self.transport.fetch_game(game_id).await {
            Ok(game) => game,
            Err(failure) => {
                self.finish_submission(game_id);
                return Err(self.fail(classify(Operation::FetchGame, failure)));
            }
        };
        if let Err(reason) = Self::check_fetched(game_id, &canonical) {
            self.finish_submission(game_id);
            return Err(self.fail(SessionError::server_fault(reason)));
        }
        if !*canonical.solved() {
            self.finish_submission(game_id);
            return Err(self.fail(SessionError::server_fault(
                "server reported a solution but the game is not solved",
            )));
        }
        if self.in_flight_game(game_id).is_none() {
            warn!(%game_id, "Session ended during follow-up fetch; result not applied");
            return Ok(guess);
        }

        self.adopt(Arc::new(canonical));
        Ok(guess)
    }

    /// Replaces the cache with the server's view after a 409 on a guess.
    async fn reconcile(&self, game_id: &str) {
        match self.transport.fetch_game(game_id).await {
            Ok(canonical) => {
                if let Err(reason) = Self::check_fetched(game_id, &canonical) {
                    warn!(%reason, "Canonical game is inconsistent; keeping cache");
                    self.finish_submission(game_id);
                } else if self.in_flight_game(game_id).is_some() {
                    self.adopt(Arc::new(canonical));
                }
            }
            Err(failure) => {
                warn!(%failure, "Reconciliation fetch failed; keeping cache");
                self.finish_submission(game_id);
            }
        }
    }

    /// Makes `game` the cached game and notifies every channel.
    fn adopt(&self, game: Arc<Game>) {
        let state = if *game.solved() {
            SessionState::Completed
        } else {
            SessionState::Active
        };
        {
            let mut cache = self.cache();
            cache.game = Some(Arc::clone(&game));
        }
        self.set_state(state);

        if let Some(last) = game.last_guess() {
            self.hub.guess().publish_if_changed(Arc::new(last.clone()));
        }
        self.hub.game().publish(Arc::clone(&game));
        if self.hub.solved().publish_if_changed(Arc::new(*game.solved())) && *game.solved() {
            info!(game_id = ?game.id(), text = ?game.text(), "Game solved");
        }
    }

    fn check_created(request: &Game, created: &Game) -> Result<(), String> {
        if created.id().is_none() {
            return Err("created game has no id".to_string());
        }
        if created.pool() != request.pool() || created.length() != request.length() {
            return Err(format!(
                "created game ({}, {}) does not match request ({}, {})",
                created.pool(),
                created.length(),
                request.pool(),
                request.length()
            ));
        }
        created.check_invariants()
    }

    fn check_fetched(game_id: &str, fetched: &Game) -> Result<(), String> {
        if !fetched.has_id(game_id) {
            return Err(format!(
                "requested game {} but received {:?}",
                game_id,
                fetched.id()
            ));
        }
        fetched.check_invariants()
    }
}
