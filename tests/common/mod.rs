//! In-memory codebreaker service shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use codebreaker::{
    ErrorBody, Game, Guess, ObserverHub, Operation, SessionService, Transport, TransportFailure,
};

/// Installs a test-friendly subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Exact and near match counts of `guess` against `secret`.
pub fn score(secret: &str, guess: &str) -> (usize, usize) {
    let exact = secret
        .chars()
        .zip(guess.chars())
        .filter(|(s, g)| s == g)
        .count();
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in secret.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let mut common = 0;
    for c in guess.chars() {
        if let Some(n) = counts.get_mut(&c)
            && *n > 0
        {
            *n -= 1;
            common += 1;
        }
    }
    (exact, common - exact)
}

#[derive(Debug)]
struct StoredGame {
    pool: String,
    length: usize,
    secret: String,
    created: chrono::DateTime<Utc>,
    guesses: Vec<Guess>,
}

impl StoredGame {
    fn solved(&self) -> bool {
        self.guesses.iter().any(|g| *g.solution())
    }

    fn view(&self, id: &str) -> Game {
        let mut builder = Game::builder()
            .id(id)
            .created(self.created)
            .pool(self.pool.as_str())
            .length(self.length)
            .solved(self.solved())
            .guesses(self.guesses.clone());
        if self.solved() {
            builder = builder.text(self.secret.as_str());
        }
        builder.build().expect("stored game is consistent")
    }

    fn shape(&self) -> Game {
        Game::builder()
            .pool(self.pool.as_str())
            .length(self.length)
            .build()
            .expect("stored game is consistent")
    }
}

#[derive(Debug, Default)]
struct FakeState {
    games: HashMap<String, StoredGame>,
    next_id: u64,
    secret: Option<String>,
    calls: Vec<String>,
    failures: Vec<(Operation, TransportFailure)>,
    misreport_create: bool,
}

/// Scripted stand-in for the remote service.
#[derive(Debug, Default)]
pub struct FakeServer {
    state: Mutex<FakeState>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeServer {
    /// A server whose next games use `secret`.
    pub fn with_secret(secret: &str) -> Arc<Self> {
        let server = Self::default();
        server.state.lock().unwrap().secret = Some(secret.to_string());
        Arc::new(server)
    }

    /// Like [`FakeServer::with_secret`], but every guess takes `delay`.
    pub fn slow(secret: &str, delay: Duration) -> Arc<Self> {
        let server = Self {
            delay,
            ..Self::default()
        };
        server.state.lock().unwrap().secret = Some(secret.to_string());
        Arc::new(server)
    }

    /// A session service wired to this server with a fresh hub.
    pub fn service(self: &Arc<Self>) -> SessionService {
        let transport: Arc<dyn Transport> = self.clone();
        SessionService::new(transport, Arc::new(ObserverHub::new()))
    }

    /// Makes the next call of `operation` fail with `failure`.
    pub fn fail_next(&self, operation: Operation, failure: TransportFailure) {
        self.state.lock().unwrap().failures.push((operation, failure));
    }

    /// Makes the next created game come back with the pool reversed.
    pub fn misreport_next_create(&self) {
        self.state.lock().unwrap().misreport_create = true;
    }

    /// Request log, e.g. `POST /games/g1/guesses AB`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Texts of submitted guesses in arrival order.
    pub fn submitted(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.rsplit_once("/guesses ").map(|(_, text)| text.to_string()))
            .collect()
    }

    /// Highest number of guesses ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// True when the server still holds `game_id`.
    pub fn has_game(&self, game_id: &str) -> bool {
        self.state.lock().unwrap().games.contains_key(game_id)
    }

    /// Solves a game without the client knowing.
    pub fn solve_behind_back(&self, game_id: &str) {
        let mut state = self.state.lock().unwrap();
        let game = state.games.get_mut(game_id).expect("game exists");
        let shape = game.shape();
        let winner = Guess::builder()
            .id(format!("{}-g{}", game_id, game.guesses.len()))
            .created(Utc::now())
            .text(game.secret.as_str())
            .exact_matches(game.length)
            .solution(true)
            .build(&shape)
            .expect("secret is a valid guess");
        game.guesses.push(winner);
    }

    /// Removes a game without the client knowing.
    pub fn forget(&self, game_id: &str) {
        self.state.lock().unwrap().games.remove(game_id);
    }

    fn begin(&self, operation: Operation, call: String) -> Result<(), TransportFailure> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(index) = state.failures.iter().position(|(op, _)| *op == operation) {
            return Err(state.failures.remove(index).1);
        }
        Ok(())
    }

    fn error(status: u16, message: &str) -> TransportFailure {
        TransportFailure::Status {
            status,
            body: Some(ErrorBody::new(status, Some(message.to_string()))),
        }
    }

    fn score_guess(&self, game_id: &str, text: &str) -> Result<Guess, TransportFailure> {
        let mut state = self.state.lock().unwrap();
        let Some(game) = state.games.get_mut(game_id) else {
            return Err(Self::error(404, "Game not found"));
        };
        if game.solved() {
            return Err(Self::error(409, "Game already solved"));
        }
        let (exact, near) = score(&game.secret, text);
        Guess::builder()
            .id(format!("{}-g{}", game_id, game.guesses.len()))
            .created(Utc::now())
            .text(text)
            .exact_matches(exact)
            .near_matches(near)
            .solution(exact == game.length)
            .build(&game.shape())
            .map(|guess| {
                game.guesses.push(guess.clone());
                guess
            })
            .map_err(|e| Self::error(400, e.message()))
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn create_game(&self, game: &Game) -> Result<Game, TransportFailure> {
        self.begin(Operation::CreateGame, "POST /games".to_string())?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("game-{}", state.next_id);
        let secret = state
            .secret
            .clone()
            .unwrap_or_else(|| game.pool().chars().take(1).collect::<String>().repeat(*game.length()));
        let pool = if std::mem::take(&mut state.misreport_create) {
            game.pool().chars().rev().collect()
        } else {
            game.pool().clone()
        };
        let stored = StoredGame {
            pool,
            length: *game.length(),
            secret,
            created: Utc::now(),
            guesses: Vec::new(),
        };
        let view = stored.view(&id);
        state.games.insert(id, stored);
        Ok(view)
    }

    async fn fetch_game(&self, game_id: &str) -> Result<Game, TransportFailure> {
        self.begin(Operation::FetchGame, format!("GET /games/{}", game_id))?;
        let state = self.state.lock().unwrap();
        state
            .games
            .get(game_id)
            .map(|g| g.view(game_id))
            .ok_or_else(|| Self::error(404, "Game not found"))
    }

    async fn delete_game(&self, game_id: &str) -> Result<(), TransportFailure> {
        self.begin(Operation::DeleteGame, format!("DELETE /games/{}", game_id))?;
        match self.state.lock().unwrap().games.remove(game_id) {
            Some(_) => Ok(()),
            None => Err(Self::error(404, "Game not found")),
        }
    }

    async fn submit_guess(&self, game_id: &str, text: &str) -> Result<Guess, TransportFailure> {
        self.begin(
            Operation::SubmitGuess,
            format!("POST /games/{}/guesses {}", game_id, text),
        )?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.score_guess(game_id, text);
        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn fetch_guess(&self, game_id: &str, guess_id: &str) -> Result<Guess, TransportFailure> {
        self.begin(
            Operation::FetchGuess,
            format!("GET /games/{}/guesses/{}", game_id, guess_id),
        )?;
        let state = self.state.lock().unwrap();
        state
            .games
            .get(game_id)
            .and_then(|g| g.guesses.iter().find(|guess| guess.id().as_deref() == Some(guess_id)))
            .cloned()
            .ok_or_else(|| Self::error(404, "Guess not found"))
    }
}
