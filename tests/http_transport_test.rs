//! `HttpTransport` against an in-process axum server.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use codebreaker::{
    ClientConfig, ErrorKind, Game, HttpTransport, Operation, SessionService, SessionState,
    Transport, TransportFailure, classify,
};
use serde_json::{Value, json};

const CREATED: &str = "2026-02-10T12:00:00.000+00:00";

struct StoredGame {
    pool: String,
    length: usize,
    secret: String,
    guesses: Vec<Value>,
}

impl StoredGame {
    fn solved(&self) -> bool {
        self.guesses.iter().any(|g| g["solution"] == json!(true))
    }

    fn view(&self, id: &str) -> Value {
        json!({
            "id": id,
            "created": CREATED,
            "pool": self.pool,
            "length": self.length,
            "solved": self.solved(),
            "text": if self.solved() { Some(&self.secret) } else { None },
            "guesses": self.guesses,
        })
    }
}

#[derive(Clone, Default)]
struct AppState {
    games: Arc<Mutex<HashMap<String, StoredGame>>>,
    next_id: Arc<AtomicU64>,
}

fn error_response(status: StatusCode, message: &str, path: String) -> Response {
    let body = json!({
        "timestamp": CREATED,
        "status": status.as_u16(),
        "error": status.canonical_reason(),
        "message": message,
        "path": path,
    });
    (status, Json(body)).into_response()
}

async fn create_game(State(app): State<AppState>, Json(request): Json<Value>) -> Response {
    let pool = request["pool"].as_str().unwrap_or_default().to_string();
    let length = request["length"].as_u64().unwrap_or_default() as usize;
    if pool.is_empty() || length == 0 || length > pool.chars().count() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid pool or length", "/games".into());
    }
    let id = format!("g{}", app.next_id.fetch_add(1, Ordering::SeqCst) + 1);
    // Secret is the first `length` pool characters, reversed.
    let secret: String = pool.chars().take(length).collect::<Vec<_>>().into_iter().rev().collect();
    let stored = StoredGame {
        pool,
        length,
        secret,
        guesses: Vec::new(),
    };
    let view = stored.view(&id);
    app.games.lock().unwrap().insert(id, stored);
    (StatusCode::CREATED, Json(view)).into_response()
}

async fn fetch_game(State(app): State<AppState>, Path(id): Path<String>) -> Response {
    match id.as_str() {
        "garbled" => return (StatusCode::OK, Json(json!({ "unexpected": true }))).into_response(),
        "boom" => return (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response(),
        _ => {}
    }
    match app.games.lock().unwrap().get(&id) {
        Some(game) => Json(game.view(&id)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Game not found", format!("/games/{}", id)),
    }
}

async fn delete_game(State(app): State<AppState>, Path(id): Path<String>) -> Response {
    match app.games.lock().unwrap().remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Game not found", format!("/games/{}", id)),
    }
}

async fn submit_guess(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<Value>,
) -> Response {
    let path = format!("/games/{}/guesses", id);
    let text = request["text"].as_str().unwrap_or_default().to_string();
    let mut games = app.games.lock().unwrap();
    let Some(game) = games.get_mut(&id) else {
        return error_response(StatusCode::NOT_FOUND, "Game not found", path);
    };
    if game.solved() {
        return error_response(StatusCode::CONFLICT, "Game already solved", path);
    }
    if text.chars().count() != game.length || !text.chars().all(|c| game.pool.contains(c)) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid guess", path);
    }
    let (exact, near) = common::score(&game.secret, &text);
    let guess = json!({
        "id": format!("{}-q{}", id, game.guesses.len()),
        "created": CREATED,
        "text": text,
        "exactMatches": exact,
        "nearMatches": near,
        "solution": exact == game.length,
    });
    game.guesses.push(guess.clone());
    (StatusCode::CREATED, Json(guess)).into_response()
}

async fn fetch_guess(
    State(app): State<AppState>,
    Path((id, guess_id)): Path<(String, String)>,
) -> Response {
    let games = app.games.lock().unwrap();
    let found = games
        .get(&id)
        .and_then(|g| g.guesses.iter().find(|q| q["id"] == json!(guess_id)))
        .cloned();
    match found {
        Some(guess) => Json(guess).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            "Guess not found",
            format!("/games/{}/guesses/{}", id, guess_id),
        ),
    }
}

/// Starts the service on an ephemeral port and returns its base URL.
async fn spawn_server() -> (String, AppState) {
    let state = AppState::default();
    let api = Router::new()
        .route("/games", post(create_game))
        .route("/games/{id}", get(fetch_game).delete(delete_game))
        .route("/games/{id}/guesses", post(submit_guess))
        .route("/games/{id}/guesses/{guess_id}", get(fetch_guess))
        .with_state(state.clone());
    let app = Router::new().nest("/codebreaker-solitaire", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/codebreaker-solitaire/", addr), state)
}

fn transport(base_url: &str) -> HttpTransport {
    HttpTransport::new(&ClientConfig::with_base_url(base_url)).unwrap()
}

fn new_game(pool: &str, length: usize) -> Game {
    Game::builder().pool(pool).length(length).build().unwrap()
}

#[tokio::test]
async fn creates_and_fetches_games() {
    common::init_tracing();
    let (url, _state) = spawn_server().await;
    let transport = transport(&url);

    let created = transport.create_game(&new_game("ABCDE", 2)).await.unwrap();
    let id = created.id().clone().unwrap();
    assert_eq!(created.pool(), "ABCDE");
    assert!(created.created().is_some());

    let fetched = transport.fetch_game(&id).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn guesses_are_scored_and_fetchable() {
    common::init_tracing();
    let (url, _state) = spawn_server().await;
    let transport = transport(&url);
    let game = transport.create_game(&new_game("ABCDE", 2)).await.unwrap();
    let id = game.id().clone().unwrap();

    let guess = transport.submit_guess(&id, "AB").await.unwrap();
    assert_eq!((*guess.exact_matches(), *guess.near_matches()), (0, 2));
    assert!(guess.check_against(&game).is_ok());

    let fetched = transport
        .fetch_guess(&id, guess.id().as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(fetched, guess);
}

#[tokio::test]
async fn error_statuses_classify_by_operation() {
    common::init_tracing();
    let (url, _state) = spawn_server().await;
    let transport = transport(&url);
    let game = transport.create_game(&new_game("ABCDE", 2)).await.unwrap();
    let id = game.id().clone().unwrap();

    // Bypasses the builder so the server gets to reject it.
    let zero: Game = serde_json::from_value(json!({ "pool": "ABCDE", "length": 0 })).unwrap();
    let failure = transport.create_game(&zero).await.unwrap_err();
    let err = classify(Operation::CreateGame, failure);
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    assert_eq!(err.message(), "Invalid pool or length");
    assert_eq!(err.body().and_then(|b| b.path().clone()).as_deref(), Some("/games"));

    let failure = transport.submit_guess(&id, "ZZ").await.unwrap_err();
    assert_eq!(classify(Operation::SubmitGuess, failure).kind(), ErrorKind::InvalidGuess);

    let failure = transport.fetch_game("missing").await.unwrap_err();
    assert_eq!(classify(Operation::FetchGame, failure).kind(), ErrorKind::NotFound);

    let failure = transport.delete_game("missing").await.unwrap_err();
    assert_eq!(classify(Operation::DeleteGame, failure).kind(), ErrorKind::NotFound);

    transport.submit_guess(&id, "BA").await.unwrap();
    let failure = transport.submit_guess(&id, "AB").await.unwrap_err();
    let err = classify(Operation::SubmitGuess, failure);
    assert_eq!(err.kind(), ErrorKind::AlreadySolved);
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn unparseable_bodies_are_server_faults() {
    common::init_tracing();
    let (url, _state) = spawn_server().await;
    let transport = transport(&url);

    let failure = transport.fetch_game("boom").await.unwrap_err();
    assert_eq!(
        failure,
        TransportFailure::Status {
            status: 503,
            body: None
        }
    );
    let err = classify(Operation::FetchGame, failure);
    assert_eq!(err.kind(), ErrorKind::ServerFault);
    assert_eq!(err.status(), Some(503));

    let failure = transport.fetch_game("garbled").await.unwrap_err();
    assert!(matches!(failure, TransportFailure::Malformed { .. }));
    let err = classify(Operation::FetchGame, failure);
    assert_eq!(err.kind(), ErrorKind::ServerFault);
    assert!(err.status().is_none());
}

#[tokio::test]
async fn closed_port_is_network_failure() {
    common::init_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = transport(&format!("http://{}", addr));
    let failure = transport.fetch_game("g1").await.unwrap_err();
    assert!(matches!(failure, TransportFailure::NoResponse { .. }));
    assert_eq!(
        classify(Operation::FetchGame, failure).kind(),
        ErrorKind::NetworkFailure
    );
}

#[tokio::test]
async fn session_plays_end_to_end_over_http() {
    common::init_tracing();
    let (url, state) = spawn_server().await;
    let service = SessionService::with_transport(Arc::new(transport(&url)));

    let game = service.start_session("ABCDE", 2).await.unwrap();
    let id = game.id().clone().unwrap();

    let miss = service.submit_guess("AB").await.unwrap();
    assert_eq!(*miss.near_matches(), 2);
    let hit = service.submit_guess("BA").await.unwrap();
    assert!(*hit.solution());

    assert_eq!(service.state(), SessionState::Completed);
    assert_eq!(service.game().unwrap().text().as_deref(), Some("BA"));

    let err = service.submit_guess("CD").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadySolved);

    service.delete_session().await.unwrap();
    assert_eq!(service.state(), SessionState::Terminated);
    assert!(!state.games.lock().unwrap().contains_key(&id));
}

#[tokio::test]
async fn reserved_characters_in_ids_stay_in_one_segment() {
    common::init_tracing();
    let (url, state) = spawn_server().await;
    let transport = transport(&url);
    let game = transport.create_game(&new_game("ABCDE", 2)).await.unwrap();
    let id = game.id().clone().unwrap();

    for odd in [format!("{}?x=1", id), format!("{}#frag", id), format!("{}/guesses", id)] {
        let err = classify(Operation::FetchGame, transport.fetch_game(&odd).await.unwrap_err());
        assert_eq!(err.kind(), ErrorKind::NotFound, "id {:?}", odd);
        assert_eq!(
            err.body().and_then(|b| b.path().clone()),
            Some(format!("/games/{}", odd))
        );
    }

    let suffixed = format!("{}?force=true", id);
    let err = classify(
        Operation::DeleteGame,
        transport.delete_game(&suffixed).await.unwrap_err(),
    );
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(state.games.lock().unwrap().contains_key(&id));
}
