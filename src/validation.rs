//! Client-side checks run before any request leaves the process.
//!
//! Everything here is synchronous and side-effect free apart from logging.

use std::collections::HashSet;

use tracing::{instrument, warn};
use unicode_general_category::{GeneralCategory, get_general_category};

use crate::error::SessionError;
use crate::model::Game;

/// Shortest permitted code.
pub const MIN_CODE_LENGTH: usize = 1;
/// Longest permitted code.
pub const MAX_CODE_LENGTH: usize = 20;
/// Smallest permitted pool, in code points.
pub const MIN_POOL_SIZE: usize = 1;
/// Largest permitted pool, in code points.
pub const MAX_POOL_SIZE: usize = 255;

/// Validates the parameters of a game creation request.
///
/// # Errors
///
/// Returns `InvalidParameters` when `length` is outside
/// [`MIN_CODE_LENGTH`]..=[`MAX_CODE_LENGTH`], or the pool is empty, longer
/// than [`MAX_POOL_SIZE`] code points, or contains whitespace, control
/// characters or unassigned code points.
#[instrument]
pub fn validate_new_game(pool: &str, length: usize) -> Result<(), SessionError> {
    if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length) {
        warn!(length, "Code length out of range");
        return Err(SessionError::invalid_parameters(format!(
            "code length {} is outside {}..={}",
            length, MIN_CODE_LENGTH, MAX_CODE_LENGTH
        )));
    }

    let pool_size = pool.chars().count();
    if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&pool_size) {
        warn!(pool_size, "Pool size out of range");
        return Err(SessionError::invalid_parameters(format!(
            "pool size {} is outside {}..={}",
            pool_size, MIN_POOL_SIZE, MAX_POOL_SIZE
        )));
    }

    if let Some(bad) = pool.chars().find(|&c| !is_pool_character(c)) {
        warn!(code_point = bad as u32, "Pool contains disallowed character");
        return Err(SessionError::invalid_parameters(format!(
            "pool contains disallowed character U+{:04X}",
            bad as u32
        )));
    }

    Ok(())
}

/// Whitespace, control characters and unassigned code points are excluded.
fn is_pool_character(c: char) -> bool {
    !(c.is_whitespace()
        || c.is_control()
        || get_general_category(c) == GeneralCategory::Unassigned)
}

/// Validates a guess against the game it will be submitted to.
///
/// # Errors
///
/// Returns `AlreadySolved` when the game is solved, otherwise
/// `InvalidGuess` when the text has the wrong length or uses a code point
/// outside the pool.
#[instrument(skip(game), fields(game_id = ?game.id()))]
pub fn validate_guess(game: &Game, text: &str) -> Result<(), SessionError> {
    if *game.solved() {
        warn!("Guess against a solved game");
        return Err(SessionError::already_solved(format!(
            "game {} is already solved",
            game.id().as_deref().unwrap_or("<unsaved>")
        )));
    }
    validate_guess_text(game, text)
}

/// Checks only the shape of `text` against the game's pool and length.
#[instrument(skip(game))]
pub(crate) fn validate_guess_text(game: &Game, text: &str) -> Result<(), SessionError> {
    let length = text.chars().count();
    if length != *game.length() {
        warn!(length, expected = *game.length(), "Guess has wrong length");
        return Err(SessionError::invalid_guess(format!(
            "guess '{}' has length {}, expected {}",
            text,
            length,
            game.length()
        )));
    }

    let pool: HashSet<char> = game.pool().chars().collect();
    if let Some(bad) = text.chars().find(|c| !pool.contains(c)) {
        warn!(character = %bad, "Guess uses character outside pool");
        return Err(SessionError::invalid_guess(format!(
            "'{}' is not in pool '{}'",
            bad,
            game.pool()
        )));
    }

    Ok(())
}

/// Validates a previously issued game id before it is used in a request path.
///
/// # Errors
///
/// Returns `InvalidParameters` when the id is empty or only whitespace.
#[instrument]
pub fn validate_game_id(id: &str) -> Result<(), SessionError> {
    if id.trim().is_empty() {
        warn!("Blank game id");
        return Err(SessionError::invalid_parameters("game id is blank"));
    }
    Ok(())
}
