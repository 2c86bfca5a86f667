//! The puzzle session entity.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::Guess;
use crate::error::SessionError;
use crate::validation;

/// One codebreaker game as known to the client.
///
/// A game without an `id` is a creation request that has not been accepted
/// yet. Once the server answers, `id` and `created` are set and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Server-assigned opaque id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    /// Server-assigned creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created: Option<DateTime<Utc>>,
    /// Code points the secret and every guess are drawn from.
    pool: String,
    /// Number of code points in the secret.
    length: usize,
    /// Whether any guess has matched the secret.
    #[serde(default)]
    solved: bool,
    /// The secret, revealed only once solved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    /// Guesses in submission order.
    #[serde(default)]
    guesses: Vec<Guess>,
}

impl Game {
    /// Returns a builder with every field unset.
    pub fn builder() -> GameBuilder {
        GameBuilder::default()
    }

    /// Most recent guess, if any.
    pub fn last_guess(&self) -> Option<&Guess> {
        self.guesses.last()
    }

    /// True when `id` matches this game's server id.
    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }

    /// Returns a copy of this game with `guess` appended.
    pub(crate) fn with_guess(&self, guess: Guess) -> Self {
        let mut next = self.clone();
        next.guesses.push(guess);
        next
    }

    /// Checks the entity invariants.
    ///
    /// `solved` must hold exactly when some guess is a solution, `text` must be
    /// present exactly when solved, and every guess must fit the game's shape.
    #[instrument(skip_all, fields(id = ?self.id, guesses = self.guesses.len()))]
    pub fn check_invariants(&self) -> Result<(), String> {
        let has_solution = self.guesses.iter().any(|g| *g.solution());
        if self.solved != has_solution {
            return Err(format!(
                "solved is {} but solution guess present is {}",
                self.solved, has_solution
            ));
        }
        match (&self.text, self.solved) {
            (None, true) => return Err("solved game has no text".to_string()),
            (Some(_), false) => return Err("unsolved game reveals its text".to_string()),
            (Some(text), true) => validation::validate_guess_text(self, text)
                .map_err(|e| format!("secret does not fit game: {}", e.message()))?,
            (None, false) => {}
        }
        for guess in &self.guesses {
            guess.check_against(self)?;
        }
        debug!("Game invariants hold");
        Ok(())
    }
}

impl std::fmt::Display for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Game {} [pool {}, length {}, {} guesses{}]",
            self.id.as_deref().unwrap_or("<unsaved>"),
            self.pool,
            self.length,
            self.guesses.len(),
            if self.solved { ", solved" } else { "" }
        )
    }
}

/// Builder for [`Game`]; `build` re-runs the creation validator.
#[derive(Debug, Clone, Default, Setters)]
pub struct GameBuilder {
    /// Server-assigned id.
    #[setters(strip_option, into)]
    id: Option<String>,
    /// Server-assigned creation time.
    #[setters(strip_option)]
    created: Option<DateTime<Utc>>,
    /// Permissible code points.
    #[setters(into)]
    pool: String,
    /// Code length.
    length: usize,
    /// Whether the game is solved.
    solved: bool,
    /// Revealed secret.
    #[setters(strip_option, into)]
    text: Option<String>,
    /// Guesses in submission order.
    guesses: Vec<Guess>,
}

impl GameBuilder {
    /// Validates the parameters and invariants and returns the game.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidParameters` error when the pool or length is out of
    /// range or the fields contradict each other.
    #[instrument(skip_all, fields(pool = %self.pool, length = self.length))]
    pub fn build(self) -> Result<Game, SessionError> {
        validation::validate_new_game(&self.pool, self.length)?;
        let game = Game {
            id: self.id,
            created: self.created,
            pool: self.pool,
            length: self.length,
            solved: self.solved,
            text: self.text,
            guesses: self.guesses,
        };
        game.check_invariants()
            .map_err(SessionError::invalid_parameters)?;
        Ok(game)
    }
}
