//! A single attempt at the secret code.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::Game;
use crate::error::SessionError;
use crate::validation;

/// One guess and the server's feedback on it.
///
/// Guesses are immutable once received; a [`Game`] only ever appends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Guess {
    /// Server-assigned opaque id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    /// Server-assigned creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created: Option<DateTime<Utc>>,
    /// The attempted sequence.
    text: String,
    /// Characters with the right value in the right position.
    #[serde(default)]
    exact_matches: usize,
    /// Characters with the right value in the wrong position.
    #[serde(default)]
    near_matches: usize,
    /// True iff every position matched.
    #[serde(default)]
    solution: bool,
}

impl Guess {
    /// Returns a builder with every field unset.
    pub fn builder() -> GuessBuilder {
        GuessBuilder::default()
    }

    /// Checks the server feedback against the owning game's shape.
    #[instrument(skip_all, fields(text = %self.text))]
    pub fn check_against(&self, game: &Game) -> Result<(), String> {
        let length = *game.length();
        if self.text.chars().count() != length {
            return Err(format!(
                "guess '{}' does not have length {}",
                self.text, length
            ));
        }
        if self.exact_matches > length || self.near_matches > length {
            return Err(format!(
                "match counts {}/{} exceed length {}",
                self.exact_matches, self.near_matches, length
            ));
        }
        if self.exact_matches + self.near_matches > length {
            return Err(format!(
                "match counts {}+{} exceed length {}",
                self.exact_matches, self.near_matches, length
            ));
        }
        if self.solution != (self.exact_matches == length) {
            return Err(format!(
                "solution flag {} disagrees with {} exact matches",
                self.solution, self.exact_matches
            ));
        }
        Ok(())
    }
}

/// Builder for [`Guess`]; `build` validates against the owning game.
#[derive(Debug, Clone, Default, Setters)]
pub struct GuessBuilder {
    /// Server-assigned id.
    #[setters(strip_option, into)]
    id: Option<String>,
    /// Server-assigned creation time.
    #[setters(strip_option)]
    created: Option<DateTime<Utc>>,
    /// The attempted sequence.
    #[setters(into)]
    text: String,
    /// Exact match count.
    exact_matches: usize,
    /// Near match count.
    near_matches: usize,
    /// Whether the guess solved the game.
    solution: bool,
}

impl GuessBuilder {
    /// Validates the text and feedback against `game` and returns the guess.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidGuess` error when the text is not drawn from the
    /// game's pool, has the wrong length, or the counts are inconsistent.
    #[instrument(skip_all, fields(text = %self.text))]
    pub fn build(self, game: &Game) -> Result<Guess, SessionError> {
        validation::validate_guess_text(game, &self.text)?;
        let guess = Guess {
            id: self.id,
            created: self.created,
            text: self.text,
            exact_matches: self.exact_matches,
            near_matches: self.near_matches,
            solution: self.solution,
        };
        guess
            .check_against(game)
            .map_err(SessionError::invalid_guess)?;
        Ok(guess)
    }
}
