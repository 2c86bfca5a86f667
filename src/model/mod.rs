//! Entity model: games and guesses.

mod game;
mod guess;

pub use game::{Game, GameBuilder};
pub use guess::{Guess, GuessBuilder};
