//! Line-oriented front end: prints hub notifications and forwards input.

use std::sync::Arc;

use anyhow::Result;
use codebreaker::{ErrorKind, SessionService, SessionState, Subscription};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument};

const QUIT: &str = ":quit";
const DELETE: &str = ":delete";

/// Observer registrations held for the lifetime of the console.
struct Observers {
    guess: Subscription,
    solved: Subscription,
    error: Subscription,
}

impl Observers {
    fn attach(service: &SessionService) -> Self {
        let hub = service.hub();
        let guess = hub.guess().subscribe(|guess| {
            println!(
                "  {}  exact {}  near {}",
                guess.text(),
                guess.exact_matches(),
                guess.near_matches()
            );
        });
        let solved = hub.solved().subscribe(|solved| {
            if *solved {
                println!("Solved!");
            }
        });
        let error = hub.error().subscribe(|error| {
            let hint = if error.kind().is_transient() {
                "; try again"
            } else {
                ""
            };
            eprintln!("! {} ({}{})", error.message(), error.kind(), hint);
        });
        Self {
            guess,
            solved,
            error,
        }
    }

    fn detach(self, service: &SessionService) {
        let hub = service.hub();
        hub.guess().unsubscribe(self.guess);
        hub.solved().unsubscribe(self.solved);
        hub.error().unsubscribe(self.error);
    }
}

/// Reads guesses from stdin until the game is solved, deleted, or input ends.
#[instrument(skip(service))]
pub async fn play(service: Arc<SessionService>) -> Result<()> {
    let observers = Observers::attach(&service);

    if let Some(game) = service.game() {
        println!("{}", game);
    }
    println!("Enter guesses; {} to leave, {} to delete the game.", QUIT, DELETE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while service.state() != SessionState::Completed {
        let Some(line) = lines.next_line().await? else {
            debug!("Input closed");
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            QUIT => break,
            DELETE => {
                // Failures are already reported through the error channel.
                if service.delete_session().await.is_ok() {
                    println!("Game deleted.");
                }
                break;
            }
            text => {
                if let Err(e) = service.submit_guess(text).await
                    && e.kind() == ErrorKind::NotFound
                {
                    info!("Game no longer exists on the server");
                    break;
                }
            }
        }
    }

    if let Some(game) = service.game()
        && let Some(text) = game.text()
    {
        println!("Secret: {} ({} guesses)", text, game.guesses().len());
    }
    observers.detach(&service);
    Ok(())
}
