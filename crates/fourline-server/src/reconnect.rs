//! Reconnection supervision.
//!
//! When a player drops out of an active human-vs-human game they get a
//! grace period to return; the forfeit timer and a returning connection
//! race for the pending entry, and whichever removes it from the map first
//! wins. The sweep task is defensive cleanup only.

use crate::protocol::ServerMessage;
use crate::registry::BOT_NAME;
use crate::session::{self, ServerState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// A player whose connection dropped mid-game, awaiting return or forfeit.
pub struct PendingDisconnect {
    pub game_id: Uuid,
    pub disconnected_at: Instant,
    pub timer: JoinHandle<()>,
}

/// Mark `username` as disconnected if they are in an active non-bot game:
/// arm the forfeit timer and warn the opponent.
pub fn handle_disconnect(state: &Arc<ServerState>, username: &str) {
    let Some(game_id) = state.registry.game_by_player(username) else {
        return;
    };
    let opponent = {
        let Some(session) = state.registry.games.get(&game_id) else {
            return;
        };
        // Bot games carry no human on the other side; finished games have
        // nothing left to forfeit.
        if !session.game.is_active() || session.is_bot_game {
            return;
        }
        session.opponent_of(username).map(str::to_string)
    };

    let timer = tokio::spawn({
        let state = Arc::clone(state);
        let username = username.to_string();
        async move {
            tokio::time::sleep(state.config.reconnection_timeout).await;
            forfeit_expired(&state, &username);
        }
    });

    // A repeated drop for the same identity supersedes the earlier entry.
    if let Some(previous) = state.pending_disconnects.insert(
        username.to_string(),
        PendingDisconnect {
            game_id,
            disconnected_at: Instant::now(),
            timer,
        },
    ) {
        previous.timer.abort();
    }

    info!(username, %game_id, "player disconnected, forfeit timer armed");

    if let Some(opponent) = opponent {
        let grace = state.config.reconnection_timeout;
        state.registry.send_to(
            &opponent,
            ServerMessage::OpponentDisconnected {
                message: format!(
                    "Opponent disconnected. They have {} seconds to reconnect.",
                    grace.as_secs()
                ),
                timeout: grace.as_millis() as u64,
            },
        );
    }
}

/// Resolve a return for `username`. Returns whether a pending forfeit was
/// cancelled; callers fall back to plain rebinding when it was not.
pub fn handle_reconnect(state: &Arc<ServerState>, username: &str) -> bool {
    // Removing the entry is the atomic claim against the timer; abort
    // before touching any state the timer body would have consumed.
    let Some((_, pending)) = state.pending_disconnects.remove(username) else {
        return false;
    };
    pending.timer.abort();

    let opponent = {
        let Some(session) = state.registry.games.get(&pending.game_id) else {
            return false;
        };
        if !session.game.is_active() {
            return false;
        }
        session.opponent_of(username).map(str::to_string)
    };

    info!(username, game_id = %pending.game_id, "player reconnected within grace period");

    if let Some(opponent) = opponent.filter(|name| name != BOT_NAME) {
        state.registry.send_to(
            &opponent,
            ServerMessage::OpponentReconnected {
                message: "Opponent has reconnected.".to_string(),
            },
        );
    }
    true
}

/// Forfeit timer body.
fn forfeit_expired(state: &Arc<ServerState>, username: &str) {
    // If a reconnect claimed the entry first, there is nothing to do.
    let Some((_, pending)) = state.pending_disconnects.remove(username) else {
        return;
    };

    let forfeited = {
        let Some(mut session) = state.registry.games.get_mut(&pending.game_id) else {
            return;
        };
        if !session.game.is_active() {
            return;
        }
        match session.player_number(username) {
            Some(player) => {
                session.game.forfeit(player);
                true
            }
            None => false,
        }
    };

    if forfeited {
        info!(username, game_id = %pending.game_id, "grace period expired, game forfeited");
        session::finish_game(state, pending.game_id, &[], Some("opponent_forfeited"));
    }
}

/// Periodic reclamation of pending entries whose timer failed to fire.
pub fn spawn_sweeper(state: Arc<ServerState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.sweep_interval);
        ticker.tick().await; // the first tick completes immediately
        loop {
            ticker.tick().await;
            let deadline = state.config.reconnection_timeout + Duration::from_secs(1);
            let stale: Vec<String> = state
                .pending_disconnects
                .iter()
                .filter(|entry| entry.disconnected_at.elapsed() > deadline)
                .map(|entry| entry.key().clone())
                .collect();
            for username in stale {
                if let Some((_, pending)) = state.pending_disconnects.remove(&username) {
                    pending.timer.abort();
                    warn!(username, game_id = %pending.game_id, "reclaimed stale disconnect entry");
                }
            }
        }
    })
}
