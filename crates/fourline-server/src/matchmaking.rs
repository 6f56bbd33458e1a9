//! Matchmaking coordinator.
//!
//! Pairs a joiner with the waiting player, or queues them and arms a
//! promotion timer that synthesizes a bot opponent when nobody shows up.
//! Timers are identity-scoped: they survive connection churn and are
//! cancelled before any other path consumes the waiting slot.

use crate::events::{kind, TelemetryEvent};
use crate::protocol::ServerMessage;
use crate::registry::{GameSession, SlotClaim, BOT_NAME};
use crate::session::ServerState;
use fourline_core::Player;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Enter `username` into matchmaking. Called after the connection is bound
/// in the registry, so notifications route to the fresh connection.
pub fn enqueue(state: &Arc<ServerState>, username: &str) {
    match state.registry.claim_or_wait(username) {
        SlotClaim::PairedWith(waiting) => {
            // Cancel before the slot's old occupant is consumed, and drop
            // any stale timer the joiner carries from an earlier stint.
            cancel_timer(state, &waiting.username);
            cancel_timer(state, username);
            let game_id = start_game(state, &waiting.username, username, false);
            info!(
                player1 = waiting.username,
                player2 = username,
                %game_id,
                "matched players"
            );
        }
        SlotClaim::AlreadyWaiting => {
            // Duplicate join while queued (e.g. a reconnect attempt): the
            // caller already refreshed the connection binding and the
            // original timer keeps running. Re-issue the waiting notice.
            send_waiting_notice(state, username);
        }
        SlotClaim::Queued => {
            cancel_timer(state, username);
            let handle = tokio::spawn({
                let state = Arc::clone(state);
                let username = username.to_string();
                async move {
                    tokio::time::sleep(state.config.matchmaking_timeout).await;
                    promote_to_bot_game(&state, &username);
                }
            });
            state.match_timers.insert(username.to_string(), handle);
            send_waiting_notice(state, username);
        }
    }
}

/// Remove `username` from the queue before pairing: clear the slot if they
/// hold it and cancel their promotion timer.
pub fn dequeue(state: &Arc<ServerState>, username: &str) {
    cancel_timer(state, username);
    if state.registry.take_waiting_if(username).is_some() {
        info!(username, "left matchmaking queue");
    }
}

/// Promotion timer body: pair the still-waiting player with the bot.
fn promote_to_bot_game(state: &Arc<ServerState>, username: &str) {
    // The timer has fired; its handle is spent either way this resolves.
    state.match_timers.remove(username);

    // A human may have claimed the slot between the timer firing and this
    // call; taking the slot under its lock decides who wins that race.
    let Some(waiting) = state.registry.take_waiting_if(username) else {
        return;
    };

    let game_id = start_game(state, username, BOT_NAME, true);
    info!(
        username,
        %game_id,
        waited_ms = waiting.queued_at.elapsed().as_millis() as u64,
        "promoted waiting player to bot game"
    );
}

/// Create and register a game, notify the human participants, and emit the
/// game-started event.
fn start_game(state: &Arc<ServerState>, player1: &str, player2: &str, is_bot_game: bool) -> Uuid {
    let session = GameSession::new(player1.to_string(), player2.to_string(), is_bot_game);
    let game_id = state.registry.register_game(session);

    if let Some(session) = state.registry.games.get(&game_id) {
        let view = session.state_view();
        for seat in [Player::One, Player::Two] {
            let name = session.player_name(seat);
            if name == BOT_NAME {
                continue;
            }
            let opponent = session.player_name(seat.other()).to_string();
            state.registry.send_to(
                name,
                ServerMessage::GameStarted {
                    game_id,
                    player: seat.number(),
                    opponent,
                    is_bot_game,
                    game_state: view.clone(),
                },
            );
        }
    }

    state.events.publish(TelemetryEvent::new(
        kind::GAME_STARTED,
        json!({
            "gameId": game_id,
            "player1": player1,
            "player2": player2,
            "isBotGame": is_bot_game,
        }),
    ));

    game_id
}

fn send_waiting_notice(state: &Arc<ServerState>, username: &str) {
    state.registry.send_to(
        username,
        ServerMessage::WaitingForOpponent {
            message: "Waiting for an opponent...".to_string(),
            timeout: state.config.matchmaking_timeout.as_millis() as u64,
        },
    );
}

fn cancel_timer(state: &Arc<ServerState>, username: &str) {
    if let Some((_, timer)) = state.match_timers.remove(username) {
        timer.abort();
    }
}
