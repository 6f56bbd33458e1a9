//! WebSocket server and per-connection message dispatch.
//!
//! Every inbound message is handled to completion (state mutation plus
//! broadcast) before the next one for that connection; concurrent moves
//! against the same game serialize on the registry's per-game lock. The
//! handler is the sole entry point for moves: all game mutation flows
//! through the core engine from here or from the timers it arms.

use crate::config::ServerConfig;
use crate::events::{kind, EventSink, TelemetryEvent};
use crate::matchmaking;
use crate::protocol::{CellRef, ClientMessage, GameOverResult, ServerMessage};
use crate::reconnect::{self, PendingDisconnect};
use crate::registry::{ClientHandle, Registry, BOT_NAME};
use crate::store::{FinishedGame, GameStore, StandingsUpdate};
use dashmap::DashMap;
use fourline_core::{Bot, GameError, MoveOutcome, Outcome, Player, COLS};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    pub config: ServerConfig,
    pub registry: Registry,
    /// Matchmaking promotion timers, keyed by identity.
    pub match_timers: DashMap<String, JoinHandle<()>>,
    /// Players in their reconnection grace period, keyed by identity.
    pub pending_disconnects: DashMap<String, PendingDisconnect>,
    /// Persistence collaborator; best-effort, failures stay inside it.
    pub store: Arc<dyn GameStore>,
    /// Telemetry collaborator; publish-only.
    pub events: Arc<dyn EventSink>,
}

impl ServerState {
    pub fn new(config: ServerConfig, store: Arc<dyn GameStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            registry: Registry::new(),
            match_timers: DashMap::new(),
            pending_disconnects: DashMap::new(),
            store,
            events,
        }
    }
}

/// Errors surfaced to the originating connection as a one-line ERROR.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    /// Move against a game in the wrong state; no mutation, no broadcast.
    #[error(transparent)]
    Conflict(#[from] GameError),

    #[error("{0}")]
    NotFound(&'static str),
}

/// What the dispatcher knows about one live connection.
struct ConnContext {
    generation: Uuid,
    tx: mpsc::UnboundedSender<ServerMessage>,
    username: Option<String>,
}

impl ConnContext {
    fn send(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }

    fn send_error(&self, message: impl Into<String>) {
        self.send(ServerMessage::Error {
            message: message.into(),
        });
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Fourline server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut conn = ConnContext {
        generation: Uuid::new_v4(),
        tx,
        username: None,
    };

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(&state, &mut conn, client_msg),
                Err(_) => {
                    // Bad input never closes the connection.
                    let reply = classify_parse_failure(&text);
                    warn!("Rejected message from {}: {}", addr, reply);
                    conn.send_error(reply);
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", addr);
                break;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", addr, e);
                break;
            }
            _ => {}
        }
    }

    handle_teardown(&state, &conn);
    send_task.abort();

    info!("Connection closed for {}", addr);
    Ok(())
}

/// Pick the ERROR line for text that failed to parse as a client message:
/// a recognized kind with a bad payload, an unrecognized kind, or not JSON
/// at all.
fn classify_parse_failure(text: &str) -> &'static str {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            let known = value
                .get("type")
                .and_then(|t| t.as_str())
                .map_or(false, |t| ClientMessage::TYPES.contains(&t));
            if known {
                "Invalid message payload"
            } else {
                "Unknown message type"
            }
        }
        Err(_) => "Invalid message format",
    }
}

/// Handle a client message. Rejections reach only the originating
/// connection and never leave partial state behind.
fn handle_message(state: &Arc<ServerState>, conn: &mut ConnContext, msg: ClientMessage) {
    let result = match msg {
        ClientMessage::JoinGame { username } => handle_join(state, conn, username),
        ClientMessage::MakeMove { game_id, column } => handle_move(state, conn, game_id, column),
        ClientMessage::Reconnect { username, game_id } => {
            handle_reconnect_msg(state, conn, username, game_id)
        }
        ClientMessage::Ping {} => {
            conn.send(ServerMessage::Pong {
                timestamp: now_ms(),
            });
            Ok(())
        }
    };

    if let Err(e) = result {
        conn.send_error(e.to_string());
    }
}

fn handle_join(
    state: &Arc<ServerState>,
    conn: &mut ConnContext,
    username: String,
) -> Result<(), SessionError> {
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err(SessionError::Validation("Username is required".into()));
    }

    conn.username = Some(username.clone());
    state.registry.bind_connection(
        &username,
        ClientHandle {
            generation: conn.generation,
            tx: conn.tx.clone(),
        },
    );
    debug!(username, "identity bound to connection");

    // A pending forfeit takes precedence over plain resumption.
    if reconnect::handle_reconnect(state, &username) {
        if let Some(game_id) = state.registry.game_by_player(&username) {
            resume_game(state, conn, game_id);
        }
        return Ok(());
    }

    if let Some(game_id) = state.registry.game_by_player(&username) {
        let active = state
            .registry
            .games
            .get(&game_id)
            .map(|s| s.game.is_active())
            .unwrap_or(false);
        if active {
            resume_game(state, conn, game_id);
            return Ok(());
        }
        // A finished game still indexed under this name; release it before
        // the player queues for a fresh one.
        state.registry.remove_game(game_id);
    }

    matchmaking::enqueue(state, &username);
    Ok(())
}

/// Push the full current state of an existing game back to a rejoining
/// connection, and refresh the opponent's view of it.
fn resume_game(state: &Arc<ServerState>, conn: &ConnContext, game_id: Uuid) {
    let Some(view) = state
        .registry
        .games
        .get(&game_id)
        .map(|s| s.state_view())
    else {
        return;
    };
    broadcast_game_update(state, game_id);
    conn.send(ServerMessage::GameFound {
        game_id,
        message: "Reconnecting to existing game".to_string(),
        game_state: view,
    });
}

fn handle_move(
    state: &Arc<ServerState>,
    conn: &mut ConnContext,
    game_id: Option<Uuid>,
    column: i64,
) -> Result<(), SessionError> {
    let username = conn
        .username
        .clone()
        .ok_or_else(|| SessionError::Validation("Not authenticated".into()))?;

    if column < 0 || column >= COLS as i64 {
        return Err(SessionError::Validation(
            "Invalid column. Must be between 0 and 6".into(),
        ));
    }
    let column = column as usize;

    let game_id = game_id
        .or_else(|| state.registry.game_by_player(&username))
        .ok_or(SessionError::NotFound("Game not found"))?;

    let outcome = apply_player_move(state, game_id, &username, column)?;
    state.events.publish(TelemetryEvent::new(
        kind::MOVE_MADE,
        json!({
            "gameId": game_id,
            "player": username,
            "column": column,
        }),
    ));
    broadcast_game_update(state, game_id);
    match outcome {
        MoveOutcome::Won { cells, .. } => finish_game(state, game_id, &cells, None),
        MoveOutcome::Drawn { .. } => finish_game(state, game_id, &[], None),
        MoveOutcome::Continued { next_player, .. } => {
            let bot_turn = state
                .registry
                .games
                .get(&game_id)
                .map(|s| s.is_bot_game && next_player == Player::Two)
                .unwrap_or(false);
            if bot_turn {
                schedule_bot_move(state, game_id);
            }
        }
    }
    Ok(())
}

/// Resolve the mover's seat and apply the move under the per-game lock.
fn apply_player_move(
    state: &Arc<ServerState>,
    game_id: Uuid,
    username: &str,
    column: usize,
) -> Result<MoveOutcome, SessionError> {
    let mut session = state
        .registry
        .games
        .get_mut(&game_id)
        .ok_or(SessionError::NotFound("Game not found"))?;
    let player = session
        .player_number(username)
        .ok_or(SessionError::NotFound("Player not in this game"))?;
    Ok(session.game.apply_move(column, player)?)
}

fn handle_reconnect_msg(
    state: &Arc<ServerState>,
    conn: &mut ConnContext,
    username: String,
    game_id: Option<Uuid>,
) -> Result<(), SessionError> {
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err(SessionError::Validation("Username is required".into()));
    }

    conn.username = Some(username.clone());
    state.registry.bind_connection(
        &username,
        ClientHandle {
            generation: conn.generation,
            tx: conn.tx.clone(),
        },
    );

    // Supervised recovery first; plain rebinding covers the rest.
    let supervised = reconnect::handle_reconnect(state, &username);

    let game_id = game_id
        .or_else(|| state.registry.game_by_player(&username))
        .ok_or(SessionError::NotFound("Game not found"))?;
    let view = state
        .registry
        .games
        .get(&game_id)
        .map(|s| s.state_view())
        .ok_or(SessionError::NotFound("Game not found"))?;

    debug!(username, %game_id, supervised, "reconnect handled");
    broadcast_game_update(state, game_id);
    conn.send(ServerMessage::Reconnected {
        game_id,
        message: "Successfully reconnected to game".to_string(),
        game_state: view,
    });
    Ok(())
}

/// Connection teardown. The matchmaking slot is deliberately left alone so
/// a queued player's promotion timer can still pair them with the bot; only
/// a later join or the timer itself clears the slot.
fn handle_teardown(state: &Arc<ServerState>, conn: &ConnContext) {
    let Some(username) = conn.username.as_deref() else {
        return;
    };

    // Only the currently bound connection counts as a disconnect; a stale
    // socket closing after a reconnect must not disturb the new binding.
    if !state.registry.unbind_connection(username, conn.generation) {
        return;
    }

    if state.registry.is_waiting(username) {
        debug!(username, "waiting player dropped; slot left for promotion timer");
        return;
    }

    reconnect::handle_disconnect(state, username);
}

/// Send GAME_UPDATE to both human participants, each with their own seat
/// and opponent fields.
pub(crate) fn broadcast_game_update(state: &Arc<ServerState>, game_id: Uuid) {
    let Some(session) = state.registry.games.get(&game_id) else {
        return;
    };
    let view = session.state_view();
    let participants = [
        (session.player1.clone(), 1u8, session.player2.clone()),
        (session.player2.clone(), 2u8, session.player1.clone()),
    ];
    drop(session);

    for (name, seat, opponent) in participants {
        if name == BOT_NAME {
            continue;
        }
        state.registry.send_to(
            &name,
            ServerMessage::GameUpdate {
                state: view.clone(),
                your_player: seat,
                opponent,
            },
        );
    }
}

/// Terminal notification and collaborator hand-off for a finished game.
/// The in-memory outcome is already committed when this runs; persistence
/// and telemetry failures stay inside their collaborators.
pub(crate) fn finish_game(
    state: &Arc<ServerState>,
    game_id: Uuid,
    win_cells: &[(usize, usize)],
    reason: Option<&str>,
) {
    let Some(session) = state.registry.games.get(&game_id) else {
        return;
    };
    let view = session.state_view();
    let winner = session.game.winner;
    let player1 = session.player1.clone();
    let player2 = session.player2.clone();
    let record = FinishedGame::from_session(&session);
    drop(session);

    let cells: Vec<CellRef> = win_cells.iter().copied().map(Into::into).collect();
    for (name, seat) in [(player1.as_str(), Player::One), (player2.as_str(), Player::Two)] {
        if name == BOT_NAME {
            continue;
        }
        let result = match winner.and_then(Outcome::winner) {
            Some(winning_seat) if winning_seat == seat => GameOverResult::Win,
            Some(_) => GameOverResult::Loss,
            None => GameOverResult::Draw,
        };
        state.registry.send_to(
            name,
            ServerMessage::GameOver {
                state: view.clone(),
                result,
                win_cells: cells.clone(),
                reason: reason.map(str::to_string),
            },
        );
    }

    info!(%game_id, ?winner, "game finished");

    state.store.record_finished_game(record);
    match winner {
        Some(Outcome::Draw) => state.store.update_standings(StandingsUpdate::Draw {
            players: [player1.clone(), player2.clone()],
        }),
        Some(Outcome::Player1) => state.store.update_standings(StandingsUpdate::Decisive {
            winner: player1.clone(),
            loser: player2.clone(),
        }),
        Some(Outcome::Player2) => state.store.update_standings(StandingsUpdate::Decisive {
            winner: player2.clone(),
            loser: player1.clone(),
        }),
        None => {}
    }
    state.events.publish(TelemetryEvent::new(
        kind::GAME_ENDED,
        json!({
            "gameId": game_id,
            "winner": winner,
            "reason": reason,
        }),
    ));
}

/// Let the bot answer after a short delay so the exchange reads as turns.
pub(crate) fn schedule_bot_move(state: &Arc<ServerState>, game_id: Uuid) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(state.config.bot_move_delay).await;

        let applied = {
            let Some(mut session) = state.registry.games.get_mut(&game_id) else {
                return;
            };
            if !session.is_bot_game
                || !session.game.is_active()
                || session.game.current_player != Player::Two
            {
                return;
            }
            let Some(column) = Bot::choose_column(&session.game.board) else {
                return;
            };
            match session.game.apply_move(column, Player::Two) {
                Ok(outcome) => (outcome, column),
                Err(e) => {
                    error!(%game_id, "bot move rejected: {}", e);
                    return;
                }
            }
        };
        let (outcome, column) = applied;

        state.events.publish(TelemetryEvent::new(
            kind::MOVE_MADE,
            json!({
                "gameId": game_id,
                "player": BOT_NAME,
                "column": column,
            }),
        ));
        broadcast_game_update(&state, game_id);
        match outcome {
            MoveOutcome::Won { cells, .. } => finish_game(&state, game_id, &cells, None),
            MoveOutcome::Drawn { .. } => finish_game(&state, game_id, &[], None),
            MoveOutcome::Continued { .. } => {}
        }
    });
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::protocol::GameStateView;
    use crate::store::MemoryStore;
    use fourline_core::GameStatus;

    fn conn_for(
        _state: &Arc<ServerState>,
    ) -> (ConnContext, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ConnContext {
                generation: Uuid::new_v4(),
                tx,
                username: None,
            },
            rx,
        )
    }

    fn join(state: &Arc<ServerState>, conn: &mut ConnContext, name: &str) {
        handle_message(
            state,
            conn,
            ClientMessage::JoinGame {
                username: name.to_string(),
            },
        );
    }

    fn make_move(state: &Arc<ServerState>, conn: &mut ConnContext, column: i64) {
        handle_message(
            state,
            conn,
            ClientMessage::MakeMove {
                game_id: None,
                column,
            },
        );
    }

    #[tokio::test]
    async fn empty_username_is_a_validation_error() {
        let state = test_state();
        let (mut conn, mut rx) = conn_for(&state);

        join(&state, &mut conn, "   ");

        assert!(matches!(
            drain(&mut rx).last(),
            Some(ServerMessage::Error { message }) if message == "Username is required"
        ));
        assert!(conn.username.is_none());
    }

    #[test]
    fn parse_failures_name_what_went_wrong() {
        // A known kind with a bad payload is not an unknown kind.
        assert_eq!(
            classify_parse_failure(r#"{"type":"MAKE_MOVE","payload":{}}"#),
            "Invalid message payload"
        );
        assert_eq!(
            classify_parse_failure(r#"{"type":"DANCE","payload":{}}"#),
            "Unknown message type"
        );
        assert_eq!(classify_parse_failure("{\"type\":"), "Invalid message format");
    }

    #[tokio::test]
    async fn move_without_identity_is_rejected() {
        let state = test_state();
        let (mut conn, mut rx) = conn_for(&state);

        make_move(&state, &mut conn, 3);

        assert!(matches!(
            drain(&mut rx).last(),
            Some(ServerMessage::Error { message }) if message == "Not authenticated"
        ));
    }

    #[tokio::test]
    async fn out_of_range_column_is_rejected_before_resolution() {
        let state = test_state();
        let (mut conn, mut rx) = conn_for(&state);
        join(&state, &mut conn, "alice");

        make_move(&state, &mut conn, 7);
        make_move(&state, &mut conn, -1);

        let errors: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::Error { message } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|m| m == "Invalid column. Must be between 0 and 6"));
    }

    #[tokio::test]
    async fn full_pvp_move_flow_broadcasts_and_alternates() {
        let state = test_state();
        let (mut alice_conn, mut alice_rx) = conn_for(&state);
        let (mut bob_conn, mut bob_rx) = conn_for(&state);

        join(&state, &mut alice_conn, "alice");
        join(&state, &mut bob_conn, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        make_move(&state, &mut alice_conn, 3);

        let update = drain(&mut bob_rx).into_iter().find_map(|m| match m {
            ServerMessage::GameUpdate {
                state: view,
                your_player,
                opponent,
            } => Some((view, your_player, opponent)),
            _ => None,
        });
        let (view, your_player, opponent) = update.expect("bob should see the move");
        assert_eq!(your_player, 2);
        assert_eq!(opponent, "alice");
        assert_eq!(view.board[5][3], 1);
        assert_eq!(view.current_player, 2);
        assert_eq!(view.moves_count, 1);

        // Out of turn now for alice.
        make_move(&state, &mut alice_conn, 3);
        assert!(matches!(
            drain(&mut alice_rx).last(),
            Some(ServerMessage::Error { message }) if message == "Not your turn"
        ));
    }

    #[tokio::test]
    async fn winning_move_finishes_and_records_the_game() {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(ServerState::new(
            ServerConfig::default(),
            Arc::clone(&store) as Arc<dyn GameStore>,
            Arc::new(crate::events::LogSink),
        ));
        let (mut alice_conn, mut alice_rx) = conn_for(&state);
        let (mut bob_conn, mut bob_rx) = conn_for(&state);
        join(&state, &mut alice_conn, "alice");
        join(&state, &mut bob_conn, "bob");

        // Alice builds a bottom-row four across columns 0..=3.
        for col in 0..3 {
            make_move(&state, &mut alice_conn, col);
            make_move(&state, &mut bob_conn, col);
        }
        make_move(&state, &mut alice_conn, 3);

        let alice_over = drain(&mut alice_rx).into_iter().find_map(|m| match m {
            ServerMessage::GameOver {
                result, win_cells, ..
            } => Some((result, win_cells)),
            _ => None,
        });
        let (result, win_cells) = alice_over.expect("alice should get GAME_OVER");
        assert_eq!(result, GameOverResult::Win);
        assert_eq!(
            win_cells,
            vec![
                CellRef { row: 5, column: 0 },
                CellRef { row: 5, column: 1 },
                CellRef { row: 5, column: 2 },
                CellRef { row: 5, column: 3 },
            ]
        );

        let bob_over = drain(&mut bob_rx).into_iter().find_map(|m| match m {
            ServerMessage::GameOver { result, .. } => Some(result),
            _ => None,
        });
        assert_eq!(bob_over, Some(GameOverResult::Loss));

        // Collaborators observed the finished game.
        assert_eq!(store.finished_count(), 1);
        assert_eq!(store.player_record("alice").unwrap().wins, 1);
        assert_eq!(store.player_record("bob").unwrap().losses, 1);

        // The finished game is immutable.
        let game_id = state.registry.game_by_player("bob").unwrap();
        assert_eq!(
            state.registry.games.get(&game_id).unwrap().game.status,
            GameStatus::Completed
        );
        make_move(&state, &mut bob_conn, 0);
        assert!(matches!(
            drain(&mut bob_rx).last(),
            Some(ServerMessage::Error { message }) if message == "Game is not active"
        ));
    }

    #[tokio::test]
    async fn join_resumes_an_active_game() {
        let state = test_state();
        let (mut alice_conn, mut alice_rx) = conn_for(&state);
        let (mut bob_conn, _bob_rx) = conn_for(&state);
        join(&state, &mut alice_conn, "alice");
        join(&state, &mut bob_conn, "bob");
        let game_id = state.registry.game_by_player("alice").unwrap();
        drain(&mut alice_rx);

        // Alice reappears on a fresh connection and joins again.
        let (mut alice2_conn, mut alice2_rx) = conn_for(&state);
        join(&state, &mut alice2_conn, "alice");

        let found = drain(&mut alice2_rx).into_iter().find_map(|m| match m {
            ServerMessage::GameFound {
                game_id: id,
                game_state,
                ..
            } => Some((id, game_state)),
            _ => None,
        });
        let (found_id, view): (Uuid, GameStateView) = found.expect("existing game resumed");
        assert_eq!(found_id, game_id);
        assert_eq!(view.player1, "alice");

        // The stale connection's teardown must not unbind the new one.
        handle_teardown(&state, &alice_conn);
        assert!(!state.pending_disconnects.contains_key("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn bot_answers_after_the_configured_delay() {
        let state = test_state();
        let (mut conn, mut rx) = conn_for(&state);
        join(&state, &mut conn, "alice");

        // Let the matchmaking timer promote alice to a bot game.
        tokio::time::sleep(state.config.matchmaking_timeout + std::time::Duration::from_millis(50))
            .await;
        tokio::task::yield_now().await;
        let game_id = state.registry.game_by_player("alice").unwrap();

        make_move(&state, &mut conn, 0);
        {
            let session = state.registry.games.get(&game_id).unwrap();
            assert_eq!(session.game.moves.len(), 1);
            assert_eq!(session.game.current_player, Player::Two);
        }

        tokio::time::sleep(state.config.bot_move_delay + std::time::Duration::from_millis(50))
            .await;
        tokio::task::yield_now().await;

        {
            let session = state.registry.games.get(&game_id).unwrap();
            assert_eq!(session.game.moves.len(), 2);
            assert_eq!(session.game.current_player, Player::One);
        }

        // Alice saw her own move and the bot's answer.
        let updates = drain(&mut rx)
            .iter()
            .filter(|m| matches!(m, ServerMessage::GameUpdate { .. }))
            .count();
        assert_eq!(updates, 2);
    }

    #[tokio::test]
    async fn rejoining_after_a_finished_game_requeues() {
        let state = test_state();
        let (mut conn, mut rx) = conn_for(&state);
        let game_id = start_pvp_game(&state, "alice", "bob");
        state
            .registry
            .games
            .get_mut(&game_id)
            .unwrap()
            .game
            .forfeit(Player::One);

        join(&state, &mut conn, "alice");

        // The stale mapping is gone and alice waits for a new opponent.
        assert_eq!(state.registry.game_by_player("alice"), None);
        assert!(state.registry.is_waiting("alice"));
        assert!(matches!(
            drain(&mut rx).last(),
            Some(ServerMessage::WaitingForOpponent { .. })
        ));
    }

    #[tokio::test]
    async fn teardown_of_waiting_player_leaves_the_slot() {
        let state = test_state();
        let (mut conn, _rx) = conn_for(&state);
        join(&state, &mut conn, "alice");
        assert!(state.registry.is_waiting("alice"));

        handle_teardown(&state, &conn);

        // The slot survives so the promotion timer can still fire.
        assert!(state.registry.is_waiting("alice"));
        assert!(!state.pending_disconnects.contains_key("alice"));
    }

    #[tokio::test]
    async fn reconnect_message_rebinds_and_replays_state() {
        let state = test_state();
        let (mut alice_conn, _alice_rx) = conn_for(&state);
        let (mut bob_conn, _bob_rx) = conn_for(&state);
        join(&state, &mut alice_conn, "alice");
        join(&state, &mut bob_conn, "bob");
        let game_id = state.registry.game_by_player("alice").unwrap();

        handle_teardown(&state, &alice_conn);
        assert!(state.pending_disconnects.contains_key("alice"));

        let (mut alice2_conn, mut alice2_rx) = conn_for(&state);
        handle_message(
            &state,
            &mut alice2_conn,
            ClientMessage::Reconnect {
                username: "alice".to_string(),
                game_id: None,
            },
        );

        assert!(!state.pending_disconnects.contains_key("alice"));
        let reconnected = drain(&mut alice2_rx).into_iter().find_map(|m| match m {
            ServerMessage::Reconnected { game_id: id, .. } => Some(id),
            _ => None,
        });
        assert_eq!(reconnected, Some(game_id));
        assert_eq!(
            state.registry.games.get(&game_id).unwrap().game.status,
            GameStatus::Active
        );
    }
}
