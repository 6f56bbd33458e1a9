//! WebSocket protocol messages.
//!
//! One message is one JSON object `{type, payload}`. Type names and payload
//! field casing follow the client's expectations (SCREAMING_SNAKE types,
//! camelCase payloads).

use fourline_core::{Game, GameStatus, Outcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Authenticate by display name and enter matchmaking (or resume).
    #[serde(rename = "JOIN_GAME")]
    JoinGame { username: String },

    /// Drop a piece. The game resolves by id when given, else by the
    /// sender's active game.
    #[serde(rename = "MAKE_MOVE")]
    MakeMove {
        #[serde(rename = "gameId", default)]
        game_id: Option<Uuid>,
        column: i64,
    },

    /// Rebind a dropped connection to an in-flight game.
    #[serde(rename = "RECONNECT")]
    Reconnect {
        username: String,
        #[serde(rename = "gameId", default)]
        game_id: Option<Uuid>,
    },

    /// Liveness probe.
    #[serde(rename = "PING")]
    Ping {},
}

impl ClientMessage {
    /// Wire names of every accepted message kind.
    pub const TYPES: [&'static str; 4] = ["JOIN_GAME", "MAKE_MOVE", "RECONNECT", "PING"];
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "WAITING_FOR_OPPONENT")]
    WaitingForOpponent { message: String, timeout: u64 },

    #[serde(rename = "GAME_STARTED")]
    GameStarted {
        #[serde(rename = "gameId")]
        game_id: Uuid,
        player: u8,
        opponent: String,
        #[serde(rename = "isBotGame")]
        is_bot_game: bool,
        #[serde(rename = "gameState")]
        game_state: GameStateView,
    },

    /// An active game already exists for this identity.
    #[serde(rename = "GAME_FOUND")]
    GameFound {
        #[serde(rename = "gameId")]
        game_id: Uuid,
        message: String,
        #[serde(rename = "gameState")]
        game_state: GameStateView,
    },

    #[serde(rename = "RECONNECTED")]
    Reconnected {
        #[serde(rename = "gameId")]
        game_id: Uuid,
        message: String,
        #[serde(rename = "gameState")]
        game_state: GameStateView,
    },

    #[serde(rename = "GAME_UPDATE")]
    GameUpdate {
        #[serde(flatten)]
        state: GameStateView,
        #[serde(rename = "yourPlayer")]
        your_player: u8,
        opponent: String,
    },

    #[serde(rename = "GAME_OVER")]
    GameOver {
        #[serde(flatten)]
        state: GameStateView,
        result: GameOverResult,
        #[serde(rename = "winCells")]
        win_cells: Vec<CellRef>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "OPPONENT_DISCONNECTED")]
    OpponentDisconnected { message: String, timeout: u64 },

    #[serde(rename = "OPPONENT_RECONNECTED")]
    OpponentReconnected { message: String },

    #[serde(rename = "ERROR")]
    Error { message: String },

    #[serde(rename = "PONG")]
    Pong { timestamp: u64 },
}

/// Result of a finished game from one recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOverResult {
    Win,
    Loss,
    Draw,
}

/// A highlighted board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub column: usize,
}

impl From<(usize, usize)> for CellRef {
    fn from((row, column): (usize, usize)) -> Self {
        Self { row, column }
    }
}

/// Full game state as pushed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub id: Uuid,
    /// 6x7 grid of 0 (empty), 1, 2.
    pub board: Vec<Vec<u8>>,
    pub current_player: u8,
    pub status: GameStatus,
    pub winner: Option<Outcome>,
    pub player1: String,
    pub player2: String,
    pub is_bot_game: bool,
    pub moves_count: usize,
}

impl GameStateView {
    pub fn new(id: Uuid, game: &Game, player1: &str, player2: &str, is_bot_game: bool) -> Self {
        Self {
            id,
            board: game.board.grid(),
            current_player: game.current_player.number(),
            status: game.status,
            winner: game.winner,
            player1: player1.to_string(),
            player2: player2.to_string(),
            is_bot_game,
            moves_count: game.moves.len(),
        }
    }
}
