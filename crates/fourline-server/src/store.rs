//! Persistence boundary: finished games and cumulative standings.
//!
//! The session engine hands completed or forfeited games to a [`GameStore`]
//! and moves on; recording is best-effort and a store failure never reverses
//! an in-memory outcome. [`MemoryStore`] is the in-process implementation
//! and also serves the read-only standings queries.

use crate::registry::{GameSession, BOT_NAME};
use dashmap::DashMap;
use fourline_core::{GameStatus, Outcome};
use serde::Serialize;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Durable record of a finished game.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedGame {
    pub id: Uuid,
    pub player1: String,
    pub player2: String,
    pub is_bot_game: bool,
    pub status: GameStatus,
    pub winner: Option<Outcome>,
    pub board: Vec<Vec<u8>>,
    pub moves_count: usize,
    pub created_at_ms: u64,
    pub finished_at_ms: u64,
}

impl FinishedGame {
    pub fn from_session(session: &GameSession) -> Self {
        Self {
            id: session.id,
            player1: session.player1.clone(),
            player2: session.player2.clone(),
            is_bot_game: session.is_bot_game,
            status: session.game.status,
            winner: session.game.winner,
            board: session.game.board.grid(),
            moves_count: session.game.moves.len(),
            created_at_ms: to_ms(session.created_at),
            finished_at_ms: to_ms(SystemTime::now()),
        }
    }
}

/// How a finished game affects the standings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StandingsUpdate {
    Decisive { winner: String, loser: String },
    Draw { players: [String; 2] },
}

/// Cumulative record for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total: u32,
}

/// Best-effort sink for completed games and standings updates.
/// Implementations log their own failures; callers never see them.
pub trait GameStore: Send + Sync {
    fn record_finished_game(&self, record: FinishedGame);
    fn update_standings(&self, update: StandingsUpdate);
}

/// In-memory store. Backs the standings queries and stands in for a
/// database in single-process deployments.
pub struct MemoryStore {
    finished: Mutex<Vec<FinishedGame>>,
    records: DashMap<String, PlayerRecord>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            finished: Mutex::new(Vec::new()),
            records: DashMap::new(),
        }
    }

    /// Top `n` players ordered by wins, then total games played.
    pub fn top_players(&self, n: usize) -> Vec<(String, PlayerRecord)> {
        let mut rows: Vec<(String, PlayerRecord)> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        rows.sort_by(|a, b| {
            b.1.wins
                .cmp(&a.1.wins)
                .then(b.1.total.cmp(&a.1.total))
                .then(a.0.cmp(&b.0))
        });
        rows.truncate(n);
        rows
    }

    /// One player's cumulative record.
    pub fn player_record(&self, username: &str) -> Option<PlayerRecord> {
        self.records.get(username).map(|entry| *entry)
    }

    /// Number of recorded finished games.
    pub fn finished_count(&self) -> usize {
        self.finished.lock().expect("finished log poisoned").len()
    }

    fn bump<F: FnOnce(&mut PlayerRecord)>(&self, username: &str, apply: F) {
        // The synthetic opponent never appears in standings.
        if username == BOT_NAME {
            return;
        }
        let mut record = self.records.entry(username.to_string()).or_default();
        apply(&mut record);
        record.total += 1;
    }
}

impl GameStore for MemoryStore {
    fn record_finished_game(&self, record: FinishedGame) {
        self.finished
            .lock()
            .expect("finished log poisoned")
            .push(record);
    }

    fn update_standings(&self, update: StandingsUpdate) {
        match update {
            StandingsUpdate::Decisive { winner, loser } => {
                self.bump(&winner, |r| r.wins += 1);
                self.bump(&loser, |r| r.losses += 1);
            }
            StandingsUpdate::Draw { players } => {
                for player in players {
                    self.bump(&player, |r| r.draws += 1);
                }
            }
        }
    }
}

fn to_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
