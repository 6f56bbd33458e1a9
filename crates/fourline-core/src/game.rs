//! Core game state machine.
//!
//! A [`Game`] owns the board, the move log, and the lifecycle status. Every
//! mutation goes through [`Game::apply_move`] or [`Game::forfeit`]; once the
//! status leaves [`GameStatus::Active`] the game is immutable.

use crate::board::{Board, Player, COLS};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors for rejected moves. Rejection never mutates the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Game is not active")]
    GameNotActive,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Column must be between 0 and 6")]
    ColumnOutOfRange,

    #[error("Column is full")]
    ColumnFull,
}

/// Lifecycle status of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Active,
    Completed,
    Forfeited,
}

/// Terminal outcome of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Player1,
    Player2,
    Draw,
}

impl Outcome {
    /// The winning seat for a decisive outcome.
    pub fn winner(self) -> Option<Player> {
        match self {
            Outcome::Player1 => Some(Player::One),
            Outcome::Player2 => Some(Player::Two),
            Outcome::Draw => None,
        }
    }

    fn for_player(player: Player) -> Outcome {
        match player {
            Player::One => Outcome::Player1,
            Player::Two => Outcome::Player2,
        }
    }
}

/// One entry of the move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub row: usize,
    pub column: usize,
    pub player: Player,
    pub timestamp_ms: u64,
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game continues; it is now `next_player`'s turn.
    Continued { row: usize, next_player: Player },
    /// The move completed a run. `cells` is the full contiguous run for
    /// highlighting.
    Won { row: usize, cells: Vec<(usize, usize)> },
    /// The board filled without a win.
    Drawn { row: usize },
}

/// A single game between two participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub board: Board,
    pub moves: Vec<MoveRecord>,
    pub current_player: Player,
    pub status: GameStatus,
    pub winner: Option<Outcome>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// A fresh game with player one to move.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            moves: Vec::new(),
            current_player: Player::One,
            status: GameStatus::Active,
            winner: None,
        }
    }

    /// Apply a move for `player` in `column`.
    ///
    /// Validation order: the game must be active, it must be `player`'s
    /// turn, the column must be in range, and the column must have room.
    /// On acceptance the piece is placed, the move is logged, and the game
    /// evaluates win, then draw, then flips the turn.
    pub fn apply_move(&mut self, column: usize, player: Player) -> Result<MoveOutcome, GameError> {
        if self.status != GameStatus::Active {
            return Err(GameError::GameNotActive);
        }
        if player != self.current_player {
            return Err(GameError::NotYourTurn);
        }
        if column >= COLS {
            return Err(GameError::ColumnOutOfRange);
        }

        let row = self
            .board
            .drop_piece(column, player)
            .ok_or(GameError::ColumnFull)?;

        self.moves.push(MoveRecord {
            row,
            column,
            player,
            timestamp_ms: now_ms(),
        });

        if let Some(cells) = self.board.winning_run(row, column, player) {
            self.status = GameStatus::Completed;
            self.winner = Some(Outcome::for_player(player));
            return Ok(MoveOutcome::Won { row, cells });
        }

        if self.board.is_full() {
            self.status = GameStatus::Completed;
            self.winner = Some(Outcome::Draw);
            return Ok(MoveOutcome::Drawn { row });
        }

        self.current_player = self.current_player.other();
        Ok(MoveOutcome::Continued {
            row,
            next_player: self.current_player,
        })
    }

    /// Forfeit the game on behalf of `player`; the other seat wins
    /// regardless of board state. No-op when the game is already over.
    pub fn forfeit(&mut self, player: Player) {
        if self.status != GameStatus::Active {
            return;
        }
        self.status = GameStatus::Forfeited;
        self.winner = Some(Outcome::for_player(player.other()));
    }

    /// Whether moves can still be applied.
    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
