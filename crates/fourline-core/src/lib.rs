//! Fourline - Connect Four game engine
//!
//! This crate provides the core game logic for Fourline, including:
//! - Board representation with gravity and win detection
//! - Game state machine with full rule enforcement
//! - Deterministic computer opponent
//!
//! # Architecture
//!
//! The engine is pure: no I/O, no async, no networking. The server crate
//! drives it through [`Game::apply_move`] and broadcasts the results; the
//! same engine backs the computer opponent's trial evaluations.
//!
//! # Modules
//!
//! - [`board`]: the 6x7 grid, piece placement, and run detection
//! - [`game`]: move validation, the move log, and lifecycle status
//! - [`bot`]: the heuristic computer opponent

pub mod board;
pub mod bot;
pub mod game;

// Re-export commonly used types
pub use board::{Board, Cell, Player, COLS, ROWS, WIN_LENGTH};
pub use bot::Bot;
pub use game::{Game, GameError, GameStatus, MoveOutcome, MoveRecord, Outcome};
