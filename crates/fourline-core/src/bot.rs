//! Computer opponent.
//!
//! The bot always plays the second seat. Its policy is a fixed three-step
//! heuristic: take an immediate win, block the human's immediate win,
//! otherwise prefer central columns. Trial placements go on a scratch copy
//! of the board so the authoritative game state is never touched.

use crate::board::{Board, Player, COLS};

/// Column preference when no tactical move exists: middle first, then
/// alternating outward.
const CENTER_OUT: [usize; COLS] = [3, 2, 4, 1, 5, 0, 6];

/// Deterministic heuristic move-chooser for the computer opponent.
pub struct Bot;

impl Bot {
    /// Pick a column for the bot, or `None` when no column is legal.
    pub fn choose_column(board: &Board) -> Option<usize> {
        // Take a win if one is available.
        for col in 0..COLS {
            if board.is_legal(col) && Self::wins_if_played(board, col, Player::Two) {
                return Some(col);
            }
        }

        // Block the human's win.
        for col in 0..COLS {
            if board.is_legal(col) && Self::wins_if_played(board, col, Player::One) {
                return Some(col);
            }
        }

        CENTER_OUT.into_iter().find(|&col| board.is_legal(col))
    }

    /// Whether dropping into `col` would complete a run for `player`.
    /// Evaluated on a scratch copy; the input board is never mutated.
    fn wins_if_played(board: &Board, col: usize, player: Player) -> bool {
        let mut trial = board.clone();
        match trial.drop_piece(col, player) {
            Some(row) => trial.winning_run(row, col, player).is_some(),
            None => false,
        }
    }
}
