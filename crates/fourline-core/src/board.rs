//! Board representation and win detection.
//!
//! The board is a fixed 6x7 grid with gravity: a dropped piece settles in
//! the lowest empty row of its column. Row 0 is the top row, which makes the
//! "column is full" check a single cell read.

use serde::{Deserialize, Serialize};

/// Number of rows on the board.
pub const ROWS: usize = 6;

/// Number of columns on the board.
pub const COLS: usize = 7;

/// Run length required to win.
pub const WIN_LENGTH: usize = 4;

/// A player seat. Player one always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Player {
    One,
    Two,
}

impl Player {
    /// The other seat.
    pub fn other(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Seat number as shown to clients (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> u8 {
        player.number()
    }
}

impl TryFrom<u8> for Player {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(format!("invalid player number: {}", other)),
        }
    }
}

/// One cell of the grid. Serialized as 0/1/2 on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Cell {
    #[default]
    Empty,
    One,
    Two,
}

impl Cell {
    /// Whether the cell holds the given player's piece.
    pub fn is(self, player: Player) -> bool {
        self == Cell::from_player(player)
    }

    fn from_player(player: Player) -> Cell {
        match player {
            Player::One => Cell::One,
            Player::Two => Cell::Two,
        }
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> u8 {
        match cell {
            Cell::Empty => 0,
            Cell::One => 1,
            Cell::Two => 2,
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::One),
            2 => Ok(Cell::Two),
            other => Err(format!("invalid cell value: {}", other)),
        }
    }
}

/// The 6x7 playing grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [[Cell; COLS]; ROWS],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; COLS]; ROWS],
        }
    }

    /// Cell at (row, col). Callers pass in-range coordinates.
    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.cells[row][col]
    }

    /// Whether a piece may be dropped into this column.
    pub fn is_legal(&self, col: usize) -> bool {
        col < COLS && self.cells[0][col] == Cell::Empty
    }

    /// Lowest empty row in the column, scanning from the bottom.
    pub fn next_open_row(&self, col: usize) -> Option<usize> {
        (0..ROWS).rev().find(|&row| self.cells[row][col] == Cell::Empty)
    }

    /// Drop a piece into the column, returning the row it settled in.
    /// Returns `None` when the column is full.
    pub fn drop_piece(&mut self, col: usize, player: Player) -> Option<usize> {
        let row = self.next_open_row(col)?;
        self.cells[row][col] = Cell::from_player(player);
        Some(row)
    }

    /// Whether every column is full. Gravity means checking the top row
    /// suffices.
    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(|&cell| cell != Cell::Empty)
    }

    /// The grid as nested 0/1/2 values for wire views.
    pub fn grid(&self) -> Vec<Vec<u8>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|&cell| u8::from(cell)).collect())
            .collect()
    }

    /// Scan the four axes through (row, col) for a run of at least
    /// [`WIN_LENGTH`] pieces belonging to `player`. Returns every contiguous
    /// cell of the first qualifying run, ordered along the axis, so callers
    /// can highlight the whole run rather than just four cells.
    pub fn winning_run(&self, row: usize, col: usize, player: Player) -> Option<Vec<(usize, usize)>> {
        const DIRECTIONS: [(isize, isize); 4] = [
            (0, 1),  // horizontal
            (1, 0),  // vertical
            (1, 1),  // diagonal down-right
            (1, -1), // diagonal down-left
        ];

        for (dr, dc) in DIRECTIONS {
            let cells = self.run_through(row, col, player, dr, dc);
            if cells.len() >= WIN_LENGTH {
                return Some(cells);
            }
        }

        None
    }

    /// Contiguous same-player cells along one axis through (row, col).
    /// The placed cell is counted exactly once.
    fn run_through(
        &self,
        row: usize,
        col: usize,
        player: Player,
        dr: isize,
        dc: isize,
    ) -> Vec<(usize, usize)> {
        let mut cells = vec![(row, col)];

        // Forward
        let mut r = row as isize + dr;
        let mut c = col as isize + dc;
        while self.in_bounds(r, c) && self.cells[r as usize][c as usize].is(player) {
            cells.push((r as usize, c as usize));
            r += dr;
            c += dc;
        }

        // Backward
        let mut r = row as isize - dr;
        let mut c = col as isize - dc;
        while self.in_bounds(r, c) && self.cells[r as usize][c as usize].is(player) {
            cells.insert(0, (r as usize, c as usize));
            r -= dr;
            c -= dc;
        }

        cells
    }

    fn in_bounds(&self, row: isize, col: isize) -> bool {
        row >= 0 && row < ROWS as isize && col >= 0 && col < COLS as isize
    }
}
