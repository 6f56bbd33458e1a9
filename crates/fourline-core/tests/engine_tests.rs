//! Integration tests for the Fourline game engine.
//!
//! These tests verify complete game flows: alternating play, win and draw
//! detection, invariants over legal move sequences, and the bot driving a
//! full game through the same engine the server uses.

use fourline_core::*;

/// Play out alternating moves, starting from whoever is on turn.
fn play_sequence(game: &mut Game, columns: &[usize]) {
    for &col in columns {
        let player = game.current_player;
        game.apply_move(col, player)
            .unwrap_or_else(|e| panic!("move in column {} rejected: {}", col, e));
    }
}

/// Gravity invariant: no piece sits above an empty cell in its column.
fn assert_no_floating_pieces(board: &Board) {
    let grid = board.grid();
    for col in 0..COLS {
        for row in 1..ROWS {
            if grid[row - 1][col] != 0 {
                assert_ne!(
                    grid[row][col], 0,
                    "floating piece above empty cell at ({}, {})",
                    row, col
                );
            }
        }
    }
}

#[test]
fn gravity_holds_across_a_long_game() {
    let mut game = Game::new();
    let columns = [3, 3, 2, 4, 2, 2, 5, 1, 0, 6, 4, 4, 1, 5];
    play_sequence(&mut game, &columns);

    assert_no_floating_pieces(&game.board);
    assert_eq!(game.moves.len(), columns.len());
}

#[test]
fn turn_alternates_after_every_accepted_move() {
    let mut game = Game::new();
    for col in [0, 1, 2, 3, 4, 5] {
        let mover = game.current_player;
        match game.apply_move(col, mover).unwrap() {
            MoveOutcome::Continued { next_player, .. } => {
                assert_eq!(next_player, mover.other());
                assert_eq!(game.current_player, mover.other());
            }
            other => panic!("game ended unexpectedly: {:?}", other),
        }
    }
}

#[test]
fn bottom_row_win_reports_exact_cells() {
    let mut game = Game::new();
    // A stacks the bottom row of columns 0..=2 while B sits above.
    play_sequence(&mut game, &[0, 0, 1, 1, 2, 2]);
    let outcome = game.apply_move(3, Player::One).unwrap();

    match outcome {
        MoveOutcome::Won { row, cells } => {
            assert_eq!(row, 5);
            assert_eq!(cells, vec![(5, 0), (5, 1), (5, 2), (5, 3)]);
        }
        other => panic!("expected win, got {:?}", other),
    }
    assert_eq!(game.status, GameStatus::Completed);
    assert_eq!(game.winner, Some(Outcome::Player1));
}

#[test]
fn row_three_win_reports_cells_on_row_three() {
    let mut game = Game::new();
    // Rows 5 and 4 of columns 0..=3 fill with mixed colors (no run of
    // three for either side), then A lays (3,0)..(3,2) while B burns
    // moves in column 6, and completes the four at (3,3).
    play_sequence(&mut game, &[0, 1, 2, 3, 1, 0, 3, 2]);
    play_sequence(&mut game, &[0, 6, 1, 6, 2, 6]);
    let outcome = game.apply_move(3, Player::One).unwrap();

    match outcome {
        MoveOutcome::Won { row, cells } => {
            assert_eq!(row, 3);
            assert_eq!(cells, vec![(3, 0), (3, 1), (3, 2), (3, 3)]);
        }
        other => panic!("expected win, got {:?}", other),
    }
    assert_eq!(game.winner, Some(Outcome::Player1));
}

#[test]
fn win_is_not_reported_early() {
    let mut game = Game::new();
    play_sequence(&mut game, &[0, 0, 1, 1]);
    match game.apply_move(2, Player::One).unwrap() {
        MoveOutcome::Continued { .. } => {}
        other => panic!("three in a row must not end the game: {:?}", other),
    }
    assert_eq!(game.status, GameStatus::Active);
    assert_eq!(game.winner, None);
}

#[test]
fn seventh_piece_in_a_column_is_rejected() {
    let mut game = Game::new();
    // Both sides alternate between columns 2 and 3 so each column fills
    // with mixed colors and no vertical run forms.
    play_sequence(&mut game, &[3, 3, 2, 2, 3, 3, 2, 2]);
    assert!(game.board.is_legal(2));
    assert!(game.board.is_legal(3));

    // Fourth pieces did not close the columns; six do.
    play_sequence(&mut game, &[3, 3, 2, 2]);
    assert!(!game.board.is_legal(2));
    assert!(!game.board.is_legal(3));

    let moves_before = game.moves.len();
    let err = game.apply_move(2, game.current_player).unwrap_err();
    assert_eq!(err, GameError::ColumnFull);
    assert_eq!(game.moves.len(), moves_before);
    assert_eq!(game.status, GameStatus::Active);
}

#[test]
fn full_board_without_a_run_is_a_draw() {
    let mut game = Game::new();
    // Fills column pairs so every column alternates colors vertically and
    // rows follow a p p q q p p q pattern: no axis ever reaches four.
    let order = [
        0, 2, 2, 0, 0, 2, 2, 0, 0, 2, 2, 0, //
        1, 3, 3, 1, 1, 3, 3, 1, 1, 3, 3, 1, //
        4, 6, 6, 4, 4, 6, 6, 4, 4, 6, 6, 4, //
        5, 5, 5, 5, 5, 5,
    ];
    let mut last = None;
    for &col in &order {
        let player = game.current_player;
        match game.apply_move(col, player) {
            Ok(outcome) => last = Some(outcome),
            Err(e) => panic!("draw sequence rejected at column {}: {}", col, e),
        }
    }

    assert!(matches!(last, Some(MoveOutcome::Drawn { .. })));
    assert_eq!(game.status, GameStatus::Completed);
    assert_eq!(game.winner, Some(Outcome::Draw));
    assert!(game.board.is_full());
}

#[test]
fn draw_is_only_declared_on_a_full_board() {
    let mut game = Game::new();
    play_sequence(&mut game, &[0, 1, 2, 4, 5, 6]);

    // Plenty of open cells: the game must still be active.
    assert_eq!(game.status, GameStatus::Active);
    assert!(!game.board.is_full());
}

#[test]
fn bot_plays_a_full_game_through_the_engine() {
    let mut game = Game::new();
    let mut next_human = 0;

    while game.is_active() {
        let col = if game.current_player == Player::One {
            // Human policy for the test: cycle columns, skipping full ones.
            let pick = (0..COLS)
                .map(|off| (next_human + off) % COLS)
                .find(|&c| game.board.is_legal(c));
            next_human += 1;
            match pick {
                Some(c) => c,
                None => break,
            }
        } else {
            match Bot::choose_column(&game.board) {
                Some(c) => c,
                None => break,
            }
        };

        let player = game.current_player;
        game.apply_move(col, player).unwrap();
        assert_no_floating_pieces(&game.board);
    }

    assert!(!game.is_active(), "game must reach a terminal state");
    assert!(game.winner.is_some());
    assert!(game.moves.len() <= ROWS * COLS);
}
