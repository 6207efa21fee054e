//! Property-based tests for board mechanics.

use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use bepp_2048::engine::{self as GameEngine, reverse_row, row_tables, transpose, Board, Move};
use bepp_2048::game::Game;

/// Strategy: a cell exponent, empty about half of the time.
fn cell_strategy() -> impl Strategy<Value = u8> {
    prop_oneof![1 => Just(0u8), 1 => 1u8..=12]
}

/// Strategy: a board with at least one tile.
fn board_strategy() -> impl Strategy<Value = Board> {
    prop::array::uniform16(cell_strategy())
        .prop_filter("board needs a tile", |cells| cells.iter().any(|&c| c != 0))
        .prop_map(Board::from_exponents)
}

/// Strategy: a board with no empty cell. About one in five has no move left.
fn full_board_strategy() -> impl Strategy<Value = Board> {
    prop::array::uniform16(1u8..=15).prop_map(Board::from_exponents)
}

fn move_strategy() -> impl Strategy<Value = Move> {
    prop::sample::select(Move::ALL.to_vec())
}

#[test]
fn right_table_mirrors_left_for_every_row() {
    let tables = row_tables();
    for row in 0..=u16::MAX {
        assert_eq!(tables.right(row), reverse_row(tables.left(reverse_row(row))), "row={row:#06x}");
    }
}

#[test]
fn terminal_agreement_on_seeded_full_boards() {
    let mut rng = StdRng::seed_from_u64(2048);
    let mut terminal = 0;
    for _ in 0..1000 {
        let mut cells = [0u8; 16];
        for c in cells.iter_mut() {
            *c = rng.gen_range(1..=15);
        }
        let board = Board::from_exponents(cells);
        let any_moved = Move::ALL.iter().any(|&d| board.apply(d).moved);
        assert_eq!(board.can_move(), any_moved, "board:\n{board}");
        if !any_moved {
            terminal += 1;
            assert!(board.is_game_over());
        }
    }
    assert!(terminal > 0);
}

#[test]
fn pair_of_twos_merges_into_a_four() {
    GameEngine::new();
    let tables = row_tables();
    assert_eq!(tables.left(0x0011), 0x0002);
    assert_eq!(tables.score(0x0011), 4);
}

proptest! {
    // 1. A move that changes nothing returns the input board exactly
    #[test]
    fn failed_move_is_identity(board in board_strategy(), dir in move_strategy()) {
        let out = board.apply(dir);
        if !out.moved {
            prop_assert_eq!(out.board, board);
            prop_assert_eq!(out.score_gain, 0);
        } else {
            prop_assert_ne!(out.board, board);
        }
    }

    // 2. can_move agrees with trying every direction
    #[test]
    fn terminal_agreement(board in prop_oneof![board_strategy(), full_board_strategy()]) {
        let any_moved = Move::ALL.iter().any(|&d| board.apply(d).moved);
        prop_assert_eq!(board.can_move(), any_moved, "board:\n{}", board);
    }

    // 3. Cumulative score is the sum of per-move gains
    #[test]
    fn score_is_additive(
        board in board_strategy(),
        dirs in prop::collection::vec(move_strategy(), 1..40),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut game = Game::from_board(board);
        let mut total = 0u64;
        for dir in dirs {
            let (_, gain) = game.play(dir, true, &mut rng);
            total += gain;
        }
        prop_assert_eq!(game.score(), total);
    }

    // 4. Spawning fills exactly one empty cell with a 2 or a 4
    #[test]
    fn spawn_fills_one_empty_cell(board in board_strategy(), seed in any::<u64>()) {
        prop_assume!(board.count_empty() > 0);
        let mut rng = StdRng::seed_from_u64(seed);
        let after = board.with_random_tile(&mut rng);
        let before_cells = board.exponents();
        let after_cells = after.exponents();
        let changed: Vec<usize> = (0..16).filter(|&i| before_cells[i] != after_cells[i]).collect();
        prop_assert_eq!(changed.len(), 1);
        let idx = changed[0];
        prop_assert_eq!(before_cells[idx], 0);
        prop_assert!(after_cells[idx] == 1 || after_cells[idx] == 2);
    }

    // 5. Moves never create or lose tile mass except through saturation
    #[test]
    fn moves_conserve_tile_sum(board in board_strategy(), dir in move_strategy()) {
        let sum = |b: Board| (0..16).map(|i| b.tile_value(i) as u64).sum::<u64>();
        prop_assert_eq!(sum(board.apply(dir).board), sum(board));
    }

    // 6. Transposing twice is the identity
    #[test]
    fn transpose_is_an_involution(raw in any::<u64>()) {
        prop_assert_eq!(transpose(transpose(raw)), raw);
    }

    // 7. Vertical moves are horizontal moves on the transposed board
    #[test]
    fn up_is_left_on_transpose(board in board_strategy()) {
        let t = Board::from_raw(transpose(board.raw()));
        let up = board.apply(Move::Up);
        let left = t.apply(Move::Left);
        prop_assert_eq!(up.board.raw(), transpose(left.board.raw()));
        prop_assert_eq!(up.score_gain, left.score_gain);
    }
}
