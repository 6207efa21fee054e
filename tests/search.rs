//! End-to-end checks of the BEPP search against an unpruned expectimax.

use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};

use bepp_2048::engine::{Board, Move};
use bepp_2048::expectimax::{self, bounded_eval, Bepp, BeppConfig};
use bepp_2048::game::Game;

/// Plain expectimax: every spawn expanded, no bounds, no cache, no beam.
fn reference_max(board: Board, depth: u32) -> f64 {
    if depth == 0 || !board.can_move() {
        return bounded_eval(board);
    }
    Move::ALL
        .iter()
        .map(|&d| board.apply(d))
        .filter(|out| out.moved)
        .map(|out| reference_chance(out.board, depth - 1))
        .fold(f64::NEG_INFINITY, f64::max)
}

fn reference_chance(board: Board, depth: u32) -> f64 {
    if depth == 0 || !board.can_move() || board.count_empty() == 0 {
        return bounded_eval(board);
    }
    let cells: Vec<usize> = board.empty_cells().collect();
    let total: f64 = cells
        .iter()
        .map(|&idx| {
            0.9 * reference_max(board.with_tile(idx, 1), depth - 1)
                + 0.1 * reference_max(board.with_tile(idx, 2), depth - 1)
        })
        .sum();
    total / cells.len() as f64
}

/// Mid-game positions reached by random play from seeded starts.
fn positions() -> Vec<Board> {
    let mut out = Vec::new();
    for seed in 0..12u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut game = Game::new(&mut rng);
        let plies = rng.gen_range(0..30);
        for _ in 0..plies {
            let dir = Move::ALL[rng.gen_range(0..4)];
            game.play(dir, true, &mut rng);
            if game.is_over() {
                break;
            }
        }
        if game.board().can_move() {
            out.push(game.board());
        }
    }
    out
}

#[test]
fn scenario_pair_of_twos_moves_left() {
    let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(expectimax::best_move(b, 2, 1000), Move::Left);
}

#[test]
fn scenario_left_merges_pair() {
    let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let out = b.apply(Move::Left);
    assert!(out.moved);
    assert_eq!(out.score_gain, 4);
    assert_eq!(out.board.exponents(), [2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn scenario_value_of_pair_at_depth_two() {
    // Left: every spawn is expanded at the default cutoff and leaves 14 empty
    // cells next to the 4, so the value is 0.6 * 14/16 + 0.4 * 2/16.
    let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let mut search = Bepp::new();
    let out = search.search(b, 2, Duration::from_secs(5), bounded_eval);
    assert_eq!(out.direction, Move::Left);
    assert!((out.value - 0.575).abs() < 1e-9, "value={}", out.value);
    assert_eq!(search.last_stats().prob_pruned, 0);
}

#[test]
fn scenario_value_of_pair_with_fours_pruned() {
    // A cutoff above 0.1 skips every 4-spawn; those count as the pre-spawn
    // board (15 empty, 0.6125) with weight 0.1.
    let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let mut search = Bepp::with_config(BeppConfig { prob_cutoff: 0.15, beam_width: 4 });
    let out = search.search(b, 2, Duration::from_secs(5), bounded_eval);
    assert_eq!(out.direction, Move::Left);
    assert!((out.value - 0.57875).abs() < 1e-9, "value={}", out.value);
    assert!(search.last_stats().prob_pruned > 0);
}

#[test]
fn unpruned_search_matches_reference_expectimax() {
    let cfg = BeppConfig { prob_cutoff: 0.0, beam_width: 4 };
    let boards = positions();
    assert!(!boards.is_empty());
    for board in boards {
        let mut search = Bepp::with_config(cfg);
        let out = search.search(board, 3, Duration::from_secs(60), bounded_eval);
        assert_eq!(out.depth, 3);
        assert!(out.completed);

        let expected = reference_max(board, 3);
        assert!((out.value - expected).abs() < 1e-9, "board:\n{board}\nbepp={} reference={}", out.value, expected);

        let chosen = reference_chance(board.shift(out.direction), 2);
        assert!((chosen - expected).abs() < 1e-9, "{} is not a best move", out.direction);
    }
}

#[test]
fn pruning_never_overestimates_static_bounds() {
    for board in positions() {
        let out = Bepp::new().search(board, 3, Duration::from_secs(60), bounded_eval);
        assert!((expectimax::V_MIN..=expectimax::V_MAX).contains(&out.value));
        assert!(board.apply(out.direction).moved);
    }
}

#[test]
fn branch_evals_agree_with_reference() {
    let cfg = BeppConfig { prob_cutoff: 0.0, beam_width: 4 };
    for board in positions().into_iter().take(4) {
        let mut search = Bepp::with_config(cfg);
        let branches = search.branch_evals(board, 2, Duration::from_secs(60));
        for be in branches {
            let out = board.apply(be.dir);
            assert_eq!(be.legal, out.moved);
            if be.legal {
                let expected = reference_chance(out.board, 1);
                assert!((be.ev - expected).abs() < 1e-9, "{}: {} vs {}", be.dir, be.ev, expected);
            }
        }
    }
}

#[test]
fn custom_evaluation_steers_the_search() {
    // Rewards the top-right corner; the default evaluation sees Down and Right as equal.
    let top_right = |b: Board| b.exponent(3) as f64 / 15.0;
    let b = Board::from_exponents([3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(expectimax::best_move_with(b, 1, 1000, top_right), Move::Right);
    assert_eq!(expectimax::best_move(b, 1, 1000), Move::Down);
}

#[test]
fn set_params_only_affects_its_engine() {
    let mut a = Bepp::new();
    let b = Bepp::new();
    a.set_params(Some(0.3), Some(1));
    assert_eq!(a.config(), BeppConfig { prob_cutoff: 0.3, beam_width: 1 });
    assert_eq!(b.config(), BeppConfig::default());
}
