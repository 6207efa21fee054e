//! Random-playout move selection.
//!
//! Cheaper than [`crate::expectimax::Bepp`]: each legal direction is scored by
//! the average number of empty cells left after `playouts` short random games.
//! Playouts are independent, so they run on the rayon pool; each one owns a
//! `StdRng` seeded from the caller's generator, which keeps results
//! reproducible for a seeded caller regardless of thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::engine::{self, Board, Move};
use crate::expectimax::{BranchEval, DEFAULT_MOVE};

pub const DEFAULT_ROLLOUT_DEPTH: u32 = 3;
pub const DEFAULT_PLAYOUTS: usize = 64;

/// Order in which equal playout values are resolved: horizontal moves first.
pub const TIE_ORDER: [Move; 4] = [Move::Left, Move::Right, Move::Up, Move::Down];

/// - `depth`: random plies played after the candidate move.
/// - `playouts`: random games averaged per direction (0 is treated as 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutConfig {
    pub depth: u32,
    pub playouts: usize,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self { depth: DEFAULT_ROLLOUT_DEPTH, playouts: DEFAULT_PLAYOUTS }
    }
}

pub struct RolloutEngine {
    cfg: RolloutConfig,
}

impl RolloutEngine {
    pub fn new() -> Self {
        Self::with_config(RolloutConfig::default())
    }

    pub fn with_config(cfg: RolloutConfig) -> Self {
        engine::new();
        Self { cfg }
    }

    #[inline]
    pub fn config(&self) -> RolloutConfig {
        self.cfg
    }

    /// Direction with the highest average playout value.
    ///
    /// Ties go to the earliest direction in [`TIE_ORDER`]; a board with no
    /// legal move yields [`DEFAULT_MOVE`].
    ///
    /// ```
    /// use bepp_2048::engine::{Board, Move};
    /// use bepp_2048::rollout::{RolloutConfig, RolloutEngine};
    /// use rand::{rngs::StdRng, SeedableRng};
    ///
    /// let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    /// let engine = RolloutEngine::with_config(RolloutConfig { depth: 0, playouts: 8 });
    /// assert_eq!(engine.best_move(b, &mut StdRng::seed_from_u64(1)), Move::Left);
    /// ```
    pub fn best_move<R: Rng + ?Sized>(&self, board: Board, rng: &mut R) -> Move {
        let evals = self.branch_evals(board, rng);
        BranchEval::best(&TIE_ORDER.map(|dir| evals[dir.index()])).map_or(DEFAULT_MOVE, |b| b.dir)
    }

    /// Average playout value of every direction, in `[Up, Down, Left, Right]`
    /// order, with no-op moves marked `legal=false`.
    pub fn branch_evals<R: Rng + ?Sized>(&self, board: Board, rng: &mut R) -> [BranchEval; 4] {
        let playouts = self.cfg.playouts.max(1);
        let depth = self.cfg.depth;

        // Seeds are drawn up front, in direction order, so the parallel part
        // never touches the caller's generator.
        let jobs: Vec<(usize, Board, Vec<u64>)> = Move::ALL
            .iter()
            .enumerate()
            .filter_map(|(i, &dir)| {
                let out = board.apply(dir);
                out.moved.then_some((i, out.board))
            })
            .map(|(i, child)| (i, child, (0..playouts).map(|_| rng.gen()).collect()))
            .collect();

        let values: Vec<(usize, f64)> = jobs
            .par_iter()
            .map(|(i, child, seeds)| {
                let total: u64 = seeds
                    .par_iter()
                    .map(|&seed| playout(*child, depth, &mut StdRng::seed_from_u64(seed)) as u64)
                    .sum();
                (*i, total as f64 / seeds.len() as f64)
            })
            .collect();

        let mut out = Move::ALL.map(BranchEval::illegal);
        for (i, ev) in values {
            out[i] = BranchEval { dir: Move::ALL[i], ev, legal: true };
        }
        out
    }
}

impl Default for RolloutEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot rollout selection with `depth` random plies and `k` playouts.
pub fn fast_best_move<R: Rng + ?Sized>(board: Board, depth: u32, k: usize, rng: &mut R) -> Move {
    RolloutEngine::with_config(RolloutConfig { depth, playouts: k }).best_move(board, rng)
}

/// Play up to `depth` uniformly random directions, spawning after each move
/// that changes the board, and return the final empty-cell count.
fn playout<R: Rng + ?Sized>(start: Board, depth: u32, rng: &mut R) -> u32 {
    let mut board = start;
    for _ in 0..depth {
        let dir = Move::ALL[rng.gen_range(0..4)];
        let out = board.apply(dir);
        if out.moved {
            board = out.board.with_random_tile(rng);
        } else if !board.can_move() {
            break;
        }
    }
    board.count_empty()
}
