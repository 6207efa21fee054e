//! Expectimax search with Bounded Expectation & Probability Pruning (BEPP).
//!
//! [`Bepp`] runs iterative deepening over [`Board`] values. At the root only the
//! `beam_width` best-looking moves (by static evaluation) are searched. Chance
//! nodes skip spawns whose tile probability (0.9 for a 2, 0.1 for a 4) is below
//! `prob_cutoff`, using the static value of the pre-spawn board instead, while
//! still weighting every outcome by its share of the empty cells. They stop
//! enumerating once the best value still reachable cannot beat the best
//! sibling move.
//!
//! Leaf values must stay inside `[V_MIN, V_MAX]` for that bound to hold;
//! [`bounded_eval`] does.
//!
//! Quick start
//! ```
//! use std::time::Duration;
//! use bepp_2048::engine::{Board, Move};
//! use bepp_2048::expectimax::{Bepp, BeppConfig};
//!
//! let b = Board::from_exponents([1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
//! let mut search = Bepp::with_config(BeppConfig::default());
//! assert_eq!(search.best_move(b, 2, Duration::from_millis(1000)), Move::Left);
//! ```

use std::time::Duration;

use crate::engine::{Board, Move};

mod cache;
pub mod heuristic;
mod search;

pub use heuristic::{bounded_eval, V_MAX, V_MIN};
pub use search::Bepp;

/// Returned when no direction can be searched (terminal board).
pub const DEFAULT_MOVE: Move = Move::Up;

pub const DEFAULT_PROB_CUTOFF: f64 = 0.02;
pub const DEFAULT_BEAM_WIDTH: usize = 4;

/// Knobs for a BEPP search. Each [`Bepp`] owns its copy, so changing one
/// engine's parameters never affects another search.
///
/// - `prob_cutoff`: tiles that spawn less often than this (a 4 spawns with
///   probability 0.1) are not expanded. The number of empty cells plays no part.
/// - `beam_width`: number of root moves kept after ranking by static value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeppConfig {
    pub prob_cutoff: f64,
    pub beam_width: usize,
}

impl Default for BeppConfig {
    fn default() -> Self {
        Self { prob_cutoff: DEFAULT_PROB_CUTOFF, beam_width: DEFAULT_BEAM_WIDTH }
    }
}

impl BeppConfig {
    /// Return a copy with the given parameters replaced.
    ///
    /// The cutoff is clamped to `[0, 1]` (NaN is ignored) and a beam width of
    /// zero is ignored.
    ///
    /// ```
    /// use bepp_2048::expectimax::BeppConfig;
    /// let cfg = BeppConfig::default().with_params(Some(1.5), Some(0));
    /// assert_eq!(cfg.prob_cutoff, 1.0);
    /// assert_eq!(cfg.beam_width, BeppConfig::default().beam_width);
    /// ```
    pub fn with_params(self, prob_cutoff: Option<f64>, beam_width: Option<usize>) -> Self {
        let mut cfg = self;
        if let Some(p) = prob_cutoff.filter(|p| !p.is_nan()) {
            cfg.prob_cutoff = p.clamp(0.0, 1.0);
        }
        if let Some(k) = beam_width.filter(|&k| k >= 1) {
            cfg.beam_width = k;
        }
        cfg
    }
}

/// Result of one top-level search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    pub direction: Move,
    /// Expected value of `direction` at `depth`.
    pub value: f64,
    /// Deepest iteration that produced a result (0 if none did).
    pub depth: u32,
    /// False when the deadline passed while `depth` was being searched.
    pub completed: bool,
}

/// Per-branch expected value at the root.
///
/// - `ev` is the expected value for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

impl BranchEval {
    pub(crate) fn illegal(dir: Move) -> Self {
        BranchEval { dir, ev: 0.0, legal: false }
    }

    /// Best legal branch, ties going to the earliest direction.
    pub fn best(branches: &[BranchEval]) -> Option<BranchEval> {
        branches.iter().filter(|b| b.legal).fold(None, |best: Option<BranchEval>, &b| match best {
            Some(cur) if cur.ev >= b.ev => Some(cur),
            _ => Some(b),
        })
    }
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
    pub cache_hits: u64,
    pub cache_entries: u64,
    /// Spawn outcomes replaced by the pre-spawn static value.
    pub prob_pruned: u64,
    /// Chance nodes abandoned because their upper bound fell below alpha.
    pub bound_cutoffs: u64,
}

/// Pick a move for `board` with default parameters and [`bounded_eval`].
pub fn best_move(board: Board, max_depth: u32, time_budget_ms: u64) -> Move {
    Bepp::new().best_move(board, max_depth, Duration::from_millis(time_budget_ms))
}

/// Like [`best_move`] with a caller-supplied evaluation in `[V_MIN, V_MAX]`.
pub fn best_move_with<F>(board: Board, max_depth: u32, time_budget_ms: u64, eval: F) -> Move
where
    F: Fn(Board) -> f64,
{
    Bepp::new()
        .search(board, max_depth, Duration::from_millis(time_budget_ms), eval)
        .direction
}
