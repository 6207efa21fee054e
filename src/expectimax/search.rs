use std::cmp::Ordering;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::engine::{self, Board, Move};

use super::cache::{Node, TranspositionCache};
use super::heuristic::{bounded_eval, V_MAX};
use super::{BeppConfig, BranchEval, SearchOutcome, SearchStats, DEFAULT_MOVE};

/// Spawned exponent and its probability, in expansion order.
const TILE_OUTCOMES: [(u8, f64); 2] = [(1, 0.9), (2, 0.1)];

/// Single-threaded BEPP expectimax search.
///
/// Every call builds a fresh transposition cache and deadline; only the
/// configuration and the stats of the last call persist on the engine.
pub struct Bepp {
    cfg: BeppConfig,
    stats: SearchStats,
}

impl Bepp {
    pub fn new() -> Self {
        Self::with_config(BeppConfig::default())
    }

    pub fn with_config(cfg: BeppConfig) -> Self {
        engine::new();
        Self { cfg, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> BeppConfig {
        self.cfg
    }

    /// Change the cutoff and/or beam width for subsequent searches.
    ///
    /// See [`BeppConfig::with_params`] for how out-of-range values are handled.
    pub fn set_params(&mut self, prob_cutoff: Option<f64>, beam_width: Option<usize>) {
        self.cfg = self.cfg.with_params(prob_cutoff, beam_width);
    }

    /// Best direction for `board` using [`bounded_eval`] at the leaves.
    ///
    /// Returns [`DEFAULT_MOVE`] when no direction changes the board.
    #[inline]
    pub fn best_move(&mut self, board: Board, max_depth: u32, budget: Duration) -> Move {
        self.search(board, max_depth, budget, bounded_eval).direction
    }

    /// Iterative-deepening search from depth 1 up to `max_depth`.
    ///
    /// Never runs past `budget` by more than one node: once the deadline
    /// passes every node returns its static value, and the result of the
    /// deepest iteration that got anywhere is reported.
    pub fn search<F>(&mut self, board: Board, max_depth: u32, budget: Duration, eval: F) -> SearchOutcome
    where
        F: Fn(Board) -> f64,
    {
        let started = Instant::now();
        let mut ctx = SearchContext::new(self.cfg, &eval, started + budget);
        let children = beam_children(board, self.cfg.beam_width, &eval);
        // Until an iteration finishes a child, fall back to the top-ranked move.
        let mut outcome = match children.first() {
            Some(&(direction, child)) => SearchOutcome { direction, value: eval(child), depth: 0, completed: false },
            None => SearchOutcome { direction: DEFAULT_MOVE, value: eval(board), depth: 0, completed: false },
        };

        for depth in 1..=max_depth.max(1) {
            if ctx.expired() {
                break;
            }
            let mut best: Option<(Move, f64)> = None;
            let mut alpha = f64::NEG_INFINITY;
            for &(dir, child) in &children {
                let value = ctx.expectimax(child, depth - 1, Node::Chance, alpha, f64::INFINITY);
                if best.map_or(true, |(_, best_value)| value > best_value) {
                    best = Some((dir, value));
                }
                alpha = alpha.max(value);
            }
            let Some((direction, value)) = best else { break };
            outcome = SearchOutcome { direction, value, depth, completed: !ctx.timed_out };
            debug!(
                "bepp depth {depth}: {direction} value={value:.5} nodes={} elapsed={:?}",
                ctx.stats.nodes,
                started.elapsed()
            );
            if ctx.timed_out {
                break;
            }
        }

        self.finish(ctx);
        outcome
    }

    /// Expected value of every direction at a fixed `depth`, no beam.
    ///
    /// Returns a fixed array in order: `[Up, Down, Left, Right]` and marks
    /// illegal moves as `legal=false`.
    pub fn branch_evals(&mut self, board: Board, depth: u32, budget: Duration) -> [BranchEval; 4] {
        let eval = bounded_eval;
        let mut ctx = SearchContext::new(self.cfg, &eval, Instant::now() + budget);
        let mut out = Move::ALL.map(BranchEval::illegal);
        for (slot, dir) in out.iter_mut().zip(Move::ALL) {
            let moved = board.apply(dir);
            if moved.moved {
                let ev = ctx.expectimax(moved.board, depth.max(1) - 1, Node::Chance, f64::NEG_INFINITY, f64::INFINITY);
                *slot = BranchEval { dir, ev, legal: true };
            }
        }
        self.finish(ctx);
        out
    }

    /// Statistics collected from the last call to [`Self::search`] or
    /// [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) {
        self.stats = SearchStats::default();
    }

    fn finish<F>(&mut self, ctx: SearchContext<'_, F>) {
        let peak_nodes = self.stats.peak_nodes.max(ctx.stats.nodes);
        self.stats = SearchStats { peak_nodes, cache_entries: ctx.cache.len() as u64, ..ctx.stats };
    }
}

impl Default for Bepp {
    fn default() -> Self {
        Self::new()
    }
}

/// Legal root moves ranked by static value, best first, keeping `beam_width`.
///
/// Equal values keep the fixed direction order.
fn beam_children<F>(board: Board, beam_width: usize, eval: &F) -> Vec<(Move, Board)>
where
    F: Fn(Board) -> f64,
{
    let mut ranked: Vec<(f64, Move, Board)> = Move::ALL
        .iter()
        .filter_map(|&dir| {
            let out = board.apply(dir);
            out.moved.then(|| (eval(out.board), dir, out.board))
        })
        .collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    ranked.truncate(beam_width.max(1));
    ranked.into_iter().map(|(_, dir, child)| (dir, child)).collect()
}

struct SearchContext<'a, F> {
    cfg: BeppConfig,
    eval: &'a F,
    deadline: Instant,
    cache: TranspositionCache,
    stats: SearchStats,
    timed_out: bool,
}

impl<'a, F> SearchContext<'a, F>
where
    F: Fn(Board) -> f64,
{
    fn new(cfg: BeppConfig, eval: &'a F, deadline: Instant) -> Self {
        Self {
            cfg,
            eval,
            deadline,
            cache: TranspositionCache::new(),
            stats: SearchStats::default(),
            timed_out: false,
        }
    }

    #[inline]
    fn expired(&mut self) -> bool {
        if !self.timed_out && Instant::now() >= self.deadline {
            self.timed_out = true;
            trace!("bepp deadline reached after {} nodes", self.stats.nodes);
        }
        self.timed_out
    }

    /// Values computed after the deadline are static fallbacks and never cached.
    #[inline]
    fn store(&mut self, node: Node, board: Board, depth: u32, value: f64) {
        if !self.timed_out {
            self.cache.store(node, board, depth, value);
        }
    }

    fn expectimax(&mut self, board: Board, depth: u32, node: Node, alpha: f64, beta: f64) -> f64 {
        self.stats.nodes += 1;
        if self.expired() {
            return (self.eval)(board);
        }
        // Leaves are cheaper to evaluate than to look up, and must not pick
        // up a deeper entry for the same board.
        if depth == 0 || !board.can_move() {
            return (self.eval)(board);
        }
        if let Some(value) = self.cache.lookup(node, board, depth) {
            self.stats.cache_hits += 1;
            return value;
        }
        match node {
            Node::Max => self.evaluate_max(board, depth, alpha, beta),
            Node::Chance => self.evaluate_chance(board, depth, alpha, beta),
        }
    }

    fn evaluate_max(&mut self, board: Board, depth: u32, mut alpha: f64, beta: f64) -> f64 {
        let mut best = f64::NEG_INFINITY;
        let mut cut = false;
        for dir in Move::ALL {
            let out = board.apply(dir);
            if !out.moved {
                continue;
            }
            let value = self.expectimax(out.board, depth - 1, Node::Chance, alpha, beta);
            best = best.max(value);
            alpha = alpha.max(value);
            if alpha >= beta {
                cut = true;
                break;
            }
        }
        if !cut {
            self.store(Node::Max, board, depth, best);
        }
        best
    }

    fn evaluate_chance(&mut self, board: Board, depth: u32, alpha: f64, beta: f64) -> f64 {
        let empty = board.count_empty();
        if empty == 0 {
            let value = (self.eval)(board);
            self.store(Node::Chance, board, depth, value);
            return value;
        }

        let cell_share = 1.0 / empty as f64;
        let mut static_value: Option<f64> = None;
        let mut running = 0.0;
        let mut mass = 0.0;
        let mut cut = false;

        'cells: for idx in board.empty_cells() {
            for (exponent, tile_prob) in TILE_OUTCOMES {
                // Pruning looks at the spawn's own chance; the weight is per cell.
                let prob = tile_prob * cell_share;
                if tile_prob < self.cfg.prob_cutoff {
                    let eval = self.eval;
                    running += prob * *static_value.get_or_insert_with(|| eval(board));
                    self.stats.prob_pruned += 1;
                } else {
                    // Each spawn starts a fresh max node: alpha belongs to the parent's siblings.
                    let child = board.with_tile(idx, exponent);
                    running += prob * self.expectimax(child, depth - 1, Node::Max, f64::NEG_INFINITY, beta);
                }
                mass += prob;
                if running + (1.0 - mass) * V_MAX < alpha {
                    self.stats.bound_cutoffs += 1;
                    cut = true;
                    break 'cells;
                }
            }
        }

        let expected = if mass > 0.0 { running / mass } else { (self.eval)(board) };
        // A cut value only proves the node loses to alpha; it is not reusable.
        if !cut {
            self.store(Node::Chance, board, depth, expected);
        }
        expected
    }
}
