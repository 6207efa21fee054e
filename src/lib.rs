//! bepp-2048: a bit-packed 2048 engine with a probability-pruned Expectimax player
//!
//! This crate provides:
//! - A compact `Board` type backed by precomputed row tables (`engine` module)
//! - A `Game` wrapper tracking score and win/loss (`game` module)
//! - BEPP expectimax search with iterative deepening, a root beam and a
//!   transposition cache (`expectimax` module)
//! - A cheap random-playout move selector (`rollout` module)
//! - Per-move records and a binary trace format (`trace` module)
//!
//! Quick start:
//! ```
//! use std::time::Duration;
//! use bepp_2048::engine::{self as GameEngine, Move};
//! use bepp_2048::expectimax::Bepp;
//! use bepp_2048::game::Game;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // One-time table init
//! GameEngine::new();
//!
//! // Deterministic game with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut game = Game::new(&mut rng);
//! let mut search = Bepp::new();
//! let dir: Move = search.best_move(game.board(), 2, Duration::from_millis(50));
//! let (moved, _gain) = game.play(dir, true, &mut rng);
//! assert!(moved);
//! ```
pub mod engine;
pub mod expectimax;
pub mod game;
pub mod rollout;
pub mod trace;
