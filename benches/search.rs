use bepp_2048::engine::{self as GameEngine, Board, Move};
use bepp_2048::expectimax::{Bepp, BeppConfig};
use bepp_2048::rollout::{RolloutConfig, RolloutEngine};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use rayon::ThreadPoolBuilder;
use std::hint::black_box;
use std::time::Duration;

fn warm() {
    GameEngine::new();
}

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(7777);
    let mut boards = Vec::new();
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    for i in 0..32 {
        let dir = Move::ALL[i % 4];
        let out = b.apply(dir);
        if out.moved {
            b = out.board.with_random_tile(&mut rng);
        }
        boards.push(b);
    }
    boards
}

fn bench_bepp(c: &mut Criterion) {
    warm();
    let boards = corpus();
    // Generous budget so every iteration reaches the full depth.
    let budget = Duration::from_secs(10);

    let mut search = Bepp::new();
    c.bench_function("bepp/depth3_default", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards {
                acc += search.search(bd, 3, budget, bepp_2048::expectimax::bounded_eval).value;
            }
            black_box(acc)
        })
    });

    let mut exhaustive = Bepp::with_config(BeppConfig { prob_cutoff: 0.0, beam_width: 4 });
    c.bench_function("bepp/depth3_unpruned", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards {
                acc += exhaustive.search(bd, 3, budget, bepp_2048::expectimax::bounded_eval).value;
            }
            black_box(acc)
        })
    });

    c.bench_function("bepp/branch_evals_depth2", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards {
                for be in search.branch_evals(bd, 2, budget) {
                    if be.legal {
                        acc += be.ev;
                    }
                }
            }
            black_box(acc)
        })
    });
}

fn bench_rollout(c: &mut Criterion) {
    warm();
    // Pin a small pool for stability
    let pool = ThreadPoolBuilder::new().num_threads(4).build().expect("thread pool");
    let boards = corpus();
    let engine = RolloutEngine::with_config(RolloutConfig::default());
    c.bench_function("rollout/best_move_k64", |bch| {
        bch.iter(|| {
            pool.install(|| {
                let mut rng = StdRng::seed_from_u64(13);
                let mut acc = 0usize;
                for &bd in &boards {
                    acc ^= engine.best_move(bd, &mut rng).index();
                }
                black_box(acc)
            })
        })
    });
}

fn bench_e2e(c: &mut Criterion) {
    warm();
    let mut search = Bepp::new();
    c.bench_function("e2e/bepp_64_moves", |bch| {
        bch.iter(|| {
            let mut rng = StdRng::seed_from_u64(13);
            let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
            let mut steps = 0;
            while steps < 64 && !b.is_game_over() {
                let dir = search.best_move(b, 2, Duration::from_millis(40));
                b = b.make_move(dir, &mut rng);
                steps += 1;
            }
            black_box((b.raw(), steps))
        })
    });
}

criterion_group!(search, bench_bepp, bench_rollout, bench_e2e);
criterion_main!(search);
