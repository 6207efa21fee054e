use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use bepp_2048::engine::{self as GameEngine, Board, Move};
use bepp_2048::expectimax::{Bepp, BeppConfig};
use bepp_2048::game::Game;
use bepp_2048::rollout::{RolloutConfig, RolloutEngine};
use bepp_2048::trace::{self, MoveLog, MoveRecord, TraceLog, TraceMeta};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    GameEngine::new();

    let settings = Settings::resolve(&args);
    log::info!("playing {} game(s) with {}", args.games, settings.describe());

    let start = Instant::now();
    let start_wall = trace::now_unix_seconds();
    let base_seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());

    // Status line: global moves/sec via indicatif
    let moves = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let mut status_handle: Option<thread::JoinHandle<()>> = None;
    let mut pb_opt: Option<ProgressBar> = None;
    if !args.quiet {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} | Moves: {msg}")?
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        let pb_bg = pb.clone();
        let moves_for_status = moves.clone();
        let stop_flag = stop.clone();
        status_handle = Some(thread::spawn(move || {
            let start = Instant::now();
            while !stop_flag.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(250));
                let m = moves_for_status.load(Ordering::Relaxed);
                let rate = m as f64 / start.elapsed().as_secs_f64().max(1e-6);
                pb_bg.set_message(format!("{m} | moves/sec: {rate:.1}"));
            }
        }));
        pb_opt = Some(pb);
    }

    // Every game owns its board and random stream, so games run independently.
    let record = args.trace.is_some();
    let results: Vec<(GameSummary, Option<TraceLog>)> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let seed = base_seed.wrapping_add(i as u64);
            play_game(&settings, i as u64, seed, args.steps, record, &moves)
        })
        .collect();

    stop.store(true, Ordering::Relaxed);
    if let Some(h) = status_handle {
        let _ = h.join();
    }
    if let Some(pb) = pb_opt {
        pb.finish_and_clear();
    }
    let elapsed = start.elapsed().as_secs_f64().max(1e-6);

    let mut merged = TraceLog::new(TraceMeta {
        start_unix_s: start_wall,
        elapsed_s: elapsed as f32,
        engine: Some(settings.describe()),
    });
    if let [(summary, _)] = results.as_slice() {
        if !args.quiet {
            println!("{}", summary.final_board);
        }
    }
    let scores: Vec<u64> = results.iter().map(|(s, _)| s.score).collect();

    for (summary, log) in results {
        log::info!(
            "game {}: score {} | highest tile {} | moves {} | {}",
            summary.game_id,
            summary.score,
            summary.highest_tile,
            summary.moves,
            if summary.won { "won" } else { "lost" }
        );
        if let Some(log) = log {
            merged.extend(log);
        }
    }

    let total_moves = moves.load(Ordering::Relaxed);
    if !scores.is_empty() {
        let mean = scores.iter().sum::<u64>() as f64 / scores.len() as f64;
        let max = scores.iter().copied().max().unwrap_or(0);
        let min = scores.iter().copied().min().unwrap_or(0);
        println!(
            "Games: {} | moves/sec: {:.1} | mean score: {:.1} | max: {} | min: {}",
            scores.len(),
            total_moves as f64 / elapsed,
            mean,
            max,
            min
        );
    }

    if let Some(out_path) = &args.trace {
        merged
            .write_to_path(out_path)
            .with_context(|| format!("failed to write trace to {}", out_path.display()))?;
        log::info!("wrote {} records to {}", merged.records.len(), out_path.display());
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(name = "bepp-2048", about = "Headless 2048 player using BEPP expectimax or random rollouts")]
struct Args {
    /// Move selector; overrides the one implied by --preset
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Parameter bundle; explicit flags below take precedence
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// Maximum search depth (BEPP) or playout length (rollout)
    #[arg(long)]
    depth: Option<u32>,

    /// Time budget per move in milliseconds (BEPP only)
    #[arg(long)]
    time_ms: Option<u64>,

    /// Root moves kept after static ranking (BEPP only)
    #[arg(long)]
    beam: Option<usize>,

    /// Spawn outcomes less likely than this are not expanded (BEPP only)
    #[arg(long)]
    prob: Option<f64>,

    /// Random playouts per direction (rollout only)
    #[arg(long, default_value_t = 64)]
    playouts: usize,

    /// Seed for the first game; game i uses seed + i
    #[arg(long)]
    seed: Option<u64>,

    /// Stop each game after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Number of games to play, in parallel
    #[arg(long, default_value_t = 1)]
    games: usize,

    /// Write a binary per-move trace of every game to this path
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Suppress status line and board output
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineKind {
    Bepp,
    Rollout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    Default,
    Turbo,
    Rollout,
}

#[derive(Debug, Clone)]
struct Settings {
    engine: EngineKind,
    depth: u32,
    time_ms: u64,
    bepp: BeppConfig,
    playouts: usize,
}

impl Settings {
    fn resolve(args: &Args) -> Self {
        let (engine, depth, time_ms, beam, prob) = match args.preset {
            Preset::Default => (EngineKind::Bepp, 3, 60, 2, 0.04),
            Preset::Turbo => (EngineKind::Bepp, 2, 40, 1, 0.10),
            Preset::Rollout => (EngineKind::Rollout, 3, 60, 2, 0.04),
        };
        let bepp = BeppConfig::default().with_params(Some(args.prob.unwrap_or(prob)), Some(args.beam.unwrap_or(beam)));
        Settings {
            engine: args.engine.unwrap_or(engine),
            depth: args.depth.unwrap_or(depth),
            time_ms: args.time_ms.unwrap_or(time_ms),
            bepp,
            playouts: args.playouts,
        }
    }

    /// Search that labels trace records; shares the player's BEPP parameters.
    fn reference_search(&self) -> Bepp {
        Bepp::with_config(self.bepp)
    }

    fn describe(&self) -> String {
        match self.engine {
            EngineKind::Bepp => format!(
                "bepp depth={} time_ms={} beam={} prob={}",
                self.depth, self.time_ms, self.bepp.beam_width, self.bepp.prob_cutoff
            ),
            EngineKind::Rollout => format!("rollout depth={} playouts={}", self.depth, self.playouts),
        }
    }
}

enum Player {
    Bepp { search: Bepp, depth: u32, budget: Duration },
    Rollout(RolloutEngine),
}

impl Player {
    fn new(settings: &Settings) -> Self {
        match settings.engine {
            EngineKind::Bepp => Player::Bepp {
                search: Bepp::with_config(settings.bepp),
                depth: settings.depth,
                budget: Duration::from_millis(settings.time_ms),
            },
            EngineKind::Rollout => Player::Rollout(RolloutEngine::with_config(RolloutConfig {
                depth: settings.depth,
                playouts: settings.playouts,
            })),
        }
    }

    fn choose<R: Rng + ?Sized>(&mut self, board: Board, rng: &mut R) -> Move {
        match self {
            Player::Bepp { search, depth, budget } => search.best_move(board, *depth, *budget),
            Player::Rollout(engine) => engine.best_move(board, rng),
        }
    }
}

struct GameSummary {
    game_id: u64,
    score: u64,
    highest_tile: u32,
    moves: u64,
    won: bool,
    final_board: Board,
}

fn play_game(
    settings: &Settings,
    game_id: u64,
    seed: u64,
    steps: Option<u64>,
    record: bool,
    moves: &AtomicU64,
) -> (GameSummary, Option<TraceLog>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut game = Game::new(&mut rng);
    let mut player = Player::new(settings);
    let mut reference = settings.reference_search();
    let mut log = record.then(|| TraceLog::new(TraceMeta::started_now(Some(settings.describe()))));

    let mut move_count: u64 = 0;
    while !game.is_over() {
        if steps.is_some_and(|limit| move_count >= limit) {
            break;
        }
        let dir = player.choose(game.board(), &mut rng);
        if let Some(log) = log.as_mut() {
            log.record(MoveRecord::capture(&mut reference, game_id, move_count as u32, &game, dir));
        }
        let (moved, _) = game.play(dir, true, &mut rng);
        if !moved {
            log::warn!("game {game_id}: {dir} does not change the board, stopping");
            break;
        }
        move_count += 1;
        moves.fetch_add(1, Ordering::Relaxed);
    }

    let summary = GameSummary {
        game_id,
        score: game.score(),
        highest_tile: game.board().highest_tile(),
        moves: move_count,
        won: game.is_won(),
        final_board: game.board(),
    };
    (summary, log)
}
