//! Tilefall entry point
//!
//! Headless driver: runs sessions of the simulation on a synthetic frame
//! clock, optionally under the autoplay agent, and reports the outcome. The
//! simulation itself never touches the wall clock, so runs with the same
//! seed and inputs are reproducible.

use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};

use tilefall::autoplay::{Autoplayer, Decision};
use tilefall::consts::FPS;
use tilefall::sim::{Board, Mode};

#[derive(Debug, Parser)]
#[command(
    name = "tilefall",
    version,
    about = "Falling-tile merge puzzle, headless driver"
)]
struct Args {
    /// RNG seed for the spawn sequence
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Difficulty mode
    #[arg(long, value_enum, default_value = "easy")]
    mode: ModeArg,

    /// Stop after this many frames if the session is still running
    #[arg(long, default_value_t = 200_000)]
    frames: u64,

    /// Let the autoplay agent drive the session
    #[arg(long)]
    autoplay: bool,

    /// Print the final board snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Easy,
    Hard,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Easy => Mode::Easy,
            ModeArg::Hard => Mode::Hard,
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let frame_dt = Duration::from_secs(1) / FPS;
    let mut board = Board::new(args.mode.into(), args.seed, start);
    let mut agent = Autoplayer::new();

    let mut now = start;
    for frame in 0..args.frames {
        if args.autoplay {
            match agent.next_command(&board) {
                Decision::Command(mv) => {
                    if board.apply_move(mv) {
                        agent.command_taken();
                    }
                }
                Decision::Idle => {}
                Decision::Error(err) => {
                    log::debug!("autoplay skipped frame {frame}: {err}");
                }
            }
        }
        board.update(now);
        if board.has_won() {
            log::info!("won after {} frames", board.frame_count());
            break;
        }
        if board.has_lost() {
            log::info!("lost after {} frames", board.frame_count());
            break;
        }
        now += frame_dt;
    }

    if args.json {
        match serde_json::to_string_pretty(&board.snapshot()) {
            Ok(json) => println!("{json}"),
            Err(err) => log::error!("snapshot serialization failed: {err}"),
        }
    } else {
        let outcome = if board.has_won() {
            "WIN"
        } else if board.has_lost() {
            "LOSS"
        } else {
            "STOPPED"
        };
        println!(
            "{outcome} | frames {} score {} best {} highest {}",
            board.frame_count(),
            board.score(),
            board.best_score(),
            board.highest_value(),
        );
    }
}
