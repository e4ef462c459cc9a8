use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::Parser;

use klotski::puzzle::Puzzle;
use klotski::render;
use klotski::search::{search, Objective, Options, Outcome};

/// Sliding-block puzzle solver.
///
/// Reads a puzzle description and searches for a move sequence that is
/// optimal in single-cell steps (default) or in rectilinear runs.
#[derive(Debug, Parser)]
#[command(name = "klotski", version)]
struct Args {
    /// Puzzle description file (JSON)
    puzzle: PathBuf,

    /// Search layers in parallel (default)
    #[arg(short, long, conflicts_with = "no_parallel")]
    parallel: bool,

    /// Search on a single thread
    #[arg(short = 'n', long)]
    no_parallel: bool,

    /// Minimize rectilinear runs instead of steps
    #[arg(short = 'r', long, conflicts_with = "steps")]
    runs: bool,

    /// Minimize single-cell steps (default)
    #[arg(short = 't', long)]
    steps: bool,

    /// Give up after completing layer N
    #[arg(short = 's', long, value_name = "N")]
    stop: Option<u32>,

    /// Maximum number of workers (default: all cores)
    #[arg(short = 'x', long, value_name = "N")]
    workers: Option<usize>,

    /// Minimum frontier slice worth a worker of its own
    #[arg(short = 'd', long, value_name = "N", default_value_t = 200)]
    slice: usize,

    /// Validate and print the puzzle, then exit
    #[arg(short = 'c', long)]
    check: bool,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let done = matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion);
            let _ = err.print();
            process::exit(if done { 0 } else { 11 });
        }
    };
    process::exit(run(args));
}

fn run(args: Args) -> i32 {
    let puzzle = match Puzzle::from_path(&args.puzzle) {
        Ok(puzzle) => puzzle,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return 11;
        }
    };

    let opts = Options {
        objective: if args.runs {
            Objective::Runs
        } else {
            Objective::Steps
        },
        parallel: !args.no_parallel,
        stop_steps: args.stop,
        max_workers: args.workers.unwrap_or_else(num_cpus::get).max(1),
        min_slice: args.slice.max(1),
    };

    render::print_options(&opts, &args.puzzle.display().to_string());
    render::print_puzzle(&puzzle);
    if args.check {
        return 0;
    }

    // size the pool once, up front; workers never outnumber it
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.max_workers)
        .build_global();

    match search(&puzzle, &opts) {
        Ok(Outcome::Solved(mcr)) => {
            render::print_answer(&puzzle, &mcr.hist);
            0
        }
        Ok(Outcome::Stopped) => {
            println!("stopped at the layer cutoff without an answer");
            3
        }
        Ok(Outcome::Exhausted) => {
            println!("no answer: the goal is not reachable");
            1
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            11
        }
    }
}
