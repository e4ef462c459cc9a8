//! Layered search over canonical configurations.
//!
//! Both objectives run the same outer loop: expand every state of the
//! current layer, key the successors by fingerprint, fold the keys into the
//! memo and move on.  Breadth-first layering is what makes the first goal
//! hit optimal: under the step metric one layer is one unit move, under
//! the rectilinear metric one layer is one piece run.
//!
//! Large layers are split into contiguous slices and expanded by parallel
//! workers.  Workers share the puzzle and the memo read-only and return
//! private results; the driver merges them in worker order, so a run is
//! reproducible for a fixed worker count and slice size.

pub mod runs;
pub mod steps;

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Result};
use rayon::prelude::*;

use crate::fingerprint::{fingerprint, Schash};
use crate::gameplay::{BitBoard, Colist, Dir, Move};
use crate::progress::Progress;
use crate::puzzle::Puzzle;

/// One node of the search: how we got here, where every piece is, and how
/// many rectilinear runs the history spends.
#[derive(Clone, Debug)]
pub struct Mcr {
    /// Move history, starting with [`Move::SENTINEL`].  Its length minus
    /// one is the step count.
    pub hist: Vec<Move>,
    pub colist: Colist,
    pub rlc: u32,
}

impl Mcr {
    pub fn steps(&self) -> usize {
        self.hist.len() - 1
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Objective {
    /// Minimize single-cell moves; rectilinear runs break ties.
    Steps,
    /// Minimize rectilinear runs; step counts break ties.
    Runs,
}

/// Search settings, threaded read-only through the driver and workers.
#[derive(Clone, Debug)]
pub struct Options {
    pub objective: Objective,
    pub parallel: bool,
    /// Stop after completing this many layers.
    pub stop_steps: Option<u32>,
    pub max_workers: usize,
    /// Smallest frontier slice worth giving a worker of its own.
    pub min_slice: usize,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            objective: Objective::Steps,
            parallel: true,
            stop_steps: None,
            max_workers: num_cpus::get(),
            min_slice: 200,
        }
    }
}

pub enum Outcome {
    /// The best goal-reaching record of the first layer that hit the goal.
    Solved(Mcr),
    /// Layer cutoff reached without a goal.
    Stopped,
    /// The frontier emptied: no reachable goal.
    Exhausted,
}

type Frontier = AHashMap<Schash, Mcr>;
type Expansion = (Vec<Mcr>, Frontier);

/// Run the layered search to completion.
pub fn search(puzzle: &Puzzle, opts: &Options) -> Result<Outcome> {
    let timer = Instant::now();
    let label = match opts.objective {
        Objective::Steps => "step",
        Objective::Runs => "run",
    };

    let mut memo: AHashSet<Schash> = AHashSet::new();
    memo.insert(fingerprint(puzzle, &puzzle.init));

    // The sentinel move lets expansion ask "what moved last?" on the very
    // first layer.  Step search starts the run count at 1 because the first
    // real move never increments it.
    let mut tosearch = vec![Mcr {
        hist: vec![Move::SENTINEL],
        colist: puzzle.init.clone(),
        rlc: match opts.objective {
            Objective::Runs => 0,
            Objective::Steps => 1,
        },
    }];
    let mut step: u32 = 0;

    while !tosearch.is_empty() {
        let parts = partition(tosearch.len(), opts.max_workers, opts.min_slice);
        let workers = if opts.parallel { parts.len() } else { 1 };
        eprintln!(
            "--- ({}w) {} {}: {} candidates, {} memoized, {:.1}s",
            workers,
            label,
            step,
            tosearch.len(),
            memo.len(),
            timer.elapsed().as_secs_f64()
        );

        let (found, next) = if workers > 1 {
            expand_layer(puzzle, &tosearch, &parts, &memo, opts.objective)?
        } else {
            expand_slice(puzzle, &tosearch, &memo, opts.objective, None)
        };

        memo.extend(next.keys().copied());

        if !found.is_empty() {
            eprintln!(
                "--- {} answer(s) at {} {}, {:.1}s",
                found.len(),
                label,
                step,
                timer.elapsed().as_secs_f64()
            );
            // All answers in this layer are optimal in the primary metric;
            // the secondary metric picks among them.
            let best = match opts.objective {
                Objective::Runs => found.into_iter().min_by_key(|mcr| mcr.hist.len()),
                Objective::Steps => found.into_iter().min_by_key(|mcr| mcr.rlc),
            };
            return Ok(Outcome::Solved(best.unwrap()));
        }

        if Some(step) == opts.stop_steps {
            return Ok(Outcome::Stopped);
        }

        // flatten in fingerprint order: map iteration order is randomized,
        // and a reproducible frontier order is what makes two runs with the
        // same settings produce the same winning history
        let mut entries: Vec<(Schash, Mcr)> = next.into_iter().collect();
        entries.sort_unstable_by_key(|entry| entry.0);
        tosearch = entries.into_iter().map(|(_, mcr)| mcr).collect();
        step += 1;
    }

    Ok(Outcome::Exhausted)
}

/// Cut `0..n` into contiguous worker slices.
///
/// Slices are `min_slice` long until that would need more than
/// `max_workers` workers; then the layer is split evenly instead.  The last
/// worker absorbs the remainder either way.
fn partition(n: usize, max_workers: usize, min_slice: usize) -> Vec<Range<usize>> {
    let max_workers = max_workers.max(1);
    let min_slice = min_slice.max(1);
    let (count, size) = if n <= max_workers * min_slice {
        ((n + min_slice - 1) / min_slice, min_slice)
    } else {
        (max_workers, n / max_workers)
    };

    let mut parts = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let end = if i + 1 == count { n } else { start + size };
        parts.push(start..end);
        start = end;
    }
    parts
}

fn expand_slice(
    puzzle: &Puzzle,
    slice: &[Mcr],
    memo: &AHashSet<Schash>,
    objective: Objective,
    progress: Option<&Progress>,
) -> Expansion {
    match objective {
        Objective::Steps => steps::expand(puzzle, slice, memo, progress),
        Objective::Runs => runs::expand(puzzle, slice, memo, progress),
    }
}

/// Expand one layer on the worker pool and merge the results.
fn expand_layer(
    puzzle: &Puzzle,
    tosearch: &[Mcr],
    parts: &[Range<usize>],
    memo: &AHashSet<Schash>,
    objective: Objective,
) -> Result<Expansion> {
    let progress = Progress::new();
    let total = tosearch.len();

    let outputs = crossbeam::scope(|s| {
        s.spawn(|_| {
            let mut printed = false;
            let mut slept = 0;
            loop {
                // poll often so finishing a layer is never gated on a sleep
                thread::sleep(Duration::from_millis(5));
                if progress.finished() {
                    if printed {
                        eprint!("\r{:40}\r", "");
                    }
                    return;
                }
                slept += 5;
                if slept >= 100 {
                    eprint!("\r{:>10} / {:>10} expanded", progress.count(), total);
                    printed = true;
                    slept = 0;
                }
            }
        });

        // A worker panic unwinds out of the collect; catch it so the ticker
        // can be stopped and the failure reported instead of deadlocking.
        let outputs = panic::catch_unwind(AssertUnwindSafe(|| {
            parts
                .par_iter()
                .map(|part| {
                    expand_slice(puzzle, &tosearch[part.clone()], memo, objective, Some(&progress))
                })
                .collect::<Vec<Expansion>>()
        }));
        progress.finish();
        outputs
    });

    let outputs = match outputs {
        Ok(Ok(outputs)) => outputs,
        _ => bail!("worker failed while expanding a layer"),
    };

    let mut found = Vec::new();
    let mut merged: Frontier = AHashMap::new();
    for (local_found, local_next) in outputs {
        found.extend(local_found);
        for (hash, mcr) in local_next {
            merge_candidate(puzzle, &mut merged, hash, mcr, objective);
        }
    }
    Ok((found, merged))
}

/// Fold one worker's frontier entry into the merged frontier under the
/// objective's tie-break.
fn merge_candidate(
    puzzle: &Puzzle,
    merged: &mut Frontier,
    hash: Schash,
    mcr: Mcr,
    objective: Objective,
) {
    use std::collections::hash_map::Entry;

    match merged.entry(hash) {
        Entry::Vacant(entry) => {
            entry.insert(mcr);
        }
        Entry::Occupied(mut entry) => match objective {
            Objective::Runs => {
                if mcr.hist.len() < entry.get().hist.len() {
                    entry.insert(mcr);
                }
            }
            Objective::Steps => {
                if mcr.rlc < entry.get().rlc {
                    entry.insert(mcr);
                } else if mcr.rlc == entry.get().rlc {
                    // The board is only materialized on an exact tie.
                    let last = *mcr.hist.last().unwrap();
                    let board = puzzle.board_with(&mcr.colist, Some(last.piece() as usize));
                    if can_extend_run(puzzle, &board, &mcr.colist, last) {
                        entry.insert(mcr);
                    }
                }
            }
        },
    }
}

/// Whether the piece that just moved could keep its run going: some
/// non-opposite direction from its current square is collision-free.
///
/// `board` must have that piece erased, or it would block itself.
pub(crate) fn can_extend_run(
    puzzle: &Puzzle,
    board: &BitBoard,
    colist: &Colist,
    last: Move,
) -> bool {
    let kid = last.piece() as usize;
    let class = puzzle.class_of(kid);
    let from = colist[kid];
    Dir::ALL
        .iter()
        .any(|&dir| dir != last.dir().opposite() && !board.collides(class, from.step(dir)))
}

#[cfg(test)]
mod tests {
    use crate::puzzle::Puzzle;

    use super::*;

    #[test]
    fn partition_small_layers_by_slice_size() {
        assert_eq!(partition(10, 4, 200), vec![0..10]);
        assert_eq!(partition(500, 4, 200), vec![0..200, 200..400, 400..500]);
        assert_eq!(partition(400, 4, 200), vec![0..200, 200..400]);
    }

    #[test]
    fn partition_large_layers_evenly() {
        assert_eq!(
            partition(1000, 4, 200),
            vec![0..250, 250..500, 500..750, 750..1000]
        );
        // the last worker absorbs the remainder
        assert_eq!(
            partition(801, 4, 200),
            vec![0..200, 200..400, 400..600, 600..801]
        );
    }

    #[test]
    fn partition_degenerate_settings() {
        assert_eq!(partition(0, 4, 200), vec![]);
        assert_eq!(partition(5, 1, 2), vec![0..5]);
    }

    const CORRIDOR: &str = r#"{
        "name": "corridor",
        "board": { "size": [3, 5] },
        "classes": [{ "name": "pawn", "size": [1, 1] }],
        "pieces": [{ "name": "p", "class": "pawn", "init": [1, 1], "goal": [1, 3] }]
    }"#;

    #[test]
    fn step_search_counts_cells() {
        let puzzle = Puzzle::from_json(CORRIDOR).unwrap();
        let opts = Options {
            parallel: false,
            ..Options::default()
        };
        match search(&puzzle, &opts).unwrap() {
            Outcome::Solved(mcr) => {
                assert_eq!(mcr.steps(), 2);
                assert_eq!(mcr.rlc, 1);
            }
            _ => panic!("corridor should be solvable"),
        }
    }

    #[test]
    fn run_search_counts_runs() {
        let puzzle = Puzzle::from_json(CORRIDOR).unwrap();
        let opts = Options {
            objective: Objective::Runs,
            parallel: false,
            ..Options::default()
        };
        match search(&puzzle, &opts).unwrap() {
            Outcome::Solved(mcr) => {
                assert_eq!(mcr.rlc, 1);
                assert_eq!(mcr.steps(), 2);
            }
            _ => panic!("corridor should be solvable"),
        }
    }

    #[test]
    fn one_move_puzzle() {
        let raw = r#"{
            "name": "one move",
            "board": { "size": [3, 4] },
            "classes": [{ "name": "pawn", "size": [1, 1] }],
            "pieces": [{ "name": "p", "class": "pawn", "init": [1, 1], "goal": [1, 2] }]
        }"#;
        let puzzle = Puzzle::from_json(raw).unwrap();
        for objective in [Objective::Steps, Objective::Runs] {
            let opts = Options {
                objective,
                parallel: false,
                ..Options::default()
            };
            match search(&puzzle, &opts).unwrap() {
                Outcome::Solved(mcr) => {
                    assert_eq!(mcr.steps(), 1);
                    assert_eq!(mcr.rlc, 1);
                }
                _ => panic!("one-move puzzle should be solvable"),
            }
        }
    }

    #[test]
    fn walled_off_goal_exhausts() {
        let raw = r#"{
            "name": "walled off",
            "board": {
                "size": [5, 5],
                "extwall": [[1, 2], [2, 2], [3, 2]],
                "mirror": false
            },
            "classes": [{ "name": "pawn", "size": [1, 1] }],
            "pieces": [{ "name": "p", "class": "pawn", "init": [1, 1], "goal": [1, 3] }]
        }"#;
        let puzzle = Puzzle::from_json(raw).unwrap();
        let opts = Options {
            parallel: false,
            ..Options::default()
        };
        assert!(matches!(search(&puzzle, &opts).unwrap(), Outcome::Exhausted));
    }

    #[test]
    fn layer_cutoff_stops() {
        let puzzle = Puzzle::from_json(CORRIDOR).unwrap();
        let opts = Options {
            parallel: false,
            stop_steps: Some(0),
            ..Options::default()
        };
        assert!(matches!(search(&puzzle, &opts).unwrap(), Outcome::Stopped));
    }
}
