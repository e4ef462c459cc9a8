//! Depth-first expansion of one rectilinear layer.
//!
//! A layer advance under the run metric releases one piece and slides it as
//! far as the board allows, turning freely; every square the run can reach
//! costs a single run.  The piece that moved last is not released again:
//! picking it back up would extend the previous run, and those squares were
//! already charged to it.

use ahash::{AHashMap, AHashSet};
use bitvec::prelude::{bitvec, BitVec};

use crate::fingerprint::{fingerprint, Schash};
use crate::gameplay::{BitBoard, Colist, Dir, Move};
use crate::progress::Progress;
use crate::puzzle::Puzzle;
use crate::search::Mcr;

/// Expand a slice of the frontier by one rectilinear run per successor.
///
/// Successors are keyed by fingerprint; when several run prefixes reach the
/// same key, the one with the shorter move history survives.
pub(crate) fn expand(
    puzzle: &Puzzle,
    slice: &[Mcr],
    memo: &AHashSet<Schash>,
    progress: Option<&Progress>,
) -> (Vec<Mcr>, AHashMap<Schash, Mcr>) {
    let mut found = Vec::new();
    let mut next: AHashMap<Schash, Mcr> = AHashMap::new();

    for mcr in slice {
        let last = *mcr.hist.last().unwrap();
        let mut board = puzzle.board_with(&mcr.colist, None);
        // one increment buys the whole run, wherever it turns
        let rlc = mcr.rlc + 1;

        for kid in 1..=puzzle.piece_count() {
            if last.piece() as usize == kid {
                continue;
            }
            let class = puzzle.class_of(kid);
            board.erase(class, mcr.colist[kid]);

            let mut visited = bitvec![0; 256];
            slide(
                puzzle,
                kid,
                &mcr.hist,
                &mcr.colist,
                rlc,
                &mut visited,
                &board,
                memo,
                &mut next,
                &mut found,
            );

            board.draw(class, mcr.colist[kid]);
        }

        if let Some(progress) = progress {
            progress.tick();
        }
    }

    (found, next)
}

/// Recursive probe of every square one run of `kid` can reach.
///
/// `visited` holds the squares of the current run path, which is what stops
/// a run from circling forever; squares reached by earlier layers are cut
/// off by `memo` instead.  `board` has `kid` erased throughout the run.
#[allow(clippy::too_many_arguments)]
fn slide(
    puzzle: &Puzzle,
    kid: usize,
    hist: &[Move],
    colist: &Colist,
    rlc: u32,
    visited: &mut BitVec,
    board: &BitBoard,
    memo: &AHashSet<Schash>,
    next: &mut AHashMap<Schash, Mcr>,
    found: &mut Vec<Mcr>,
) {
    let class = puzzle.class_of(kid);
    for &dir in &Dir::ALL {
        let co = colist[kid].step(dir);
        if visited[co.0 as usize] || board.collides(class, co) {
            continue;
        }

        let mut new_colist = colist.clone();
        new_colist[kid] = co;
        let mut new_hist = hist.to_vec();
        new_hist.push(Move::new(kid as u8, dir));
        let hash = fingerprint(puzzle, &new_colist);

        if puzzle.is_goal(&new_colist, hash) {
            found.push(Mcr {
                hist: new_hist,
                colist: new_colist,
                rlc,
            });
            // one answer per run is enough
            return;
        }

        if !memo.contains(&hash) {
            let shorter = next
                .get(&hash)
                .map_or(true, |cur| new_hist.len() < cur.hist.len());
            if shorter {
                next.insert(
                    hash,
                    Mcr {
                        hist: new_hist.clone(),
                        colist: new_colist.clone(),
                        rlc,
                    },
                );
            }
        }

        visited.set(co.0 as usize, true);
        slide(
            puzzle, kid, &new_hist, &new_colist, rlc, visited, board, memo, next, found,
        );
        visited.set(co.0 as usize, false);
    }
}

#[cfg(test)]
mod tests {
    use crate::gameplay::Coord;

    use super::*;

    fn seed(puzzle: &Puzzle) -> Mcr {
        Mcr {
            hist: vec![Move::SENTINEL],
            colist: puzzle.init.clone(),
            rlc: 0,
        }
    }

    #[test]
    fn one_run_reaches_around_corners() {
        // 2x2 open interior: a single run visits every free square
        let raw = r#"{
            "name": "open",
            "board": { "size": [4, 4], "mirror": false },
            "classes": [{ "name": "pawn", "size": [1, 1] }],
            "pieces": [{ "name": "p", "class": "pawn", "init": [1, 1], "goal": [2, 2] }]
        }"#;
        let puzzle = Puzzle::from_json(raw).unwrap();
        let memo = AHashSet::from_iter([fingerprint(&puzzle, &puzzle.init)]);

        let (found, _next) = expand(&puzzle, &[seed(&puzzle)], &memo, None);
        // the goal square is diagonal from the start, but a turning run
        // reaches it for a single rectilinear count; several paths around
        // the square report answers and the two-step one is among them
        assert!(!found.is_empty());
        for mcr in &found {
            assert_eq!(mcr.rlc, 1);
            assert_eq!(mcr.colist[1], Coord::new(2, 2));
        }
        assert_eq!(found.iter().map(Mcr::steps).min(), Some(2));
    }

    #[test]
    fn runs_terminate_and_cover_reachable_squares() {
        // a run may circle through its own trail, so termination depends on
        // the per-run visited set
        let raw = r#"{
            "name": "loop",
            "board": { "size": [4, 5], "mirror": false },
            "classes": [
                { "name": "pawn", "size": [1, 1] },
                { "name": "bar", "size": [2, 1] }
            ],
            "pieces": [
                { "name": "p", "class": "pawn", "init": [1, 1], "goal": [2, 1] },
                { "name": "b", "class": "bar", "init": [1, 3] }
            ]
        }"#;
        let puzzle = Puzzle::from_json(raw).unwrap();
        let memo = AHashSet::from_iter([fingerprint(&puzzle, &puzzle.init)]);

        let (found, next) = expand(&puzzle, &[seed(&puzzle)], &memo, None);
        // the goal square is adjacent; roundabout run paths reach it too,
        // but the direct one-step answer is among the reports
        assert!(!found.is_empty());
        assert_eq!(found.iter().map(Mcr::steps).min(), Some(1));
        // frontier: p's two other reachable squares and b's one slide
        assert_eq!(next.len(), 3);
        for mcr in next.values() {
            assert_eq!(mcr.rlc, 1);
        }
    }

    #[test]
    fn last_moved_piece_is_not_released() {
        let raw = r#"{
            "name": "two",
            "board": { "size": [4, 5], "mirror": false },
            "classes": [{ "name": "pawn", "size": [1, 1] }],
            "pieces": [
                { "name": "a", "class": "pawn", "init": [1, 1], "goal": [2, 3] },
                { "name": "b", "class": "pawn", "init": [1, 3], "goal": [1, 1] }
            ]
        }"#;
        let puzzle = Puzzle::from_json(raw).unwrap();

        let parent = Mcr {
            hist: vec![Move::SENTINEL, Move::new(1, Dir::South)],
            colist: {
                let mut colist = puzzle.init.clone();
                colist[1] = Coord::new(2, 1);
                colist
            },
            rlc: 1,
        };
        let memo = AHashSet::from_iter([fingerprint(&puzzle, &parent.colist)]);

        let (_, next) = expand(&puzzle, &[parent], &memo, None);
        for mcr in next.values() {
            assert_eq!(mcr.hist.last().unwrap().piece(), 2, "only b may move");
            assert_eq!(mcr.rlc, 2);
        }
    }

    #[test]
    fn shorter_run_prefix_wins_the_frontier() {
        // two paths of one run reach the same square; the two-step prefix
        // must survive over any longer loop
        let raw = r#"{
            "name": "prefix",
            "board": { "size": [5, 5], "mirror": false },
            "classes": [{ "name": "pawn", "size": [1, 1] }],
            "pieces": [{ "name": "p", "class": "pawn", "init": [1, 1], "goal": [3, 3] }]
        }"#;
        let puzzle = Puzzle::from_json(raw).unwrap();
        let memo = AHashSet::from_iter([fingerprint(&puzzle, &puzzle.init)]);

        let (_, next) = expand(&puzzle, &[seed(&puzzle)], &memo, None);
        let mut two_two: Colist = puzzle.init.clone();
        two_two[1] = Coord::new(2, 2);
        let best = &next[&fingerprint(&puzzle, &two_two)];
        assert_eq!(best.steps(), 2);
    }
}
