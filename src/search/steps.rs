//! Single-cell expansion of one breadth-first layer under the step metric.

use ahash::{AHashMap, AHashSet};

use crate::fingerprint::{fingerprint, Schash};
use crate::gameplay::{Dir, Move};
use crate::progress::Progress;
use crate::puzzle::Puzzle;
use crate::search::{can_extend_run, Mcr};

/// Expand a slice of the frontier by one unit move per successor.
///
/// Goal-reaching successors land in the returned answer list and are not
/// enqueued.  Everything else not yet memoized is keyed by fingerprint into
/// the local next frontier; when two predecessors reach the same key, the
/// one spending fewer rectilinear runs survives, and on an exact tie the
/// newcomer wins only if its last-moved piece can keep its run going.
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

        for kid in 1..=puzzle.piece_count() {
            let class = puzzle.class_of(kid);
            board.erase(class, mcr.colist[kid]);

            for &dir in &Dir::ALL {
                // never undo the previous move
                if last.piece() as usize == kid && last.dir().opposite() == dir {
                    continue;
                }
                let co = mcr.colist[kid].step(dir);
                if board.collides(class, co) {
                    continue;
                }

                let mut colist = mcr.colist.clone();
                colist[kid] = co;
                let mut hist = mcr.hist.clone();
                hist.push(Move::new(kid as u8, dir));
                let hash = fingerprint(puzzle, &colist);

                let mut rlc = mcr.rlc;
                if hist.len() >= 3 && hist[hist.len() - 1].piece() != hist[hist.len() - 2].piece()
                {
                    rlc += 1;
                }

                if puzzle.is_goal(&colist, hash) {
                    found.push(Mcr { hist, colist, rlc });
                    continue;
                }
                if memo.contains(&hash) {
                    continue;
                }

                let keep = match next.get(&hash) {
                    None => true,
                    Some(cur) => {
                        rlc < cur.rlc
                            || (rlc == cur.rlc
                                && can_extend_run(puzzle, &board, &colist, *hist.last().unwrap()))
                    }
                };
                if keep {
                    next.insert(hash, Mcr { hist, colist, rlc });
                }
            }

            board.draw(class, mcr.colist[kid]);
        }

        if let Some(progress) = progress {
            progress.tick();
        }
    }

    (found, next)
}
