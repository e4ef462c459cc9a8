//! Canonical configuration fingerprints.
//!
//! Two configurations fingerprint equal exactly when one can be turned into
//! the other by permuting pieces of the same class, or (when the puzzle
//! declares mirror identity) by reflecting the whole board left-to-right.
//! The search memoizes fingerprints instead of raw configurations, which
//! folds those symmetries out of the state space.

use smallvec::SmallVec;

use crate::gameplay::Colist;
use crate::puzzle::Puzzle;

/// A configuration fingerprint: the board addresses of all pieces, ordered
/// by (class, address) and packed eight bits per piece.
///
/// Sorting by class first erases the identity of same-class pieces; packing
/// the sorted addresses then yields one integer per equivalence class.  With
/// 128 bits there is room for [`MAX_PIECES`] pieces.
pub type Schash = u128;

/// The largest piece count the fingerprint can hold.
pub const MAX_PIECES: usize = 16;

/// Fingerprint a configuration.
///
/// Under mirror identity the fingerprint of the mirrored configuration is
/// computed as well and the smaller packing wins, so a configuration and its
/// reflection collapse to one key.
pub fn fingerprint(puzzle: &Puzzle, colist: &Colist) -> Schash {
    let plain = packed(puzzle, colist, false);
    if !puzzle.mirror_ident {
        return plain;
    }
    plain.min(packed(puzzle, colist, true))
}

fn packed(puzzle: &Puzzle, colist: &Colist, mirror: bool) -> Schash {
    let mut pairs: SmallVec<[(u8, u8); MAX_PIECES]> = SmallVec::new();
    for kid in 1..=puzzle.piece_count() {
        let class = puzzle.pieces[kid].class;
        let mut co = colist[kid];
        if mirror {
            co = co.mirrored(puzzle.classes[class].width(), puzzle.width);
        }
        pairs.push((class as u8, co.0));
    }
    pairs.sort_unstable();
    pairs.iter().fold(0, |r, &(_, co)| r << 8 | co as Schash)
}

#[cfg(test)]
mod tests {
    use crate::gameplay::Coord;
    use crate::puzzle::Puzzle;

    use super::*;

    // 2x4 interior with two pawns and one tall piece
    const PUZZLE: &str = r#"{
        "name": "fingerprints",
        "board": { "size": [4, 6] },
        "classes": [
            { "name": "pawn", "size": [1, 1] },
            { "name": "tall", "size": [2, 1] }
        ],
        "pieces": [
            { "name": "a", "class": "pawn", "init": [1, 1] },
            { "name": "b", "class": "pawn", "init": [2, 2] },
            { "name": "t", "class": "tall", "init": [1, 4], "goal": [1, 1] }
        ]
    }"#;

    fn colist(coords: &[(u8, u8)]) -> Colist {
        let mut colist: Colist = smallvec::smallvec![Coord::ABSENT];
        colist.extend(coords.iter().map(|&(y, x)| Coord::new(y, x)));
        colist
    }

    #[test]
    fn same_class_pieces_are_interchangeable() {
        let puzzle = Puzzle::from_json(PUZZLE).unwrap();
        let swapped = fingerprint(&puzzle, &colist(&[(2, 2), (1, 1), (1, 4)]));
        assert_eq!(fingerprint(&puzzle, &puzzle.init), swapped);
    }

    #[test]
    fn different_classes_are_not() {
        let puzzle = Puzzle::from_json(PUZZLE).unwrap();
        let moved = fingerprint(&puzzle, &colist(&[(1, 2), (2, 2), (1, 4)]));
        assert_ne!(fingerprint(&puzzle, &puzzle.init), moved);
    }

    #[test]
    fn mirrored_configurations_collapse() {
        let puzzle = Puzzle::from_json(PUZZLE).unwrap();
        assert!(puzzle.mirror_ident);
        // the mirror of the initial configuration in the width-6 board:
        // pawns (1,1)->(1,4), (2,2)->(2,3); tall (1,4)->(1,1)
        let mirrored = fingerprint(&puzzle, &colist(&[(1, 4), (2, 3), (1, 1)]));
        assert_eq!(fingerprint(&puzzle, &puzzle.init), mirrored);
    }

    #[test]
    fn mirror_folding_can_be_disabled() {
        let raw = PUZZLE.replace(r#""size": [4, 6] }"#, r#""size": [4, 6], "mirror": false }"#);
        let puzzle = Puzzle::from_json(&raw).unwrap();
        assert!(!puzzle.mirror_ident);
        let mirrored = fingerprint(&puzzle, &colist(&[(1, 4), (2, 3), (1, 1)]));
        assert_ne!(fingerprint(&puzzle, &puzzle.init), mirrored);
    }
}
