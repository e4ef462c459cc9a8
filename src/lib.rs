//! A solver for sliding-block (klotski-family) puzzles.
//!
//! Puzzles are rectangular boards with walls and rigid pieces of arbitrary
//! shapes; pieces slide one cell at a time.  The solver finds a move
//! sequence to a goal configuration that is optimal in one of two metrics:
//! fewest single-cell steps, or fewest *rectilinear runs* (consecutive
//! moves of one piece, turns included, count once).
//!
//! Both metrics run a layered breadth-first search over configuration
//! fingerprints that fold out same-class piece swaps and, optionally, the
//! board's mirror symmetry.  Large layers are expanded by parallel workers.
//!
//! # Basic usage
//!
//! ```
//! use klotski::puzzle::Puzzle;
//! use klotski::search::{search, Options, Outcome};
//!
//! # fn main() -> anyhow::Result<()> {
//! let puzzle = Puzzle::from_json(r#"{
//!     "name": "one move",
//!     "board": { "size": [3, 4] },
//!     "classes": [{ "name": "pawn", "size": [1, 1] }],
//!     "pieces": [{ "name": "p", "class": "pawn", "init": [1, 1], "goal": [1, 2] }]
//! }"#)?;
//!
//! let opts = Options { parallel: false, ..Options::default() };
//! match search(&puzzle, &opts)? {
//!     Outcome::Solved(mcr) => assert_eq!(mcr.steps(), 1),
//!     _ => unreachable!(),
//! }
//! # Ok(())
//! # }
//! ```

pub mod fingerprint;
pub mod gameplay;
pub mod progress;
pub mod puzzle;
pub mod render;
pub mod search;
