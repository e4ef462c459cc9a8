//! Puzzle descriptions: classes, pieces, walls and the goal predicate.
//!
//! Puzzles are loaded from JSON files.  Loading validates everything fatal
//! up front (shapes, overlaps, board bounds) and normalizes the goal into
//! the cheapest predicate that still matches the description.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use smallvec::{smallvec, SmallVec};

use crate::fingerprint::{fingerprint, Schash, MAX_PIECES};
use crate::gameplay::{BitBoard, Colist, Coord, PieceClass};

/// A piece on the board: display names and a class reference.  Positions
/// live in [`Colist`]s, not here.
#[derive(Clone, Debug)]
pub struct Piece {
    pub name: String,
    /// Two-character display name used by the board renderer.
    pub short: String,
    pub class: usize,
}

/// The goal predicate, normalized at load time.
///
/// A description where every piece has a goal square collapses to a single
/// fingerprint comparison.  A by-class goal whose pieces are all unique in
/// their class is the same thing as a by-id goal, so it degrades to one.
#[derive(Clone, Debug)]
pub enum Goal {
    /// Each listed piece must be exactly at its square.
    ById(Vec<(usize, Coord)>),
    /// For each entry, some piece of the class must be at the square.
    ByClass(Vec<(usize, Coord)>),
    /// The configuration fingerprint must match.
    ByHash(Schash),
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::ById(_) => write!(f, "by piece"),
            Goal::ByClass(_) => write!(f, "by class"),
            Goal::ByHash(hash) => write!(f, "by fingerprint ({:#x})", hash),
        }
    }
}

/// A complete, validated puzzle.  Read-only during search; workers share it
/// by reference.
#[derive(Clone, Debug)]
pub struct Puzzle {
    pub name: String,
    /// Board height including the wall ring.
    pub height: u8,
    /// Board width including the wall ring.
    pub width: u8,
    pub extwall: Vec<Coord>,
    /// Whether mirror-image configurations count as the same state.
    pub mirror_ident: bool,
    /// Piece classes, indexed from 1 (index 0 is a dummy).
    pub classes: Vec<PieceClass>,
    /// Pieces, indexed from 1 (index 0 is a dummy).
    pub pieces: Vec<Piece>,
    pub init: Colist,
    pub goal: Goal,
    /// Goal squares by piece id, as described in the file.  Kept for
    /// display even when `goal` is normalized away from piece ids.
    pub goal_spec: Vec<(usize, Coord)>,
}

impl Puzzle {
    pub fn piece_count(&self) -> usize {
        self.pieces.len() - 1
    }

    pub fn class_of(&self, kid: usize) -> &PieceClass {
        &self.classes[self.pieces[kid].class]
    }

    /// The goal configuration, with pieces that have no goal square absent.
    pub fn goal_colist(&self) -> Colist {
        let mut colist: Colist = smallvec![Coord::ABSENT; self.pieces.len()];
        for &(kid, co) in &self.goal_spec {
            colist[kid] = co;
        }
        colist
    }

    /// Build the occupancy board for a configuration, optionally leaving
    /// one piece out.
    pub fn board_with(&self, colist: &Colist, skip: Option<usize>) -> BitBoard {
        let mut board = BitBoard::walls(self.height, self.width, &self.extwall);
        for kid in 1..=self.piece_count() {
            if Some(kid) == skip || colist[kid] == Coord::ABSENT {
                continue;
            }
            board.draw(self.class_of(kid), colist[kid]);
        }
        board
    }

    /// The goal predicate.  `hash` must be the fingerprint of `colist`.
    pub fn is_goal(&self, colist: &Colist, hash: Schash) -> bool {
        match &self.goal {
            Goal::ByHash(goal) => *goal == hash,
            Goal::ById(entries) => entries.iter().all(|&(kid, co)| colist[kid] == co),
            Goal::ByClass(entries) => entries.iter().all(|&(class, co)| {
                (1..colist.len()).any(|kid| self.pieces[kid].class == class && colist[kid] == co)
            }),
        }
    }

    pub fn from_path(path: &Path) -> Result<Puzzle> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("cannot read puzzle file {}", path.display()))?;
        Puzzle::from_json(&raw)
            .with_context(|| format!("invalid puzzle file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Puzzle> {
        let file: PuzzleFile = serde_json::from_str(raw).context("malformed JSON")?;
        Puzzle::from_file(file)
    }

    fn from_file(file: PuzzleFile) -> Result<Puzzle> {
        let (height, width) = file.board.size;
        ensure!(
            (3..=16).contains(&height) && (3..=16).contains(&width),
            "board size {}x{} out of range (3..=16 per axis, walls included)",
            height,
            width
        );

        let mut extwall = Vec::new();
        for &yx in &file.board.extwall {
            let co = coord(yx, "extra wall")?;
            ensure!(
                co.y() < height && co.x() < width,
                "extra wall ({}, {}) is outside the board",
                co.y(),
                co.x()
            );
            extwall.push(co);
        }

        let (mut classes, class_ids) = parse_classes(&file.classes, height, width)?;
        let mirror_ident =
            file.board.mirror && classes.iter().skip(1).all(|class| class.mirror_symmetric);

        ensure!(!file.pieces.is_empty(), "puzzle has no pieces");
        ensure!(
            file.pieces.len() <= MAX_PIECES,
            "too many pieces ({}, fingerprint holds at most {})",
            file.pieces.len(),
            MAX_PIECES
        );

        let mut pieces = vec![Piece {
            name: String::new(),
            short: String::new(),
            class: 0,
        }];
        let mut init: Colist = smallvec![Coord::ABSENT];
        let mut goal_spec = Vec::new();
        for (idx, spec) in file.pieces.iter().enumerate() {
            let kid = idx + 1;
            let class = *class_ids
                .get(spec.class.as_str())
                .with_context(|| format!("piece \"{}\" has undefined class \"{}\"", spec.name, spec.class))?;
            pieces.push(Piece {
                name: spec.name.clone(),
                short: spec.short.clone().unwrap_or_default(),
                class,
            });
            init.push(coord(spec.init, "piece position")?);
            if let Some(goal) = spec.goal {
                goal_spec.push((kid, coord(goal, "goal position")?));
            }
        }
        ensure!(!goal_spec.is_empty(), "no goal given for any piece");

        if file.board.goal == GoalKind::ById {
            split_goal_classes(&mut classes, &mut pieces, &goal_spec);
        }
        drop(class_ids); // borrows `file`, which is moved from below

        assign_short_names(&mut pieces)?;

        let mut puzzle = Puzzle {
            name: file.name,
            height,
            width,
            extwall,
            mirror_ident,
            classes,
            pieces,
            init,
            goal: Goal::ById(Vec::new()),
            goal_spec,
        };
        puzzle.check_colist(&puzzle.init, "initial")?;
        let goal_colist = puzzle.goal_colist();
        puzzle.check_colist(&goal_colist, "goal")?;

        puzzle.goal = if puzzle.goal_spec.len() == puzzle.piece_count() {
            // fully specified goals pin every piece: one hash comparison
            Goal::ByHash(fingerprint(&puzzle, &goal_colist))
        } else if file.board.goal == GoalKind::ByClass {
            let entries: Vec<(usize, Coord)> = puzzle
                .goal_spec
                .iter()
                .map(|&(kid, co)| (puzzle.pieces[kid].class, co))
                .collect();
            let all_unique = entries.iter().all(|&(class, _)| {
                puzzle.pieces[1..].iter().filter(|p| p.class == class).count() == 1
            });
            if all_unique {
                Goal::ById(puzzle.goal_spec.clone())
            } else {
                Goal::ByClass(entries)
            }
        } else {
            Goal::ById(puzzle.goal_spec.clone())
        };

        Ok(puzzle)
    }

    /// Reject configurations that leave the board or overlap.
    fn check_colist(&self, colist: &Colist, what: &str) -> Result<()> {
        let mut board = BitBoard::walls(self.height, self.width, &self.extwall);
        for kid in 1..=self.piece_count() {
            let co = colist[kid];
            if co == Coord::ABSENT {
                continue;
            }
            let class = self.class_of(kid);
            ensure!(
                co.y() + class.height() < self.height && co.x() + class.width() < self.width,
                "{} position of piece \"{}\" at ({}, {}) exceeds the board",
                what,
                self.pieces[kid].name,
                co.y(),
                co.x()
            );
            ensure!(
                !board.collides(class, co),
                "{} position of piece \"{}\" at ({}, {}) overlaps a wall or another piece",
                what,
                self.pieces[kid].name,
                co.y(),
                co.x()
            );
            board.draw(class, co);
        }
        Ok(())
    }
}

fn coord((y, x): (u8, u8), what: &str) -> Result<Coord> {
    ensure!(y <= 15 && x <= 15, "{} ({}, {}) out of coordinate range", what, y, x);
    Ok(Coord::new(y, x))
}

fn parse_classes(
    specs: &[ClassFile],
    height: u8,
    width: u8,
) -> Result<(Vec<PieceClass>, HashMap<&str, usize>)> {
    ensure!(!specs.is_empty(), "puzzle defines no piece classes");

    let mut classes = vec![PieceClass::default()];
    let mut ids = HashMap::new();
    for spec in specs {
        ensure!(
            ids.insert(spec.name.as_str(), classes.len()).is_none(),
            "duplicate class name \"{}\"",
            spec.name
        );
        let size = coord(spec.size, "class size")?;
        ensure!(
            size.y() >= 1 && size.x() >= 1,
            "class \"{}\" has an empty bounding size",
            spec.name
        );
        ensure!(
            size.y() + 2 <= height && size.x() + 2 <= width,
            "class \"{}\" does not fit inside the walls",
            spec.name
        );

        let class = match &spec.bitmap {
            None => PieceClass::solid(spec.name.clone(), size),
            Some(lines) => {
                let rows = parse_bitmap(&spec.name, size, lines)?;
                PieceClass::new(spec.name.clone(), size, rows)
            }
        };
        classes.push(class);
    }
    Ok((classes, ids))
}

fn parse_bitmap(name: &str, size: Coord, lines: &[String]) -> Result<SmallVec<[u16; 4]>> {
    ensure!(
        lines.len() == size.y() as usize,
        "bitmap of class \"{}\" has {} rows, size says {}",
        name,
        lines.len(),
        size.y()
    );

    let mut rows: SmallVec<[u16; 4]> = SmallVec::new();
    let mut columns = 0u16;
    for line in lines {
        ensure!(
            line.len() == size.x() as usize && line.bytes().all(|b| b == b'0' || b == b'1'),
            "bitmap row \"{}\" of class \"{}\" is not {} cells of 0/1",
            line,
            name,
            size.x()
        );
        let mut row = 0u16;
        for (x, byte) in line.bytes().enumerate() {
            if byte == b'1' {
                row |= 1 << x;
            }
        }
        ensure!(row != 0, "bitmap of class \"{}\" has an all-zero row", name);
        columns |= row;
        rows.push(row);
    }
    ensure!(
        columns == ((1u32 << size.x()) - 1) as u16,
        "bitmap of class \"{}\" has an all-zero column",
        name
    );
    Ok(rows)
}

/// Give each goal piece that shares its class with another piece a private
/// clone of the class.
///
/// A by-id goal pins one specific piece, but the fingerprint deliberately
/// confuses same-class pieces.  Cloning the class re-separates the goal
/// piece in fingerprint space without touching its shape.
fn split_goal_classes(
    classes: &mut Vec<PieceClass>,
    pieces: &mut [Piece],
    goal_spec: &[(usize, Coord)],
) {
    let mut clone_counts: HashMap<usize, u32> = HashMap::new();
    for &(kid, _) in goal_spec {
        let class = pieces[kid].class;
        if pieces[1..].iter().filter(|p| p.class == class).count() < 2 {
            continue;
        }
        let count = clone_counts.entry(class).or_insert(1);
        *count += 1;
        let mut clone = classes[class].clone();
        clone.name = format!("{}_{}", clone.name, count);
        pieces[kid].class = classes.len();
        classes.push(clone);
    }
}

/// Normalize display names to two characters and fill in missing ones from
/// the piece names.
fn assign_short_names(pieces: &mut [Piece]) -> Result<()> {
    let mut taken: Vec<String> = Vec::new();
    for kid in 1..pieces.len() {
        let mut short: String = format!("{:<2}", pieces[kid].short).chars().take(2).collect();
        if short.trim().is_empty() {
            short.clear();
        } else if taken.contains(&short) {
            eprintln!(
                "(warning) duplicate short name \"{}\" for piece \"{}\" ignored",
                short, pieces[kid].name
            );
            short.clear();
        }
        if short.is_empty() {
            short = derive_short_name(&pieces[kid].name, &taken)
                .with_context(|| format!("cannot derive a display name for piece \"{}\"", pieces[kid].name))?;
        }
        taken.push(short.clone());
        pieces[kid].short = short;
    }
    Ok(())
}

fn derive_short_name(name: &str, taken: &[String]) -> Result<String> {
    let chars: Vec<char> = name.chars().collect();
    ensure!(!chars.is_empty(), "piece has an empty name");
    if chars.len() == 1 {
        let short = format!("{} ", chars[0]);
        ensure!(!taken.contains(&short), "single-letter name collides");
        return Ok(short);
    }
    for &ch in &chars[1..] {
        let short = format!("{}{}", chars[0], ch);
        if !taken.contains(&short) {
            return Ok(short);
        }
    }
    bail!("all derived names collide");
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct PuzzleFile {
    name: String,
    board: BoardFile,
    classes: Vec<ClassFile>,
    pieces: Vec<PieceFile>,
}

#[derive(Deserialize)]
struct BoardFile {
    size: (u8, u8),
    #[serde(default)]
    extwall: Vec<(u8, u8)>,
    #[serde(default = "default_true")]
    mirror: bool,
    #[serde(default)]
    goal: GoalKind,
}

#[derive(Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum GoalKind {
    #[default]
    ById,
    ByClass,
}

#[derive(Deserialize)]
struct ClassFile {
    name: String,
    size: (u8, u8),
    #[serde(default)]
    bitmap: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct PieceFile {
    name: String,
    #[serde(default)]
    short: Option<String>,
    class: String,
    init: (u8, u8),
    #[serde(default)]
    goal: Option<(u8, u8)>,
}
