//! Text rendering of puzzles, configurations and winning move sequences.

use crate::gameplay::{Colist, Coord, Move};
use crate::puzzle::Puzzle;
use crate::search::{Objective, Options};

/// Render a configuration as a grid of two-character piece names.
///
/// Walls are blank, free squares are dotted.  The wall ring is not drawn;
/// extra wall cells inside it show as gaps.
pub fn name_matrix(puzzle: &Puzzle, colist: &Colist) -> String {
    let height = puzzle.height as usize;
    let width = puzzle.width as usize;
    let mut cells = vec![". "; height * width];

    for &co in &puzzle.extwall {
        cells[co.y() as usize * width + co.x() as usize] = "  ";
    }
    for kid in 1..=puzzle.piece_count() {
        let co = colist[kid];
        if co == Coord::ABSENT {
            continue;
        }
        let class = puzzle.class_of(kid);
        for (dy, &row) in class.rows.iter().enumerate() {
            for dx in 0..class.width() {
                if row & 1 << dx != 0 {
                    let y = co.y() as usize + dy;
                    let x = (co.x() + dx) as usize;
                    cells[y * width + x] = &puzzle.pieces[kid].short;
                }
            }
        }
    }

    let mut out = String::new();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            if x > 1 {
                out.push(' ');
            }
            out.push_str(cells[y * width + x]);
        }
        out.push('\n');
    }
    out
}

/// Print the puzzle header: board, goal kind, classes and the initial and
/// goal configurations.
pub fn print_puzzle(puzzle: &Puzzle) {
    println!("puzzle: {}", puzzle.name);
    println!(
        "        {}x{} cells inside the walls",
        puzzle.height - 2,
        puzzle.width - 2
    );
    println!("        mirror-identical: {}", puzzle.mirror_ident);
    println!("        goal: {}", puzzle.goal);

    println!("classes:");
    for class in puzzle.classes.iter().skip(1) {
        let members: Vec<&str> = puzzle
            .pieces
            .iter()
            .filter(|piece| puzzle.classes[piece.class].name == class.name)
            .map(|piece| piece.name.as_str())
            .collect();
        println!(
            "  {} ({}x{}): {{{}}}",
            class.name,
            class.height(),
            class.width(),
            members.join(", ")
        );
        for &row in &class.rows {
            print!("    ");
            for x in 0..class.width() {
                print!("{}", if row & 1 << x != 0 { "o " } else { ". " });
            }
            println!();
        }
    }

    println!("initial:");
    print!("{}", name_matrix(puzzle, &puzzle.init));
    println!("goal:");
    print!("{}", name_matrix(puzzle, &puzzle.goal_colist()));
    println!();
}

/// Print the settings the search will run with.
pub fn print_options(opts: &Options, filename: &str) {
    println!("options:");
    println!("    puzzle file: {}", filename);
    match opts.objective {
        Objective::Steps => println!("    objective: minimal single-cell steps"),
        Objective::Runs => println!("    objective: minimal rectilinear runs"),
    }
    if opts.parallel {
        println!(
            "    parallel: yes (max {} workers, min {} candidates each)",
            opts.max_workers, opts.min_slice
        );
    } else {
        println!("    parallel: no");
    }
    if let Some(stop) = opts.stop_steps {
        println!("    stop after layer {}", stop);
    }
    println!();
}

/// Replay a winning history from the initial configuration, printing the
/// board after every unit step with running step and run counters.
pub fn print_answer(puzzle: &Puzzle, hist: &[Move]) {
    println!("initial:");
    print!("{}", name_matrix(puzzle, &puzzle.init));

    let mut colist = puzzle.init.clone();
    let mut piece_runs = 0;
    let mut straight_runs = 0;

    // index 0 is the sentinel move
    for (count, &mv) in hist.iter().enumerate().skip(1) {
        let prev = hist[count - 1];
        if mv.piece() == prev.piece() {
            if mv.dir() != prev.dir() {
                straight_runs += 1;
            }
        } else {
            piece_runs += 1;
            straight_runs += 1;
        }

        let kid = mv.piece() as usize;
        println!(
            "step {} (runs {}, lines {}): \"{}\" {}",
            count,
            piece_runs,
            straight_runs,
            puzzle.pieces[kid].name,
            mv.dir().name()
        );
        colist[kid] = colist[kid].step(mv.dir());
        print!("{}", name_matrix(puzzle, &colist));
    }

    println!();
    println!(
        "solved: {} steps, {} piece runs, {} straight runs",
        hist.len() - 1,
        piece_runs,
        straight_runs
    );
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::gameplay::Dir;
    use crate::puzzle::Puzzle;

    use super::*;

    const PUZZLE: &str = r#"{
        "name": "render",
        "board": { "size": [4, 5], "extwall": [[2, 3]], "mirror": false },
        "classes": [
            { "name": "bar", "size": [1, 2] },
            { "name": "pawn", "size": [1, 1] }
        ],
        "pieces": [
            { "name": "bar", "class": "bar", "init": [1, 1], "goal": [2, 1] },
            { "name": "pawn", "class": "pawn", "init": [1, 3] }
        ]
    }"#;

    #[test]
    fn renders_pieces_walls_and_gaps() {
        let puzzle = Puzzle::from_json(PUZZLE).unwrap();
        assert_eq!(
            name_matrix(&puzzle, &puzzle.init),
            "ba ba pa\n.  .    \n"
        );
    }

    #[test]
    fn absent_pieces_are_not_drawn() {
        let puzzle = Puzzle::from_json(PUZZLE).unwrap();
        assert_eq!(
            name_matrix(&puzzle, &puzzle.goal_colist()),
            ".  .  . \nba ba   \n"
        );
    }

    #[test]
    fn replay_counters_follow_the_history() {
        // exercised for panics only; the counter arithmetic is asserted in
        // the search tests via Mcr::rlc
        let puzzle = Puzzle::from_json(PUZZLE).unwrap();
        let hist = vec![
            Move::SENTINEL,
            Move::new(1, Dir::South),
            Move::new(2, Dir::West),
            Move::new(2, Dir::West),
        ];
        print_answer(&puzzle, &hist);
    }
}
