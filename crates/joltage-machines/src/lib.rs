//! Solvers for light-and-button machines: the fewest presses that reach a
//! target light configuration (part 1), and the fewest presses that satisfy
//! per-light joltage requirements exactly (part 2).

pub mod machine;
pub mod part1;
pub mod part2;
