use itertools::Itertools;
use miette::*;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::machine::{parse_machines, Machine};

/// Numerical epsilon for "effectively zero" and integrality decisions.
const EPSILON: f64 = 1e-9;

/// The button-to-light incidence system augmented with the joltage targets,
/// row-reduced so that press-count variables split into `dependents` (pivot
/// columns, one per reduced row, determined by the free ones) and
/// `independents` (free columns, ascending).
///
/// Pivot rows are fully reduced: each pivot entry is exactly 1 and its
/// column is zero in every other row.
pub struct ReducedSystem {
    matrix: DMatrix<f64>,
    buttons: usize,
    dependents: Vec<usize>,
    independents: Vec<usize>,
}

impl ReducedSystem {
    /// Builds the augmented `lights x (buttons + 1)` matrix and eliminates it
    /// with partial pivoting: the remaining row with the largest absolute
    /// coefficient anchors each column. Columns with no coefficient above
    /// epsilon become free variables.
    ///
    /// Returns `None` when a row reduces to `0 = c` with `c` nonzero; no
    /// press-count vector can satisfy such a system.
    pub fn reduce(machine: &Machine, joltage: &[u64]) -> Option<Self> {
        let lights = machine.light_count();
        let buttons = machine.button_masks().len();

        let mut matrix = DMatrix::zeros(lights, buttons + 1);
        for (col, &mask) in machine.button_masks().iter().enumerate() {
            for row in 0..lights {
                if mask & (1 << row) != 0 {
                    matrix[(row, col)] = 1.0;
                }
            }
        }
        for (row, &target) in joltage.iter().enumerate() {
            matrix[(row, buttons)] = target as f64;
        }

        let mut dependents = Vec::new();
        let mut independents = Vec::new();
        let mut pivot_row = 0;

        for col in 0..buttons {
            let pivot = (pivot_row..lights)
                .max_by(|&a, &b| matrix[(a, col)].abs().total_cmp(&matrix[(b, col)].abs()));

            match pivot {
                Some(row) if matrix[(row, col)].abs() > EPSILON => {
                    matrix.swap_rows(pivot_row, row);

                    let pivot_value = matrix[(pivot_row, col)];
                    for c in 0..=buttons {
                        matrix[(pivot_row, c)] /= pivot_value;
                    }

                    for other in 0..lights {
                        let factor = matrix[(other, col)];
                        if other != pivot_row && factor.abs() > EPSILON {
                            for c in 0..=buttons {
                                let delta = factor * matrix[(pivot_row, c)];
                                matrix[(other, c)] -= delta;
                            }
                        }
                    }

                    dependents.push(col);
                    pivot_row += 1;
                }
                _ => independents.push(col),
            }
        }

        // A row without a pivot has every coefficient eliminated; a nonzero
        // augmented entry there means 0 = c and the system has no solution.
        for row in pivot_row..lights {
            if matrix[(row, buttons)].abs() > EPSILON {
                return None;
            }
        }

        Some(Self {
            matrix,
            buttons,
            dependents,
            independents,
        })
    }

    /// Free columns, ascending.
    pub fn independents(&self) -> &[usize] {
        &self.independents
    }

    /// Pivot columns, in reduced-row order.
    pub fn dependents(&self) -> &[usize] {
        &self.dependents
    }

    /// Checks one assignment to the free variables (in `independents` order)
    /// and returns the candidate total press count: the supplied values plus
    /// every dependent value they imply. `None` if any implied value is
    /// negative beyond epsilon or not within epsilon of an integer.
    pub fn valid(&self, values: &[u64]) -> Option<u64> {
        let mut total: u64 = values.iter().sum();
        for row in 0..self.dependents.len() {
            total += self.implied(row, values)?;
        }
        Some(total)
    }

    /// The full per-button press-count vector for an accepted assignment,
    /// under the same rejection rules as [`valid`](Self::valid).
    pub fn press_counts(&self, values: &[u64]) -> Option<Vec<u64>> {
        let mut counts = vec![0u64; self.buttons];
        for (&col, &value) in self.independents.iter().zip_eq(values) {
            counts[col] = value;
        }
        for (row, &col) in self.dependents.iter().enumerate() {
            counts[col] = self.implied(row, values)?;
        }
        Some(counts)
    }

    /// Dependent value implied by one reduced row: the augmented entry minus
    /// the dot product of the row's free-column coefficients with the
    /// supplied values.
    fn implied(&self, row: usize, values: &[u64]) -> Option<u64> {
        let mut value = self.matrix[(row, self.buttons)];
        for (&col, &supplied) in self.independents.iter().zip_eq(values) {
            value -= self.matrix[(row, col)] * supplied as f64;
        }

        if value < -EPSILON {
            return None;
        }
        let rounded = value.round();
        if (value - rounded).abs() > EPSILON {
            return None;
        }
        Some(rounded.max(0.0) as u64)
    }
}

/// Fewest total button presses whose accumulated contributions meet every
/// light's joltage requirement exactly, with every per-button press count a
/// non-negative integer. `Some(0)` when the machine has no joltage
/// constraint; `None` when no press-count vector satisfies it.
pub fn minimum_joltage_presses(machine: &Machine) -> Option<u64> {
    let Some(joltage) = machine.joltage() else {
        return Some(0);
    };

    // Empty system: nothing to press, so only an all-zero demand is satisfiable.
    if machine.light_count() == 0 || machine.button_masks().is_empty() {
        return joltage.iter().all(|&j| j == 0).then_some(0);
    }

    let system = ReducedSystem::reduce(machine, joltage)?;

    // No button contributes more than 1 per press to any light, so a press
    // count above the largest target would drive that light's value past it.
    let max_press = joltage.iter().copied().max().unwrap_or(0) + 1;
    solve_with_bound(&system, max_press)
}

fn solve_with_bound(system: &ReducedSystem, max_press: u64) -> Option<u64> {
    let mut best = None;
    let mut values = Vec::with_capacity(system.independents().len());
    explore(system, max_press, 0, &mut values, &mut best);
    best
}

/// Depth-first enumeration of the free variables in their stored order,
/// pruned against the best total found so far.
fn explore(
    system: &ReducedSystem,
    max_press: u64,
    partial: u64,
    values: &mut Vec<u64>,
    best: &mut Option<u64>,
) {
    if values.len() == system.independents().len() {
        if let Some(total) = system.valid(values) {
            if total < best.unwrap_or(u64::MAX) {
                *best = Some(total);
            }
        }
        return;
    }

    for candidate in 0..max_press {
        // Candidates ascend, so once the running sum of free values reaches
        // the best total, nothing at this depth or deeper can improve on it.
        if best.is_some_and(|b| partial + candidate >= b) {
            break;
        }
        values.push(candidate);
        explore(system, max_press, partial + candidate, values, best);
        values.pop();
    }
}

#[tracing::instrument]
pub fn process(input: &str) -> Result<String> {
    let machines = parse_machines(input)?;

    let total_presses: u64 = machines
        .par_iter()
        .enumerate()
        .map(|(index, machine)| {
            let presses = minimum_joltage_presses(machine)
                .ok_or_else(|| miette!("machine {index} has no valid joltage configuration"))?;
            tracing::debug!(machine = index, presses, "joltage requirements satisfied");
            Ok(presses)
        })
        .sum::<Result<u64>>()?;

    Ok(total_presses.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn machine(line: &str) -> Machine {
        parse_machines(line).unwrap().remove(0)
    }

    #[test]
    fn it_works() -> Result<()> {
        let input = "[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}
[...#.] (0,2,3,4) (2,3) (0,4) (0,1,2) (1,2,3,4) {7,5,12,7,2}
[.###.#] (0,1,2,3,4) (0,3,4) (0,1,2,4,5) (1,2) {10,11,11,5,10,5}";
        assert_eq!("33", process(input)?);
        Ok(())
    }

    #[rstest]
    #[case("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}", 10)]
    #[case("[...#.] (0,2,3,4) (2,3) (0,4) (0,1,2) (1,2,3,4) {7,5,12,7,2}", 12)]
    #[case("[.###.#] (0,1,2,3,4) (0,3,4) (0,1,2,4,5) (1,2) {10,11,11,5,10,5}", 11)]
    fn solves_each_example_machine(#[case] line: &str, #[case] expected: u64) {
        assert_eq!(minimum_joltage_presses(&machine(line)), Some(expected));
    }

    #[test]
    fn absent_joltage_needs_no_presses() {
        assert_eq!(minimum_joltage_presses(&machine("[#.] (0)")), Some(0));
    }

    #[test]
    fn duplicate_button_masks_are_both_usable() {
        assert_eq!(minimum_joltage_presses(&machine("[#] (0) (0) {2}")), Some(2));
    }

    #[test]
    fn fully_determined_system_has_no_free_variables() {
        let machine = machine("[#] (0) {3}");
        let system = ReducedSystem::reduce(&machine, machine.joltage().unwrap()).unwrap();
        assert!(system.independents().is_empty());
        assert_eq!(system.dependents(), &[0]);
        assert_eq!(system.valid(&[]), Some(3));
        assert_eq!(minimum_joltage_presses(&machine), Some(3));
    }

    #[test]
    fn contradictory_targets_are_unsolvable() {
        assert_eq!(minimum_joltage_presses(&machine("[##] (0,1) {1,2}")), None);
    }

    #[test]
    fn empty_system_with_zero_demand_is_free() {
        assert_eq!(minimum_joltage_presses(&machine("[..] {0,0}")), Some(0));
    }

    #[test]
    fn empty_system_with_nonzero_demand_is_unsolvable() {
        assert_eq!(minimum_joltage_presses(&machine("[.] {5}")), None);
    }

    #[test]
    fn accepted_assignments_reproduce_the_joltage_targets() {
        let machine = machine("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}");
        let joltage = machine.joltage().unwrap();
        let system = ReducedSystem::reduce(&machine, joltage).unwrap();
        assert_eq!(system.independents().len(), 2);

        let mut accepted = 0;
        for a in 0..8 {
            for b in 0..8 {
                let Some(counts) = system.press_counts(&[a, b]) else {
                    continue;
                };
                accepted += 1;
                for (light, &target) in joltage.iter().enumerate() {
                    let value: u64 = machine
                        .button_masks()
                        .iter()
                        .zip(&counts)
                        .filter(|(&mask, _)| mask & (1 << light) != 0)
                        .map(|(_, &presses)| presses)
                        .sum();
                    assert_eq!(value, target, "light {light} for assignment {a},{b}");
                }
            }
        }
        assert!(accepted > 0);
    }

    #[test]
    fn raising_the_press_bound_does_not_change_the_minimum() {
        let machine = machine("[.##.] (3) (1,3) (2) (2,3) (0,2) (0,1) {3,5,4,7}");
        let system = ReducedSystem::reduce(&machine, machine.joltage().unwrap()).unwrap();
        assert_eq!(solve_with_bound(&system, 8), Some(10));
        assert_eq!(solve_with_bound(&system, 13), Some(10));
    }
}
