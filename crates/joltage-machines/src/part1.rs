use std::collections::VecDeque;

use bitvec::prelude::*;
use miette::*;

use crate::machine::{parse_machines, Machine};

/// Fewest button presses that take every light from OFF to the machine's
/// target configuration, or `None` if no sequence of presses reaches it.
///
/// Breadth-first search over the `2^light_count` configuration space: states
/// are light bitmasks, each press XORs one button mask into the state, and
/// the first time the target is discovered its depth is the minimum. Button
/// order changes the exploration order only, never the answer.
pub fn minimum_presses(machine: &Machine) -> Option<usize> {
    let target = machine.target_mask();
    if target == 0 {
        return Some(0);
    }

    let mut visited = bitvec![0; 1usize << machine.light_count()];
    let mut queue = VecDeque::from([(0u32, 0usize)]);
    visited.set(0, true);

    while let Some((state, presses)) = queue.pop_front() {
        for &button in machine.button_masks() {
            let next = state ^ button;
            if !visited[next as usize] {
                if next == target {
                    return Some(presses + 1);
                }
                visited.set(next as usize, true);
                queue.push_back((next, presses + 1));
            }
        }
    }

    None
}

#[tracing::instrument]
pub fn process(input: &str) -> Result<String> {
    let machines = parse_machines(input)?;

    let total_presses: usize = machines
        .iter()
        .enumerate()
        .map(|(index, machine)| {
            minimum_presses(machine)
                .ok_or_else(|| miette!("machine {index} cannot reach its target configuration"))
        })
        .sum::<Result<usize>>()?;

    Ok(total_presses.to_string())
}
