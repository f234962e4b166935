use chumsky::prelude::*;
use miette::*;
use thiserror::Error;

/// Hard capacity ceiling on lights per machine.
///
/// The reachability solver walks a dense `2^light_count` state space, so the
/// limit is enforced here, at construction, rather than letting a solver
/// attempt the allocation.
pub const MAX_LIGHTS: usize = 26;

/// One parsed puzzle instance: a target light configuration, the buttons
/// that toggle light subsets, and optional per-light joltage requirements.
#[derive(Debug, Clone)]
pub struct Machine {
    light_count: usize,
    target_mask: u32,
    button_masks: Vec<u32>,
    joltage: Option<Vec<u64>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("machine has {0} lights, but at most {MAX_LIGHTS} are supported")]
    TooManyLights(usize),
    #[error("button {button} toggles light {index}, but only {lights} lights exist")]
    LightOutOfRange {
        button: usize,
        index: usize,
        lights: usize,
    },
    #[error("{found} joltage values given for {expected} lights")]
    JoltageMismatch { expected: usize, found: usize },
}

impl Machine {
    /// Validates and builds a machine from its parsed parts: the light
    /// pattern (`true` = must end ON), per-button lists of toggled light
    /// indices, and the optional joltage requirements.
    pub fn new(
        pattern: Vec<bool>,
        buttons: Vec<Vec<usize>>,
        joltage: Option<Vec<u64>>,
    ) -> Result<Self, MachineError> {
        let light_count = pattern.len();
        if light_count > MAX_LIGHTS {
            return Err(MachineError::TooManyLights(light_count));
        }

        let mut target_mask = 0u32;
        for (index, lit) in pattern.into_iter().enumerate() {
            if lit {
                target_mask |= 1 << index;
            }
        }

        let mut button_masks = Vec::with_capacity(buttons.len());
        for (button, indices) in buttons.into_iter().enumerate() {
            let mut mask = 0u32;
            for index in indices {
                if index >= light_count {
                    return Err(MachineError::LightOutOfRange {
                        button,
                        index,
                        lights: light_count,
                    });
                }
                mask |= 1 << index;
            }
            button_masks.push(mask);
        }

        if let Some(joltage) = &joltage {
            if joltage.len() != light_count {
                return Err(MachineError::JoltageMismatch {
                    expected: light_count,
                    found: joltage.len(),
                });
            }
        }

        Ok(Self {
            light_count,
            target_mask,
            button_masks,
            joltage,
        })
    }

    pub fn light_count(&self) -> usize {
        self.light_count
    }

    /// Bit `i` set means light `i` must end ON.
    pub fn target_mask(&self) -> u32 {
        self.target_mask
    }

    /// One mask per button; bit `i` set means the button toggles light `i`.
    /// Order is only significant as a stable index for press-count vectors.
    pub fn button_masks(&self) -> &[u32] {
        &self.button_masks
    }

    /// Per-light joltage requirements, absent when the machine has none.
    pub fn joltage(&self) -> Option<&[u64]> {
        self.joltage.as_deref()
    }
}

type RawMachine = (Vec<bool>, Vec<Vec<usize>>, Option<Vec<u64>>);

/// Parses one machine description, e.g. `[.##.] (3) (1,3) (0,2) {3,5,4,7}`.
/// `#` marks a light that must end ON; any other character inside the
/// brackets marks one that must end OFF.
fn machine_line<'a>() -> impl Parser<'a, &'a str, RawMachine, extra::Err<Rich<'a, char>>> {
    let hspace = one_of(" \t").repeated();

    // [.##.]
    let light = choice((just('#').to(true), none_of("]").to(false)));
    let diagram = light
        .repeated()
        .collect::<Vec<bool>>()
        .delimited_by(just('['), just(']'));

    // (0,2,3)
    let button = text::int(10)
        .from_str::<usize>()
        .unwrapped()
        .separated_by(just(','))
        .collect::<Vec<usize>>()
        .delimited_by(just('('), just(')'));
    let buttons = button.padded_by(hspace).repeated().collect::<Vec<_>>();

    // {3,5,4,7}
    let joltage = text::int(10)
        .from_str::<u64>()
        .unwrapped()
        .separated_by(just(','))
        .collect::<Vec<u64>>()
        .delimited_by(just('{'), just('}'));

    diagram
        .then_ignore(hspace)
        .then(buttons)
        .then(joltage.or_not().padded_by(hspace))
        .map(|((pattern, buttons), joltage)| (pattern, buttons, joltage))
}

/// Parses every machine in the input, one per line. Lines without a bracketed
/// light pattern are skipped; a machine-bearing line that fails to parse or
/// validate is a diagnostic naming the line.
pub fn parse_machines(input: &str) -> Result<Vec<Machine>> {
    let line_parser = machine_line();
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains('['))
        .map(|(number, line)| {
            let (pattern, buttons, joltage) = line_parser
                .parse(line.trim_end())
                .into_result()
                .map_err(|e| miette!("machine on line {}: parse failed: {:?}", number + 1, e))?;
            Machine::new(pattern, buttons, joltage)
                .map_err(|e| miette!("machine on line {}: {}", number + 1, e))
        })
        .collect()
}
