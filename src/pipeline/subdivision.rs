// Per-beat subdivision. A beat is split into 1, 2 or 4 equal slots; the slots
// start on base steps (4 per beat), so every slot position is a whole step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shared::STEPS_PER_BEAT;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Division {
    #[default]
    One,
    Two,
    Four,
}

impl Division {
    pub fn from_factor(factor: u8) -> Option<Self> {
        match factor {
            1 => Some(Division::One),
            2 => Some(Division::Two),
            4 => Some(Division::Four),
            _ => None,
        }
    }

    pub fn factor(self) -> u8 {
        match self {
            Division::One => 1,
            Division::Two => 2,
            Division::Four => 4,
        }
    }

    /// Base steps covered by one slot of this division.
    pub fn slot_len(self) -> usize {
        STEPS_PER_BEAT / self.factor() as usize
    }

    pub fn next(self) -> Self {
        match self {
            Division::One => Division::Two,
            Division::Two => Division::Four,
            Division::Four => Division::One,
        }
    }
}

impl From<Division> for u8 {
    fn from(d: Division) -> Self {
        d.factor()
    }
}

impl TryFrom<u8> for Division {
    type Error = String;

    fn try_from(factor: u8) -> Result<Self, Self::Error> {
        Division::from_factor(factor).ok_or_else(|| format!("unsupported division {factor}"))
    }
}

/// Beat index -> division. Missing beats are `Division::One`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubdivisionMap {
    divisions: BTreeMap<usize, Division>,
}

impl SubdivisionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_division(&mut self, beat: usize, division: Division) {
        if division == Division::One {
            self.divisions.remove(&beat); // default, keep the map sparse
        } else {
            self.divisions.insert(beat, division);
        }
    }

    /// Raw factor version; anything outside {1, 2, 4} is ignored.
    pub fn set_factor(&mut self, beat: usize, factor: u8) -> bool {
        match Division::from_factor(factor) {
            Some(d) => {
                self.set_division(beat, d);
                true
            }
            None => {
                log::debug!("ignoring division {factor} for beat {beat}");
                false
            }
        }
    }

    /// 1 -> 2 -> 4 -> 1
    pub fn cycle_division(&mut self, beat: usize) -> Division {
        let next = self.division_of(beat).next();
        self.set_division(beat, next);
        next
    }

    pub fn division_of(&self, beat: usize) -> Division {
        self.divisions.get(&beat).copied().unwrap_or_default()
    }

    pub fn step_positions_of(&self, beat: usize) -> Vec<usize> {
        let division = self.division_of(beat);
        let base = beat * STEPS_PER_BEAT;
        (0..division.factor() as usize)
            .map(|i| base + i * division.slot_len())
            .collect()
    }

    /// Start of the slot that contains `step`.
    pub fn slot_start(&self, step: usize) -> usize {
        let beat = step / STEPS_PER_BEAT;
        let len = self.division_of(beat).slot_len();
        let offset = step % STEPS_PER_BEAT;
        beat * STEPS_PER_BEAT + (offset / len) * len
    }

    /// Length in base steps of the slot that contains `step`.
    pub fn slot_len_at(&self, step: usize) -> usize {
        self.division_of(step / STEPS_PER_BEAT).slot_len()
    }

    pub fn is_slot_start(&self, step: usize) -> bool {
        self.slot_start(step) == step
    }

    /// Start of the slot after the one containing `step`.
    pub fn next_slot(&self, step: usize) -> usize {
        self.slot_start(step) + self.slot_len_at(step)
    }

    /// Start of the slot before the one containing `step`; None at step 0.
    pub fn previous_slot(&self, step: usize) -> Option<usize> {
        let start = self.slot_start(step);
        if start == 0 {
            return None;
        }
        Some(self.slot_start(start - 1))
    }

    /// Every slot start below `total_steps`, in order.
    pub fn slot_starts(&self, total_steps: usize) -> Vec<usize> {
        let beats = total_steps.div_ceil(STEPS_PER_BEAT);
        (0..beats)
            .flat_map(|beat| self.step_positions_of(beat))
            .filter(|&s| s < total_steps)
            .collect()
    }
}
