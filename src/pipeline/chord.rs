// Chord generation: turns (root, octave, type, start, length) into grid cells.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::channel::ChannelKind;
use super::grid::CellKey;
use super::pitch::{NoteName, Pitch};
use super::subdivision::SubdivisionMap;
use crate::shared::STEPS_PER_BEAT;

/// Seconds between chord tones when previewing, so one voice never gets
/// several identical-time triggers.
pub const PREVIEW_STAGGER: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordType {
    Major,
    Minor,
    Augmented,
    Diminished,
    MajorSeventh,
    MinorSeventh,
    DominantSeventh,
}

impl ChordType {
    pub const ALL: [ChordType; 7] = [
        ChordType::Major,
        ChordType::Minor,
        ChordType::Augmented,
        ChordType::Diminished,
        ChordType::MajorSeventh,
        ChordType::MinorSeventh,
        ChordType::DominantSeventh,
    ];

    /// Semitone offsets from the root, lowest first.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordType::Major => &[0, 4, 7],
            ChordType::Minor => &[0, 3, 7],
            ChordType::Augmented => &[0, 4, 8],
            ChordType::Diminished => &[0, 3, 6],
            ChordType::MajorSeventh => &[0, 4, 7, 11],
            ChordType::MinorSeventh => &[0, 3, 7, 10],
            ChordType::DominantSeventh => &[0, 4, 7, 10],
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ChordType::Major => "maj",
            ChordType::Minor => "m",
            ChordType::Augmented => "aug",
            ChordType::Diminished => "dim",
            ChordType::MajorSeventh => "maj7",
            ChordType::MinorSeventh => "m7",
            ChordType::DominantSeventh => "7",
        }
    }

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ChordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ChordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.symbol() == s)
            .ok_or_else(|| format!("unknown chord type {s:?}"))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChordAlignment {
    /// Every base step in the range (4 per beat).
    #[default]
    BaseSteps,
    /// Only the slot starts of the subdivision map inside the range.
    GridSlots,
}

impl ChordAlignment {
    pub fn toggled(self) -> Self {
        match self {
            ChordAlignment::BaseSteps => ChordAlignment::GridSlots,
            ChordAlignment::GridSlots => ChordAlignment::BaseSteps,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChordAlignment::BaseSteps => "steps",
            ChordAlignment::GridSlots => "slots",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChordRequest {
    pub root: String, // pitch-class name, e.g. "C#"
    pub octave: i8,
    pub chord: ChordType,
    pub start_step: usize,
    pub beats: f32,
}

/// Chord tones that land inside the channel's octave range. Tones pushed
/// past the top octave are dropped, not folded back.
pub fn chord_pitches(root: NoteName, octave: i8, chord: ChordType, kind: &ChannelKind) -> Vec<Pitch> {
    let root_index = root.index();
    chord
        .intervals()
        .iter()
        .filter_map(|offset| {
            let total = root_index + offset;
            let pitch = Pitch::new(NoteName::from_index(total % 12), octave.checked_add((total / 12) as i8)?);
            kind.supports_octave(pitch.octave).then_some(pitch)
        })
        .collect()
}

/// Length in base steps, if `beats` is a positive whole number of steps.
fn steps_for(beats: f32) -> Option<usize> {
    let steps = beats * STEPS_PER_BEAT as f32;
    if !steps.is_finite() || steps < 1.0 || steps.fract() != 0.0 {
        return None;
    }
    Some(steps as usize)
}

/// Cells to activate for `req`. Empty when the channel is percussive, the
/// root is not a note name, or the length is not whole steps.
pub fn chord_cells(
    req: &ChordRequest,
    kind: &ChannelKind,
    total_steps: usize,
    subdivisions: &SubdivisionMap,
    alignment: ChordAlignment,
) -> Vec<CellKey> {
    if kind.is_percussive() {
        log::debug!("chords are not available on percussive channels");
        return Vec::new();
    }
    let Ok(root) = req.root.parse::<NoteName>() else {
        log::debug!("unknown chord root {:?}", req.root);
        return Vec::new();
    };
    let Some(len) = steps_for(req.beats) else {
        log::debug!("chord length {} beats is not whole steps", req.beats);
        return Vec::new();
    };

    let end = (req.start_step + len).min(total_steps);
    let steps: Vec<usize> = match alignment {
        ChordAlignment::BaseSteps => (req.start_step..end).collect(),
        ChordAlignment::GridSlots => subdivisions
            .slot_starts(total_steps)
            .into_iter()
            .filter(|s| (req.start_step..end).contains(s))
            .collect(),
    };

    let pitches = chord_pitches(root, req.octave, req.chord, kind);
    steps
        .iter()
        .flat_map(|&step| pitches.iter().map(move |&pitch| CellKey::new(pitch, step)))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviewNote {
    pub pitch: Pitch,
    pub delay: f64, // seconds from now
}

/// The chord tones to audition, staggered by `PREVIEW_STAGGER`.
pub fn preview_notes(req: &ChordRequest, kind: &ChannelKind) -> Vec<PreviewNote> {
    if kind.is_percussive() {
        return Vec::new();
    }
    let Ok(root) = req.root.parse::<NoteName>() else {
        return Vec::new();
    };
    chord_pitches(root, req.octave, req.chord, kind)
        .into_iter()
        .enumerate()
        .map(|(i, pitch)| PreviewNote {
            pitch,
            delay: i as f64 * PREVIEW_STAGGER,
        })
        .collect()
}
