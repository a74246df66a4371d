// Pitch value types: a chromatic note name plus an octave number.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoteName {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

pub const NOTE_NAMES: [NoteName; 12] = [
    NoteName::C,
    NoteName::Cs,
    NoteName::D,
    NoteName::Ds,
    NoteName::E,
    NoteName::F,
    NoteName::Fs,
    NoteName::G,
    NoteName::Gs,
    NoteName::A,
    NoteName::As,
    NoteName::B,
];

impl NoteName {
    /// Semitone above C, 0..12
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Self {
        NOTE_NAMES[(index % 12) as usize]
    }

    pub fn label(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::Cs => "C#",
            NoteName::D => "D",
            NoteName::Ds => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::Fs => "F#",
            NoteName::G => "G",
            NoteName::Gs => "G#",
            NoteName::A => "A",
            NoteName::As => "A#",
            NoteName::B => "B",
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsePitchError(pub String);

impl fmt::Display for ParsePitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a pitch: {:?}", self.0)
    }
}

impl std::error::Error for ParsePitchError {}

// Accepts "C", "C#", "Cs", "Db" and the lowercase forms. Flats fold onto sharps.
impl FromStr for NoteName {
    type Err = ParsePitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(|| ParsePitchError(s.to_string()))?;
        let natural: u8 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(ParsePitchError(s.to_string())),
        };
        let index = match chars.as_str() {
            "" => natural,
            "#" | "s" => natural + 1,
            "b" => (natural + 11) % 12,
            _ => return Err(ParsePitchError(s.to_string())),
        };
        Ok(NoteName::from_index(index))
    }
}

/// A note name at a given octave. C4 is middle C (MIDI 60).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Pitch {
    pub name: NoteName,
    pub octave: i8,
}

impl Pitch {
    /// Sorts below every playable pitch; used as a range bound.
    pub const MIN: Pitch = Pitch { name: NoteName::C, octave: i8::MIN };

    pub const fn new(name: NoteName, octave: i8) -> Self {
        Self { name, octave }
    }

    pub fn midi(self) -> i16 {
        (self.octave as i16 + 1) * 12 + self.name.index() as i16
    }

    pub fn from_midi(midi: i16) -> Self {
        let octave = midi.div_euclid(12) - 1;
        let index = midi.rem_euclid(12) as u8;
        Self {
            name: NoteName::from_index(index),
            octave: octave.clamp(i8::MIN as i16, i8::MAX as i16) as i8,
        }
    }

    pub fn frequency(self) -> f32 {
        440.0 * 2.0_f32.powf((self.midi() as f32 - 69.0) / 12.0)
    }

    /// Move up by `semitones`, carrying into the octave.
    pub fn transpose(self, semitones: i16) -> Self {
        Self::from_midi(self.midi() + semitones)
    }
}

impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pitch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.midi().cmp(&other.midi())
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name.label(), self.octave)
    }
}

impl FromStr for Pitch {
    type Err = ParsePitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(|| ParsePitchError(s.to_string()))?;
        let (name, octave) = s.split_at(split);
        let name: NoteName = name.parse().map_err(|_| ParsePitchError(s.to_string()))?;
        let octave: i8 = octave.parse().map_err(|_| ParsePitchError(s.to_string()))?;
        Ok(Pitch { name, octave })
    }
}

impl From<Pitch> for String {
    fn from(p: Pitch) -> Self {
        p.to_string()
    }
}

impl TryFrom<String> for Pitch {
    type Error = ParsePitchError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
