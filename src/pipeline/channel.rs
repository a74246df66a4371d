// Channel catalogue: what each instrument channel can hold and which voice plays it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::pitch::{NoteName, Pitch};

pub const MIN_MELODIC_OCTAVE: i8 = 1;
pub const MAX_MELODIC_OCTAVE: i8 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
    Kit, // pitch-keyed drum sounds, see audio/engine.rs
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceSpec {
    Synth { waveform: Waveform },
    Sampler { dir: PathBuf }, // <Pitch>.wav files, relative to the project dir
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelKind {
    /// Sustained notes over a range of octaves; legato is inferred.
    Melodic { lowest_octave: i8, highest_octave: i8 },
    /// Fixed set of pitches, each fired for a fixed short duration.
    Percussive { pitches: Vec<Pitch> },
}

impl ChannelKind {
    pub fn melodic() -> Self {
        ChannelKind::Melodic {
            lowest_octave: MIN_MELODIC_OCTAVE,
            highest_octave: MAX_MELODIC_OCTAVE,
        }
    }

    pub fn is_percussive(&self) -> bool {
        matches!(self, ChannelKind::Percussive { .. })
    }

    pub fn supports_octave(&self, octave: i8) -> bool {
        match self {
            ChannelKind::Melodic { lowest_octave, highest_octave } => {
                (*lowest_octave..=*highest_octave).contains(&octave)
            }
            ChannelKind::Percussive { .. } => false,
        }
    }

    pub fn supports(&self, pitch: Pitch) -> bool {
        match self {
            ChannelKind::Melodic { .. } => self.supports_octave(pitch.octave),
            ChannelKind::Percussive { pitches } => pitches.contains(&pitch),
        }
    }

    /// Editable rows, highest pitch first.
    pub fn rows(&self) -> Vec<Pitch> {
        let mut rows: Vec<Pitch> = match self {
            ChannelKind::Melodic { lowest_octave, highest_octave } => (*lowest_octave..=*highest_octave)
                .flat_map(|octave| (0..12).map(move |i| Pitch::new(NoteName::from_index(i), octave)))
                .collect(),
            ChannelKind::Percussive { pitches } => pitches.clone(),
        };
        rows.sort();
        rows.reverse();
        rows
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub kind: ChannelKind,
    pub voice: VoiceSpec,
}

// General-MIDI-ish kit layout
pub const KICK: Pitch = Pitch::new(NoteName::C, 1);
pub const SNARE: Pitch = Pitch::new(NoteName::D, 1);
pub const CLOSED_HAT: Pitch = Pitch::new(NoteName::Fs, 1);
pub const OPEN_HAT: Pitch = Pitch::new(NoteName::As, 1);
pub const CLAP: Pitch = Pitch::new(NoteName::Cs, 2);

pub fn drum_label(pitch: Pitch) -> Option<&'static str> {
    match pitch {
        KICK => Some("kick"),
        SNARE => Some("snare"),
        CLOSED_HAT => Some("hat"),
        OPEN_HAT => Some("open"),
        CLAP => Some("clap"),
        _ => None,
    }
}

pub fn default_channels() -> Vec<ChannelSpec> {
    vec![
        ChannelSpec {
            name: "lead".into(),
            kind: ChannelKind::melodic(),
            voice: VoiceSpec::Synth { waveform: Waveform::Square },
        },
        ChannelSpec {
            name: "pad".into(),
            kind: ChannelKind::melodic(),
            voice: VoiceSpec::Synth { waveform: Waveform::Triangle },
        },
        ChannelSpec {
            name: "piano".into(),
            kind: ChannelKind::melodic(),
            voice: VoiceSpec::Sampler { dir: PathBuf::from("samples/piano") },
        },
        ChannelSpec {
            name: "drums".into(),
            kind: ChannelKind::Percussive {
                pitches: vec![KICK, SNARE, CLOSED_HAT, OPEN_HAT, CLAP],
            },
            voice: VoiceSpec::Synth { waveform: Waveform::Kit },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn melodic_rows_cover_every_octave() {
        let rows = ChannelKind::melodic().rows();
        assert_eq!(rows.len(), 72);
        assert_eq!(rows[0], Pitch::new(NoteName::B, 6));
        assert_eq!(rows[71], Pitch::new(NoteName::C, 1));
    }

    #[test]
    fn percussion_only_supports_its_kit() {
        let kit = &default_channels()[3].kind;
        assert!(kit.is_percussive());
        assert!(kit.supports(SNARE));
        assert!(!kit.supports(Pitch::new(NoteName::E, 1)));
        assert!(!kit.supports_octave(1));
    }

    #[test]
    fn catalogue_round_trips_as_json() {
        let channels = default_channels();
        let json = serde_json::to_string(&channels).unwrap();
        let back: Vec<ChannelSpec> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, channels);
    }
}
