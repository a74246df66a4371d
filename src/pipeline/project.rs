// The editable document: settings, channel catalogue, grid and subdivisions.
// Every write goes through here and is checked against the arrangement bounds
// before it reaches the grid store. Rejected writes leave state untouched.

use serde::{Deserialize, Serialize};

use super::channel::{ChannelSpec, default_channels};
use super::chord::{ChordAlignment, ChordRequest, chord_cells};
use super::grid::GridStore;
use super::pitch::Pitch;
use super::subdivision::{Division, SubdivisionMap};
use crate::shared::{ChannelId, MAX_MEASURES, MIN_MEASURES, STEPS_PER_BEAT, STEPS_PER_MEASURE};
use crate::transport::clamp_bpm;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub measures: u8,
    pub bpm: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            measures: 4,
            bpm: 120.0,
        }
    }
}

impl Settings {
    pub fn clamped(self) -> Self {
        Self {
            measures: self.measures.clamp(MIN_MEASURES, MAX_MEASURES),
            bpm: clamp_bpm(self.bpm),
        }
    }

    pub fn total_steps(&self) -> usize {
        self.measures as usize * STEPS_PER_MEASURE
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectState {
    pub settings: Settings,
    pub channels: Vec<ChannelSpec>,
    pub grid: GridStore,
    pub subdivisions: SubdivisionMap,
    pub selected_channel: ChannelId,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::with_channels(default_channels())
    }
}

impl ProjectState {
    pub fn with_channels(channels: Vec<ChannelSpec>) -> Self {
        Self {
            settings: Settings::default(),
            grid: GridStore::new(channels.len()),
            channels,
            subdivisions: SubdivisionMap::new(),
            selected_channel: 0,
        }
    }

    /// Repair whatever a hand-edited or older project file got wrong.
    pub fn normalized(mut self) -> Self {
        if self.channels.is_empty() {
            self.channels = default_channels();
        }
        self.settings = self.settings.clamped();
        self.grid.ensure_channels(self.channels.len());
        if self.selected_channel >= self.channels.len() {
            self.selected_channel = 0;
        }
        self
    }

    pub fn total_steps(&self) -> usize {
        self.settings.total_steps()
    }

    pub fn channel(&self, channel: ChannelId) -> Option<&ChannelSpec> {
        self.channels.get(channel)
    }

    pub fn select_channel(&mut self, channel: ChannelId) -> bool {
        if channel >= self.channels.len() {
            return false;
        }
        self.selected_channel = channel;
        true
    }

    fn accepts(&self, channel: ChannelId, pitch: Pitch, step: usize) -> bool {
        let ok = step < self.total_steps()
            && self.channel(channel).is_some_and(|spec| spec.kind.supports(pitch));
        if !ok {
            log::debug!("rejected edit: channel {channel} {pitch} step {step}");
        }
        ok
    }

    /// False if the write was rejected.
    pub fn set_cell(&mut self, channel: ChannelId, pitch: Pitch, step: usize, active: bool) -> bool {
        if !self.accepts(channel, pitch, step) {
            return false;
        }
        self.grid.set_cell(channel, pitch, step, active);
        true
    }

    /// New state of the cell, or None if rejected.
    pub fn toggle_cell(&mut self, channel: ChannelId, pitch: Pitch, step: usize) -> Option<bool> {
        if !self.accepts(channel, pitch, step) {
            return None;
        }
        Some(self.grid.toggle_cell(channel, pitch, step))
    }

    /// Paints [from, to] clamped to the arrangement.
    pub fn paint_run(&mut self, channel: ChannelId, pitch: Pitch, from: usize, to: usize, active: bool) -> bool {
        let last = self.total_steps().saturating_sub(1);
        let (lo, hi) = (from.min(to), from.max(to).min(last));
        if !self.accepts(channel, pitch, lo) {
            return false;
        }
        self.grid.paint_run(channel, pitch, lo, hi, active);
        true
    }

    pub fn clear_channel(&mut self, channel: ChannelId) -> bool {
        if channel >= self.channels.len() {
            return false;
        }
        self.grid.clear_channel(channel);
        true
    }

    /// Writes a chord as one batch; returns how many cells were written.
    pub fn write_chord(&mut self, channel: ChannelId, req: &ChordRequest, alignment: ChordAlignment) -> usize {
        let Some(spec) = self.channels.get(channel) else {
            return 0;
        };
        let cells = chord_cells(req, &spec.kind, self.total_steps(), &self.subdivisions, alignment);
        if !cells.is_empty() {
            self.grid.activate_all(channel, &cells);
        }
        cells.len()
    }

    fn beat_in_range(&self, beat: usize) -> bool {
        beat * STEPS_PER_BEAT < self.total_steps()
    }

    pub fn cycle_division(&mut self, beat: usize) -> Option<Division> {
        if !self.beat_in_range(beat) {
            return None;
        }
        Some(self.subdivisions.cycle_division(beat))
    }

    pub fn set_division(&mut self, beat: usize, factor: u8) -> bool {
        self.beat_in_range(beat) && self.subdivisions.set_factor(beat, factor)
    }

    /// Out-of-range cells are kept, just never shown or played.
    pub fn set_measures(&mut self, measures: u8) -> u8 {
        self.settings.measures = measures.clamp(MIN_MEASURES, MAX_MEASURES);
        self.settings.measures
    }

    pub fn adjust_measures(&mut self, delta: i8) -> u8 {
        let next = (self.settings.measures as i16 + delta as i16).clamp(0, u8::MAX as i16) as u8;
        self.set_measures(next)
    }

    pub fn set_bpm(&mut self, bpm: f32) -> f32 {
        self.settings.bpm = clamp_bpm(bpm);
        self.settings.bpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::channel::KICK;
    use crate::pipeline::chord::ChordType;
    use crate::pipeline::pitch::NoteName;

    const C4: Pitch = Pitch::new(NoteName::C, 4);

    #[test]
    fn defaults() {
        let project = ProjectState::default();
        assert_eq!(project.settings, Settings { measures: 4, bpm: 120.0 });
        assert_eq!(project.total_steps(), 64);
        assert_eq!(project.grid.channel_count(), project.channels.len());
    }

    #[test]
    fn out_of_range_writes_do_not_mutate() {
        let mut project = ProjectState::default();
        let before = project.grid.revision();
        assert!(!project.set_cell(0, C4, 64, true)); // past the end
        assert!(!project.set_cell(0, Pitch::new(NoteName::C, 9), 0, true)); // octave
        assert!(!project.set_cell(3, C4, 0, true)); // not in the kit
        assert!(!project.set_cell(42, C4, 0, true)); // no such channel
        assert_eq!(project.toggle_cell(0, C4, 100), None);
        assert_eq!(project.grid.revision(), before);
    }

    #[test]
    fn percussion_accepts_kit_pitches() {
        let mut project = ProjectState::default();
        assert_eq!(project.toggle_cell(3, KICK, 0), Some(true));
        assert_eq!(project.toggle_cell(3, KICK, 0), Some(false));
    }

    #[test]
    fn paint_is_clamped_to_the_arrangement() {
        let mut project = ProjectState::default();
        project.set_measures(1);
        assert!(project.paint_run(0, C4, 12, 40, true));
        assert!(project.grid.get_cell(0, C4, 15));
        assert!(!project.grid.get_cell(0, C4, 16));
        assert!(!project.paint_run(0, C4, 20, 30, true));
    }

    #[test]
    fn shrinking_keeps_cells_for_later() {
        let mut project = ProjectState::default();
        project.set_cell(0, C4, 40, true);
        assert_eq!(project.set_measures(2), 2);
        assert!(project.grid.get_cell(0, C4, 40));
        assert!(!project.set_cell(0, C4, 40, false));
        project.set_measures(4);
        assert!(project.set_cell(0, C4, 40, false));
    }

    #[test]
    fn settings_are_clamped() {
        let mut project = ProjectState::default();
        assert_eq!(project.adjust_measures(-10), 1);
        assert_eq!(project.adjust_measures(100), 16);
        assert_eq!(project.set_bpm(10.0), 40.0);
        let settings = Settings { measures: 0, bpm: 900.0 }.clamped();
        assert_eq!(settings, Settings { measures: 1, bpm: 200.0 });
    }

    #[test]
    fn chord_lands_on_the_selected_channel_only() {
        let mut project = ProjectState::default();
        let req = ChordRequest {
            root: "C".into(),
            octave: 4,
            chord: ChordType::Major,
            start_step: 0,
            beats: 1.0,
        };
        assert_eq!(project.write_chord(1, &req, ChordAlignment::BaseSteps), 12);
        assert!(project.grid.get_cell(1, Pitch::new(NoteName::E, 4), 3));
        assert!(project.grid.track(0).unwrap().is_empty());
        assert_eq!(project.write_chord(3, &req, ChordAlignment::BaseSteps), 0);
    }

    #[test]
    fn divisions_outside_the_arrangement_are_rejected() {
        let mut project = ProjectState::default();
        assert_eq!(project.cycle_division(2), Some(Division::Two));
        assert_eq!(project.cycle_division(16), None);
        assert!(!project.set_division(0, 3));
        assert!(project.set_division(0, 4));
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let project: ProjectState = serde_json::from_str(r#"{"settings":{"bpm":500}}"#).unwrap();
        let project = project.normalized();
        assert_eq!(project.settings.bpm, 200.0);
        assert_eq!(project.settings.measures, 4);
        assert_eq!(project.grid.channel_count(), 4);
    }
}
