// The grid store: per channel, a sparse (pitch, step) -> active mapping.
// Inputs are validated by the caller (pipeline/project.rs); this layer just stores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pitch::Pitch;
use crate::shared::ChannelId;

/// Ordered by step first so all cells of one step are a contiguous range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub step: usize,
    pub pitch: Pitch,
}

impl CellKey {
    pub fn new(pitch: Pitch, step: usize) -> Self {
        Self { step, pitch }
    }

    fn first_at(step: usize) -> Self {
        Self { step, pitch: Pitch::MIN }
    }
}

/// One channel's cells. Only active cells are written to disk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TrackFile", into = "TrackFile")]
pub struct Track {
    cells: BTreeMap<CellKey, bool>,
}

#[derive(Serialize, Deserialize)]
struct TrackFile {
    active: Vec<CellKey>,
}

impl From<TrackFile> for Track {
    fn from(file: TrackFile) -> Self {
        Self {
            cells: file.active.into_iter().map(|k| (k, true)).collect(),
        }
    }
}

impl From<Track> for TrackFile {
    fn from(track: Track) -> Self {
        Self {
            active: track.active_cells().collect(),
        }
    }
}

impl Track {
    pub fn get(&self, pitch: Pitch, step: usize) -> bool {
        self.cells.get(&CellKey::new(pitch, step)).copied().unwrap_or(false)
    }

    /// Returns true if the stored value changed.
    pub fn set(&mut self, pitch: Pitch, step: usize, active: bool) -> bool {
        let previous = self.cells.insert(CellKey::new(pitch, step), active);
        previous.unwrap_or(false) != active
    }

    /// Active pitches at exactly `step`, lowest first.
    pub fn active_at(&self, step: usize) -> impl Iterator<Item = Pitch> + '_ {
        self.cells
            .range(CellKey::first_at(step)..CellKey::first_at(step + 1))
            .filter(|(_, active)| **active)
            .map(|(key, _)| key.pitch)
    }

    pub fn active_cells(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.cells.iter().filter(|(_, active)| **active).map(|(key, _)| *key)
    }

    pub fn is_empty(&self) -> bool {
        self.active_cells().next().is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridStore {
    tracks: Vec<Track>,
    #[serde(skip)]
    revision: u64, // bumped on every edit call, for re-render
}

impl GridStore {
    pub fn new(channels: usize) -> Self {
        Self {
            tracks: vec![Track::default(); channels],
            revision: 0,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.tracks.len()
    }

    /// Grow to at least `channels` tracks (a project file can predate a channel).
    pub fn ensure_channels(&mut self, channels: usize) {
        if self.tracks.len() < channels {
            self.tracks.resize_with(channels, Track::default);
        }
    }

    pub fn track(&self, channel: ChannelId) -> Option<&Track> {
        self.tracks.get(channel)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_cell(&mut self, channel: ChannelId, pitch: Pitch, step: usize, active: bool) -> bool {
        self.revision += 1;
        match self.tracks.get_mut(channel) {
            Some(track) => track.set(pitch, step, active),
            None => false,
        }
    }

    pub fn get_cell(&self, channel: ChannelId, pitch: Pitch, step: usize) -> bool {
        self.tracks
            .get(channel)
            .is_some_and(|track| track.get(pitch, step))
    }

    pub fn toggle_cell(&mut self, channel: ChannelId, pitch: Pitch, step: usize) -> bool {
        let next = !self.get_cell(channel, pitch, step);
        self.set_cell(channel, pitch, step, next);
        next
    }

    pub fn clear_channel(&mut self, channel: ChannelId) {
        self.revision += 1;
        if let Some(track) = self.tracks.get_mut(channel) {
            *track = Track::default();
        }
    }

    /// Force every step in [min, max] to `active` (drag painting).
    pub fn paint_run(&mut self, channel: ChannelId, pitch: Pitch, from: usize, to: usize, active: bool) {
        self.revision += 1;
        let Some(track) = self.tracks.get_mut(channel) else {
            return;
        };
        for step in from.min(to)..=from.max(to) {
            track.set(pitch, step, active);
        }
    }

    /// Activate a batch of cells in one edit (chords).
    pub fn activate_all(&mut self, channel: ChannelId, cells: &[CellKey]) {
        self.revision += 1;
        let Some(track) = self.tracks.get_mut(channel) else {
            return;
        };
        for key in cells {
            track.set(key.pitch, key.step, true);
        }
    }
}
