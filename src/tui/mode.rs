use crate::pipeline::pitch::{NoteName, Pitch};
use crate::shared::{ChannelId, DisplayState};

/// An in-progress paint gesture. `last` is the last cell painted, so each
/// cursor move only paints the new stretch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub pitch: Pitch,
    pub last: usize,
    pub active: bool,
}

// state local to tui: the edit cursor and any gesture in flight.
// channel/row/step counts are synced from DisplayState per loop
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub row: usize,
    pub step: usize,
    pub paint: Option<Paint>,
    pub channel: ChannelId,
    pub channel_count: usize,
    pub playing: bool,
    synced_channel: Option<ChannelId>,
}

impl TuiState {
    /// Keep the cursor valid for whatever the middle layer now shows.
    pub fn sync(&mut self, ds: &DisplayState) {
        self.channel = ds.selected_channel;
        self.channel_count = ds.channel_names.len();
        self.playing = ds.playing_label != "stopped";

        if self.synced_channel != Some(ds.selected_channel) {
            self.synced_channel = Some(ds.selected_channel);
            self.paint = None;
            // land on middle C where there is one
            let c4 = Pitch::new(NoteName::C, 4);
            self.row = ds.rows.iter().position(|r| r.pitch == c4).unwrap_or(0);
        }
        self.row = self.row.min(ds.rows.len().saturating_sub(1));

        let total = ds.slot_starts.len();
        self.step = self.step.min(total.saturating_sub(1));
        // snap back onto an editable column
        while self.step > 0 && !ds.slot_starts.get(self.step).copied().unwrap_or(true) {
            self.step -= 1;
        }
    }

    pub fn pitch(&self, ds: &DisplayState) -> Option<Pitch> {
        ds.rows.get(self.row).map(|r| r.pitch)
    }
}
