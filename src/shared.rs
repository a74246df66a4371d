// Types shared between the controller (middle.rs) and the front-end (tui/).
//
// Same split as before: the TUI resolves raw keys into semantic `InputEvent`s,
// the middle layer owns every bit of sequencer state and hands back a
// `DisplayState` each frame, and the TUI just draws that.
//
// Default keys (see tui/input.rs):
//   arrows / hjkl   move the grid cursor (columns jump slot to slot)
//   Enter           toggle the cell under the cursor
//   p               start/finish a paint gesture (cursor moves paint cells)
//   Tab / BackTab   next / previous channel
//   Space           play/stop the current channel
//   a               play/stop all channels
//   s               stop
//   g               seek to the cursor column
//   d               cycle the division of the beat under the cursor
//   c / v           write / preview a chord at the cursor
//   t, r/R, o/O, b/B   chord type, root, octave, length in beats
//   m               chords fill every step / only the visible slots
//   + / -           tempo
//   ] / [           measures
//   X               clear the channel
//   Esc / q         quit

use crate::pipeline::pitch::Pitch;

pub const STEPS_PER_BEAT: usize = 4;
pub const BEATS_PER_MEASURE: usize = 4;
pub const STEPS_PER_MEASURE: usize = STEPS_PER_BEAT * BEATS_PER_MEASURE;

pub const MIN_MEASURES: u8 = 1;
pub const MAX_MEASURES: u8 = 16;
pub const MIN_BPM: f32 = 40.0;
pub const MAX_BPM: f32 = 200.0;

/// Index into the project's channel list.
pub type ChannelId = usize;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    // grid editing
    ToggleCell { pitch: Pitch, step: usize },
    PaintRun { pitch: Pitch, from: usize, to: usize, active: bool },
    ClearChannel,
    CycleDivision(usize), // beat index

    // channels
    SelectChannel(ChannelId),

    // transport
    PlayChannel,
    PlayAll,
    Stop,
    Seek(usize), // step index
    AdjustBpm(f32),
    AdjustMeasures(i8),

    // chords, written/previewed at the given step on the selected channel
    WriteChord(usize),
    PreviewChord,
    CycleChordType,
    ShiftChordRoot(i8),
    ShiftChordOctave(i8),
    ShiftChordBeats(i8),
    ToggleChordAlignment,

    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Off,
    On,
    Hidden, // stored but not at a slot start of the current division
}

#[derive(Clone, Debug)]
pub struct RowView {
    pub pitch: Pitch,
    pub label: String,
    pub cells: Vec<CellState>, // one per step of the arrangement
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub channel_names: Vec<String>,
    pub selected_channel: ChannelId,
    pub channel_ready: bool,
    pub rows: Vec<RowView>, // highest pitch first
    pub slot_starts: Vec<bool>, // per step: is it an editable column?
    pub divisions: Vec<u8>, // per beat
    pub cursor_step: Option<usize>, // playback cursor, None when stopped
    pub position_label: String, // measure:beat:sixteenth
    pub playing_label: &'static str,
    pub bpm: f32,
    pub measures: u8,
    pub chord_label: String,
    pub status: String,
}
