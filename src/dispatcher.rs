// Step dispatcher: turns clock ticks into note events.
//
// The dispatcher is an explicit state machine owned by the playback
// controller. Every tick carries its own context (grid, subdivisions,
// channels, tempo) so nothing here holds on to live project state.

use crate::pipeline::channel::{ChannelKind, ChannelSpec};
use crate::pipeline::grid::{GridStore, Track};
use crate::pipeline::pitch::Pitch;
use crate::pipeline::subdivision::SubdivisionMap;
use crate::shared::ChannelId;
use crate::transport::ClockTick;

/// Percussion ignores run length and always sounds for this many steps.
pub const PERCUSSION_STEPS: usize = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackMode {
    #[default]
    Stopped,
    Channel,
    All,
}

impl PlaybackMode {
    pub fn label(self) -> &'static str {
        match self {
            PlaybackMode::Stopped => "stopped",
            PlaybackMode::Channel => "channel",
            PlaybackMode::All => "all",
        }
    }
}

/// What a mode request did, so the caller can drive the clock to match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Started,
    Stopped,
    Switched,
    Unchanged,
}

/// One "sound this pitch" decision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    pub channel: ChannelId,
    pub pitch: Pitch,
    pub step: usize,
    pub time: f64,     // transport seconds
    pub steps: usize,  // length in base steps
    pub duration: f64, // seconds
}

/// Read-only view of everything a tick needs.
#[derive(Clone, Copy, Debug)]
pub struct TickContext<'a> {
    pub grid: &'a GridStore,
    pub subdivisions: &'a SubdivisionMap,
    pub channels: &'a [ChannelSpec],
    pub total_steps: usize,
    pub step_seconds: f64,
}

#[derive(Clone, Debug, Default)]
pub struct StepDispatcher {
    mode: PlaybackMode,
    active_channel: ChannelId,
    last_dispatched: Option<usize>, // None: next tick always counts as a change
    cursor: Option<usize>,
}

impl StepDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn is_playing(&self) -> bool {
        self.mode != PlaybackMode::Stopped
    }

    pub fn active_channel(&self) -> ChannelId {
        self.active_channel
    }

    /// Playback cursor, updated on every tick.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn last_dispatched(&self) -> Option<usize> {
        self.last_dispatched
    }

    /// Takes effect on the next new step; the clock is not touched.
    pub fn set_active_channel(&mut self, channel: ChannelId) {
        self.active_channel = channel;
    }

    /// Start `mode`, or stop if it is already the running mode.
    pub fn request(&mut self, mode: PlaybackMode) -> Transition {
        if mode == PlaybackMode::Stopped {
            return if self.is_playing() {
                self.stop();
                Transition::Stopped
            } else {
                Transition::Unchanged
            };
        }
        if self.mode == mode {
            self.stop();
            return Transition::Stopped;
        }
        let was_playing = self.is_playing();
        self.mode = mode;
        if was_playing {
            Transition::Switched
        } else {
            self.last_dispatched = None;
            Transition::Started
        }
    }

    pub fn stop(&mut self) {
        self.mode = PlaybackMode::Stopped;
        self.last_dispatched = None;
        self.cursor = None;
    }

    /// Reposition; the target step fires on the next tick.
    pub fn seek(&mut self, step: usize) {
        self.last_dispatched = None;
        if self.is_playing() {
            self.cursor = Some(step);
        }
    }

    /// Returns true when the cursor had to be moved back to the top.
    pub fn on_resize(&mut self, total_steps: usize) -> bool {
        match self.cursor {
            Some(cursor) if cursor >= total_steps => {
                self.cursor = Some(0);
                self.last_dispatched = None;
                true
            }
            _ => false,
        }
    }

    pub fn on_tick(&mut self, tick: &ClockTick, ctx: &TickContext<'_>) -> Vec<NoteEvent> {
        if !self.is_playing() || ctx.total_steps == 0 {
            return Vec::new();
        }
        let step = tick.position.step() % ctx.total_steps;
        self.cursor = Some(step);

        // cells live on slot starts, so a slot is one dispatch unit
        let slot = ctx.subdivisions.slot_start(step);
        if self.last_dispatched == Some(slot) {
            return Vec::new();
        }
        self.last_dispatched = Some(slot);

        let channels: Vec<ChannelId> = match self.mode {
            PlaybackMode::All => (0..ctx.channels.len()).collect(),
            PlaybackMode::Channel => vec![self.active_channel],
            PlaybackMode::Stopped => Vec::new(),
        };

        let mut events = Vec::new();
        for channel in channels {
            let (Some(spec), Some(track)) = (ctx.channels.get(channel), ctx.grid.track(channel)) else {
                continue;
            };
            for pitch in track.active_at(slot) {
                let steps = match &spec.kind {
                    ChannelKind::Percussive { .. } => PERCUSSION_STEPS,
                    ChannelKind::Melodic { .. } => {
                        match sustain_steps(track, ctx.subdivisions, pitch, step, ctx.total_steps) {
                            Some(steps) => steps,
                            None => continue, // still sounding from an earlier slot
                        }
                    }
                };
                events.push(NoteEvent {
                    channel,
                    pitch,
                    step,
                    time: tick.time,
                    steps,
                    duration: steps as f64 * ctx.step_seconds,
                });
            }
        }
        events
    }
}

/// End (exclusive) of the note that starts at slot `start`.
///
/// Inside a slot the contiguous active base steps from the slot start are
/// counted. A slot-start cell with nothing active inside its slot fills the
/// whole slot, unless the run is already being measured in base steps. The
/// run ends at the first slot that is only partly covered, and at
/// `total_steps`; it never wraps.
fn run_end(track: &Track, subdivisions: &SubdivisionMap, pitch: Pitch, start: usize, total_steps: usize) -> usize {
    let mut at = start;
    let mut by_steps = false;
    while at < total_steps && track.get(pitch, at) {
        let next = subdivisions.next_slot(at).min(total_steps);
        let has_inner = (at + 1..next).any(|s| track.get(pitch, s));
        by_steps |= has_inner;
        if by_steps {
            let mut end = at + 1;
            while end < next && track.get(pitch, end) {
                end += 1;
            }
            if end < next {
                return end;
            }
        }
        at = next;
    }
    at
}

/// True if a note starting earlier is still sounding at slot `slot`.
fn is_continuation(track: &Track, subdivisions: &SubdivisionMap, pitch: Pitch, slot: usize, total_steps: usize) -> bool {
    // walk back over the chain of active slot starts
    let mut first = slot;
    while let Some(previous) = subdivisions.previous_slot(first)
        && track.get(pitch, previous)
    {
        first = previous;
    }

    // replay the notes of that chain forward up to `slot`
    let mut start = first;
    while start < slot {
        let end = run_end(track, subdivisions, pitch, start, total_steps);
        if end > slot {
            return true;
        }
        start = if subdivisions.is_slot_start(end) {
            end
        } else {
            subdivisions.next_slot(end)
        };
    }
    false
}

/// Steps from `step` to the end of the note that starts in its slot, or
/// None if an earlier note is still sounding there (legato continuation).
pub fn sustain_steps(
    track: &Track,
    subdivisions: &SubdivisionMap,
    pitch: Pitch,
    step: usize,
    total_steps: usize,
) -> Option<usize> {
    let slot = subdivisions.slot_start(step);
    if is_continuation(track, subdivisions, pitch, slot, total_steps) {
        return None;
    }
    let end = run_end(track, subdivisions, pitch, slot, total_steps);
    Some(end.saturating_sub(step).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::channel::default_channels;
    use crate::pipeline::pitch::NoteName;
    use crate::pipeline::subdivision::Division;
    use crate::transport::Position;

    const C4: Pitch = Pitch::new(NoteName::C, 4);
    const E4: Pitch = Pitch::new(NoteName::E, 4);
    const STEP: f64 = 0.125;

    struct Fixture {
        grid: GridStore,
        subdivisions: SubdivisionMap,
        channels: Vec<ChannelSpec>,
        total_steps: usize,
    }

    impl Fixture {
        fn new() -> Self {
            let channels = default_channels();
            Self {
                grid: GridStore::new(channels.len()),
                subdivisions: SubdivisionMap::new(),
                channels,
                total_steps: 16,
            }
        }

        fn ctx(&self) -> TickContext<'_> {
            TickContext {
                grid: &self.grid,
                subdivisions: &self.subdivisions,
                channels: &self.channels,
                total_steps: self.total_steps,
                step_seconds: STEP,
            }
        }
    }

    fn tick_at(step: usize) -> ClockTick {
        ClockTick {
            position: Position::from_step(step),
            time: step as f64 * STEP,
        }
    }

    /// Steps 0..n, one tick each.
    fn play(d: &mut StepDispatcher, f: &Fixture, steps: usize) -> Vec<NoteEvent> {
        (0..steps).flat_map(|s| d.on_tick(&tick_at(s), &f.ctx())).collect()
    }

    #[test]
    fn legato_run_triggers_once() {
        let mut f = Fixture::new();
        f.subdivisions.set_division(1, Division::Four);
        for step in 4..=6 {
            f.grid.set_cell(0, C4, step, true);
        }
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::Channel);

        let events = play(&mut d, &f, 16);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, 4);
        assert_eq!(events[0].steps, 3);
        assert!((events[0].duration - 3.0 * STEP).abs() < 1e-9);
    }

    #[test]
    fn legato_on_whole_beats_counts_base_steps() {
        let mut f = Fixture::new();
        for step in 4..=6 {
            f.grid.set_cell(0, C4, step, true);
        }
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::Channel);
        let events = play(&mut d, &f, 16);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, 4);
        assert_eq!(events[0].steps, 3);
    }

    #[test]
    fn stray_step_after_a_full_beat_adds_one_step() {
        // what a 1.25 beat chord writes: steps 0..5
        let mut f = Fixture::new();
        f.grid.paint_run(0, C4, 0, 4, true);
        assert_eq!(sustain_steps(f.grid.track(0).unwrap(), &f.subdivisions, C4, 0, 16), Some(5));
    }

    #[test]
    fn whole_beat_cells_chain_slot_by_slot() {
        let mut f = Fixture::new();
        f.grid.set_cell(0, C4, 0, true);
        f.grid.set_cell(0, C4, 4, true);
        let track = f.grid.track(0).unwrap();
        assert_eq!(sustain_steps(track, &f.subdivisions, C4, 0, 16), Some(8));
        assert_eq!(sustain_steps(track, &f.subdivisions, C4, 4, 16), None);
    }

    #[test]
    fn a_note_after_a_short_run_starts_fresh() {
        let mut f = Fixture::new();
        f.grid.paint_run(0, C4, 0, 4, true); // ends at 5
        f.grid.set_cell(0, C4, 8, true);
        let track = f.grid.track(0).unwrap();
        assert_eq!(sustain_steps(track, &f.subdivisions, C4, 8, 16), Some(4));
    }

    #[test]
    fn single_cell_on_a_whole_beat_lasts_the_beat() {
        let mut f = Fixture::new();
        f.grid.set_cell(0, C4, 4, true);
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::Channel);
        let events = play(&mut d, &f, 16);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].steps, 4);
    }

    #[test]
    fn runs_stop_at_the_arrangement_end() {
        let mut f = Fixture::new();
        f.subdivisions.set_division(3, Division::Four);
        for step in [14, 15, 0] {
            f.grid.set_cell(0, E4, step, true);
        }
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::Channel);
        let events = play(&mut d, &f, 16);
        let at_14: Vec<_> = events.iter().filter(|e| e.step == 14).collect();
        assert_eq!(at_14.len(), 1);
        assert_eq!(at_14[0].steps, 2);
        // step 0 is its own note, not a continuation of 15
        assert!(events.iter().any(|e| e.step == 0 && e.steps == 4));
    }

    #[test]
    fn repeated_ticks_on_one_step_dispatch_once() {
        let mut f = Fixture::new();
        f.grid.set_cell(0, C4, 0, true);
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::Channel);
        assert_eq!(d.on_tick(&tick_at(0), &f.ctx()).len(), 1);
        assert!(d.on_tick(&tick_at(0), &f.ctx()).is_empty());
        // sub-step ticks inside the same slot
        let inside = ClockTick {
            position: Position { ticks: 3 },
            time: 0.1,
        };
        assert!(d.on_tick(&inside, &f.ctx()).is_empty());
        assert_eq!(d.cursor(), Some(0));
    }

    #[test]
    fn same_ticks_same_events() {
        let mut f = Fixture::new();
        f.subdivisions.set_division(2, Division::Two);
        f.grid.set_cell(0, C4, 0, true);
        f.grid.set_cell(0, C4, 4, true);
        f.grid.set_cell(0, E4, 8, true);
        f.grid.set_cell(0, E4, 10, true);
        f.grid.set_cell(3, crate::pipeline::channel::KICK, 12, true);

        let run = || {
            let mut d = StepDispatcher::new();
            d.request(PlaybackMode::All);
            play(&mut d, &f, 32)
        };
        let first = run();
        assert_eq!(first, run());
        assert!(!first.is_empty());
    }

    #[test]
    fn percussion_always_fires_short() {
        let mut f = Fixture::new();
        let kick = crate::pipeline::channel::KICK;
        f.grid.set_cell(3, kick, 0, true);
        f.grid.set_cell(3, kick, 4, true);
        let mut d = StepDispatcher::new();
        d.set_active_channel(3);
        d.request(PlaybackMode::Channel);
        let events = play(&mut d, &f, 8);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.steps == PERCUSSION_STEPS));
    }

    #[test]
    fn channel_mode_only_plays_the_active_channel() {
        let mut f = Fixture::new();
        f.grid.set_cell(0, C4, 0, true);
        f.grid.set_cell(1, C4, 4, true);
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::Channel);
        assert_eq!(d.on_tick(&tick_at(0), &f.ctx()).len(), 1);
        d.set_active_channel(1);
        let events = d.on_tick(&tick_at(4), &f.ctx());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].channel, 1);
    }

    #[test]
    fn requesting_the_running_mode_stops() {
        let mut d = StepDispatcher::new();
        assert_eq!(d.request(PlaybackMode::Channel), Transition::Started);
        assert_eq!(d.request(PlaybackMode::All), Transition::Switched);
        assert_eq!(d.request(PlaybackMode::All), Transition::Stopped);
        assert_eq!(d.mode(), PlaybackMode::Stopped);
        assert_eq!(d.request(PlaybackMode::Stopped), Transition::Unchanged);
    }

    #[test]
    fn nothing_fires_while_stopped() {
        let mut f = Fixture::new();
        f.grid.set_cell(0, C4, 0, true);
        let mut d = StepDispatcher::new();
        assert!(d.on_tick(&tick_at(0), &f.ctx()).is_empty());
        assert_eq!(d.cursor(), None);
        f.total_steps = 0;
        d.request(PlaybackMode::All);
        assert!(d.on_tick(&tick_at(0), &f.ctx()).is_empty());
    }

    #[test]
    fn positions_past_the_end_wrap() {
        let mut f = Fixture::new();
        f.grid.set_cell(0, C4, 4, true);
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::Channel);
        let events = d.on_tick(&tick_at(20), &f.ctx());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].step, 4);
    }

    #[test]
    fn shrinking_past_the_cursor_resets_it() {
        let f = Fixture::new();
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::All);
        d.on_tick(&tick_at(12), &f.ctx());
        assert!(!d.on_resize(16));
        assert!(d.on_resize(8));
        assert_eq!(d.cursor(), Some(0));
        assert_eq!(d.last_dispatched(), None);
    }

    #[test]
    fn seek_refires_the_target_step() {
        let mut f = Fixture::new();
        f.grid.set_cell(0, C4, 8, true);
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::Channel);
        assert_eq!(d.on_tick(&tick_at(8), &f.ctx()).len(), 1);
        d.seek(8);
        assert_eq!(d.on_tick(&tick_at(8), &f.ctx()).len(), 1);
    }

    #[test]
    fn hidden_cells_are_inert() {
        let mut f = Fixture::new();
        f.grid.set_cell(0, C4, 5, true); // beat 1 is a single slot at 4
        let mut d = StepDispatcher::new();
        d.request(PlaybackMode::Channel);
        assert!(play(&mut d, &f, 16).is_empty());
    }
}
