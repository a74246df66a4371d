// The controller between the front-end and everything else. Owns the project,
// the transport clock, the dispatcher and the voices. The TUI sends semantic
// InputEvents in and reads a DisplayState back; the main loop calls tick().

use crate::dispatcher::{NoteEvent, PlaybackMode, StepDispatcher, TickContext, Transition};
use crate::pipeline::channel::{MAX_MELODIC_OCTAVE, MIN_MELODIC_OCTAVE, drum_label};
use crate::pipeline::chord::{ChordAlignment, ChordRequest, ChordType, preview_notes};
use crate::pipeline::pitch::{NoteName, Pitch};
use crate::pipeline::project::ProjectState;
use crate::pipeline::subdivision::SubdivisionMap;
use crate::shared::{CellState, ChannelId, DisplayState, InputEvent, RowView, STEPS_PER_BEAT, STEPS_PER_MEASURE};
use crate::transport::{Position, TransportClock};
use crate::voices::VoiceRegistry;

const MIN_CHORD_BEATS: f32 = 0.25;
const MAX_CHORD_BEATS: f32 = 8.0;

/// The chord the next write/preview will use.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChordSettings {
    pub root: NoteName,
    pub octave: i8,
    pub chord: ChordType,
    pub beats: f32,
}

impl Default for ChordSettings {
    fn default() -> Self {
        Self {
            root: NoteName::C,
            octave: 4,
            chord: ChordType::Major,
            beats: 1.0,
        }
    }
}

impl ChordSettings {
    pub fn request(&self, start_step: usize) -> ChordRequest {
        ChordRequest {
            root: self.root.label().to_string(),
            octave: self.octave,
            chord: self.chord,
            start_step,
            beats: self.beats,
        }
    }

    pub fn shift_root(&mut self, delta: i8) {
        let index = (self.root.index() as i16 + delta as i16).rem_euclid(12);
        self.root = NoteName::from_index(index as u8);
    }

    pub fn shift_octave(&mut self, delta: i8) {
        self.octave = self
            .octave
            .saturating_add(delta)
            .clamp(MIN_MELODIC_OCTAVE, MAX_MELODIC_OCTAVE);
    }

    /// Quarter-beat (one step) increments.
    pub fn shift_beats(&mut self, delta: i8) {
        self.beats = (self.beats + delta as f32 * 0.25).clamp(MIN_CHORD_BEATS, MAX_CHORD_BEATS);
    }

    pub fn label(&self) -> String {
        format!("{}{}{} x{} beats", self.root, self.octave, self.chord, self.beats)
    }
}

// what the cached rows were built from
#[derive(Clone, Debug, PartialEq)]
struct RowsKey {
    revision: u64,
    channel: ChannelId,
    total_steps: usize,
    subdivisions: SubdivisionMap,
}

pub struct Middle {
    pub state: ProjectState,
    clock: TransportClock,
    dispatcher: StepDispatcher,
    voices: VoiceRegistry,
    pub chord: ChordSettings,
    pub alignment: ChordAlignment,
    status: String,
    rows: Option<(RowsKey, Vec<RowView>)>,
}

impl Middle {
    pub fn new(state: ProjectState, voices: VoiceRegistry, lookahead: f64) -> Self {
        let state = state.normalized();
        let clock = TransportClock::new(state.settings.bpm).with_lookahead(lookahead);
        let mut dispatcher = StepDispatcher::new();
        dispatcher.set_active_channel(state.selected_channel);
        if voices.len() != state.channels.len() {
            log::warn!("{} voices for {} channels", voices.len(), state.channels.len());
        }
        Self {
            state,
            clock,
            dispatcher,
            voices,
            chord: ChordSettings::default(),
            alignment: ChordAlignment::default(),
            status: String::new(),
            rows: None,
        }
    }

    /// Skip ticks that are more than `seconds` late instead of firing them
    /// all at once after a stall.
    pub fn with_max_lateness(mut self, seconds: f64) -> Self {
        self.clock = self.clock.with_max_lateness(seconds);
        self
    }

    pub fn mode(&self) -> PlaybackMode {
        self.dispatcher.mode()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.dispatcher.cursor()
    }

    pub fn clock(&self) -> &TransportClock {
        &self.clock
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        let channel = self.state.selected_channel;
        match event {
            InputEvent::ToggleCell { pitch, step } => {
                if self.state.toggle_cell(channel, pitch, step).is_none() {
                    self.set_status(format!("can't place {pitch} at step {}", step + 1));
                }
            }
            InputEvent::PaintRun { pitch, from, to, active } => {
                self.state.paint_run(channel, pitch, from, to, active);
            }
            InputEvent::ClearChannel => {
                self.state.clear_channel(channel);
                self.set_status("channel cleared");
            }
            InputEvent::CycleDivision(beat) => {
                if let Some(division) = self.state.cycle_division(beat) {
                    self.set_status(format!("beat {} split in {}", beat + 1, division.factor()));
                }
            }
            InputEvent::SelectChannel(channel) => self.select_channel(channel),
            InputEvent::PlayChannel => self.play(PlaybackMode::Channel),
            InputEvent::PlayAll => self.play(PlaybackMode::All),
            InputEvent::Stop => self.stop(),
            InputEvent::Seek(step) => self.seek(step),
            InputEvent::AdjustBpm(delta) => {
                self.set_bpm(self.state.settings.bpm + delta);
            }
            InputEvent::AdjustMeasures(delta) => {
                let measures = self.state.settings.measures as i16 + delta as i16;
                self.set_measures(measures.clamp(0, u8::MAX as i16) as u8);
            }
            InputEvent::WriteChord(step) => {
                let written = self.write_chord(step);
                self.set_status(format!("{} cells written", written));
            }
            InputEvent::PreviewChord => {
                self.preview_chord();
            }
            InputEvent::CycleChordType => self.chord.chord = self.chord.chord.next(),
            InputEvent::ShiftChordRoot(delta) => self.chord.shift_root(delta),
            InputEvent::ShiftChordOctave(delta) => self.chord.shift_octave(delta),
            InputEvent::ShiftChordBeats(delta) => self.chord.shift_beats(delta),
            InputEvent::ToggleChordAlignment => {
                self.alignment = self.alignment.toggled();
                self.set_status(format!("chords fill {}", self.alignment.label()));
            }
            InputEvent::Quit => self.shutdown(),
        }
    }

    /// Start `mode`, or stop if it is already playing.
    pub fn play(&mut self, mode: PlaybackMode) {
        match self.dispatcher.request(mode) {
            Transition::Started => {
                log::info!("play {} at {}", mode.label(), self.clock.current_position());
                self.clock.start();
            }
            Transition::Stopped => self.halt(),
            Transition::Switched => log::info!("switched to {}", mode.label()),
            Transition::Unchanged => {}
        }
    }

    pub fn stop(&mut self) {
        self.dispatcher.stop();
        self.halt();
    }

    // clock + pending notes; the dispatcher is already stopped
    fn halt(&mut self) {
        self.clock.stop();
        self.voices.cancel_pending();
        log::info!("stopped");
    }

    pub fn seek(&mut self, step: usize) {
        if step >= self.state.total_steps() {
            log::debug!("seek past the end ignored: {step}");
            return;
        }
        if self.dispatcher.is_playing() {
            self.voices.cancel_pending();
        }
        self.clock.set_position(step);
        self.dispatcher.seek(step);
        log::info!("seek to {}", Position::from_step(step));
    }

    /// Takes effect from the next step; the clock keeps running.
    pub fn select_channel(&mut self, channel: ChannelId) {
        if self.state.select_channel(channel) {
            self.dispatcher.set_active_channel(channel);
        }
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        let bpm = self.state.set_bpm(bpm);
        self.clock.set_bpm(bpm);
    }

    pub fn set_measures(&mut self, measures: u8) {
        self.state.set_measures(measures);
        let total = self.state.total_steps();
        if self.dispatcher.on_resize(total) {
            self.clock.set_position(0);
            log::info!("cursor past the new end, back to the top");
        } else if let Some(cursor) = self.dispatcher.cursor() {
            // the clock counts absolute steps; keep the playhead where it is
            self.clock.rebase(cursor);
        }
    }

    pub fn write_chord(&mut self, step: usize) -> usize {
        let req = self.chord.request(step);
        self.state.write_chord(self.state.selected_channel, &req, self.alignment)
    }

    pub fn preview_chord(&mut self) -> usize {
        let channel = self.state.selected_channel;
        let Some(spec) = self.state.channel(channel) else {
            return 0;
        };
        let notes = preview_notes(&self.chord.request(0), &spec.kind);
        self.voices.preview(channel, &notes)
    }

    /// Advance transport time and fire whatever is due. Returns the events
    /// handed to the voices, in order.
    pub fn tick(&mut self, elapsed: f64) -> Vec<NoteEvent> {
        self.voices.poll();
        let ticks = self.clock.advance(elapsed);
        if ticks.is_empty() {
            return Vec::new();
        }

        let ctx = TickContext {
            grid: &self.state.grid,
            subdivisions: &self.state.subdivisions,
            channels: &self.state.channels,
            total_steps: self.state.total_steps(),
            step_seconds: self.clock.step_seconds(),
        };
        let mut fired = Vec::new();
        for tick in &ticks {
            let events = self.dispatcher.on_tick(tick, &ctx);
            self.voices.dispatch(&events, self.clock.now());
            fired.extend(events);
        }
        fired
    }

    pub fn shutdown(&mut self) {
        self.stop();
        self.voices.teardown();
    }

    // rows are rebuilt only after an edit, a resize, a division change or a
    // channel switch
    fn rows(&mut self) -> Vec<RowView> {
        let state = &self.state;
        let key = RowsKey {
            revision: state.grid.revision(),
            channel: state.selected_channel,
            total_steps: state.total_steps(),
            subdivisions: state.subdivisions.clone(),
        };
        if let Some((cached, rows)) = &self.rows
            && *cached == key
        {
            return rows.clone();
        }

        let rows: Vec<RowView> = state
            .channel(key.channel)
            .map(|spec| spec.kind.rows())
            .unwrap_or_default()
            .into_iter()
            .map(|pitch| RowView {
                pitch,
                label: row_label(pitch),
                cells: (0..key.total_steps)
                    .map(|step| match state.grid.get_cell(key.channel, pitch, step) {
                        false => CellState::Off,
                        true if key.subdivisions.is_slot_start(step) => CellState::On,
                        true => CellState::Hidden,
                    })
                    .collect(),
            })
            .collect();
        log::trace!("rebuilt {} rows at revision {}", rows.len(), key.revision);
        self.rows = Some((key, rows.clone()));
        rows
    }

    pub fn display_state(&mut self) -> DisplayState {
        let rows = self.rows();
        let state = &self.state;
        let total = state.total_steps();
        let channel = state.selected_channel;
        let subdivisions = &state.subdivisions;

        let cursor = self.dispatcher.cursor();
        let position = cursor.unwrap_or_else(|| self.clock.current_position().step() % total.max(1));

        DisplayState {
            channel_names: state.channels.iter().map(|c| c.name.clone()).collect(),
            selected_channel: channel,
            channel_ready: self.voices.is_ready(channel),
            rows,
            slot_starts: (0..total).map(|s| subdivisions.is_slot_start(s)).collect(),
            divisions: (0..total / STEPS_PER_BEAT)
                .map(|beat| subdivisions.division_of(beat).factor())
                .collect(),
            cursor_step: cursor,
            position_label: position_label(position),
            playing_label: self.dispatcher.mode().label(),
            bpm: state.settings.bpm,
            measures: state.settings.measures,
            chord_label: format!("{} ({})", self.chord.label(), self.alignment.label()),
            status: self.status.clone(),
        }
    }
}

fn row_label(pitch: Pitch) -> String {
    drum_label(pitch).map(str::to_string).unwrap_or_else(|| pitch.to_string())
}

// one-based, the way musicians count
fn position_label(step: usize) -> String {
    format!(
        "{}:{}:{}",
        step / STEPS_PER_MEASURE + 1,
        (step % STEPS_PER_MEASURE) / STEPS_PER_BEAT + 1,
        step % STEPS_PER_BEAT + 1
    )
}
