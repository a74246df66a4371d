use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::mode::{Paint, TuiState};
use crate::shared::{CellState, DisplayState, InputEvent, STEPS_PER_BEAT};

const BPM_STEP: f32 = 5.0;

// poll for input from tui, moves the cursor kept in tuistate,
// resolves keys to sequences of input events for the backend to handle
pub fn poll_input(timeout: Duration, ts: &mut TuiState, ds: &DisplayState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts, ds));
    }
    Ok(vec![])
}

pub fn handle_key(code: KeyCode, ts: &mut TuiState, ds: &DisplayState) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![InputEvent::Quit],

        // cursor
        KeyCode::Left | KeyCode::Char('h') => move_to(previous_slot(ds, ts.step), ts),
        KeyCode::Right | KeyCode::Char('l') => move_to(next_slot(ds, ts.step), ts),
        KeyCode::Up | KeyCode::Char('k') => {
            ts.paint = None;
            ts.row = ts.row.saturating_sub(1);
            vec![]
        }
        KeyCode::Down | KeyCode::Char('j') => {
            ts.paint = None;
            ts.row = (ts.row + 1).min(ds.rows.len().saturating_sub(1));
            vec![]
        }

        // editing
        KeyCode::Enter => match ts.pitch(ds) {
            Some(pitch) => vec![InputEvent::ToggleCell { pitch, step: ts.step }],
            None => vec![],
        },
        KeyCode::Char('p') => toggle_paint(ts, ds),
        KeyCode::Char('X') => vec![InputEvent::ClearChannel],
        KeyCode::Char('d') => vec![InputEvent::CycleDivision(ts.step / STEPS_PER_BEAT)],

        // channels
        KeyCode::Tab => cycle_channel(ts, 1),
        KeyCode::BackTab => cycle_channel(ts, -1),

        // transport
        KeyCode::Char(' ') => vec![InputEvent::PlayChannel],
        KeyCode::Char('a') => vec![InputEvent::PlayAll],
        KeyCode::Char('s') => vec![InputEvent::Stop],
        KeyCode::Char('g') => vec![InputEvent::Seek(ts.step)],
        KeyCode::Char('+' | '=') => vec![InputEvent::AdjustBpm(BPM_STEP)],
        KeyCode::Char('-') => vec![InputEvent::AdjustBpm(-BPM_STEP)],
        KeyCode::Char(']') => vec![InputEvent::AdjustMeasures(1)],
        KeyCode::Char('[') => vec![InputEvent::AdjustMeasures(-1)],

        // chords, lowercase = up and shifted = down
        KeyCode::Char('c') => vec![InputEvent::WriteChord(ts.step)],
        KeyCode::Char('v') => vec![InputEvent::PreviewChord],
        KeyCode::Char('t') => vec![InputEvent::CycleChordType],
        KeyCode::Char('r') => vec![InputEvent::ShiftChordRoot(1)],
        KeyCode::Char('R') => vec![InputEvent::ShiftChordRoot(-1)],
        KeyCode::Char('o') => vec![InputEvent::ShiftChordOctave(1)],
        KeyCode::Char('O') => vec![InputEvent::ShiftChordOctave(-1)],
        KeyCode::Char('b') => vec![InputEvent::ShiftChordBeats(1)],
        KeyCode::Char('B') => vec![InputEvent::ShiftChordBeats(-1)],
        KeyCode::Char('m') => vec![InputEvent::ToggleChordAlignment],

        _ => vec![],
    }
}

// move the cursor; while painting, paint the stretch just crossed
fn move_to(step: usize, ts: &mut TuiState) -> Vec<InputEvent> {
    let from = ts.step;
    ts.step = step;
    let Some(paint) = ts.paint.as_mut() else {
        return vec![];
    };
    if step == from {
        return vec![];
    }
    let event = InputEvent::PaintRun {
        pitch: paint.pitch,
        from: paint.last,
        to: step,
        active: paint.active,
    };
    paint.last = step;
    vec![event]
}

// first press paints the cursor cell (with the opposite of its state), second press ends
fn toggle_paint(ts: &mut TuiState, ds: &DisplayState) -> Vec<InputEvent> {
    if ts.paint.take().is_some() {
        return vec![];
    }
    let Some(row) = ds.rows.get(ts.row) else {
        return vec![];
    };
    let active = row.cells.get(ts.step) != Some(&CellState::On);
    ts.paint = Some(Paint {
        pitch: row.pitch,
        last: ts.step,
        active,
    });
    vec![InputEvent::PaintRun {
        pitch: row.pitch,
        from: ts.step,
        to: ts.step,
        active,
    }]
}

fn cycle_channel(ts: &mut TuiState, delta: isize) -> Vec<InputEvent> {
    if ts.channel_count == 0 {
        return vec![];
    }
    let n = ts.channel_count as isize;
    let next = (ts.channel as isize + delta).rem_euclid(n) as usize;
    vec![InputEvent::SelectChannel(next)]
}

fn next_slot(ds: &DisplayState, step: usize) -> usize {
    (step + 1..ds.slot_starts.len())
        .find(|&s| ds.slot_starts[s])
        .unwrap_or(step)
}

fn previous_slot(ds: &DisplayState, step: usize) -> usize {
    (0..step).rev().find(|&s| ds.slot_starts[s]).unwrap_or(step)
}
