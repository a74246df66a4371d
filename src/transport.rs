// Transport clock, the single source of musical "now".
//
// The clock does not run a timer of its own. The host advances it by
// elapsed wall time and gets back every tick boundary that was crossed
// (plus any inside the look-ahead window), each stamped with its exact
// transport time. Callers feed those ticks to the dispatcher in order.

use std::fmt;

use crate::shared::{MAX_BPM, MIN_BPM, STEPS_PER_BEAT, STEPS_PER_MEASURE};

/// Clock resolution: four ticks per base step.
pub const TICKS_PER_STEP: u64 = 4;

/// Musical position in ticks since the start of the arrangement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub ticks: u64,
}

impl Position {
    pub fn from_step(step: usize) -> Self {
        Self {
            ticks: step as u64 * TICKS_PER_STEP,
        }
    }

    /// Absolute base step, not wrapped.
    pub fn step(self) -> usize {
        (self.ticks / TICKS_PER_STEP) as usize
    }

    /// (measure, beat, sixteenth), all zero-based.
    pub fn bbs(self) -> (usize, usize, usize) {
        let step = self.step();
        (
            step / STEPS_PER_MEASURE,
            (step % STEPS_PER_MEASURE) / STEPS_PER_BEAT,
            step % STEPS_PER_BEAT,
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (measure, beat, sixteenth) = self.bbs();
        write!(f, "{measure}:{beat}:{sixteenth}")
    }
}

/// One tick boundary: where it is and when it happens (transport seconds).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockTick {
    pub position: Position,
    pub time: f64,
}

pub fn clamp_bpm(bpm: f32) -> f32 {
    if bpm.is_finite() {
        bpm.clamp(MIN_BPM, MAX_BPM)
    } else {
        120.0
    }
}

/// Seconds per base step at `bpm`.
pub fn step_seconds(bpm: f32) -> f64 {
    60.0 / clamp_bpm(bpm) as f64 / STEPS_PER_BEAT as f64
}

#[derive(Clone, Debug)]
pub struct TransportClock {
    bpm: f32,
    running: bool,
    now: f64, // transport seconds, advances whether or not we are running
    lookahead: f64,
    max_lateness: Option<f64>, // ticks older than this are skipped, not replayed
    // position is linear in time from this anchor
    anchor_time: f64,
    anchor_ticks: f64,
    next_tick: u64, // next tick boundary to hand out
}

impl TransportClock {
    pub fn new(bpm: f32) -> Self {
        Self {
            bpm: clamp_bpm(bpm),
            running: false,
            now: 0.0,
            lookahead: 0.0,
            max_lateness: None,
            anchor_time: 0.0,
            anchor_ticks: 0.0,
            next_tick: 0,
        }
    }

    pub fn with_lookahead(mut self, seconds: f64) -> Self {
        self.lookahead = seconds.max(0.0);
        self
    }

    /// After a stall, drop ticks that are more than `seconds` late.
    pub fn with_max_lateness(mut self, seconds: f64) -> Self {
        self.max_lateness = Some(seconds.max(0.0));
        self
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick_seconds(&self) -> f64 {
        step_seconds(self.bpm) / TICKS_PER_STEP as f64
    }

    pub fn step_seconds(&self) -> f64 {
        step_seconds(self.bpm)
    }

    fn ticks_at(&self, time: f64) -> f64 {
        self.anchor_ticks + (time - self.anchor_time) / self.tick_seconds()
    }

    fn time_of(&self, tick: u64) -> f64 {
        self.anchor_time + (tick as f64 - self.anchor_ticks) * self.tick_seconds()
    }

    /// Starts on the pending tick boundary, right now.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.anchor_time = self.now;
        self.anchor_ticks = self.next_tick as f64;
    }

    /// Stops and rewinds to the top.
    pub fn stop(&mut self) {
        self.running = false;
        self.set_position(0);
    }

    pub fn set_position(&mut self, step: usize) {
        self.next_tick = Position::from_step(step).ticks;
        self.anchor_time = self.now;
        self.anchor_ticks = self.next_tick as f64;
    }

    /// Renumber so the step of the last handed-out tick becomes `step`,
    /// keeping the phase inside it. Used when the loop length changes.
    pub fn rebase(&mut self, step: usize) {
        let Some(last) = self.next_tick.checked_sub(1) else {
            self.set_position(step);
            return;
        };
        let shift = (last / TICKS_PER_STEP) as i64 - step as i64;
        let shift_ticks = shift * TICKS_PER_STEP as i64;
        self.next_tick = (self.next_tick as i64 - shift_ticks).max(0) as u64;
        self.anchor_ticks -= shift_ticks as f64;
    }

    /// Changes tempo without a jump in position.
    pub fn set_bpm(&mut self, bpm: f32) {
        let bpm = clamp_bpm(bpm);
        if self.running {
            self.anchor_ticks = self.ticks_at(self.now);
            self.anchor_time = self.now;
        }
        self.bpm = bpm;
    }

    pub fn current_position(&self) -> Position {
        if !self.running {
            return Position { ticks: self.next_tick };
        }
        Position {
            ticks: self.ticks_at(self.now).max(0.0).floor() as u64,
        }
    }

    /// Move transport time forward and collect the ticks now due.
    pub fn advance(&mut self, elapsed: f64) -> Vec<ClockTick> {
        self.now += elapsed.max(0.0);
        let mut ticks = Vec::new();
        if !self.running {
            return ticks;
        }
        if let Some(lateness) = self.max_lateness {
            let first_fresh = self.ticks_at(self.now - lateness).ceil().max(0.0) as u64;
            if first_fresh > self.next_tick {
                log::debug!("clock fell behind, skipping {} ticks", first_fresh - self.next_tick);
                self.next_tick = first_fresh;
            }
        }
        let horizon = self.now + self.lookahead;
        loop {
            let time = self.time_of(self.next_tick);
            if time > horizon + 1e-9 {
                break;
            }
            ticks.push(ClockTick {
                position: Position { ticks: self.next_tick },
                time,
            });
            self.next_tick += 1;
        }
        ticks
    }
}
