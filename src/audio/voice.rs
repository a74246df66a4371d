// Sound sources rendered by the engine, one frame at a time.

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use crate::pipeline::channel::{self, Waveform};
use crate::pipeline::pitch::Pitch;

/// Reads a registered buffer at a playback rate (1.0 = original pitch).
#[derive(Clone, Debug)]
pub struct SamplePlayer {
    pos: f32,
    rate: f32,
}

impl SamplePlayer {
    pub fn new(rate: f32) -> Self {
        Self {
            pos: 0.0,
            rate: rate.max(0.0),
        }
    }

    /// None once we run off the end of the buffer.
    pub fn next_frame(&mut self, buffer: &SampleBuffer) -> Option<StereoFrame> {
        let data = &buffer.data;
        let i = self.pos as usize;
        if i >= data.len() {
            return None;
        }
        let frac = self.pos - i as f32;
        let s0 = data[i];
        let s1 = data.get(i + 1).copied().unwrap_or(s0);
        self.pos += self.rate;
        Some(StereoFrame::lerp(s0, s1, frac))
    }
}

#[derive(Clone, Copy, Debug)]
enum Shape {
    Sine,
    Square,
    Saw,
    Triangle,
    Kick,
    Noise { decay: f32 },
}

/// Band-unlimited oscillators plus a couple of synthetic drums.
#[derive(Clone, Debug)]
pub struct Oscillator {
    shape: Shape,
    phase: f32,
    inc: f32, // cycles per frame
    min_inc: f32,
    level: f32,
    rng: u32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, pitch: Pitch, sample_rate: f32) -> Self {
        let shape = match waveform {
            Waveform::Sine => Shape::Sine,
            Waveform::Square => Shape::Square,
            Waveform::Saw => Shape::Saw,
            Waveform::Triangle => Shape::Triangle,
            Waveform::Kit => match pitch {
                channel::KICK => Shape::Kick,
                channel::OPEN_HAT => Shape::Noise { decay: 0.9998 },
                channel::CLOSED_HAT => Shape::Noise { decay: 0.999 },
                _ => Shape::Noise { decay: 0.9995 },
            },
        };
        let frequency = match shape {
            Shape::Kick => 150.0,
            _ => pitch.frequency(),
        };
        Self {
            shape,
            phase: 0.0,
            inc: frequency / sample_rate.max(1.0),
            min_inc: 45.0 / sample_rate.max(1.0),
            level: 1.0,
            rng: 0x9E37_79B9 ^ pitch.midi() as u32,
        }
    }

    fn noise(&mut self) -> f32 {
        // xorshift32
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 17;
        self.rng ^= self.rng << 5;
        (self.rng as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    pub fn next_sample(&mut self) -> f32 {
        let p = self.phase;
        let out = match self.shape {
            Shape::Sine => (std::f32::consts::TAU * p).sin(),
            Shape::Square => {
                if p < 0.5 { 1.0 } else { -1.0 }
            }
            Shape::Saw => 2.0 * p - 1.0,
            Shape::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
            Shape::Kick => {
                self.inc = (self.inc * 0.9996).max(self.min_inc); // pitch drop
                self.level *= 0.9997;
                (std::f32::consts::TAU * p).sin() * self.level
            }
            Shape::Noise { decay } => {
                self.level *= decay;
                self.noise() * self.level
            }
        };
        self.phase = (self.phase + self.inc).fract();
        out
    }
}
