use std::collections::HashMap;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::sample_id::SampleId;
use super::voice::{Oscillator, SamplePlayer};
use crate::audio_api::{AudioCommand, Source, TriggerParams};

const MAX_VOICES: usize = 32; // oldest voice is stolen past this
const MAX_PENDING: usize = 512;
const ATTACK_SECONDS: f32 = 0.005;
const RELEASE_SECONDS: f32 = 0.03;
const MASTER_GAIN: f32 = 0.2;

#[derive(Clone, Debug)]
struct Scheduled {
    due: u64, // engine frame
    params: TriggerParams,
}

#[derive(Clone, Debug)]
enum Sound {
    Osc(Oscillator),
    Sample { id: SampleId, player: SamplePlayer },
}

#[derive(Clone, Debug)]
struct Playing {
    sound: Sound,
    gain: f32,
    age: u64,
    hold: u64,
    attack: u64,
    release: u64,
}

impl Playing {
    fn envelope(&self) -> Option<f32> {
        let env = if self.age < self.attack {
            self.age as f32 / self.attack as f32
        } else if self.age < self.hold {
            1.0
        } else {
            let into_release = self.age - self.hold;
            if into_release >= self.release {
                return None;
            }
            1.0 - into_release as f32 / self.release as f32
        };
        Some(env)
    }

    fn next_frame(&mut self, samples: &HashMap<SampleId, SampleBuffer>) -> Option<StereoFrame> {
        let env = self.envelope()?;
        let frame = match &mut self.sound {
            Sound::Osc(osc) => StereoFrame::mono(osc.next_sample()),
            Sound::Sample { id, player } => player.next_frame(samples.get(id)?)?,
        };
        self.age += 1;
        Some(frame.scaled(env * self.gain))
    }
}

/// Lives on the audio thread. Triggers are queued with a frame-accurate
/// start time and started inside `render_block`.
pub struct Engine {
    sample_rate: f32,
    frame_clock: u64,
    samples: HashMap<SampleId, SampleBuffer>,
    pending: Vec<Scheduled>,
    playing: Vec<Playing>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1) as f32,
            frame_clock: 0,
            samples: HashMap::new(),
            pending: Vec::with_capacity(MAX_PENDING),
            playing: Vec::with_capacity(MAX_VOICES),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn playing_len(&self) -> usize {
        self.playing.len()
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterSample { id, buffer } => {
                self.samples.insert(id, buffer);
            }
            AudioCommand::Trigger(params) => {
                if self.pending.len() >= MAX_PENDING {
                    return; // dropped; a missed note beats a stalled callback
                }
                let delay = (params.delay.max(0.0) * self.sample_rate).round() as u64;
                self.pending.push(Scheduled {
                    due: self.frame_clock + delay,
                    params,
                });
            }
            AudioCommand::CancelPending => self.pending.clear(),
        }
    }

    fn start(&mut self, params: TriggerParams) {
        let sound = match params.source {
            Source::Synth { waveform, pitch } => Sound::Osc(Oscillator::new(waveform, pitch, self.sample_rate)),
            Source::Sample { id, rate } => {
                if !self.samples.contains_key(&id) {
                    return;
                }
                Sound::Sample {
                    id,
                    player: SamplePlayer::new(rate),
                }
            }
        };
        if self.playing.len() >= MAX_VOICES {
            self.playing.remove(0);
        }
        let frames = |seconds: f32| (seconds.max(0.0) * self.sample_rate).round() as u64;
        self.playing.push(Playing {
            sound,
            gain: params.gain * MASTER_GAIN,
            age: 0,
            hold: frames(params.duration).max(1),
            attack: frames(ATTACK_SECONDS).max(1),
            release: frames(RELEASE_SECONDS).max(1),
        });
    }

    fn start_due(&mut self) {
        while let Some(i) = self.pending.iter().position(|s| s.due <= self.frame_clock) {
            let scheduled = self.pending.swap_remove(i);
            self.start(scheduled.params);
        }
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for frame in out.iter_mut() {
            self.start_due();
            let mut mix = StereoFrame::zero();
            let Engine { playing, samples, .. } = self;
            playing.retain_mut(|voice| match voice.next_frame(samples) {
                Some(f) => {
                    mix += f;
                    true
                }
                None => false,
            });
            *frame = mix;
            self.frame_clock += 1;
        }
    }
}
