use std::collections::BTreeMap;
use std::path::PathBuf;

use crossbeam_channel::{Receiver, TryRecvError};

use super::{Voice, VoiceError};
use crate::audio::{AudioSender, SampleId};
use crate::audio_api::{AudioCommand, Source, TriggerParams};
use crate::loader::sample_loader::{self, LoadResult};
use crate::pipeline::pitch::Pitch;

const GAIN: f32 = 1.0;
/// Furthest a sample is repitched, in semitones.
pub const MAX_REPITCH: i16 = 12;

enum State {
    Loading(Receiver<LoadResult>),
    Ready(BTreeMap<Pitch, SampleId>),
    Failed,
    Disposed,
}

/// Plays `<Pitch>.wav` samples from a directory, decoded in the background.
pub struct SamplerVoice {
    dir: PathBuf,
    audio: AudioSender,
    state: State,
}

impl SamplerVoice {
    pub fn load(dir: PathBuf, audio: AudioSender) -> Self {
        log::info!("loading samples from {}", dir.display());
        let rx = sample_loader::spawn_load(dir.clone(), audio.sample_rate());
        Self::from_receiver(dir, audio, rx)
    }

    pub fn from_receiver(dir: PathBuf, audio: AudioSender, rx: Receiver<LoadResult>) -> Self {
        Self {
            dir,
            audio,
            state: State::Loading(rx),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    fn finish(&mut self, result: LoadResult) -> State {
        let samples = match result {
            Ok(samples) => samples,
            Err(e) => {
                log::warn!("sampler {}: {e:#}", self.dir.display());
                return State::Failed;
            }
        };
        let mut ids = BTreeMap::new();
        for (pitch, id, buffer) in samples {
            if let Err(e) = self.audio.try_send(AudioCommand::RegisterSample { id, buffer }) {
                log::warn!("sampler {}: could not register {pitch}: {e}", self.dir.display());
                return State::Failed;
            }
            ids.insert(pitch, id);
        }
        State::Ready(ids)
    }

    /// Nearest sample within `MAX_REPITCH` and the playback rate that
    /// brings it to `pitch`.
    fn source_for(samples: &BTreeMap<Pitch, SampleId>, pitch: Pitch) -> Option<(SampleId, f32)> {
        let (root, id) = samples
            .iter()
            .min_by_key(|(root, _)| (root.midi() - pitch.midi()).abs())?;
        let diff = pitch.midi() - root.midi();
        if diff.abs() > MAX_REPITCH {
            return None;
        }
        Some((*id, 2.0_f32.powf(diff as f32 / 12.0)))
    }
}

impl Voice for SamplerVoice {
    fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    fn poll(&mut self) -> bool {
        let State::Loading(rx) = &self.state else {
            return false;
        };
        let next = match rx.try_recv() {
            Ok(result) => self.finish(result),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => {
                log::warn!("sampler {}: loader went away", self.dir.display());
                State::Failed
            }
        };
        self.state = next;
        true
    }

    fn trigger(&mut self, pitch: Pitch, duration: f64, delay: f64) -> Result<(), VoiceError> {
        let samples = match &self.state {
            State::Ready(samples) => samples,
            State::Disposed => return Err(VoiceError::Disposed),
            State::Loading(_) | State::Failed => return Err(VoiceError::NotReady),
        };
        let (id, rate) = Self::source_for(samples, pitch).ok_or(VoiceError::OutOfRange(pitch))?;
        self.audio
            .try_send(AudioCommand::Trigger(TriggerParams {
                source: Source::Sample { id, rate },
                duration: duration as f32,
                delay: delay as f32,
                gain: GAIN,
            }))
            .map_err(VoiceError::Backend)
    }

    fn cancel_pending(&mut self) {
        let _ = self.audio.try_send(AudioCommand::CancelPending);
    }

    fn dispose(&mut self) {
        self.state = State::Disposed;
    }
}
