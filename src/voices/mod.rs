// Voices: the sound-producing capability bound to each channel.
//
// A voice may become ready later than it is created (samplers decode on a
// worker thread). The registry is the boundary where every per-note
// failure is swallowed, so the dispatcher never sees one.

use std::path::Path;

use thiserror::Error;

use crate::audio::AudioSender;
use crate::dispatcher::NoteEvent;
use crate::pipeline::channel::{ChannelSpec, VoiceSpec};
use crate::pipeline::chord::PreviewNote;
use crate::pipeline::pitch::Pitch;
use crate::shared::ChannelId;

mod sampler;
mod synth;

pub use sampler::SamplerVoice;
pub use synth::SynthVoice;

/// Preview notes are held this long.
pub const PREVIEW_SECONDS: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VoiceError {
    #[error("voice is not ready")]
    NotReady,
    #[error("{0} is outside the voice's range")]
    OutOfRange(Pitch),
    #[error("voice has been disposed")]
    Disposed,
    #[error("audio backend: {0}")]
    Backend(String),
}

pub trait Voice: Send {
    fn is_ready(&self) -> bool;

    /// Pick up async progress. Returns true if readiness changed.
    fn poll(&mut self) -> bool {
        false
    }

    /// Sound `pitch` for `duration` seconds, starting `delay` seconds from now.
    fn trigger(&mut self, pitch: Pitch, duration: f64, delay: f64) -> Result<(), VoiceError>;

    /// Forget triggers that have not started yet.
    fn cancel_pending(&mut self) {}

    fn dispose(&mut self);
}

pub struct VoiceRegistry {
    voices: Vec<Box<dyn Voice>>,
}

impl VoiceRegistry {
    pub fn new(voices: Vec<Box<dyn Voice>>) -> Self {
        Self { voices }
    }

    /// One voice per channel, built from its spec. Sampler dirs are
    /// resolved against `project_dir`.
    pub fn from_specs(specs: &[ChannelSpec], project_dir: &Path, audio: &AudioSender) -> Self {
        let voices = specs
            .iter()
            .map(|spec| -> Box<dyn Voice> {
                match &spec.voice {
                    VoiceSpec::Synth { waveform } => Box::new(SynthVoice::new(*waveform, audio.clone())),
                    VoiceSpec::Sampler { dir } => Box::new(SamplerVoice::load(project_dir.join(dir), audio.clone())),
                }
            })
            .collect();
        Self { voices }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn is_ready(&self, channel: ChannelId) -> bool {
        self.voices.get(channel).is_some_and(|v| v.is_ready())
    }

    pub fn poll(&mut self) {
        for (channel, voice) in self.voices.iter_mut().enumerate() {
            if voice.poll() {
                log::info!("voice {channel} ready: {}", voice.is_ready());
            }
        }
    }

    /// Trigger every event; `now` is the transport time the delays are measured
    /// from. Returns how many notes were actually handed to a voice.
    pub fn dispatch(&mut self, events: &[NoteEvent], now: f64) -> usize {
        let mut sent = 0;
        for event in events {
            let Some(voice) = self.voices.get_mut(event.channel) else {
                log::debug!("no voice for channel {}", event.channel);
                continue;
            };
            if !voice.is_ready() {
                continue;
            }
            let delay = (event.time - now).max(0.0);
            match voice.trigger(event.pitch, event.duration, delay) {
                Ok(()) => sent += 1,
                Err(e) => log::warn!("channel {} {}: {e}", event.channel, event.pitch),
            }
        }
        sent
    }

    /// Audition chord tones. Does nothing while the voice is not ready.
    pub fn preview(&mut self, channel: ChannelId, notes: &[PreviewNote]) -> usize {
        let Some(voice) = self.voices.get_mut(channel) else {
            return 0;
        };
        if !voice.is_ready() {
            log::debug!("preview skipped, voice {channel} not ready");
            return 0;
        }
        notes
            .iter()
            .filter(|note| match voice.trigger(note.pitch, PREVIEW_SECONDS, note.delay) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("preview {}: {e}", note.pitch);
                    false
                }
            })
            .count()
    }

    pub fn cancel_pending(&mut self) {
        for voice in &mut self.voices {
            voice.cancel_pending();
        }
    }

    pub fn teardown(&mut self) {
        for voice in &mut self.voices {
            voice.dispose();
        }
        self.voices.clear();
    }
}

impl Drop for VoiceRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pitch::NoteName;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(Pitch, f64, f64)>>>;

    struct Fake {
        ready: bool,
        reject: Option<Pitch>,
        log: Log,
    }

    impl Voice for Fake {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn trigger(&mut self, pitch: Pitch, duration: f64, delay: f64) -> Result<(), VoiceError> {
            if self.reject == Some(pitch) {
                return Err(VoiceError::OutOfRange(pitch));
            }
            self.log.lock().unwrap().push((pitch, duration, delay));
            Ok(())
        }

        fn dispose(&mut self) {}
    }

    fn event(channel: ChannelId, pitch: Pitch, time: f64) -> NoteEvent {
        NoteEvent {
            channel,
            pitch,
            step: 0,
            time,
            steps: 1,
            duration: 0.125,
        }
    }

    const C4: Pitch = Pitch::new(NoteName::C, 4);
    const E4: Pitch = Pitch::new(NoteName::E, 4);
    const G4: Pitch = Pitch::new(NoteName::G, 4);

    #[test]
    fn one_bad_note_does_not_stop_the_rest() {
        let log = Log::default();
        let mut registry = VoiceRegistry::new(vec![Box::new(Fake {
            ready: true,
            reject: Some(E4),
            log: log.clone(),
        })]);
        let events = [event(0, C4, 1.0), event(0, E4, 1.0), event(0, G4, 1.0), event(7, C4, 1.0)];
        assert_eq!(registry.dispatch(&events, 0.75), 2);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].0, G4);
        assert!((log[0].2 - 0.25).abs() < 1e-9);
    }

    #[test]
    fn not_ready_voices_stay_silent() {
        let log = Log::default();
        let mut registry = VoiceRegistry::new(vec![Box::new(Fake {
            ready: false,
            reject: None,
            log: log.clone(),
        })]);
        assert_eq!(registry.dispatch(&[event(0, C4, 0.0)], 0.0), 0);
        let notes = [PreviewNote { pitch: C4, delay: 0.0 }];
        assert_eq!(registry.preview(0, &notes), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn preview_keeps_the_stagger() {
        let log = Log::default();
        let mut registry = VoiceRegistry::new(vec![Box::new(Fake {
            ready: true,
            reject: None,
            log: log.clone(),
        })]);
        let notes = [
            PreviewNote { pitch: C4, delay: 0.0 },
            PreviewNote { pitch: E4, delay: 0.05 },
        ];
        assert_eq!(registry.preview(0, &notes), 2);
        let delays: Vec<f64> = log.lock().unwrap().iter().map(|(_, _, d)| *d).collect();
        assert_eq!(delays, vec![0.0, 0.05]);
    }

    #[test]
    fn late_events_play_immediately() {
        let log = Log::default();
        let mut registry = VoiceRegistry::new(vec![Box::new(Fake {
            ready: true,
            reject: None,
            log: log.clone(),
        })]);
        registry.dispatch(&[event(0, C4, 1.0)], 2.0);
        assert_eq!(log.lock().unwrap()[0].2, 0.0);
    }
}
