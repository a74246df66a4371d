use super::{Voice, VoiceError};
use crate::audio::AudioSender;
use crate::audio_api::{AudioCommand, Source, TriggerParams};
use crate::pipeline::channel::Waveform;
use crate::pipeline::pitch::Pitch;

const GAIN: f32 = 0.8;
const MIN_MIDI: i16 = 0;
const MAX_MIDI: i16 = 127;

/// Oscillator voice; ready as soon as it exists.
pub struct SynthVoice {
    waveform: Waveform,
    audio: AudioSender,
    disposed: bool,
}

impl SynthVoice {
    pub fn new(waveform: Waveform, audio: AudioSender) -> Self {
        Self {
            waveform,
            audio,
            disposed: false,
        }
    }
}

impl Voice for SynthVoice {
    fn is_ready(&self) -> bool {
        !self.disposed
    }

    fn trigger(&mut self, pitch: Pitch, duration: f64, delay: f64) -> Result<(), VoiceError> {
        if self.disposed {
            return Err(VoiceError::Disposed);
        }
        if !(MIN_MIDI..=MAX_MIDI).contains(&pitch.midi()) {
            return Err(VoiceError::OutOfRange(pitch));
        }
        self.audio
            .try_send(AudioCommand::Trigger(TriggerParams {
                source: Source::Synth {
                    waveform: self.waveform,
                    pitch,
                },
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
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioHandle;
    use crate::pipeline::pitch::NoteName;

    #[test]
    fn trigger_reaches_the_engine_queue() {
        let (audio, rx) = AudioHandle::detached(48_000);
        let mut voice = SynthVoice::new(Waveform::Saw, audio);
        assert!(voice.is_ready());
        voice.trigger(Pitch::new(NoteName::A, 4), 0.5, 0.25).unwrap();
        match rx.try_recv().unwrap() {
            AudioCommand::Trigger(params) => {
                assert_eq!(params.duration, 0.5);
                assert_eq!(params.delay, 0.25);
                assert!(matches!(params.source, Source::Synth { waveform: Waveform::Saw, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_unplayable_pitches_and_use_after_dispose() {
        let (audio, _rx) = AudioHandle::detached(48_000);
        let mut voice = SynthVoice::new(Waveform::Sine, audio);
        let too_high = Pitch::new(NoteName::C, 12);
        assert_eq!(voice.trigger(too_high, 0.1, 0.0), Err(VoiceError::OutOfRange(too_high)));
        voice.dispose();
        assert!(!voice.is_ready());
        assert_eq!(voice.trigger(Pitch::new(NoteName::C, 4), 0.1, 0.0), Err(VoiceError::Disposed));
    }

    #[test]
    fn closed_engine_is_a_backend_error() {
        let (audio, rx) = AudioHandle::detached(48_000);
        drop(rx);
        let mut voice = SynthVoice::new(Waveform::Sine, audio);
        assert!(matches!(
            voice.trigger(Pitch::new(NoteName::C, 4), 0.1, 0.0),
            Err(VoiceError::Backend(_))
        ));
    }
}
