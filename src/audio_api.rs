// What the control side may ask of the audio thread. Everything crosses a
// crossbeam channel; the engine never blocks or touches the filesystem.

pub use crate::audio::{SampleBuffer, SampleId};
use crate::pipeline::channel::Waveform;
use crate::pipeline::pitch::Pitch;

#[derive(Clone, Debug)]
pub enum Source {
    Synth { waveform: Waveform, pitch: Pitch },
    Sample { id: SampleId, rate: f32 }, // rate 1.0 = recorded pitch
}

#[derive(Clone, Debug)]
pub struct TriggerParams {
    pub source: Source,
    pub duration: f32, // seconds held before release
    pub delay: f32,    // seconds from when the engine receives it
    pub gain: f32,
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // Buffers are decoded off-thread (loader/) and handed over whole
    RegisterSample { id: SampleId, buffer: SampleBuffer },

    Trigger(TriggerParams),

    // Drop every trigger that has not started yet
    CancelPending,
}
