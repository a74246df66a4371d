use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::audio_api::AudioCommand;

mod engine;
mod frame;
mod sample_buffer;
mod sample_id;
mod voice;

pub use engine::Engine;
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;
pub use sample_id::SampleId;

const COMMAND_QUEUE: usize = 1024;

/// Cheap clonable handle the voices use to talk to the engine.
#[derive(Clone, Debug)]
pub struct AudioSender {
    tx: Sender<AudioCommand>,
    sample_rate: u32,
}

impl AudioSender {
    /// Never blocks; a full or closed queue is reported, not waited on.
    pub fn try_send(&self, cmd: AudioCommand) -> Result<(), String> {
        self.tx.try_send(cmd).map_err(|e| match e {
            TrySendError::Full(_) => "audio command queue is full".to_string(),
            TrySendError::Disconnected(_) => "audio engine is not running".to_string(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub struct AudioHandle {
    sender: AudioSender,
    _output_stream: Option<cpal::Stream>,
    _detached_rx: Option<Receiver<AudioCommand>>, // keeps a silent handle's queue open
}

impl AudioHandle {
    pub fn sender(&self) -> AudioSender {
        self.sender.clone()
    }

    /// A handle with no device behind it. Commands are accepted and never played.
    pub fn silent(sample_rate: u32) -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);
        Self {
            sender: AudioSender { tx, sample_rate },
            _output_stream: None,
            _detached_rx: Some(rx),
        }
    }

    /// Like `silent`, but the queue is handed back so tests can inspect it.
    pub fn detached(sample_rate: u32) -> (AudioSender, Receiver<AudioCommand>) {
        let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);
        (AudioSender { tx, sample_rate }, rx)
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate: u32 = config.sample_rate();
    let channels = config.channels() as usize;

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let stream = build_output_stream_f32(&device, &config.into(), rx, sample_rate, channels)?;
            stream.play().context("failed to play output stream")?;
            log::info!("audio output running at {sample_rate} Hz, {channels} channels");
            Ok(AudioHandle {
                sender: AudioSender { tx, sample_rate },
                _output_stream: Some(stream),
                _detached_rx: None,
            })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    sample_rate: u32,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new(sample_rate);
    let mut scratch: Vec<StereoFrame> = Vec::with_capacity(4096);

    let err_fn = |err| log::warn!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            scratch.clear();
            scratch.resize(n_frames, StereoFrame::zero());
            engine.render_block(&mut scratch);

            // interleave: L/R into the first two channels, mono-sum into the rest
            for (out, frame) in data.chunks_exact_mut(channels.max(1)).zip(scratch.iter()) {
                for (ch, sample) in out.iter_mut().enumerate() {
                    *sample = match ch {
                        0 => frame.left,
                        1 => frame.right,
                        _ => 0.5 * (frame.left + frame.right),
                    };
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
