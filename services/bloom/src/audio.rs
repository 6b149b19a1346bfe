//! Microphone and speaker streams.
//!
//! cpal streams are not `Send`, so they live on a dedicated thread for as
//! long as the [`AudioGuard`] is alive. The async side only ever sees
//! channels and the speaker ring buffer.

use crate::config::{INPUT_CHUNK_SIZE, OUTPUT_BUFFER_MS, OUTPUT_CHUNK_SIZE};
use bloom_core::CapabilityError;
use bloom_native_utils::audio::{downmix, shared_buffer};
use bloom_native_utils::device;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BuildStreamError, FrameCount, PlayStreamError, StreamConfig};
use ringbuf::traits::{Consumer, Split};
use ringbuf::{HeapCons, HeapProd};
use tokio::sync::mpsc;

/// Whether the speaker is currently playing agent audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Playing,
    Drained,
}

/// Mono microphone frames at the device rate.
pub struct MicFeed {
    pub frames: mpsc::Receiver<Vec<f32>>,
    pub sample_rate: u32,
}

/// Where decoded agent audio goes.
pub struct SpeakerFeed {
    pub samples: HeapProd<f32>,
    pub sample_rate: u32,
    pub playback: mpsc::Receiver<Playback>,
}

/// Keeps the audio thread and its streams alive. Dropping it stops both.
pub struct AudioGuard {
    _stop: std::sync::mpsc::Sender<()>,
}

pub struct AudioIo {
    pub mic: MicFeed,
    pub speaker: SpeakerFeed,
    pub guard: AudioGuard,
}

struct Opened {
    input_rate: u32,
    output_rate: u32,
    samples: HeapProd<f32>,
}

/// Opens the default (or named) microphone and the default speaker.
///
/// Blocks until the audio thread reports that both streams are playing.
pub fn open(input_device: Option<String>) -> Result<AudioIo, CapabilityError> {
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<Opened, CapabilityError>>();
    let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
    let (mic_tx, mic_rx) = mpsc::channel::<Vec<f32>>(1024);
    let (playback_tx, playback_rx) = mpsc::channel::<Playback>(16);

    std::thread::Builder::new()
        .name("bloom-audio".to_string())
        .spawn(move || match build_streams(input_device.as_deref(), mic_tx, playback_tx) {
            Ok((streams, opened)) => {
                if ready_tx.send(Ok(opened)).is_err() {
                    return;
                }
                // Returns once the guard is dropped.
                let _ = stop_rx.recv();
                drop(streams);
                tracing::info!("audio streams closed");
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        })
        .map_err(|e| CapabilityError::Other(format!("Failed to start audio thread: {e}")))?;

    let opened = ready_rx
        .recv()
        .map_err(|_| CapabilityError::Other("Audio thread exited during setup".to_string()))??;

    Ok(AudioIo {
        mic: MicFeed {
            frames: mic_rx,
            sample_rate: opened.input_rate,
        },
        speaker: SpeakerFeed {
            samples: opened.samples,
            sample_rate: opened.output_rate,
            playback: playback_rx,
        },
        guard: AudioGuard { _stop: stop_tx },
    })
}

fn build_streams(
    input_device: Option<&str>,
    mic_tx: mpsc::Sender<Vec<f32>>,
    playback_tx: mpsc::Sender<Playback>,
) -> Result<((cpal::Stream, cpal::Stream), Opened), CapabilityError> {
    let input = device::find_input(input_device)
        .map_err(|e| CapabilityError::Other(format!("{e:#}")))?
        .ok_or(CapabilityError::DeviceNotFound)?;
    tracing::info!("Using input device: {:?}", input.name().unwrap_or_default());

    let input_config = input
        .default_input_config()
        .map_err(|e| CapabilityError::Other(format!("Failed to get default input config: {e}")))?;
    let input_config = StreamConfig {
        channels: input_config.channels(),
        sample_rate: input_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    let input_channel_count = input_config.channels as usize;
    tracing::info!("Input stream config: {:?}", &input_config);

    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        if let Err(e) = mic_tx.try_send(downmix(data, input_channel_count)) {
            tracing::debug!("Dropping microphone frame: {}", e);
        }
    };
    let input_stream = input
        .build_input_stream(
            &input_config,
            input_data_fn,
            move |err| tracing::error!("An error occurred on input stream: {}", err),
            None,
        )
        .map_err(map_build_error)?;
    input_stream.play().map_err(map_play_error)?;

    let output = device::find_output(None)
        .map_err(|e| CapabilityError::Other(format!("{e:#}")))?
        .ok_or_else(|| CapabilityError::Other("No speaker found.".to_string()))?;
    tracing::info!("Using output device: {:?}", output.name().unwrap_or_default());

    let output_config = output
        .default_output_config()
        .map_err(|e| CapabilityError::Other(format!("Failed to get default output config: {e}")))?;
    let output_config = StreamConfig {
        channels: output_config.channels(),
        sample_rate: output_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    let output_channel_count = output_config.channels as usize;
    let output_rate = output_config.sample_rate.0;
    tracing::info!("Output stream config: {:?}", &output_config);

    let buffer = shared_buffer(output_rate as usize * OUTPUT_BUFFER_MS / 1000);
    let (samples, consumer) = buffer.split();
    let output_stream = output
        .build_output_stream(
            &output_config,
            {
                let mut speaker = Speaker {
                    consumer,
                    channels: output_channel_count,
                    playing: false,
                    playback_tx,
                };
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| speaker.fill(data)
            },
            move |err| tracing::error!("An error occurred on output stream: {}", err),
            None,
        )
        .map_err(map_build_error)?;
    output_stream.play().map_err(map_play_error)?;

    Ok((
        (input_stream, output_stream),
        Opened {
            input_rate: input_config.sample_rate.0,
            output_rate,
            samples,
        },
    ))
}

/// Drains the speaker ring buffer into the output stream.
struct Speaker {
    consumer: HeapCons<f32>,
    channels: usize,
    playing: bool,
    playback_tx: mpsc::Sender<Playback>,
}

impl Speaker {
    /// Copies mono samples to the first two channels, pads with silence, and
    /// reports playing/drained transitions.
    fn fill(&mut self, data: &mut [f32]) {
        let mut popped = false;
        for frame in data.chunks_mut(self.channels.max(1)) {
            let sample = match self.consumer.try_pop() {
                Some(sample) => {
                    popped = true;
                    sample
                }
                None => 0.0,
            };
            for (idx, slot) in frame.iter_mut().enumerate() {
                *slot = if idx < 2 { sample } else { 0.0 };
            }
        }
        if popped != self.playing {
            self.playing = popped;
            let state = if popped {
                Playback::Playing
            } else {
                Playback::Drained
            };
            if let Err(e) = self.playback_tx.try_send(state) {
                tracing::warn!("Failed to report playback state: {:?}", e);
            }
        }
    }
}

fn map_build_error(err: BuildStreamError) -> CapabilityError {
    match err {
        BuildStreamError::DeviceNotAvailable => CapabilityError::DeviceNotFound,
        BuildStreamError::StreamConfigNotSupported => CapabilityError::Unsupported,
        BuildStreamError::BackendSpecific { err } if is_permission_error(&err.description) => {
            CapabilityError::PermissionDenied
        }
        other => CapabilityError::Other(format!("Failed to open audio stream: {other}")),
    }
}

fn map_play_error(err: PlayStreamError) -> CapabilityError {
    match err {
        PlayStreamError::DeviceNotAvailable => CapabilityError::DeviceNotFound,
        PlayStreamError::BackendSpecific { err } if is_permission_error(&err.description) => {
            CapabilityError::PermissionDenied
        }
        other => CapabilityError::Other(format!("Failed to start audio stream: {other}")),
    }
}

fn is_permission_error(description: &str) -> bool {
    let description = description.to_lowercase();
    description.contains("permission") || description.contains("denied")
}
