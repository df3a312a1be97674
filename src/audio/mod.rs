//! Audio capture, voice-activity gating, and sample-rate conversion.
//!
//! [`AudioPipeline`] owns the cpal device and the capture/consumer threads;
//! [`vad::EnergyGate`] is the cheap RMS gate applied before a chunk is
//! published; [`resample`] converts device-rate audio to the 16 kHz the STT
//! engine expects.

pub mod pipeline;
pub mod resample;
pub mod vad;

pub use pipeline::AudioPipeline;
pub use resample::{mix_to_mono, resample};
pub use vad::EnergyGate;

use std::time::SystemTime;

use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// One gated block of captured microphone audio.
///
/// Samples are mono `f32` in `[-1.0, 1.0]` at the device's native rate.
/// Nominal length is `sample_rate × chunk_duration`; the final block before a
/// capture stop may be shorter or dropped entirely.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono PCM samples.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz; fixed for the capture session.
    pub sample_rate: u32,
    /// When the block was drained from the capture queue.
    pub captured_at: SystemTime,
}

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Errors raised while selecting a device or running the capture stream.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No usable input device on the default audio host.  Fatal to pipeline
    /// initialization.
    #[error("no input device found on the default audio host")]
    NoInputDevice,

    #[error("failed to enumerate audio devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    /// Stream build/start failures are reported from the capture thread, so
    /// only the rendered message crosses the channel.
    #[error("failed to build input stream: {0}")]
    BuildStream(String),

    #[error("failed to start audio stream: {0}")]
    PlayStream(String),

    #[error("audio pipeline has not been initialized")]
    NotInitialized,
}
