//! TOML configuration: schema, defaults, validation, and disk round-trip.
//!
//! The file lives at `~/.config/speakwrite/config.toml` and is created with
//! defaults on first run.  Unknown fields are ignored and missing fields take
//! their defaults, so old config files keep working across upgrades.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hotkey::{Chord, ChordParseError};

/// Sample rates the capture pipeline accepts from configuration.
pub const STANDARD_SAMPLE_RATES: &[u32] =
    &[8_000, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000];

/// Shortest permitted idle-unload timeout, in seconds.
const MIN_UNLOAD_TIMEOUT_SECS: u64 = 30;

/// Longest permitted chunk duration, in seconds.
const MAX_CHUNK_DURATION_SECS: f32 = 2.0;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Validation failures for a loaded configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unload_timeout_secs must be at least {MIN_UNLOAD_TIMEOUT_SECS}s, got {0}")]
    UnloadTimeoutTooShort(u64),

    #[error("unsupported sample rate {0} (expected one of {STANDARD_SAMPLE_RATES:?})")]
    UnsupportedSampleRate(u32),

    #[error("chunk_duration_secs must be in (0.0, {MAX_CHUNK_DURATION_SECS}], got {0}")]
    InvalidChunkDuration(f32),

    #[error("invalid hotkey: {0}")]
    InvalidHotkey(#[from] ChordParseError),
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Recognition model selection and decoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Whisper model size: `tiny`, `base`, `small`, `medium`, `large`.
    pub size: String,
    /// Compute device hint: `auto`, `cpu`, `cuda`.  Advisory; the build of
    /// whisper.cpp decides what is actually available.
    pub device: String,
    /// Compute type hint: `float16`, `float32`, `int8`.
    pub compute: String,
    /// Transcription language, or `auto` to detect.
    pub language: String,
    /// Temperature fallback ladder for decoding.
    pub temperatures: Vec<f32>,
    /// Beam width; `1` means greedy decoding.
    pub beam_size: i32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            size: "small".into(),
            device: "auto".into(),
            compute: "float16".into(),
            language: "auto".into(),
            temperatures: vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0],
            beam_size: 5,
        }
    }
}

impl ModelConfig {
    /// Path of the GGML model file for the configured size, under the user
    /// cache directory (`~/.cache/speakwrite/models/ggml-<size>.bin`).
    pub fn model_file(&self) -> PathBuf {
        let cache = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        cache
            .join("speakwrite")
            .join("models")
            .join(format!("ggml-{}.bin", self.size))
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Capture and gating parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Preferred capture sample rate in Hz; the device default wins when the
    /// device cannot honour it.
    pub sample_rate: u32,
    /// Length of each published audio chunk, in seconds.
    pub chunk_duration_secs: f32,
    /// RMS energy threshold below which a chunk counts as silence.
    pub vad_threshold: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            chunk_duration_secs: 0.5,
            vad_threshold: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Toggle chord, e.g. `"ctrl+alt+t"`.
    pub hotkey: String,
    /// Seconds of inactivity after `transcription_stop` before the model is
    /// dropped from memory.
    pub unload_timeout_secs: u64,
    pub model: ModelConfig,
    pub audio: AudioConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hotkey: "ctrl+alt+t".into(),
            unload_timeout_secs: 300,
            model: ModelConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl AppConfig {
    /// Default config file location
    /// (`~/.config/speakwrite/config.toml`).
    pub fn config_file() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("speakwrite").join("config.toml")
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            log::info!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Serialize to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("serializing config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    /// Check every field that can be wrong; returns the first failure.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.hotkey.parse::<Chord>()?;
        if self.unload_timeout_secs < MIN_UNLOAD_TIMEOUT_SECS {
            return Err(ConfigError::UnloadTimeoutTooShort(self.unload_timeout_secs));
        }
        if !STANDARD_SAMPLE_RATES.contains(&self.audio.sample_rate) {
            return Err(ConfigError::UnsupportedSampleRate(self.audio.sample_rate));
        }
        let chunk = self.audio.chunk_duration_secs;
        if !(chunk > 0.0 && chunk <= MAX_CHUNK_DURATION_SECS) {
            return Err(ConfigError::InvalidChunkDuration(
                self.audio.chunk_duration_secs,
            ));
        }
        Ok(())
    }

    /// The parsed toggle chord.  Call [`validate`](Self::validate) first;
    /// this re-parses and propagates the same error.
    pub fn chord(&self) -> std::result::Result<Chord, ChordParseError> {
        self.hotkey.parse()
    }

    /// Idle-unload timeout as a [`Duration`].
    pub fn unload_timeout(&self) -> Duration {
        Duration::from_secs(self.unload_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
