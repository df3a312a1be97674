//! Recognition engine contract and the whisper-rs implementation.
//!
//! [`SpeechEngine`] is the boundary the lifecycle manager sees: raw samples
//! in, text segments out.  It is object-safe and `Send + Sync` so the loaded
//! engine can be held behind an `Arc<dyn SpeechEngine>` and shared with the
//! transcription worker.  [`EngineFactory`] abstracts the expensive load so
//! the manager can be exercised in tests without a model file.
//!
//! [`WhisperEngine`] wraps a `whisper_rs::WhisperContext`.  A fresh
//! `WhisperState` is created per call, so repeated calls on one engine need
//! no locking; the manager serializes calls through its single worker anyway.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::resample;
use crate::config::ModelConfig;

/// Sample rate whisper.cpp operates at.
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// whisper.cpp rejects inputs shorter than one second; shorter chunks are
/// zero-padded up to this many samples before inference.
const MIN_WHISPER_SAMPLES: usize = WHISPER_SAMPLE_RATE as usize;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// Errors from loading or running the recognition engine.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The model file was not found at the resolved path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// whisper-rs failed to initialise a context or per-call state.
    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// The inference pass itself failed.
    #[error("transcription failed: {0}")]
    Transcription(String),
}

// ---------------------------------------------------------------------------
// Segment / traits
// ---------------------------------------------------------------------------

/// One text segment returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment text as produced by the engine, untrimmed.
    pub text: String,
}

/// Object-safe, thread-safe recognition engine.
///
/// `samples` are mono `f32` PCM at `sample_rate` Hz; implementations convert
/// internally as needed.  Calls on the same engine must be repeatable;
/// concurrent calls need not be supported.
pub trait SpeechEngine: Send + Sync {
    /// Transcribe `samples` into text segments.
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<Segment>, SttError>;
}

/// Produces a loaded engine on demand.
///
/// The load is expected to take seconds; the lifecycle manager calls it from
/// a dedicated thread without holding any lock.
pub trait EngineFactory: Send + Sync {
    /// Instantiate the engine.
    fn load(&self) -> Result<Arc<dyn SpeechEngine>, SttError>;
}

// ---------------------------------------------------------------------------
// DecodeParams
// ---------------------------------------------------------------------------

/// Decoding parameters for a whisper inference run.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// ISO-639-1 language code, or `"auto"` for built-in detection.
    pub language: String,
    /// Temperature fallback ladder; the first entry seeds decoding and the
    /// step between the first two entries is the fallback increment.
    pub temperatures: Vec<f32>,
    /// Beam width; `1` selects greedy decoding.
    pub beam_size: i32,
    /// CPU threads handed to whisper.
    pub n_threads: i32,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            language: "auto".into(),
            temperatures: vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0],
            beam_size: 5,
            n_threads: optimal_threads(),
        }
    }
}

/// Physical threads to use for inference, capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Production engine wrapping a `whisper_rs::WhisperContext`.
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: DecodeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but whisper-rs declares it
// Send+Sync — the weights are read-only after load.  `DecodeParams` is fully
// owned.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model file and prepare it for inference.
    ///
    /// `use_gpu` is advisory: a CPU-only build of whisper.cpp ignores it.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] — `model_path` does not exist.
    /// - [`SttError::ContextInit`]  — whisper-rs failed to load the file.
    pub fn load(
        model_path: impl AsRef<Path>,
        params: DecodeParams,
        use_gpu: bool,
    ) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(use_gpu);
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        Ok(Self { ctx, params })
    }
}

impl SpeechEngine for WhisperEngine {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<Segment>, SttError> {
        let mut audio = resample(samples, sample_rate, WHISPER_SAMPLE_RATE);
        if audio.len() < MIN_WHISPER_SAMPLES {
            audio.resize(MIN_WHISPER_SAMPLES, 0.0);
        }

        let strategy = if self.params.beam_size > 1 {
            SamplingStrategy::BeamSearch {
                beam_size: self.params.beam_size,
                patience: -1.0,
            }
        } else {
            SamplingStrategy::Greedy { best_of: 1 }
        };
        let mut fp = FullParams::new(strategy);

        let lang: Option<&str> = if self.params.language == "auto" {
            None
        } else {
            Some(self.params.language.as_str())
        };
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        if let Some(&first) = self.params.temperatures.first() {
            fp.set_temperature(first);
            if let Some(&second) = self.params.temperatures.get(1) {
                fp.set_temperature_inc(second - first);
            }
        }

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        state
            .full(fp, &audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut segments = Vec::with_capacity(n_segments as usize);
        for i in 0..n_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            segments.push(Segment { text });
        }

        Ok(segments)
    }
}

// ---------------------------------------------------------------------------
// WhisperFactory
// ---------------------------------------------------------------------------

/// Loads a [`WhisperEngine`] from the configured model size and cache dir.
#[derive(Debug, Clone)]
pub struct WhisperFactory {
    model_path: PathBuf,
    params: DecodeParams,
    device: String,
    compute: String,
}

impl WhisperFactory {
    /// Build a factory from the model section of the configuration.
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            model_path: config.model_file(),
            params: DecodeParams {
                language: config.language.clone(),
                temperatures: config.temperatures.clone(),
                beam_size: config.beam_size,
                n_threads: optimal_threads(),
            },
            device: config.device.clone(),
            compute: config.compute.clone(),
        }
    }

    /// Path the factory will load the GGML model from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl EngineFactory for WhisperFactory {
    fn load(&self) -> Result<Arc<dyn SpeechEngine>, SttError> {
        log::info!(
            "stt: loading model {} (device {}, compute {})",
            self.model_path.display(),
            self.device,
            self.compute
        );
        // "auto" and "cuda" both ask for the GPU; a CPU-only build falls
        // back on its own.
        let use_gpu = self.device != "cpu";
        let engine = WhisperEngine::load(&self.model_path, self.params.clone(), use_gpu)?;
        Ok(Arc::new(engine))
    }
}

// ---------------------------------------------------------------------------
// MockEngine (test-only)
// ---------------------------------------------------------------------------

/// Test double returning a pre-configured response without a model file.
#[cfg(test)]
pub struct MockEngine {
    response: Result<Vec<Segment>, SttError>,
}

#[cfg(test)]
impl MockEngine {
    /// Mock that returns the given segment texts.
    pub fn segments(texts: &[&str]) -> Self {
        Self {
            response: Ok(texts
                .iter()
                .map(|t| Segment {
                    text: (*t).to_string(),
                })
                .collect()),
        }
    }

    /// Mock that always fails.
    pub fn err(error: SttError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl SpeechEngine for MockEngine {
    fn transcribe(&self, _samples: &[f32], _sample_rate: u32) -> Result<Vec<Segment>, SttError> {
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
