//! Speech-to-text: the engine boundary and the model lifecycle manager.
//!
//! [`engine::SpeechEngine`] is the opaque recognition-engine contract;
//! [`engine::WhisperEngine`] is the production implementation.
//! [`manager::ModelManager`] owns the single engine instance: lazy load on
//! `transcription_start`, a persistent transcription worker, and idle-timeout
//! unload after `transcription_stop`.

pub mod engine;
pub mod manager;

pub use engine::{
    DecodeParams, EngineFactory, Segment, SpeechEngine, SttError, WhisperEngine, WhisperFactory,
};
pub use manager::{ModelManager, ModelState};
