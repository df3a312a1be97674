//! Named publish/subscribe events shared by every subsystem.
//!
//! The event catalogue is a closed set ([`EventName`]) and each name carries a
//! typed payload ([`EventPayload`]), so a subscriber never has to downcast or
//! guess the shape of what it receives.  The hub itself lives in
//! [`hub::EventHub`].

pub mod hub;

pub use hub::{handler, EventHub, Handler};

use std::fmt;
use std::time::SystemTime;

use crate::audio::AudioChunk;

// ---------------------------------------------------------------------------
// EventName
// ---------------------------------------------------------------------------

/// Every event name the application publishes.
///
/// | Name                  | Payload                     | Publisher            |
/// |-----------------------|-----------------------------|----------------------|
/// | `TranscriptionStart`  | none                        | coordinator          |
/// | `TranscriptionStop`   | none                        | coordinator          |
/// | `AudioStarted`        | none                        | audio pipeline       |
/// | `AudioStopped`        | none                        | audio pipeline       |
/// | `AudioChunk`          | [`AudioChunk`]              | audio pipeline       |
/// | `ModelLoaded`         | none                        | model manager        |
/// | `ModelUnloaded`       | none                        | model manager        |
/// | `ModelLoadError`      | `LoadError { message }`     | model manager        |
/// | `TranscriptionResult` | `Transcript { text, .. }`   | transcription worker |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    TranscriptionStart,
    TranscriptionStop,
    AudioStarted,
    AudioStopped,
    AudioChunk,
    ModelLoaded,
    ModelUnloaded,
    ModelLoadError,
    TranscriptionResult,
}

impl EventName {
    /// Stable snake_case name used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::TranscriptionStart => "transcription_start",
            EventName::TranscriptionStop => "transcription_stop",
            EventName::AudioStarted => "audio_started",
            EventName::AudioStopped => "audio_stopped",
            EventName::AudioChunk => "audio_chunk",
            EventName::ModelLoaded => "model_loaded",
            EventName::ModelUnloaded => "model_unloaded",
            EventName::ModelLoadError => "model_load_error",
            EventName::TranscriptionResult => "transcription_result",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Typed payload attached to an [`Event`].
///
/// Which variant accompanies which [`EventName`] is fixed by convention (see
/// the table on [`EventName`]); subscribers match on the variant they expect
/// and ignore anything else.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// No payload (`transcription_start`, `audio_started`, `model_loaded`, …).
    None,
    /// A gated chunk of captured audio (`audio_chunk`).
    AudioChunk(AudioChunk),
    /// A model load failure report (`model_load_error`).
    LoadError {
        /// Human-readable description of the failure.
        message: String,
    },
    /// A finished transcription (`transcription_result`).
    Transcript {
        /// Transcript text; empty when the engine failed on this chunk.
        text: String,
        /// When the transcription completed.
        timestamp: SystemTime,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A single published event.
///
/// Constructed by [`EventHub::publish`], handed by reference to every
/// subscribed handler, and dropped once the last handler returns.
#[derive(Debug, Clone)]
pub struct Event {
    /// Which event this is.
    pub name: EventName,
    /// Payload matching `name` per the catalogue.
    pub payload: EventPayload,
    /// When the event was published.
    pub timestamp: SystemTime,
}
