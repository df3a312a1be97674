//! Background dictation service: a global hotkey toggles live microphone
//! transcription, and the recognition model is dropped from memory after a
//! configurable idle period.
//!
//! Subsystems communicate through the [`events::EventHub`]; see
//! [`app::App`] for how they are wired together.

pub mod app;
pub mod audio;
pub mod config;
pub mod events;
pub mod hotkey;
pub mod stt;
