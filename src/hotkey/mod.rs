//! Global chorded-hotkey detection, backed by `rdev`.
//!
//! [`chord::Chord`] describes the key combination (modifiers as
//! either-left-or-right equivalence classes, plain keys exact);
//! [`detector::ChordTracker`] is the pure press/release state machine; and
//! [`detector::HotkeyDetector`] wires the tracker to the blocking
//! `rdev::listen` thread and dispatches the toggle callback off that thread.

pub mod chord;
pub mod detector;

pub use chord::{Chord, ChordKey, ChordParseError};
pub use detector::{ChordTracker, HotkeyDetector, ToggleCallback};

use thiserror::Error;

/// Errors raised by the hotkey subsystem.
///
/// Chord-string parse failures surface as [`ChordParseError`] when the
/// config string is parsed; the config layer wraps them before the detector
/// is ever involved.
#[derive(Debug, Error)]
pub enum HotkeyError {
    /// No platform key-event source is available.  Fatal to detector
    /// initialization.
    #[error("no global key-event source available: {0}")]
    Unavailable(String),
}
