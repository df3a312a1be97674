//! Hotkey chord definition and parsing.
//!
//! A [`Chord`] is a non-empty set of [`ChordKey`]s that must all be held
//! simultaneously.  Modifier members are equivalence classes — `Ctrl` is
//! satisfied by either `ControlLeft` or `ControlRight` — while plain keys
//! must match exactly.  Chords parse from config strings like
//! `"ctrl+alt+t"`.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ---------------------------------------------------------------------------
// ChordParseError
// ---------------------------------------------------------------------------

/// Failure to parse a chord from its config string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChordParseError {
    /// The chord string contained no keys.
    #[error("hotkey chord is empty")]
    Empty,

    /// A token did not name a known key.
    #[error("unknown key name in hotkey chord: {0:?}")]
    UnknownKey(String),
}

// ---------------------------------------------------------------------------
// ChordKey
// ---------------------------------------------------------------------------

/// One member of a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordKey {
    /// Either control key.
    Ctrl,
    /// Either alt key (left `Alt` or right `AltGr`).
    Alt,
    /// Either shift key.
    Shift,
    /// Either meta / super / command key.
    Meta,
    /// An exact non-modifier key.
    Plain(rdev::Key),
}

impl ChordKey {
    /// Returns `true` when the currently-held key set satisfies this member.
    pub fn is_held(&self, held: &HashSet<rdev::Key>) -> bool {
        use rdev::Key;
        match self {
            ChordKey::Ctrl => held.contains(&Key::ControlLeft) || held.contains(&Key::ControlRight),
            ChordKey::Alt => held.contains(&Key::Alt) || held.contains(&Key::AltGr),
            ChordKey::Shift => held.contains(&Key::ShiftLeft) || held.contains(&Key::ShiftRight),
            ChordKey::Meta => held.contains(&Key::MetaLeft) || held.contains(&Key::MetaRight),
            ChordKey::Plain(k) => held.contains(k),
        }
    }
}

impl fmt::Display for ChordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordKey::Ctrl => f.write_str("ctrl"),
            ChordKey::Alt => f.write_str("alt"),
            ChordKey::Shift => f.write_str("shift"),
            ChordKey::Meta => f.write_str("meta"),
            ChordKey::Plain(k) => write!(f, "{k:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Chord
// ---------------------------------------------------------------------------

/// A non-empty set of keys that must be held simultaneously.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    keys: Vec<ChordKey>,
}

impl Chord {
    /// The chord's members, in parse order.
    pub fn keys(&self) -> &[ChordKey] {
        &self.keys
    }

    /// Returns `true` when every member is satisfied by `held` at once.
    pub fn is_satisfied(&self, held: &HashSet<rdev::Key>) -> bool {
        self.keys.iter().all(|k| k.is_held(held))
    }
}

impl FromStr for Chord {
    type Err = ChordParseError;

    /// Parse a `+`-separated chord string, e.g. `"ctrl+alt+t"`.
    ///
    /// Key names are case-insensitive; duplicate members collapse to one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut keys = Vec::new();
        for token in s.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            let lowered = token.to_ascii_lowercase();
            let key = match lowered.as_str() {
                "ctrl" | "control" => ChordKey::Ctrl,
                "alt" | "option" => ChordKey::Alt,
                "shift" => ChordKey::Shift,
                "meta" | "super" | "cmd" | "win" => ChordKey::Meta,
                other => ChordKey::Plain(
                    parse_key(other).ok_or_else(|| ChordParseError::UnknownKey(token.into()))?,
                ),
            };
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Err(ChordParseError::Empty);
        }
        Ok(Chord { keys })
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Map a lowercase key name onto an [`rdev::Key`].
///
/// Covers letters, digits, F1–F12 and common named keys; returns `None` for
/// anything unrecognised so callers can surface a config error.
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key;
    let key = match name {
        "a" => Key::KeyA,
        "b" => Key::KeyB,
        "c" => Key::KeyC,
        "d" => Key::KeyD,
        "e" => Key::KeyE,
        "f" => Key::KeyF,
        "g" => Key::KeyG,
        "h" => Key::KeyH,
        "i" => Key::KeyI,
        "j" => Key::KeyJ,
        "k" => Key::KeyK,
        "l" => Key::KeyL,
        "m" => Key::KeyM,
        "n" => Key::KeyN,
        "o" => Key::KeyO,
        "p" => Key::KeyP,
        "q" => Key::KeyQ,
        "r" => Key::KeyR,
        "s" => Key::KeyS,
        "t" => Key::KeyT,
        "u" => Key::KeyU,
        "v" => Key::KeyV,
        "w" => Key::KeyW,
        "x" => Key::KeyX,
        "y" => Key::KeyY,
        "z" => Key::KeyZ,

        "0" => Key::Num0,
        "1" => Key::Num1,
        "2" => Key::Num2,
        "3" => Key::Num3,
        "4" => Key::Num4,
        "5" => Key::Num5,
        "6" => Key::Num6,
        "7" => Key::Num7,
        "8" => Key::Num8,
        "9" => Key::Num9,

        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,

        "space" => Key::Space,
        "tab" => Key::Tab,
        "escape" | "esc" => Key::Escape,
        "return" | "enter" => Key::Return,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "capslock" => Key::CapsLock,

        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rdev::Key;

    fn held(keys: &[Key]) -> HashSet<Key> {
        keys.iter().copied().collect()
    }

    #[test]
    fn parses_default_chord() {
        let chord: Chord = "ctrl+alt+t".parse().unwrap();
        assert_eq!(
            chord.keys(),
            &[ChordKey::Ctrl, ChordKey::Alt, ChordKey::Plain(Key::KeyT)]
        );
    }

    #[test]
    fn parse_is_case_insensitive_and_trims() {
        let chord: Chord = " Ctrl + ALT + T ".parse().unwrap();
        assert_eq!(chord.keys().len(), 3);
    }

    #[test]
    fn duplicate_members_collapse() {
        let chord: Chord = "ctrl+control+t".parse().unwrap();
        assert_eq!(chord.keys(), &[ChordKey::Ctrl, ChordKey::Plain(Key::KeyT)]);
    }

    #[test]
    fn empty_string_is_rejected() {
        assert_eq!("".parse::<Chord>(), Err(ChordParseError::Empty));
        assert_eq!(" + ".parse::<Chord>(), Err(ChordParseError::Empty));
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(matches!(
            "ctrl+bogus".parse::<Chord>(),
            Err(ChordParseError::UnknownKey(_))
        ));
    }

    #[test]
    fn either_side_modifier_satisfies_class() {
        let chord: Chord = "ctrl+t".parse().unwrap();
        assert!(chord.is_satisfied(&held(&[Key::ControlLeft, Key::KeyT])));
        assert!(chord.is_satisfied(&held(&[Key::ControlRight, Key::KeyT])));
        assert!(!chord.is_satisfied(&held(&[Key::KeyT])));
    }

    #[test]
    fn all_members_required_simultaneously() {
        let chord: Chord = "ctrl+alt+t".parse().unwrap();
        assert!(!chord.is_satisfied(&held(&[Key::ControlLeft, Key::KeyT])));
        assert!(!chord.is_satisfied(&held(&[Key::ControlLeft, Key::Alt])));
        assert!(chord.is_satisfied(&held(&[Key::ControlLeft, Key::AltGr, Key::KeyT])));
    }

    #[test]
    fn extra_held_keys_do_not_prevent_satisfaction() {
        let chord: Chord = "ctrl+t".parse().unwrap();
        assert!(chord.is_satisfied(&held(&[Key::ControlLeft, Key::KeyT, Key::ShiftLeft])));
    }

    #[test]
    fn display_round_trips_readably() {
        let chord: Chord = "ctrl+alt+t".parse().unwrap();
        assert_eq!(chord.to_string(), "ctrl+alt+KeyT");
    }
}
