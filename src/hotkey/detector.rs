//! Chord tracking and the `rdev` listener thread.
//!
//! [`ChordTracker`] is the pure state machine: it maintains the set of
//! currently-held keys and reports when the configured chord becomes
//! satisfied.  Triggering clears the held set, so holding the chord down
//! fires the toggle once rather than on every incidental key event; the
//! chord must be fully released and re-pressed to fire again.
//!
//! [`HotkeyDetector`] owns the dedicated OS thread running `rdev::listen`
//! (a blocking call with no graceful shutdown — the thread lives until the
//! process exits, and a stop flag makes it discard events).  The toggle
//! callback runs on a freshly spawned dispatch thread so a slow handler can
//! never stall the OS key-event pump.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{Chord, HotkeyError};

/// Invoked once per chord activation, on a dispatch thread.
pub type ToggleCallback = Arc<dyn Fn() + Send + Sync>;

/// How long `start` waits for `rdev::listen` to report a startup failure
/// before assuming the listener is running.
const STARTUP_PROBE: Duration = Duration::from_millis(300);

// ---------------------------------------------------------------------------
// ChordTracker
// ---------------------------------------------------------------------------

/// Press/release state machine for one chord.
#[derive(Debug, Clone)]
pub struct ChordTracker {
    chord: Chord,
    held: HashSet<rdev::Key>,
}

impl ChordTracker {
    /// Track `chord` with an empty held set.
    pub fn new(chord: Chord) -> Self {
        Self {
            chord,
            held: HashSet::new(),
        }
    }

    /// Record a key press.  Returns `true` when this press completes the
    /// chord; the held set is then cleared so the activation is
    /// edge-triggered.
    pub fn on_press(&mut self, key: rdev::Key) -> bool {
        self.held.insert(key);
        if self.chord.is_satisfied(&self.held) {
            self.held.clear();
            true
        } else {
            false
        }
    }

    /// Record a key release.
    pub fn on_release(&mut self, key: rdev::Key) {
        self.held.remove(&key);
    }

    /// Swap the tracked chord.  The held set is cleared so a half-pressed
    /// old chord cannot trigger the new one.
    pub fn set_chord(&mut self, chord: Chord) {
        self.chord = chord;
        self.held.clear();
    }

    /// The chord currently being tracked.
    pub fn chord(&self) -> &Chord {
        &self.chord
    }
}

// ---------------------------------------------------------------------------
// HotkeyDetector
// ---------------------------------------------------------------------------

struct DetectorState {
    tracker: Option<ChordTracker>,
    callback: Option<ToggleCallback>,
}

/// Handle to the global key listener.
///
/// One mutex guards both the chord definition and the held-key state, so
/// [`register_hotkey`] cannot race an in-flight press/release.
///
/// [`register_hotkey`]: HotkeyDetector::register_hotkey
pub struct HotkeyDetector {
    shared: Arc<Mutex<DetectorState>>,
    stop: Arc<AtomicBool>,
}

impl HotkeyDetector {
    /// Spawn the `rdev` listener thread.
    ///
    /// Until [`register_hotkey`] is called, key events are observed but
    /// nothing can trigger.
    ///
    /// # Errors
    ///
    /// [`HotkeyError::Unavailable`] when the platform refuses to deliver
    /// global key events (no display server, missing permissions, …).
    ///
    /// [`register_hotkey`]: HotkeyDetector::register_hotkey
    pub fn start() -> Result<Self, HotkeyError> {
        let shared = Arc::new(Mutex::new(DetectorState {
            tracker: None,
            callback: None,
        }));
        let stop = Arc::new(AtomicBool::new(false));

        let (err_tx, err_rx) = mpsc::channel::<String>();
        let listener_shared = Arc::clone(&shared);
        let listener_stop = Arc::clone(&stop);

        thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if listener_stop.load(Ordering::Relaxed) {
                        return;
                    }
                    handle_key_event(&listener_shared, &event.event_type);
                });
                if let Err(e) = result {
                    report_listener_failure(format!("{e:?}"), &err_tx);
                }
            })
            .map_err(|e| HotkeyError::Unavailable(e.to_string()))?;

        // rdev::listen never returns on success, so a quick failure here is
        // the only synchronous signal we get that no key source exists.
        match err_rx.recv_timeout(STARTUP_PROBE) {
            Ok(message) => Err(HotkeyError::Unavailable(message)),
            Err(_) => Ok(Self { shared, stop }),
        }
    }

    /// Install (or hot-swap) the active chord and toggle callback.
    ///
    /// Safe to call at any time; the swap happens under the same lock the
    /// listener uses for press/release processing.
    pub fn register_hotkey(&self, chord: Chord, callback: ToggleCallback) {
        log::info!("hotkey: registered chord {chord}");
        let mut st = self.shared.lock().unwrap();
        match st.tracker.as_mut() {
            Some(tracker) => tracker.set_chord(chord),
            None => st.tracker = Some(ChordTracker::new(chord)),
        }
        st.callback = Some(callback);
    }

    /// Stop forwarding key events.  The listener thread itself remains
    /// blocked inside `rdev::listen` until the process exits.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for HotkeyDetector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Report a dead key listener.  During startup the message travels back
/// through the probe channel; after `start` has returned, the receiver is
/// gone and this log line is the only visible trace, so it is emitted
/// unconditionally.
fn report_listener_failure(message: String, err_tx: &mpsc::Sender<String>) {
    log::error!("hotkey: key listener failed: {message}");
    let _ = err_tx.send(message);
}

/// Feed one rdev event through the tracker and dispatch the callback when
/// the chord fires.  The lock is released before the callback thread spawns.
fn handle_key_event(shared: &Arc<Mutex<DetectorState>>, event_type: &rdev::EventType) {
    let fired = {
        let mut st = shared.lock().unwrap();
        match event_type {
            rdev::EventType::KeyPress(key) => {
                let triggered = st
                    .tracker
                    .as_mut()
                    .map_or(false, |tracker| tracker.on_press(*key));
                if triggered {
                    st.callback.clone()
                } else {
                    None
                }
            }
            rdev::EventType::KeyRelease(key) => {
                if let Some(tracker) = st.tracker.as_mut() {
                    tracker.on_release(*key);
                }
                None
            }
            _ => None,
        }
    };

    if let Some(callback) = fired {
        log::debug!("hotkey: chord activated");
        let spawned = thread::Builder::new()
            .name("hotkey-dispatch".into())
            .spawn(move || callback());
        if let Err(e) = spawned {
            log::error!("hotkey: failed to spawn dispatch thread: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
