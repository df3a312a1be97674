//! Application coordinator: wires the hub, audio pipeline, model manager,
//! and hotkey detector together.
//!
//! [`App`] owns every subsystem and the single `active` flag.  The toggle
//! flips that flag and publishes `transcription_start` / `transcription_stop`;
//! everything else (capture start/stop, model load, unload timer) reacts to
//! those events through hub subscriptions rather than direct calls.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::audio::AudioPipeline;
use crate::config::AppConfig;
use crate::events::{EventHub, EventName, EventPayload};
use crate::hotkey::{HotkeyDetector, ToggleCallback};
use crate::stt::{EngineFactory, ModelManager};

/// Top-level application state and subsystem wiring.
pub struct App {
    hub: Arc<EventHub>,
    pipeline: Arc<AudioPipeline>,
    manager: Arc<ModelManager>,
    detector: Mutex<Option<HotkeyDetector>>,
    config: AppConfig,
    active: Mutex<bool>,
}

impl App {
    /// Build the subsystems and subscribe them to the hub.
    ///
    /// The manager subscribes before the pipeline so a `transcription_start`
    /// publish kicks off the model load before capture spins up.
    pub fn new(config: AppConfig, factory: Arc<dyn EngineFactory>) -> Arc<Self> {
        let hub = Arc::new(EventHub::new());

        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            factory,
            config.unload_timeout(),
        ));
        manager.attach();

        let pipeline = Arc::new(AudioPipeline::new(Arc::clone(&hub), &config.audio));
        pipeline.attach();

        Arc::new(Self {
            hub,
            pipeline,
            manager,
            detector: Mutex::new(None),
            config,
            active: Mutex::new(false),
        })
    }

    /// Select the input device and start the global hotkey listener.
    ///
    /// `toggle` is invoked on every chord activation; the binary passes a
    /// callback that forwards to [`toggle_transcription`] from its own
    /// runtime.  A hotkey failure tears the other subsystems back down
    /// before the error propagates.
    ///
    /// [`toggle_transcription`]: App::toggle_transcription
    pub fn initialize(&self, toggle: ToggleCallback) -> Result<()> {
        self.pipeline
            .initialize()
            .context("selecting audio input device")?;

        let chord = self.config.chord().context("parsing hotkey chord")?;

        let detector = match HotkeyDetector::start() {
            Ok(d) => d,
            Err(e) => {
                // Without a hotkey the service can never activate; undo the
                // partial startup rather than running deaf.
                self.manager.shutdown();
                self.pipeline.shutdown();
                return Err(e).context("starting global hotkey listener");
            }
        };
        detector.register_hotkey(chord, toggle);
        *self.detector.lock().unwrap() = Some(detector);

        log::info!("app: initialized (hotkey {})", self.config.hotkey);
        Ok(())
    }

    /// Flip between transcribing and idle.
    ///
    /// Publishes `transcription_start` or `transcription_stop`; the publish
    /// happens after the `active` lock is released so subscribers may call
    /// back into the coordinator.
    pub fn toggle_transcription(&self) {
        let starting = {
            let mut active = self.active.lock().unwrap();
            *active = !*active;
            *active
        };

        if starting {
            log::info!("app: transcription started");
            self.hub
                .publish(EventName::TranscriptionStart, EventPayload::None);
        } else {
            log::info!("app: transcription stopped");
            self.hub
                .publish(EventName::TranscriptionStop, EventPayload::None);
        }
    }

    /// Whether a transcription session is active.
    pub fn is_active(&self) -> bool {
        *self.active.lock().unwrap()
    }

    /// The shared event hub, for external subscribers (result sinks, tests).
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Stop an active session, the hotkey listener, the manager, and the
    /// pipeline, in that order.  Idempotent.
    pub fn shutdown(&self) {
        let was_active = {
            let mut active = self.active.lock().unwrap();
            std::mem::replace(&mut *active, false)
        };
        if was_active {
            self.hub
                .publish(EventName::TranscriptionStop, EventPayload::None);
        }

        if let Some(detector) = self.detector.lock().unwrap().take() {
            detector.shutdown();
        }
        self.manager.shutdown();
        self.pipeline.shutdown();
        log::info!("app: shut down");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::{ModelState, Segment, SpeechEngine, SttError};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    struct StubFactory;

    impl EngineFactory for StubFactory {
        fn load(&self) -> Result<Arc<dyn SpeechEngine>, SttError> {
            struct Stub;
            impl SpeechEngine for Stub {
                fn transcribe(&self, _: &[f32], _: u32) -> Result<Vec<Segment>, SttError> {
                    Ok(vec![Segment { text: "ok".into() }])
                }
            }
            Ok(Arc::new(Stub))
        }
    }

    fn app() -> Arc<App> {
        App::new(AppConfig::default(), Arc::new(StubFactory))
    }

    #[test]
    fn toggle_alternates_start_and_stop_events() {
        let app = app();
        let (tx, rx) = mpsc::channel();

        let tx_start = tx.clone();
        app.hub().subscribe(
            EventName::TranscriptionStart,
            crate::events::handler(move |_| {
                let _ = tx_start.send("start");
            }),
        );
        app.hub().subscribe(
            EventName::TranscriptionStop,
            crate::events::handler(move |_| {
                let _ = tx.send("stop");
            }),
        );

        app.toggle_transcription();
        assert!(app.is_active());
        app.toggle_transcription();
        assert!(!app.is_active());

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "start");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "stop");
        app.shutdown();
    }

    #[test]
    fn toggle_start_drives_model_load() {
        let app = app();
        app.toggle_transcription();

        let deadline = Instant::now() + Duration::from_secs(2);
        while app.manager.state() != ModelState::Loaded {
            assert!(Instant::now() < deadline, "model never loaded");
            std::thread::sleep(Duration::from_millis(5));
        }
        app.shutdown();
    }

    #[test]
    fn shutdown_stops_an_active_session() {
        let app = app();
        let (tx, rx) = mpsc::channel();
        app.hub().subscribe(
            EventName::TranscriptionStop,
            crate::events::handler(move |_| {
                let _ = tx.send(());
            }),
        );

        app.toggle_transcription();
        app.shutdown();

        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(!app.is_active());
        // A second shutdown must be harmless.
        app.shutdown();
    }
}
