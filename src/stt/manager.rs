//! Model lifecycle: lazy load, a persistent transcription worker, and
//! idle-timeout unload.
//!
//! [`ModelManager`] holds at most one loaded engine.  `transcription_start`
//! triggers a background load (re-entrant calls while loading or loaded are
//! no-ops), `audio_chunk` feeds the bounded work queue and refreshes the
//! activity clock, and `transcription_stop` arms a one-shot unload timer.
//! Any activity before the timer fires cancels it; generation counters make
//! a stale timer harmless even if it wakes after new work arrived.
//!
//! Lock discipline: the engine `Arc` is cloned under a short state lock and
//! every inference runs outside it, so a multi-second transcription never
//! blocks load, unload, or chunk intake.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use crate::audio::AudioChunk;
use crate::events::{handler, EventHub, EventName, EventPayload};
use crate::stt::engine::{EngineFactory, Segment, SpeechEngine};

/// Chunks queued for transcription before new arrivals are dropped.
const WORK_QUEUE_CAPACITY: usize = 64;

/// How long the worker blocks waiting for a chunk before rechecking the
/// shutdown flag.
const WORKER_POLL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// WorkQueue
// ---------------------------------------------------------------------------

/// Bounded FIFO of pending chunks, shared between the hub handler thread and
/// the transcription worker.
struct WorkQueue {
    inner: Mutex<VecDeque<AudioChunk>>,
    available: Condvar,
    capacity: usize,
}

impl WorkQueue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue a chunk.  Returns `false` (dropping the chunk) when the queue
    /// is full.
    fn push(&self, chunk: AudioChunk) -> bool {
        let mut q = self.inner.lock().unwrap();
        if q.len() >= self.capacity {
            return false;
        }
        q.push_back(chunk);
        self.available.notify_one();
        true
    }

    /// Dequeue the oldest chunk, waiting up to `timeout` for one to arrive.
    fn pop_timeout(&self, timeout: Duration) -> Option<AudioChunk> {
        let deadline = Instant::now() + timeout;
        let mut q = self.inner.lock().unwrap();
        loop {
            if let Some(chunk) = q.pop_front() {
                return Some(chunk);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, result) = self.available.wait_timeout(q, remaining).unwrap();
            q = guard;
            if result.timed_out() && q.is_empty() {
                return None;
            }
        }
    }

    fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------------
// ModelState
// ---------------------------------------------------------------------------

/// Lifecycle phase of the recognition model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// No engine in memory.
    Unloaded,
    /// A background load is in flight.
    Loading,
    /// Engine resident and accepting work.
    Loaded,
}

struct State {
    phase: ModelState,
    engine: Option<Arc<dyn SpeechEngine>>,
    /// Bumped by every load, chunk, stop, unload and shutdown; a pending
    /// unload timer only fires if the generation it captured is still
    /// current.
    timer_generation: u64,
}

// ---------------------------------------------------------------------------
// ModelManager
// ---------------------------------------------------------------------------

/// Owns the single engine instance and its load/unload policy.
pub struct ModelManager {
    hub: Arc<EventHub>,
    factory: Arc<dyn EngineFactory>,
    state: Mutex<State>,
    queue: Arc<WorkQueue>,
    unload_timeout: Duration,
    shutdown_flag: AtomicBool,
    worker_started: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ModelManager {
    /// Create a manager in the `Unloaded` state.
    ///
    /// `unload_timeout` is how long the model stays resident after
    /// `transcription_stop` with no further activity.
    pub fn new(
        hub: Arc<EventHub>,
        factory: Arc<dyn EngineFactory>,
        unload_timeout: Duration,
    ) -> Self {
        Self::with_queue_capacity(hub, factory, unload_timeout, WORK_QUEUE_CAPACITY)
    }

    fn with_queue_capacity(
        hub: Arc<EventHub>,
        factory: Arc<dyn EngineFactory>,
        unload_timeout: Duration,
        queue_capacity: usize,
    ) -> Self {
        Self {
            hub,
            factory,
            state: Mutex::new(State {
                phase: ModelState::Unloaded,
                engine: None,
                timer_generation: 0,
            }),
            queue: Arc::new(WorkQueue::new(queue_capacity)),
            unload_timeout,
            shutdown_flag: AtomicBool::new(false),
            worker_started: AtomicBool::new(false),
            worker: Mutex::new(None),
        }
    }

    /// Small-capacity constructor so saturation is testable without 64 chunks.
    #[cfg(test)]
    pub(crate) fn for_test(
        hub: Arc<EventHub>,
        factory: Arc<dyn EngineFactory>,
        unload_timeout: Duration,
        queue_capacity: usize,
    ) -> Self {
        Self::with_queue_capacity(hub, factory, unload_timeout, queue_capacity)
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> ModelState {
        self.state.lock().unwrap().phase
    }

    /// Chunks currently waiting for the worker.
    pub fn pending_chunks(&self) -> usize {
        self.queue.len()
    }

    /// Begin loading the model on a background thread.
    ///
    /// Re-entrant: calls while already `Loading` or `Loaded` do nothing.  On
    /// success the manager publishes `model_loaded`; on failure it publishes
    /// `model_load_error` and returns to `Unloaded`.
    pub fn load_model(self: &Arc<Self>) {
        {
            let mut st = self.state.lock().unwrap();
            match st.phase {
                ModelState::Loading | ModelState::Loaded => return,
                ModelState::Unloaded => {}
            }
            st.phase = ModelState::Loading;
            st.timer_generation += 1;
        }

        log::info!("stt: loading model");
        let manager = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("model-loader".into())
            .spawn(move || {
                // The load runs without any manager lock held.
                let loaded = manager.factory.load();

                let event = {
                    let mut st = manager.state.lock().unwrap();
                    if manager.shutdown_flag.load(Ordering::SeqCst) {
                        st.phase = ModelState::Unloaded;
                        st.engine = None;
                        None
                    } else {
                        match loaded {
                            Ok(engine) => {
                                st.phase = ModelState::Loaded;
                                st.engine = Some(engine);
                                st.timer_generation += 1;
                                Some((EventName::ModelLoaded, EventPayload::None))
                            }
                            Err(e) => {
                                st.phase = ModelState::Unloaded;
                                st.engine = None;
                                Some((
                                    EventName::ModelLoadError,
                                    EventPayload::LoadError {
                                        message: e.to_string(),
                                    },
                                ))
                            }
                        }
                    }
                };

                match &event {
                    Some((EventName::ModelLoaded, _)) => {
                        // The worker exists only once a load has succeeded;
                        // a failed load leaves no thread polling an empty
                        // queue.
                        manager.ensure_worker();
                        log::info!("stt: model loaded");
                    }
                    Some((_, EventPayload::LoadError { message })) => {
                        log::error!("stt: model load failed: {message}")
                    }
                    _ => log::info!("stt: model load abandoned during shutdown"),
                }
                if let Some((name, payload)) = event {
                    manager.hub.publish(name, payload);
                }
            });
        if let Err(e) = spawned {
            log::error!("stt: failed to spawn model loader: {e}");
            let mut st = self.state.lock().unwrap();
            st.phase = ModelState::Unloaded;
        }
    }

    /// Queue a chunk for transcription and refresh the activity clock.
    ///
    /// Chunks arriving while the model is not `Loaded` are discarded; any
    /// pending unload timer is cancelled either way.
    pub fn on_audio_chunk(&self, chunk: AudioChunk) {
        {
            let mut st = self.state.lock().unwrap();
            st.timer_generation += 1;
            if st.phase != ModelState::Loaded {
                log::debug!("stt: dropping chunk, model {:?}", st.phase);
                return;
            }
        }
        if !self.queue.push(chunk) {
            log::warn!("stt: work queue full, dropping audio chunk");
        }
    }

    /// Arm the one-shot idle-unload timer.
    ///
    /// If no load, chunk, or further stop arrives within the configured
    /// timeout the model is unloaded.  Re-arming replaces the previous timer.
    pub fn schedule_unload(self: &Arc<Self>) {
        let generation = {
            let mut st = self.state.lock().unwrap();
            if st.phase == ModelState::Unloaded {
                return;
            }
            st.timer_generation += 1;
            st.timer_generation
        };

        log::debug!(
            "stt: unload scheduled in {}s",
            self.unload_timeout.as_secs_f32()
        );
        let manager = Arc::clone(self);
        let timeout = self.unload_timeout;
        let spawned = thread::Builder::new()
            .name("model-unload-timer".into())
            .spawn(move || {
                thread::sleep(timeout);
                manager.unload_if_generation(generation);
            });
        if let Err(e) = spawned {
            log::error!("stt: failed to spawn unload timer: {e}");
        }
    }

    /// Unload only if nothing happened since the timer was armed.
    fn unload_if_generation(&self, generation: u64) {
        let unloaded = {
            let mut st = self.state.lock().unwrap();
            if st.timer_generation != generation || st.phase != ModelState::Loaded {
                false
            } else {
                st.phase = ModelState::Unloaded;
                st.engine = None;
                st.timer_generation += 1;
                true
            }
        };
        if unloaded {
            self.queue.clear();
            log::info!("stt: model unloaded after idle timeout");
            self.hub.publish(EventName::ModelUnloaded, EventPayload::None);
        }
    }

    /// Drop the engine immediately, discarding queued work.
    ///
    /// No-op when already `Unloaded`.  Publishes `model_unloaded`.
    pub fn unload_model(&self) {
        let was_loaded = {
            let mut st = self.state.lock().unwrap();
            st.timer_generation += 1;
            let was = st.engine.is_some();
            st.phase = ModelState::Unloaded;
            st.engine = None;
            was
        };
        self.queue.clear();
        if was_loaded {
            log::info!("stt: model unloaded");
            self.hub.publish(EventName::ModelUnloaded, EventPayload::None);
        }
    }

    /// Subscribe the manager to the hub events that drive it.
    ///
    /// Handlers hold a `Weak` back-reference so the hub never keeps the
    /// manager alive.
    pub fn attach(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.hub.subscribe(
            EventName::TranscriptionStart,
            handler(move |_| {
                if let Some(manager) = weak.upgrade() {
                    manager.load_model();
                }
            }),
        );

        let weak = Arc::downgrade(self);
        self.hub.subscribe(
            EventName::TranscriptionStop,
            handler(move |_| {
                if let Some(manager) = weak.upgrade() {
                    manager.schedule_unload();
                }
            }),
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        self.hub.subscribe(
            EventName::AudioChunk,
            handler(move |ev| {
                if let (Some(manager), EventPayload::AudioChunk(chunk)) =
                    (weak.upgrade(), &ev.payload)
                {
                    manager.on_audio_chunk(chunk.clone());
                }
            }),
        );
    }

    /// Unload, stop the worker, and join it.  Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        self.unload_model();
        if let Some(worker) = self.worker.lock().unwrap().take() {
            if worker.join().is_err() {
                log::error!("stt: transcription worker panicked");
            }
        }
        log::info!("stt: manager shut down");
    }

    /// Start the transcription worker exactly once.
    fn ensure_worker(self: &Arc<Self>) {
        if self.worker_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let manager = Arc::clone(self);
        match thread::Builder::new()
            .name("transcription-worker".into())
            .spawn(move || manager.worker_loop())
        {
            Ok(handle) => *self.worker.lock().unwrap() = Some(handle),
            Err(e) => {
                log::error!("stt: failed to spawn transcription worker: {e}");
                self.worker_started.store(false, Ordering::SeqCst);
            }
        }
    }

    fn worker_loop(&self) {
        log::debug!("stt: transcription worker started");
        while !self.shutdown_flag.load(Ordering::SeqCst) {
            let Some(chunk) = self.queue.pop_timeout(WORKER_POLL) else {
                continue;
            };

            // Clone the engine under a short lock; the inference itself runs
            // unlocked, and the clone keeps the engine alive even if an
            // unload lands mid-transcription.
            let engine = {
                let st = self.state.lock().unwrap();
                st.engine.clone()
            };
            let Some(engine) = engine else {
                continue;
            };

            let text = match engine.transcribe(&chunk.samples, chunk.sample_rate) {
                Ok(segments) => join_segments(&segments),
                Err(e) => {
                    log::error!("stt: transcription failed: {e}");
                    String::new()
                }
            };

            self.hub.publish(
                EventName::TranscriptionResult,
                EventPayload::Transcript {
                    text,
                    timestamp: SystemTime::now(),
                },
            );
        }
        log::debug!("stt: transcription worker exited");
    }
}

impl Drop for ModelManager {
    fn drop(&mut self) {
        // Worker threads hold an Arc to the manager, so by the time Drop
        // runs they are gone; just make the flag state consistent.
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }
}

/// Concatenate segment texts with single spaces and trim the ends.
fn join_segments(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push_str(seg.text.trim());
        out.push(' ');
    }
    out.trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::engine::{MockEngine, SttError};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    /// Factory counting loads and returning a fresh mock each time.
    struct CountingFactory {
        loads: AtomicUsize,
        segments: Vec<&'static str>,
    }

    impl CountingFactory {
        fn new(segments: &[&'static str]) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                segments: segments.to_vec(),
            }
        }
    }

    impl EngineFactory for CountingFactory {
        fn load(&self) -> Result<Arc<dyn SpeechEngine>, SttError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MockEngine::segments(&self.segments)))
        }
    }

    struct FailingFactory;

    impl EngineFactory for FailingFactory {
        fn load(&self) -> Result<Arc<dyn SpeechEngine>, SttError> {
            Err(SttError::ModelNotFound("/missing/model.bin".into()))
        }
    }

    /// Engine that blocks on a channel, for saturating the work queue.
    struct BlockingEngine {
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl SpeechEngine for BlockingEngine {
        fn transcribe(&self, _: &[f32], _: u32) -> Result<Vec<Segment>, SttError> {
            let _ = self.release.lock().unwrap().recv();
            Ok(vec![])
        }
    }

    fn chunk() -> AudioChunk {
        AudioChunk {
            samples: vec![0.1; 160],
            sample_rate: 16_000,
            captured_at: SystemTime::now(),
        }
    }

    fn wait_for_state(manager: &ModelManager, want: ModelState) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while manager.state() != want {
            assert!(Instant::now() < deadline, "timed out waiting for {want:?}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn load_is_reentrant_and_publishes_model_loaded_once() {
        let hub = Arc::new(EventHub::new());
        let factory = Arc::new(CountingFactory::new(&["hi"]));
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::clone(&factory) as Arc<dyn EngineFactory>,
            Duration::from_secs(300),
        ));

        let loaded_events = Arc::new(AtomicUsize::new(0));
        let loaded_c = Arc::clone(&loaded_events);
        hub.subscribe(
            EventName::ModelLoaded,
            handler(move |_| {
                loaded_c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        manager.load_model();
        manager.load_model();
        manager.load_model();
        wait_for_state(&manager, ModelState::Loaded);

        // Loaded again: still a no-op.
        manager.load_model();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(factory.loads.load(Ordering::SeqCst), 1);
        assert_eq!(loaded_events.load(Ordering::SeqCst), 1);
        assert!(manager.worker_started.load(Ordering::SeqCst));
        manager.shutdown();
    }

    #[test]
    fn failed_load_does_not_start_the_worker() {
        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::new(FailingFactory),
            Duration::from_secs(300),
        ));

        let (tx, rx) = mpsc::channel();
        hub.subscribe(
            EventName::ModelLoadError,
            handler(move |_| {
                let _ = tx.send(());
            }),
        );

        manager.load_model();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(!manager.worker_started.load(Ordering::SeqCst));
        manager.shutdown();
    }

    #[test]
    fn load_failure_publishes_error_and_returns_to_unloaded() {
        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::new(FailingFactory),
            Duration::from_secs(300),
        ));

        let (tx, rx) = mpsc::channel();
        hub.subscribe(
            EventName::ModelLoadError,
            handler(move |ev| {
                if let EventPayload::LoadError { message } = &ev.payload {
                    let _ = tx.send(message.clone());
                }
            }),
        );

        manager.load_model();
        let message = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(message.contains("/missing/model.bin"));
        assert_eq!(manager.state(), ModelState::Unloaded);
        manager.shutdown();
    }

    #[test]
    fn idle_timeout_unloads_the_model() {
        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::new(CountingFactory::new(&["hi"])),
            Duration::from_millis(100),
        ));

        let (tx, rx) = mpsc::channel();
        hub.subscribe(
            EventName::ModelUnloaded,
            handler(move |_| {
                let _ = tx.send(());
            }),
        );

        manager.load_model();
        wait_for_state(&manager, ModelState::Loaded);

        manager.schedule_unload();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(manager.state(), ModelState::Unloaded);
        manager.shutdown();
    }

    #[test]
    fn audio_chunk_cancels_pending_unload() {
        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::new(CountingFactory::new(&["hi"])),
            Duration::from_millis(100),
        ));

        manager.load_model();
        wait_for_state(&manager, ModelState::Loaded);

        manager.schedule_unload();
        thread::sleep(Duration::from_millis(40));
        manager.on_audio_chunk(chunk());

        // The armed timer elapses but must find its generation stale.
        thread::sleep(Duration::from_millis(150));
        assert_eq!(manager.state(), ModelState::Loaded);
        manager.shutdown();
    }

    #[test]
    fn chunks_round_trip_to_joined_trimmed_transcripts() {
        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::new(CountingFactory::new(&[" hello ", "world "])),
            Duration::from_secs(300),
        ));

        let (tx, rx) = mpsc::channel();
        hub.subscribe(
            EventName::TranscriptionResult,
            handler(move |ev| {
                if let EventPayload::Transcript { text, .. } = &ev.payload {
                    let _ = tx.send(text.clone());
                }
            }),
        );

        manager.load_model();
        wait_for_state(&manager, ModelState::Loaded);
        manager.on_audio_chunk(chunk());

        let text = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(text, "hello world");
        manager.shutdown();
    }

    #[test]
    fn engine_error_yields_empty_transcript() {
        struct ErrFactory;
        impl EngineFactory for ErrFactory {
            fn load(&self) -> Result<Arc<dyn SpeechEngine>, SttError> {
                Ok(Arc::new(MockEngine::err(SttError::Transcription(
                    "decoder exploded".into(),
                ))))
            }
        }

        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::new(ErrFactory),
            Duration::from_secs(300),
        ));

        let (tx, rx) = mpsc::channel();
        hub.subscribe(
            EventName::TranscriptionResult,
            handler(move |ev| {
                if let EventPayload::Transcript { text, .. } = &ev.payload {
                    let _ = tx.send(text.clone());
                }
            }),
        );

        manager.load_model();
        wait_for_state(&manager, ModelState::Loaded);
        manager.on_audio_chunk(chunk());

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "");
        manager.shutdown();
    }

    #[test]
    fn chunks_while_unloaded_are_discarded() {
        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::new(CountingFactory::new(&["hi"])),
            Duration::from_secs(300),
        ));

        manager.on_audio_chunk(chunk());
        assert_eq!(manager.pending_chunks(), 0);
        manager.shutdown();
    }

    #[test]
    fn saturated_queue_drops_new_chunks() {
        let (release_tx, release_rx) = mpsc::channel();
        struct Holder(Mutex<Option<mpsc::Receiver<()>>>);
        impl EngineFactory for Holder {
            fn load(&self) -> Result<Arc<dyn SpeechEngine>, SttError> {
                let rx = self.0.lock().unwrap().take().unwrap();
                Ok(Arc::new(BlockingEngine {
                    release: Mutex::new(rx),
                }))
            }
        }

        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::for_test(
            Arc::clone(&hub),
            Arc::new(Holder(Mutex::new(Some(release_rx)))),
            Duration::from_secs(300),
            2,
        ));

        manager.load_model();
        wait_for_state(&manager, ModelState::Loaded);

        // One chunk occupies the worker; the next two fill the queue.
        manager.on_audio_chunk(chunk());
        thread::sleep(Duration::from_millis(50));
        manager.on_audio_chunk(chunk());
        manager.on_audio_chunk(chunk());
        manager.on_audio_chunk(chunk());
        assert_eq!(manager.pending_chunks(), 2);

        // Let the blocked worker and shutdown proceed.
        drop(release_tx);
        manager.shutdown();
    }

    #[test]
    fn unload_drains_the_queue() {
        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::for_test(
            Arc::clone(&hub),
            Arc::new(CountingFactory::new(&["hi"])),
            Duration::from_secs(300),
            8,
        ));

        // Fill the queue without a worker draining it.
        {
            let mut st = manager.state.lock().unwrap();
            st.phase = ModelState::Loaded;
            st.engine = Some(Arc::new(MockEngine::segments(&["hi"])));
        }
        manager.on_audio_chunk(chunk());
        manager.on_audio_chunk(chunk());
        assert_eq!(manager.pending_chunks(), 2);

        manager.unload_model();
        assert_eq!(manager.pending_chunks(), 0);
        assert_eq!(manager.state(), ModelState::Unloaded);
        manager.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::new(CountingFactory::new(&["hi"])),
            Duration::from_secs(300),
        ));
        manager.load_model();
        wait_for_state(&manager, ModelState::Loaded);

        manager.shutdown();
        manager.shutdown();
        assert_eq!(manager.state(), ModelState::Unloaded);
    }

    #[test]
    fn attach_drives_load_from_transcription_start() {
        let hub = Arc::new(EventHub::new());
        let manager = Arc::new(ModelManager::new(
            Arc::clone(&hub),
            Arc::new(CountingFactory::new(&["hi"])),
            Duration::from_secs(300),
        ));
        manager.attach();

        hub.publish(EventName::TranscriptionStart, EventPayload::None);
        wait_for_state(&manager, ModelState::Loaded);
        manager.shutdown();
    }
}
