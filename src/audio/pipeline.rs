//! Microphone capture pipeline: cpal stream → bounded block queue → VAD gate
//! → `audio_chunk` events.
//!
//! # Threads
//!
//! `cpal::Stream` is not `Send`, so [`AudioPipeline::start_capture`] spawns a
//! dedicated `audio-capture` thread that builds the stream, keeps it alive,
//! and drops it when told to stop.  The cpal callback accumulates samples
//! into blocks of `sample_rate × chunk_duration` and pushes them onto a
//! bounded queue (capacity 10).  A full queue drops the new block silently —
//! the device callback must never stall waiting on a slow consumer.
//!
//! A second `audio-consumer` thread drains the queue with a short timeout,
//! applies the [`EnergyGate`], and publishes surviving blocks as
//! [`EventName::AudioChunk`] events.  Blocks below the threshold are
//! discarded.
//!
//! Capture reacts to `transcription_start` / `transcription_stop` events
//! (see [`AudioPipeline::attach`]), so the coordinator never calls the
//! pipeline directly once wiring is done.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::AudioConfig;
use crate::events::{handler, EventHub, EventName, EventPayload};

use super::{mix_to_mono, AudioChunk, AudioError, EnergyGate};

/// Capacity of the block queue between the cpal callback and the consumer.
const BLOCK_QUEUE_CAPACITY: usize = 10;

/// How long the consumer waits for a block before re-checking the stop flag.
const CONSUMER_POLL: Duration = Duration::from_millis(100);

/// How long `stop_capture` waits for the consumer to acknowledge shutdown.
const CONSUMER_EXIT_WAIT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// AudioPipeline
// ---------------------------------------------------------------------------

/// Captures microphone audio and publishes voice-gated chunks.
pub struct AudioPipeline {
    hub: Arc<EventHub>,
    gate: EnergyGate,
    chunk_duration: f32,
    inner: Mutex<Inner>,
}

struct Inner {
    device: Option<cpal::Device>,
    sample_rate: u32,
    session: Option<CaptureSession>,
}

/// Handles to a running capture session.
struct CaptureSession {
    stop: Arc<AtomicBool>,
    /// Telling the capture thread to drop the stream.  Dropping the sender
    /// has the same effect.
    stream_stop_tx: mpsc::Sender<()>,
    /// Signalled by the consumer just before it exits.
    consumer_done_rx: mpsc::Receiver<()>,
    consumer: Option<thread::JoinHandle<()>>,
}

impl AudioPipeline {
    /// Create a pipeline.  No device is touched until [`initialize`].
    ///
    /// [`initialize`]: AudioPipeline::initialize
    pub fn new(hub: Arc<EventHub>, config: &AudioConfig) -> Self {
        Self {
            hub,
            gate: EnergyGate::new(config.vad_threshold),
            chunk_duration: config.chunk_duration_secs,
            inner: Mutex::new(Inner {
                device: None,
                sample_rate: config.sample_rate,
                session: None,
            }),
        }
    }

    /// Select an input device and establish the capture sample rate.
    ///
    /// Prefers the host's default input device; falls back to the first
    /// enumerated device that reports a usable input config.  The session
    /// sample rate is taken from the device's default config.
    ///
    /// # Errors
    ///
    /// [`AudioError::NoInputDevice`] when no input device exists.
    pub fn initialize(&self) -> Result<(), AudioError> {
        let host = cpal::default_host();

        let device = match host.default_input_device() {
            Some(d) => d,
            None => host
                .input_devices()?
                .find(|d| {
                    d.default_input_config()
                        .map(|c| c.channels() >= 1)
                        .unwrap_or(false)
                })
                .ok_or(AudioError::NoInputDevice)?,
        };

        let supported = device.default_input_config()?;
        let sample_rate = supported.sample_rate().0;
        let name = device.name().unwrap_or_else(|_| "<unknown>".into());
        log::info!("audio: using input device {name:?} at {sample_rate} Hz");

        let mut inner = self.inner.lock().unwrap();
        inner.device = Some(device);
        inner.sample_rate = sample_rate;
        Ok(())
    }

    /// Sample rate the pipeline will capture at (device default once
    /// initialized).
    pub fn sample_rate(&self) -> u32 {
        self.inner.lock().unwrap().sample_rate
    }

    /// Returns `true` while a capture session is running.
    pub fn is_capturing(&self) -> bool {
        self.inner.lock().unwrap().session.is_some()
    }

    /// Start capturing.  No-op when already capturing.
    ///
    /// Publishes `audio_started` once the stream is live.
    ///
    /// # Errors
    ///
    /// [`AudioError::NotInitialized`] before [`initialize`], or a
    /// build/start failure reported from the capture thread.
    ///
    /// [`initialize`]: AudioPipeline::initialize
    pub fn start_capture(&self) -> Result<(), AudioError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.session.is_some() {
                return Ok(());
            }

            let device = inner.device.clone().ok_or(AudioError::NotInitialized)?;
            let sample_rate = inner.sample_rate;
            let block_size = (sample_rate as f32 * self.chunk_duration) as usize;

            let stop = Arc::new(AtomicBool::new(false));
            let (block_tx, block_rx) = mpsc::sync_channel::<Vec<f32>>(BLOCK_QUEUE_CAPACITY);
            let (stream_stop_tx, stream_stop_rx) = mpsc::channel::<()>();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();

            // Capture thread: owns the (non-Send) cpal stream for its lifetime.
            let cb_stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("audio-capture".into())
                .spawn(move || {
                    run_capture(device, block_size, block_tx, cb_stop, ready_tx, stream_stop_rx);
                })
                .map_err(|e| AudioError::BuildStream(e.to_string()))?;

            // Wait for the capture thread to report stream build/start outcome.
            match ready_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(AudioError::BuildStream(
                        "capture thread exited before reporting readiness".into(),
                    ))
                }
            }

            // Consumer thread: drains the queue, gates, publishes chunks.
            let (done_tx, consumer_done_rx) = mpsc::channel::<()>();
            let consumer_stop = Arc::clone(&stop);
            let hub = Arc::clone(&self.hub);
            let gate = self.gate.clone();
            let consumer = thread::Builder::new()
                .name("audio-consumer".into())
                .spawn(move || {
                    consumer_loop(block_rx, consumer_stop, gate, sample_rate, hub);
                    let _ = done_tx.send(());
                })
                .map_err(|e| AudioError::BuildStream(e.to_string()))?;

            inner.session = Some(CaptureSession {
                stop,
                stream_stop_tx,
                consumer_done_rx,
                consumer: Some(consumer),
            });
            log::info!(
                "audio: capture started ({sample_rate} Hz, block size {block_size}, vad threshold {})",
                self.gate.threshold()
            );
        }

        // Publish outside the state lock so handlers may call back in.
        self.hub.publish(EventName::AudioStarted, EventPayload::None);
        Ok(())
    }

    /// Stop capturing.  No-op when not capturing.
    ///
    /// Signals the consumer, closes the stream, discards queued blocks, and
    /// waits up to one second for the consumer to exit before detaching it.
    /// Publishes `audio_stopped`.
    pub fn stop_capture(&self) {
        let mut session = {
            let mut inner = self.inner.lock().unwrap();
            match inner.session.take() {
                Some(s) => s,
                None => return,
            }
        };

        session.stop.store(true, Ordering::Relaxed);
        // Unblocks the capture thread, which drops the stream.
        let _ = session.stream_stop_tx.send(());

        match session.consumer_done_rx.recv_timeout(CONSUMER_EXIT_WAIT) {
            Ok(()) => {
                if let Some(h) = session.consumer.take() {
                    let _ = h.join();
                }
            }
            Err(_) => {
                log::warn!(
                    "audio: consumer did not exit within {CONSUMER_EXIT_WAIT:?}; detaching it"
                );
            }
        }

        log::info!("audio: capture stopped");
        self.hub.publish(EventName::AudioStopped, EventPayload::None);
    }

    /// Subscribe to `transcription_start` / `transcription_stop` so capture
    /// follows the session without direct coordinator calls.
    ///
    /// Handlers hold a `Weak` reference, so the hub never keeps the pipeline
    /// alive on its own.
    pub fn attach(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.hub.subscribe(
            EventName::TranscriptionStart,
            handler(move |_| {
                if let Some(pipeline) = weak.upgrade() {
                    if let Err(e) = pipeline.start_capture() {
                        log::error!("audio: failed to start capture: {e}");
                    }
                }
            }),
        );

        let weak = Arc::downgrade(self);
        self.hub.subscribe(
            EventName::TranscriptionStop,
            handler(move |_| {
                if let Some(pipeline) = weak.upgrade() {
                    pipeline.stop_capture();
                }
            }),
        );
    }

    /// Stop any running capture.  Used by the coordinator during teardown.
    pub fn shutdown(&self) {
        self.stop_capture();
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        // Belt and braces; the coordinator normally calls shutdown() first.
        if let Ok(inner) = self.inner.lock() {
            if let Some(session) = inner.session.as_ref() {
                session.stop.store(true, Ordering::Relaxed);
                let _ = session.stream_stop_tx.send(());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Capture thread body
// ---------------------------------------------------------------------------

/// Build and run the cpal stream, reporting the outcome on `ready_tx`, then
/// park until `stream_stop_rx` fires (or its sender is dropped).
fn run_capture(
    device: cpal::Device,
    block_size: usize,
    block_tx: SyncSender<Vec<f32>>,
    stop: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<Result<(), AudioError>>,
    stream_stop_rx: mpsc::Receiver<()>,
) {
    let supported = match device.default_input_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(e.into()));
            return;
        }
    };
    let channels = supported.channels();
    let config: cpal::StreamConfig = supported.into();

    let mut pending: Vec<f32> = Vec::with_capacity(block_size * 2);
    let stream = match device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let mono = mix_to_mono(data, channels);
            push_blocks(&mut pending, &mono, block_size, &block_tx);
        },
        |err: cpal::StreamError| {
            log::error!("audio: stream error: {err}");
        },
        None,
    ) {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::BuildStream(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::PlayStream(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    // Hold the stream until stop is requested; a dropped sender counts too.
    let _ = stream_stop_rx.recv();
    drop(stream);
}

/// Accumulate `mono` samples and push completed blocks onto the bounded
/// queue.  A full queue drops the block — the callback never blocks.
pub(crate) fn push_blocks(
    pending: &mut Vec<f32>,
    mono: &[f32],
    block_size: usize,
    tx: &SyncSender<Vec<f32>>,
) {
    pending.extend_from_slice(mono);
    while pending.len() >= block_size {
        let block: Vec<f32> = pending.drain(..block_size).collect();
        match tx.try_send(block) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // Dropped: the consumer is behind and real-time capture wins.
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

// ---------------------------------------------------------------------------
// Consumer thread body
// ---------------------------------------------------------------------------

/// Drain blocks, gate them, and publish survivors as `audio_chunk` events.
/// Exits when `stop` is set or the block queue disconnects.
pub(crate) fn consumer_loop(
    block_rx: mpsc::Receiver<Vec<f32>>,
    stop: Arc<AtomicBool>,
    gate: EnergyGate,
    sample_rate: u32,
    hub: Arc<EventHub>,
) {
    while !stop.load(Ordering::Relaxed) {
        match block_rx.recv_timeout(CONSUMER_POLL) {
            Ok(samples) => {
                if !gate.is_voice(&samples) {
                    continue;
                }
                hub.publish(
                    EventName::AudioChunk,
                    EventPayload::AudioChunk(AudioChunk {
                        samples,
                        sample_rate,
                        captured_at: SystemTime::now(),
                    }),
                );
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    // Remaining queued blocks are discarded when the receiver drops.
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
