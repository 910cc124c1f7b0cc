//! Shared mock collaborators for the engine integration tests.
//!
//! `ScriptedService` and `MockOutput` never touch the network or an audio
//! device. Clips carry their sentence text as bytes so tests can see which
//! sentence reached the output.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use speech_core::{
    AudioClip, AudioOutput, AudioSink, CancellationToken, EngineConfig, EngineEvent, PlaybackDone,
    SinkError, SinkState, SpeechEngine, SynthesisError, SynthesisRequest, SynthesisService,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub const DEFAULT_LATENCY: Duration = Duration::from_millis(50);
pub const PLAY_TIME: Duration = Duration::from_millis(100);

// ── Synthesis ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedService {
    calls: Mutex<Vec<SynthesisRequest>>,
    latency: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_latency(&self, text: &str, latency: Duration) {
        self.latency.lock().unwrap().insert(text.to_string(), latency);
    }

    pub fn fail_on(&self, text: &str) {
        self.failing.lock().unwrap().insert(text.to_string());
    }

    pub fn calls(&self) -> Vec<SynthesisRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_texts(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.text).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SynthesisService for ScriptedService {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: CancellationToken,
    ) -> Result<AudioClip, SynthesisError> {
        self.calls.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let latency = self
            .latency
            .lock()
            .unwrap()
            .get(&request.text)
            .copied()
            .unwrap_or(DEFAULT_LATENCY);

        tokio::select! {
            _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
            _ = tokio::time::sleep(latency) => {
                if self.failing.lock().unwrap().contains(&request.text) {
                    Err(SynthesisError::Service {
                        status: 500,
                        message: format!("cannot say {:?}", request.text),
                    })
                } else {
                    Ok(AudioClip::from_bytes(request.text.as_bytes().to_vec()))
                }
            }
        }
    }
}

// ── Output ─────────────────────────────────────────────────────────

#[derive(Default)]
struct OutputState {
    opened: Mutex<Vec<String>>,
    rejecting: Mutex<HashSet<String>>,
    breaking: Mutex<HashSet<String>>,
    detached: Mutex<HashSet<String>>,
    durations: Mutex<HashMap<String, Duration>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
    stopped: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MockOutput {
    state: Arc<OutputState>,
}

impl MockOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `play()` on this sentence's sink is refused.
    pub fn reject(&self, text: &str) {
        self.state.rejecting.lock().unwrap().insert(text.to_string());
    }

    /// This sentence's playback fails midway.
    pub fn break_on(&self, text: &str) {
        self.state.breaking.lock().unwrap().insert(text.to_string());
    }

    /// This sentence's sink keeps its completion alive through `stop()`,
    /// so the natural end is still reported after an interrupt.
    pub fn finish_after_stop(&self, text: &str) {
        self.state.detached.lock().unwrap().insert(text.to_string());
    }

    pub fn play_time(&self, text: &str, duration: Duration) {
        self.state
            .durations
            .lock()
            .unwrap()
            .insert(text.to_string(), duration);
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.opened.lock().unwrap().clone()
    }

    pub fn live_sinks(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn max_live_sinks(&self) -> usize {
        self.state.max_live.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.state.stopped.load(Ordering::SeqCst)
    }
}

impl AudioOutput for MockOutput {
    fn open(&self, clip: AudioClip) -> Result<Box<dyn AudioSink>, SinkError> {
        let text = String::from_utf8_lossy(clip.as_bytes()).into_owned();
        self.state.opened.lock().unwrap().push(text.clone());
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live.fetch_max(live, Ordering::SeqCst);

        let duration = self
            .state
            .durations
            .lock()
            .unwrap()
            .get(&text)
            .copied()
            .unwrap_or(PLAY_TIME);
        Ok(Box::new(MockSink {
            text,
            duration,
            state: SinkState::Idle,
            timer: None,
            output: Arc::clone(&self.state),
        }))
    }
}

struct MockSink {
    text: String,
    duration: Duration,
    state: SinkState,
    timer: Option<JoinHandle<()>>,
    output: Arc<OutputState>,
}

impl AudioSink for MockSink {
    fn play(&mut self) -> Result<PlaybackDone, SinkError> {
        if self.output.rejecting.lock().unwrap().contains(&self.text) {
            return Err(SinkError::Busy("device in use".into()));
        }
        let (tx, rx) = oneshot::channel();
        let duration = self.duration;
        let breaks = self.output.breaking.lock().unwrap().contains(&self.text);
        let detached = self.output.detached.lock().unwrap().contains(&self.text);
        let timer = tokio::spawn(async move {
            if breaks {
                tokio::time::sleep(duration / 2).await;
                let _ = tx.send(Err(SinkError::Device("decoder crashed".into())));
            } else {
                tokio::time::sleep(duration).await;
                let _ = tx.send(Ok(()));
            }
        });
        if !detached {
            self.timer = Some(timer);
        }
        self.state = SinkState::Playing;
        Ok(rx)
    }

    fn pause(&mut self) {
        self.state = SinkState::Paused;
    }

    fn resume(&mut self) -> Result<(), SinkError> {
        self.state = SinkState::Playing;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.state = SinkState::Stopped;
        self.output.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn position(&self) -> Duration {
        Duration::ZERO
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.output.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Harness ────────────────────────────────────────────────────────

pub fn engine(
    service: &Arc<ScriptedService>,
    output: &Arc<MockOutput>,
) -> (SpeechEngine, mpsc::UnboundedReceiver<EngineEvent>) {
    engine_with(service, output, EngineConfig::default())
}

pub fn engine_with(
    service: &Arc<ScriptedService>,
    output: &Arc<MockOutput>,
    config: EngineConfig,
) -> (SpeechEngine, mpsc::UnboundedReceiver<EngineEvent>) {
    SpeechEngine::builder(service.clone(), output.clone())
        .config(config)
        .build()
}

/// Receive events up to and including the next `PlaybackEnd`.
pub async fn until_end(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(120), events.recv())
            .await
            .expect("timed out waiting for playback_end")
            .expect("event channel closed");
        let end = event == EngineEvent::PlaybackEnd;
        seen.push(event);
        if end {
            return seen;
        }
    }
}

/// Drain all pending events without waiting.
pub fn drain_events(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// Let the driver and every spawned task run until they block on the clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn sentence_starts(events: &[EngineEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::SentenceStart { index } => Some(*index),
            _ => None,
        })
        .collect()
}

pub fn count(events: &[EngineEvent], wanted: &EngineEvent) -> usize {
    events.iter().filter(|event| *event == wanted).count()
}
