//! The engine driver.
//!
//! One task owns the queue, cache, session clock, turn flag and the active
//! sink. Caller commands and asynchronous completions are both funnelled
//! into it, and after each one the driver re-runs the two schedulers over
//! the whole queue. Nothing is shared, so nothing is locked.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::AudioCache;
use crate::clip::AudioClip;
use crate::config::{EngineConfig, SynthesisParams};
use crate::error::{SinkError, SynthesisError};
use crate::events::{EngineEvent, ErrorKind};
use crate::monitor::ResilienceMonitor;
use crate::playback::{ActivePlayback, AudioOutput, PlaybackDone};
use crate::queue::{ItemStatus, SpeechQueue};
use crate::session::{Epoch, SessionClock};
use crate::stats::EngineStats;
use crate::synthesis::{run_request, SynthesisRequest, SynthesisService};
use crate::turn::TurnSignal;

/// Point-in-time view of the driver state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub epoch: Epoch,
    pub statuses: Vec<ItemStatus>,
    pub play_index: usize,
    pub flushed: bool,
    pub cached: usize,
    pub sink_active: bool,
    pub speaking: bool,
}

pub(crate) enum Command {
    Configure(SynthesisParams),
    Enqueue(String),
    Flush { muted: bool },
    Interrupt,
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Destroy(oneshot::Sender<()>),
}

/// Results posted back by tasks the driver spawned.
pub(crate) enum Completion {
    Synthesis {
        epoch: Epoch,
        index: usize,
        outcome: Result<AudioClip, SynthesisError>,
    },
    Playback {
        epoch: Epoch,
        index: usize,
        outcome: Result<(), SinkError>,
    },
    Foreground,
}

pub(crate) struct Driver {
    config: EngineConfig,
    params: SynthesisParams,
    service: Arc<dyn SynthesisService>,
    output: Arc<dyn AudioOutput>,
    events: mpsc::UnboundedSender<EngineEvent>,
    completions: mpsc::UnboundedSender<Completion>,
    stats: EngineStats,
    clock: SessionClock,
    queue: SpeechQueue,
    cache: AudioCache,
    turn: TurnSignal,
    active: Option<ActivePlayback>,
    monitor: Option<ResilienceMonitor>,
}

pub(crate) struct DriverParts {
    pub config: EngineConfig,
    pub params: SynthesisParams,
    pub service: Arc<dyn SynthesisService>,
    pub output: Arc<dyn AudioOutput>,
    pub events: mpsc::UnboundedSender<EngineEvent>,
    pub stats: EngineStats,
}

impl Driver {
    pub fn new(parts: DriverParts, completions: mpsc::UnboundedSender<Completion>) -> Self {
        let config = parts.config.normalized();
        Self {
            cache: AudioCache::new(config.max_cache_size),
            config,
            params: parts.params,
            service: parts.service,
            output: parts.output,
            events: parts.events,
            completions,
            stats: parts.stats,
            clock: SessionClock::new(),
            queue: SpeechQueue::new(),
            turn: TurnSignal::new(),
            active: None,
            monitor: None,
        }
    }

    pub fn attach_monitor(&mut self, monitor: ResilienceMonitor) {
        self.monitor = Some(monitor);
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        info!(
            max_concurrent = self.config.max_concurrent_synth,
            cache_size = self.cache.capacity(),
            "Speech engine started"
        );
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Destroy(ack)) => {
                        self.teardown();
                        let _ = ack.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.teardown();
                        break;
                    }
                },
                Some(completion) = completions.recv() => self.handle_completion(completion),
            }
            self.advance_synthesis();
            self.advance_playback().await;
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Configure(params) => {
                debug!(voice = %params.voice, speed = params.speed, "Synthesis parameters updated");
                self.params = params;
            }
            Command::Enqueue(text) => {
                let index = self.queue.push(text);
                debug!(index, epoch = %self.clock.current(), "Enqueued sentence");
            }
            Command::Flush { muted: true } => {
                self.abandon_session();
                info!("Muted flush, ending turn");
                self.emit(EngineEvent::PlaybackEnd);
            }
            Command::Flush { muted: false } => {
                if !self.queue.flushed() {
                    self.queue.mark_flushed();
                    debug!(items = self.queue.len(), "Turn flushed");
                }
            }
            Command::Interrupt => {
                let epoch = self.abandon_session();
                self.stats.record_interrupt();
                info!(%epoch, "Speech interrupted");
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop
            Command::Destroy(_) => {}
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Synthesis {
                epoch,
                index,
                outcome,
            } => self.on_synthesis_settled(epoch, index, outcome),
            Completion::Playback {
                epoch,
                index,
                outcome,
            } => self.on_playback_settled(epoch, index, outcome),
            Completion::Foreground => self.on_foreground(),
        }
    }

    /// Start synthesis for pending items, oldest first, within the free slots.
    fn advance_synthesis(&mut self) {
        let mut slots = self
            .config
            .max_concurrent_synth
            .saturating_sub(self.queue.in_flight());

        for index in self.queue.pending() {
            let Some(item) = self.queue.get_mut(index) else {
                continue;
            };

            if let Some(clip) = self.cache.get(item.text()) {
                self.stats.record_lookup(true);
                item.mark_ready(clip);
                debug!(index, "Cache hit");
                continue;
            }
            if slots == 0 {
                continue;
            }
            let Some(cancel) = item.begin_synthesis() else {
                continue;
            };
            self.stats.record_lookup(false);
            slots -= 1;

            let request = SynthesisRequest {
                text: item.text().to_string(),
                voice: self.params.voice.clone(),
                speed: self.params.speed,
            };
            debug!(index, chars = request.text.len(), "Synthesis started");
            spawn_synthesis(
                Arc::clone(&self.service),
                request,
                cancel,
                self.config.synthesis_timeout,
                self.clock.current(),
                index,
                self.completions.clone(),
            );
        }
    }

    fn on_synthesis_settled(
        &mut self,
        epoch: Epoch,
        index: usize,
        outcome: Result<AudioClip, SynthesisError>,
    ) {
        if !self.clock.is_current(epoch) {
            debug!(index, %epoch, "Dropped stale synthesis result");
            return;
        }
        let Some(item) = self.queue.get_mut(index) else {
            return;
        };
        if item.status() != ItemStatus::Synthesizing {
            return;
        }

        let failure = match outcome {
            Ok(clip) => {
                if self.cache.insert(item.text(), clip.clone()).is_some() {
                    self.stats.record_eviction();
                }
                item.mark_ready(clip);
                debug!(index, "Synthesis ready");
                None
            }
            Err(err) => {
                item.mark_failed();
                Some(err)
            }
        };

        match failure {
            Some(err) if err.is_cancelled() => debug!(index, "Synthesis cancelled"),
            Some(err) => {
                self.stats.record_synthesis_failure();
                warn!(index, error = %err, "Synthesis failed");
                self.emit(EngineEvent::error(
                    ErrorKind::SynthesisFailed,
                    err.to_string(),
                    Some(index),
                ));
            }
            None => {}
        }
    }

    /// Walk forward from the play cursor, starting the next ready item.
    async fn advance_playback(&mut self) {
        if self.active.is_some() {
            return;
        }
        loop {
            if self.queue.is_exhausted() {
                if self.queue.flushed() {
                    self.finish_turn();
                }
                return;
            }
            let index = self.queue.play_index();
            let Some(status) = self.queue.get(index).map(|item| item.status()) else {
                return;
            };
            match status {
                ItemStatus::Error | ItemStatus::Done => self.queue.advance_play_index(),
                ItemStatus::Ready => {
                    if self.start_playback(index).await {
                        return;
                    }
                }
                ItemStatus::Pending | ItemStatus::Synthesizing | ItemStatus::Playing => return,
            }
        }
    }

    /// Returns true if a sink is now playing `index`.
    async fn start_playback(&mut self, index: usize) -> bool {
        let Some(clip) = self
            .queue
            .get_mut(index)
            .and_then(|item| item.take_for_playback())
        else {
            return false;
        };

        // The previous sink is gone by now; let its release settle before
        // the device is acquired again.
        tokio::task::yield_now().await;

        let mut sink = match self.output.open(clip) {
            Ok(sink) => sink,
            Err(err) => {
                let kind = match err {
                    SinkError::Busy(_) => ErrorKind::PlayRejected,
                    _ => ErrorKind::PlaybackFailed,
                };
                self.fail_playback(index, kind, err);
                return false;
            }
        };

        match sink.play() {
            Ok(done) => {
                if self.turn.begin() {
                    info!(epoch = %self.clock.current(), "Turn started");
                    self.emit(EngineEvent::PlaybackStart);
                }
                debug!(index, "Sentence playing");
                self.emit(EngineEvent::SentenceStart { index });
                spawn_playback_watch(done, self.clock.current(), index, self.completions.clone());
                self.active = Some(ActivePlayback::new(index, sink));
                true
            }
            Err(err) => {
                sink.stop();
                drop(sink);
                self.fail_playback(index, ErrorKind::PlayRejected, err);
                false
            }
        }
    }

    fn on_playback_settled(&mut self, epoch: Epoch, index: usize, outcome: Result<(), SinkError>) {
        if !self.clock.is_current(epoch) {
            debug!(index, %epoch, "Dropped stale playback event");
            return;
        }
        if self.active.as_ref().map(|active| active.index) != Some(index) {
            return;
        }
        if let Some(active) = self.active.take() {
            active.release();
        }

        match outcome {
            Ok(()) => {
                if let Some(item) = self.queue.get_mut(index) {
                    item.mark_done();
                }
                self.stats.record_sentence_played();
                debug!(index, "Sentence finished");
                self.queue.advance_play_index();
            }
            Err(err) => self.fail_playback(index, ErrorKind::PlaybackFailed, err),
        }
    }

    fn fail_playback(&mut self, index: usize, kind: ErrorKind, err: SinkError) {
        if let Some(item) = self.queue.get_mut(index) {
            item.mark_failed();
        }
        if self.queue.play_index() == index {
            self.queue.advance_play_index();
        }
        self.stats.record_playback_failure();
        warn!(index, ?kind, error = %err, "Playback failed");
        self.emit(EngineEvent::error(kind, err.to_string(), Some(index)));
    }

    fn on_foreground(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !active.suspended_by_host() {
            return;
        }
        let index = active.index;
        match active.sink_mut().resume() {
            Ok(()) => info!(index, "Resumed playback suspended by host"),
            Err(err) => warn!(index, error = %err, "Could not resume suspended playback"),
        }
    }

    fn finish_turn(&mut self) {
        let spoke = self.turn.finish();
        info!(sentences = self.queue.len(), spoke, "Turn finished");
        self.queue.clear();
        self.emit(EngineEvent::PlaybackEnd);
    }

    /// Invalidate all in-flight work and reset the queue; the cache stays.
    fn abandon_session(&mut self) -> Epoch {
        let epoch = self.clock.advance();
        if let Some(active) = self.active.take() {
            active.release();
        }
        self.queue.clear();
        self.turn.abandon();
        epoch
    }

    fn teardown(&mut self) {
        self.abandon_session();
        self.cache.clear();
        if let Some(monitor) = self.monitor.take() {
            monitor.detach();
        }
        info!("Speech engine destroyed");
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            epoch: self.clock.current(),
            statuses: self.queue.statuses(),
            play_index: self.queue.play_index(),
            flushed: self.queue.flushed(),
            cached: self.cache.len(),
            sink_active: self.active.is_some(),
            speaking: self.turn.is_speaking(),
        }
    }

    fn emit(&self, event: EngineEvent) {
        // The listener may have gone away; the engine keeps running regardless.
        let _ = self.events.send(event);
    }
}

fn spawn_synthesis(
    service: Arc<dyn SynthesisService>,
    request: SynthesisRequest,
    cancel: CancellationToken,
    timeout: Option<std::time::Duration>,
    epoch: Epoch,
    index: usize,
    completions: mpsc::UnboundedSender<Completion>,
) {
    tokio::spawn(async move {
        let outcome = run_request(service, request, cancel, timeout).await;
        let _ = completions.send(Completion::Synthesis {
            epoch,
            index,
            outcome,
        });
    });
}

fn spawn_playback_watch(
    done: PlaybackDone,
    epoch: Epoch,
    index: usize,
    completions: mpsc::UnboundedSender<Completion>,
) {
    tokio::spawn(async move {
        // A dropped sender means the sink was stopped: nothing to report.
        let Ok(outcome) = done.await else {
            return;
        };
        let _ = completions.send(Completion::Playback {
            epoch,
            index,
            outcome,
        });
    });
}
