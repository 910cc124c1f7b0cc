//! Caller-facing engine handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::config::{EngineConfig, SynthesisParams};
use crate::driver::{Command, Completion, Driver, DriverParts, EngineSnapshot};
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::gate::MuteGate;
use crate::monitor::{ResilienceMonitor, Visibility};
use crate::playback::AudioOutput;
use crate::stats::{EngineStats, StatsSnapshot};
use crate::synthesis::SynthesisService;

/// Handle to a running speech engine.
///
/// Cloning is cheap; all clones drive the same engine. `enqueue`, `flush`
/// and `interrupt` never block. When the last clone is dropped the engine
/// tears itself down as if [`SpeechEngine::destroy`] had been called.
#[derive(Clone)]
pub struct SpeechEngine {
    commands: mpsc::UnboundedSender<Command>,
    mute: MuteGate,
    destroyed: Arc<AtomicBool>,
    stats: EngineStats,
}

pub struct SpeechEngineBuilder {
    service: Arc<dyn SynthesisService>,
    output: Arc<dyn AudioOutput>,
    config: EngineConfig,
    params: SynthesisParams,
    mute: MuteGate,
    visibility: Option<watch::Receiver<Visibility>>,
}

impl SpeechEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn params(mut self, params: SynthesisParams) -> Self {
        self.params = params;
        self
    }

    /// Share an externally owned mute switch.
    pub fn mute_gate(mut self, mute: MuteGate) -> Self {
        self.mute = mute;
        self
    }

    /// Watch the host's foreground/background signal.
    pub fn visibility(mut self, visibility: watch::Receiver<Visibility>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Spawn the driver. Must be called from within a tokio runtime.
    pub fn build(self) -> (SpeechEngine, mpsc::UnboundedReceiver<EngineEvent>) {
        let params = match self.params.validate() {
            Ok(()) => self.params,
            Err(err) => {
                warn!(error = %err, "Ignoring invalid synthesis parameters");
                SynthesisParams::default()
            }
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let stats = EngineStats::new();

        let mut driver = Driver::new(
            DriverParts {
                config: self.config,
                params,
                service: self.service,
                output: self.output,
                events: event_tx,
                stats: stats.clone(),
            },
            completion_tx.clone(),
        );
        if let Some(visibility) = self.visibility {
            let monitor = ResilienceMonitor::spawn(visibility, move || {
                let _ = completion_tx.send(Completion::Foreground);
            });
            driver.attach_monitor(monitor);
        }
        tokio::spawn(driver.run(command_rx, completion_rx));

        let engine = SpeechEngine {
            commands: command_tx,
            mute: self.mute,
            destroyed: Arc::new(AtomicBool::new(false)),
            stats,
        };
        (engine, event_rx)
    }
}

impl SpeechEngine {
    pub fn builder(
        service: Arc<dyn SynthesisService>,
        output: Arc<dyn AudioOutput>,
    ) -> SpeechEngineBuilder {
        SpeechEngineBuilder {
            service,
            output,
            config: EngineConfig::default(),
            params: SynthesisParams::default(),
            mute: MuteGate::new(),
            visibility: None,
        }
    }

    /// Set voice and speed for requests started from now on.
    pub fn configure(&self, params: SynthesisParams) -> Result<(), EngineError> {
        self.ensure_live()?;
        params.validate()?;
        self.send(Command::Configure(params))
    }

    /// Append a sentence. Blank text and muted calls are accepted and ignored.
    pub fn enqueue(&self, text: impl Into<String>) -> Result<(), EngineError> {
        self.ensure_live()?;
        if self.mute.is_muted() {
            debug!("Muted, dropping sentence");
            return Ok(());
        }
        let text = text.into();
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.send(Command::Enqueue(text.to_string()))
    }

    /// No more sentences for this turn; `PlaybackEnd` follows once drained.
    pub fn flush(&self) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.send(Command::Flush {
            muted: self.mute.is_muted(),
        })
    }

    /// Drop all queued and in-flight work immediately. No `PlaybackEnd` is sent.
    pub fn interrupt(&self) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.send(Command::Interrupt)
    }

    /// Tear the engine down and wait for the driver to finish.
    ///
    /// Idempotent. Every later call on any clone returns
    /// [`EngineError::Destroyed`].
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Destroy(ack)).is_ok() {
            let _ = done.await;
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        self.ensure_live()?;
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        response.await.map_err(|_| EngineError::DriverGone)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn mute_gate(&self) -> &MuteGate {
        &self.mute
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.is_destroyed() {
            return Err(EngineError::Destroyed);
        }
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::DriverGone)
    }
}
