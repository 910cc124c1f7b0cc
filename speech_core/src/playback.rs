//! Audio output seam.
//!
//! An [`AudioOutput`] hands out at most one live [`AudioSink`] at a time from
//! the engine's point of view: the engine drops the previous sink before it
//! opens the next.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::clip::AudioClip;
use crate::error::SinkError;

/// Resolves once when playback ends naturally (`Ok`) or fails (`Err`).
/// The sender is dropped without a value when the sink is stopped.
pub type PlaybackDone = oneshot::Receiver<Result<(), SinkError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Idle,
    Playing,
    Paused,
    Ended,
    Stopped,
}

pub trait AudioSink: Send {
    /// Start playback. An `Err` means the output refused to start.
    fn play(&mut self) -> Result<PlaybackDone, SinkError>;

    fn pause(&mut self);

    fn resume(&mut self) -> Result<(), SinkError>;

    /// Stop and unload. The sink must not emit a completion afterwards.
    fn stop(&mut self);

    fn state(&self) -> SinkState;

    /// Elapsed playback time.
    fn position(&self) -> Duration;
}

pub trait AudioOutput: Send + Sync {
    /// Acquire the output device for one clip.
    fn open(&self, clip: AudioClip) -> Result<Box<dyn AudioSink>, SinkError>;
}

/// The single active playback slot.
pub(crate) struct ActivePlayback {
    pub index: usize,
    sink: Box<dyn AudioSink>,
}

impl ActivePlayback {
    pub fn new(index: usize, sink: Box<dyn AudioSink>) -> Self {
        Self { index, sink }
    }

    pub fn sink_mut(&mut self) -> &mut dyn AudioSink {
        self.sink.as_mut()
    }

    /// True when the host suspended playback rather than the engine.
    pub fn suspended_by_host(&self) -> bool {
        self.sink.state() == SinkState::Paused && self.sink.position() > Duration::ZERO
    }

    /// Stop the sink and drop it, releasing the output device.
    pub fn release(mut self) {
        self.sink.stop();
        tracing::debug!(index = self.index, "Released playback sink");
    }
}
