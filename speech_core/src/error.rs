use std::time::Duration;

use thiserror::Error;

/// Errors returned to callers of the public engine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Speech engine has been destroyed")]
    Destroyed,

    #[error("Invalid synthesis parameters: {0}")]
    InvalidParams(String),

    #[error("Speech engine driver is no longer running")]
    DriverGone,
}

/// Failures of a single synthesis request.
///
/// `Cancelled` is the expected outcome of an interrupt and is never
/// reported to listeners; every other variant surfaces as `synthesis_failed`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Synthesis cancelled")]
    Cancelled,

    #[error("Synthesis timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Synthesis service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Synthesis transport error: {0}")]
    Transport(String),

    #[error("Synthesis returned unusable audio: {0}")]
    InvalidAudio(String),
}

impl SynthesisError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SynthesisError::Cancelled)
    }
}

/// Failures raised by an audio output or one of its sinks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The output refused to start playback (resource contention).
    #[error("Audio output busy: {0}")]
    Busy(String),

    #[error("Unsupported audio clip: {0}")]
    Unsupported(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Playback interrupted")]
    Interrupted,
}
