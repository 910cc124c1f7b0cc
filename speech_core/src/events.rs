//! Notifications pushed to the engine's listener, in emission order.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// First sentence of a turn began playing.
    PlaybackStart,
    /// The turn drained after `flush`. Never sent for an interrupted turn.
    PlaybackEnd,
    /// Sentence `index` of the current turn began playing.
    SentenceStart { index: usize },
    Error(PlaybackError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SynthesisFailed,
    PlaybackFailed,
    PlayRejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl EngineEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>, index: Option<usize>) -> Self {
        EngineEvent::Error(PlaybackError {
            kind,
            message: message.into(),
            index,
        })
    }
}
