//! Per-session speech queue and the per-item state machine.
//!
//! Items move strictly forward through
//! `Pending → Synthesizing → Ready → Playing → Done`, or jump to `Error` from
//! any non-terminal state. The audio clip is owned by the item until playback
//! takes it; it is never handed out twice.
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::clip::AudioClip;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Synthesizing,
    Ready,
    Playing,
    Done,
    Error,
}

impl ItemStatus {
    fn rank(self) -> u8 {
        match self {
            ItemStatus::Pending => 0,
            ItemStatus::Synthesizing => 1,
            ItemStatus::Ready => 2,
            ItemStatus::Playing => 3,
            ItemStatus::Done => 4,
            ItemStatus::Error => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Error)
    }

    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == ItemStatus::Error || next.rank() > self.rank()
    }
}

#[derive(Debug)]
pub struct QueueItem {
    text: String,
    audio: Option<AudioClip>,
    status: ItemStatus,
    cancel: Option<CancellationToken>,
}

impl QueueItem {
    fn new(text: String) -> Self {
        Self {
            text,
            audio: None,
            status: ItemStatus::Pending,
            cancel: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    #[cfg(test)]
    fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    fn transition(&mut self, next: ItemStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(from = ?self.status, to = ?next, "Rejected backward item transition");
            return false;
        }
        self.status = next;
        true
    }

    /// `Pending → Synthesizing`; returns the token that aborts the request.
    pub fn begin_synthesis(&mut self) -> Option<CancellationToken> {
        if !self.transition(ItemStatus::Synthesizing) {
            return None;
        }
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        Some(token)
    }

    /// `Pending | Synthesizing → Ready`.
    pub fn mark_ready(&mut self, clip: AudioClip) -> bool {
        if !self.transition(ItemStatus::Ready) {
            return false;
        }
        self.cancel = None;
        self.audio = Some(clip);
        true
    }

    /// `Ready → Playing`, moving the clip out to the playback slot.
    pub fn take_for_playback(&mut self) -> Option<AudioClip> {
        if self.status != ItemStatus::Ready {
            return None;
        }
        let clip = self.audio.take()?;
        self.transition(ItemStatus::Playing);
        Some(clip)
    }

    pub fn mark_done(&mut self) -> bool {
        self.transition(ItemStatus::Done)
    }

    pub fn mark_failed(&mut self) -> bool {
        let moved = self.transition(ItemStatus::Error);
        self.release();
        moved
    }

    /// Abort any in-flight synthesis and drop the clip, leaving status untouched.
    pub fn release(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.audio = None;
    }
}

/// Ordered items of the current session plus the playback cursor.
#[derive(Debug, Default)]
pub struct SpeechQueue {
    items: Vec<QueueItem>,
    play_index: usize,
    flushed: bool,
}

impl SpeechQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return its index.
    pub fn push(&mut self, text: String) -> usize {
        self.items.push(QueueItem::new(text));
        self.items.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut QueueItem> {
        self.items.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn play_index(&self) -> usize {
        self.play_index
    }

    pub fn advance_play_index(&mut self) {
        if self.play_index < self.items.len() {
            self.play_index += 1;
        }
    }

    pub fn flushed(&self) -> bool {
        self.flushed
    }

    pub fn mark_flushed(&mut self) {
        self.flushed = true;
    }

    /// True once every item has been consumed by playback.
    pub fn is_exhausted(&self) -> bool {
        self.play_index >= self.items.len()
    }

    pub fn in_flight(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status == ItemStatus::Synthesizing)
            .count()
    }

    /// Indices of pending items in enqueue order.
    pub fn pending(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == ItemStatus::Pending)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn statuses(&self) -> Vec<ItemStatus> {
        self.items.iter().map(|item| item.status).collect()
    }

    /// Release every item and reset to the initial state.
    pub fn clear(&mut self) {
        for item in &mut self.items {
            item.release();
        }
        self.items.clear();
        self.play_index = 0;
        self.flushed = false;
    }
}
