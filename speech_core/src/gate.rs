//! Mute gate: an externally owned switch that silences the engine without
//! tearing it down.
//!
//! While muted, `enqueue` creates no queue items (so no synthesis request is
//! ever issued) and `flush` ends the turn immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared mute flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MuteGate {
    muted: Arc<AtomicBool>,
}

impl MuteGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mute(&self) {
        self.muted.store(true, Ordering::SeqCst);
        tracing::debug!("Mute gate: muted");
    }

    pub fn unmute(&self) {
        self.muted.store(false, Ordering::SeqCst);
        tracing::debug!("Mute gate: unmuted");
    }

    pub fn set_muted(&self, muted: bool) {
        if muted {
            self.mute();
        } else {
            self.unmute();
        }
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }
}
