//! Resilience monitor.
//!
//! Some hosts suspend audio output on their own when the application is
//! backgrounded. The monitor watches the host's visibility signal and reports
//! every return to the foreground so the engine can resume a sink the host
//! paused.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Foreground,
    Background,
}

pub struct ResilienceMonitor {
    task: JoinHandle<()>,
}

impl ResilienceMonitor {
    /// Subscribe to `visibility`, calling `on_foreground` on every change
    /// that leaves the host in the foreground.
    ///
    /// `watch` coalesces updates, so a quick background/foreground pair may
    /// arrive as a single foreground value. The callback must tolerate
    /// being called when nothing was suspended.
    pub fn spawn<F>(mut visibility: watch::Receiver<Visibility>, on_foreground: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            while visibility.changed().await.is_ok() {
                let now = *visibility.borrow_and_update();
                debug!(?now, "Host visibility changed");
                if now == Visibility::Foreground {
                    on_foreground();
                }
            }
        });
        Self { task }
    }

    /// Stop listening to the host.
    pub fn detach(self) {
        self.task.abort();
    }
}
