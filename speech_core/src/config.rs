// Engine tuning and per-request synthesis parameters

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Maximum number of synthesis requests in flight at once.
pub const MAX_CONCURRENT_SYNTH: usize = 3;
/// Maximum number of synthesized clips retained by the cache.
pub const MAX_CACHE_SIZE: usize = 64;
/// Default upper bound on a single synthesis request.
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);

const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_concurrent_synth: usize,
    pub max_cache_size: usize,
    /// `None` leaves timing entirely to the synthesis service.
    pub synthesis_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_synth: MAX_CONCURRENT_SYNTH,
            max_cache_size: MAX_CACHE_SIZE,
            synthesis_timeout: Some(DEFAULT_SYNTHESIS_TIMEOUT),
        }
    }
}

impl EngineConfig {
    /// Clamp zero-valued limits up to one so the engine can always make progress.
    pub(crate) fn normalized(mut self) -> Self {
        self.max_concurrent_synth = self.max_concurrent_synth.max(1);
        self.max_cache_size = self.max_cache_size.max(1);
        self
    }
}

/// Voice and speed applied to every synthesis request started after `configure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisParams {
    pub voice: String,
    pub speed: f32,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
            speed: 1.0,
        }
    }
}

impl SynthesisParams {
    pub fn new(voice: impl Into<String>, speed: f32) -> Self {
        Self {
            voice: voice.into(),
            speed,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.voice.trim().is_empty() {
            return Err(EngineError::InvalidParams("voice cannot be empty".to_string()));
        }
        if !self.speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(EngineError::InvalidParams(format!(
                "speed {} outside {}..={}",
                self.speed, MIN_SPEED, MAX_SPEED
            )));
        }
        Ok(())
    }
}
