// Configuration for the speaker host

use std::path::PathBuf;
use std::time::Duration;

use speech_core::{EngineConfig, SynthesisParams, MAX_CACHE_SIZE, MAX_CONCURRENT_SYNTH};

use crate::error::ConfigError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct SpeakerConfig {
    pub voice: String,
    pub speed: f32,
    pub max_concurrent_synth: usize,
    pub cache_size: usize,
    /// Zero disables the engine-side timeout.
    pub synthesis_timeout_secs: u64,
    pub record_path: Option<PathBuf>,
    pub events_json: bool,
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        let params = SynthesisParams::default();
        Self {
            voice: params.voice,
            speed: params.speed,
            max_concurrent_synth: MAX_CONCURRENT_SYNTH,
            cache_size: MAX_CACHE_SIZE,
            synthesis_timeout_secs: DEFAULT_TIMEOUT_SECS,
            record_path: None,
            events_json: false,
        }
    }
}

impl SpeakerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let voice = std::env::var("TTS_VOICE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.voice);

        let speed = std::env::var("TTS_SPEED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.speed);

        let max_concurrent_synth = std::env::var("MAX_CONCURRENT_SYNTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_concurrent_synth);

        let cache_size = std::env::var("TTS_CACHE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.cache_size);

        let synthesis_timeout_secs = std::env::var("SYNTH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.synthesis_timeout_secs);

        let record_path = std::env::var("RECORD_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let events_json = std::env::var("EVENTS_JSON")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            voice,
            speed,
            max_concurrent_synth,
            cache_size,
            synthesis_timeout_secs,
            record_path,
            events_json,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params()
            .validate()
            .map_err(|e| ConfigError::Invalid {
                name: "synthesis parameters",
                reason: e.to_string(),
            })?;
        if self.max_concurrent_synth == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_CONCURRENT_SYNTH",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cache_size == 0 {
            return Err(ConfigError::Invalid {
                name: "TTS_CACHE_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn params(&self) -> SynthesisParams {
        SynthesisParams::new(self.voice.clone(), self.speed)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent_synth: self.max_concurrent_synth,
            max_cache_size: self.cache_size,
            synthesis_timeout: (self.synthesis_timeout_secs > 0)
                .then(|| Duration::from_secs(self.synthesis_timeout_secs)),
        }
    }
}
