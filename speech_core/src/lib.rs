//! Streaming sentence-level speech engine.
//!
//! Text arrives sentence by sentence from a producer, is synthesized by a
//! remote [`SynthesisService`] with bounded concurrency, and is played back
//! through an [`AudioOutput`] strictly in arrival order, one sink at a time.
//! Turns can be interrupted at any point; stale work from an interrupted
//! session is discarded by epoch.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use speech_core::{ClockedOutput, SpeechEngine, SynthesisService};
//! # async fn demo(service: Arc<dyn SynthesisService>) -> Result<(), speech_core::EngineError> {
//! let (engine, mut events) = SpeechEngine::builder(service, Arc::new(ClockedOutput::new())).build();
//! engine.enqueue("Hello there.")?;
//! engine.enqueue("Let's begin.")?;
//! engine.flush()?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clip;
pub mod config;
mod driver;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod monitor;
pub mod output;
pub mod playback;
pub mod queue;
pub mod segment;
pub mod session;
pub mod stats;
pub mod synthesis;
pub mod turn;

pub use cache::AudioCache;
pub use clip::{encode_wav, silence, AudioClip, WavInfo};
pub use config::{EngineConfig, SynthesisParams, MAX_CACHE_SIZE, MAX_CONCURRENT_SYNTH};
pub use driver::EngineSnapshot;
pub use engine::{SpeechEngine, SpeechEngineBuilder};
pub use error::{EngineError, SinkError, SynthesisError};
pub use events::{EngineEvent, ErrorKind, PlaybackError};
pub use gate::MuteGate;
pub use monitor::{ResilienceMonitor, Visibility};
pub use output::{ClockedOutput, ClockedSink, WavRecorder};
pub use playback::{AudioOutput, AudioSink, PlaybackDone, SinkState};
pub use queue::ItemStatus;
pub use segment::{clean_for_speech, sentences, SentenceSplitter};
pub use session::Epoch;
pub use stats::{EngineStats, StatsSnapshot};
pub use synthesis::{SynthesisRequest, SynthesisService};

pub use tokio_util::sync::CancellationToken;
