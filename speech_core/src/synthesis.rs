//! Synthesis service seam and the per-request task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::clip::AudioClip;
use crate::error::SynthesisError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
}

/// Remote text-to-speech backend.
///
/// Implementations should stop work and return [`SynthesisError::Cancelled`]
/// once `cancel` fires; the engine also stops polling the future at that
/// point, so a service that ignores the token is still aborted.
#[async_trait]
pub trait SynthesisService: Send + Sync {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: CancellationToken,
    ) -> Result<AudioClip, SynthesisError>;
}

/// Run one request to completion, honouring cancellation and the optional timeout.
pub(crate) async fn run_request(
    service: Arc<dyn SynthesisService>,
    request: SynthesisRequest,
    cancel: CancellationToken,
    timeout: Option<Duration>,
) -> Result<AudioClip, SynthesisError> {
    let call = service.synthesize(&request, cancel.clone());
    let bounded = async {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(SynthesisError::TimedOut(limit))),
            None => call.await,
        }
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
        result = bounded => result,
    };

    match outcome {
        Ok(clip) if clip.is_empty() => Err(SynthesisError::InvalidAudio(
            "service returned an empty body".to_string(),
        )),
        other => {
            debug!(chars = request.text.len(), ok = other.is_ok(), "Synthesis request settled");
            other
        }
    }
}
