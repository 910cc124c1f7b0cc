use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use speech_core::{AudioClip, CancellationToken, SynthesisError, SynthesisRequest, SynthesisService};
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8085/tts";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the remote synthesis endpoint.
#[derive(Debug, Clone)]
pub struct SynthClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub request_timeout: Duration,
}

impl Default for SynthClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SynthClientConfig {
    /// Read `SYNTH_URL`, `SYNTH_API_KEY`, `SYNTH_MODEL` and `SYNTH_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let endpoint = std::env::var("SYNTH_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

        let api_key = std::env::var("SYNTH_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let model = std::env::var("SYNTH_MODEL")
            .ok()
            .filter(|model| !model.trim().is_empty());

        let timeout_secs = std::env::var("SYNTH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            endpoint,
            api_key,
            model,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Request body sent to the endpoint
#[derive(Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
    voice: &'a str,
    speed: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

/// JSON response variant carrying base64 audio
#[derive(Deserialize)]
struct EncodedAudio {
    audio_base64: String,
    #[serde(default)]
    sample_rate: Option<u32>,
}

/// [`SynthesisService`] backed by an HTTP endpoint.
///
/// The endpoint receives `{text, voice, speed[, model]}` as JSON and answers
/// either with raw audio bytes or with a JSON body holding `audio_base64`.
pub struct HttpSynthesisService {
    client: Client,
    config: SynthClientConfig,
}

impl HttpSynthesisService {
    pub fn new(config: SynthClientConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SynthesisError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SynthClientConfig {
        &self.config
    }

    fn transport_error(&self, err: reqwest::Error) -> SynthesisError {
        if err.is_timeout() {
            SynthesisError::TimedOut(self.config.request_timeout)
        } else {
            SynthesisError::Transport(err.to_string())
        }
    }

    async fn fetch(&self, request: &SynthesisRequest) -> Result<AudioClip, SynthesisError> {
        let body = SpeakRequest {
            text: &request.text,
            voice: &request.voice,
            speed: request.speed,
            model: self.config.model.as_deref(),
        };

        let mut builder = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Service {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.starts_with("application/json"));
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        debug!(bytes = bytes.len(), is_json, "Synthesis response received");

        decode_body(&bytes, is_json)
    }
}

fn decode_body(bytes: &[u8], is_json: bool) -> Result<AudioClip, SynthesisError> {
    let audio = if is_json {
        let encoded: EncodedAudio = serde_json::from_slice(bytes)
            .map_err(|e| SynthesisError::InvalidAudio(format!("malformed JSON body: {e}")))?;
        if let Some(rate) = encoded.sample_rate {
            debug!(sample_rate = rate, "Decoding base64 audio");
        }
        general_purpose::STANDARD
            .decode(encoded.audio_base64.trim())
            .map_err(|e| SynthesisError::InvalidAudio(format!("invalid base64 audio: {e}")))?
    } else {
        bytes.to_vec()
    };

    if audio.is_empty() {
        return Err(SynthesisError::InvalidAudio("empty audio body".to_string()));
    }
    Ok(AudioClip::from_bytes(audio))
}

#[async_trait]
impl SynthesisService for HttpSynthesisService {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: CancellationToken,
    ) -> Result<AudioClip, SynthesisError> {
        // Dropping the request future aborts the connection.
        tokio::select! {
            _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
            result = self.fetch(request) => result,
        }
    }
}
