use std::sync::Arc;

use anyhow::Context;
use speaker::{Host, SpeakerConfig};
use speech_core::{ClockedOutput, SpeechEngine, Visibility, WavRecorder};
use synth_client::{HttpSynthesisService, SynthClientConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    let config = SpeakerConfig::from_env();
    config.validate().context("invalid speaker configuration")?;

    let client_config = SynthClientConfig::from_env();
    info!(
        endpoint = %client_config.endpoint,
        voice = %config.voice,
        speed = config.speed,
        "Starting speaker"
    );
    let service = HttpSynthesisService::new(client_config)
        .context("failed to build synthesis client")?;

    let (visibility_tx, visibility_rx) = watch::channel(Visibility::Foreground);
    let mut output = ClockedOutput::new().with_host(visibility_rx.clone());
    let recorder = config.record_path.as_ref().map(WavRecorder::new);
    if let Some(recorder) = &recorder {
        output = output.with_recorder(recorder.clone());
    }

    let (engine, events) = SpeechEngine::builder(Arc::new(service), Arc::new(output))
        .config(config.engine_config())
        .params(config.params())
        .visibility(visibility_rx)
        .build();

    let mut host = Host::new(
        engine.clone(),
        events,
        visibility_tx,
        config.params(),
        config.events_json,
    );
    let lines = BufReader::new(tokio::io::stdin()).lines();

    let outcome = tokio::select! {
        result = host.run(lines) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, stopping");
            let _ = engine.interrupt();
            Ok(())
        }
    };
    if let Err(e) = &outcome {
        error!("Input loop failed: {:#}", e);
    }

    engine.destroy().await;
    if let Some(recorder) = recorder {
        recorder.finalize().context("failed to finalize recording")?;
        info!(clips = recorder.clips_written(), "Recording saved");
    }
    info!(stats = ?engine.stats(), "Speaker stopped");
    outcome
}
