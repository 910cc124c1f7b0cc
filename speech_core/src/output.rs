//! Clocked reference output.
//!
//! [`ClockedOutput`] accepts WAV clips and holds each one "on air" for its
//! real duration using the tokio clock. It honours pause, resume and stop,
//! can imitate a host that suspends audio when backgrounded, and can record
//! every clip that played to the end into a single WAV file.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::clip::{AudioClip, WavInfo};
use crate::error::SinkError;
use crate::monitor::Visibility;
use crate::playback::{AudioOutput, AudioSink, PlaybackDone, SinkState};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct ClockedOutput {
    host: Option<watch::Receiver<Visibility>>,
    recorder: Option<WavRecorder>,
}

impl ClockedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause sinks whenever the host goes to the background.
    pub fn with_host(mut self, visibility: watch::Receiver<Visibility>) -> Self {
        self.host = Some(visibility);
        self
    }

    pub fn with_recorder(mut self, recorder: WavRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }
}

impl AudioOutput for ClockedOutput {
    fn open(&self, clip: AudioClip) -> Result<Box<dyn AudioSink>, SinkError> {
        let recording = match &self.recorder {
            Some(recorder) => {
                let (samples, info) = clip.decode_samples()?;
                Some(Arc::new(Recording {
                    recorder: recorder.clone(),
                    samples,
                    info,
                }))
            }
            None => None,
        };
        let length = match &recording {
            Some(rec) => rec.info.duration(),
            None => clip.wav_info()?.duration(),
        };

        Ok(Box::new(ClockedSink {
            length,
            clock: Arc::new(Mutex::new(Clock::default())),
            timer: None,
            host: self.host.clone(),
            recording,
        }))
    }
}

struct Recording {
    recorder: WavRecorder,
    samples: Vec<f32>,
    info: WavInfo,
}

struct Clock {
    state: SinkState,
    elapsed: Duration,
    started_at: Option<Instant>,
    done: Option<oneshot::Sender<Result<(), SinkError>>>,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            state: SinkState::Idle,
            elapsed: Duration::ZERO,
            started_at: None,
            done: None,
        }
    }
}

impl Clock {
    fn position(&self) -> Duration {
        self.elapsed + self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn halt(&mut self, state: SinkState) {
        self.elapsed = self.position();
        self.started_at = None;
        self.state = state;
    }

    fn run(&mut self) {
        self.started_at = Some(Instant::now());
        self.state = SinkState::Playing;
    }
}

pub struct ClockedSink {
    length: Duration,
    clock: Arc<Mutex<Clock>>,
    timer: Option<JoinHandle<()>>,
    host: Option<watch::Receiver<Visibility>>,
    recording: Option<Arc<Recording>>,
}

impl ClockedSink {
    fn start_timer(&mut self, remaining: Duration) {
        self.cancel_timer();
        self.timer = Some(tokio::spawn(run_clock(
            Arc::clone(&self.clock),
            remaining,
            self.length,
            self.host.clone(),
            self.recording.clone(),
        )));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

async fn run_clock(
    clock: Arc<Mutex<Clock>>,
    remaining: Duration,
    length: Duration,
    host: Option<watch::Receiver<Visibility>>,
    recording: Option<Arc<Recording>>,
) {
    let backgrounded = async move {
        let Some(mut rx) = host else {
            return std::future::pending::<()>().await;
        };
        rx.borrow_and_update();
        loop {
            if rx.changed().await.is_err() {
                return std::future::pending::<()>().await;
            }
            if *rx.borrow_and_update() == Visibility::Background {
                return;
            }
        }
    };

    tokio::select! {
        _ = tokio::time::sleep(remaining) => {
            let done = {
                let mut clock = lock(&clock);
                clock.halt(SinkState::Ended);
                clock.elapsed = length;
                clock.done.take()
            };
            if let Some(rec) = recording {
                if let Err(e) = rec.recorder.append(&rec.samples, rec.info) {
                    warn!(error = %e, "Could not record played clip");
                }
            }
            if let Some(done) = done {
                let _ = done.send(Ok(()));
            }
        }
        _ = backgrounded => {
            let mut clock = lock(&clock);
            clock.halt(SinkState::Paused);
            debug!(position_ms = clock.elapsed.as_millis() as u64, "Host suspended playback");
        }
    }
}

impl AudioSink for ClockedSink {
    fn play(&mut self) -> Result<PlaybackDone, SinkError> {
        let rx = {
            let mut clock = lock(&self.clock);
            if clock.state != SinkState::Idle {
                return Err(SinkError::Busy(format!("sink already {:?}", clock.state)));
            }
            let (tx, rx) = oneshot::channel();
            clock.done = Some(tx);
            clock.run();
            rx
        };
        self.start_timer(self.length);
        Ok(rx)
    }

    fn pause(&mut self) {
        let mut clock = lock(&self.clock);
        if clock.state == SinkState::Playing {
            if let Some(timer) = self.timer.take() {
                timer.abort();
            }
            clock.halt(SinkState::Paused);
        }
    }

    fn resume(&mut self) -> Result<(), SinkError> {
        let remaining = {
            let mut clock = lock(&self.clock);
            match clock.state {
                SinkState::Playing => return Ok(()),
                SinkState::Paused => {}
                other => {
                    return Err(SinkError::Device(format!("cannot resume a sink that is {other:?}")))
                }
            }
            clock.run();
            self.length.saturating_sub(clock.elapsed)
        };
        self.start_timer(remaining);
        Ok(())
    }

    fn stop(&mut self) {
        self.cancel_timer();
        let mut clock = lock(&self.clock);
        if !matches!(clock.state, SinkState::Ended | SinkState::Stopped) {
            clock.halt(SinkState::Stopped);
        }
        clock.done = None;
    }

    fn state(&self) -> SinkState {
        lock(&self.clock).state
    }

    fn position(&self) -> Duration {
        lock(&self.clock).position().min(self.length)
    }
}

impl Drop for ClockedSink {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

/// Appends played clips to one WAV file, created on the first clip.
#[derive(Clone)]
pub struct WavRecorder {
    inner: Arc<Mutex<RecorderState>>,
}

struct RecorderState {
    path: PathBuf,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    spec: Option<hound::WavSpec>,
    clips: usize,
}

impl WavRecorder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecorderState {
                path: path.as_ref().to_path_buf(),
                writer: None,
                spec: None,
                clips: 0,
            })),
        }
    }

    pub fn append(&self, samples: &[f32], info: WavInfo) -> Result<(), SinkError> {
        let mut state = lock(&self.inner);
        let spec = hound::WavSpec {
            channels: info.channels,
            sample_rate: info.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        match state.spec {
            Some(existing) if existing != spec => {
                return Err(SinkError::Unsupported(format!(
                    "clip format {}Hz/{}ch differs from recording {}Hz/{}ch",
                    spec.sample_rate, spec.channels, existing.sample_rate, existing.channels
                )));
            }
            Some(_) => {}
            None => {
                let writer = hound::WavWriter::create(&state.path, spec)
                    .map_err(|e| SinkError::Device(format!("create {}: {e}", state.path.display())))?;
                state.writer = Some(writer);
                state.spec = Some(spec);
            }
        }

        let writer = state
            .writer
            .as_mut()
            .ok_or_else(|| SinkError::Device("recording already finalized".to_string()))?;
        for &s in samples {
            writer
                .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .map_err(|e| SinkError::Device(format!("write sample: {e}")))?;
        }
        state.clips += 1;
        Ok(())
    }

    pub fn clips_written(&self) -> usize {
        lock(&self.inner).clips
    }

    /// Flush the WAV header. Later appends fail.
    pub fn finalize(&self) -> Result<(), SinkError> {
        let mut state = lock(&self.inner);
        if let Some(writer) = state.writer.take() {
            writer
                .finalize()
                .map_err(|e| SinkError::Device(format!("finalize recording: {e}")))?;
        }
        Ok(())
    }
}
