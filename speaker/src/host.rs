//! Interactive host: turns input lines into engine calls and reports events.
//!
//! The engine numbers sentences per turn and restarts at zero after every
//! `PlaybackEnd`. While a flushed turn is still draining, the host cannot
//! tell whether a new sentence would join that turn or start the next one,
//! so input arriving in that window is held back until the end is seen.

use std::collections::VecDeque;

use anyhow::Context;
use speech_core::{
    clean_for_speech, EngineEvent, SentenceSplitter, SpeechEngine, SynthesisParams, Visibility,
};
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::command::{parse_line, HostCommand, Input, HELP};
use crate::error::InputError;
use crate::validation::validate_sentence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Input held back while the engine drains an earlier turn.
#[derive(Debug, Default)]
struct HeldTurn {
    sentences: Vec<String>,
    flushed: bool,
}

pub struct Host {
    engine: SpeechEngine,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    visibility: watch::Sender<Visibility>,
    params: SynthesisParams,
    splitter: SentenceSplitter,
    events_json: bool,
    /// Sentences of the current engine turn, by index.
    turn: Vec<String>,
    /// A flush was sent and its `PlaybackEnd` has not been read yet.
    draining: bool,
    held: VecDeque<HeldTurn>,
    spoken: Vec<String>,
}

impl Host {
    pub fn new(
        engine: SpeechEngine,
        events: mpsc::UnboundedReceiver<EngineEvent>,
        visibility: watch::Sender<Visibility>,
        params: SynthesisParams,
        events_json: bool,
    ) -> Self {
        Self {
            engine,
            events,
            visibility,
            params,
            splitter: SentenceSplitter::new(),
            events_json,
            turn: Vec::new(),
            draining: false,
            held: VecDeque::new(),
            spoken: Vec::new(),
        }
    }

    /// Every sentence that started playing, in order.
    pub fn spoken(&self) -> &[String] {
        &self.spoken
    }

    /// Read lines until `/quit` or end of input. At end of input the last
    /// turn is flushed and every turn still queued is allowed to finish.
    pub async fn run<R>(&mut self, mut lines: Lines<R>) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            tokio::select! {
                line = lines.next_line() => match line.context("reading input")? {
                    Some(line) => {
                        if self.handle_line(&line).await? == Flow::Quit {
                            return Ok(());
                        }
                    }
                    None => {
                        self.end_turn()?;
                        self.wait_for_end().await?;
                        return Ok(());
                    }
                },
                Some(event) = self.events.recv() => self.report(&event)?,
            }
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> anyhow::Result<Flow> {
        let input = match parse_line(line) {
            Ok(input) => input,
            Err(err) => {
                warn!(error = %err, "Ignoring input");
                return Ok(Flow::Continue);
            }
        };

        match input {
            Input::Text(text) => {
                for sentence in self.splitter.push(&format!("{text}\n")) {
                    self.speak(&sentence)?;
                }
            }
            Input::EndOfTurn => self.end_turn()?,
            Input::Command(command) => return self.handle_command(command).await,
        }
        Ok(Flow::Continue)
    }

    async fn handle_command(&mut self, command: HostCommand) -> anyhow::Result<Flow> {
        match command {
            HostCommand::Mute => self.engine.mute_gate().mute(),
            HostCommand::Unmute => self.engine.mute_gate().unmute(),
            HostCommand::Stop => self.stop().await?,
            HostCommand::Background => {
                self.visibility.send_replace(Visibility::Background);
            }
            HostCommand::Foreground => {
                self.visibility.send_replace(Visibility::Foreground);
            }
            HostCommand::Voice(voice) => {
                self.reconfigure(SynthesisParams::new(voice, self.params.speed))
            }
            HostCommand::Speed(speed) => {
                self.reconfigure(SynthesisParams::new(self.params.voice.clone(), speed))
            }
            HostCommand::Stats => {
                let stats = serde_json::to_string_pretty(&self.engine.stats())
                    .context("serializing stats")?;
                println!("{stats}");
            }
            HostCommand::Help => println!("{HELP}"),
            HostCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn reconfigure(&mut self, params: SynthesisParams) {
        match self.engine.configure(params.clone()) {
            Ok(()) => {
                info!(voice = %params.voice, speed = params.speed, "Voice settings changed");
                self.params = params;
            }
            Err(err) => warn!(error = %err, "Keeping previous voice settings"),
        }
    }

    /// Interrupt the engine and forget everything queued on this side.
    async fn stop(&mut self) -> anyhow::Result<()> {
        self.engine.interrupt()?;
        self.held.clear();
        // The snapshot is answered after the interrupt, so every event of
        // the abandoned session is already buffered once it returns.
        self.engine.snapshot().await?;
        while let Ok(event) = self.events.try_recv() {
            self.report(&event)?;
        }
        self.splitter = SentenceSplitter::new();
        self.turn.clear();
        self.draining = false;
        info!("Stopped");
        Ok(())
    }

    fn speak(&mut self, sentence: &str) -> anyhow::Result<()> {
        let text = clean_for_speech(sentence);
        match validate_sentence(&text) {
            Ok(()) => {}
            Err(InputError::Empty) => return Ok(()),
            Err(err) => {
                warn!(error = %err, "Skipping sentence");
                return Ok(());
            }
        }
        // Muted sentences never reach the engine queue.
        if self.engine.mute_gate().is_muted() {
            return Ok(());
        }
        if self.draining {
            match self.held.back_mut() {
                Some(held) if !held.flushed => held.sentences.push(text),
                _ => self.held.push_back(HeldTurn {
                    sentences: vec![text],
                    flushed: false,
                }),
            }
            return Ok(());
        }
        self.enqueue(text)
    }

    fn enqueue(&mut self, text: String) -> anyhow::Result<()> {
        self.turn.push(text.clone());
        self.engine.enqueue(text)?;
        Ok(())
    }

    fn end_turn(&mut self) -> anyhow::Result<()> {
        if let Some(rest) = self.splitter.finish() {
            self.speak(&rest)?;
        }
        if !self.draining {
            return self.flush();
        }
        if let Some(held) = self.held.back_mut() {
            held.flushed = true;
        }
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.engine.flush()?;
        self.draining = true;
        Ok(())
    }

    /// Hand held input to the engine once the previous turn has ended.
    fn release_held(&mut self) -> anyhow::Result<()> {
        let Some(held) = self.held.pop_front() else {
            return Ok(());
        };
        debug!(sentences = held.sentences.len(), "Releasing held turn");
        if !self.engine.mute_gate().is_muted() {
            for text in held.sentences {
                self.enqueue(text)?;
            }
        }
        if held.flushed {
            self.flush()?;
        }
        Ok(())
    }

    async fn wait_for_end(&mut self) -> anyhow::Result<()> {
        while self.draining {
            let Some(event) = self.events.recv().await else {
                break;
            };
            self.report(&event)?;
        }
        Ok(())
    }

    fn print_json(&self, event: &EngineEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!(error = %err, "Could not serialize event"),
        }
    }

    fn report(&mut self, event: &EngineEvent) -> anyhow::Result<()> {
        if self.events_json {
            self.print_json(event);
        }
        match event {
            EngineEvent::PlaybackStart => info!("Speaking"),
            EngineEvent::SentenceStart { index } => {
                if let Some(text) = self.turn.get(*index) {
                    if !self.events_json {
                        println!("> {text}");
                    }
                    self.spoken.push(text.clone());
                }
            }
            EngineEvent::PlaybackEnd => {
                info!("Finished speaking");
                self.turn.clear();
                self.draining = false;
                self.release_held()?;
            }
            EngineEvent::Error(err) => {
                warn!(kind = ?err.kind, index = ?err.index, "{}", err.message)
            }
        }
        Ok(())
    }
}
