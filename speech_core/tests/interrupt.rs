//! Interrupt and teardown behaviour.

mod common;

use std::time::Duration;

use common::*;
use speech_core::{EngineError, EngineEvent, ItemStatus, SynthesisParams};

#[tokio::test(start_paused = true)]
async fn interrupt_mid_turn_never_ends_the_turn() {
    let service = ScriptedService::new();
    let output = MockOutput::new();
    let (engine, mut events) = engine(&service, &output);

    for text in ["One.", "Two.", "Three."] {
        engine.enqueue(text).unwrap();
    }
    engine.flush().unwrap();

    // First sentence is playing (synth 50ms, play 100ms).
    tokio::time::sleep(Duration::from_millis(80)).await;
    engine.interrupt().unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let seen = drain_events(&mut events);
    assert_eq!(
        seen,
        vec![
            EngineEvent::PlaybackStart,
            EngineEvent::SentenceStart { index: 0 },
        ]
    );
    assert_eq!(output.live_sinks(), 0);
    assert_eq!(output.stopped(), 1);

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.epoch.value(), 1);
    assert!(snapshot.statuses.is_empty());
    assert!(!snapshot.sink_active);
    assert_eq!(engine.stats().interrupts, 1);
}

#[tokio::test(start_paused = true)]
async fn next_turn_after_interrupt_is_independent() {
    let service = ScriptedService::new();
    let output = MockOutput::new();
    let (engine, mut events) = engine(&service, &output);

    engine.enqueue("Old news.").unwrap();
    engine.enqueue("More old news.").unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    engine.interrupt().unwrap();
    drain_events(&mut events);

    engine.enqueue("Fresh start.").unwrap();
    engine.flush().unwrap();
    let seen = until_end(&mut events).await;
    assert_eq!(
        seen,
        vec![
            EngineEvent::PlaybackStart,
            EngineEvent::SentenceStart { index: 0 },
            EngineEvent::PlaybackEnd,
        ]
    );
    assert_eq!(output.opened().last().map(String::as_str), Some("Fresh start."));
}

#[tokio::test(start_paused = true)]
async fn interrupt_cancels_in_flight_synthesis() {
    let service = ScriptedService::new();
    for text in ["a.", "b.", "c.", "d."] {
        service.with_latency(text, Duration::from_secs(10));
    }
    let output = MockOutput::new();
    let (engine, mut events) = engine(&service, &output);

    for text in ["a.", "b.", "c.", "d."] {
        engine.enqueue(text).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.call_count(), 3);

    engine.interrupt().unwrap();
    settle().await;
    // Aborted well before the 10s latency elapsed.
    assert_eq!(service.in_flight(), 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    // The fourth sentence was never requested.
    assert_eq!(service.call_count(), 3);
    assert!(drain_events(&mut events).is_empty());
    assert!(output.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_results_never_reach_the_new_session() {
    let service = ScriptedService::new();
    service.with_latency("Stale.", Duration::from_millis(300));
    service.with_latency("Current.", Duration::from_millis(500));
    let output = MockOutput::new();
    let (engine, mut events) = engine(&service, &output);

    engine.enqueue("Stale.").unwrap();
    settle().await;
    engine.interrupt().unwrap();
    engine.enqueue("Current.").unwrap();
    engine.flush().unwrap();

    let seen = until_end(&mut events).await;
    assert_eq!(sentence_starts(&seen), vec![0]);
    assert_eq!(output.opened(), vec!["Current."]);
}

#[tokio::test(start_paused = true)]
async fn late_playback_end_from_old_session_is_ignored() {
    let service = ScriptedService::new();
    let output = MockOutput::new();
    output.play_time("Old.", Duration::from_millis(1000));
    output.play_time("Fresh.", Duration::from_millis(1000));
    // Old's sink still reports its natural end (at ~1050ms) after being stopped.
    output.finish_after_stop("Old.");
    let (engine, mut events) = engine(&service, &output);

    engine.enqueue("Old.").unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    engine.interrupt().unwrap();
    drain_events(&mut events);

    // Fresh. takes index 0 of the new session and plays from ~130ms to ~1130ms.
    engine.enqueue("Fresh.").unwrap();
    engine.flush().unwrap();
    tokio::time::sleep(Duration::from_millis(1020)).await;

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.statuses, vec![ItemStatus::Playing]);
    assert!(snapshot.sink_active);
    assert_eq!(
        drain_events(&mut events),
        vec![
            EngineEvent::PlaybackStart,
            EngineEvent::SentenceStart { index: 0 },
        ]
    );
    assert_eq!(engine.stats().sentences_played, 0);

    assert_eq!(until_end(&mut events).await, vec![EngineEvent::PlaybackEnd]);
    assert_eq!(engine.stats().sentences_played, 1);
    assert_eq!(output.opened(), vec!["Old.", "Fresh."]);
}

#[tokio::test(start_paused = true)]
async fn interrupt_when_idle_is_harmless() {
    let service = ScriptedService::new();
    let output = MockOutput::new();
    let (engine, mut events) = engine(&service, &output);

    engine.interrupt().unwrap();
    engine.interrupt().unwrap();
    settle().await;
    assert!(drain_events(&mut events).is_empty());
    assert_eq!(engine.snapshot().await.unwrap().epoch.value(), 2);
}

#[tokio::test(start_paused = true)]
async fn interrupt_keeps_the_cache() {
    let service = ScriptedService::new();
    let output = MockOutput::new();
    let (engine, mut events) = engine(&service, &output);

    engine.enqueue("Keep me.").unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    engine.interrupt().unwrap();
    assert_eq!(engine.snapshot().await.unwrap().cached, 1);

    engine.enqueue("Keep me.").unwrap();
    engine.flush().unwrap();
    until_end(&mut events).await;
    assert_eq!(service.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn destroy_rejects_further_calls() {
    let service = ScriptedService::new();
    let output = MockOutput::new();
    let (engine, mut events) = engine(&service, &output);

    engine.enqueue("Playing now.").unwrap();
    engine.enqueue("Queued.").unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    engine.destroy().await;
    assert!(engine.is_destroyed());
    assert_eq!(output.live_sinks(), 0);

    assert_eq!(engine.enqueue("Too late."), Err(EngineError::Destroyed));
    assert_eq!(engine.flush(), Err(EngineError::Destroyed));
    assert_eq!(engine.interrupt(), Err(EngineError::Destroyed));
    assert_eq!(
        engine.configure(SynthesisParams::default()),
        Err(EngineError::Destroyed)
    );
    assert_eq!(engine.snapshot().await, Err(EngineError::Destroyed));

    // Second destroy is a no-op.
    engine.destroy().await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    let seen = drain_events(&mut events);
    assert!(!seen.contains(&EngineEvent::PlaybackEnd));
    // The driver is gone, so the event channel is closed.
    assert!(events.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn destroy_is_seen_by_every_clone() {
    let service = ScriptedService::new();
    let output = MockOutput::new();
    let (engine, _events) = engine(&service, &output);
    let other = engine.clone();

    engine.destroy().await;
    assert!(other.is_destroyed());
    assert_eq!(other.enqueue("x"), Err(EngineError::Destroyed));
}

#[tokio::test(start_paused = true)]
async fn dropping_last_handle_stops_the_driver() {
    let service = ScriptedService::new();
    let output = MockOutput::new();
    let (engine, mut events) = engine(&service, &output);

    engine.enqueue("Speaking.").unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(output.live_sinks(), 1);

    drop(engine);
    let closed = tokio::time::timeout(Duration::from_secs(1), async {
        while events.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());
    assert_eq!(output.live_sinks(), 0);
}
