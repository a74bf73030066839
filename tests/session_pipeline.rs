//! End-to-end tests for the session manager with stub translators.
//!
//! Audio is synthesized at 16kHz and fed in 20ms frames. The segmenter is
//! configured with a 200ms pause so each test stays short.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use talkglobe::audio::frame::{AudioFormat, AudioFrame, Utterance, Waveform};
use talkglobe::catalog::LanguageCatalog;
use talkglobe::config::Config;
use talkglobe::error::{Result, TalkGlobeError};
use talkglobe::streaming::pipeline::UtterancePipeline;
use talkglobe::streaming::session::{ConnectionEvent, SessionId, SessionManager, TranslatedAudio};
use talkglobe::translate::translator::{MockTranslator, Translator};
use tokio::sync::mpsc;

const RATE: u32 = 16000;

/// Translator driven by a closure, counting its calls.
struct StubTranslator<F> {
    handler: F,
    calls: AtomicUsize,
}

impl<F> StubTranslator<F>
where
    F: Fn(&Waveform, &str) -> Result<Waveform> + Send + Sync,
{
    fn new(handler: F) -> Self {
        Self {
            handler,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> Translator for StubTranslator<F>
where
    F: Fn(&Waveform, &str) -> Result<Waveform> + Send + Sync,
{
    fn translate(&self, waveform: &Waveform, target_language: &str) -> Result<Waveform> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(waveform, target_language)
    }

    fn model_name(&self) -> &str {
        "stub"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

fn test_config(max_jobs: usize, time_limit_ms: u64) -> Config {
    let mut config = Config::default();
    config.segmenter.pause_ms = 200;
    config.segmenter.min_speech_ms = 100;
    config.segmenter.window_ms = 20;
    config.governor.max_concurrent_jobs = max_jobs;
    config.governor.time_limit_ms = time_limit_ms;
    config
}

fn catalog() -> Arc<LanguageCatalog> {
    Arc::new(
        LanguageCatalog::from_entries([("French", "fra"), ("German", "deu"), ("Spanish", "spa")])
            .unwrap(),
    )
}

fn samples_for(ms: u32) -> usize {
    (RATE * ms / 1000) as usize
}

fn ms_of(waveform: &Waveform) -> u32 {
    (waveform.len() as u64 * 1000 / waveform.sample_rate as u64) as u32
}

/// `ms` of speech followed by enough silence to end the utterance.
fn utterance_audio(ms: u32) -> Vec<i16> {
    let mut samples: Vec<i16> = (0..samples_for(ms))
        .map(|i| {
            let t = i as f32 / RATE as f32;
            (7000.0 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()) as i16
        })
        .collect();
    samples.extend(vec![0i16; samples_for(300)]);
    samples
}

fn frames(samples: &[i16]) -> Vec<AudioFrame> {
    samples
        .chunks(samples_for(20))
        .enumerate()
        .map(|(i, chunk)| AudioFrame::mono(chunk.to_vec(), RATE, i as u64))
        .collect()
}

async fn speak(manager: &SessionManager, session: SessionId, ms: u32) {
    for frame in frames(&utterance_audio(ms)) {
        manager.push_frame(session, frame).await.unwrap();
    }
}

async fn recv(rx: &mut mpsc::Receiver<TranslatedAudio>) -> TranslatedAudio {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for translated audio")
        .expect("output channel closed")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn output_order_matches_detection_order() {
    // The first utterance takes far longer to translate than the later ones
    let translator = Arc::new(StubTranslator::new(|w: &Waveform, _: &str| {
        let delay = if ms_of(w) == 300 { 400 } else { 10 };
        std::thread::sleep(Duration::from_millis(delay));
        Ok(w.clone())
    }));
    let manager = SessionManager::from_config(&test_config(5, 10_000), translator.clone(), catalog());
    let (session, mut rx) = manager.open_session("fra").await.unwrap();

    speak(&manager, session, 300).await;
    speak(&manager, session, 500).await;
    speak(&manager, session, 700).await;

    let outputs = [recv(&mut rx).await, recv(&mut rx).await, recv(&mut rx).await];

    let sequences: Vec<u64> = outputs.iter().map(|a| a.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    let durations: Vec<u64> = outputs.iter().map(|a| a.duration_ms()).collect();
    assert_eq!(durations, vec![300, 500, 700]);
    assert!(outputs.iter().all(|a| a.session_id == session));
    assert!(outputs.iter().all(|a| a.sample_rate == 16000));

    let summary = manager.finish_session(session).await.unwrap();
    assert_eq!(summary.utterances_detected, 3);
    assert_eq!(summary.utterances_translated, 3);
    assert_eq!(translator.calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_jobs_never_exceed_ceiling() {
    let current = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));
    let translator = {
        let current = current.clone();
        let peak = peak.clone();
        Arc::new(StubTranslator::new(move |w: &Waveform, _: &str| {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            current.fetch_sub(1, Ordering::SeqCst);
            Ok(w.clone())
        }))
    };
    let manager = Arc::new(SessionManager::from_config(
        &test_config(2, 10_000),
        translator.clone(),
        catalog(),
    ));

    let mut clients = Vec::new();
    for language in ["fra", "deu", "spa"] {
        let manager = manager.clone();
        clients.push(tokio::spawn(async move {
            let (session, mut rx) = manager.open_session(language).await.unwrap();
            speak(&manager, session, 300).await;
            speak(&manager, session, 400).await;
            let first = recv(&mut rx).await;
            let second = recv(&mut rx).await;
            manager.finish_session(session).await.unwrap();
            (first.sequence, second.sequence)
        }));
    }

    for client in clients {
        assert_eq!(client.await.unwrap(), (0, 1));
    }

    assert_eq!(translator.calls(), 6);
    assert!(peak.load(Ordering::SeqCst) <= 2, "ceiling exceeded");
    assert_eq!(peak.load(Ordering::SeqCst), 2, "jobs should overlap up to the ceiling");
    assert_eq!(manager.governor().available_slots(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn job_over_time_limit_times_out_and_frees_slot() {
    const UNIT_MS: u64 = 50;
    let starts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = starts.clone();
    // 300ms utterances take 61 units, everything else 1 unit; the limit is 60 units
    let translator = Arc::new(StubTranslator::new(move |w: &Waveform, _: &str| {
        recorded.lock().unwrap().push(Instant::now());
        let units = if ms_of(w) == 300 { 61 } else { 1 };
        std::thread::sleep(Duration::from_millis(units * UNIT_MS));
        Ok(w.clone())
    }));
    let manager =
        SessionManager::from_config(&test_config(1, 60 * UNIT_MS), translator.clone(), catalog());
    let (session, mut rx) = manager.open_session("fra").await.unwrap();

    speak(&manager, session, 300).await;
    speak(&manager, session, 500).await;

    // The timed-out utterance produces nothing; the next one still arrives
    let output = recv(&mut rx).await;
    assert_eq!(output.sequence, 1);
    assert_eq!(output.duration_ms(), 500);
    assert_eq!(manager.governor().available_slots(), 1);

    // With a single slot, the second call can only start once the first was abandoned
    let starts = starts.lock().unwrap().clone();
    assert_eq!(starts.len(), 2);
    let gap = starts[1].duration_since(starts[0]);
    assert!(
        gap >= Duration::from_millis(55 * UNIT_MS) && gap < Duration::from_millis(61 * UNIT_MS),
        "slot freed after {:?}",
        gap
    );

    let summary = manager.finish_session(session).await.unwrap();
    assert_eq!(summary.utterances_failed, 1);
    assert_eq!(summary.utterances_translated, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pipeline_reports_timeout_at_the_limit() {
    const UNIT_MS: u64 = 50;
    let translator = Arc::new(StubTranslator::new(|w: &Waveform, _: &str| {
        std::thread::sleep(Duration::from_millis(61 * UNIT_MS));
        Ok(w.clone())
    }));
    let pipeline =
        UtterancePipeline::from_config(&test_config(1, 60 * UNIT_MS), translator, catalog());
    let utterance = Utterance {
        sequence: 0,
        samples: utterance_audio(300),
        format: AudioFormat::mono(RATE),
    };

    let started = Instant::now();
    let result = pipeline.process(utterance, "fra").await;
    let elapsed = started.elapsed();

    match result {
        Err(TalkGlobeError::TranslationTimeout { limit_ms }) => assert_eq!(limit_ms, 60 * UNIT_MS),
        other => panic!("Expected TranslationTimeout, got {:?}", other),
    }
    assert!(elapsed >= Duration::from_millis(60 * UNIT_MS), "gave up early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(61 * UNIT_MS), "waited for the job: {:?}", elapsed);
    assert_eq!(pipeline.governor().available_slots(), 1);
    assert_eq!(pipeline.governor().running_jobs(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn job_within_time_limit_succeeds() {
    const UNIT_MS: u64 = 50;
    let translator = Arc::new(StubTranslator::new(|w: &Waveform, _: &str| {
        std::thread::sleep(Duration::from_millis(30 * UNIT_MS));
        Ok(w.clone())
    }));
    let manager = SessionManager::from_config(&test_config(1, 60 * UNIT_MS), translator, catalog());
    let (session, mut rx) = manager.open_session("deu").await.unwrap();

    speak(&manager, session, 300).await;

    assert_eq!(recv(&mut rx).await.sequence, 0);
    let summary = manager.finish_session(session).await.unwrap();
    assert_eq!(summary.utterances_failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unsupported_language_skips_translator_and_session_continues() {
    let translator = Arc::new(MockTranslator::new("mock"));
    let manager = SessionManager::from_config(&test_config(5, 10_000), translator.clone(), catalog());
    let (session, mut rx) = manager.open_session("fra").await.unwrap();

    manager.set_target_language(session, "xx").await.unwrap();
    speak(&manager, session, 300).await;

    manager.set_target_language(session, "deu").await.unwrap();
    speak(&manager, session, 400).await;

    let output = recv(&mut rx).await;
    assert_eq!(output.sequence, 1);
    assert_eq!(output.duration_ms(), 400);

    let summary = manager.finish_session(session).await.unwrap();
    assert_eq!(summary.utterances_detected, 2);
    assert_eq!(summary.utterances_failed, 1);
    assert_eq!(summary.utterances_translated, 1);
    assert_eq!(translator.calls(), 1, "unsupported language must not reach the model");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn language_change_applies_to_later_utterances() {
    let translator = Arc::new(StubTranslator::new(|w: &Waveform, language: &str| {
        // Encode the language in the output length so it is visible downstream
        let len = if language == "deu" { 1600 } else { 800 };
        Ok(Waveform::new(w.samples[..len].to_vec(), w.sample_rate))
    }));
    let manager = SessionManager::from_config(&test_config(5, 10_000), translator, catalog());
    let (session, mut rx) = manager.open_session("fra").await.unwrap();

    speak(&manager, session, 300).await;
    manager.set_target_language(session, "deu").await.unwrap();
    speak(&manager, session, 300).await;

    assert_eq!(recv(&mut rx).await.samples.len(), 800);
    assert_eq!(recv(&mut rx).await.samples.len(), 1600);
    assert_eq!(
        manager.session_info(session).await.unwrap().target_language,
        "deu"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failure_in_one_session_does_not_affect_another() {
    let translator = Arc::new(MockTranslator::new("mock").with_failure_for("fra"));
    let manager = SessionManager::from_config(&test_config(5, 10_000), translator, catalog());
    let (failing, mut failing_rx) = manager.open_session("fra").await.unwrap();
    let (healthy, mut healthy_rx) = manager.open_session("deu").await.unwrap();

    speak(&manager, failing, 300).await;
    speak(&manager, healthy, 300).await;

    let output = recv(&mut healthy_rx).await;
    assert_eq!(output.session_id, healthy);

    let failing_summary = manager.finish_session(failing).await.unwrap();
    let healthy_summary = manager.finish_session(healthy).await.unwrap();

    assert_eq!(failing_summary.utterances_failed, 1);
    assert_eq!(failing_summary.utterances_translated, 0);
    assert!(failing_rx.recv().await.is_none());
    assert_eq!(healthy_summary.utterances_translated, 1);
    assert_eq!(healthy_summary.utterances_failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn closing_session_cancels_jobs_and_releases_slots() {
    // 300ms utterances block for a long time; others are quick
    let translator = Arc::new(StubTranslator::new(|w: &Waveform, _: &str| {
        let delay = if ms_of(w) == 300 { 1500 } else { 10 };
        std::thread::sleep(Duration::from_millis(delay));
        Ok(w.clone())
    }));
    let manager = SessionManager::from_config(&test_config(1, 10_000), translator, catalog());

    let (doomed, mut doomed_rx) = manager.open_session("fra").await.unwrap();
    speak(&manager, doomed, 300).await;

    let governor = manager.governor().clone();
    wait_until(|| governor.running_jobs() == 1).await;
    assert_eq!(governor.available_slots(), 0);

    let started = Instant::now();
    let summary = manager.close_session(doomed).await.unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(1000),
        "close must not wait for the running job"
    );
    assert_eq!(summary.utterances_cancelled, 1);
    assert_eq!(governor.available_slots(), 1);
    assert!(doomed_rx.recv().await.is_none());

    // The freed slot is usable right away by another session
    let (next, mut next_rx) = manager.open_session("deu").await.unwrap();
    speak(&manager, next, 400).await;
    let output = recv(&mut next_rx).await;
    assert_eq!(output.session_id, next);
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn close_discards_unfinished_speech() {
    let translator = Arc::new(MockTranslator::new("mock"));
    let manager = SessionManager::from_config(&test_config(5, 10_000), translator.clone(), catalog());
    let (session, mut rx) = manager.open_session("fra").await.unwrap();

    // Speech with no closing pause
    let speech: Vec<i16> = utterance_audio(400)[..samples_for(400)].to_vec();
    for frame in frames(&speech) {
        manager.push_frame(session, frame).await.unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.session_info(session).await.unwrap().buffered_ms < 400 {
        assert!(Instant::now() < deadline, "frames were never segmented");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let summary = manager.close_session(session).await.unwrap();

    assert_eq!(summary.utterances_detected, 0);
    assert_eq!(summary.discarded_samples, samples_for(400));
    assert!(rx.recv().await.is_none());
    assert_eq!(translator.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn finish_session_delivers_pending_translations() {
    let translator = Arc::new(MockTranslator::new("mock").with_delay(Duration::from_millis(200)));
    let mut config = test_config(5, 10_000);
    config.session.outbound_capacity = 1;
    let manager = SessionManager::from_config(&config, translator.clone(), catalog());
    let (session, mut rx) = manager.open_session("spa").await.unwrap();

    for _ in 0..3 {
        speak(&manager, session, 300).await;
    }

    // More results than the output channel holds, and nobody reading yet
    let summary = tokio::time::timeout(Duration::from_secs(5), manager.finish_session(session))
        .await
        .expect("finish_session must not wait for the receiver")
        .unwrap();

    assert_eq!(summary.utterances_translated, 3);
    assert_eq!(summary.utterances_cancelled, 0);
    for expected in 0..3 {
        assert_eq!(recv(&mut rx).await.sequence, expected);
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn session_info_tracks_active_jobs() {
    let translator = Arc::new(MockTranslator::new("mock").with_delay(Duration::from_millis(300)));
    let manager = Arc::new(SessionManager::from_config(
        &test_config(5, 10_000),
        translator,
        catalog(),
    ));
    let (session, mut rx) = manager.open_session("fra").await.unwrap();

    speak(&manager, session, 300).await;

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let info = manager.session_info(session).await.unwrap();
        if info.active_jobs == 1 {
            assert_eq!(info.utterances_detected, 1);
            break;
        }
        assert!(Instant::now() < deadline, "job never became active");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    recv(&mut rx).await;
    let info = manager.session_info(session).await.unwrap();
    assert_eq!(info.active_jobs, 0);
    assert_eq!(info.utterances_translated, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_consumes_connection_events() {
    let translator = Arc::new(MockTranslator::new("mock"));
    let manager = Arc::new(SessionManager::from_config(
        &test_config(5, 10_000),
        translator,
        catalog(),
    ));
    let (events_tx, events_rx) = mpsc::channel(64);
    let runner = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run(events_rx).await })
    };

    let session_id = SessionId::new();
    let (outbound, mut rx) = mpsc::channel(4);
    events_tx
        .send(ConnectionEvent::Opened {
            session_id,
            target_language: "fra".to_string(),
            outbound,
        })
        .await
        .unwrap();

    // Events for unknown sessions are skipped without stopping the loop
    events_tx
        .send(ConnectionEvent::Frame {
            session_id: SessionId::new(),
            frame: AudioFrame::mono(vec![0; 320], RATE, 0),
        })
        .await
        .unwrap();

    events_tx
        .send(ConnectionEvent::LanguageChanged {
            session_id,
            target_language: "deu".to_string(),
        })
        .await
        .unwrap();
    for frame in frames(&utterance_audio(300)) {
        events_tx
            .send(ConnectionEvent::Frame { session_id, frame })
            .await
            .unwrap();
    }

    let output = recv(&mut rx).await;
    assert_eq!(output.session_id, session_id);

    events_tx
        .send(ConnectionEvent::Closed { session_id })
        .await
        .unwrap();
    drop(events_tx);

    let remaining = runner.await.unwrap();
    assert!(remaining.is_empty(), "closed session is not shut down twice");
    assert_eq!(manager.session_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalid_frames_are_dropped_without_closing_session() {
    let translator = Arc::new(MockTranslator::new("mock"));
    let manager = SessionManager::from_config(&test_config(5, 10_000), translator, catalog());
    let (session, mut rx) = manager.open_session("fra").await.unwrap();

    manager
        .push_frame(session, AudioFrame::new(vec![1, 2, 3], RATE, 2, 0))
        .await
        .unwrap();
    speak(&manager, session, 300).await;

    assert_eq!(recv(&mut rx).await.sequence, 0);
}

#[tokio::test]
async fn unknown_session_operations_fail() {
    let manager = SessionManager::from_config(
        &Config::default(),
        Arc::new(MockTranslator::new("mock")),
        catalog(),
    );
    let id = SessionId::new();

    assert!(matches!(
        manager.finish_session(id).await,
        Err(TalkGlobeError::SessionNotFound { .. })
    ));
    assert!(matches!(
        manager
            .dispatch(ConnectionEvent::Closed { session_id: id })
            .await,
        Err(TalkGlobeError::SessionNotFound { .. })
    ));
}
