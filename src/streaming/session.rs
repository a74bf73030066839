//! Session manager: one task per connection, ordered output per session.
//!
//! ```text
//!  push_frame ──▶ [inbound mpsc] ──▶ session task ──▶ Segmenter
//!                                        │ utterance
//!                                        ▼
//!                              tokio::spawn(job) ──▶ Pipeline (governed)
//!                                        │ JoinHandle, detection order
//!                                        ▼
//!                                   emitter task ──▶ [outbound mpsc] ──▶ transport
//! ```
//!
//! Jobs start as soon as an utterance is detected and may finish in any
//! order. The emitter awaits their handles in detection order, so each
//! session's output order always matches the order its utterances were
//! spoken.
//!
//! The session task ends once its jobs have finished. The emitter keeps
//! delivering at the receiver's pace and closes the outbound channel after
//! the last translation, so a slow reader never stalls teardown.

use crate::audio::frame::{AudioFrame, Utterance};
use crate::audio::wav::to_pcm16;
use crate::catalog::LanguageCatalog;
use crate::config::{Config, SessionSettings};
use crate::error::{Result, TalkGlobeError};
use crate::streaming::governor::ConcurrencyGovernor;
use crate::streaming::pipeline::UtterancePipeline;
use crate::streaming::segmenter::{SegmenterConfig, UtteranceSegmenter};
use crate::translate::translator::Translator;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

/// Identifies one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Translated speech for one utterance, ready to send back to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedAudio {
    pub session_id: SessionId,
    /// Sequence of the source utterance within its session.
    pub sequence: u64,
    pub sample_rate: u32,
    /// Mono samples in -1.0..=1.0.
    pub samples: Vec<f32>,
}

impl TranslatedAudio {
    /// Converts to 16-bit PCM for transports that carry integer audio.
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples.iter().map(|&s| to_pcm16(s)).collect()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Lifecycle events delivered by the transport layer.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A client connected. Translated audio for it goes to `outbound`.
    Opened {
        session_id: SessionId,
        target_language: String,
        outbound: mpsc::Sender<TranslatedAudio>,
    },
    /// A frame of captured audio arrived.
    Frame {
        session_id: SessionId,
        frame: AudioFrame,
    },
    /// The client picked another target language.
    LanguageChanged {
        session_id: SessionId,
        target_language: String,
    },
    /// The client disconnected.
    Closed { session_id: SessionId },
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub target_language: String,
    /// Jobs spawned and not yet finished, whether queued or running.
    pub active_jobs: usize,
    pub utterances_detected: u64,
    pub utterances_translated: u64,
    pub utterances_failed: u64,
    /// Length of the utterance currently being accumulated.
    pub buffered_ms: u32,
}

/// Final counters reported when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub utterances_detected: u64,
    pub utterances_translated: u64,
    pub utterances_failed: u64,
    /// Jobs dropped because the session was torn down.
    pub utterances_cancelled: u64,
    /// Samples of unfinished speech dropped at the end.
    pub discarded_samples: usize,
}

/// Messages from the manager to a session task.
#[derive(Debug)]
enum SessionInput {
    Frame(AudioFrame),
    SetLanguage(String),
}

/// State a session shares with the manager.
#[derive(Debug)]
struct SessionState {
    id: SessionId,
    target_language: Mutex<String>,
    active_jobs: AtomicUsize,
    detected: AtomicU64,
    translated: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    buffered_ms: AtomicU32,
}

impl SessionState {
    fn new(id: SessionId, target_language: String) -> Self {
        Self {
            id,
            target_language: Mutex::new(target_language),
            active_jobs: AtomicUsize::new(0),
            detected: AtomicU64::new(0),
            translated: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            buffered_ms: AtomicU32::new(0),
        }
    }

    fn target_language(&self) -> String {
        self.target_language
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_target_language(&self, code: &str) {
        *self
            .target_language
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = code.to_string();
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id,
            target_language: self.target_language(),
            active_jobs: self.active_jobs.load(Ordering::SeqCst),
            utterances_detected: self.detected.load(Ordering::SeqCst),
            utterances_translated: self.translated.load(Ordering::SeqCst),
            utterances_failed: self.failed.load(Ordering::SeqCst),
            buffered_ms: self.buffered_ms.load(Ordering::SeqCst),
        }
    }

    fn summary(&self, discarded_samples: usize) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            utterances_detected: self.detected.load(Ordering::SeqCst),
            utterances_translated: self.translated.load(Ordering::SeqCst),
            utterances_failed: self.failed.load(Ordering::SeqCst),
            utterances_cancelled: self.cancelled.load(Ordering::SeqCst),
            discarded_samples,
        }
    }
}

/// The manager's handle on a running session.
struct SessionHandle {
    input: mpsc::Sender<SessionInput>,
    cancel: CancellationToken,
    state: Arc<SessionState>,
    task: JoinHandle<usize>,
}

impl SessionHandle {
    /// Waits for the session task to end and reports its counters.
    async fn join(self) -> SessionSummary {
        let SessionHandle {
            input, state, task, ..
        } = self;
        drop(input);

        let discarded = match task.await {
            Ok(discarded) => discarded,
            Err(e) => {
                tracing::error!(session = %state.id, error = %e, "session task failed");
                0
            }
        };
        state.summary(discarded)
    }
}

/// Owns every live session and routes transport events to them.
pub struct SessionManager {
    pipeline: UtterancePipeline,
    segmenter: SegmenterConfig,
    settings: SessionSettings,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        pipeline: UtterancePipeline,
        segmenter: SegmenterConfig,
        settings: SessionSettings,
    ) -> Self {
        Self {
            pipeline,
            segmenter,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a manager from configuration and the shared translator.
    pub fn from_config(
        config: &Config,
        translator: Arc<dyn Translator>,
        catalog: Arc<LanguageCatalog>,
    ) -> Self {
        Self::new(
            UtterancePipeline::from_config(config, translator, catalog),
            SegmenterConfig::from(&config.segmenter),
            config.session.clone(),
        )
    }

    /// The governor shared by all sessions.
    pub fn governor(&self) -> &Arc<ConcurrencyGovernor> {
        self.pipeline.governor()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Opens a session and returns its id and the receiver for its output.
    pub async fn open_session(
        &self,
        target_language: &str,
    ) -> Result<(SessionId, mpsc::Receiver<TranslatedAudio>)> {
        let session_id = SessionId::new();
        let (outbound, receiver) = mpsc::channel(self.settings.outbound_capacity.max(1));
        self.open_with(session_id, target_language, outbound).await?;
        Ok((session_id, receiver))
    }

    /// Opens a session under a caller-chosen id.
    pub async fn open_with(
        &self,
        session_id: SessionId,
        target_language: &str,
        outbound: mpsc::Sender<TranslatedAudio>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return Err(TalkGlobeError::Other(format!(
                "session {} is already open",
                session_id
            )));
        }

        if !self.pipeline.adapter().catalog().contains(target_language) {
            tracing::warn!(
                session = %session_id,
                language = target_language,
                "session opened with an unsupported target language"
            );
        }

        let (input, inbound) = mpsc::channel(self.settings.inbound_capacity.max(1));
        let cancel = CancellationToken::new();
        let state = Arc::new(SessionState::new(session_id, target_language.to_string()));

        let task = tokio::spawn(run_session(SessionTask {
            state: state.clone(),
            pipeline: self.pipeline.clone(),
            segmenter: UtteranceSegmenter::with_config(self.segmenter),
            language: target_language.to_string(),
            cancel: cancel.clone(),
            inbound,
            outbound,
        }));

        sessions.insert(
            session_id,
            SessionHandle {
                input,
                cancel,
                state,
                task,
            },
        );

        tracing::info!(session = %session_id, language = target_language, "session opened");
        Ok(())
    }

    /// Routes one frame to its session.
    ///
    /// Waits if the session's inbound queue is full.
    pub async fn push_frame(&self, session_id: SessionId, frame: AudioFrame) -> Result<()> {
        let input = self.input_for(session_id).await?;
        input
            .send(SessionInput::Frame(frame))
            .await
            .map_err(|_| TalkGlobeError::SessionTeardown {
                session_id: session_id.to_string(),
            })
    }

    /// Changes the target language for utterances detected from now on.
    pub async fn set_target_language(&self, session_id: SessionId, code: &str) -> Result<()> {
        let (input, state) = {
            let sessions = self.sessions.read().await;
            let handle = sessions
                .get(&session_id)
                .ok_or_else(|| not_found(session_id))?;
            (handle.input.clone(), handle.state.clone())
        };

        if !self.pipeline.adapter().catalog().contains(code) {
            tracing::warn!(session = %session_id, language = code, "switching to an unsupported target language");
        }

        state.set_target_language(code);
        input
            .send(SessionInput::SetLanguage(code.to_string()))
            .await
            .map_err(|_| TalkGlobeError::SessionTeardown {
                session_id: session_id.to_string(),
            })
    }

    /// Returns a snapshot of a session's state.
    pub async fn session_info(&self, session_id: SessionId) -> Result<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)
            .map(|handle| handle.state.info())
            .ok_or_else(|| not_found(session_id))
    }

    /// Tears a session down after a disconnect.
    ///
    /// Cancels its queued and running jobs, drops unfinished speech and any
    /// translations not yet delivered.
    pub async fn close_session(&self, session_id: SessionId) -> Result<SessionSummary> {
        let handle = self.remove(session_id).await?;
        handle.cancel.cancel();
        let summary = handle.join().await;
        tracing::info!(
            session = %session_id,
            translated = summary.utterances_translated,
            cancelled = summary.utterances_cancelled,
            "session closed"
        );
        Ok(summary)
    }

    /// Ends a session's input.
    ///
    /// Frames already sent are still segmented and every detected utterance
    /// is translated before this returns. Translations the receiver has not
    /// taken yet stay queued for it, and the channel closes after the last
    /// one. Unfinished speech at the end is dropped.
    pub async fn finish_session(&self, session_id: SessionId) -> Result<SessionSummary> {
        let handle = self.remove(session_id).await?;
        let summary = handle.join().await;
        tracing::info!(
            session = %session_id,
            translated = summary.utterances_translated,
            failed = summary.utterances_failed,
            "session finished"
        );
        Ok(summary)
    }

    /// Handles one transport event.
    pub async fn dispatch(&self, event: ConnectionEvent) -> Result<()> {
        match event {
            ConnectionEvent::Opened {
                session_id,
                target_language,
                outbound,
            } => self.open_with(session_id, &target_language, outbound).await,
            ConnectionEvent::Frame { session_id, frame } => {
                self.push_frame(session_id, frame).await
            }
            ConnectionEvent::LanguageChanged {
                session_id,
                target_language,
            } => self.set_target_language(session_id, &target_language).await,
            ConnectionEvent::Closed { session_id } => {
                self.close_session(session_id).await.map(|_| ())
            }
        }
    }

    /// Consumes transport events until the channel closes, then shuts down.
    ///
    /// An event that cannot be handled is logged and skipped; it never
    /// affects other sessions.
    pub async fn run(&self, mut events: mpsc::Receiver<ConnectionEvent>) -> Vec<SessionSummary> {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.dispatch(event).await {
                tracing::warn!(error = %e, "dropping connection event");
            }
        }
        self.shutdown().await
    }

    /// Closes every session.
    pub async fn shutdown(&self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, handle)| handle).collect()
        };

        for handle in &handles {
            handle.cancel.cancel();
        }

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.join().await);
        }
        tracing::info!(sessions = summaries.len(), "session manager shut down");
        summaries
    }

    async fn input_for(&self, session_id: SessionId) -> Result<mpsc::Sender<SessionInput>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)
            .map(|handle| handle.input.clone())
            .ok_or_else(|| not_found(session_id))
    }

    async fn remove(&self, session_id: SessionId) -> Result<SessionHandle> {
        self.sessions
            .write()
            .await
            .remove(&session_id)
            .ok_or_else(|| not_found(session_id))
    }
}

fn not_found(session_id: SessionId) -> TalkGlobeError {
    TalkGlobeError::SessionNotFound {
        session_id: session_id.to_string(),
    }
}

/// Everything a session task owns.
struct SessionTask {
    state: Arc<SessionState>,
    pipeline: UtterancePipeline,
    segmenter: UtteranceSegmenter,
    language: String,
    cancel: CancellationToken,
    inbound: mpsc::Receiver<SessionInput>,
    outbound: mpsc::Sender<TranslatedAudio>,
}

type JobHandle = JoinHandle<Option<TranslatedAudio>>;

/// Session loop: segments incoming audio and spawns a job per utterance.
///
/// Returns the number of samples of unfinished speech dropped at the end.
async fn run_session(task: SessionTask) -> usize {
    let SessionTask {
        state,
        pipeline,
        mut segmenter,
        mut language,
        cancel,
        mut inbound,
        outbound,
    } = task;

    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel::<JobHandle>();
    let jobs = TaskTracker::new();
    tokio::spawn(emit_in_order(
        state.clone(),
        jobs_rx,
        outbound,
        cancel.clone(),
    ));

    loop {
        let input = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            input = inbound.recv() => input,
        };

        match input {
            Some(SessionInput::Frame(frame)) => {
                if let Err(e) = frame.validate() {
                    tracing::warn!(session = %state.id, frame = frame.sequence, error = %e, "dropping frame");
                    continue;
                }
                for utterance in segmenter.push(&frame) {
                    state.detected.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(
                        session = %state.id,
                        sequence = utterance.sequence,
                        duration_ms = utterance.duration_ms(),
                        language = %language,
                        "utterance detected"
                    );
                    let job = jobs.spawn(translate_utterance(
                        state.clone(),
                        pipeline.clone(),
                        utterance,
                        language.clone(),
                        cancel.clone(),
                    ));
                    if jobs_tx.send(job).is_err() {
                        tracing::error!(session = %state.id, "emitter stopped unexpectedly");
                    }
                }
                state
                    .buffered_ms
                    .store(segmenter.buffered_ms(), Ordering::SeqCst);
            }
            Some(SessionInput::SetLanguage(code)) => {
                tracing::info!(session = %state.id, from = %language, to = %code, "target language changed");
                language = code;
            }
            None => break,
        }
    }

    let discarded = segmenter.discard_partial();
    state.buffered_ms.store(0, Ordering::SeqCst);
    if discarded > 0 {
        tracing::debug!(session = %state.id, samples = discarded, "dropped unfinished utterance");
    }

    drop(jobs_tx);
    jobs.close();
    jobs.wait().await;
    discarded
}

/// Runs one utterance through the pipeline unless the session is torn down first.
async fn translate_utterance(
    state: Arc<SessionState>,
    pipeline: UtterancePipeline,
    utterance: Utterance,
    language: String,
    cancel: CancellationToken,
) -> Option<TranslatedAudio> {
    let sequence = utterance.sequence;
    state.active_jobs.fetch_add(1, Ordering::SeqCst);

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = pipeline.process(utterance, &language) => Some(result),
    };

    state.active_jobs.fetch_sub(1, Ordering::SeqCst);

    match outcome {
        None => {
            state.cancelled.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(session = %state.id, sequence, "translation cancelled");
            None
        }
        Some(Ok(result)) => {
            state.translated.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                session = %state.id,
                sequence,
                language = %language,
                samples = result.waveform.len(),
                "utterance translated"
            );
            Some(TranslatedAudio {
                session_id: state.id,
                sequence: result.sequence,
                sample_rate: result.waveform.sample_rate,
                samples: result.waveform.samples,
            })
        }
        Some(Err(e)) => {
            state.failed.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(
                session = %state.id,
                sequence,
                language = %language,
                error = %e,
                "utterance dropped"
            );
            None
        }
    }
}

/// Delivers finished jobs strictly in detection order.
async fn emit_in_order(
    state: Arc<SessionState>,
    mut jobs: mpsc::UnboundedReceiver<JobHandle>,
    outbound: mpsc::Sender<TranslatedAudio>,
    cancel: CancellationToken,
) {
    let mut receiver_open = true;

    while let Some(job) = jobs.recv().await {
        let audio = match job.await {
            Ok(Some(audio)) => audio,
            Ok(None) => continue,
            Err(e) => {
                state.failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(session = %state.id, error = %e, "translation job panicked");
                continue;
            }
        };

        if !receiver_open || cancel.is_cancelled() {
            continue;
        }

        let sequence = audio.sequence;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            sent = outbound.send(audio) => {
                if sent.is_err() {
                    receiver_open = false;
                    tracing::debug!(session = %state.id, sequence, "output receiver gone, discarding translations");
                }
            }
        }
    }
}
