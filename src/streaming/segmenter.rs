//! Reply-on-pause utterance segmenter.
//!
//! Splits a session's continuous audio into utterances with an explicit
//! state machine:
//!
//! ```text
//!            speech                  silence
//!  ┌────────┐ ────▶ ┌──────────────┐ ────▶ ┌────────┐
//!  │ Silent │       │ Accumulating │       │ Paused │──┐ silence < pause_ms
//!  └────────┘ ◀──┐  └──────────────┘ ◀──── └────────┘◀─┘
//!               │                   speech      │
//!               └──────── emit utterance ◀──────┘ silence ≥ pause_ms
//! ```
//!
//! Incoming samples are cut into fixed analysis windows measured from the
//! start of the stream, so the utterances produced do not depend on how the
//! transport splits audio into frames.

use crate::audio::frame::{AudioFormat, AudioFrame, Utterance};
use crate::audio::vad::EnergyVad;
use crate::config::SegmenterSettings;
use crate::defaults;

/// Configuration for the segmenter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterConfig {
    /// RMS level above which a window counts as speech.
    pub speech_threshold: f32,
    /// Trailing silence that ends an utterance (ms).
    pub pause_ms: u32,
    /// Utterances with less speech than this are dropped (ms).
    pub min_speech_ms: u32,
    /// Analysis window length (ms).
    pub window_ms: u32,
    /// Force an utterance out once it grows this long (ms).
    pub max_utterance_ms: Option<u32>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            pause_ms: defaults::PAUSE_DURATION_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            window_ms: defaults::ANALYSIS_WINDOW_MS,
            max_utterance_ms: Some(defaults::MAX_UTTERANCE_MS),
        }
    }
}

impl From<&SegmenterSettings> for SegmenterConfig {
    fn from(settings: &SegmenterSettings) -> Self {
        Self {
            speech_threshold: settings.speech_threshold,
            pause_ms: settings.pause_ms,
            min_speech_ms: settings.min_speech_ms,
            window_ms: settings.window_ms,
            max_utterance_ms: settings.max_utterance_ms,
        }
    }
}

/// Segmenter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// No speech accumulated.
    Silent,
    /// Speech is being buffered.
    Accumulating,
    /// Silence after speech, waiting to see if it reaches the pause threshold.
    Paused,
}

/// Per-session utterance segmenter.
pub struct UtteranceSegmenter {
    config: SegmenterConfig,
    vad: EnergyVad,
    state: SegmenterState,
    /// Format of the stream currently being segmented.
    format: Option<AudioFormat>,
    /// Samples not yet forming a complete analysis window.
    pending: Vec<i16>,
    /// Utterance audio so far, trailing silence excluded.
    buffer: Vec<i16>,
    /// Silence seen since the last speech window.
    trailing: Vec<i16>,
    /// Samples in `buffer` that were classified as speech.
    speech_samples: usize,
    /// Sequence number for the next emitted utterance.
    next_sequence: u64,
}

impl UtteranceSegmenter {
    /// Creates a new segmenter with default configuration.
    pub fn new() -> Self {
        Self::with_config(SegmenterConfig::default())
    }

    /// Creates a new segmenter with custom configuration.
    pub fn with_config(config: SegmenterConfig) -> Self {
        Self {
            config,
            vad: EnergyVad::new(config.speech_threshold),
            state: SegmenterState::Silent,
            format: None,
            pending: Vec::new(),
            buffer: Vec::new(),
            trailing: Vec::new(),
            speech_samples: 0,
            next_sequence: 0,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SegmenterState {
        self.state
    }

    /// Returns the duration of the in-flight utterance in milliseconds.
    pub fn buffered_ms(&self) -> u32 {
        self.format
            .map(|f| f.duration_ms(self.buffer.len()))
            .unwrap_or(0)
    }

    /// Number of utterances emitted so far.
    pub fn utterances_emitted(&self) -> u64 {
        self.next_sequence
    }

    /// Feeds one frame and returns every utterance completed by it.
    pub fn push(&mut self, frame: &AudioFrame) -> Vec<Utterance> {
        if frame.samples.is_empty() {
            return Vec::new();
        }

        match self.format {
            Some(current) if current != frame.format => {
                let dropped = self.discard_partial();
                tracing::debug!(
                    from = ?current,
                    to = ?frame.format,
                    dropped_samples = dropped,
                    "audio format changed, restarting segmentation"
                );
                self.format = Some(frame.format);
            }
            None => self.format = Some(frame.format),
            Some(_) => {}
        }

        let format = frame.format;
        let window_len = self.window_len(format);

        let mut pending = std::mem::take(&mut self.pending);
        pending.extend_from_slice(&frame.samples);

        let mut utterances = Vec::new();
        let mut windows = pending.chunks_exact(window_len);
        for window in windows.by_ref() {
            if let Some(utterance) = self.process_window(window, format) {
                utterances.push(utterance);
            }
        }
        self.pending = windows.remainder().to_vec();

        utterances
    }

    /// Drops any partial utterance without emitting it.
    ///
    /// Used when the connection closes mid-utterance. Returns the number of
    /// buffered utterance samples that were discarded.
    pub fn discard_partial(&mut self) -> usize {
        let discarded = if self.state == SegmenterState::Silent {
            0
        } else {
            self.buffer.len() + self.trailing.len()
        };
        self.buffer.clear();
        self.trailing.clear();
        self.pending.clear();
        self.speech_samples = 0;
        self.state = SegmenterState::Silent;
        discarded
    }

    fn window_len(&self, format: AudioFormat) -> usize {
        let channels = format.channels.max(1) as usize;
        format.samples_for_ms(self.config.window_ms).max(channels)
    }

    fn process_window(&mut self, window: &[i16], format: AudioFormat) -> Option<Utterance> {
        let is_speech = self.vad.is_speech(window);

        match (self.state, is_speech) {
            (SegmenterState::Silent, false) => None,
            (SegmenterState::Silent, true) | (SegmenterState::Accumulating, true) => {
                self.append_speech(window);
                self.state = SegmenterState::Accumulating;
                self.check_max_length(format)
            }
            (SegmenterState::Accumulating, false) => {
                self.trailing.extend_from_slice(window);
                self.state = SegmenterState::Paused;
                self.check_pause(format)
            }
            (SegmenterState::Paused, true) => {
                // The pause was too short: it belongs to the utterance
                self.buffer.append(&mut self.trailing);
                self.append_speech(window);
                self.state = SegmenterState::Accumulating;
                self.check_max_length(format)
            }
            (SegmenterState::Paused, false) => {
                self.trailing.extend_from_slice(window);
                self.check_pause(format)
            }
        }
    }

    fn append_speech(&mut self, window: &[i16]) {
        self.buffer.extend_from_slice(window);
        self.speech_samples += window.len();
    }

    fn check_pause(&mut self, format: AudioFormat) -> Option<Utterance> {
        if format.duration_ms(self.trailing.len()) >= self.config.pause_ms {
            self.emit(format)
        } else {
            None
        }
    }

    fn check_max_length(&mut self, format: AudioFormat) -> Option<Utterance> {
        match self.config.max_utterance_ms {
            Some(max_ms) if format.duration_ms(self.buffer.len()) >= max_ms => self.emit(format),
            _ => None,
        }
    }

    fn emit(&mut self, format: AudioFormat) -> Option<Utterance> {
        let samples = std::mem::take(&mut self.buffer);
        let speech_ms = format.duration_ms(self.speech_samples);
        self.trailing.clear();
        self.speech_samples = 0;
        self.state = SegmenterState::Silent;

        if speech_ms < self.config.min_speech_ms {
            tracing::debug!(
                speech_ms,
                min_speech_ms = self.config.min_speech_ms,
                "dropping utterance with too little speech"
            );
            return None;
        }

        let utterance = Utterance {
            sequence: self.next_sequence,
            samples,
            format,
        };
        self.next_sequence += 1;
        Some(utterance)
    }
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}
