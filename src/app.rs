//! Command implementations behind the `talkglobe` binary.
//!
//! Replay streams a recording through a real [`SessionManager`]:
//! WAV → frames → session → segmenter → governed passthrough → WAV files

use crate::audio::frame::AudioFrame;
use crate::audio::wav::{WavClip, write_wav};
use crate::catalog::LanguageCatalog;
use crate::config::Config;
use crate::error::{Result, TalkGlobeError};
use crate::streaming::session::{SessionManager, SessionSummary, TranslatedAudio};
use crate::translate::translator::PassthroughTranslator;
use std::path::PathBuf;
use std::sync::Arc;

/// Options for `talkglobe replay`.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub input: PathBuf,
    /// Falls back to `translator.default_language`.
    pub target: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub frame_ms: u32,
}

/// One utterance produced by a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedUtterance {
    pub sequence: u64,
    pub duration_ms: u64,
    pub path: Option<PathBuf>,
}

/// Outcome of a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub target_language: String,
    pub input_duration_ms: u32,
    pub utterances: Vec<ReplayedUtterance>,
    pub summary: SessionSummary,
}

/// Stream a WAV file through one session and collect what comes out.
///
/// Silence long enough to end an utterance is appended after the recording,
/// so speech running up to the end of the file is still emitted.
pub async fn run_replay(
    config: &Config,
    catalog: Arc<LanguageCatalog>,
    options: &ReplayOptions,
) -> Result<ReplayReport> {
    let target = options
        .target
        .clone()
        .unwrap_or_else(|| config.translator.default_language.clone());
    if !catalog.contains(&target) {
        return Err(TalkGlobeError::UnsupportedLanguage { code: target });
    }

    let clip = WavClip::open(&options.input)?;
    tracing::info!(
        input = %options.input.display(),
        sample_rate = clip.format.sample_rate,
        channels = clip.format.channels,
        duration_ms = clip.duration_ms(),
        "replaying recording"
    );

    if let Some(dir) = &options.out_dir {
        std::fs::create_dir_all(dir)?;
    }

    let manager = SessionManager::from_config(config, Arc::new(PassthroughTranslator), catalog);
    let (session_id, mut output) = manager.open_session(&target).await?;

    let collector = tokio::spawn(async move {
        let mut received: Vec<TranslatedAudio> = Vec::new();
        while let Some(audio) = output.recv().await {
            received.push(audio);
        }
        received
    });

    let frames = clip.frames(options.frame_ms.max(1));
    let tail_sequence = frames.len() as u64;
    for frame in frames {
        manager.push_frame(session_id, frame).await?;
    }

    let tail_ms = config.segmenter.pause_ms + config.segmenter.window_ms;
    let tail = AudioFrame {
        samples: vec![0; clip.format.samples_for_ms(tail_ms)],
        format: clip.format,
        sequence: tail_sequence,
    };
    manager.push_frame(session_id, tail).await?;

    let summary = manager.finish_session(session_id).await?;
    let received = collector
        .await
        .map_err(|e| TalkGlobeError::Other(format!("output collector failed: {}", e)))?;

    let mut utterances = Vec::with_capacity(received.len());
    for audio in &received {
        let path = match &options.out_dir {
            Some(dir) => {
                let path = dir.join(format!("utterance-{:04}.wav", audio.sequence));
                write_wav(&path, &audio.samples, audio.sample_rate)?;
                Some(path)
            }
            None => None,
        };
        utterances.push(ReplayedUtterance {
            sequence: audio.sequence,
            duration_ms: audio.duration_ms(),
            path,
        });
    }

    Ok(ReplayReport {
        target_language: target,
        input_duration_ms: clip.duration_ms(),
        utterances,
        summary,
    })
}

/// Render the catalog as a table or as JSON.
pub fn format_languages(catalog: &LanguageCatalog, json: bool) -> Result<String> {
    if json {
        let entries: Vec<serde_json::Value> = catalog
            .languages()
            .iter()
            .map(|lang| serde_json::json!({ "name": lang.name, "code": lang.code }))
            .collect();
        return serde_json::to_string_pretty(&entries)
            .map_err(|e| TalkGlobeError::Other(format!("failed to encode languages: {}", e)));
    }

    let width = catalog
        .languages()
        .iter()
        .map(|lang| lang.name.len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for lang in catalog.languages() {
        out.push_str(&format!("{:<width$}  {}\n", lang.name, lang.code, width = width));
    }
    Ok(out)
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "warn,talkglobe=debug",
        (false, _) => "debug",
    }
}
