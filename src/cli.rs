//! Command-line interface for talkglobe
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Streaming speech-to-speech translation
#[derive(Parser, Debug)]
#[command(
    name = "talkglobe",
    version,
    about = "Streaming speech-to-speech translation"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: per-utterance events, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a time limit into milliseconds.
///
/// Supports any duration format accepted by `humantime` (`90s`, `2m`,
/// `1m30s`); a bare number is taken as milliseconds.
fn parse_limit_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(ms);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List supported target languages
    Languages {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stream a WAV recording through one session and save each translated utterance
    Replay {
        /// WAV file to replay (16-bit PCM or 32-bit float, mono or stereo)
        input: PathBuf,

        /// Target language code (default: translator.default_language)
        #[arg(long, short = 't', value_name = "CODE")]
        target: Option<String>,

        /// Directory for translated utterances (default: no files written)
        #[arg(long, short = 'o', value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Frame size used to feed the session, in milliseconds
        #[arg(long, value_name = "MS", default_value = "20")]
        frame_ms: u32,

        /// Override the per-job time limit. Examples: 500, 30s, 2m
        #[arg(long, value_name = "DURATION", value_parser = parse_limit_ms)]
        time_limit: Option<u64>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}
