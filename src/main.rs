use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::sync::Arc;
use talkglobe::app::{ReplayOptions, default_log_filter, format_languages, run_replay};
use talkglobe::catalog::LanguageCatalog;
use talkglobe::cli::{Cli, Commands, ConfigAction};
use talkglobe::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Languages { json } => {
            let config = load_config(cli.config.as_deref())?;
            let catalog = load_catalog(&config)?;
            print!("{}", format_languages(&catalog, json)?);
        }
        Commands::Replay {
            input,
            target,
            out_dir,
            frame_ms,
            time_limit,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(limit_ms) = time_limit {
                config.governor.time_limit_ms = limit_ms;
                config.validate()?;
            }
            let catalog = Arc::new(load_catalog(&config)?);
            let options = ReplayOptions {
                input,
                target,
                out_dir,
                frame_ms,
            };

            let report = run_replay(&config, catalog, &options)
                .await
                .with_context(|| format!("replay of {} failed", options.input.display()))?;

            if !cli.quiet {
                println!(
                    "{} {} utterance(s) from {}ms of audio → {}",
                    "Replayed".green(),
                    report.utterances.len(),
                    report.input_duration_ms,
                    report.target_language
                );
                for utterance in &report.utterances {
                    match &utterance.path {
                        Some(path) => println!(
                            "  {} {:>6}ms  {}",
                            format!("#{}", utterance.sequence).dimmed(),
                            utterance.duration_ms,
                            path.display()
                        ),
                        None => println!(
                            "  {} {:>6}ms",
                            format!("#{}", utterance.sequence).dimmed(),
                            utterance.duration_ms
                        ),
                    }
                }
                let summary = &report.summary;
                if summary.utterances_failed > 0 {
                    println!(
                        "  {} {} utterance(s) failed",
                        "Warning:".yellow(),
                        summary.utterances_failed
                    );
                }
                if summary.discarded_samples > 0 {
                    println!(
                        "  {} {} samples of unfinished speech discarded",
                        "Note:".dimmed(),
                        summary.discarded_samples
                    );
                }
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "talkglobe",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins over `-v`/`-q` when set.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(verbose, quiet)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/talkglobe/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = match (custom_path, Config::default_path()) {
        (Some(path), _) => Config::load(path)?,
        (None, Some(default_path)) => Config::load_or_default(&default_path)?,
        (None, None) => Config::default(),
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn load_catalog(config: &Config) -> Result<LanguageCatalog> {
    let catalog = LanguageCatalog::load_or_builtin(config.languages.catalog.as_deref())
        .context("failed to load language catalog")?;
    Ok(catalog)
}

fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&std::path::Path>,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => match custom_path
            .map(std::path::PathBuf::from)
            .or_else(Config::default_path)
        {
            Some(path) => println!("{}", path.display()),
            None => {
                eprintln!("Error: no configuration directory on this system");
                std::process::exit(1);
            }
        },
    }
    Ok(())
}
