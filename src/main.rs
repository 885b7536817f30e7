//! Career Autopilot - turn-by-turn decision engine for career-mode training
//!
//! Reads the game screen through a perception adapter, scores every option
//! of the turn and issues one action at a time until a stop condition hits.

mod analysis;
mod app;
mod career;
mod config;
mod engine;
mod hotkey;
mod shared;
mod storage;
mod vision;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::BotApp;
use crate::career::RaceCatalog;
use crate::config::AppConfig;
use crate::engine::{DryRunDriver, InputExecutor};
use crate::hotkey::StopHotkeys;
use crate::storage::SessionLog;
use crate::vision::{Perception, ScreenPerception, ScriptedPerception};

/// Career Autopilot - automated career-mode training
#[derive(Parser, Debug)]
#[command(name = "career-autopilot")]
#[command(about = "Plays career-mode training turns from screen readings")]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a career session
    Run {
        /// Drive the session from a recorded replay script
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Drive the session from a directory of screenshots
        #[arg(long, conflicts_with = "replay", requires = "layout")]
        screenshots: Option<PathBuf>,

        /// Region layout (JSON) for --screenshots
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Template and glyph images (defaults to the data directory)
        #[arg(long)]
        templates: Option<PathBuf>,

        /// Log actions instead of sending input
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the config file and exit
    CheckConfig,
    /// Write the default configuration
    WriteDefaultConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match args.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };

    let command = args.command.unwrap_or(Command::Run {
        replay: None,
        screenshots: None,
        layout: None,
        templates: None,
        dry_run: false,
    });
    match command {
        Command::Run {
            replay,
            screenshots,
            layout,
            templates,
            dry_run,
        } => {
            let source = match (replay, screenshots, layout) {
                (Some(script), _, _) => Source::Replay(script),
                (None, Some(dir), Some(layout)) => Source::Screenshots { dir, layout, templates },
                _ => {
                    return Err(anyhow!(
                        "No live capture backend is available; pass --replay <script> or --screenshots <dir> --layout <json>"
                    ))
                }
            };
            run(&config_path, source, dry_run)
        }
        Command::CheckConfig => {
            config::load_config(&config_path)?;
            println!("Configuration OK: {}", config_path.display());
            Ok(())
        }
        Command::WriteDefaultConfig { force } => {
            if config_path.exists() && !force {
                return Err(anyhow!("{} already exists (use --force to overwrite)", config_path.display()));
            }
            config::save_config(&AppConfig::default(), &config_path)?;
            println!("Wrote default configuration to {}", config_path.display());
            Ok(())
        }
    }
}

/// Where perception reads come from
enum Source {
    Replay(PathBuf),
    Screenshots {
        dir: PathBuf,
        layout: PathBuf,
        templates: Option<PathBuf>,
    },
}

impl Source {
    fn open(self, config: &AppConfig) -> Result<Box<dyn Perception + Send>> {
        match self {
            Source::Replay(script) => Ok(Box::new(ScriptedPerception::load(&script)?)),
            Source::Screenshots { dir, layout, templates } => {
                let templates = match templates {
                    Some(path) => path,
                    None => storage::get_data_dir()?.join("templates"),
                };
                info!("Reading screenshots from {:?} with templates from {:?}", dir, templates);
                Ok(Box::new(ScreenPerception::from_screenshots(
                    &dir,
                    &layout,
                    &templates,
                    &config.perception,
                )?))
            }
        }
    }
}

/// Load configuration from file or fall back to defaults when none exists
fn load_or_default_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    } else {
        info!("No configuration at {:?}, using defaults", path);
        Ok(AppConfig::default())
    }
}

/// Race catalog from the configured path, else the data directory copy
fn load_catalog(config: &AppConfig) -> Result<RaceCatalog> {
    if let Some(path) = &config.general.race_catalog {
        return storage::load_race_catalog(path);
    }
    let default_path = storage::get_data_dir()?.join("races.json");
    if default_path.exists() {
        storage::load_race_catalog(&default_path)
    } else {
        warn!("No race catalog found, racing is disabled");
        Ok(RaceCatalog::default())
    }
}

fn run(config_path: &Path, source: Source, dry_run: bool) -> Result<()> {
    info!("Career Autopilot starting...");

    // An invalid config aborts here, before anything runs
    let mut config = load_or_default_config(config_path)?;
    config.general.dry_run |= dry_run;
    let catalog = load_catalog(&config)?;

    let perception = source.open(&config)?;
    if !config.general.dry_run {
        warn!("No input backend is available; actions are logged only");
    }

    let mut app = BotApp::new(config.clone(), catalog);
    let events = app.subscribe();
    let executor = InputExecutor::new(DryRunDriver::new(), app.cancel_token());
    let session = app.start(perception, executor)?;

    let log_writer = match storage::get_sessions_dir().and_then(|dir| SessionLog::create(&dir, session)) {
        Ok(log) => {
            info!("Writing session log to {:?}", log.path());
            Some(log.spawn_writer(events))
        }
        Err(e) => {
            warn!("Session log disabled: {}", e);
            None
        }
    };

    let hotkeys = if config.hotkeys.enabled {
        match StopHotkeys::register(&config.hotkeys) {
            Ok(hotkeys) => Some(hotkeys),
            Err(e) => {
                warn!("Hotkeys unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    while !app.is_finished() {
        if let Some(signal) = hotkeys.as_ref().and_then(|h| h.poll()) {
            app.signal(signal);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    let report = app.join()?;
    drop(app);

    if let Some(writer) = log_writer {
        match writer.join() {
            Ok(Ok(count)) => info!("Session log complete ({} events)", count),
            Ok(Err(e)) => warn!("Session log failed: {}", e),
            Err(_) => warn!("Session log writer panicked"),
        }
    }

    let reason = report
        .stop_reason
        .as_ref()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "no reason recorded".to_string());
    println!("Session {} stopped after {} turns: {}", report.session, report.turns, reason);

    if report.is_failure() {
        if let Some(snapshot) = &report.last_snapshot {
            let summary = serde_json::to_string(&snapshot.summary()).context("Failed to encode snapshot")?;
            error!("Last snapshot: {}", summary);
        }
        return Err(anyhow!("Run failed: {}", reason));
    }
    Ok(())
}
