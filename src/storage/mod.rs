//! Storage Layer
//!
//! Locations on disk, race catalog loading and the per-session JSONL log.

pub mod races;
pub mod session_log;

pub use races::{load_race_catalog, save_race_catalog};
pub use session_log::SessionLog;

use anyhow::Result;
use std::path::PathBuf;

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "careerautopilot", "CareerAutopilot")
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let proj_dirs = project_dirs().ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    let data_dir = proj_dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = project_dirs().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Directory holding one log file per session
pub fn get_sessions_dir() -> Result<PathBuf> {
    let dir = get_data_dir()?.join("sessions");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
