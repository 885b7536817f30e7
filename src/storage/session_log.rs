//! Per-session event log
//!
//! Every event of a run is appended as one JSON line to
//! `<data dir>/sessions/<session id>.jsonl`.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::TurnEvent;

pub struct SessionLog {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl SessionLog {
    /// Open (or append to) the log for `session` inside `dir`
    pub fn create(dir: &Path, session: Uuid) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.jsonl", session));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open session log {}", path.display()))?;
        debug!("Session log at {:?}", path);
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events written through this handle
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn append(&mut self, event: &TurnEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Drain `events` into the log on a background thread until the
    /// sender side hangs up
    pub fn spawn_writer(mut self, events: Receiver<TurnEvent>) -> JoinHandle<Result<usize>> {
        std::thread::spawn(move || {
            for event in events.iter() {
                if let Err(e) = self.append(&event) {
                    warn!("Failed to write session log {:?}: {}", self.path, e);
                    return Err(e);
                }
            }
            Ok(self.written)
        })
    }

    /// Read every event back from a log file
    pub fn read_all(path: &Path) -> Result<Vec<TurnEvent>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session log {}", path.display()))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Malformed session log line"))
            .collect()
    }
}
