/// HockeyHarvest — Logger
/// JSONL event stream for harvest runs (one file per day)

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    /// Like `log`, but a failed write only warns. Run bookkeeping must not kill a harvest.
    pub fn log_quiet<T: Serialize>(&self, event: &T) {
        if let Err(e) = self.log(event) {
            tracing::warn!("event log write failed: {}", e);
        }
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event types ──────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct RunStateEvent {
    pub ts:     String,
    pub event:  &'static str,   // "RUN_STATE"
    pub run_id: String,
    pub state:  String,
}

#[derive(Serialize, Debug)]
pub struct DomainResultEvent {
    pub ts:           String,
    pub event:        &'static str,   // "DOMAIN_RESULT"
    pub run_id:       String,
    pub domain:       String,
    pub tournaments:  usize,
    pub is_duplicate: bool,
    pub error:        Option<String>,
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCountsEvent {
    pub processed:  usize,
    pub skipped:    usize,
    pub duplicates: usize,
    pub errors:     usize,
}

#[derive(Serialize, Debug)]
pub struct RunSummaryEvent {
    pub ts:          String,
    pub event:       &'static str,   // "RUN_SUMMARY"
    pub run_id:      String,
    pub cancelled:   bool,
    pub elapsed_secs: u64,
    pub domains:     StageCountsEvent,
    pub tournaments: StageCountsEvent,
    pub teams:       StageCountsEvent,
    pub filters:     StageCountsEvent,
    pub players:     StageCountsEvent,
    pub links:       StageCountsEvent,
    pub statistics:  StageCountsEvent,
    pub scan:        StageCountsEvent,
    pub scan_not_found: usize,
}
