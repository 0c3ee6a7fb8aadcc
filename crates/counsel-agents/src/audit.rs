//! Append-only audit log — one JSON line per loop event.
//!
//! Records enough of each iteration (plan, pack summaries, draft,
//! verdict) that a run can be replayed offline and every assertion in a
//! report traced back to the evidence it stood on.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use evidence::{CriticVerdict, DraftSection, EvidencePack};

use crate::planner::SubQuestion;
use crate::state_machine::RunStatus;

/// A compact per-pack summary — full chunk text stays out of the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackSummary {
    pub sub_question_id: String,
    pub item_ids: Vec<String>,
    pub degraded: bool,
}

impl PackSummary {
    pub fn of(pack: &EvidencePack) -> Self {
        Self {
            sub_question_id: pack.sub_question_id.clone(),
            item_ids: pack.item_ids().into_iter().map(String::from).collect(),
            degraded: pack.degraded,
        }
    }
}

/// Everything recorded for one loop iteration.
///
/// `verdict` is `None` when the iteration aborted before critique
/// (total retrieval outage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub plan: Vec<SubQuestion>,
    pub packs: Vec<PackSummary>,
    pub draft: Vec<DraftSection>,
    pub verdict: Option<CriticVerdict>,
}

/// The closing record of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub question: String,
    pub status: RunStatus,
    pub iterations: u32,
}

/// One audit log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditRecord {
    RunStarted {
        run_id: String,
        question: String,
        as_of_date: chrono::NaiveDate,
        prompt_version: String,
    },
    Iteration(IterationRecord),
    RunFinished(RunSummary),
}

/// Append-only JSONL audit log.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line.
    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening audit log {}", self.path.display()))?;
        let line = serde_json::to_string(record).context("serializing audit record")?;
        writeln!(file, "{line}")
            .with_context(|| format!("appending to audit log {}", self.path.display()))?;
        debug!(path = %self.path.display(), "Appended audit record");
        Ok(())
    }

    /// Read the whole log back, in append order.
    pub fn replay(&self) -> Result<Vec<AuditRecord>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("opening audit log {}", self.path.display()))?;
        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.context("reading audit log line")?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AuditRecord = serde_json::from_str(&line)
                .with_context(|| format!("parsing audit log line {}", idx + 1))?;
            records.push(record);
        }
        Ok(records)
    }
}
