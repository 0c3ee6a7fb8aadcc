//! Run configuration — one immutable object consumed at run start.
//!
//! Defaults come from the environment (`COUNSEL_*` variables); an
//! optional `counsel.toml` overlay can override individual fields. Core
//! components never read the environment themselves.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use evidence::RetrievalFilters;

/// Retrieval backend endpoint (RAGFlow-style retrieval API).
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalEndpoint {
    pub url: String,
    pub api_key: Option<String>,
    /// Knowledge-base ids to search within.
    #[serde(default)]
    pub dataset_ids: Vec<String>,
}

/// Completion backend endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionEndpoint {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Top-level research configuration.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub retrieval: RetrievalEndpoint,
    pub completion: CompletionEndpoint,
    /// Refinement iterations after the first attempt (default 2, i.e.
    /// 3 total attempts).
    pub max_refinement_iterations: u32,
    /// Retry attempts for transient backend failures (default 3).
    pub max_backoff_attempts: u32,
    pub request_timeout_secs: u64,
    /// Validity reference date. `None` means "today" at run start.
    pub as_of_date: Option<NaiveDate>,
    /// Base retrieval filters the planner hands every facet on the
    /// first pass.
    pub base_filters: RetrievalFilters,
    /// Append-only audit log destination.
    pub audit_path: PathBuf,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        let dataset_ids = std::env::var("COUNSEL_DATASET_IDS")
            .map(|ids| {
                ids.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            retrieval: RetrievalEndpoint {
                url: std::env::var("COUNSEL_RETRIEVAL_URL")
                    .unwrap_or_else(|_| "http://localhost:9380".into()),
                api_key: std::env::var("COUNSEL_RETRIEVAL_API_KEY").ok(),
                dataset_ids,
            },
            completion: CompletionEndpoint {
                url: std::env::var("COUNSEL_COMPLETION_URL")
                    .unwrap_or_else(|_| "http://localhost:8080/v1".into()),
                api_key: std::env::var("COUNSEL_COMPLETION_API_KEY").ok(),
                model: std::env::var("COUNSEL_COMPLETION_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".into()),
            },
            max_refinement_iterations: 2,
            max_backoff_attempts: 3,
            request_timeout_secs: 30,
            as_of_date: None,
            base_filters: RetrievalFilters::default(),
            audit_path: PathBuf::from("counsel-audit.jsonl"),
        }
    }
}

/// Optional `counsel.toml` overlay — only the fields present override
/// the environment-derived defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    retrieval: Option<RetrievalEndpoint>,
    completion: Option<CompletionEndpoint>,
    max_refinement_iterations: Option<u32>,
    max_backoff_attempts: Option<u32>,
    request_timeout_secs: Option<u64>,
    as_of_date: Option<NaiveDate>,
    audit_path: Option<PathBuf>,
}

impl ResearchConfig {
    /// Environment defaults plus an optional toml overlay file.
    pub fn load(overlay_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        let Some(path) = overlay_path else {
            return Ok(config);
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config overlay {}", path.display()))?;
        let overlay: ConfigOverlay = toml::from_str(&raw)
            .with_context(|| format!("parsing config overlay {}", path.display()))?;

        if let Some(retrieval) = overlay.retrieval {
            config.retrieval = retrieval;
        }
        if let Some(completion) = overlay.completion {
            config.completion = completion;
        }
        if let Some(v) = overlay.max_refinement_iterations {
            config.max_refinement_iterations = v;
        }
        if let Some(v) = overlay.max_backoff_attempts {
            config.max_backoff_attempts = v;
        }
        if let Some(v) = overlay.request_timeout_secs {
            config.request_timeout_secs = v;
        }
        if let Some(v) = overlay.as_of_date {
            config.as_of_date = Some(v);
        }
        if let Some(v) = overlay.audit_path {
            config.audit_path = v;
        }
        Ok(config)
    }

    /// The validity reference date for a run starting now.
    pub fn as_of(&self) -> NaiveDate {
        self.as_of_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Base filters with the configured dataset ids attached.
    pub fn filters(&self) -> RetrievalFilters {
        let mut filters = self.base_filters.clone();
        filters.dataset_ids = self.retrieval.dataset_ids.clone();
        filters
    }
}
