use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};

/// Project flavor. Developer mode enforces the minimum number of partial flushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Analyst,
    Developer,
}

/// Runtime settings for index construction, passed explicitly to each component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub dataset_root: PathBuf,
    pub output_root: PathBuf,
    pub run_mode: RunMode,
    /// Documents folded into memory before a partial index is flushed.
    pub partial_flush_docs: usize,
    /// Minimum partial files a developer-mode run must produce.
    pub min_partial_flushes: usize,
    /// Secondary flush trigger: resident postings held in memory.
    pub max_resident_postings: Option<usize>,
    pub token_regex: String,
    pub title_boost: f32,
    pub heading_boost: f32,
    pub bold_boost: f32,
}

impl EngineConfig {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(dataset_root: P, output_root: Q, run_mode: RunMode) -> Self {
        Self {
            dataset_root: dataset_root.as_ref().to_path_buf(),
            output_root: output_root.as_ref().to_path_buf(),
            run_mode,
            partial_flush_docs: 1500,
            min_partial_flushes: 3,
            max_resident_postings: None,
            token_regex: r"[A-Za-z0-9]+".to_string(),
            title_boost: 3.0,
            heading_boost: 2.0,
            bold_boost: 1.5,
        }
    }

    /// Reject invalid thresholds before the build touches the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.partial_flush_docs == 0 {
            return Err(IndexError::Config("partial_flush_docs must be greater than zero".into()));
        }
        if self.min_partial_flushes == 0 {
            return Err(IndexError::Config("min_partial_flushes must be greater than zero".into()));
        }
        if self.max_resident_postings == Some(0) {
            return Err(IndexError::Config("max_resident_postings must be greater than zero when set".into()));
        }
        for (name, boost) in [
            ("title_boost", self.title_boost),
            ("heading_boost", self.heading_boost),
            ("bold_boost", self.bold_boost),
        ] {
            if !boost.is_finite() || boost <= 0.0 {
                return Err(IndexError::Config(format!("{name} must be a positive number, got {boost}")));
            }
        }
        if self.token_regex.is_empty() {
            return Err(IndexError::Config("token_regex must not be empty".into()));
        }
        Regex::new(&self.token_regex)
            .map_err(|e| IndexError::Config(format!("invalid token_regex {:?}: {e}", self.token_regex)))?;
        Ok(())
    }
}
