use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::error::{IndexError, Result};

/// A crawl record as stored on disk. Missing fields decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().map_or(false, |s| s.starts_with('.'))
}

/// Every `*.json` file under `dataset_root`, sorted by path so doc ids are reproducible.
pub fn discover_document_files(dataset_root: &Path) -> Result<Vec<PathBuf>> {
    if !dataset_root.is_dir() {
        return Err(IndexError::Config(format!(
            "dataset root {} is not a directory",
            dataset_root.display()
        )));
    }
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dataset_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "skipping unreadable dataset entry");
                continue;
            }
        };
        let p = entry.path();
        if entry.file_type().is_file() && p.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(p.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Load one crawl record, dropping any `#fragment` from its URL.
pub fn parse_document_json(json_path: &Path) -> Result<RawDocument> {
    let malformed = |reason: String| IndexError::MalformedDocument { path: json_path.to_path_buf(), reason };
    let bytes = fs::read(json_path).map_err(|e| malformed(e.to_string()))?;
    let mut doc: RawDocument = serde_json::from_slice(&bytes).map_err(|e| malformed(e.to_string()))?;
    doc.url = strip_fragment(&doc.url).to_string();
    Ok(doc)
}

pub fn strip_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(i) => &url[..i],
        None => url,
    }
}
