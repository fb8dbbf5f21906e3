use std::fs;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::error::{IndexError, IoContext, Result};
use crate::persist::{count_jsonl_rows, save_analytics, AnalyticsFile, IndexPaths};
use crate::M1Analytics;

fn artifact_len(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Err(IndexError::MissingArtifact(path.to_path_buf()));
    }
    Ok(fs::metadata(path).with_path(path)?.len())
}

/// Count documents, unique terms and final index size straight from the artifacts.
pub fn compute_m1_analytics(paths: &IndexPaths) -> Result<M1Analytics> {
    let indexed_documents = count_jsonl_rows(&paths.doc_table())?;
    let unique_tokens = count_jsonl_rows(&paths.lexicon())?;
    let bytes = artifact_len(&paths.postings())? + artifact_len(&paths.lexicon())?;
    Ok(M1Analytics { indexed_documents, unique_tokens, index_size_kb: bytes as f64 / 1024.0 })
}

pub fn render_markdown(analytics: &M1Analytics) -> String {
    format!(
        "| Metric | Value |\n|---|---|\n| Indexed documents | {} |\n| Unique tokens | {} |\n| Index size (KB) | {:.2} |\n",
        analytics.indexed_documents, analytics.unique_tokens, analytics.index_size_kb
    )
}

/// Compute analytics and write `meta/analytics.json` and `meta/analytics.md`.
pub fn generate_m1_report(paths: &IndexPaths) -> Result<M1Analytics> {
    let analytics = compute_m1_analytics(paths)?;
    let generated_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    save_analytics(paths, &AnalyticsFile { analytics: analytics.clone(), generated_at })?;
    let md = paths.analytics_md();
    fs::write(&md, render_markdown(&analytics)).with_path(&md)?;
    info!(
        indexed_documents = analytics.indexed_documents,
        unique_tokens = analytics.unique_tokens,
        index_size_kb = analytics.index_size_kb,
        "report written"
    );
    Ok(analytics)
}
