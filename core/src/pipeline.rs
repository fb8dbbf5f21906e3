use std::path::Path;
use tracing::{info, warn};

use crate::accumulator::{effective_flush_threshold, PartialIndexAccumulator};
use crate::analytics::generate_m1_report;
use crate::config::{EngineConfig, RunMode};
use crate::document::{discover_document_files, parse_document_json, RawDocument};
use crate::error::Result;
use crate::index::{build_document_postings, DocId, DocMeta, M1Analytics};
use crate::merge::merge_partial_indexes;
use crate::persist::{prepare_output_layout, IndexPaths};
use crate::tokenizer::WeightedTokenizer;

#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub documents: u32,
    pub skipped: usize,
    pub partials: usize,
    pub terms: u64,
    pub analytics: M1Analytics,
}

/// Run the full build with the default crawl-record parser and HTML tokenizer.
pub fn build_inverted_index(config: &EngineConfig) -> Result<BuildSummary> {
    config.validate()?;
    let tokenizer = WeightedTokenizer::new(config)?;
    build_inverted_index_with(config, parse_document_json, |html| tokenizer.tokenize_html(html))
}

/// Run the full build with injected strategies.
///
/// `parse` loads one record; a failure skips that document with a warning.
/// `extract` maps HTML to stemmed `(token, weight)` pairs.
pub fn build_inverted_index_with<P, E>(config: &EngineConfig, mut parse: P, mut extract: E) -> Result<BuildSummary>
where
    P: FnMut(&Path) -> Result<RawDocument>,
    E: FnMut(&str) -> Vec<(String, f32)>,
{
    config.validate()?;
    let files = discover_document_files(&config.dataset_root)?;
    let paths = IndexPaths::new(&config.output_root);
    prepare_output_layout(&paths)?;

    let threshold = effective_flush_threshold(config, files.len());
    info!(files = files.len(), threshold, mode = ?config.run_mode, "starting index build");
    let mut acc = PartialIndexAccumulator::new(paths.clone(), threshold, config.max_resident_postings)?
        .keep_empty_batches(config.run_mode == RunMode::Developer);

    let mut next_doc_id: DocId = 0;
    let mut skipped = 0usize;
    for file in &files {
        let raw = match parse(file.as_path()) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(path = %file.display(), error = %err, "skipping document");
                skipped += 1;
                continue;
            }
        };
        let stemmed = extract(raw.content.as_str());
        let (postings, doc_length) = build_document_postings(&stemmed, next_doc_id);
        let source_path = file.strip_prefix(&config.dataset_root).unwrap_or(file.as_path()).to_string_lossy().into_owned();
        let meta = DocMeta { doc_id: next_doc_id, url: raw.url, source_path, doc_length };
        acc.add_document(meta, postings)?;
        next_doc_id += 1;
    }

    let ingest = acc.finish()?;
    info!(documents = ingest.documents, skipped, partials = ingest.partials.len(), "ingested documents");

    let merge = merge_partial_indexes(&paths)?;
    let analytics = generate_m1_report(&paths)?;

    info!(output = %paths.root.display(), "index build complete");
    Ok(BuildSummary {
        documents: ingest.documents,
        skipped,
        partials: ingest.partials.len(),
        terms: merge.terms,
        analytics,
    })
}

/// Recompute analytics from the artifacts under `output_root`.
pub fn generate_report<P: AsRef<Path>>(output_root: P) -> Result<M1Analytics> {
    generate_m1_report(&IndexPaths::new(output_root))
}
