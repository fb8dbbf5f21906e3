use std::collections::HashMap;
use std::mem;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, RunMode};
use crate::error::{IndexError, Result};
use crate::index::{DocId, DocMeta, Posting};
use crate::persist::{write_partial_index, IndexPaths, JsonlWriter};

/// Batch size used for this run.
///
/// Developer mode shrinks the batch up front so that `total_docs` documents
/// produce at least `min_partial_flushes` partial files: the largest `t` not
/// above `partial_flush_docs` with `ceil(total_docs / t) >= min_partial_flushes`.
pub fn effective_flush_threshold(config: &EngineConfig, total_docs: usize) -> usize {
    let base = config.partial_flush_docs.max(1);
    if config.run_mode != RunMode::Developer || config.min_partial_flushes <= 1 || total_docs == 0 {
        return base;
    }
    let fit = (total_docs - 1) / (config.min_partial_flushes - 1);
    base.min(fit.max(1))
}

type PartialWriter = fn(&IndexPaths, u32, &[(&String, &Vec<Posting>)]) -> Result<PathBuf>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    Accumulating,
    Flushing,
    Done,
}

/// Outcome of a finished accumulation phase.
#[derive(Debug, Clone, Default)]
pub struct AccumulatorSummary {
    pub documents: u32,
    pub partials: Vec<PathBuf>,
}

/// Holds term -> postings for the current batch of documents and spills it
/// to a sorted partial index when the batch is full.
pub struct PartialIndexAccumulator {
    paths: IndexPaths,
    flush_threshold: usize,
    max_resident_postings: Option<usize>,
    postings: HashMap<String, Vec<Posting>>,
    resident_postings: usize,
    pending_docs: Vec<DocMeta>,
    docs_since_flush: usize,
    next_doc_id: DocId,
    next_partial_id: u32,
    partials: Vec<PathBuf>,
    doc_table: JsonlWriter,
    state: AccumulatorState,
    keep_empty_batches: bool,
    write_partial: PartialWriter,
}

impl PartialIndexAccumulator {
    pub fn new(paths: IndexPaths, flush_threshold: usize, max_resident_postings: Option<usize>) -> Result<Self> {
        if flush_threshold == 0 {
            return Err(IndexError::Config("flush threshold must be greater than zero".into()));
        }
        let doc_table = JsonlWriter::append_to(paths.doc_table())?;
        Ok(Self {
            paths,
            flush_threshold,
            max_resident_postings,
            postings: HashMap::new(),
            resident_postings: 0,
            pending_docs: Vec::new(),
            docs_since_flush: 0,
            next_doc_id: 0,
            next_partial_id: 0,
            partials: Vec::new(),
            doc_table,
            state: AccumulatorState::Accumulating,
            keep_empty_batches: false,
            write_partial: write_partial_index,
        })
    }

    /// Write a zero-record partial for a batch whose documents produced no
    /// terms, so every batch counts toward the partial file total.
    pub fn keep_empty_batches(mut self, keep: bool) -> Self {
        self.keep_empty_batches = keep;
        self
    }

    #[cfg(test)]
    fn with_partial_writer(mut self, writer: PartialWriter) -> Self {
        self.write_partial = writer;
        self
    }

    pub fn state(&self) -> AccumulatorState { self.state }

    pub fn flush_threshold(&self) -> usize { self.flush_threshold }

    pub fn resident_postings(&self) -> usize { self.resident_postings }

    pub fn partials(&self) -> &[PathBuf] { &self.partials }

    /// Fold one document in. Returns the partial file written if this document
    /// filled the batch.
    pub fn add_document(&mut self, meta: DocMeta, term_postings: HashMap<String, Posting>) -> Result<Option<PathBuf>> {
        if self.state != AccumulatorState::Accumulating {
            return Err(IndexError::Config("accumulator no longer accepts documents".into()));
        }
        if meta.doc_id != self.next_doc_id {
            return Err(IndexError::DocSequence { expected: self.next_doc_id, got: meta.doc_id });
        }
        for (term, posting) in term_postings {
            if posting.doc_id != meta.doc_id {
                return Err(IndexError::DocSequence { expected: meta.doc_id, got: posting.doc_id });
            }
            if let Some(last) = self.postings.get(&term).and_then(|list| list.last()) {
                if last.doc_id >= posting.doc_id {
                    return Err(IndexError::DuplicatePosting {
                        term,
                        doc_id: posting.doc_id,
                        context: format!("partial {}", self.next_partial_id),
                    });
                }
            }
            let list = self.postings.entry(term).or_default();
            list.push(posting);
            self.resident_postings += 1;
        }
        self.pending_docs.push(meta);
        self.next_doc_id += 1;
        self.docs_since_flush += 1;

        let over_memory = self.max_resident_postings.map_or(false, |cap| self.resident_postings >= cap);
        if self.docs_since_flush >= self.flush_threshold || over_memory {
            if over_memory {
                debug!(resident = self.resident_postings, "memory cap reached, flushing early");
            }
            return self.flush();
        }
        Ok(None)
    }

    /// Write the current batch as one partial index and append its doc rows.
    /// A batch without terms writes no partial file unless empty batches are kept.
    pub fn flush(&mut self) -> Result<Option<PathBuf>> {
        self.state = AccumulatorState::Flushing;
        let has_batch = !self.postings.is_empty() || (self.keep_empty_batches && !self.pending_docs.is_empty());
        let written = if has_batch { Some(self.write_partial_with_retry()?) } else { None };

        for row in self.pending_docs.drain(..) {
            self.doc_table.append(&row)?;
        }
        self.doc_table.flush()?;

        if let Some(path) = &written {
            info!(
                partial_id = self.next_partial_id,
                documents = self.docs_since_flush,
                terms = self.postings.len(),
                postings = self.resident_postings,
                path = %path.display(),
                "flushed partial index"
            );
            self.next_partial_id += 1;
            self.partials.push(path.clone());
        }
        self.postings.clear();
        self.resident_postings = 0;
        self.docs_since_flush = 0;
        self.state = AccumulatorState::Accumulating;
        Ok(written)
    }

    fn write_partial_with_retry(&self) -> Result<PathBuf> {
        let mut sorted: Vec<(&String, &Vec<Posting>)> = self.postings.iter().collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));
        match (self.write_partial)(&self.paths, self.next_partial_id, &sorted) {
            Ok(path) => Ok(path),
            Err(err) => {
                warn!(partial_id = self.next_partial_id, error = %err, "partial flush failed, retrying once");
                (self.write_partial)(&self.paths, self.next_partial_id, &sorted)
            }
        }
    }

    /// Force the last flush and close the doc table.
    pub fn finish(mut self) -> Result<AccumulatorSummary> {
        if !self.postings.is_empty() || !self.pending_docs.is_empty() {
            self.flush()?;
        }
        self.state = AccumulatorState::Done;
        let documents = self.next_doc_id;
        let partials = mem::take(&mut self.partials);
        self.doc_table.finish()?;
        info!(documents, partials = partials.len(), "accumulation complete");
        Ok(AccumulatorSummary { documents, partials })
    }
}
