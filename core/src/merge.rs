//! K-way merge of term-sorted partial indexes into the final postings file
//! and its byte-offset lexicon.
//!
//! At any time the merge holds one decoded record per partial file plus the
//! posting list of the term being written.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{IndexError, Result};
use crate::index::{Posting, TermPostings, TermPostingsRef};
use crate::persist::{list_partial_indexes, IndexPaths, JsonlWriter, LexiconEntry, RecordReader, RecordWriter};

/// Read position inside one partial file. Validates ordering as it goes.
struct PartialCursor {
    reader: RecordReader,
    current: Option<(u64, TermPostings)>,
}

impl PartialCursor {
    fn open(path: &Path) -> Result<Self> {
        Ok(Self { reader: RecordReader::open(path)?, current: None })
    }

    /// Load the next record and return its term.
    fn advance(&mut self) -> Result<Option<String>> {
        let previous = self.current.take();
        let Some((offset, record)) = self.reader.next_record::<TermPostings>()? else {
            return Ok(None);
        };
        if let Some((_, prev)) = &previous {
            if prev.term >= record.term {
                return Err(IndexError::TermOrder {
                    path: self.reader.path().to_path_buf(),
                    offset,
                    previous: prev.term.clone(),
                    term: record.term,
                });
            }
        }
        check_doc_order(&record.term, &record.postings, || {
            format!("{} at byte {offset}", self.reader.path().display())
        })?;
        let term = record.term.clone();
        self.current = Some((offset, record));
        Ok(Some(term))
    }

    fn take_postings(&mut self) -> Vec<Posting> {
        self.current.as_mut().map(|(_, rec)| std::mem::take(&mut rec.postings)).unwrap_or_default()
    }
}

fn check_doc_order<F: Fn() -> String>(term: &str, postings: &[Posting], context: F) -> Result<()> {
    for pair in postings.windows(2) {
        let (prev, next) = (pair[0].doc_id, pair[1].doc_id);
        if prev == next {
            return Err(IndexError::DuplicatePosting { term: term.to_string(), doc_id: next, context: context() });
        }
        if prev > next {
            return Err(IndexError::DocOrder { term: term.to_string(), previous: prev, doc_id: next, context: context() });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub partials: usize,
    pub terms: u64,
    pub postings: u64,
    pub postings_bytes: u64,
}

/// Merge every partial under `paths` into `final/index.postings` and
/// `final/index.lexicon`.
pub fn merge_partial_indexes(paths: &IndexPaths) -> Result<MergeSummary> {
    let partials = list_partial_indexes(paths)?;
    merge_files(&partials, &paths.postings(), &paths.lexicon())
}

/// Merge `partials` (given in sequence order) into the named output files.
///
/// Postings for a term are concatenated in partial order and never re-sorted.
/// On error, whatever was already written stays on disk for inspection.
pub fn merge_files(partials: &[PathBuf], postings_path: &Path, lexicon_path: &Path) -> Result<MergeSummary> {
    let mut cursors = partials.iter().map(|p| PartialCursor::open(p)).collect::<Result<Vec<_>>>()?;
    let mut heap: BinaryHeap<Reverse<(String, usize)>> = BinaryHeap::with_capacity(cursors.len());
    for (idx, cursor) in cursors.iter_mut().enumerate() {
        if let Some(term) = cursor.advance()? {
            heap.push(Reverse((term, idx)));
        }
    }

    let mut postings_out = RecordWriter::create(postings_path)?;
    let mut lexicon_out = JsonlWriter::create(lexicon_path)?;
    let mut summary = MergeSummary { partials: partials.len(), ..Default::default() };
    let mut group: Vec<usize> = Vec::with_capacity(cursors.len());
    let mut merged: Vec<Posting> = Vec::new();

    while let Some(Reverse((term, first))) = heap.pop() {
        // Ties on the term pop in ascending partial index.
        group.clear();
        group.push(first);
        while heap.peek().map_or(false, |Reverse((t, _))| *t == term) {
            if let Some(Reverse((_, idx))) = heap.pop() {
                group.push(idx);
            }
        }

        merged.clear();
        for &idx in &group {
            let part = cursors[idx].take_postings();
            if let (Some(last), Some(next)) = (merged.last(), part.first()) {
                if last.doc_id >= next.doc_id {
                    let context = format!("merging {}", partials[idx].display());
                    return Err(if last.doc_id == next.doc_id {
                        IndexError::DuplicatePosting { term, doc_id: next.doc_id, context }
                    } else {
                        IndexError::DocOrder { term, previous: last.doc_id, doc_id: next.doc_id, context }
                    });
                }
            }
            merged.extend(part);
        }

        let offset = postings_out.append(&TermPostingsRef { term: &term, postings: &merged })?;
        lexicon_out.append(&LexiconEntry { term, offset })?;
        summary.terms += 1;
        summary.postings += merged.len() as u64;

        for &idx in &group {
            if let Some(next_term) = cursors[idx].advance()? {
                heap.push(Reverse((next_term, idx)));
            }
        }
    }

    summary.postings_bytes = postings_out.finish()?;
    lexicon_out.finish()?;
    debug!(?summary, "merge output closed");
    info!(partials = summary.partials, terms = summary.terms, postings = summary.postings, "merged partial indexes");
    Ok(summary)
}
