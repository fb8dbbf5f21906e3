use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type DocId = u32;

/// Occurrence statistics of one term within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
    /// Occurrences contributed by title, heading or bold text (weight > 1.0).
    pub important_hits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub doc_id: DocId,
    pub url: String,
    /// Path of the source record relative to the dataset root.
    pub source_path: String,
    pub doc_length: u32,
}

/// One record of a partial index or of the final postings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermPostings {
    pub term: String,
    pub postings: Vec<Posting>,
}

/// Borrowed twin of [`TermPostings`]; encodes to the same bytes.
#[derive(Serialize)]
pub(crate) struct TermPostingsRef<'a> {
    pub term: &'a str,
    pub postings: &'a [Posting],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct M1Analytics {
    pub indexed_documents: u64,
    pub unique_tokens: u64,
    pub index_size_kb: f64,
}

/// Fold one document's stemmed `(token, weight)` stream into per-term postings.
///
/// Returns the postings keyed by term and the document length, which counts
/// every emitted token regardless of weight. An empty stream is a valid,
/// zero-length document.
pub fn build_document_postings(stemmed_tokens: &[(String, f32)], doc_id: DocId) -> (HashMap<String, Posting>, u32) {
    let mut postings: HashMap<String, Posting> = HashMap::new();
    let mut doc_length: u32 = 0;
    for (token, weight) in stemmed_tokens {
        let posting = postings
            .entry(token.clone())
            .or_insert(Posting { doc_id, tf: 0, important_hits: 0 });
        posting.tf += 1;
        if *weight > 1.0 {
            posting.important_hits += 1;
        }
        doc_length += 1;
    }
    (postings, doc_length)
}
