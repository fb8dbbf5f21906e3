pub mod accumulator;
pub mod analytics;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod merge;
pub mod persist;
pub mod pipeline;
pub mod tokenizer;

pub use config::{EngineConfig, RunMode};
pub use error::{IndexError, Result};
pub use index::{build_document_postings, DocId, DocMeta, M1Analytics, Posting, TermPostings};
