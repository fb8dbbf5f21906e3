use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::DocId;

/// Failures raised while building or reading an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Invalid thresholds or options, rejected before any I/O happens.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single input document could not be read or parsed. The build skips it.
    #[error("malformed document {path}: {reason}")]
    MalformedDocument { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A framed record that is truncated or fails to decode.
    #[error("corrupt record in {path} at byte {offset}: {reason}")]
    CorruptRecord { path: PathBuf, offset: u64, reason: String },

    #[error("terms out of order in {path} at byte {offset}: {previous:?} followed by {term:?}")]
    TermOrder {
        path: PathBuf,
        offset: u64,
        previous: String,
        term: String,
    },

    #[error("duplicate posting for term {term:?} and doc {doc_id} ({context})")]
    DuplicatePosting {
        term: String,
        doc_id: DocId,
        context: String,
    },

    #[error("doc ids out of order for term {term:?}: {previous} followed by {doc_id} ({context})")]
    DocOrder {
        term: String,
        previous: DocId,
        doc_id: DocId,
        context: String,
    },

    #[error("doc id {got} out of sequence, expected {expected}")]
    DocSequence { expected: DocId, got: DocId },

    #[error("missing artifact {0}")]
    MissingArtifact(PathBuf),

    #[error("record of {len} bytes is too large for {path}")]
    RecordTooLarge { path: PathBuf, len: usize },

    #[error("serialization error in {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Attach the file a raw `io::Error` came from.
pub(crate) trait IoContext<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|source| IndexError::Io { path: path.to_path_buf(), source })
    }
}
