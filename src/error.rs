//! Error taxonomy for the pipeline.
//!
//! Only conditions that abort a document or a run surface as `Error`.
//! Recoverable input defects (missing title, orphan notes, chapter
//! numbering anomalies) are logged and processing continues.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A structure node's computed range is impossible. Fatal for the
    /// document; no partial graph is emitted.
    #[error("invalid document structure: {0}")]
    InvalidStructure(String),

    #[error("failed to read ontology resource {path}: {source}")]
    OntologyIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed ontology resource {path}: {source}")]
    OntologyFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The classifier rejected our credentials. Retrying cannot help, so
    /// the whole run is aborted.
    #[error("classifier rejected credentials (HTTP {status})")]
    ClassifierAuth { status: u16 },

    #[error("failed to initialize classifier transport: {0}")]
    Transport(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("graph construction cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
