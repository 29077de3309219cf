use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OmicsError {
    #[error("invalid sample id: {0}")]
    InvalidSampleId(String),

    #[error("missing config file {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("input file not found: {0}")]
    #[diagnostic(help("set the path under \"sources\" in omics-db.json or pass --data-dir"))]
    MissingInput(PathBuf),

    #[error("failed to read {source_name}: {message}")]
    Io {
        source_name: String,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("malformed annotation line {line_number} (expected 6 fields, found {found}): {line}")]
    #[diagnostic(help("set \"annotation_arity\": \"skip\" to skip malformed annotation lines"))]
    MalformedAnnotation {
        line_number: usize,
        found: usize,
        line: String,
    },

    #[error("unknown query: {0} (expected 1-9)")]
    UnknownQuery(u8),
}
