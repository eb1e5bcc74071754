//! Error types for the exporter.
//!
//! Every failure aborts the run; nothing here is recovered into partial output.

use std::path::PathBuf;

/// A report file could not be turned into the row model.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("expected root element <testsuite>, found <{0}>")]
    UnexpectedRoot(String),

    #[error("no <testsuite> root element")]
    MissingRoot,

    #[error("attribute '{attribute}' is not a number: '{value}'")]
    InvalidNumber { attribute: String, value: String },
}

/// Writing to or flushing the metrics store failed.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("InfluxDB rejected the write: {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to write points: {0}")]
    Io(#[from] std::io::Error),
}

/// Run-level errors surfaced by the exporter.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No files found for export!")]
    NoData,

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("invalid report path: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to list report files: {0}")]
    Glob(#[from] glob::GlobError),
}

pub type ExportResult<T> = Result<T, ExportError>;
