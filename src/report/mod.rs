//! Report decoders
//!
//! Provides:
//! - Cucumber JSON decoding
//! - Karate (JUnit XML) decoding

pub mod cucumber;
pub mod karate;

pub use cucumber::{ReportRow, StepResult};
pub use karate::TestSuite;

use std::fs;
use std::path::Path;

use crate::config::ReportType;
use crate::error::{DecodeError, ExportError, ExportResult};

/// Decoded content of one report file
#[derive(Debug, Clone)]
pub enum DecodedReport {
    /// Top-level features of a cucumber report
    Cucumber(Vec<ReportRow>),
    Karate(TestSuite),
}

/// Decode raw report bytes according to the report type
pub fn decode(bytes: &[u8], report_type: ReportType) -> Result<DecodedReport, DecodeError> {
    match report_type {
        ReportType::Cucumber => cucumber::decode(bytes).map(DecodedReport::Cucumber),
        ReportType::Karate => karate::decode(bytes).map(DecodedReport::Karate),
    }
}

/// Read a report file and decode it with `decode`, attributing failures to
/// its path.
pub fn decode_file<T, F>(path: &Path, decode: F) -> ExportResult<T>
where
    F: FnOnce(&[u8]) -> Result<T, DecodeError>,
{
    let bytes = fs::read(path).map_err(|source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    decode(&bytes).map_err(|source| ExportError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
