//! Report file discovery
//!
//! Lists every file under the report root whose extension matches the report
//! type, at any depth.

use std::path::{Path, PathBuf};

use crate::config::ReportType;
use crate::error::ExportResult;

/// Find report files under `root`, sorted by path.
///
/// `root` may also be a single report file.
pub fn discover_reports(root: &Path, report_type: ReportType) -> ExportResult<Vec<PathBuf>> {
    let extension = report_type.extension();

    if root.is_file() {
        let matches = root.extension().is_some_and(|ext| ext == extension);
        return Ok(if matches { vec![root.to_path_buf()] } else { Vec::new() });
    }

    let pattern = format!(
        "{}/**/*.{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        extension
    );

    let mut reports = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        if path.is_file() {
            reports.push(path);
        }
    }
    reports.sort();

    Ok(reports)
}
