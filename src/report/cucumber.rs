//! Cucumber JSON report decoder
//!
//! A cucumber report is a JSON array of features. Each feature nests its
//! scenarios under `elements`, and each scenario nests `steps` carrying a
//! `result`. Field names are matched case-insensitively and unknown fields
//! are ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;
use crate::stats::Status;

/// Generic node of the cucumber hierarchy (feature, scenario or step).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRow {
    pub id: Option<String>,
    pub keyword: Option<String>,
    pub name: Option<String>,
    pub uri: Option<String>,
    pub elements: Option<Vec<ReportRow>>,
    pub steps: Option<Vec<ReportRow>>,
    pub result: Option<StepResult>,
}

/// Result attached to a step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepResult {
    /// Raw status as written by the producer
    pub status: Option<String>,
    /// Duration in the producer's unit (nanoseconds for cucumber-jvm)
    pub duration: Option<f64>,
}

impl StepResult {
    pub fn status(&self) -> Option<Status> {
        self.status.as_deref().and_then(Status::lookup)
    }
}

impl ReportRow {
    pub fn scenarios(&self) -> &[ReportRow] {
        self.elements.as_deref().unwrap_or_default()
    }

    pub fn steps(&self) -> &[ReportRow] {
        self.steps.as_deref().unwrap_or_default()
    }

    /// Recognized status of this step, if any.
    pub fn step_status(&self) -> Option<Status> {
        self.result.as_ref().and_then(StepResult::status)
    }

    /// Display name of a feature: the last segment of its `uri`, falling back
    /// to its `name`, then its `id`.
    pub fn feature_name(&self) -> String {
        let from_uri = self
            .uri
            .as_deref()
            .and_then(|uri| uri.rsplit('/').next())
            .filter(|segment| !segment.trim().is_empty());

        from_uri
            .or_else(|| non_blank(self.name.as_deref()))
            .or_else(|| non_blank(self.id.as_deref()))
            .unwrap_or("unnamed feature")
            .to_string()
    }

    pub fn scenario_name(&self) -> String {
        non_blank(self.name.as_deref())
            .or_else(|| non_blank(self.id.as_deref()))
            .unwrap_or("unnamed scenario")
            .to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Canonical form of a JSON field name used for matching.
pub fn normalize_field_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Rewrite every object key in the tree to its canonical form.
fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (normalize_field_name(&key), normalize_keys(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Decode one cucumber report file into its top-level features.
pub fn decode(bytes: &[u8]) -> Result<Vec<ReportRow>, DecodeError> {
    let raw: Value = serde_json::from_slice(bytes)?;
    let rows = serde_json::from_value(normalize_keys(raw))?;
    Ok(rows)
}
