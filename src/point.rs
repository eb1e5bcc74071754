//! Metric points and their InfluxDB line protocol encoding.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::rollup::{OverallResult, SuiteStats, CUCUMBER_OVERALL_NAME};
use crate::stats::{Seconds, Stats};

pub const CUCUMBER_MEASUREMENT: &str = "cucumber";
pub const KARATE_MEASUREMENT: &str = "functionalTests";

/// Value of a point field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<Seconds> for FieldValue {
    fn from(value: Seconds) -> Self {
        FieldValue::Float(value.as_f64())
    }
}

/// One timestamped, tagged metric record
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    /// Add a tag. Blank values are not written.
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        if !value.trim().is_empty() {
            self.tags.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Add a field only when it has a value.
    pub fn optional_field<V: Into<FieldValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Encode with millisecond precision.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| match value {
                FieldValue::Integer(v) => format!("{}={}i", escape_key(key), v),
                FieldValue::Float(v) => format!("{}={}", escape_key(key), v),
            })
            .collect();
        let _ = write!(line, " {} {}", fields.join(","), self.timestamp.timestamp_millis());

        line
    }
}

/// Escape `special` and backslashes. Line breaks cannot be escaped in line
/// protocol, so they become (escaped) spaces.
fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        let c = if matches!(c, '\n' | '\r') { ' ' } else { c };
        if c == '\\' || special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn escape_key(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

/// Metadata shared by every point of a run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub project: String,
    pub branch: String,
    /// Capture instant shared by every point in the run
    pub captured_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(project: &str, branch: &str, captured_at: DateTime<Utc>) -> Self {
        Self {
            project: project.to_string(),
            branch: branch.to_string(),
            captured_at,
        }
    }

    fn point(&self, measurement: &str) -> Point {
        Point::new(measurement, self.captured_at)
            .tag("project", &self.project)
            .tag("branch", &self.branch)
    }

    pub fn cucumber_point(&self, feature: &str, stats: &Stats) -> Point {
        self.point(CUCUMBER_MEASUREMENT)
            .tag("feature", feature)
            .field("total", stats.total)
            .field("failed", stats.failed)
            .field("passed", stats.passed)
            .field("skipped", stats.skipped)
            .optional_field("passPercentage", stats.pass_percentage.map(|p| p.as_f64()))
    }

    /// The overall point first, then one point per feature.
    pub fn cucumber_points(&self, result: &OverallResult) -> Vec<Point> {
        std::iter::once(self.cucumber_point(CUCUMBER_OVERALL_NAME, &result.stats))
            .chain(
                result
                    .features
                    .iter()
                    .map(|feature| self.cucumber_point(&feature.name, &feature.stats)),
            )
            .collect()
    }

    pub fn karate_point(&self, suite: &SuiteStats) -> Point {
        self.point(KARATE_MEASUREMENT)
            .tag("testName", &suite.name)
            .field("tests", suite.tests)
            .field("skipped", suite.skipped)
            .field("failures", suite.failures)
            .field("pass", suite.pass())
            .optional_field("passPercentage", suite.pass_percentage())
            .field("timeTaken", suite.time)
    }
}
