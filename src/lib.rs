//! Report Exporter - test report trends for InfluxDB
//!
//! A library for turning CI test reports into time-series points:
//! - Cucumber JSON reports (feature / scenario / step hierarchy)
//! - Karate JUnit XML reports (one pre-aggregated suite per file)
//! - Pass/fail/skip rollups with pass percentages
//! - Batched writes to InfluxDB in line protocol

pub mod config;
pub mod discovery;
pub mod error;
pub mod exporter;
pub mod point;
pub mod report;
pub mod rollup;
pub mod sink;
pub mod stats;

pub use config::{ExportConfig, FileConfig, InfluxConfig, InfluxSettings, ReportType};
pub use error::{DecodeError, ExportError, SinkError};
pub use exporter::{ExportOutcome, ExportSummary, Exporter};
pub use point::{FieldValue, Point, RunContext};
pub use rollup::{Feature, OverallResult, Scenario, SuiteStats};
pub use sink::{InfluxSink, PointSink, WriterSink};
pub use stats::{PassPercentage, Seconds, Stats, Status};
