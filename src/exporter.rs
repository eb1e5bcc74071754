use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

use crate::config::{ExportConfig, ReportType};
use crate::discovery::discover_reports;
use crate::error::{ExportError, ExportResult};
use crate::point::{Point, RunContext};
use crate::report::{cucumber, decode_file, karate};
use crate::rollup::{parse_features, rollup, KarateRollup, OverallResult, ParsedFeature, SuiteStats};
use crate::sink::PointSink;

/// What a successful export produced
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub files: usize,
    pub points: usize,
    pub outcome: ExportOutcome,
}

#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Cucumber(OverallResult),
    Karate {
        suites: Vec<SuiteStats>,
        summary: SuiteStats,
    },
}

/// Running totals while files are processed
enum Accumulator {
    Cucumber(Vec<ParsedFeature>),
    Karate(KarateRollup),
}

impl Accumulator {
    fn new(report_type: ReportType) -> Self {
        match report_type {
            ReportType::Cucumber => Accumulator::Cucumber(Vec::new()),
            ReportType::Karate => Accumulator::Karate(KarateRollup::default()),
        }
    }

    /// Decode one file with the decoder of this accumulator's report type.
    fn add(self, path: &Path) -> ExportResult<Self> {
        let acc = match self {
            Accumulator::Cucumber(mut features) => {
                let rows = decode_file(path, cucumber::decode)?;
                features.extend(parse_features(&rows));
                Accumulator::Cucumber(features)
            }
            Accumulator::Karate(totals) => {
                let suite = decode_file(path, karate::decode)?;
                let name = suite
                    .display_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| file_stem(path));
                Accumulator::Karate(totals.add(SuiteStats::from_suite(name, &suite)))
            }
        };
        Ok(acc)
    }

    fn finish(self, context: &RunContext) -> ExportResult<(ExportOutcome, Vec<Point>)> {
        match self {
            Accumulator::Cucumber(features) => {
                if features.is_empty() {
                    return Err(ExportError::NoData);
                }
                let overall = rollup(features);
                info!(stats = %overall.stats, features = overall.features.len(), "Overall Stats");

                let points = context.cucumber_points(&overall);
                Ok((ExportOutcome::Cucumber(overall), points))
            }
            Accumulator::Karate(karate) => {
                if karate.total_tests() == 0 {
                    return Err(ExportError::NoData);
                }
                let summary = karate.summary();
                info!(
                    tests = summary.tests,
                    skipped = summary.skipped,
                    failures = summary.failures,
                    time = %summary.time,
                    "Overall Stats"
                );

                let points = karate
                    .suites
                    .iter()
                    .chain(std::iter::once(&summary))
                    .map(|suite| context.karate_point(suite))
                    .collect();
                Ok((
                    ExportOutcome::Karate {
                        suites: karate.suites,
                        summary,
                    },
                    points,
                ))
            }
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Runs one export: discover, decode, roll up, write, flush.
pub struct Exporter<'a> {
    config: &'a ExportConfig,
    context: RunContext,
}

impl<'a> Exporter<'a> {
    /// `captured_at` is the timestamp written on every point of the run.
    pub fn new(config: &'a ExportConfig, captured_at: DateTime<Utc>) -> Self {
        let context = RunContext::new(&config.project, &config.branch, captured_at);
        Self { config, context }
    }

    /// Run the export. The sink is closed whether the run succeeds or fails.
    pub fn run<S: PointSink>(&self, mut sink: S) -> ExportResult<ExportSummary> {
        let result = self.export(&mut sink);
        sink.close();
        result
    }

    fn export<S: PointSink>(&self, sink: &mut S) -> ExportResult<ExportSummary> {
        let report_type = self.config.report_type;
        let files = discover_reports(&self.config.report_path, report_type)?;
        info!(
            count = files.len(),
            report_type = %report_type,
            path = %self.config.report_path.display(),
            "Found report files"
        );

        let accumulator = files
            .iter()
            .try_fold(Accumulator::new(report_type), |acc, path| {
                info!("Processing file: {}", path.display());
                acc.add(path)
            })?;

        let (outcome, points) = accumulator.finish(&self.context)?;
        let written = points.len();
        for point in points {
            sink.write_point(point);
        }
        sink.flush()?;

        Ok(ExportSummary {
            files: files.len(),
            points: written,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, SinkError};
    use crate::point::FieldValue;
    use crate::stats::Stats;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Recorded {
        flushed: Vec<Point>,
        flushes: usize,
        closed: bool,
    }

    /// Records flushed points; optionally fails every flush
    struct RecordingSink {
        state: Rc<RefCell<Recorded>>,
        pending: Vec<Point>,
        fail_flush: bool,
    }

    impl RecordingSink {
        fn new() -> (Self, Rc<RefCell<Recorded>>) {
            let state = Rc::new(RefCell::new(Recorded::default()));
            let sink = Self {
                state: Rc::clone(&state),
                pending: Vec::new(),
                fail_flush: false,
            };
            (sink, state)
        }

        fn failing() -> (Self, Rc<RefCell<Recorded>>) {
            let (mut sink, state) = Self::new();
            sink.fail_flush = true;
            (sink, state)
        }
    }

    impl PointSink for RecordingSink {
        fn write_point(&mut self, point: Point) {
            self.pending.push(point);
        }

        fn flush(&mut self) -> Result<(), SinkError> {
            if self.fail_flush {
                return Err(SinkError::Rejected {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            let mut state = self.state.borrow_mut();
            state.flushes += 1;
            state.flushed.append(&mut self.pending);
            Ok(())
        }

        fn close(self) {
            self.state.borrow_mut().closed = true;
        }
    }

    fn captured_at() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn config(report_type: ReportType, root: &Path, branch: &str) -> ExportConfig {
        ExportConfig {
            report_type,
            project: "webshop".to_string(),
            branch: branch.to_string(),
            report_path: root.to_path_buf(),
        }
    }

    fn field(point: &Point, key: &str) -> FieldValue {
        point.fields()[key]
    }

    const CUCUMBER_REPORT: &str = r#"[{
        "keyword": "Feature",
        "name": "Checkout",
        "uri": "src/test/resources/features/checkout.feature",
        "elements": [
            { "name": "A", "steps": [
                { "result": { "status": "passed" } },
                { "result": { "status": "passed" } }
            ]},
            { "name": "B", "steps": [
                { "result": { "status": "failed" } },
                { "result": { "status": "passed" } }
            ]}
        ]
    }]"#;

    fn karate_report(name: &str, tests: u64, skipped: u64, failures: u64, time: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite failures="{failures}" name="{name}" skipped="{skipped}" tests="{tests}" time="{time}"/>"#
        )
    }

    #[test]
    fn test_cucumber_export() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cucumber.json"), CUCUMBER_REPORT).unwrap();

        let config = config(ReportType::Cucumber, dir.path(), "");
        let (sink, state) = RecordingSink::new();
        let summary = Exporter::new(&config, captured_at()).run(sink).unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(summary.points, 2);
        let ExportOutcome::Cucumber(overall) = summary.outcome else {
            panic!("expected cucumber outcome");
        };
        assert_eq!(overall.stats, Stats::new(1, 0, 1, 0));
        assert_eq!(overall.features[0].name, "checkout.feature");
        assert_eq!(overall.features[0].stats, Stats::new(2, 1, 1, 0));
        assert_eq!(overall.features[0].scenarios[0].stats, Stats::new(2, 2, 0, 0));
        assert_eq!(overall.features[0].scenarios[1].stats, Stats::new(2, 1, 1, 0));

        let state = state.borrow();
        assert!(state.closed);
        assert_eq!(state.flushes, 1);
        assert_eq!(state.flushed.len(), 2);

        let all = &state.flushed[0];
        assert_eq!(all.measurement(), "cucumber");
        assert_eq!(all.tags()["feature"], "All");
        assert_eq!(all.tags()["project"], "webshop");
        assert!(!all.tags().contains_key("branch"));
        assert_eq!(field(all, "total"), FieldValue::Integer(1));
        assert_eq!(field(all, "failed"), FieldValue::Integer(1));
        assert_eq!(field(all, "passPercentage"), FieldValue::Float(0.0));

        let feature = &state.flushed[1];
        assert_eq!(feature.tags()["feature"], "checkout.feature");
        assert_eq!(field(feature, "total"), FieldValue::Integer(2));
        assert_eq!(field(feature, "passed"), FieldValue::Integer(1));
        assert_eq!(field(feature, "passPercentage"), FieldValue::Float(50.0));
    }

    #[test]
    fn test_karate_export() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("orders.xml"),
            karate_report("features/orders.feature", 10, 1, 2, "3.5"),
        )
        .unwrap();
        fs::write(
            dir.path().join("users.xml"),
            karate_report("features/users.feature", 5, 0, 0, "1.0"),
        )
        .unwrap();

        let config = config(ReportType::Karate, dir.path(), "release-1");
        let (sink, state) = RecordingSink::new();
        let summary = Exporter::new(&config, captured_at()).run(sink).unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.points, 3);
        let ExportOutcome::Karate { suites, summary } = summary.outcome else {
            panic!("expected karate outcome");
        };
        assert_eq!(suites.len(), 2);
        assert_eq!(summary.tests, 15);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failures, 2);
        assert_eq!(summary.pass(), 12);
        assert_eq!(summary.time.to_string(), "4.5");

        let state = state.borrow();
        let names: Vec<&str> = state
            .flushed
            .iter()
            .map(|p| p.tags()["testName"].as_str())
            .collect();
        assert_eq!(names, vec!["orders.feature", "users.feature", "ALL"]);
        assert!(state.flushed.iter().all(|p| p.tags()["branch"] == "release-1"));
        assert!(state.flushed.iter().all(|p| p.timestamp() == captured_at()));

        let all = &state.flushed[2];
        assert_eq!(all.measurement(), "functionalTests");
        assert_eq!(field(all, "tests"), FieldValue::Integer(15));
        assert_eq!(field(all, "pass"), FieldValue::Integer(12));
        assert_eq!(field(all, "timeTaken"), FieldValue::Float(4.5));
    }

    #[test]
    fn test_karate_summary_time_written_exactly() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.xml"), karate_report("a", 1, 0, 0, "0.1")).unwrap();
        fs::write(dir.path().join("b.xml"), karate_report("b", 1, 0, 0, "0.2")).unwrap();

        let config = config(ReportType::Karate, dir.path(), "");
        let (sink, state) = RecordingSink::new();
        Exporter::new(&config, captured_at()).run(sink).unwrap();

        let state = state.borrow();
        let all = &state.flushed[2];
        assert_eq!(all.tags()["testName"], "ALL");
        assert_eq!(field(all, "timeTaken"), FieldValue::Float(0.3));
        assert_eq!(
            all.to_line_protocol(),
            "functionalTests,project=webshop,testName=ALL \
             failures=0i,pass=2i,passPercentage=100i,skipped=0i,tests=2i,timeTaken=0.3 1700000000000"
        );
    }

    #[test]
    fn test_karate_name_falls_back_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("smoke.xml"), karate_report("", 1, 0, 0, "0.1")).unwrap();

        let config = config(ReportType::Karate, dir.path(), "");
        let (sink, state) = RecordingSink::new();
        Exporter::new(&config, captured_at()).run(sink).unwrap();

        assert_eq!(state.borrow().flushed[0].tags()["testName"], "smoke");
    }

    #[test]
    fn test_no_files_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.xml"), karate_report("x", 3, 0, 0, "1")).unwrap();

        let config = config(ReportType::Cucumber, dir.path(), "");
        let (sink, state) = RecordingSink::new();
        let err = Exporter::new(&config, captured_at()).run(sink).unwrap_err();

        assert!(matches!(err, ExportError::NoData));
        let state = state.borrow();
        assert!(state.flushed.is_empty());
        assert_eq!(state.flushes, 0);
        assert!(state.closed);
    }

    #[test]
    fn test_cucumber_without_features_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.json"), "[]").unwrap();

        let config = config(ReportType::Cucumber, dir.path(), "");
        let (sink, _state) = RecordingSink::new();
        let err = Exporter::new(&config, captured_at()).run(sink).unwrap_err();
        assert!(matches!(err, ExportError::NoData));
    }

    #[test]
    fn test_karate_without_tests_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.xml"), karate_report("empty", 0, 0, 0, "0")).unwrap();

        let config = config(ReportType::Karate, dir.path(), "");
        let (sink, state) = RecordingSink::new();
        let err = Exporter::new(&config, captured_at()).run(sink).unwrap_err();

        assert!(matches!(err, ExportError::NoData));
        assert!(state.borrow().flushed.is_empty());
    }

    #[test]
    fn test_decode_error_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), CUCUMBER_REPORT).unwrap();
        fs::write(dir.path().join("b.json"), "[{ truncated").unwrap();

        let config = config(ReportType::Cucumber, dir.path(), "");
        let (sink, state) = RecordingSink::new();
        let err = Exporter::new(&config, captured_at()).run(sink).unwrap_err();

        match err {
            ExportError::Decode { path, source } => {
                assert_eq!(path, dir.path().join("b.json"));
                assert!(matches!(source, DecodeError::Json(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        let state = state.borrow();
        assert!(state.flushed.is_empty());
        assert!(state.closed);
    }

    #[test]
    fn test_sink_failure_still_closes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), CUCUMBER_REPORT).unwrap();

        let config = config(ReportType::Cucumber, dir.path(), "");
        let (sink, state) = RecordingSink::failing();
        let err = Exporter::new(&config, captured_at()).run(sink).unwrap_err();

        assert!(matches!(err, ExportError::Sink(SinkError::Rejected { status: 503, .. })));
        let state = state.borrow();
        assert!(state.flushed.is_empty());
        assert!(state.closed);
    }

    #[test]
    fn test_export_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.json"), CUCUMBER_REPORT).unwrap();
        fs::write(
            dir.path().join("two.json"),
            r#"[{ "name": "Search", "elements": [{ "steps": [{ "result": { "status": "skipped" } }] }] }]"#,
        )
        .unwrap();

        let config = config(ReportType::Cucumber, dir.path(), "main");
        let lines = |_: usize| -> Vec<String> {
            let (sink, state) = RecordingSink::new();
            Exporter::new(&config, captured_at()).run(sink).unwrap();
            let lines: Vec<String> = state.borrow().flushed.iter().map(Point::to_line_protocol).collect();
            lines
        };

        let first = lines(1);
        assert_eq!(first.len(), 3);
        assert_eq!(first, lines(2));
    }

    #[test]
    fn test_report_root_as_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let report: PathBuf = dir.path().join("cucumber.json");
        fs::write(&report, CUCUMBER_REPORT).unwrap();

        let config = config(ReportType::Cucumber, &report, "");
        let (sink, state) = RecordingSink::new();
        let summary = Exporter::new(&config, captured_at()).run(sink).unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(state.borrow().flushed.len(), 2);
    }
}
