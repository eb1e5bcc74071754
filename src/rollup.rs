//! Statistics rollup across the report hierarchy.
//!
//! Cucumber reports roll up in two phases: decoded rows are first tallied into
//! [`ParsedFeature`]s (exhaustive step counts per scenario), then
//! [`rollup`] classifies each scenario and each feature with one vote per
//! child. Karate suites are pre-aggregated and are only summed.

use tracing::{debug, warn};

use crate::report::{ReportRow, TestSuite};
use crate::stats::{Seconds, Stats};

/// Display name of the run-level cucumber rollup
pub const CUCUMBER_OVERALL_NAME: &str = "All";
/// Display name of the run-level karate summary
pub const KARATE_SUMMARY_NAME: &str = "ALL";

/// A scenario with its step tally
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub stats: Stats,
}

/// A feature as decoded, before its own stats are computed
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeature {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

/// A feature with its scenario rollup
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    pub scenarios: Vec<Scenario>,
    pub stats: Stats,
}

/// Run-level cucumber result
#[derive(Debug, Clone, PartialEq)]
pub struct OverallResult {
    pub features: Vec<Feature>,
    pub stats: Stats,
}

/// Tally the steps of every scenario in the decoded rows of one file.
pub fn parse_features(rows: &[ReportRow]) -> Vec<ParsedFeature> {
    rows.iter()
        .map(|feature| ParsedFeature {
            name: feature.feature_name(),
            scenarios: feature.scenarios().iter().map(tally_scenario).collect(),
        })
        .collect()
}

fn tally_scenario(scenario: &ReportRow) -> Scenario {
    let name = scenario.scenario_name();
    let statuses = scenario.steps().iter().map(|step| {
        let status = step.step_status();
        if status.is_none() {
            let raw = step
                .result
                .as_ref()
                .and_then(|r| r.status.as_deref())
                .unwrap_or("<missing>");
            warn!(scenario = %name, status = raw, "Step status not recognized, not counted");
        }
        status
    });
    let stats = Stats::tally(statuses);

    Scenario { name, stats }
}

impl Feature {
    fn from_parsed(parsed: ParsedFeature) -> Self {
        let stats = Stats::vote(parsed.scenarios.iter().map(|s| &s.stats));
        Self {
            name: parsed.name,
            scenarios: parsed.scenarios,
            stats,
        }
    }
}

/// Classify scenarios into feature stats, then features into overall stats.
pub fn rollup(features: Vec<ParsedFeature>) -> OverallResult {
    let features: Vec<Feature> = features.into_iter().map(Feature::from_parsed).collect();
    let stats = Stats::vote(features.iter().map(|f| &f.stats));

    OverallResult { features, stats }
}

/// Counts of one karate suite, or of the summary across suites
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteStats {
    pub name: String,
    pub tests: u64,
    pub skipped: u64,
    pub failures: u64,
    pub time: Seconds,
}

impl SuiteStats {
    pub fn from_suite(name: impl Into<String>, suite: &TestSuite) -> Self {
        Self {
            name: name.into(),
            tests: suite.tests,
            skipped: suite.skipped,
            failures: suite.failures,
            time: suite.time,
        }
    }

    /// `tests - skipped - failures`; negative if the producer's counts disagree.
    pub fn pass(&self) -> i64 {
        self.tests as i64 - self.skipped as i64 - self.failures as i64
    }

    /// Integer `(pass / tests) * 100`, so either 0 or 100 for consistent counts.
    pub fn pass_percentage(&self) -> Option<i64> {
        if self.tests == 0 {
            return None;
        }
        Some(self.pass() / self.tests as i64 * 100)
    }
}

/// Accumulated karate suites of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KarateRollup {
    pub suites: Vec<SuiteStats>,
}

impl KarateRollup {
    /// Add a suite; suites without tests are left out of the run entirely.
    pub fn add(mut self, suite: SuiteStats) -> Self {
        if suite.tests == 0 {
            debug!(suite = %suite.name, "Suite has no tests, skipping");
        } else {
            self.suites.push(suite);
        }
        self
    }

    pub fn total_tests(&self) -> u64 {
        self.suites.iter().map(|s| s.tests).sum()
    }

    /// Elementwise sum of every accepted suite
    pub fn summary(&self) -> SuiteStats {
        self.suites.iter().fold(
            SuiteStats {
                name: KARATE_SUMMARY_NAME.to_string(),
                tests: 0,
                skipped: 0,
                failures: 0,
                time: Seconds::ZERO,
            },
            |acc, suite| SuiteStats {
                tests: acc.tests + suite.tests,
                skipped: acc.skipped + suite.skipped,
                failures: acc.failures + suite.failures,
                time: acc.time + suite.time,
                ..acc
            },
        )
    }
}
