use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use report_exporter::{
    ExportConfig, ExportOutcome, ExportSummary, Exporter, FileConfig, InfluxSettings, InfluxSink,
    ReportType, Stats, Status, SuiteStats, WriterSink,
};

#[derive(Parser)]
#[command(name = "report-exporter")]
#[command(about = "Export cucumber and karate test report trends to InfluxDB")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    report_type: ReportTypeArgs,

    /// Project name
    #[arg(long)]
    project: String,

    /// Branch name (no branch tag is written when empty)
    #[arg(long, default_value = "")]
    branch: String,

    /// Report path: a directory searched recursively, or a single report file
    #[arg(long = "path")]
    report_path: PathBuf,

    /// InfluxDB url
    #[arg(long = "influxDBUrl")]
    influxdb_url: Option<String>,

    /// InfluxDB username
    #[arg(long = "influxDBUsername")]
    influxdb_username: Option<String>,

    /// InfluxDB password
    #[arg(long = "influxDBPassword", env = "INFLUXDB_PASSWORD", hide_env_values = true)]
    influxdb_password: Option<String>,

    /// InfluxDB database
    #[arg(long = "influxDBDatabase")]
    influxdb_database: Option<String>,

    /// InfluxDB retention policy (database default when omitted)
    #[arg(long = "influxDBRetentionPolicy")]
    influxdb_retention_policy: Option<String>,

    /// TOML file with an [influxdb] table; command line values win
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print line protocol to stdout instead of writing to InfluxDB
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Type of report to be exported
#[derive(Args)]
#[group(required = true, multiple = false)]
struct ReportTypeArgs {
    /// Export karate JUnit XML reports
    #[arg(long)]
    karate: bool,

    /// Export cucumber JSON reports
    #[arg(long)]
    cucumber: bool,
}

impl ReportTypeArgs {
    fn report_type(&self) -> ReportType {
        if self.karate {
            ReportType::Karate
        } else {
            ReportType::Cucumber
        }
    }
}

impl Cli {
    fn influx_settings(&self) -> InfluxSettings {
        InfluxSettings {
            url: self.influxdb_url.clone(),
            username: self.influxdb_username.clone(),
            password: self.influxdb_password.clone(),
            database: self.influxdb_database.clone(),
            retention_policy: self.influxdb_retention_policy.clone(),
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let captured_at = Utc::now();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file_settings = match cli.config {
        Some(ref path) => FileConfig::load(path)?.influxdb,
        None => InfluxSettings::default(),
    };
    let settings = cli.influx_settings().or(file_settings);

    let config = ExportConfig {
        report_type: cli.report_type.report_type(),
        project: cli.project.clone(),
        branch: cli.branch.clone(),
        report_path: cli.report_path.clone(),
    };
    config.validate()?;

    info!(
        project = %config.project,
        branch = %config.branch,
        path = %config.report_path.display(),
        influxdb_url = settings.url.as_deref().unwrap_or_default(),
        influxdb_database = settings.database.as_deref().unwrap_or_default(),
        "Starting {} export",
        config.report_type
    );

    let exporter = Exporter::new(&config, captured_at);
    let summary = if cli.dry_run {
        exporter.run(WriterSink::stdout())?
    } else {
        let influx = settings.into_config()?;
        let sink = InfluxSink::connect(&influx)
            .with_context(|| format!("Could not connect to InfluxDB at {}", influx.url))?;
        exporter.run(sink)?
    };

    print_summary(&config, &summary);
    Ok(())
}

fn status_symbol(status: Status) -> colored::ColoredString {
    match status {
        Status::Passed => "✓".green(),
        Status::Failed => "✗".red(),
        Status::Skipped => "⊘".dimmed(),
    }
}

fn format_stats(stats: &Stats) -> String {
    let pct = stats
        .pass_percentage
        .map(|p| format!("{}%", p))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} passed, {} failed, {} skipped of {} ({})",
        stats.passed.to_string().green(),
        stats.failed.to_string().red(),
        stats.skipped.to_string().yellow(),
        stats.total,
        pct
    )
}

fn format_suite(suite: &SuiteStats) -> String {
    format!(
        "{} tests, {} pass, {} failures, {} skipped in {}s",
        suite.tests,
        suite.pass().to_string().green(),
        suite.failures.to_string().red(),
        suite.skipped.to_string().yellow(),
        suite.time
    )
}

fn print_summary(config: &ExportConfig, summary: &ExportSummary) {
    eprintln!("\n{} {}", "📊".cyan(), config.project.bold());

    match summary.outcome {
        ExportOutcome::Cucumber(ref overall) => {
            for feature in &overall.features {
                eprintln!(
                    "  {} {} {}",
                    status_symbol(feature.stats.classify()),
                    feature.name.cyan(),
                    format_stats(&feature.stats).dimmed()
                );
            }
            eprintln!(
                "\n  {} {} {}",
                status_symbol(overall.stats.classify()),
                "All features:".bold(),
                format_stats(&overall.stats)
            );
        }
        ExportOutcome::Karate {
            ref suites,
            summary: ref total,
        } => {
            for suite in suites {
                let symbol = if suite.failures > 0 { "✗".red() } else { "✓".green() };
                eprintln!("  {} {} {}", symbol, suite.name.cyan(), format_suite(suite).dimmed());
            }
            eprintln!("\n  {} {}", "All suites:".bold(), format_suite(total));
        }
    }

    eprintln!(
        "\n{} {} point(s) from {} file(s)\n",
        "→".blue(),
        summary.points,
        summary.files
    );
}
