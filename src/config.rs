use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Kind of report being exported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Karate,
    Cucumber,
}

impl ReportType {
    /// File extension of report files of this type (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            ReportType::Karate => "xml",
            ReportType::Cucumber => "json",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportType::Karate => f.write_str("karate"),
            ReportType::Cucumber => f.write_str("cucumber"),
        }
    }
}

/// Everything one export run needs
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub report_type: ReportType,
    pub project: String,
    /// Empty when no branch tag should be written
    pub branch: String,
    pub report_path: PathBuf,
}

impl ExportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            anyhow::bail!("Project name must not be blank");
        }
        Ok(())
    }
}

/// Connection parameters of the InfluxDB sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub retention_policy: Option<String>,
}

/// Partially specified InfluxDB settings, from the CLI or a config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InfluxSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub retention_policy: Option<String>,
}

impl InfluxSettings {
    /// Fill unset values from `fallback`
    pub fn or(self, fallback: InfluxSettings) -> Self {
        Self {
            url: self.url.or(fallback.url),
            username: self.username.or(fallback.username),
            password: self.password.or(fallback.password),
            database: self.database.or(fallback.database),
            retention_policy: self.retention_policy.or(fallback.retention_policy),
        }
    }

    pub fn into_config(self) -> Result<InfluxConfig> {
        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("InfluxDB url is required (--influxDBUrl)"))?;
        let database = self
            .database
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("InfluxDB database is required (--influxDBDatabase)"))?;

        Ok(InfluxConfig {
            url: url.trim_end_matches('/').to_string(),
            username: self.username.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            database,
            retention_policy: self.retention_policy.filter(|rp| !rp.trim().is_empty()),
        })
    }
}

/// Optional exporter config file
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub influxdb: InfluxSettings,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }
}
