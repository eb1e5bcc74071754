//! Point sinks
//!
//! Points are buffered by `write_point` and only leave the process on
//! `flush`, so a run that fails before flushing writes nothing.

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::InfluxConfig;
use crate::error::SinkError;
use crate::point::Point;

/// Destination for the points of a run
pub trait PointSink {
    /// Buffer a point for the next flush
    fn write_point(&mut self, point: Point);

    /// Commit every buffered point
    fn flush(&mut self) -> Result<(), SinkError>;

    /// Release the sink. Points not yet flushed are discarded.
    fn close(self)
    where
        Self: Sized;
}

fn encode_batch(points: &[Point]) -> String {
    points
        .iter()
        .map(Point::to_line_protocol)
        .collect::<Vec<_>>()
        .join("\n")
}

fn discard(pending: &[Point]) {
    if !pending.is_empty() {
        warn!(points = pending.len(), "Discarding points that were never flushed");
    }
}

/// InfluxDB 1.8+ sink using the v2-compatible write endpoint
pub struct InfluxSink {
    client: Client,
    write_url: String,
    bucket: String,
    token: Option<String>,
    pending: Vec<Point>,
}

impl InfluxSink {
    pub fn connect(config: &InfluxConfig) -> Result<Self, SinkError> {
        let write_url = format!("{}/api/v2/write", config.url);
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|source| SinkError::Http {
                url: write_url.clone(),
                source,
            })?;

        let bucket = format!(
            "{}/{}",
            config.database,
            config.retention_policy.as_deref().unwrap_or_default()
        );
        let token = if config.username.is_empty() && config.password.is_empty() {
            None
        } else {
            Some(format!("Token {}:{}", config.username, config.password))
        };

        debug!(url = %write_url, bucket = %bucket, "InfluxDB sink ready");

        Ok(Self {
            client,
            write_url,
            bucket,
            token,
            pending: Vec::new(),
        })
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl PointSink for InfluxSink {
    fn write_point(&mut self, point: Point) {
        debug!(line = %point.to_line_protocol(), "Buffered point");
        self.pending.push(point);
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut request = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", "-"),
                ("bucket", self.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(encode_batch(&self.pending));
        if let Some(ref token) = self.token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request.send().map_err(|source| SinkError::Http {
            url: self.write_url.clone(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(SinkError::Rejected { status, body });
        }

        info!(points = self.pending.len(), bucket = %self.bucket, "Points written to InfluxDB");
        self.pending.clear();
        Ok(())
    }

    fn close(self) {
        discard(&self.pending);
        debug!("InfluxDB sink closed");
    }
}

/// Writes line protocol to any writer instead of a database (dry run)
pub struct WriterSink<W: Write> {
    out: W,
    pending: Vec<Point>,
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            pending: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PointSink for WriterSink<W> {
    fn write_point(&mut self, point: Point) {
        self.pending.push(point);
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        writeln!(self.out, "{}", encode_batch(&self.pending))?;
        self.out.flush()?;
        self.pending.clear();
        Ok(())
    }

    fn close(self) {
        discard(&self.pending);
    }
}
