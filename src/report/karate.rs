//! Karate (JUnit XML) report decoder
//!
//! Karate writes one JUnit file per feature. Only the attributes of the root
//! `<testsuite>` element are read; the counts are already aggregated by the
//! producer.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DecodeError;
use crate::stats::Seconds;

/// Root `<testsuite>` of one karate report file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSuite {
    /// Free-form suite name, usually a feature path
    pub name: String,
    pub tests: u64,
    pub skipped: u64,
    pub failures: u64,
    pub time: Seconds,
}

impl TestSuite {
    /// The part of `name` after its last `/`, if not blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .rsplit('/')
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Decode a karate report file.
pub fn decode(bytes: &[u8]) -> Result<TestSuite, DecodeError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut suite: Option<TestSuite> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if suite.is_none() => {
                let name = e.local_name();
                if !name.as_ref().eq_ignore_ascii_case(b"testsuite") {
                    return Err(DecodeError::UnexpectedRoot(
                        String::from_utf8_lossy(name.as_ref()).to_string(),
                    ));
                }
                suite = Some(read_suite(e)?);
            }
            // Keep reading so that a truncated or malformed document still fails
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    suite.ok_or(DecodeError::MissingRoot)
}

fn read_suite(e: &BytesStart<'_>) -> Result<TestSuite, DecodeError> {
    let mut suite = TestSuite::default();

    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_ascii_lowercase();
        let value = attr.unescape_value()?;

        match key.as_str() {
            "name" => suite.name = value.to_string(),
            "tests" => suite.tests = parse_count(&key, &value)?,
            "skipped" => suite.skipped = parse_count(&key, &value)?,
            "failures" => suite.failures = parse_count(&key, &value)?,
            "time" => suite.time = parse_seconds(&key, &value)?,
            _ => {}
        }
    }

    Ok(suite)
}

fn parse_count(attribute: &str, value: &str) -> Result<u64, DecodeError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value.parse().map_err(|_| invalid_number(attribute, value))
}

fn parse_seconds(attribute: &str, value: &str) -> Result<Seconds, DecodeError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Seconds::ZERO);
    }
    Seconds::parse(value).ok_or_else(|| invalid_number(attribute, value))
}

fn invalid_number(attribute: &str, value: &str) -> DecodeError {
    DecodeError::InvalidNumber {
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}
