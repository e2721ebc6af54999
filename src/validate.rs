//! Container validation.
//!
//! The metadata line is checked first; a container with unusable metadata is
//! rejected without looking at its body. Body lines are then checked against
//! the content schema(s) the metadata names, until the input ends or
//! [`MAX_ERRORS`] errors have been seen. A container is valid only when the
//! metadata is valid and no body line failed.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use strum::{AsRefStr, Display};

use crate::container::ContainerStream;
use crate::error::{Error, Result};
use crate::model::{ContentType, Metadata};
use crate::schema::{self, Schema, Violation, METADATA_SCHEMA};

/// Body errors after which reading stops
pub const MAX_ERRORS: usize = 100;

#[derive(AsRefStr, Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum ValidationState {
    Start,
    ReadingMetadata,
    MetadataInvalid,
    ReadingBody,
    Valid,
    Invalid,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationReport {
    pub state: ValidationState,
    pub error_count: usize,
    /// Lines consumed from the container, metadata included
    pub lines_read: usize,
    pub content: Vec<ContentType>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.state == ValidationState::Valid
    }

    /// Whether reading stopped at the error cap
    pub fn hit_error_cap(&self) -> bool {
        self.error_count >= MAX_ERRORS
    }
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Content tags named by a metadata line
fn read_metadata(value: &Value) -> std::result::Result<Vec<ContentType>, String> {
    schema::validate(value, &METADATA_SCHEMA).map_err(|v| describe(&v))?;

    let metadata = Metadata::deserialize(value).map_err(|e| e.to_string())?;
    match metadata.content {
        Some(content) => Ok(content.tags()),
        None => Err("'content' is a required property".to_string()),
    }
}

/// Check one body line against every candidate schema
fn check_line(value: &Value, schemas: &[&'static Schema]) -> std::result::Result<(), String> {
    let mut first_failure = None;
    for schema in schemas {
        match schema::validate(value, schema) {
            Ok(()) => return Ok(()),
            Err(violations) => {
                first_failure.get_or_insert_with(|| describe(&violations));
            }
        }
    }
    Err(first_failure.unwrap_or_else(|| "no content schema".to_string()))
}

/// Validate an opened container from its first line.
///
/// Only I/O failures are returned as errors; everything wrong with the
/// content ends up in the report.
pub fn validate_container(stream: &mut ContainerStream) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        state: ValidationState::Start,
        error_count: 0,
        lines_read: 0,
        content: Vec::new(),
    };
    let path = stream.path().display().to_string();

    report.state = ValidationState::ReadingMetadata;
    let metadata = match stream.read() {
        Ok(Some(value)) => read_metadata(&value),
        Ok(None) => Err("no metadata found".to_string()),
        Err(Error::Format { message, .. }) => Err(message),
        Err(e) => return Err(e),
    };
    report.lines_read = stream.line_no();

    match metadata {
        Ok(content) => report.content = content,
        Err(message) => {
            tracing::error!("{}:1: invalid metadata: {}", path, message);
            report.state = ValidationState::MetadataInvalid;
            return Ok(report);
        }
    }

    report.state = ValidationState::ReadingBody;
    let schemas: Vec<&'static Schema> = report
        .content
        .iter()
        .map(|tag| schema::content_schema(*tag))
        .collect();

    while report.error_count < MAX_ERRORS {
        let result = match stream.read() {
            Ok(None) => break,
            Ok(Some(value)) => check_line(&value, &schemas),
            Err(Error::Format { message, .. }) => Err(message),
            Err(e) => return Err(e),
        };

        if let Err(message) = result {
            tracing::error!("{}:{}: {}", path, stream.line_no(), message);
            report.error_count += 1;
        }
    }
    report.lines_read = stream.line_no();

    if report.hit_error_cap() {
        tracing::warn!("Stopped after {} errors", MAX_ERRORS);
    }

    report.state = if report.error_count == 0 {
        ValidationState::Valid
    } else {
        ValidationState::Invalid
    };

    tracing::info!(
        "{}: {} ({} lines, {} errors)",
        path,
        report.state,
        report.lines_read,
        report.error_count
    );
    Ok(report)
}

/// Open and validate a container file
pub fn validate_file(path: &Path) -> Result<ValidationReport> {
    let mut stream = ContainerStream::open_read(path)?;
    validate_container(&mut stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const META: &str = r#"{"content": "flightlog", "source": "csgroup", "origin": "x.csv"}"#;
    const GOOD: &str = r#"{"time": {"unix": 1}, "pos": {"loc": {"lat": 1.0, "lon": 2.0, "alt": 3.0}}}"#;
    const BAD: &str = r#"{"time": {"unix": 1}}"#;

    fn container(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_valid_container() {
        let file = container(&[META, GOOD, GOOD]);
        let report = validate_file(file.path()).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.content, vec![ContentType::FlightLog]);
        assert_eq!(report.error_count, 0);
    }

    #[test]
    fn test_any_error_is_invalid() {
        let file = container(&[META, GOOD, BAD, "not json", GOOD]);
        let report = validate_file(file.path()).unwrap();
        assert_eq!(report.state, ValidationState::Invalid);
        assert_eq!(report.error_count, 2);
        assert!(!report.hit_error_cap());
    }

    #[test]
    fn test_undecodable_bytes_count_as_line_error() {
        let mut file = container(&[META, GOOD]);
        file.write_all(b"{\"time\": \"\xff\"}\n").unwrap();
        writeln!(file, "{}", GOOD).unwrap();

        let report = validate_file(file.path()).unwrap();
        assert_eq!(report.state, ValidationState::Invalid);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.lines_read, 5);
    }

    #[test]
    fn test_invalid_metadata_skips_body() {
        for meta in [r#"{"content": "kml"}"#, r#"{"source": "x"}"#, "garbage"] {
            let file = container(&[meta, GOOD, BAD]);
            let report = validate_file(file.path()).unwrap();
            assert_eq!(report.state, ValidationState::MetadataInvalid);
            assert_eq!(report.lines_read, 1);
            assert_eq!(report.error_count, 0);
        }
    }

    #[test]
    fn test_empty_container() {
        let file = container(&[]);
        let report = validate_file(file.path()).unwrap();
        assert_eq!(report.state, ValidationState::MetadataInvalid);
    }

    #[test]
    fn test_error_cap_stops_reading() {
        let mut lines = vec![META];
        lines.extend(std::iter::repeat(BAD).take(150));
        let file = container(&lines);

        let report = validate_file(file.path()).unwrap();
        assert_eq!(report.state, ValidationState::Invalid);
        assert_eq!(report.error_count, MAX_ERRORS);
        assert_eq!(report.lines_read, MAX_ERRORS + 1);
    }

    #[test]
    fn test_content_list_accepts_either_schema() {
        let radar = r#"{"time": {"unix": 2}, "pos": {"polar": {"bear": 10.0, "elev": 1.0}}}"#;
        let file = container(&[r#"{"content": ["flightlog", "radarlog"]}"#, GOOD, radar]);
        let report = validate_file(file.path()).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.content.len(), 2);
    }

    #[test]
    fn test_blank_line_ends_body() {
        let file = container(&[META, GOOD, "", BAD]);
        let report = validate_file(file.path()).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.lines_read, 3);
    }
}
