//! Error taxonomy shared by every stage of the conversion pipeline.

use thiserror::Error;

/// Errors raised while reading, converting or validating track data
#[derive(Debug, Error)]
pub enum Error {
    /// A line or structure could not be decoded at all
    #[error("format error{}: {message}", at_line(.line))]
    Format { message: String, line: Option<usize> },

    /// Decoded data violates the canonical shape
    #[error("schema error{}: {message}", at_line(.line))]
    Schema { message: String, line: Option<usize> },

    /// A required option is missing or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// An external resource (geoid model, sensor file) is unavailable
    #[error("resource error: {0}")]
    Resource(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn at_line(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" at line {}", n),
        None => String::new(),
    }
}

impl Error {
    pub fn format(message: impl Into<String>) -> Self {
        Error::Format {
            message: message.into(),
            line: None,
        }
    }

    pub fn format_at(message: impl Into<String>, line: usize) -> Self {
        Error::Format {
            message: message.into(),
            line: Some(line),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema {
            message: message.into(),
            line: None,
        }
    }

    /// Attach a line number to format and schema errors that lack one
    pub fn with_line(self, line: usize) -> Self {
        match self {
            Error::Format { message, line: None } => Error::Format {
                message,
                line: Some(line),
            },
            Error::Schema { message, line: None } => Error::Schema {
                message,
                line: Some(line),
            },
            other => other,
        }
    }

    /// True for errors caused by the user's input or options rather than the system
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Error::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.into())
        } else {
            Error::format(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_line() {
        let err = Error::format_at("bad json", 7);
        assert_eq!(err.to_string(), "format error at line 7: bad json");

        let err = Error::schema("missing time");
        assert_eq!(err.to_string(), "schema error: missing time");
    }

    #[test]
    fn test_with_line_keeps_existing_line() {
        let err = Error::format_at("x", 3).with_line(9);
        assert!(matches!(err, Error::Format { line: Some(3), .. }));

        let err = Error::format("x").with_line(9);
        assert!(matches!(err, Error::Format { line: Some(9), .. }));
    }

    #[test]
    fn test_json_error_maps_to_format() {
        let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Format { .. }));
        assert!(err.is_user_error());
    }
}
