//! Header-addressed reader for delimited text logs (CSV, TSV, space separated).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::container::TextLines;
use crate::error::{Error, Result};

/// Column separator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delimiter {
    Char(char),
    /// Runs of spaces or tabs
    Whitespace,
}

impl Delimiter {
    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Char(c) => line.split(*c).collect(),
            Delimiter::Whitespace => line.split_whitespace().collect(),
        }
    }
}

fn unquote(field: &str) -> &str {
    field.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// Streaming reader that maps each data line onto the header columns.
///
/// A data line that is not valid UTF-8 is reported as a format error for
/// that line; the next call continues with the following line.
pub struct DelimitedReader<R> {
    lines: TextLines<R>,
    header: Vec<String>,
    delimiter: Delimiter,
}

impl DelimitedReader<BufReader<File>> {
    pub fn open(path: &Path, delimiter: Delimiter) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?), delimiter)
    }
}

impl<R: BufRead> DelimitedReader<R> {
    /// Read the header from the first line
    pub fn new(reader: R, delimiter: Delimiter) -> Result<Self> {
        let mut lines = TextLines::new(reader);
        let header_line = lines
            .next()
            .transpose()?
            .ok_or_else(|| Error::format("empty file: no header found"))?;

        Ok(Self::with_header(lines, &header_line, delimiter))
    }

    /// Use an already consumed header line
    pub fn with_header(lines: TextLines<R>, header_line: &str, delimiter: Delimiter) -> Self {
        let header = delimiter
            .split(header_line.trim_start_matches('\u{feff}'))
            .into_iter()
            .map(|name| unquote(name).to_string())
            .collect();

        Self {
            lines,
            header,
            delimiter,
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Next non-blank data row
    pub fn next_row(&mut self) -> Result<Option<Row<'_>>> {
        loop {
            let Some(line) = self.lines.next().transpose()? else {
                return Ok(None);
            };

            if line.trim().is_empty() {
                continue;
            }

            let values = self
                .delimiter
                .split(line.trim_end_matches(['\r', '\n']))
                .into_iter()
                .map(|v| unquote(v).to_string())
                .collect();

            return Ok(Some(Row {
                header: &self.header,
                values,
                line: self.lines.line_no(),
            }));
        }
    }
}

/// One data line, addressed by column name
#[derive(Debug)]
pub struct Row<'a> {
    header: &'a [String],
    values: Vec<String>,
    line: usize,
}

impl Row<'_> {
    /// 1-based line number in the source file
    pub fn line(&self) -> usize {
        self.line
    }

    /// Non-empty value of a column
    pub fn get(&self, name: &str) -> Option<&str> {
        let idx = self.header.iter().position(|h| h == name)?;
        self.values
            .get(idx)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::format_at(format!("missing value for '{}'", name), self.line))
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T> {
        let text = self.text(name)?;
        text.parse().map_err(|_| {
            Error::format_at(format!("invalid value '{}' for '{}'", text, name), self.line)
        })
    }

    /// Optional numeric column: empty or unparsable is `None`
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.parse().ok())
    }
}
