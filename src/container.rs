//! Line-oriented container stream.
//!
//! A container is UTF-8 text with one JSON object per line. Line 1 is always
//! the metadata object, the remaining lines are content records. A blank line
//! ends reading.

use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Callback invoked with the number of bytes consumed by each read
pub type ProgressObserver = Box<dyn FnMut(usize)>;

/// Direction a container is opened in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

enum Handle {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

/// Anything that accepts canonical records, one per call
pub trait RecordSink {
    fn write_value(&mut self, value: &Value) -> Result<()>;
}

impl dyn RecordSink + '_ {
    /// Serialize a typed record and hand it to the sink
    pub fn emit<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.write_value(&value)
    }
}

impl RecordSink for Vec<Value> {
    fn write_value(&mut self, value: &Value) -> Result<()> {
        self.push(value.clone());
        Ok(())
    }
}

/// Reader/writer over a container file.
///
/// The stream owns its file handle between [`ContainerStream::open`] and
/// [`ContainerStream::close`] (or drop).
pub struct ContainerStream {
    path: PathBuf,
    mode: Mode,
    handle: Option<Handle>,
    line_no: usize,
    observer: Option<ProgressObserver>,
}

impl ContainerStream {
    /// Create an unopened stream
    pub fn new(path: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            path: path.into(),
            mode,
            handle: None,
            line_no: 0,
            observer: None,
        }
    }

    /// Open `path` for reading
    pub fn open_read(path: impl Into<PathBuf>) -> Result<Self> {
        let mut stream = Self::new(path, Mode::Read);
        stream.open()?;
        Ok(stream)
    }

    /// Create or truncate `path` for writing
    pub fn open_write(path: impl Into<PathBuf>) -> Result<Self> {
        let mut stream = Self::new(path, Mode::Write);
        stream.open()?;
        Ok(stream)
    }

    /// Attach a byte-count observer called after every read
    pub fn with_observer(mut self, observer: impl FnMut(usize) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn open(&mut self) -> Result<()> {
        let handle = match self.mode {
            Mode::Read => Handle::Reader(BufReader::new(File::open(&self.path)?)),
            Mode::Write => Handle::Writer(BufWriter::new(File::create(&self.path)?)),
        };

        self.handle = Some(handle);
        self.line_no = 0;
        Ok(())
    }

    /// Flush pending output and release the file handle
    pub fn close(&mut self) -> Result<()> {
        if let Some(Handle::Writer(mut writer)) = self.handle.take() {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of the last line read or written (1-based, 0 before the first)
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Read and decode the next line.
    ///
    /// Returns `Ok(None)` at end of input or on a blank line.
    pub fn read(&mut self) -> Result<Option<Value>> {
        let reader = match self.handle.as_mut() {
            Some(Handle::Reader(reader)) => reader,
            Some(Handle::Writer(_)) => {
                return Err(not_open(&self.path, "container is opened for writing"))
            }
            None => return Err(not_open(&self.path, "container is not open")),
        };

        let mut bytes = Vec::new();
        let consumed = reader.read_until(b'\n', &mut bytes)?;
        self.line_no += 1;

        if let Some(observer) = self.observer.as_mut() {
            observer(consumed);
        }

        let line = decode_line(bytes, self.line_no)?;
        if line.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&line).map_err(|e| Error::format_at(e.to_string(), self.line_no))
    }

    /// Lazy forward-only sequence of the remaining records
    pub fn iterate(&mut self) -> Records<'_> {
        Records {
            stream: self,
            done: false,
        }
    }

    /// Serialize one record as one line
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let writer = match self.handle.as_mut() {
            Some(Handle::Writer(writer)) => writer,
            Some(Handle::Reader(_)) => {
                return Err(not_open(&self.path, "container is opened for reading"))
            }
            None => return Err(not_open(&self.path, "container is not open")),
        };

        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        self.line_no += 1;
        Ok(())
    }
}

impl RecordSink for ContainerStream {
    fn write_value(&mut self, value: &Value) -> Result<()> {
        self.write(value)
    }
}

impl Drop for ContainerStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

fn not_open(path: &Path, reason: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        format!("{}: {}", path.display(), reason),
    ))
}

/// Drop the line terminator (`\n` or `\r\n`)
pub(crate) fn strip_newline(bytes: &mut Vec<u8>) {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
}

/// Decode one raw line; bad UTF-8 is a format error for that line only
pub(crate) fn decode_line(bytes: Vec<u8>, line: usize) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| Error::format_at(format!("invalid UTF-8: {}", e.utf8_error()), line))
}

/// Text lines of a reader, without terminators.
///
/// Unlike [`BufRead::lines`], a line that is not valid UTF-8 yields a
/// [`Error::Format`] for that line and iteration goes on. I/O errors end
/// the iteration.
pub struct TextLines<R> {
    reader: R,
    line_no: usize,
    done: bool,
}

impl<R: BufRead> TextLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            done: false,
        }
    }

    /// Number of the last line returned
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for TextLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut bytes = Vec::new();
        match self.reader.read_until(b'\n', &mut bytes) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                self.line_no += 1;
                strip_newline(&mut bytes);
                Some(decode_line(bytes, self.line_no))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

/// Iterator returned by [`ContainerStream::iterate`]
pub struct Records<'a> {
    stream: &'a mut ContainerStream,
    done: bool,
}

impl Records<'_> {
    pub fn line_no(&self) -> usize {
        self.stream.line_no()
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.stream.read() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            // Decode failures are per line; I/O failures end the sequence
            Err(e @ Error::Format { .. }) => Some(Err(e)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
