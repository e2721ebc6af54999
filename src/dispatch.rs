//! Element dispatch parser for XML fragments embedded in line-oriented logs.
//!
//! Some sensor logs interleave plain text with self-contained XML blocks.
//! Parsing happens in two stages:
//!
//! 1. [`BlockFramer`] cuts the input into [`Block`]s between an open and a
//!    close marker (e.g. `<Robin>` / `</Robin>`).
//! 2. [`parse_block`] tokenizes one block with `quick-xml` and drives a stack
//!    of [`Context`] values. Element names are resolved through a static
//!    name → constructor table on the context type; unknown elements get a
//!    pass-through context so that markup of no interest never disturbs the
//!    stack.
//!
//! Closing an element hands the context to its parent (the element below it
//! on the stack). That is where leaves write their values upward and where
//! record roots emit finished records.
//!
//! Every block is parsed with a fresh stack. Records emitted inside a block
//! only reach the sink once the whole block has parsed, so a failing block
//! leaves no partial output behind.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use std::fmt::Display;
use std::io::BufRead;

use crate::container::{strip_newline, RecordSink};
use crate::error::{Error, Result};

/// One framed fragment of the input
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// 1-based block counter
    pub number: usize,
    /// Line holding the open marker
    pub start_line: usize,
    /// Raw bytes from the open marker through the close marker
    pub bytes: Vec<u8>,
}

impl Block {
    /// Block content as text; undecodable bytes fail this block only
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes).map_err(|e| {
            Error::format_at(format!("invalid UTF-8: {}", e), self.start_line)
        })
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits line-oriented input into marker-delimited blocks.
///
/// A block ends at the first close marker after its open marker. Text after
/// it on the same line is searched for the next open marker. A block still
/// open at end of input is dropped with a warning.
pub struct BlockFramer<R> {
    reader: R,
    open: &'static str,
    close: &'static str,
    /// Unconsumed rest of the current line
    carry: Vec<u8>,
    line_no: usize,
    count: usize,
    done: bool,
}

impl<R: BufRead> BlockFramer<R> {
    pub fn new(reader: R, open: &'static str, close: &'static str) -> Self {
        Self {
            reader,
            open,
            close,
            carry: Vec::new(),
            line_no: 0,
            count: 0,
            done: false,
        }
    }

    fn next_line(&mut self) -> Option<std::io::Result<Vec<u8>>> {
        let mut bytes = Vec::new();
        match self.reader.read_until(b'\n', &mut bytes) {
            Ok(0) => None,
            Ok(_) => {
                self.line_no += 1;
                strip_newline(&mut bytes);
                Some(Ok(bytes))
            }
            Err(e) => Some(Err(e)),
        }
    }

    fn fail(&mut self, err: std::io::Error) -> Option<Result<Block>> {
        self.done = true;
        Some(Err(err.into()))
    }
}

impl<R: BufRead> Iterator for BlockFramer<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut bytes = loop {
            if let Some(start) = find(&self.carry, self.open.as_bytes()) {
                break self.carry.split_off(start);
            }
            match self.next_line() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => return self.fail(e),
                Some(Ok(line)) => self.carry = line,
            }
        };
        self.carry.clear();

        self.count += 1;
        let start_line = self.line_no;
        let mut searched = self.open.len();

        loop {
            if let Some(pos) = find(&bytes[searched..], self.close.as_bytes()) {
                self.carry = bytes.split_off(searched + pos + self.close.len());
                return Some(Ok(Block {
                    number: self.count,
                    start_line,
                    bytes,
                }));
            }

            match self.next_line() {
                Some(Ok(line)) => {
                    bytes.push(b'\n');
                    searched = bytes.len();
                    bytes.extend_from_slice(&line);
                }
                Some(Err(e)) => return self.fail(e),
                None => {
                    tracing::warn!(
                        "Block {} starting at line {} is not closed before end of input",
                        self.count,
                        start_line
                    );
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

/// Attributes of an element-start event
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_error)?;
            let value = attr.unescape_value().map_err(xml_error)?;
            attrs.push((key.to_string(), value.into_owned()));
        }
        Ok(Self(attrs))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Attributes {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

fn xml_error(err: impl Display) -> Error {
    Error::format(format!("malformed block: {}", err))
}

/// Builds the context for a recognized element
pub type Constructor<C> = fn(&Attributes) -> Result<C>;

/// Per-element parse state.
///
/// Implementors are usually a sum type over every element role they know.
pub trait Context: Sized + 'static {
    /// Element name to constructor table
    const HANDLERS: &'static [(&'static str, Constructor<Self>)];

    /// Bottom of the stack, below the block's outermost element
    fn root() -> Self;

    /// Context for elements missing from [`Context::HANDLERS`]
    fn pass_through() -> Self;

    /// Character data inside the element. Ignored unless overridden.
    fn characters(&mut self, _text: &str) {}

    /// The element has ended; `parent` is the enclosing context
    fn close(self, parent: &mut Self, sink: &mut dyn RecordSink) -> Result<()>;
}

/// Context stack for one block
pub struct Dispatcher<'s, C: Context> {
    stack: Vec<C>,
    sink: &'s mut dyn RecordSink,
}

impl<'s, C: Context> Dispatcher<'s, C> {
    pub fn new(sink: &'s mut dyn RecordSink) -> Self {
        Self {
            stack: vec![C::root()],
            sink,
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn start(&mut self, name: &str, attrs: &Attributes) -> Result<()> {
        let context = match C::HANDLERS.iter().find(|(tag, _)| *tag == name) {
            Some((_, construct)) => construct(attrs)?,
            None => C::pass_through(),
        };
        self.stack.push(context);
        Ok(())
    }

    pub fn characters(&mut self, text: &str) {
        if let Some(top) = self.stack.last_mut() {
            top.characters(text);
        }
    }

    pub fn end(&mut self) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(Error::format("end tag without a matching start tag"));
        }
        let Some(context) = self.stack.pop() else {
            return Err(Error::format("context stack is empty"));
        };
        let Some(parent) = self.stack.last_mut() else {
            return Err(Error::format("context stack is empty"));
        };
        context.close(parent, self.sink)
    }

    /// Check that every element was closed
    pub fn finish(self) -> Result<()> {
        match self.depth() {
            0 => Ok(()),
            open => Err(Error::format(format!("{} elements left open", open))),
        }
    }
}

/// Parse one framed block, emitting records to `sink` only if it succeeds
pub fn parse_block<C: Context>(text: &str, sink: &mut dyn RecordSink) -> Result<()> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut pending: Vec<Value> = Vec::new();
    let mut dispatcher = Dispatcher::<C>::new(&mut pending);

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => {
                let name = std::str::from_utf8(start.name().as_ref())
                    .map_err(xml_error)?
                    .to_string();
                dispatcher.start(&name, &Attributes::from_start(&start)?)?;
            }
            Event::Empty(start) => {
                let name = std::str::from_utf8(start.name().as_ref())
                    .map_err(xml_error)?
                    .to_string();
                dispatcher.start(&name, &Attributes::from_start(&start)?)?;
                dispatcher.end()?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_error)?;
                dispatcher.characters(&text);
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                dispatcher.characters(std::str::from_utf8(&bytes).map_err(xml_error)?);
            }
            Event::End(_) => dispatcher.end()?,
            Event::Eof => break,
            _ => {}
        }
    }

    dispatcher.finish()?;

    for value in &pending {
        sink.write_value(value)?;
    }
    Ok(())
}
