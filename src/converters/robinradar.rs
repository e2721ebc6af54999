//! Robin Radar track log.
//!
//! The log is plain text with `<Robin>...</Robin>` XML blocks. Each block
//! holds one or more tracks:
//!
//! ```xml
//! <Robin>
//!   <Track id="A">
//!     <Timestamp>2024-03-01T12:00:00.000Z</Timestamp>
//!     <Position>
//!       <Latitude>1.0</Latitude>
//!       <Longitude>2.0</Longitude>
//!       <Altitude>3.0</Altitude>
//!     </Position>
//!   </Track>
//! </Robin>
//! ```
//!
//! A malformed block is reported and skipped.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::types::{Conversion, Converter, SourceFormat};
use crate::container::RecordSink;
use crate::dispatch::{parse_block, Attributes, BlockFramer, Constructor, Context};
use crate::error::{Error, Result};
use crate::geo::parse_datetime_ms;
use crate::model::{
    ContentType, Identification, Location, Metadata, Position, Timestamp, TrackRecord,
};

pub const OPEN_MARKER: &str = "<Robin>";
pub const CLOSE_MARKER: &str = "</Robin>";

pub struct RobinRadar;

#[derive(Debug, Default)]
pub struct TrackState {
    id: String,
    time: Option<i64>,
    loc: Option<Location>,
}

#[derive(Debug, Default)]
pub struct PositionState {
    lat: Option<f64>,
    lon: Option<f64>,
    alt: Option<f64>,
}

/// One open element of a Robin block
#[derive(Debug)]
pub enum RobinContext {
    Root,
    PassThrough,
    Track(TrackState),
    Timestamp(String),
    Position(PositionState),
    Latitude(String),
    Longitude(String),
    Altitude(String),
}

fn track(attrs: &Attributes) -> Result<RobinContext> {
    let id = attrs
        .get("id")
        .ok_or_else(|| Error::format("Track element without an id attribute"))?;
    Ok(RobinContext::Track(TrackState {
        id: id.to_string(),
        ..TrackState::default()
    }))
}

fn timestamp(_: &Attributes) -> Result<RobinContext> {
    Ok(RobinContext::Timestamp(String::new()))
}

fn position(_: &Attributes) -> Result<RobinContext> {
    Ok(RobinContext::Position(PositionState::default()))
}

fn latitude(_: &Attributes) -> Result<RobinContext> {
    Ok(RobinContext::Latitude(String::new()))
}

fn longitude(_: &Attributes) -> Result<RobinContext> {
    Ok(RobinContext::Longitude(String::new()))
}

fn altitude(_: &Attributes) -> Result<RobinContext> {
    Ok(RobinContext::Altitude(String::new()))
}

fn leaf_value(name: &str, text: &str) -> Result<f64> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::format(format!("incomplete {} record", name)));
    }
    text.parse()
        .map_err(|_| Error::format(format!("invalid {} '{}'", name, text)))
}

impl Context for RobinContext {
    const HANDLERS: &'static [(&'static str, Constructor<Self>)] = &[
        ("Track", track),
        ("Timestamp", timestamp),
        ("Position", position),
        ("Latitude", latitude),
        ("Longitude", longitude),
        ("Altitude", altitude),
    ];

    fn root() -> Self {
        RobinContext::Root
    }

    fn pass_through() -> Self {
        RobinContext::PassThrough
    }

    fn characters(&mut self, text: &str) {
        match self {
            RobinContext::Timestamp(buf)
            | RobinContext::Latitude(buf)
            | RobinContext::Longitude(buf)
            | RobinContext::Altitude(buf) => buf.push_str(text),
            _ => {}
        }
    }

    fn close(self, parent: &mut Self, sink: &mut dyn RecordSink) -> Result<()> {
        match self {
            RobinContext::Root | RobinContext::PassThrough => {}

            RobinContext::Track(state) => {
                let unix = state
                    .time
                    .ok_or_else(|| Error::format(format!("track {} has no timestamp", state.id)))?;
                let loc = state
                    .loc
                    .ok_or_else(|| Error::format(format!("track {} has no position", state.id)))?;

                let record = TrackRecord::new(Timestamp::from_millis(unix), Position::geodetic(loc))
                    .with_uaid(Identification::internal(state.id));
                sink.emit(&record)?;
            }

            RobinContext::Timestamp(text) => {
                if text.trim().is_empty() {
                    return Err(Error::format("incomplete timestamp record"));
                }
                let unix = parse_datetime_ms(&text)?;
                if let RobinContext::Track(track) = parent {
                    track.time = Some(unix);
                }
            }

            RobinContext::Position(state) => {
                let (Some(lat), Some(lon), Some(alt)) = (state.lat, state.lon, state.alt) else {
                    return Err(Error::format("incomplete position record"));
                };
                if let RobinContext::Track(track) = parent {
                    track.loc = Some(Location::new(lat, lon, alt));
                }
            }

            RobinContext::Latitude(text) => {
                let value = leaf_value("latitude", &text)?;
                if let RobinContext::Position(pos) = parent {
                    pos.lat = Some(value);
                }
            }

            RobinContext::Longitude(text) => {
                let value = leaf_value("longitude", &text)?;
                if let RobinContext::Position(pos) = parent {
                    pos.lon = Some(value);
                }
            }

            RobinContext::Altitude(text) => {
                let value = leaf_value("altitude", &text)?;
                if let RobinContext::Position(pos) = parent {
                    pos.alt = Some(value);
                }
            }
        }
        Ok(())
    }
}

impl Converter for RobinRadar {
    fn source(&self) -> SourceFormat {
        SourceFormat::RobinRadar
    }

    fn convert_to_canonical(
        &self,
        _ctx: &Conversion<'_>,
        mut metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let reader = BufReader::new(File::open(input)?);

        metadata.stamp(ContentType::FlightLog, self.source().as_ref());
        sink.emit(&metadata)?;

        let mut parsed = 0usize;
        let mut failed = 0usize;

        for block in BlockFramer::new(reader, OPEN_MARKER, CLOSE_MARKER) {
            let block = block?;
            match block
                .text()
                .and_then(|text| parse_block::<RobinContext>(text, sink))
            {
                Ok(()) => parsed += 1,
                Err(e @ Error::Io(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Error parsing block {} line {}: {}",
                        block.number,
                        block.start_line,
                        e
                    );
                    failed += 1;
                }
            }
        }

        tracing::info!("Parsed {} blocks, skipped {}", parsed, failed);
        Ok(())
    }
}
