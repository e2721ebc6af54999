//! Courageous multi-track JSON export.
//!
//! The file is a single JSON document with `tracks[].records[]`. Tracks are
//! stored one after another, so records are collected and sorted by time
//! before writing.
//!
//! The same file yields either a flight log (from `Position3d` locations) or
//! a radar log (from `BearingElevation` locations), picked by the conversion
//! target.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use super::types::{Conversion, Converter, SourceFormat};
use crate::config::Target;
use crate::container::RecordSink;
use crate::error::{Error, Result};
use crate::geo::GeoidModel;
use crate::model::{Identification, Location, Metadata, Polar, Position, Timestamp, TrackRecord};

pub struct Courageous;

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    name: Option<String>,
    uas_id: Option<Value>,
    #[serde(default)]
    records: Vec<Value>,
}

impl Track {
    fn identification(&self) -> Identification {
        let name = self.name.as_deref().unwrap_or("unknown");
        let id = match &self.uas_id {
            None | Some(Value::Null) => "noid".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        Identification::internal(format!("{}-{}", name, id))
    }
}

#[derive(Debug, Deserialize)]
struct Record {
    time: i64,
    location: Value,
}

#[derive(Debug, Deserialize)]
struct Position3d {
    lat: f64,
    lon: f64,
    height_amsl: f64,
}

#[derive(Debug, Deserialize)]
struct BearingElevation {
    bearing: f64,
    elevation: f64,
}

/// Location encodings: `{"t": kind, "c": payload}` or `{kind: payload}`
fn location_payload<'a>(location: &'a Value, kind: &str) -> Option<&'a Value> {
    if location.get("t").and_then(Value::as_str) == Some(kind) {
        return location.get("c");
    }
    location.get(kind)
}

fn location_kind(location: &Value) -> String {
    match location.get("t").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => location
            .as_object()
            .and_then(|o| o.keys().next().cloned())
            .unwrap_or_else(|| "none".to_string()),
    }
}

fn cartesian_position(location: &Value, geoid: &GeoidModel) -> Result<Option<Position>> {
    let Some(payload) = location_payload(location, "Position3d") else {
        return Ok(None);
    };

    let p = Position3d::deserialize(payload)?;
    let mut loc = Location::new(
        p.lat,
        p.lon,
        geoid.ellipsoidal_height(p.lat, p.lon, p.height_amsl),
    );
    loc.amsl = Some(p.height_amsl);
    Ok(Some(Position::geodetic(loc)))
}

fn polar_position(location: &Value) -> Result<Option<Position>> {
    let Some(payload) = location_payload(location, "BearingElevation") else {
        return Ok(None);
    };

    let p = BearingElevation::deserialize(payload)?;
    Ok(Some(Position::polar(Polar {
        bear: p.bearing,
        elev: p.elevation,
    })))
}

impl Converter for Courageous {
    fn source(&self) -> SourceFormat {
        SourceFormat::Courageous
    }

    fn convert_to_canonical(
        &self,
        ctx: &Conversion<'_>,
        mut metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let geoid = match ctx.options.target {
            Target::FlightLog => Some(ctx.geoid_for(&mut metadata)?),
            Target::RadarLog => None,
        };

        let text = std::fs::read_to_string(input)?;
        let document: Document = serde_json::from_str(&text).map_err(|e| {
            Error::format(format!("cannot parse {}: {}", input.display(), e))
        })?;

        metadata.stamp(ctx.options.target.content(), self.source().as_ref());
        sink.emit(&metadata)?;

        let mut entries = Vec::new();

        for (track_idx, track) in document.tracks.iter().enumerate() {
            let uaid = track.identification();

            for (record_idx, raw) in track.records.iter().enumerate() {
                let position = Record::deserialize(raw)
                    .map_err(Error::from)
                    .and_then(|record| {
                        let position = match geoid {
                            Some(geoid) => cartesian_position(&record.location, geoid)?,
                            None => polar_position(&record.location)?,
                        };
                        Ok((record, position))
                    });

                match position {
                    Ok((record, Some(pos))) => entries.push(
                        TrackRecord::new(Timestamp::from_millis(record.time), pos)
                            .with_uaid(uaid.clone()),
                    ),
                    Ok((record, None)) => tracing::warn!(
                        "Unused location format: {}",
                        location_kind(&record.location)
                    ),
                    Err(e) => tracing::warn!(
                        "Skipping track {} record {}: {}",
                        track_idx,
                        record_idx,
                        e
                    ),
                }
            }
        }

        entries.sort_by_key(|entry| entry.time.unix);

        for entry in &entries {
            sink.emit(entry)?;
        }

        tracing::info!(
            "Converted {} records from {} tracks",
            entries.len(),
            document.tracks.len()
        );
        Ok(())
    }
}
