//! G-NetTrack cellular drive-test log (tab separated).
//!
//! Each run gets a fresh track id since the log only names the device.
//! Altitude is above mean sea level and is converted with the geoid model.

use chrono::NaiveDateTime;
use std::path::Path;
use uuid::Uuid;

use super::delimited::{DelimitedReader, Delimiter, Row};
use super::types::{Conversion, Converter, SourceFormat};
use crate::container::RecordSink;
use crate::error::{Error, Result};
use crate::geo::GeoidModel;
use crate::model::{
    CellSignal, ContentType, Identification, Location, Metadata, Position, Timestamp,
    TrackRecord,
};

const TIMESTAMP_FORMAT: &str = "%Y.%m.%d_%H.%M.%S";

/// Columns copied verbatim into the identification block
const EXTRA_IDS: &[(&str, &str)] = &[("IP", "ip"), ("IMEI", "imei"), ("IMSI", "imsi")];

pub struct GNetTrack;

/// Radio name as the cellular signal schema spells it
fn radio_class(tech: &str) -> Option<&'static str> {
    match tech.trim().to_ascii_uppercase().as_str() {
        "LTE" | "4G" => Some("4G"),
        "NR" | "5G" | "5GD" | "NR5G" => Some("5Gd"),
        _ => None,
    }
}

struct RunContext<'a> {
    geoid: &'a GeoidModel,
    track_id: String,
}

impl RunContext<'_> {
    fn record(&self, row: &Row<'_>) -> Result<TrackRecord> {
        let original = row.text("Timestamp")?;
        let unix = NaiveDateTime::parse_from_str(original, TIMESTAMP_FORMAT)
            .map_err(|_| {
                Error::format_at(format!("invalid timestamp '{}'", original), row.line())
            })?
            .and_utc()
            .timestamp_millis();

        let lat: f64 = row.parse("Latitude")?;
        let lon: f64 = row.parse("Longitude")?;
        let amsl: f64 = row.parse("Altitude")?;
        let mut loc = Location::new(lat, lon, self.geoid.ellipsoidal_height(lat, lon, amsl));
        loc.amsl = Some(amsl);

        let mut uaid =
            Identification::internal(format!("{}:{}", row.text("DEVICE")?, self.track_id));
        for (column, key) in EXTRA_IDS {
            if let Some(value) = row.get(column) {
                uaid.extra.insert(key.to_string(), value.to_string());
            }
        }

        let mut record = TrackRecord::new(
            Timestamp {
                unix,
                original: Some(original.to_string()),
            },
            Position::geodetic(loc),
        )
        .with_uaid(uaid);

        record.cellsig = match row.get("NetworkTech") {
            None => None,
            Some(tech) => match radio_class(tech) {
                Some(radio) => Some(CellSignal {
                    radio: radio.to_string(),
                    rsrp: row.number("CSI_RSRP"),
                    rsrq: row.number("CSI_RSRQ"),
                    rssi: None,
                    sinr: None,
                }),
                None => {
                    tracing::warn!(
                        "Line {}: no cell signal for network type '{}'",
                        row.line(),
                        tech
                    );
                    None
                }
            },
        };

        Ok(record)
    }
}

impl Converter for GNetTrack {
    fn source(&self) -> SourceFormat {
        SourceFormat::GNetTrack
    }

    fn convert_to_canonical(
        &self,
        ctx: &Conversion<'_>,
        mut metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let geoid = ctx.geoid_for(&mut metadata)?;
        let mut reader = DelimitedReader::open(input, Delimiter::Char('\t'))?;

        let context = RunContext {
            geoid,
            track_id: Uuid::new_v4().to_string(),
        };
        tracing::debug!("Track id for this run: {}", context.track_id);

        metadata.stamp(ContentType::FlightLog, self.source().as_ref());
        sink.emit(&metadata)?;

        loop {
            let row = match reader.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e @ Error::Io(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!("Skipping unreadable row: {}", e);
                    continue;
                }
            };

            match context.record(&row) {
                Ok(record) => sink.emit(&record)?,
                Err(e) => tracing::warn!("Skipping line {}: {}", row.line(), e),
            }
        }
        Ok(())
    }
}
