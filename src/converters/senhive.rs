//! SenHive detection export (`;` separated, quoted header names).

use std::path::Path;

use super::delimited::{DelimitedReader, Delimiter, Row};
use super::types::{Conversion, Converter, SourceFormat};
use crate::container::RecordSink;
use crate::error::{Error, Result};
use crate::geo::parse_datetime_ms;
use crate::model::{
    ContentType, Identification, Location, Metadata, Position, Timestamp, TrackRecord,
};

pub struct SenHive;

fn row_record(row: &Row<'_>) -> Result<Option<TrackRecord>> {
    let unix = parse_datetime_ms(row.text("timestamp")?).map_err(|e| e.with_line(row.line()))?;

    let (Some(lat), Some(lon), Some(alt)) = (
        row.number("vehicle_location_lat"),
        row.number("vehicle_location_lon"),
        row.number("altitude_gps (m)"),
    ) else {
        return Ok(None);
    };

    let mut uaid = Identification::internal(row.text("track_id")?);
    if let Some(serial) = row.get("vehicle_serial_number") {
        uaid.extra.insert("serial".to_string(), serial.to_string());
    }

    Ok(Some(
        TrackRecord::new(
            Timestamp::from_millis(unix),
            Position::geodetic(Location::new(lat, lon, alt)),
        )
        .with_uaid(uaid),
    ))
}

impl Converter for SenHive {
    fn source(&self) -> SourceFormat {
        SourceFormat::SenHive
    }

    fn convert_to_canonical(
        &self,
        _ctx: &Conversion<'_>,
        mut metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let mut reader = DelimitedReader::open(input, Delimiter::Char(';'))?;

        metadata.stamp(ContentType::FlightLog, self.source().as_ref());
        sink.emit(&metadata)?;

        let mut skipped = 0usize;
        loop {
            let row = match reader.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e @ Error::Io(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!("Skipping unreadable row: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            match row_record(&row) {
                Ok(Some(record)) => sink.emit(&record)?,
                Ok(None) => {
                    tracing::warn!("Invalid data at line {}", row.line());
                    skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping line {}: {}", row.line(), e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            tracing::info!("Skipped {} rows without a usable position", skipped);
        }
        Ok(())
    }
}
