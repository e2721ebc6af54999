//! ART radar track log (space separated, nanosecond timestamps).

use std::path::Path;

use super::delimited::{DelimitedReader, Delimiter, Row};
use super::types::{Conversion, Converter, SourceFormat};
use crate::container::RecordSink;
use crate::error::{Error, Result};
use crate::model::{
    ContentType, Identification, Location, Metadata, Position, Timestamp, TrackRecord,
};

pub struct ArtLog;

fn row_record(row: &Row<'_>) -> Result<TrackRecord> {
    let zone = row.text("TimeZone")?;
    if zone != "UTC" {
        return Err(Error::format_at(
            format!("unsupported time zone '{}'", zone),
            row.line(),
        ));
    }

    let nanos: i64 = row.parse("Timestamp_nsec")?;
    let loc = Location::new(
        row.parse("Latitude")?,
        row.parse("Longitude")?,
        row.parse("Altitude")?,
    );

    Ok(
        TrackRecord::new(Timestamp::from_millis(nanos / 1_000_000), Position::geodetic(loc))
            .with_uaid(Identification::internal(row.text("TrackUUID")?)),
    )
}

impl Converter for ArtLog {
    fn source(&self) -> SourceFormat {
        SourceFormat::ArtLog
    }

    fn convert_to_canonical(
        &self,
        _ctx: &Conversion<'_>,
        mut metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let mut reader = DelimitedReader::open(input, Delimiter::Whitespace)?;

        metadata.stamp(ContentType::FlightLog, self.source().as_ref());
        sink.emit(&metadata)?;

        while let Some(row) = reader.next_row()? {
            sink.emit(&row_record(&row)?)?;
        }
        Ok(())
    }
}
