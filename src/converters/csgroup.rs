//! CS Group track export (comma separated).
//!
//! Columns used: `event_type`, `datetime_ms`, `track_id`, `latitude`,
//! `longitude`, `altitude`. Only `TRACK` events carry positions.

use std::path::Path;

use super::delimited::{DelimitedReader, Delimiter};
use super::types::{Conversion, Converter, SourceFormat};
use crate::container::RecordSink;
use crate::error::Result;
use crate::model::{
    ContentType, Identification, Location, Metadata, Position, Timestamp, TrackRecord,
};

pub struct CsGroup;

impl Converter for CsGroup {
    fn source(&self) -> SourceFormat {
        SourceFormat::CsGroup
    }

    fn convert_to_canonical(
        &self,
        _ctx: &Conversion<'_>,
        mut metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let mut reader = DelimitedReader::open(input, Delimiter::Char(','))?;

        metadata.stamp(ContentType::FlightLog, self.source().as_ref());
        sink.emit(&metadata)?;

        let mut count = 0usize;
        while let Some(row) = reader.next_row()? {
            if row.get("event_type") != Some("TRACK") {
                continue;
            }

            let loc = Location::new(
                row.parse("latitude")?,
                row.parse("longitude")?,
                row.parse("altitude")?,
            );

            let record = TrackRecord::new(
                Timestamp::from_millis(row.parse("datetime_ms")?),
                Position::geodetic(loc),
            )
            .with_uaid(Identification::internal(row.text("track_id")?));

            sink.emit(&record)?;
            count += 1;
        }

        tracing::info!("Converted {} track events", count);
        Ok(())
    }
}
