//! DatCon flight record export.
//!
//! Space separated. Header columns may carry a parenthesised comment, e.g.
//! `Altitude (meters above sea)`, which is dropped from the column name.
//! That altitude is above mean sea level and goes through the geoid model.

use regex::Regex;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::delimited::{DelimitedReader, Delimiter, Row};
use super::types::{Conversion, Converter, SourceFormat};
use crate::container::{RecordSink, TextLines};
use crate::error::{Error, Result};
use crate::geo::GeoidModel;
use crate::model::{
    ContentType, Identification, Location, Metadata, Position, Timestamp, TrackRecord,
};

const NANOS_PER_MILLI: i64 = 1_000_000;

pub struct DatCon;

fn row_record(row: &Row<'_>, geoid: &GeoidModel) -> Result<TrackRecord> {
    let tz = row.text("TZ")?;
    if tz != "UTC" {
        return Err(Error::format_at(
            format!("unsupported time zone '{}'", tz),
            row.line(),
        ));
    }

    let id = match row.text("GUID")? {
        "N/A" => row.text("ID")?,
        guid => guid,
    };

    let lat: f64 = row.parse("Latitude")?;
    let lon: f64 = row.parse("Longitude")?;
    let amsl: f64 = row.parse("Altitude")?;
    let mut loc = Location::new(lat, lon, geoid.ellipsoidal_height(lat, lon, amsl));
    loc.amsl = Some(amsl);

    Ok(TrackRecord::new(
        Timestamp::from_millis(row.parse::<i64>("TS")? / NANOS_PER_MILLI),
        Position::geodetic(loc),
    )
    .with_uaid(Identification::internal(id)))
}

impl Converter for DatCon {
    fn source(&self) -> SourceFormat {
        SourceFormat::DatCon
    }

    fn convert_to_canonical(
        &self,
        ctx: &Conversion<'_>,
        mut metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let geoid = ctx.geoid_for(&mut metadata)?;
        let mut lines = TextLines::new(BufReader::new(File::open(input)?));

        metadata.stamp(ContentType::FlightLog, self.source().as_ref());
        sink.emit(&metadata)?;

        let Some(header) = lines.next().transpose()? else {
            tracing::warn!("{} is empty", input.display());
            return Ok(());
        };

        let comment = Regex::new(r"\s*\([^)]*\)").map_err(|e| Error::format(e.to_string()))?;
        let header = comment.replace_all(&header, "");
        let mut reader = DelimitedReader::with_header(lines, &header, Delimiter::Whitespace);

        while let Some(row) = reader.next_row()? {
            sink.emit(&row_record(&row, geoid)?)?;
        }
        Ok(())
    }
}
