//! NMEA-0183 GGA fixes.
//!
//! GGA sentences only carry a time of day, so a base date must be supplied.
//! Ellipsoidal altitude is the antenna altitude plus the geoid separation
//! field; the geoid model fills in when a receiver leaves that field empty.

use chrono::NaiveTime;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::types::{Conversion, Converter, SourceFormat};
use crate::container::{RecordSink, TextLines};
use crate::error::{Error, Result};
use crate::geo::{combine_ms, parse_latitude, parse_longitude, GeoidModel};
use crate::model::{ContentType, Location, Metadata, Position, Timestamp, TrackRecord};

pub struct Nmea;

/// One decoded GGA sentence
#[derive(Clone, Debug, PartialEq)]
pub struct GgaFix {
    pub time: NaiveTime,
    pub lat: f64,
    pub lon: f64,
    /// Antenna altitude above mean sea level
    pub altitude: f64,
    pub separation: Option<f64>,
}

impl GgaFix {
    pub fn ellipsoidal_altitude(&self, geoid: &GeoidModel) -> f64 {
        match self.separation {
            Some(separation) => self.altitude + separation,
            None => geoid.ellipsoidal_height(self.lat, self.lon, self.altitude),
        }
    }

    pub fn location(&self, geoid: &GeoidModel) -> Location {
        let mut loc = Location::new(self.lat, self.lon, self.ellipsoidal_altitude(geoid));
        loc.amsl = Some(self.altitude);
        loc
    }
}

fn verify_checksum(body: &str, checksum: &str) -> Result<()> {
    let expected = u8::from_str_radix(checksum.trim(), 16)
        .map_err(|_| Error::format(format!("invalid checksum '{}'", checksum.trim())))?;
    let actual = body.bytes().fold(0u8, |acc, b| acc ^ b);

    if actual != expected {
        return Err(Error::format(format!(
            "checksum mismatch: expected {:02X}, computed {:02X}",
            expected, actual
        )));
    }
    Ok(())
}

fn number(fields: &[&str], idx: usize, name: &str) -> Result<f64> {
    let text = fields.get(idx).copied().unwrap_or("");
    text.parse()
        .map_err(|_| Error::format(format!("invalid {} '{}'", name, text)))
}

/// Decode a line as a GGA sentence.
///
/// Returns `Ok(None)` for lines that hold no sentence, other sentence types
/// and GGA sentences without a fix.
pub fn parse_gga(line: &str) -> Result<Option<GgaFix>> {
    let Some(start) = line.find('$') else {
        return Ok(None);
    };
    let sentence = line[start + 1..].trim_end();

    let body = match sentence.split_once('*') {
        Some((body, checksum)) => {
            verify_checksum(body, checksum)?;
            body
        }
        None => sentence,
    };

    let fields: Vec<&str> = body.split(',').collect();
    if !fields[0].ends_with("GGA") {
        return Ok(None);
    }
    if fields.len() < 10 {
        return Err(Error::format(format!(
            "GGA sentence has {} fields",
            fields.len()
        )));
    }

    if matches!(fields[6], "" | "0") {
        return Ok(None);
    }

    let time = NaiveTime::parse_from_str(fields[1], "%H%M%S%.f")
        .map_err(|_| Error::format(format!("invalid time '{}'", fields[1])))?;
    let lat = parse_latitude(&format!("{},{}", fields[2], fields[3]))?;
    let lon = parse_longitude(&format!("{},{}", fields[4], fields[5]))?;
    let altitude = number(&fields, 9, "altitude")?;
    let separation = match fields.get(11).copied() {
        None | Some("") => None,
        Some(_) => Some(number(&fields, 11, "geoid separation")?),
    };

    Ok(Some(GgaFix {
        time,
        lat,
        lon,
        altitude,
        separation,
    }))
}

/// GGA fixes read one line at a time.
///
/// Unreadable lines and sentences are skipped with a warning. Only I/O
/// failures end the iteration with an error.
pub struct GgaReader<R> {
    lines: TextLines<R>,
}

impl GgaReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> GgaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: TextLines::new(reader),
        }
    }
}

impl<R: BufRead> Iterator for GgaReader<R> {
    type Item = Result<GgaFix>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e @ Error::Io(_)) => return Some(Err(e)),
                Err(e) => {
                    tracing::warn!("Skipping line {}: {}", self.lines.line_no(), e);
                    continue;
                }
            };

            match parse_gga(&line) {
                Ok(Some(fix)) => return Some(Ok(fix)),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    "Unable to parse line {} ({}): {}",
                    self.lines.line_no(),
                    line.trim(),
                    e
                ),
            }
        }
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Fixed sensor position: the median of every GGA fix in the log
pub fn extract_sensor_location(path: &Path, geoid: &GeoidModel) -> Result<Location> {
    tracing::info!("Extracting sensor data from {}", path.display());

    let fixes = GgaReader::open(path)?.collect::<Result<Vec<_>>>()?;
    if fixes.is_empty() {
        return Err(Error::format(format!(
            "no GGA fixes found in {}",
            path.display()
        )));
    }

    let mut lats: Vec<f64> = fixes.iter().map(|f| f.lat).collect();
    let mut lons: Vec<f64> = fixes.iter().map(|f| f.lon).collect();
    let mut alts: Vec<f64> = fixes.iter().map(|f| f.ellipsoidal_altitude(geoid)).collect();

    Ok(Location::new(
        median(&mut lats),
        median(&mut lons),
        median(&mut alts),
    ))
}

impl Converter for Nmea {
    fn source(&self) -> SourceFormat {
        SourceFormat::Nmea
    }

    fn convert_to_canonical(
        &self,
        ctx: &Conversion<'_>,
        mut metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let base_date = ctx.options.require_base_date(self.source().as_ref())?;
        tracing::debug!("Using base date: {}", base_date);

        let geoid = ctx.geoid_for(&mut metadata)?;
        let fixes = GgaReader::open(input)?;

        metadata.stamp(ContentType::FlightLog, self.source().as_ref());
        sink.emit(&metadata)?;

        let mut count = 0usize;
        for fix in fixes {
            let fix = fix?;
            let record = TrackRecord::new(
                Timestamp::from_millis(combine_ms(base_date, fix.time)),
                Position::geodetic(fix.location(geoid)),
            );
            sink.emit(&record)?;
            count += 1;
        }

        tracing::info!("Converted {} GGA fixes", count);
        Ok(())
    }
}
