//! SAFIR MQTT position messages, one JSON object per line.
//!
//! The same message shape is embedded in fusion replay `input`/`output`
//! events, so [`flightlog_record`] is shared with [`crate::fusion`].

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use super::types::{Conversion, Converter, SourceFormat};
use crate::container::{ContainerStream, RecordSink};
use crate::error::{Error, Result};
use crate::geo::{parse_datetime_ms, GeoidModel};
use crate::model::{ContentType, Identification, Location, Metadata, Position, Timestamp, TrackRecord};

const SUPPORTED_VERSION: &str = "1";

pub struct SafirMqtt;

#[derive(Debug, Deserialize)]
struct Message {
    version: String,
    timestamp: Value,
    identifiers: Vec<Identifier>,
    location: SafirLocation,
    origin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Identifier {
    version: String,
    system: String,
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafirLocation {
    version: String,
    latitude: f64,
    longitude: f64,
    #[serde(rename = "altitudeAMSL")]
    altitude_amsl: f64,
}

fn check_version(what: &str, version: &str) -> Result<()> {
    if version != SUPPORTED_VERSION {
        return Err(Error::schema(format!(
            "unsupported {} version '{}'",
            what, version
        )));
    }
    Ok(())
}

fn timestamp_ms(value: &Value) -> Result<i64> {
    match value {
        Value::String(text) => parse_datetime_ms(text),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| Error::format(format!("invalid timestamp {}", n))),
        other => Err(Error::format(format!("invalid timestamp {}", other))),
    }
}

fn identification(identifiers: &[Identifier]) -> Result<Identification> {
    let first = identifiers
        .first()
        .ok_or_else(|| Error::schema("message has no identifiers"))?;

    let mut ids = Identification::default();
    for id in identifiers {
        check_version("identifier", &id.version)?;
        let slot = match id.system.as_str() {
            "ICAOHex" => &mut ids.icaohex,
            "ICAORegistration" => &mut ids.icaoreg,
            "CallSign" => &mut ids.atm,
            "Other" => &mut ids.int,
            system => {
                tracing::debug!("Ignoring identifier system {}", system);
                continue;
            }
        };
        *slot = Some(id.key.clone());
    }

    // Without an internal id the first identifier stands in
    if ids.int.is_none() {
        ids.int = Some(first.key.clone());
    }
    Ok(ids)
}

/// Build a flight-log record from one SAFIR MQTT message
pub fn flightlog_record(message: &Value, geoid: &GeoidModel) -> Result<TrackRecord> {
    let message = Message::deserialize(message)?;
    check_version("message", &message.version)?;
    check_version("location", &message.location.version)?;

    let unix = timestamp_ms(&message.timestamp)?;
    let uaid = identification(&message.identifiers)?;

    let SafirLocation {
        latitude: lat,
        longitude: lon,
        altitude_amsl: amsl,
        ..
    } = message.location;
    let mut loc = Location::new(lat, lon, geoid.ellipsoidal_height(lat, lon, amsl));
    loc.amsl = Some(amsl);

    let mut record =
        TrackRecord::new(Timestamp::from_millis(unix), Position::geodetic(loc)).with_uaid(uaid);
    record.origin = message.origin;
    Ok(record)
}

impl Converter for SafirMqtt {
    fn source(&self) -> SourceFormat {
        SourceFormat::SafirMqtt
    }

    fn convert_to_canonical(
        &self,
        ctx: &Conversion<'_>,
        mut metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let geoid = ctx.geoid_for(&mut metadata)?;
        metadata.stamp(ContentType::FlightLog, self.source().as_ref());

        let mut messages = ContainerStream::open_read(input)?;
        sink.emit(&metadata)?;

        let mut records = messages.iterate();
        while let Some(message) = records.next() {
            let line = records.line_no();
            match message.and_then(|m| flightlog_record(&m, geoid)) {
                Ok(record) => sink.emit(&record)?,
                Err(e @ Error::Io(_)) => return Err(e),
                Err(e) => tracing::warn!("Error processing {}:{}: {}", input.display(), line, e),
            }
        }
        Ok(())
    }
}
