//! Typed canonical records.
//!
//! Converters build these structs and serialize them into the container;
//! readers work on raw [`serde_json::Value`]s so that foreign containers can
//! still be validated.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumString};

/// Content descriptor carried by the metadata line
#[derive(AsRefStr, Clone, Copy, Debug, Display, EnumString, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[strum(serialize = "flightlog")]
    #[serde(rename = "flightlog")]
    FlightLog,
    #[strum(serialize = "radarlog")]
    #[serde(rename = "radarlog")]
    RadarLog,
    #[strum(serialize = "fusion.replay")]
    #[serde(rename = "fusion.replay")]
    FusionReplay,
}

/// One content tag or a list of them
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    One(ContentType),
    Many(Vec<ContentType>),
}

impl Content {
    pub fn tags(&self) -> Vec<ContentType> {
        match self {
            Content::One(tag) => vec![*tag],
            Content::Many(tags) => tags.clone(),
        }
    }
}

/// First line of every container.
///
/// Converters receive a partial value (origin, polar sensor) and stamp their
/// own content and source before writing it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polar_sensor: Option<PolarSensor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_length: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            ..Self::default()
        }
    }

    /// Merge the converter's own descriptors into the partial metadata
    pub fn stamp(&mut self, content: ContentType, source: &str) {
        self.content = Some(Content::One(content));
        self.source = Some(source.to_string());
    }
}

/// Fixed sensor location for polar (bearing/elevation) data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolarSensor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub loc: Location,
}

/// Aircraft identification. At least one of `int`/`fvc` must be set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub int: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fvc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icaohex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icaoreg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atm: Option<String>,
    /// Source-specific identifiers (serial, imei, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Identification {
    pub fn internal(id: impl Into<String>) -> Self {
        Self {
            int: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Geodetic location, WGS-84 with ellipsoidal altitude
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amsl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Location {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            lat,
            lon,
            alt,
            amsl: None,
            height: None,
        }
    }
}

/// Bearing/elevation in degrees as seen from the polar sensor
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polar {
    pub bear: f64,
    pub elev: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polar: Option<Polar>,
}

impl Position {
    pub fn geodetic(loc: Location) -> Self {
        Self {
            loc: Some(loc),
            polar: None,
        }
    }

    pub fn polar(polar: Polar) -> Self {
        Self {
            loc: None,
            polar: Some(polar),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Epoch milliseconds plus the source text it came from, if kept
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    pub unix: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

impl Timestamp {
    pub fn from_millis(unix: i64) -> Self {
        Self {
            unix,
            original: None,
        }
    }
}

/// Cellular radio measurements
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellSignal {
    pub radio: String,
    #[serde(rename = "RSRP", skip_serializing_if = "Option::is_none")]
    pub rsrp: Option<f64>,
    #[serde(rename = "RSRQ", skip_serializing_if = "Option::is_none")]
    pub rsrq: Option<f64>,
    #[serde(rename = "RSSI", skip_serializing_if = "Option::is_none")]
    pub rssi: Option<f64>,
    #[serde(rename = "SINR", skip_serializing_if = "Option::is_none")]
    pub sinr: Option<f64>,
}

/// A flightlog or radarlog line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub time: Timestamp,
    pub pos: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uaid: Option<Identification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub att: Option<Attitude>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cellsig: Option<CellSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Set on records produced by a fusion engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fusion: Option<bool>,
}

impl TrackRecord {
    pub fn new(time: Timestamp, pos: Position) -> Self {
        Self {
            time,
            pos,
            uaid: None,
            origin: None,
            att: None,
            cellsig: None,
            tag: None,
            fusion: None,
        }
    }

    pub fn with_uaid(mut self, uaid: Identification) -> Self {
        self.uaid = Some(uaid);
        self
    }
}

#[derive(AsRefStr, Clone, Copy, Debug, EnumString, PartialEq, Eq, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FusionEvent {
    Launch,
    Start,
    Stop,
    Input,
    Output,
    Error,
}

/// One fusion.replay line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionReplayRecord {
    pub event: FusionEvent,
    pub cycle: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}
