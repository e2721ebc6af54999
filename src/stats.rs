//! Running min/max over time and position of a track container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::container::ContainerStream;
use crate::error::{Error, Result};
use crate::geo::{render_latitude, render_longitude};
use crate::model::{ContentType, Metadata};

/// Smallest and largest value seen.
///
/// Starts at `min = +inf`, `max = -inf`; an extent that never saw a value
/// keeps those sentinels and serializes them as `null`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Default for Extent {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Extent {
    pub fn add(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FlightStats {
    pub time: Extent,
    pub lat: Extent,
    pub lon: Extent,
    pub alt: Extent,
}

impl FlightStats {
    /// Fold one record in. Missing fields leave their extent untouched.
    pub fn fold(&mut self, record: &Value) {
        let fields = [
            (&mut self.time, "/time/unix"),
            (&mut self.lat, "/pos/loc/lat"),
            (&mut self.lon, "/pos/loc/lon"),
            (&mut self.alt, "/pos/loc/alt"),
        ];

        for (extent, pointer) in fields {
            if let Some(value) = record.pointer(pointer).and_then(Value::as_f64) {
                extent.add(value);
            }
        }
    }

    /// Read the remaining records of a flightlog or radarlog container
    pub fn from_container(stream: &mut ContainerStream) -> Result<Self> {
        let metadata = stream
            .read()?
            .ok_or_else(|| Error::format("no metadata found"))?;
        let metadata = Metadata::deserialize(&metadata)?;

        let tags = metadata.content.map(|c| c.tags()).unwrap_or_default();
        if !tags
            .iter()
            .any(|t| matches!(t, ContentType::FlightLog | ContentType::RadarLog))
        {
            let names: Vec<&str> = tags.iter().map(|t| t.as_ref()).collect();
            return Err(Error::schema(format!(
                "unsupported content type: {}",
                if names.is_empty() { "none".to_string() } else { names.join(", ") }
            )));
        }

        let mut stats = Self::default();
        let mut count = 0usize;
        for record in stream.iterate() {
            stats.fold(&record?);
            count += 1;
        }

        tracing::debug!("Aggregated {} records", count);
        Ok(stats)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn utc(ms: f64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn range(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    extent: &Extent,
    render: impl Fn(f64) -> String,
) -> fmt::Result {
    if extent.is_empty() {
        writeln!(f, "{}: no data", label)
    } else {
        writeln!(f, "{} from {} to {}", label, render(extent.min), render(extent.max))
    }
}

/// Human-readable report
impl fmt::Display for FlightStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.time.is_empty() {
            writeln!(f, "Time: no data")?;
        } else {
            writeln!(f, "Start: {}", utc(self.time.min))?;
            writeln!(f, "End: {}", utc(self.time.max))?;
        }
        range(f, "Latitude", &self.lat, render_latitude)?;
        range(f, "Longitude", &self.lon, render_longitude)?;
        range(f, "Altitude", &self.alt, |v| format!("{:.2}", v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_polar_only_record_is_ignored_for_position() {
        let mut stats = FlightStats::default();
        stats.fold(&json!({"time": {"unix": 5}, "pos": {"loc": {"lat": 1.0, "lon": 2.0, "alt": 10.0}}}));
        stats.fold(&json!({"time": {"unix": 7}, "pos": {"loc": {"lat": 1.5, "lon": 2.5, "alt": -5.0}}}));
        stats.fold(&json!({"time": {"unix": 6}, "pos": {"polar": {"bear": 1.0, "elev": 2.0}}}));

        assert_eq!(stats.alt, Extent { min: -5.0, max: 10.0 });
        assert_eq!(stats.time, Extent { min: 5.0, max: 7.0 });
    }

    #[test]
    fn test_empty_extent_keeps_sentinels() {
        let stats = FlightStats::default();
        assert!(stats.alt.is_empty());
        assert_eq!(stats.alt.min, f64::INFINITY);
        assert_eq!(stats.alt.max, f64::NEG_INFINITY);

        let value: Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
        assert_eq!(value["alt"]["min"], Value::Null);
        assert!(stats.to_string().contains("Altitude: no data"));
    }

    #[test]
    fn test_report() {
        let mut stats = FlightStats::default();
        stats.fold(&json!({"time": {"unix": 1709294400000i64}, "pos": {"loc": {"lat": 49.274166666, "lon": -123.185333333, "alt": 12.5}}}));

        let report = stats.to_string();
        assert!(report.contains("Start: 2024-03-01 12:00:00 UTC"));
        assert!(report.contains("Latitude from 49°16′27.0″N to 49°16′27.0″N"));
        assert!(report.contains("Longitude from 123°11′07.2″W"));
        assert!(report.contains("Altitude from 12.50 to 12.50"));
    }

    #[test]
    fn test_from_container() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"content": "flightlog"}}"#).unwrap();
        writeln!(file, r#"{{"time": {{"unix": 1}}, "pos": {{"loc": {{"lat": 1, "lon": 2, "alt": 3}}}}}}"#).unwrap();
        writeln!(file, r#"{{"time": {{"unix": 4}}, "pos": {{"loc": {{"lat": -1, "lon": 5, "alt": 0}}}}}}"#).unwrap();

        let mut stream = ContainerStream::open_read(file.path()).unwrap();
        let stats = FlightStats::from_container(&mut stream).unwrap();
        assert_eq!(stats.lat, Extent { min: -1.0, max: 1.0 });
        assert_eq!(stats.lon, Extent { min: 2.0, max: 5.0 });
    }

    #[test]
    fn test_rejects_replay_container() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"content": "fusion.replay"}}"#).unwrap();

        let mut stream = ContainerStream::open_read(file.path()).unwrap();
        assert!(matches!(
            FlightStats::from_container(&mut stream),
            Err(Error::Schema { .. })
        ));
    }
}
