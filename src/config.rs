//! Conversion options.
//!
//! Options come from an optional TOML file and are then overridden by
//! command-line flags in the driver.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{Error, Result};
use crate::geo::parse_base_date;
use crate::model::ContentType;

/// Content produced by converters that can emit either form
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Display, EnumString, PartialEq, Eq, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    FlightLog,
    RadarLog,
}

impl Target {
    pub fn content(&self) -> ContentType {
        match self {
            Target::FlightLog => ContentType::FlightLog,
            Target::RadarLog => ContentType::RadarLog,
        }
    }
}

/// Formats a polar sensor location can be read from
#[derive(AsRefStr, Clone, Copy, Debug, Default, Display, EnumString, PartialEq, Eq, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SensorFormat {
    #[default]
    Nmea,
}

/// File describing where a polar sensor was placed
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PolarSensorSource {
    pub path: PathBuf,
    #[serde(default)]
    pub format: SensorFormat,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConvertOptions {
    /// Geoid model file; see [`crate::geo::resolve_model_path`]
    pub egm: Option<PathBuf>,
    /// Date for formats that only carry a time of day
    #[serde(deserialize_with = "deserialize_base_date")]
    pub base_date: Option<NaiveDate>,
    pub target: Target,
    pub polar_sensor: Option<PolarSensorSource>,
    /// Format-specific settings
    pub extra: BTreeMap<String, String>,
}

fn deserialize_base_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let text: Option<String> = Option::deserialize(deserializer)?;
    text.map(|t| parse_base_date(&t).map_err(serde::de::Error::custom))
        .transpose()
}

impl ConvertOptions {
    /// Read options from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("invalid options: {}", e)))
    }

    /// The base date, or a config error naming the format that needs it
    pub fn require_base_date(&self, format: &str) -> Result<NaiveDate> {
        self.base_date.ok_or_else(|| {
            Error::Config(format!(
                "the {} format requires a date to be set with '--base-date'",
                format
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::default();
        assert_eq!(options.target, Target::FlightLog);
        assert!(options.egm.is_none());
        assert!(matches!(options.require_base_date("nmea"), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_toml() {
        let options = ConvertOptions::from_toml(
            r#"
            egm = "/data/egm2008-1.pgm"
            base-date = "17 May 2024"
            target = "radarlog"

            [polar-sensor]
            path = "sensor.nmea"

            [extra]
            site = "north"
            "#,
        )
        .unwrap();

        assert_eq!(options.egm.as_deref(), Some(Path::new("/data/egm2008-1.pgm")));
        assert_eq!(options.base_date, NaiveDate::from_ymd_opt(2024, 5, 17));
        assert_eq!(options.target.content(), ContentType::RadarLog);
        let sensor = options.polar_sensor.unwrap();
        assert_eq!(sensor.format, SensorFormat::Nmea);
        assert_eq!(options.extra.get("site").map(String::as_str), Some("north"));
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            ConvertOptions::from_toml("target = \"kml\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ConvertOptions::from_toml("base-date = \"yesterday\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "base-date = \"2024-01-02\"\n").unwrap();
        let options = ConvertOptions::load(file.path()).unwrap();
        assert_eq!(options.base_date, NaiveDate::from_ymd_opt(2024, 1, 2));
    }
}
