//! Partial metadata handed to converters.

use std::path::Path;

use crate::config::SensorFormat;
use crate::converters::nmea::extract_sensor_location;
use crate::converters::Conversion;
use crate::error::Result;
use crate::model::{Metadata, PolarSensor};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Origin of the input plus the polar sensor block, when one is configured
pub fn initial_metadata(input: &Path, ctx: &Conversion<'_>) -> Result<Metadata> {
    let mut metadata = Metadata::with_origin(file_name(input));

    let Some(sensor) = &ctx.options.polar_sensor else {
        return Ok(metadata);
    };

    let loc = match sensor.format {
        SensorFormat::Nmea => extract_sensor_location(&sensor.path, ctx.geoid_for(&mut metadata)?)?,
    };

    metadata.polar_sensor = Some(PolarSensor {
        source: Some(sensor.format.to_string()),
        origin: Some(file_name(&sensor.path)),
        loc,
    });
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConvertOptions, PolarSensorSource};
    use crate::geo::geoid::write_flat_model;
    use serde_json::json;

    #[test]
    fn test_origin_only() {
        let metadata =
            initial_metadata(
            Path::new("/data/in/flight.csv"),
            &Conversion::new(&ConvertOptions::default()),
        )
        .unwrap();
        assert_eq!(serde_json::to_value(&metadata).unwrap(), json!({"origin": "flight.csv"}));
    }

    #[test]
    fn test_polar_sensor_from_nmea() {
        let dir = tempfile::tempdir().unwrap();
        let sensor = dir.path().join("radar-site.nmea");
        std::fs::write(
            &sensor,
            "$GPGGA,120000,4800.000,N,01100.000,E,1,08,0.9,100.0,M,10.0,M,,\n",
        )
        .unwrap();

        let options = ConvertOptions {
            egm: Some(write_flat_model(dir.path(), 0)),
            polar_sensor: Some(PolarSensorSource {
                path: sensor,
                format: SensorFormat::Nmea,
            }),
            ..ConvertOptions::default()
        };

        let ctx = Conversion::new(&options);
        let metadata = initial_metadata(Path::new("tracks.json"), &ctx).unwrap();
        let sensor = metadata.polar_sensor.unwrap();
        assert_eq!(sensor.source.as_deref(), Some("nmea"));
        assert_eq!(sensor.origin.as_deref(), Some("radar-site.nmea"));
        assert_eq!(metadata.geoid.as_deref(), Some("flat.pgm"));
        assert_eq!(sensor.loc.lat, 48.0);
        assert_eq!(sensor.loc.alt, 110.0);

        // The converter reuses the model loaded for the sensor
        std::fs::remove_file(options.egm.as_ref().unwrap()).unwrap();
        assert_eq!(ctx.geoid().unwrap().name(), "flat.pgm");
    }

    #[test]
    fn test_missing_sensor_file() {
        let options = ConvertOptions {
            polar_sensor: Some(PolarSensorSource {
                path: "/nonexistent/site.nmea".into(),
                format: SensorFormat::Nmea,
            }),
            ..ConvertOptions::default()
        };
        assert!(initial_metadata(Path::new("x"), &Conversion::new(&options)).is_err());
    }
}
