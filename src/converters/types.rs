use std::cell::OnceCell;
use std::path::Path;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::config::ConvertOptions;
use crate::container::RecordSink;
use crate::error::Result;
use crate::geo::GeoidModel;
use crate::model::Metadata;

use super::artlog::ArtLog;
use super::courageous::Courageous;
use super::csgroup::CsGroup;
use super::datcon::DatCon;
use super::gnettrack::GNetTrack;
use super::nmea::Nmea;
use super::robinradar::RobinRadar;
use super::safirmqtt::SafirMqtt;
use super::senhive::SenHive;

/// State shared by every stage of one conversion.
///
/// The geoid model is read from disk on first use and then reused, so the
/// metadata stage and the converter never load it twice.
pub struct Conversion<'a> {
    pub options: &'a ConvertOptions,
    geoid: OnceCell<GeoidModel>,
}

impl<'a> Conversion<'a> {
    pub fn new(options: &'a ConvertOptions) -> Self {
        Self {
            options,
            geoid: OnceCell::new(),
        }
    }

    pub fn geoid(&self) -> Result<&GeoidModel> {
        if let Some(model) = self.geoid.get() {
            return Ok(model);
        }
        let model = GeoidModel::load(self.options.egm.as_deref())?;
        Ok(self.geoid.get_or_init(|| model))
    }

    /// The geoid model, with its name recorded in the metadata
    pub fn geoid_for(&self, metadata: &mut Metadata) -> Result<&GeoidModel> {
        let model = self.geoid()?;
        metadata.geoid = Some(model.name().to_string());
        Ok(model)
    }
}

/// Trait for external format converters.
///
/// A converter stamps its content/source into `metadata`, writes it as the
/// first line, then streams canonical records to `sink`.
pub trait Converter {
    fn source(&self) -> SourceFormat;

    fn convert_to_canonical(
        &self,
        ctx: &Conversion<'_>,
        metadata: Metadata,
        input: &Path,
        sink: &mut dyn RecordSink,
    ) -> Result<()>;
}

/// Supported external formats
#[derive(
    AsRefStr, Clone, Copy, Debug, Display, EnumIter, EnumString, IntoStaticStr, PartialEq, Eq,
)]
#[strum(serialize_all = "lowercase")]
pub enum SourceFormat {
    ArtLog,
    Courageous,
    CsGroup,
    DatCon,
    GNetTrack,
    Nmea,
    RobinRadar,
    SafirMqtt,
    SenHive,
}

impl SourceFormat {
    pub fn converter(&self) -> Box<dyn Converter> {
        match self {
            SourceFormat::ArtLog => Box::new(ArtLog),
            SourceFormat::Courageous => Box::new(Courageous),
            SourceFormat::CsGroup => Box::new(CsGroup),
            SourceFormat::DatCon => Box::new(DatCon),
            SourceFormat::GNetTrack => Box::new(GNetTrack),
            SourceFormat::Nmea => Box::new(Nmea),
            SourceFormat::RobinRadar => Box::new(RobinRadar),
            SourceFormat::SafirMqtt => Box::new(SafirMqtt),
            SourceFormat::SenHive => Box::new(SenHive),
        }
    }

    /// Names accepted on the command line
    pub fn names() -> Vec<&'static str> {
        SourceFormat::iter().map(<&'static str>::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_names_round_trip() {
        for name in SourceFormat::names() {
            let format = SourceFormat::from_str(name).unwrap();
            assert_eq!(format.as_ref(), name);
            assert_eq!(format.converter().source(), format);
        }
    }

    #[test]
    fn test_unknown_format() {
        assert!(SourceFormat::from_str("kml").is_err());
        assert_eq!(SourceFormat::from_str("robinradar").unwrap(), SourceFormat::RobinRadar);
    }

    #[test]
    fn test_geoid_is_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::geo::geoid::write_flat_model(dir.path(), 12);
        let options = ConvertOptions {
            egm: Some(path.clone()),
            ..ConvertOptions::default()
        };
        let ctx = Conversion::new(&options);

        let mut metadata = Metadata::default();
        let first = ctx.geoid_for(&mut metadata).unwrap() as *const GeoidModel;
        assert_eq!(metadata.geoid.as_deref(), Some("flat.pgm"));

        // A second read would fail now
        std::fs::remove_file(&path).unwrap();
        let second = ctx.geoid().unwrap() as *const GeoidModel;
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_geoid_is_resource_error() {
        let options = ConvertOptions {
            egm: Some("/nonexistent/model.pgm".into()),
            ..ConvertOptions::default()
        };
        let ctx = Conversion::new(&options);
        assert!(matches!(ctx.geoid(), Err(crate::error::Error::Resource(_))));
    }

    #[test]
    fn test_names_are_known_sources() {
        for name in SourceFormat::names() {
            assert!(crate::schema::SOURCE_FORMATS.contains(&name), "{}", name);
        }
    }
}
