pub mod artlog;
pub mod courageous;
pub mod csgroup;
pub mod datcon;
pub mod delimited;
pub mod gnettrack;
pub mod nmea;
pub mod robinradar;
pub mod safirmqtt;
pub mod senhive;
pub mod types;

pub use artlog::ArtLog;
pub use courageous::Courageous;
pub use csgroup::CsGroup;
pub use datcon::DatCon;
pub use gnettrack::GNetTrack;
pub use nmea::Nmea;
pub use robinradar::RobinRadar;
pub use safirmqtt::SafirMqtt;
pub use senhive::SenHive;
pub use types::{Conversion, Converter, SourceFormat};

use std::path::Path;

use crate::config::ConvertOptions;
use crate::container::ContainerStream;
use crate::error::Result;
use crate::metadata::initial_metadata;

/// Convert one external file into a new container at `output`
pub fn convert_file(
    format: SourceFormat,
    options: &ConvertOptions,
    input: &Path,
    output: &Path,
) -> Result<()> {
    tracing::info!("Converting {} ({}) to {}", input.display(), format, output.display());

    let ctx = Conversion::new(options);
    let metadata = initial_metadata(input, &ctx)?;
    let mut sink = ContainerStream::open_write(output)?;

    format
        .converter()
        .convert_to_canonical(&ctx, metadata, input, &mut sink)?;

    let lines = sink.line_no();
    sink.close()?;

    tracing::info!("Wrote {} lines to {}", lines, output.display());
    Ok(())
}
