//! Flight logs from fusion engine replays.
//!
//! A `fusion.replay` container records what a fusion engine consumed
//! (`input` events, the raw plots) and produced (`output` events, the fused
//! tracks). Both carry SAFIR MQTT position messages.

use serde::Deserialize;
use std::path::Path;

use crate::config::ConvertOptions;
use crate::container::{ContainerStream, RecordSink};
use crate::converters::safirmqtt::flightlog_record;
use crate::converters::Conversion;
use crate::error::{Error, Result};
use crate::model::{ContentType, FusionEvent, FusionReplayRecord, Metadata};

/// Counts of records written to each output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Extracted {
    pub plots: usize,
    pub tracks: usize,
}

/// Split a replay into plot and track flight logs
pub fn extract_flightlogs(
    options: &ConvertOptions,
    replay: &mut ContainerStream,
    plots: &mut dyn RecordSink,
    tracks: &mut dyn RecordSink,
) -> Result<Extracted> {
    let metadata = replay
        .read()?
        .ok_or_else(|| Error::format("no metadata found"))?;
    let metadata = Metadata::deserialize(&metadata)?;

    match metadata.content.map(|c| c.tags()).as_deref() {
        Some([ContentType::FusionReplay]) => {}
        other => {
            return Err(Error::schema(format!(
                "unsupported content type: {:?}",
                other.unwrap_or_default()
            )))
        }
    }

    let origin = replay
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut out_metadata = Metadata::with_origin(origin);
    let ctx = Conversion::new(options);
    let geoid = ctx.geoid_for(&mut out_metadata)?;
    out_metadata.stamp(ContentType::FlightLog, ContentType::FusionReplay.as_ref());

    plots.emit(&out_metadata)?;
    tracks.emit(&out_metadata)?;

    let mut counts = Extracted::default();
    let mut records = replay.iterate();

    while let Some(value) = records.next() {
        let line = records.line_no();
        let record = value.and_then(|v| FusionReplayRecord::deserialize(&v).map_err(Error::from));

        let record = match record {
            Ok(record) => record,
            Err(e @ Error::Io(_)) => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping replay line {}: {}", line, e);
                continue;
            }
        };

        let (sink, fused): (&mut dyn RecordSink, bool) = match record.event {
            FusionEvent::Input => (&mut *plots, false),
            FusionEvent::Output => (&mut *tracks, true),
            _ => continue,
        };

        let Some(message) = &record.message else {
            tracing::warn!("Replay line {} has no message", line);
            continue;
        };

        match flightlog_record(message, geoid) {
            Ok(mut flightlog) => {
                if fused {
                    flightlog.fusion = Some(true);
                    counts.tracks += 1;
                } else {
                    counts.plots += 1;
                }
                sink.emit(&flightlog)?;
            }
            Err(e) => tracing::warn!("Replay line {}: {}", line, e),
        }
    }

    Ok(counts)
}

/// File-level wrapper around [`extract_flightlogs`]
pub fn extract_files(
    options: &ConvertOptions,
    input: &Path,
    plots_path: &Path,
    tracks_path: &Path,
) -> Result<Extracted> {
    let mut replay = ContainerStream::open_read(input)?;
    let mut plots = ContainerStream::open_write(plots_path)?;
    let mut tracks = ContainerStream::open_write(tracks_path)?;

    let counts = extract_flightlogs(options, &mut replay, &mut plots, &mut tracks)?;
    plots.close()?;
    tracks.close()?;

    tracing::info!(
        "Flight log data extracted from {}: {} plots, {} tracks",
        input.display(),
        counts.plots,
        counts.tracks
    );
    Ok(counts)
}
