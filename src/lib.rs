//! flightconv - conversion and validation of flight and track logs
//!
//! Third-party track logs (CSV exports, NMEA, radar XML fragments, MQTT
//! JSON) are converted into one line-oriented container format: a metadata
//! line followed by one canonical JSON record per line.
//!
//! ## Module Structure
//!
//! - [`container`] - Line-oriented container reader/writer
//! - [`model`] - Typed canonical records
//! - [`schema`] - Schema registry and structural validator
//! - [`geo`] - Geoid model, coordinate and timestamp parsing
//! - [`converters`] - One converter per external format
//! - [`dispatch`] - Element dispatch parser for embedded XML blocks
//! - [`metadata`] - Initial metadata (origin, polar sensor)
//! - [`validate`] - Container validation
//! - [`stats`] - Min/max statistics over a container
//! - [`fusion`] - Flight logs from fusion replays
//! - [`config`] - Conversion options
//! - [`error`] - Error taxonomy
//! - [`logging`] - Subscriber setup for the binary

pub mod config;
pub mod container;
pub mod converters;
pub mod dispatch;
pub mod error;
pub mod fusion;
pub mod geo;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod schema;
pub mod stats;
pub mod validate;

pub use config::ConvertOptions;
pub use container::{ContainerStream, RecordSink};
pub use converters::{convert_file, SourceFormat};
pub use error::{Error, Result};
pub use validate::{validate_file, ValidationReport};
