//! Geodetic helpers: geoid undulation, coordinate text parsing and
//! timestamp conversion.

pub mod coords;
pub mod geoid;
pub mod time;

pub use coords::{parse_latitude, parse_longitude, render_latitude, render_longitude};
pub use geoid::{resolve_model_path, GeoidModel, DEFAULT_MODEL_FILE, MODEL_ENV_VAR};
pub use time::{combine_ms, parse_base_date, parse_datetime_ms, render_epoch_ms};
