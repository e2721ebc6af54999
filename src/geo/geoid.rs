//! Geoid undulation grids in the GeographicLib PGM layout.
//!
//! The file is a binary (P5) PGM with 16-bit big-endian samples. Header
//! comments carry `Offset` and `Scale`, so that a sample `v` decodes to
//! `offset + scale * v` metres. Row 0 is latitude 90N, column 0 is longitude
//! 0E, and the grid covers the full globe.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Bundled model used when no explicit path is given
pub const DEFAULT_MODEL_FILE: &str = "egm96-5.pgm";

/// Environment variable that overrides the bundled model location
pub const MODEL_ENV_VAR: &str = "FLIGHTCONV_EGM";

/// Resolve which geoid file to load: explicit path, then environment, then default
pub fn resolve_model_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Some(path) = std::env::var_os(MODEL_ENV_VAR) {
        return PathBuf::from(path);
    }

    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("data")
        .join(DEFAULT_MODEL_FILE)
}

/// In-memory geoid grid
#[derive(Clone, Debug)]
pub struct GeoidModel {
    name: String,
    width: usize,
    height: usize,
    offset: f64,
    scale: f64,
    samples: Vec<u16>,
}

impl GeoidModel {
    /// Load a model from `path`, or from the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = resolve_model_path(path);
        tracing::debug!("Using geoid model: {}", path.display());

        let bytes = fs::read(&path).map_err(|e| {
            Error::Resource(format!("cannot read geoid model {}: {}", path.display(), e))
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self::from_pgm_bytes(name, &bytes)
    }

    /// Decode a P5 PGM image
    pub fn from_pgm_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        let bad = |reason: &str| Error::Resource(format!("invalid geoid model {}: {}", name, reason));

        let mut header = HeaderReader { bytes, pos: 0 };

        if header.token() != Some("P5") {
            return Err(bad("not a binary PGM file"));
        }

        let mut offset = None;
        let mut scale = None;
        let mut numbers = Vec::with_capacity(3);

        while numbers.len() < 3 {
            header.skip_whitespace();

            if header.peek() == Some(b'#') {
                let comment = header.line();
                let mut words = comment.trim_start_matches('#').split_whitespace();
                match (words.next(), words.next()) {
                    (Some("Offset"), Some(v)) => offset = v.parse::<f64>().ok(),
                    (Some("Scale"), Some(v)) => scale = v.parse::<f64>().ok(),
                    _ => {}
                }
                continue;
            }

            let token = header.token().ok_or_else(|| bad("truncated header"))?;
            let number: usize = token
                .parse()
                .map_err(|_| bad(&format!("unexpected header token '{}'", token)))?;
            numbers.push(number);
        }

        let (width, height, max_value) = (numbers[0], numbers[1], numbers[2]);

        if max_value < 256 {
            return Err(bad("expected 16-bit samples"));
        }
        if width < 2 || height < 2 {
            return Err(bad("grid too small"));
        }

        // A single whitespace byte separates the header from the raster
        let data = bytes.get(header.pos + 1..).ok_or_else(|| bad("missing raster"))?;
        let expected = width * height * 2;

        if data.len() < expected {
            return Err(bad(&format!(
                "raster has {} bytes, expected {}",
                data.len(),
                expected
            )));
        }

        let offset = offset.ok_or_else(|| bad("missing Offset comment"))?;
        let scale = scale.ok_or_else(|| bad("missing Scale comment"))?;
        let samples = data[..expected]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self {
            name,
            width,
            height,
            offset,
            scale,
            samples,
        })
    }

    /// File name the model was loaded from
    pub fn name(&self) -> &str {
        &self.name
    }

    fn sample(&self, row: isize, col: isize) -> f64 {
        let row = row.clamp(0, self.height as isize - 1) as usize;
        let col = col.rem_euclid(self.width as isize) as usize;
        self.offset + self.scale * f64::from(self.samples[row * self.width + col])
    }

    /// Geoid height above the ellipsoid in metres, bilinearly interpolated.
    ///
    /// Latitudes beyond the poles are extrapolated from the edge rows.
    pub fn undulation(&self, lat: f64, lon: f64) -> f64 {
        let lon_step = 360.0 / self.width as f64;
        let lat_step = 180.0 / (self.height - 1) as f64;

        let fx = lon.rem_euclid(360.0) / lon_step;
        let fy = (90.0 - lat) / lat_step;

        let col = fx.floor() as isize;
        let row = (fy.floor() as isize).clamp(0, self.height as isize - 2);
        let dx = fx - col as f64;
        let dy = fy - row as f64;

        let v00 = self.sample(row, col);
        let v01 = self.sample(row, col + 1);
        let v10 = self.sample(row + 1, col);
        let v11 = self.sample(row + 1, col + 1);

        (1.0 - dy) * ((1.0 - dx) * v00 + dx * v01) + dy * ((1.0 - dx) * v10 + dx * v11)
    }

    /// Convert an altitude above mean sea level to ellipsoidal altitude
    pub fn ellipsoidal_height(&self, lat: f64, lon: f64, amsl: f64) -> f64 {
        amsl + self.undulation(lat, lon)
    }
}

struct HeaderReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn token(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while matches!(self.peek(), Some(b) if !b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).ok()
    }

    fn line(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b != b'\n') {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("")
    }
}

/// Build a P5 PGM image; used by tests across the crate
#[cfg(test)]
pub(crate) fn synthetic_pgm(
    width: usize,
    height: usize,
    offset: f64,
    scale: f64,
    sample: impl Fn(usize, usize) -> u16,
) -> Vec<u8> {
    let mut bytes = format!(
        "P5\n# Geoid file in PGM format\n# Offset {}\n# Scale {}\n{} {}\n65535\n",
        offset, scale, width, height
    )
    .into_bytes();

    for row in 0..height {
        for col in 0..width {
            bytes.extend_from_slice(&sample(row, col).to_be_bytes());
        }
    }
    bytes
}

/// Write a model with the same undulation everywhere into `dir`
#[cfg(test)]
pub(crate) fn write_flat_model(dir: &Path, undulation: u16) -> PathBuf {
    let path = dir.join("flat.pgm");
    let bytes = synthetic_pgm(8, 5, 0.0, 1.0, |_, _| undulation);
    std::fs::write(&path, bytes).unwrap();
    path
}
