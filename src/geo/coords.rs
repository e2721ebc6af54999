//! Latitude/longitude text parsing and rendering.
//!
//! Accepted inputs are NMEA-0183 degree-minute fields (`ddmm.mmmm[N|S]`,
//! `dddmm.mmmm[E|W]`, optionally with a comma before the hemisphere) and
//! general degrees-minutes-seconds text such as `-49.5`, `49.5S`,
//! `49 16 27 N` or `49°16'27"N`.

use crate::error::{Error, Result};

/// Parse a latitude in decimal degrees
pub fn parse_latitude(text: &str) -> Result<f64> {
    parse_angle(text, 2, ('N', 'S'))
}

/// Parse a longitude in decimal degrees
pub fn parse_longitude(text: &str) -> Result<f64> {
    parse_angle(text, 3, ('E', 'W'))
}

fn parse_angle(text: &str, degree_digits: usize, hemispheres: (char, char)) -> Result<f64> {
    let text = text.trim();

    if is_nmea(text, degree_digits + 2) {
        return parse_nmea(text, degree_digits, hemispheres);
    }

    parse_dms(text)
}

/// NMEA fields have one decimal point and a fixed-width integer part
fn is_nmea(text: &str, integer_digits: usize) -> bool {
    let mut parts = text.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(int), Some(_), None) => {
            int.len() == integer_digits && int.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

fn parse_nmea(text: &str, degree_digits: usize, (positive, negative): (char, char)) -> Result<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let invalid = || Error::format(format!("invalid NMEA coordinate '{}'", text));

    let (body, sign) = match cleaned.chars().last() {
        Some(c) if c.eq_ignore_ascii_case(&negative) => (&cleaned[..cleaned.len() - 1], -1.0),
        Some(c) if c.eq_ignore_ascii_case(&positive) => (&cleaned[..cleaned.len() - 1], 1.0),
        _ => (cleaned.as_str(), 1.0),
    };

    let degrees: f64 = body[..degree_digits].parse().map_err(|_| invalid())?;
    let minutes: f64 = body[degree_digits..].trim().parse().map_err(|_| invalid())?;

    Ok(sign * (degrees + minutes / 60.0))
}

/// Hemisphere letter ending `body`, if any
fn trailing_hemisphere(body: &str) -> Option<char> {
    let mut chars = body.chars().rev();
    let c = chars.next().filter(|c| "NSEWnsew".contains(*c))?;
    // `27s` is a seconds marker
    if c == 's' && chars.next().is_some_and(|p| p.is_ascii_digit()) {
        return None;
    }
    Some(c)
}

/// Degrees with optional minutes and seconds, sign or hemisphere letter
fn parse_dms(text: &str) -> Result<f64> {
    let invalid = || Error::format(format!("cannot parse angle '{}'", text));
    let mut body = text.trim();
    let mut negative = false;

    if let Some(c) = trailing_hemisphere(body) {
        negative = matches!(c, 'S' | 'W' | 's' | 'w');
        body = body[..body.len() - 1].trim_end();
    } else if let Some(c) = body.chars().next().filter(|c| "NSEWnsew".contains(*c)) {
        negative = matches!(c, 'S' | 'W' | 's' | 'w');
        body = body[1..].trim_start();
    }

    if let Some(rest) = body.strip_prefix('-') {
        negative = !negative;
        body = rest;
    } else if let Some(rest) = body.strip_prefix('+') {
        body = rest;
    }

    let parts: Vec<&str> = body
        .split(|c: char| c.is_whitespace() || "°º'\"′″:,dms".contains(c))
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() || parts.len() > 3 {
        return Err(invalid());
    }

    let mut value = 0.0;
    let mut unit = 1.0;
    for part in parts {
        let number: f64 = part.parse().map_err(|_| invalid())?;
        if number < 0.0 {
            return Err(invalid());
        }
        value += number / unit;
        unit *= 60.0;
    }

    Ok(if negative { -value } else { value })
}

/// Render a latitude as `DD°MM′SS.S″N`
pub fn render_latitude(lat: f64) -> String {
    render_dms(lat, ('N', 'S'))
}

/// Render a longitude as `DDD°MM′SS.S″E`
pub fn render_longitude(lon: f64) -> String {
    render_dms(lon, ('E', 'W'))
}

fn render_dms(value: f64, (positive, negative): (char, char)) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let hemisphere = if value < 0.0 { negative } else { positive };
    // Work in tenths of an arcsecond so rounding carries into minutes and degrees
    let tenths = (value.abs() * 36_000.0).round() as u64;
    let degrees = tenths / 36_000;
    let minutes = (tenths % 36_000) / 600;
    let seconds = tenths % 600;

    format!(
        "{}°{:02}′{:02}.{}″{}",
        degrees,
        minutes,
        seconds / 10,
        seconds % 10,
        hemisphere
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_nmea_latitude() {
        assert!(close(parse_latitude("4916.45,N").unwrap(), 49.0 + 16.45 / 60.0));
        assert!(close(parse_latitude("4916.45S").unwrap(), -(49.0 + 16.45 / 60.0)));
        assert!(close(parse_latitude("4916.45").unwrap(), 49.274166666));
    }

    #[test]
    fn test_nmea_longitude() {
        let lon = parse_longitude("12311.12,W").unwrap();
        assert!(close(lon, -(123.0 + 11.12 / 60.0)));
        assert!(close(lon, -123.185333333));
        assert!(close(parse_longitude("01131.000,E").unwrap(), 11.516666666));
    }

    #[test]
    fn test_decimal_degrees() {
        assert_eq!(parse_latitude("49.5").unwrap(), 49.5);
        assert_eq!(parse_latitude("-12.25").unwrap(), -12.25);
        assert_eq!(parse_longitude("123.5W").unwrap(), -123.5);
        // A short integer part is plain degrees, not ddmm
        assert_eq!(parse_latitude("12.5").unwrap(), 12.5);
    }

    #[test]
    fn test_dms_text() {
        assert!(close(parse_latitude("49°16'27\"N").unwrap(), 49.274166666));
        assert!(close(parse_latitude("49 16 27 S").unwrap(), -49.274166666));
        assert!(close(parse_longitude("W 123:11:07.2").unwrap(), -123.185333333));
    }

    #[test]
    fn test_unit_letters_are_not_hemispheres() {
        assert!(close(parse_latitude("49d16m27s").unwrap(), 49.274166666));
        assert!(close(parse_latitude("49d16m27sS").unwrap(), -49.274166666));
        assert!(close(parse_latitude("49 16 27 s").unwrap(), -49.274166666));
    }

    #[test]
    fn test_garbage_is_format_error() {
        assert!(matches!(parse_latitude("north"), Err(Error::Format { .. })));
        assert!(parse_latitude("").is_err());
        assert!(parse_longitude("1 2 3 4").is_err());
    }

    #[test]
    fn test_render_dms() {
        assert_eq!(render_latitude(49.274166666), "49°16′27.0″N");
        assert_eq!(render_longitude(-123.185333333), "123°11′07.2″W");
        // 59.96 seconds rounds up into the next minute
        assert_eq!(render_latitude(10.0 + 59.0 / 60.0 + 59.96 / 3600.0), "11°00′00.0″N");
    }
}
