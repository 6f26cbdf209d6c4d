// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NMEA sentence parsing for LOCN-style position payloads.
//!
//! Some bearers (P25 Tier 2 LOCN, port 49198) carry plain NMEA text
//! instead of LRRP tokens. Only the position sentences matter here:
//! `$..GGA` and `$..RMC`, with the `*hh` XOR checksum verified before any
//! field is trusted.

/// A position parsed from an NMEA sentence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NmeaPosition {
    pub lat_deg: f64,
    pub lon_deg: f64,
    /// Speed over ground in km/h (RMC only).
    pub speed_kmh: Option<f64>,
    /// Track in degrees (RMC only).
    pub track_deg: Option<f64>,
}

fn checksum_ok(sentence: &str) -> Option<&str> {
    let body = sentence.strip_prefix('$')?;
    let (payload, check) = body.rsplit_once('*')?;
    let wire = u8::from_str_radix(check.trim_end(), 16).ok()?;
    let calc = payload.bytes().fold(0u8, |a, b| a ^ b);
    (calc == wire).then_some(payload)
}

/// ddmm.mmmm / dddmm.mmmm with N/S/E/W hemisphere.
fn parse_coord(value: &str, hemi: &str, deg_digits: usize) -> Option<f64> {
    if value.len() <= deg_digits {
        return None;
    }
    let degrees: f64 = value[..deg_digits].parse().ok()?;
    let minutes: f64 = value[deg_digits..].parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }
    let mut out = degrees + minutes / 60.0;
    match hemi {
        "N" | "E" => {}
        "S" | "W" => out = -out,
        _ => return None,
    }
    Some(out)
}

/// Parse one NMEA sentence; `None` for non-position sentences, bad
/// checksums or out-of-range fields.
#[must_use]
pub fn parse_sentence(sentence: &str) -> Option<NmeaPosition> {
    let payload = checksum_ok(sentence.trim())?;
    let fields: Vec<&str> = payload.split(',').collect();
    let kind = fields.first()?;

    if kind.ends_with("GGA") && fields.len() >= 6 {
        let lat = parse_coord(fields[2], fields[3], 2)?;
        let lon = parse_coord(fields[4], fields[5], 3)?;
        return Some(NmeaPosition {
            lat_deg: lat,
            lon_deg: lon,
            speed_kmh: None,
            track_deg: None,
        });
    }
    if kind.ends_with("RMC") && fields.len() >= 9 {
        // Status field must be Active.
        if fields[2] != "A" {
            return None;
        }
        let lat = parse_coord(fields[3], fields[4], 2)?;
        let lon = parse_coord(fields[5], fields[6], 3)?;
        let speed_kmh = fields[7].parse::<f64>().ok().map(|kn| kn * 1.852);
        let track_deg = fields[8].parse::<f64>().ok();
        return Some(NmeaPosition {
            lat_deg: lat,
            lon_deg: lon,
            speed_kmh,
            track_deg,
        });
    }
    None
}

/// Scan a byte payload for the first valid position sentence.
#[must_use]
pub fn find_position(data: &[u8]) -> Option<NmeaPosition> {
    let text = String::from_utf8_lossy(data);
    text.split(['\r', '\n'])
        .filter(|line| line.starts_with('$'))
        .find_map(parse_sentence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_checksum(payload: &str) -> String {
        let calc = payload.bytes().fold(0u8, |a, b| a ^ b);
        format!("${payload}*{calc:02X}")
    }

    #[test]
    fn test_gga_parse() {
        let s = with_checksum("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        let pos = parse_sentence(&s).expect("valid GGA");
        assert!((pos.lat_deg - 48.1173).abs() < 1e-4);
        assert!((pos.lon_deg - 11.516_667).abs() < 1e-4);
    }

    #[test]
    fn test_rmc_parse_with_speed_and_track() {
        let s = with_checksum("GPRMC,123519,A,4807.038,S,01131.000,W,022.4,084.4,230394,003.1,W");
        let pos = parse_sentence(&s).expect("valid RMC");
        assert!(pos.lat_deg < 0.0);
        assert!(pos.lon_deg < 0.0);
        assert!((pos.speed_kmh.unwrap() - 22.4 * 1.852).abs() < 1e-9);
        assert_eq!(pos.track_deg, Some(84.4));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut s = with_checksum("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        s.pop();
        s.push('0');
        assert!(parse_sentence(&s).is_none());
    }

    #[test]
    fn test_void_rmc_rejected() {
        let s = with_checksum("GPRMC,123519,V,4807.038,N,01131.000,E,,,230394,,");
        assert!(parse_sentence(&s).is_none());
    }

    #[test]
    fn test_find_position_in_mixed_payload() {
        let mut data = b"noise\r\n".to_vec();
        data.extend_from_slice(
            with_checksum("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,")
                .as_bytes(),
        );
        data.extend_from_slice(b"\r\ntrailing");
        assert!(find_position(&data).is_some());
        assert!(find_position(b"no sentences here").is_none());
    }

    #[test]
    fn test_out_of_range_minutes_rejected() {
        let s = with_checksum("GPGGA,123519,4875.000,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert!(parse_sentence(&s).is_none());
    }
}
