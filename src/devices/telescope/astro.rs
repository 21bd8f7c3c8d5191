//! Sidereal time and coordinate checks

use chrono::{DateTime, TimeZone, Utc};

/// Equatorial coordinates: right ascension in hours, declination in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equatorial {
    pub ra: f64,
    pub dec: f64,
}

impl Equatorial {
    #[must_use]
    pub const fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }
}

/// Whether `ra` is a valid right ascension, `[0, 24)` hours
#[must_use]
pub fn valid_ra(ra: f64) -> bool {
    (0.0..24.0).contains(&ra)
}

/// Whether `dec` is a valid declination, `[-90, 90]` degrees
#[must_use]
pub fn valid_dec(dec: f64) -> bool {
    (-90.0..=90.0).contains(&dec)
}

/// Greenwich mean sidereal time in hours
#[must_use]
pub fn gmst(at: DateTime<Utc>) -> f64 {
    let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).single();
    let days = j2000.map_or(0.0, |epoch| {
        let millis = (at - epoch).num_milliseconds();
        #[allow(clippy::cast_precision_loss)]
        let millis = millis as f64;
        millis / 86_400_000.0
    });
    (18.697_374_558 + 24.065_709_824_419_08 * days).rem_euclid(24.0)
}

/// Local sidereal time in hours at east `longitude` degrees
#[must_use]
pub fn local_sidereal_time(at: DateTime<Utc>, longitude: f64) -> f64 {
    (gmst(at) + longitude / 15.0).rem_euclid(24.0)
}

/// Hour angle of `ra` in hours, normalised to `[-12, 12)`
#[must_use]
pub fn hour_angle(lst: f64, ra: f64) -> f64 {
    (lst - ra + 12.0).rem_euclid(24.0) - 12.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gmst_at_the_epoch() {
        let epoch = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((gmst(epoch) - 18.697_374_558).abs() < 1e-9);
    }

    #[test]
    fn sidereal_day_is_shorter() {
        let epoch = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let later = epoch + chrono::Duration::hours(24);
        let gained = (gmst(later) - gmst(epoch)).rem_euclid(24.0);
        // about 3 min 56 s per solar day
        assert!((gained - 0.065_709_824).abs() < 1e-6);
    }

    #[test]
    fn longitude_shifts_local_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let diff = (local_sidereal_time(at, 15.0) - gmst(at)).rem_euclid(24.0);
        assert!((diff - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hour_angle_wraps() {
        assert!((hour_angle(1.0, 23.0) - 2.0).abs() < 1e-9);
        assert!((hour_angle(23.0, 1.0) + 2.0).abs() < 1e-9);
    }

    #[test]
    fn coordinate_ranges() {
        assert!(valid_ra(0.0));
        assert!(!valid_ra(24.0));
        assert!(valid_dec(-90.0));
        assert!(!valid_dec(90.5));
    }
}
