//! Spherical-harmonic main-field model for magnetic declination
//!
//! Evaluates a Gauss coefficient set (WMM / IGRF style, Schmidt
//! semi-normalised) with linear secular variation from the model epoch.

use crate::core::magnetic::DeclinationModel;
use crate::types::{VelprofError, VelprofResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

/// WGS-84 semi-major axis (km)
const WGS84_A: f64 = 6378.137;
/// WGS-84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// Geomagnetic reference radius (km)
const REFERENCE_RADIUS: f64 = 6371.2;

/// One row of a coefficient table (nT and nT/year)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussCoefficient {
    pub n: usize,
    pub m: usize,
    pub g: f64,
    pub h: f64,
    pub dg: f64,
    pub dh: f64,
}

/// Convert an NTP timestamp (seconds since 1900-01-01) to UTC
pub fn ntp_to_datetime(ntp_seconds: f64) -> Option<DateTime<Utc>> {
    if !ntp_seconds.is_finite() || ntp_seconds < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let epoch = Utc.from_utc_datetime(&epoch);
    let millis = (ntp_seconds * 1000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Fractional year, e.g. 2012-05-12T00:00Z is 2012.3607
pub fn decimal_year(time: &DateTime<Utc>) -> f64 {
    let year = time.year();
    let days_in_year = match NaiveDate::from_ymd_opt(year, 12, 31) {
        Some(last) => last.ordinal() as f64,
        None => 365.0,
    };
    let seconds = time.num_seconds_from_midnight() as f64 + time.nanosecond() as f64 * 1e-9;
    year as f64 + (time.ordinal0() as f64 + seconds / 86_400.0) / days_in_year
}

/// Main-field model built from Gauss coefficients
#[derive(Debug, Clone)]
pub struct SphericalHarmonicModel {
    name: String,
    epoch: f64,
    valid_years: f64,
    min_altitude_km: f64,
    max_altitude_km: f64,
    max_degree: usize,
    g: Vec<Vec<f64>>,
    h: Vec<Vec<f64>>,
    dg: Vec<Vec<f64>>,
    dh: Vec<Vec<f64>>,
}

impl SphericalHarmonicModel {
    /// Build a model valid for five years from `epoch`
    pub fn new(name: &str, epoch: f64, coefficients: &[GaussCoefficient]) -> VelprofResult<Self> {
        if coefficients.is_empty() {
            return Err(VelprofError::Coefficients(format!(
                "model {} has no coefficients",
                name
            )));
        }
        if !epoch.is_finite() {
            return Err(VelprofError::Coefficients(format!(
                "model {} has an invalid epoch",
                name
            )));
        }

        let max_degree = coefficients.iter().map(|c| c.n).max().unwrap_or(0);
        let table = || vec![vec![0.0; max_degree + 1]; max_degree + 1];
        let (mut g, mut h, mut dg, mut dh) = (table(), table(), table(), table());

        for c in coefficients {
            if c.n == 0 || c.m > c.n {
                return Err(VelprofError::Coefficients(format!(
                    "invalid degree/order n={} m={}",
                    c.n, c.m
                )));
            }
            g[c.n][c.m] = c.g;
            h[c.n][c.m] = c.h;
            dg[c.n][c.m] = c.dg;
            dh[c.n][c.m] = c.dh;
        }

        log::info!(
            "Loaded geomagnetic model {} (epoch {}, degree {})",
            name,
            epoch,
            max_degree
        );

        Ok(Self {
            name: name.to_string(),
            epoch,
            valid_years: 5.0,
            min_altitude_km: -12.0,
            max_altitude_km: 850.0,
            max_degree,
            g,
            h,
            dg,
            dh,
        })
    }

    /// Override the validity span after the epoch
    pub fn with_validity(mut self, years: f64) -> Self {
        self.valid_years = years;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    pub fn is_valid_at(&self, year: f64) -> bool {
        year >= self.epoch && year < self.epoch + self.valid_years
    }

    /// North, east and down field components (nT) in the geodetic frame.
    ///
    /// `None` outside the model's time and altitude range and at the poles,
    /// where declination is undefined.
    pub fn field(
        &self,
        latitude: f64,
        longitude: f64,
        altitude_km: f64,
        year: f64,
    ) -> Option<(f64, f64, f64)> {
        if !self.is_valid_at(year)
            || !(-90.0..=90.0).contains(&latitude)
            || altitude_km < self.min_altitude_km
            || altitude_km > self.max_altitude_km
        {
            return None;
        }

        // Geodetic to geocentric spherical coordinates
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let lat = latitude.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let rc = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let xp = (rc + altitude_km) * cos_lat;
        let zp = (rc * (1.0 - e2) + altitude_km) * sin_lat;
        let r = (xp * xp + zp * zp).sqrt();
        let lat_gc = (zp / r).asin();

        // Colatitude terms
        let ct = zp / r;
        let st = xp / r;
        if st.abs() < 1e-9 {
            return None;
        }

        let (p, dp) = self.legendre(ct, st);
        let lon = longitude.to_radians();
        let dt = year - self.epoch;
        let ratio = REFERENCE_RADIUS / r;

        let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
        for n in 1..=self.max_degree {
            let rn = ratio.powi(n as i32 + 2);
            for m in 0..=n {
                let (sm, cm) = (m as f64 * lon).sin_cos();
                let g = self.g[n][m] + dt * self.dg[n][m];
                let h = self.h[n][m] + dt * self.dh[n][m];
                let gh = g * cm + h * sm;

                x += rn * gh * dp[n][m];
                y += rn * m as f64 * (g * sm - h * cm) * p[n][m] / st;
                z -= (n + 1) as f64 * rn * gh * p[n][m];
            }
        }

        // Rotate north and down from the geocentric to the geodetic frame
        let psi = lat_gc - lat;
        let (sin_psi, cos_psi) = psi.sin_cos();
        let north = x * cos_psi - z * sin_psi;
        let down = x * sin_psi + z * cos_psi;

        Some((north, y, down))
    }

    /// Declination in degrees, east positive
    pub fn declination_at(
        &self,
        latitude: f64,
        longitude: f64,
        altitude_km: f64,
        year: f64,
    ) -> Option<f64> {
        let (north, east, _) = self.field(latitude, longitude, altitude_km, year)?;
        Some(east.atan2(north).to_degrees())
    }

    /// Schmidt semi-normalised associated Legendre functions of cos(colatitude)
    /// and their colatitude derivatives
    fn legendre(&self, ct: f64, st: f64) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let size = self.max_degree + 1;
        let mut p = vec![vec![0.0; size]; size];
        let mut dp = vec![vec![0.0; size]; size];
        p[0][0] = 1.0;

        for n in 1..size {
            for m in 0..=n {
                if n == m {
                    if n == 1 {
                        p[1][1] = st;
                        dp[1][1] = ct;
                    } else {
                        let k = ((2 * n - 1) as f64 / (2 * n) as f64).sqrt();
                        p[n][n] = k * st * p[n - 1][n - 1];
                        dp[n][n] = k * (ct * p[n - 1][n - 1] + st * dp[n - 1][n - 1]);
                    }
                } else {
                    let (nf, mf) = (n as f64, m as f64);
                    let k1 = 2.0 * nf - 1.0;
                    let k2 = ((nf - 1.0) * (nf - 1.0) - mf * mf).sqrt();
                    let denom = (nf * nf - mf * mf).sqrt();
                    let (p2, dp2) = if n >= 2 { (p[n - 2][m], dp[n - 2][m]) } else { (0.0, 0.0) };

                    p[n][m] = (k1 * ct * p[n - 1][m] - k2 * p2) / denom;
                    dp[n][m] = (k1 * (ct * dp[n - 1][m] - st * p[n - 1][m]) - k2 * dp2) / denom;
                }
            }
        }

        (p, dp)
    }
}

impl DeclinationModel for SphericalHarmonicModel {
    fn declination(
        &self,
        latitude: f64,
        longitude: f64,
        depth_m: f64,
        ntp_seconds: f64,
    ) -> Option<f64> {
        let year = decimal_year(&ntp_to_datetime(ntp_seconds)?);
        self.declination_at(latitude, longitude, -depth_m / 1000.0, year)
    }
}
