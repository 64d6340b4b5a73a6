use crate::config::{ParallelParams, ProcessingConfig};
use crate::core::collect_rows;
use crate::types::{
    fill, Orientation, PerSample, ProfileArray, VelprofError, VelprofResult, OUTPUT_FILL_VALUE,
};
use ndarray::Array2;

/// Height (m, negative below the sea surface) from sea pressure (dbar).
///
/// TEOS-10 `gsw_z_from_p` for the standard ocean (SA = 35.16504 g/kg,
/// CT = 0 degC) with zero dynamic height anomaly.
pub fn z_from_p(pressure_dbar: f64, latitude: f64) -> f64 {
    const GAMMA: f64 = 2.26e-7;

    let x = latitude.to_radians().sin();
    let sin2 = x * x;
    let b = 9.780327 * (1.0 + (5.2792e-3 + 2.32e-5 * sin2) * sin2);
    let a = -0.5 * GAMMA * b;
    let c = enthalpy_sso_0(pressure_dbar);

    -2.0 * c / (b + (b * b - 4.0 * a * c).sqrt())
}

/// Specific enthalpy of the standard ocean at CT = 0 (J/kg)
fn enthalpy_sso_0(pressure_dbar: f64) -> f64 {
    const H006: f64 = -2.1078768810e-9;
    const H007: f64 = 2.8019291329e-10;
    const DB2PA: f64 = 1.0e4;

    let z = pressure_dbar * 1e-4;
    let dynamic = z
        * (9.726613854843870e-04
            + z * (-2.252956605630465e-05
                + z * (2.376909655387404e-06
                    + z * (-1.664294869986011e-07
                        + z * (-5.988108894465758e-09 + z * (H006 + H007 * z))))));

    dynamic * DB2PA * 1e4
}

/// How the transducer depth is reported
#[derive(Debug, Clone)]
pub enum SensorDepth {
    /// Depth in metres
    Meters(PerSample<f64>),
    /// Pressure in decapascals, converted with the latitude (degrees north)
    Decapascals {
        pressure: PerSample<f64>,
        latitude: PerSample<f64>,
    },
    /// Pressure in bar, converted with the latitude (degrees north)
    Bar {
        pressure: PerSample<f64>,
        latitude: PerSample<f64>,
    },
}

impl SensorDepth {
    /// Transducer depth (m) for row `t`
    pub fn depth_at(&self, t: usize) -> Option<f64> {
        match self {
            SensorDepth::Meters(depth) => fill::system(depth.at(t)),
            SensorDepth::Decapascals { pressure, latitude } => {
                let dbar = fill::system(pressure.at(t))? / 1000.0;
                Some(-z_from_p(dbar, fill::system(latitude.at(t))?))
            }
            SensorDepth::Bar { pressure, latitude } => {
                let dbar = fill::system(pressure.at(t))? * 10.0;
                Some(-z_from_p(dbar, fill::system(latitude.at(t))?))
            }
        }
    }

    fn series_lengths(&self) -> Vec<(&'static str, Option<usize>)> {
        match self {
            SensorDepth::Meters(depth) => vec![("sensor depth", depth.len())],
            SensorDepth::Decapascals { pressure, latitude }
            | SensorDepth::Bar { pressure, latitude } => {
                vec![("pressure", pressure.len()), ("latitude", latitude.len())]
            }
        }
    }
}

/// Largest bin count an instrument can report
pub const MAX_BINS: usize = u16::MAX as usize;

/// Range-cell layout reported by the instrument, per time row
#[derive(Debug, Clone)]
pub struct BinGeometry {
    /// Distance from the transducer to the centre of the first bin (cm)
    pub dist_first_bin: PerSample<f64>,
    /// Bin size (cm)
    pub bin_size: PerSample<f64>,
    /// Number of bins; only the first sample's value is used
    pub num_bins: PerSample<f64>,
    /// Orientation flag, 1 upward-looking and 0 downward-looking
    pub orientation: PerSample<f64>,
}

impl BinGeometry {
    pub fn new(
        dist_first_bin: impl Into<PerSample<f64>>,
        bin_size: impl Into<PerSample<f64>>,
        num_bins: impl Into<PerSample<f64>>,
        orientation: impl Into<PerSample<f64>>,
    ) -> Self {
        Self {
            dist_first_bin: dist_first_bin.into(),
            bin_size: bin_size.into(),
            num_bins: num_bins.into(),
            orientation: orientation.into(),
        }
    }

    /// Output width, taken from the first sample
    pub fn bin_count(&self) -> VelprofResult<usize> {
        let first = self
            .num_bins
            .first()
            .and_then(fill::system)
            .ok_or_else(|| {
                VelprofError::InvalidInput("the first bin count is missing or fill".to_string())
            })?;

        if first < 1.0 || first > MAX_BINS as f64 || first.fract() != 0.0 {
            return Err(VelprofError::InvalidInput(format!(
                "bin count must be an integer in 1..={}, got {}",
                MAX_BINS, first
            )));
        }

        Ok(first as usize)
    }
}

/// Computes the depth of every range bin from sensor depth and bin layout
pub struct BinDepthCalculator {
    parallel: ParallelParams,
}

impl BinDepthCalculator {
    pub fn new() -> Self {
        Self::with_config(&ProcessingConfig::default())
    }

    pub fn with_config(config: &ProcessingConfig) -> Self {
        Self {
            parallel: config.parallel,
        }
    }

    /// Number of time rows implied by the inputs; all series must agree
    fn batch_rows(lengths: &[(&str, Option<usize>)]) -> VelprofResult<usize> {
        let mut rows: Option<(&str, usize)> = None;
        for (name, len) in lengths {
            if let Some(len) = len {
                match rows {
                    Some((first_name, expected)) if expected != *len => {
                        return Err(VelprofError::ShapeMismatch(format!(
                            "{} has {} samples but {} has {}",
                            name, len, first_name, expected
                        )));
                    }
                    None => rows = Some((name, *len)),
                    _ => {}
                }
            }
        }
        Ok(rows.map(|(_, len)| len).unwrap_or(1))
    }

    /// Depth of each bin for one row, `None` when any row input is fill
    fn row_depths(
        geometry: &BinGeometry,
        sensor: &SensorDepth,
        bins: usize,
        t: usize,
    ) -> Option<Vec<f64>> {
        let dist = fill::system(geometry.dist_first_bin.at(t))? / 100.0;
        let size = fill::system(geometry.bin_size.at(t))? / 100.0;
        let direction = Orientation::from_flag(geometry.orientation.at(t))?
            .convention()
            .depth_direction;
        let depth = sensor.depth_at(t)?;

        Some(
            (0..bins)
                .map(|k| depth + direction * (dist + k as f64 * size))
                .collect(),
        )
    }

    /// Bin depths (m) as a time x bin array
    pub fn bin_depths(
        &self,
        geometry: &BinGeometry,
        sensor: &SensorDepth,
    ) -> VelprofResult<ProfileArray> {
        let mut lengths = vec![
            ("distance to first bin", geometry.dist_first_bin.len()),
            ("bin size", geometry.bin_size.len()),
            ("bin count", geometry.num_bins.len()),
            ("orientation", geometry.orientation.len()),
        ];
        lengths.extend(sensor.series_lengths());
        let rows = Self::batch_rows(&lengths)?;
        let bins = geometry.bin_count()?;
        log::info!("Bin depth geolocation: {} rows x {} bins", rows, bins);

        let per_row = collect_rows(rows, self.parallel.min_rows, |t| {
            Self::row_depths(geometry, sensor, bins, t)
        });

        let mut depths = Array2::from_elem((rows, bins), OUTPUT_FILL_VALUE);
        let mut filled_rows = 0;
        for (t, row) in per_row.into_iter().enumerate() {
            match row {
                Some(values) => {
                    for (b, value) in values.into_iter().enumerate() {
                        depths[[t, b]] = value;
                    }
                }
                None => filled_rows += 1,
            }
        }
        if filled_rows > 0 {
            log::warn!("{} of {} rows had fill inputs and were filled", filled_rows, rows);
        }

        Ok(depths)
    }
}

impl Default for BinDepthCalculator {
    fn default() -> Self {
        Self::new()
    }
}
