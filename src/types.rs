use ndarray::{Array1, Array2, ArrayView2};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Raw along-beam velocity or percent-good counts (time x bin)
pub type BeamArray = Array2<i32>;

/// Read-only view of raw beam counts (time x bin)
pub type BeamView<'a> = ArrayView2<'a, i32>;

/// Computed velocity or depth profile (time x bin), NaN marks fill
pub type ProfileArray = Array2<f64>;

/// Fill value written by the instrument for missing raw data
pub const ADCP_FILL_VALUE: i32 = -32768;

/// Fill value used by the data system for missing per-sample inputs
pub const SYSTEM_FILL_VALUE: i64 = -999_999_999;

/// Fill value of every computed output cell
pub const OUTPUT_FILL_VALUE: f64 = f64::NAN;

/// Validity checks applied once to each raw scalar.
///
/// Every stage works on `Option<f64>` after this point, so an invalid operand
/// can only ever produce an invalid result.
pub mod fill {
    use super::{ADCP_FILL_VALUE, SYSTEM_FILL_VALUE};

    /// Raw integer counts (beam velocities, attitude, echo): either fill value
    /// is missing data
    pub fn raw(value: i32) -> Option<f64> {
        if value == ADCP_FILL_VALUE || i64::from(value) == SYSTEM_FILL_VALUE {
            None
        } else {
            Some(value as f64)
        }
    }

    /// Floating point instrument values (e.g. earth velocities already scaled to mm/s)
    pub fn instrument_f64(value: f64) -> Option<f64> {
        if !value.is_finite()
            || value == ADCP_FILL_VALUE as f64
            || value == SYSTEM_FILL_VALUE as f64
        {
            None
        } else {
            Some(value)
        }
    }

    /// Per-sample system inputs (depths, pressures, positions, timestamps)
    pub fn system(value: f64) -> Option<f64> {
        if !value.is_finite() || value == SYSTEM_FILL_VALUE as f64 {
            None
        } else {
            Some(value)
        }
    }

    /// Write a checked value back out, invalid becomes the output fill
    pub fn emit(value: Option<f64>) -> f64 {
        value.unwrap_or(super::OUTPUT_FILL_VALUE)
    }
}

/// Vertical orientation of the transducer head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Flag value 1
    UpwardLooking,
    /// Flag value 0
    DownwardLooking,
}

/// Sign conventions that depend on orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationConvention {
    /// Added to the sensor roll before building the attitude matrix (degrees)
    pub roll_offset_deg: f64,
    /// Direction in which bin depths advance away from the transducer
    pub depth_direction: f64,
}

const CONVENTIONS: [OrientationConvention; 2] = [
    OrientationConvention {
        roll_offset_deg: 180.0,
        depth_direction: -1.0,
    },
    OrientationConvention {
        roll_offset_deg: 0.0,
        depth_direction: 1.0,
    },
];

impl Orientation {
    /// Decode the instrument flag; anything other than 0 or 1 is fill
    pub fn from_flag<T: ToPrimitive>(flag: T) -> Option<Self> {
        let flag = flag.to_f64()?;
        if flag == 1.0 {
            Some(Orientation::UpwardLooking)
        } else if flag == 0.0 {
            Some(Orientation::DownwardLooking)
        } else {
            None
        }
    }

    pub fn convention(self) -> &'static OrientationConvention {
        match self {
            Orientation::UpwardLooking => &CONVENTIONS[0],
            Orientation::DownwardLooking => &CONVENTIONS[1],
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::UpwardLooking => write!(f, "upward-looking"),
            Orientation::DownwardLooking => write!(f, "downward-looking"),
        }
    }
}

/// A per-time input given either once for the whole batch or once per row
#[derive(Debug, Clone, PartialEq)]
pub enum PerSample<T> {
    Scalar(T),
    Series(Vec<T>),
}

impl<T: Copy> PerSample<T> {
    /// Value for a row; scalars broadcast to every row
    pub fn at(&self, row: usize) -> T {
        match self {
            PerSample::Scalar(value) => *value,
            PerSample::Series(values) => values[row],
        }
    }

    /// First value, used where only the leading sample is significant
    pub fn first(&self) -> Option<T> {
        match self {
            PerSample::Scalar(value) => Some(*value),
            PerSample::Series(values) => values.first().copied(),
        }
    }

    /// Number of explicit samples, `None` for a broadcast scalar
    pub fn len(&self) -> Option<usize> {
        match self {
            PerSample::Scalar(_) => None,
            PerSample::Series(values) => Some(values.len()),
        }
    }

    /// Confirm the series length matches the number of time rows
    pub fn check_rows(&self, name: &str, rows: usize) -> VelprofResult<()> {
        match self.len() {
            Some(len) if len != rows => Err(VelprofError::ShapeMismatch(format!(
                "{} has {} samples but the batch has {} time rows",
                name, len, rows
            ))),
            _ => Ok(()),
        }
    }
}

macro_rules! per_sample_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PerSample<$t> {
                fn from(value: $t) -> Self {
                    PerSample::Scalar(value)
                }
            }

            impl From<Vec<$t>> for PerSample<$t> {
                fn from(values: Vec<$t>) -> Self {
                    PerSample::Series(values)
                }
            }

            impl From<&[$t]> for PerSample<$t> {
                fn from(values: &[$t]) -> Self {
                    PerSample::Series(values.to_vec())
                }
            }

            impl From<Array1<$t>> for PerSample<$t> {
                fn from(values: Array1<$t>) -> Self {
                    PerSample::Series(values.to_vec())
                }
            }
        )*
    };
}

per_sample_from!(i32, i64, f64);

/// Heading, pitch and roll in centidegrees plus the orientation flag, per time row
#[derive(Debug, Clone)]
pub struct Attitude {
    pub heading: PerSample<i32>,
    pub pitch: PerSample<i32>,
    pub roll: PerSample<i32>,
    pub orientation: PerSample<i32>,
}

impl Attitude {
    pub fn new(
        heading: impl Into<PerSample<i32>>,
        pitch: impl Into<PerSample<i32>>,
        roll: impl Into<PerSample<i32>>,
        orientation: impl Into<PerSample<i32>>,
    ) -> Self {
        Self {
            heading: heading.into(),
            pitch: pitch.into(),
            roll: roll.into(),
            orientation: orientation.into(),
        }
    }

    pub fn check_rows(&self, rows: usize) -> VelprofResult<()> {
        self.heading.check_rows("heading", rows)?;
        self.pitch.check_rows("pitch", rows)?;
        self.roll.check_rows("roll", rows)?;
        self.orientation.check_rows("orientation", rows)
    }
}

/// Position, depth and time of each time row, used for the declination lookup
#[derive(Debug, Clone)]
pub struct GeoReference {
    /// Degrees north
    pub latitude: PerSample<f64>,
    /// Degrees east
    pub longitude: PerSample<f64>,
    /// Metres below the surface
    pub depth: PerSample<f64>,
    /// Seconds since 1900-01-01T00:00:00Z (NTP epoch)
    pub timestamp: PerSample<f64>,
}

impl GeoReference {
    pub fn new(
        latitude: impl Into<PerSample<f64>>,
        longitude: impl Into<PerSample<f64>>,
        depth: impl Into<PerSample<f64>>,
        timestamp: impl Into<PerSample<f64>>,
    ) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
            depth: depth.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn check_rows(&self, rows: usize) -> VelprofResult<()> {
        self.latitude.check_rows("latitude", rows)?;
        self.longitude.check_rows("longitude", rows)?;
        self.depth.check_rows("depth", rows)?;
        self.timestamp.check_rows("timestamp", rows)
    }
}

/// Instrument-frame velocities (mm/s)
#[derive(Debug, Clone)]
pub struct InstrumentVelocity {
    pub x: ProfileArray,
    pub y: ProfileArray,
    pub z: ProfileArray,
    pub error: ProfileArray,
}

/// Earth-frame velocities (mm/s unless a product function scaled them)
#[derive(Debug, Clone)]
pub struct EarthVelocity {
    pub east: ProfileArray,
    pub north: ProfileArray,
    pub up: ProfileArray,
    pub error: ProfileArray,
}

impl EarthVelocity {
    pub fn dim(&self) -> (usize, usize) {
        self.east.dim()
    }
}

/// Error types for velocity profile processing
#[derive(Debug, thiserror::Error)]
pub enum VelprofError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Geomagnetic coefficient error: {0}")]
    Coefficients(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for velocity profile operations
pub type VelprofResult<T> = Result<T, VelprofError>;

/// Require every array to have the same (time, bin) shape as the first
pub fn check_same_shape(arrays: &[(&str, (usize, usize))]) -> VelprofResult<(usize, usize)> {
    let (first_name, expected) = match arrays.first() {
        Some(first) => *first,
        None => {
            return Err(VelprofError::InvalidInput(
                "no input arrays supplied".to_string(),
            ))
        }
    };

    for (name, dim) in &arrays[1..] {
        if *dim != expected {
            return Err(VelprofError::ShapeMismatch(format!(
                "{} is {}x{} but {} is {}x{}",
                name, dim.0, dim.1, first_name, expected.0, expected.1
            )));
        }
    }

    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_checks() {
        assert_eq!(fill::raw(ADCP_FILL_VALUE), None);
        assert_eq!(fill::raw(SYSTEM_FILL_VALUE as i32), None);
        assert_eq!(fill::raw(-325), Some(-325.0));
        assert_eq!(fill::instrument_f64(SYSTEM_FILL_VALUE as f64), None);
        assert_eq!(fill::system(SYSTEM_FILL_VALUE as f64), None);
        assert_eq!(fill::system(f64::NAN), None);
        assert_eq!(fill::system(450.0), Some(450.0));
        assert!(fill::emit(None).is_nan());
    }

    #[test]
    fn test_orientation_flags() {
        assert_eq!(Orientation::from_flag(1), Some(Orientation::UpwardLooking));
        assert_eq!(Orientation::from_flag(0), Some(Orientation::DownwardLooking));
        assert_eq!(Orientation::from_flag(SYSTEM_FILL_VALUE), None);
        assert_eq!(Orientation::from_flag(2.0), None);
        assert_eq!(Orientation::from_flag(0.5), None);
        assert_eq!(Orientation::from_flag(1.0), Some(Orientation::UpwardLooking));

        let up = Orientation::UpwardLooking.convention();
        assert_eq!(up.roll_offset_deg, 180.0);
        assert_eq!(up.depth_direction, -1.0);
        let down = Orientation::DownwardLooking.convention();
        assert_eq!(down.roll_offset_deg, 0.0);
        assert_eq!(down.depth_direction, 1.0);
    }

    #[test]
    fn test_per_sample_broadcast() {
        let scalar: PerSample<i32> = 9841.into();
        assert_eq!(scalar.at(0), 9841);
        assert_eq!(scalar.at(23), 9841);
        assert!(scalar.check_rows("heading", 24).is_ok());

        let series: PerSample<f64> = vec![50.0, 51.0].into();
        assert_eq!(series.at(1), 51.0);
        assert!(series.check_rows("latitude", 2).is_ok());
        assert!(matches!(
            series.check_rows("latitude", 3),
            Err(VelprofError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_check_same_shape() {
        let ok = check_same_shape(&[("b1", (2, 10)), ("b2", (2, 10))]);
        assert_eq!(ok.unwrap(), (2, 10));

        let bad = check_same_shape(&[("b1", (2, 10)), ("pg1", (2, 9))]);
        assert!(matches!(bad, Err(VelprofError::ShapeMismatch(_))));
    }
}
