use crate::config::{ParallelParams, ProcessingConfig, QualityParams};
use crate::core::{assemble, collect_rows};
use crate::types::{
    check_same_shape, fill, BeamView, InstrumentVelocity, VelprofError, VelprofResult,
    OUTPUT_FILL_VALUE,
};
use serde::{Deserialize, Serialize};

/// Janus transducer geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamGeometry {
    /// Angle of each slant beam from the instrument vertical (degrees)
    pub beam_angle_deg: f64,
    /// Convex transducer head (false for concave)
    pub convex: bool,
}

impl Default for BeamGeometry {
    fn default() -> Self {
        Self {
            beam_angle_deg: 20.0,
            convex: true,
        }
    }
}

impl BeamGeometry {
    /// Build the 4x4 beam-to-instrument matrix for this geometry
    pub fn matrix(&self) -> BeamMatrix {
        let theta = self.beam_angle_deg.to_radians();
        let a = 1.0 / (2.0 * theta.sin());
        let b = 1.0 / (4.0 * theta.cos());
        let c = if self.convex { 1.0 } else { -1.0 };
        let d = a / 2f64.sqrt();

        BeamMatrix {
            m: [
                [c * a, -c * a, 0.0, 0.0],
                [0.0, 0.0, -c * a, c * a],
                [b, b, b, b],
                [d, d, -d, -d],
            ],
        }
    }
}

/// Maps beams 1-4 to instrument x, y, z and error velocity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamMatrix {
    pub m: [[f64; 4]; 4],
}

impl BeamMatrix {
    pub fn apply(&self, v: [f64; 4]) -> [f64; 4] {
        let mut out = [0.0; 4];
        for (row, value) in self.m.iter().zip(out.iter_mut()) {
            *value = row.iter().zip(v.iter()).map(|(m, v)| m * v).sum();
        }
        out
    }

    /// Gauss-Jordan inverse with partial pivoting
    pub fn inverse(&self) -> Option<BeamMatrix> {
        let mut a = self.m;
        let mut inv = [[0.0; 4]; 4];
        for (i, row) in inv.iter_mut().enumerate() {
            row[i] = 1.0;
        }

        for col in 0..4 {
            let pivot = (col..4)
                .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
                .unwrap_or(col);
            if a[pivot][col].abs() < 1e-12 {
                return None;
            }
            a.swap(col, pivot);
            inv.swap(col, pivot);

            let scale = a[col][col];
            for k in 0..4 {
                a[col][k] /= scale;
                inv[col][k] /= scale;
            }

            for row in 0..4 {
                if row != col {
                    let factor = a[row][col];
                    for k in 0..4 {
                        a[row][k] -= factor * a[col][k];
                        inv[row][k] -= factor * inv[col][k];
                    }
                }
            }
        }

        Some(BeamMatrix { m: inv })
    }
}

/// Value that replaces a single bad beam, as a combination of all four beams.
/// Each row sets the error velocity to zero (b1 + b2 = b3 + b4).
const THREE_BEAM_SUBSTITUTION: [[f64; 4]; 4] = [
    [0.0, -1.0, 1.0, 1.0],
    [-1.0, 0.0, 1.0, 1.0],
    [1.0, 1.0, 0.0, -1.0],
    [1.0, 1.0, -1.0, 0.0],
];

/// Raw beam velocities and percent-good for a four-beam instrument
#[derive(Debug, Clone)]
pub struct BeamData<'a> {
    pub velocity: [BeamView<'a>; 4],
    pub percent_good: [BeamView<'a>; 4],
}

impl<'a> BeamData<'a> {
    pub fn new(velocity: [BeamView<'a>; 4], percent_good: [BeamView<'a>; 4]) -> VelprofResult<Self> {
        let data = Self {
            velocity,
            percent_good,
        };
        data.dim()?;
        Ok(data)
    }

    /// Common (time, bin) shape of all eight arrays
    pub fn dim(&self) -> VelprofResult<(usize, usize)> {
        const NAMES: [&str; 8] = ["b1", "b2", "b3", "b4", "pg1", "pg2", "pg3", "pg4"];
        let dims: Vec<(&str, (usize, usize))> = self
            .velocity
            .iter()
            .chain(self.percent_good.iter())
            .zip(NAMES)
            .map(|(array, name)| (name, array.dim()))
            .collect();
        check_same_shape(&dims)
    }
}

/// The fifth, vertically oriented beam of a five-beam instrument
#[derive(Debug, Clone)]
pub struct VerticalBeam<'a> {
    pub velocity: BeamView<'a>,
    pub percent_good: BeamView<'a>,
}

impl<'a> VerticalBeam<'a> {
    pub fn new(velocity: BeamView<'a>, percent_good: BeamView<'a>) -> VelprofResult<Self> {
        check_same_shape(&[("b5", velocity.dim()), ("pg5", percent_good.dim())])?;
        Ok(Self {
            velocity,
            percent_good,
        })
    }
}

/// Beam-to-instrument transform with percent-good screening and 3-beam fallback
pub struct BeamTransformer {
    matrix: BeamMatrix,
    quality: QualityParams,
    parallel: ParallelParams,
}

impl BeamTransformer {
    /// Create a transformer with the default 20 degree convex geometry
    pub fn new() -> Self {
        Self::with_config(&ProcessingConfig::default())
    }

    pub fn with_config(config: &ProcessingConfig) -> Self {
        Self {
            matrix: config.beam.matrix(),
            quality: config.quality,
            parallel: config.parallel,
        }
    }

    pub fn matrix(&self) -> &BeamMatrix {
        &self.matrix
    }

    /// Screen one beam sample. Fill values are negative so they fail any
    /// non-negative threshold.
    pub fn screen(&self, velocity: i32, percent_good: i32) -> Option<f64> {
        if percent_good < self.quality.percent_good_threshold {
            None
        } else {
            fill::raw(velocity)
        }
    }

    /// Solve one cell. Bad beams are `None`; returns x, y, z, error.
    pub fn solve(&self, beams: [Option<f64>; 4]) -> Option<[f64; 4]> {
        let bad: Vec<usize> = (0..4).filter(|&i| beams[i].is_none()).collect();

        match bad.as_slice() {
            [] => {
                let values = beams.map(|b| b.unwrap_or_default());
                Some(self.matrix.apply(values))
            }
            [missing] => {
                let mut values = beams.map(|b| b.unwrap_or_default());
                values[*missing] = THREE_BEAM_SUBSTITUTION[*missing]
                    .iter()
                    .zip(values.iter())
                    .map(|(w, v)| w * v)
                    .sum();
                let mut solution = self.matrix.apply(values);
                solution[3] = 0.0;
                Some(solution)
            }
            _ => None,
        }
    }

    fn screened_cell(&self, beams: &BeamData<'_>, t: usize, b: usize) -> [Option<f64>; 4] {
        std::array::from_fn(|i| {
            self.screen(beams.velocity[i][[t, b]], beams.percent_good[i][[t, b]])
        })
    }

    /// Screen and solve the cell at row `t`, bin `b`
    pub fn cell(&self, beams: &BeamData<'_>, t: usize, b: usize) -> Option<[f64; 4]> {
        self.solve(self.screened_cell(beams, t, b))
    }

    /// Along-beam velocities that produce the given x, y, z and error velocity
    pub fn instrument_to_beam(&self, instrument: [f64; 4]) -> Option<[f64; 4]> {
        self.matrix.inverse().map(|inv| inv.apply(instrument))
    }

    /// Transform a batch of beam velocities into instrument coordinates (mm/s)
    pub fn beam_to_instrument(&self, beams: &BeamData<'_>) -> VelprofResult<InstrumentVelocity> {
        let (rows, bins) = beams.dim()?;
        log::info!("Beam to instrument transform: {} rows x {} bins", rows, bins);
        log::debug!(
            "Beam matrix {:?}, percent-good threshold {}",
            self.matrix,
            self.quality.percent_good_threshold
        );

        let per_row = collect_rows(rows, self.parallel.min_rows, |t| {
            (0..bins)
                .map(|b| self.cell(beams, t, b).unwrap_or([OUTPUT_FILL_VALUE; 4]))
                .collect::<Vec<[f64; 4]>>()
        });

        let [x, y, z, error] = assemble(per_row, bins);
        let filled = x.iter().filter(|v| v.is_nan()).count();
        if filled > 0 {
            log::debug!("{} of {} cells failed beam quality", filled, rows * bins);
        }

        Ok(InstrumentVelocity { x, y, z, error })
    }

    /// Screen the vertical beam of a five-beam instrument at one cell
    pub fn vertical_beam_cell(&self, beam: &VerticalBeam<'_>, t: usize, b: usize) -> Option<f64> {
        self.screen(beam.velocity[[t, b]], beam.percent_good[[t, b]])
    }

    /// Check that a vertical beam matches the four slant beams
    pub fn check_vertical_beam(
        &self,
        beams: &BeamData<'_>,
        vertical: &VerticalBeam<'_>,
    ) -> VelprofResult<(usize, usize)> {
        let dim = beams.dim()?;
        if vertical.velocity.dim() != dim {
            return Err(VelprofError::ShapeMismatch(format!(
                "vertical beam is {:?} but slant beams are {:?}",
                vertical.velocity.dim(),
                dim
            )));
        }
        Ok(dim)
    }
}

impl Default for BeamTransformer {
    fn default() -> Self {
        Self::new()
    }
}
