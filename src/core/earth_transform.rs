use crate::config::{ParallelParams, ProcessingConfig};
use crate::core::geometry::{centidegrees_to_radians, effective_pitch, Mat3, Vec3};
use crate::core::{assemble, collect_rows};
use crate::types::{
    check_same_shape, fill, Attitude, EarthVelocity, InstrumentVelocity, Orientation,
    VelprofResult, OUTPUT_FILL_VALUE,
};

/// Build the instrument-to-earth rotation for one time row.
///
/// Returns `None` when any attitude value is fill or the orientation flag is
/// not 0 or 1.
pub fn row_rotation(heading: i32, pitch: i32, roll: i32, orientation: i32) -> Option<Mat3> {
    let heading = centidegrees_to_radians(fill::raw(heading)?);
    let pitch = centidegrees_to_radians(fill::raw(pitch)?);
    let roll = centidegrees_to_radians(fill::raw(roll)?);
    let convention = Orientation::from_flag(orientation)?.convention();

    let tilted_roll = roll + convention.roll_offset_deg.to_radians();
    Some(Mat3::attitude(
        heading,
        effective_pitch(pitch, roll),
        tilted_roll,
    ))
}

/// Instrument-to-earth coordinate transform
pub struct EarthTransformer {
    parallel: ParallelParams,
}

impl EarthTransformer {
    pub fn new() -> Self {
        Self::with_config(&ProcessingConfig::default())
    }

    pub fn with_config(config: &ProcessingConfig) -> Self {
        Self {
            parallel: config.parallel,
        }
    }

    /// Rotation for row `t` of a batch
    pub fn rotation_at(&self, attitude: &Attitude, t: usize) -> Option<Mat3> {
        row_rotation(
            attitude.heading.at(t),
            attitude.pitch.at(t),
            attitude.roll.at(t),
            attitude.orientation.at(t),
        )
    }

    /// Rotate instrument-frame velocities into east, north, up.
    ///
    /// The error velocity is carried through unchanged, except that rows with
    /// unusable attitude are filled entirely.
    pub fn instrument_to_earth(
        &self,
        velocity: &InstrumentVelocity,
        attitude: &Attitude,
    ) -> VelprofResult<EarthVelocity> {
        let (rows, bins) = check_same_shape(&[
            ("x", velocity.x.dim()),
            ("y", velocity.y.dim()),
            ("z", velocity.z.dim()),
            ("error", velocity.error.dim()),
        ])?;
        attitude.check_rows(rows)?;
        log::info!("Instrument to earth transform: {} rows x {} bins", rows, bins);

        let per_row = collect_rows(rows, self.parallel.min_rows, |t| {
            let rotation = self.rotation_at(attitude, t);
            let cells = (0..bins)
                .map(|b| {
                    let cell = rotation.and_then(|m| {
                        let v = Vec3::new(
                            fill::instrument_f64(velocity.x[[t, b]])?,
                            fill::instrument_f64(velocity.y[[t, b]])?,
                            fill::instrument_f64(velocity.z[[t, b]])?,
                        );
                        let earth = m.mul_vec(&v);
                        Some([earth.x, earth.y, earth.z, velocity.error[[t, b]]])
                    });
                    cell.unwrap_or([OUTPUT_FILL_VALUE; 4])
                })
                .collect::<Vec<[f64; 4]>>();
            (rotation.is_some(), cells)
        });

        let invalid_rows = per_row.iter().filter(|(valid, _)| !valid).count();
        if invalid_rows > 0 {
            log::warn!("{} of {} rows have unusable attitude and were filled", invalid_rows, rows);
        }

        let per_row = per_row.into_iter().map(|(_, cells)| cells).collect();
        let [east, north, up, error] = assemble(per_row, bins);
        Ok(EarthVelocity {
            east,
            north,
            up,
            error,
        })
    }
}

impl Default for EarthTransformer {
    fn default() -> Self {
        Self::new()
    }
}
