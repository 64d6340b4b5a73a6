use crate::config::{ParallelParams, ProcessingConfig};
use crate::core::{assemble, collect_rows};
use crate::types::{
    check_same_shape, fill, GeoReference, ProfileArray, VelprofResult, OUTPUT_FILL_VALUE,
};
use ndarray::ArrayView2;

/// Source of magnetic declination (degrees, east of true north positive)
pub trait DeclinationModel: Sync {
    /// `None` when the position or time lies outside the model's validity
    fn declination(
        &self,
        latitude: f64,
        longitude: f64,
        depth_m: f64,
        ntp_seconds: f64,
    ) -> Option<f64>;
}

/// The same declination everywhere, for instruments with a known local value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDeclination(pub f64);

impl DeclinationModel for FixedDeclination {
    fn declination(
        &self,
        _latitude: f64,
        _longitude: f64,
        _depth_m: f64,
        _ntp_seconds: f64,
    ) -> Option<f64> {
        Some(self.0)
    }
}

/// Rotate a horizontal velocity from magnetic to true north
pub fn rotate_horizontal(east: f64, north: f64, declination_deg: f64) -> (f64, f64) {
    let (s, c) = declination_deg.to_radians().sin_cos();
    (east * c + north * s, -east * s + north * c)
}

/// Applies the declination of each time row to all of its bins
pub struct MagneticCorrector {
    parallel: ParallelParams,
}

impl MagneticCorrector {
    pub fn new() -> Self {
        Self::with_config(&ProcessingConfig::default())
    }

    pub fn with_config(config: &ProcessingConfig) -> Self {
        Self {
            parallel: config.parallel,
        }
    }

    /// Declination for row `t`, `None` for fill inputs or out-of-model positions
    pub fn declination_at(
        &self,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
        t: usize,
    ) -> Option<f64> {
        let latitude = fill::system(geo.latitude.at(t))?;
        let longitude = fill::system(geo.longitude.at(t))?;
        let depth = fill::system(geo.depth.at(t))?;
        let time = fill::system(geo.timestamp.at(t))?;
        model.declination(latitude, longitude, depth, time)
    }

    /// Correct eastward and northward velocities for magnetic declination.
    ///
    /// Cells that are NaN or the instrument fill value stay fill.
    pub fn correct(
        &self,
        east: ArrayView2<'_, f64>,
        north: ArrayView2<'_, f64>,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
    ) -> VelprofResult<(ProfileArray, ProfileArray)> {
        let (rows, bins) = check_same_shape(&[("east", east.dim()), ("north", north.dim())])?;
        geo.check_rows(rows)?;
        log::info!("Magnetic declination correction: {} rows x {} bins", rows, bins);

        let per_row = collect_rows(rows, self.parallel.min_rows, |t| {
            let declination = self.declination_at(geo, model, t);
            let cells = (0..bins)
                .map(|b| {
                    let cell = declination.and_then(|d| {
                        let u = fill::instrument_f64(east[[t, b]])?;
                        let v = fill::instrument_f64(north[[t, b]])?;
                        let (u_cor, v_cor) = rotate_horizontal(u, v, d);
                        Some([u_cor, v_cor])
                    });
                    cell.unwrap_or([OUTPUT_FILL_VALUE; 2])
                })
                .collect::<Vec<[f64; 2]>>();
            (declination.is_some(), cells)
        });

        let missing_rows = per_row.iter().filter(|(found, _)| !found).count();
        if missing_rows > 0 {
            log::warn!("{} of {} rows have no declination and were filled", missing_rows, rows);
        }

        let per_row = per_row.into_iter().map(|(_, cells)| cells).collect();
        let [east_true, north_true] = assemble(per_row, bins);
        Ok((east_true, north_true))
    }
}

impl Default for MagneticCorrector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ADCP_FILL_VALUE, SYSTEM_FILL_VALUE};
    use approx::assert_relative_eq;
    use ndarray::array;

    struct OutOfRange;

    impl DeclinationModel for OutOfRange {
        fn declination(&self, _: f64, _: f64, _: f64, _: f64) -> Option<f64> {
            None
        }
    }

    #[test]
    fn test_zero_declination_is_identity() {
        let (u, v) = rotate_horizontal(217.5, -336.7, 0.0);
        assert_relative_eq!(u, 217.5);
        assert_relative_eq!(v, -336.7);
    }

    #[test]
    fn test_negated_declination_inverts() {
        let (u, v) = rotate_horizontal(217.5, -336.7, 16.94);
        let (u_back, v_back) = rotate_horizontal(u, v, -16.94);
        assert_relative_eq!(u_back, 217.5, epsilon = 1e-10);
        assert_relative_eq!(v_back, -336.7, epsilon = 1e-10);
    }

    #[test]
    fn test_quarter_turn() {
        // Magnetic north is 90 degrees east of true north
        let (u, v) = rotate_horizontal(0.0, 1.0, 90.0);
        assert_relative_eq!(u, 1.0, epsilon = 1e-12);
        assert_relative_eq!(v, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fill_cells_and_rows() {
        let east = array![[100.0, ADCP_FILL_VALUE as f64], [100.0, 100.0]];
        let north = array![[0.0, 0.0], [0.0, 0.0]];
        let geo = GeoReference::new(
            vec![50.0, SYSTEM_FILL_VALUE as f64],
            -145.0,
            0.0,
            3545769600.0,
        );
        let (u, v) = MagneticCorrector::new()
            .correct(east.view(), north.view(), &geo, &FixedDeclination(10.0))
            .unwrap();

        assert!(u[[0, 0]].is_finite());
        assert!(u[[0, 1]].is_nan());
        assert!(v[[0, 1]].is_nan());
        assert!(u[[1, 0]].is_nan());
        assert!(u[[1, 1]].is_nan());
    }

    struct NorthOfSixty;

    impl DeclinationModel for NorthOfSixty {
        fn declination(&self, latitude: f64, _: f64, _: f64, _: f64) -> Option<f64> {
            if latitude > 60.0 {
                None
            } else {
                Some(90.0)
            }
        }
    }

    #[test]
    fn test_rows_without_declination_fill_independently() {
        let _ = env_logger::builder().is_test(true).try_init();
        let east = array![[100.0], [100.0], [100.0], [100.0]];
        let north = array![[0.0], [0.0], [0.0], [0.0]];
        let geo = GeoReference::new(vec![50.0, 70.0, 80.0, 10.0], -145.0, 0.0, 3545769600.0);
        let (u, v) = MagneticCorrector::new()
            .correct(east.view(), north.view(), &geo, &NorthOfSixty)
            .unwrap();

        for t in [0, 3] {
            assert_relative_eq!(u[[t, 0]], 0.0, epsilon = 1e-9);
            assert_relative_eq!(v[[t, 0]], -100.0, epsilon = 1e-9);
        }
        for t in [1, 2] {
            assert!(u[[t, 0]].is_nan());
            assert!(v[[t, 0]].is_nan());
        }
    }

    #[test]
    fn test_out_of_model_range_fills_row() {
        let east = array![[100.0, 200.0]];
        let north = array![[50.0, 60.0]];
        let geo = GeoReference::new(50.0, -145.0, 0.0, 3545769600.0);
        let (u, v) = MagneticCorrector::new()
            .correct(east.view(), north.view(), &geo, &OutOfRange)
            .unwrap();
        assert!(u.iter().all(|x| x.is_nan()));
        assert!(v.iter().all(|x| x.is_nan()));
    }
}
