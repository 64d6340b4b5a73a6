//! L1 velocity profile and echo intensity products
//!
//! Each product chains the transform stages and converts from the instrument's
//! mm/s to m/s. Fill cells come out as NaN.

use crate::config::{ParallelParams, ProcessingConfig};
use crate::core::beam_transform::{BeamData, BeamTransformer, VerticalBeam};
use crate::core::bin_depth::{BinDepthCalculator, BinGeometry, SensorDepth};
use crate::core::earth_transform::EarthTransformer;
use crate::core::geometry::Vec3;
use crate::core::magnetic::{DeclinationModel, MagneticCorrector};
use crate::core::{assemble, collect_rows};
use crate::types::{fill, Attitude, EarthVelocity, GeoReference, PerSample, ProfileArray, VelprofResult};
use ndarray::ArrayView2;

const MM_PER_M: f64 = 1000.0;

/// mm/s to m/s, keeping fill as NaN
fn to_meters_per_second(values: ArrayView2<'_, f64>) -> ProfileArray {
    values.mapv(|v| fill::emit(fill::instrument_f64(v).map(|v| v / MM_PER_M)))
}

/// Product generator holding one configured instance of every stage
pub struct AdcpProducts {
    beam: BeamTransformer,
    earth: EarthTransformer,
    magnetic: MagneticCorrector,
    depths: BinDepthCalculator,
    parallel: ParallelParams,
}

impl AdcpProducts {
    pub fn new() -> Self {
        Self::with_config(&ProcessingConfig::default())
    }

    pub fn with_config(config: &ProcessingConfig) -> Self {
        Self {
            beam: BeamTransformer::with_config(config),
            earth: EarthTransformer::with_config(config),
            magnetic: MagneticCorrector::with_config(config),
            depths: BinDepthCalculator::with_config(config),
            parallel: config.parallel,
        }
    }

    /// Beam velocities to earth coordinates (mm/s, magnetic north)
    pub fn beam_to_earth(
        &self,
        beams: &BeamData<'_>,
        attitude: &Attitude,
    ) -> VelprofResult<EarthVelocity> {
        let instrument = self.beam.beam_to_instrument(beams)?;
        self.earth.instrument_to_earth(&instrument, attitude)
    }

    /// True-north eastward and northward velocities (m/s) from beam data
    pub fn adcp_beam_horizontal(
        &self,
        beams: &BeamData<'_>,
        attitude: &Attitude,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
    ) -> VelprofResult<(ProfileArray, ProfileArray)> {
        let earth = self.beam_to_earth(beams, attitude)?;
        let (east, north) = self
            .magnetic
            .correct(earth.east.view(), earth.north.view(), geo, model)?;
        Ok((
            to_meters_per_second(east.view()),
            to_meters_per_second(north.view()),
        ))
    }

    pub fn adcp_beam_eastward(
        &self,
        beams: &BeamData<'_>,
        attitude: &Attitude,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
    ) -> VelprofResult<ProfileArray> {
        Ok(self.adcp_beam_horizontal(beams, attitude, geo, model)?.0)
    }

    pub fn adcp_beam_northward(
        &self,
        beams: &BeamData<'_>,
        attitude: &Attitude,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
    ) -> VelprofResult<ProfileArray> {
        Ok(self.adcp_beam_horizontal(beams, attitude, geo, model)?.1)
    }

    /// Upward velocity (m/s); declination does not affect it
    pub fn adcp_beam_vertical(
        &self,
        beams: &BeamData<'_>,
        attitude: &Attitude,
    ) -> VelprofResult<ProfileArray> {
        let earth = self.beam_to_earth(beams, attitude)?;
        Ok(to_meters_per_second(earth.up.view()))
    }

    /// Error velocity (m/s), zero wherever the 3-beam solution was used
    pub fn adcp_beam_error(&self, beams: &BeamData<'_>) -> VelprofResult<ProfileArray> {
        let instrument = self.beam.beam_to_instrument(beams)?;
        Ok(to_meters_per_second(instrument.error.view()))
    }

    /// Correct earth-coordinate velocities (mm/s) to true north, in m/s
    pub fn adcp_earth_horizontal(
        &self,
        east: ArrayView2<'_, f64>,
        north: ArrayView2<'_, f64>,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
    ) -> VelprofResult<(ProfileArray, ProfileArray)> {
        let (east, north) = self.magnetic.correct(east, north, geo, model)?;
        Ok((
            to_meters_per_second(east.view()),
            to_meters_per_second(north.view()),
        ))
    }

    pub fn adcp_earth_eastward(
        &self,
        east: ArrayView2<'_, f64>,
        north: ArrayView2<'_, f64>,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
    ) -> VelprofResult<ProfileArray> {
        Ok(self.adcp_earth_horizontal(east, north, geo, model)?.0)
    }

    pub fn adcp_earth_northward(
        &self,
        east: ArrayView2<'_, f64>,
        north: ArrayView2<'_, f64>,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
    ) -> VelprofResult<ProfileArray> {
        Ok(self.adcp_earth_horizontal(east, north, geo, model)?.1)
    }

    pub fn adcp_earth_vertical(&self, up: ArrayView2<'_, f64>) -> ProfileArray {
        to_meters_per_second(up)
    }

    pub fn adcp_earth_error(&self, error: ArrayView2<'_, f64>) -> ProfileArray {
        to_meters_per_second(error)
    }

    /// Echo intensity (dB) from raw counts and a per-row scale factor (dB/count)
    pub fn adcp_backscatter(
        &self,
        echo: ArrayView2<'_, i32>,
        scale_factor: &PerSample<f64>,
    ) -> VelprofResult<ProfileArray> {
        let (rows, bins) = echo.dim();
        scale_factor.check_rows("scale factor", rows)?;
        log::info!("Echo intensity scaling: {} rows x {} bins", rows, bins);

        let per_row = collect_rows(rows, self.parallel.min_rows, |t| {
            let factor = fill::system(scale_factor.at(t));
            (0..bins)
                .map(|b| {
                    let db = factor.and_then(|f| Some(fill::raw(echo[[t, b]])? * f));
                    [fill::emit(db)]
                })
                .collect::<Vec<[f64; 1]>>()
        });

        let [db] = assemble(per_row, bins);
        Ok(db)
    }

    pub fn vadcp_beam_eastward(
        &self,
        beams: &BeamData<'_>,
        attitude: &Attitude,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
    ) -> VelprofResult<ProfileArray> {
        self.adcp_beam_eastward(beams, attitude, geo, model)
    }

    pub fn vadcp_beam_northward(
        &self,
        beams: &BeamData<'_>,
        attitude: &Attitude,
        geo: &GeoReference,
        model: &dyn DeclinationModel,
    ) -> VelprofResult<ProfileArray> {
        self.adcp_beam_northward(beams, attitude, geo, model)
    }

    /// Upward velocity estimated from the four slant beams (m/s)
    pub fn vadcp_beam_vertical_est(
        &self,
        beams: &BeamData<'_>,
        attitude: &Attitude,
    ) -> VelprofResult<ProfileArray> {
        self.adcp_beam_vertical(beams, attitude)
    }

    /// Upward velocity (m/s) with the vertical beam standing in for instrument z.
    ///
    /// x and y still come from the slant beams, so a cell is fill when either
    /// the slant solution or the vertical beam fails quality.
    pub fn vadcp_beam_vertical_true(
        &self,
        beams: &BeamData<'_>,
        vertical: &VerticalBeam<'_>,
        attitude: &Attitude,
    ) -> VelprofResult<ProfileArray> {
        let (rows, bins) = self.beam.check_vertical_beam(beams, vertical)?;
        attitude.check_rows(rows)?;
        log::info!("Five-beam vertical velocity: {} rows x {} bins", rows, bins);

        let per_row = collect_rows(rows, self.parallel.min_rows, |t| {
            let rotation = self.earth.rotation_at(attitude, t);
            (0..bins)
                .map(|b| {
                    let up = rotation.and_then(|m| {
                        let [x, y, _, _] = self.beam.cell(beams, t, b)?;
                        let z = self.beam.vertical_beam_cell(vertical, t, b)?;
                        Some(m.mul_vec(&Vec3::new(x, y, z)).z / MM_PER_M)
                    });
                    [fill::emit(up)]
                })
                .collect::<Vec<[f64; 1]>>()
        });

        let [up] = assemble(per_row, bins);
        Ok(up)
    }

    pub fn vadcp_beam_error(&self, beams: &BeamData<'_>) -> VelprofResult<ProfileArray> {
        self.adcp_beam_error(beams)
    }

    /// Bin depths (m) from a sensor depth in metres
    pub fn adcp_bin_depths_meters(
        &self,
        geometry: &BinGeometry,
        sensor_depth: impl Into<PerSample<f64>>,
    ) -> VelprofResult<ProfileArray> {
        self.depths
            .bin_depths(geometry, &SensorDepth::Meters(sensor_depth.into()))
    }

    /// Bin depths (m) from sensor pressure in decapascals
    pub fn adcp_bin_depths_dapa(
        &self,
        geometry: &BinGeometry,
        pressure: impl Into<PerSample<f64>>,
        latitude: impl Into<PerSample<f64>>,
    ) -> VelprofResult<ProfileArray> {
        let sensor = SensorDepth::Decapascals {
            pressure: pressure.into(),
            latitude: latitude.into(),
        };
        self.depths.bin_depths(geometry, &sensor)
    }

    /// Bin depths (m) from sensor pressure in bar
    pub fn adcp_bin_depths_bar(
        &self,
        geometry: &BinGeometry,
        pressure: impl Into<PerSample<f64>>,
        latitude: impl Into<PerSample<f64>>,
    ) -> VelprofResult<ProfileArray> {
        let sensor = SensorDepth::Bar {
            pressure: pressure.into(),
            latitude: latitude.into(),
        };
        self.depths.bin_depths(geometry, &sensor)
    }
}

impl Default for AdcpProducts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::magnetic::FixedDeclination;
    use crate::types::ADCP_FILL_VALUE;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_scaling_keeps_fill() {
        let up = array![[140.1, ADCP_FILL_VALUE as f64, f64::NAN]];
        let scaled = AdcpProducts::new().adcp_earth_vertical(up.view());
        assert_relative_eq!(scaled[[0, 0]], 0.1401, epsilon = 1e-12);
        assert!(scaled[[0, 1]].is_nan());
        assert!(scaled[[0, 2]].is_nan());
    }

    #[test]
    fn test_backscatter_counts_to_db() {
        let echo = array![[0, 25, 250, ADCP_FILL_VALUE]];
        let db = AdcpProducts::new()
            .adcp_backscatter(echo.view(), &0.45.into())
            .unwrap();
        assert_relative_eq!(db[[0, 0]], 0.0);
        assert_relative_eq!(db[[0, 1]], 11.25, epsilon = 1e-12);
        assert_relative_eq!(db[[0, 2]], 112.5, epsilon = 1e-12);
        assert!(db[[0, 3]].is_nan());
    }

    #[test]
    fn test_backscatter_scale_factor_length() {
        let echo = Array2::<i32>::zeros((3, 4));
        let result = AdcpProducts::new().adcp_backscatter(echo.view(), &vec![0.45, 0.45].into());
        assert!(result.is_err());
    }

    #[test]
    fn test_earth_horizontal_zero_declination_only_scales() {
        let east = array![[217.5, -281.4]];
        let north = array![[-336.7, -181.5]];
        let geo = GeoReference::new(50.0, -145.0, 0.0, 3545769600.0);
        let (u, v) = AdcpProducts::new()
            .adcp_earth_horizontal(east.view(), north.view(), &geo, &FixedDeclination(0.0))
            .unwrap();
        assert_relative_eq!(u[[0, 0]], 0.2175, epsilon = 1e-12);
        assert_relative_eq!(v[[0, 1]], -0.1815, epsilon = 1e-12);
    }

    #[test]
    fn test_vertical_true_level_upward() {
        // Level and upward-looking: up is the negated vertical beam
        let slant = Array2::<i32>::from_elem((1, 2), 100);
        let pg = Array2::<i32>::from_elem((1, 2), 100);
        let b5 = array![[-70, -70]];
        let pg5 = array![[100, 10]];
        let beams = BeamData::new(
            [slant.view(), slant.view(), slant.view(), slant.view()],
            [pg.view(), pg.view(), pg.view(), pg.view()],
        )
        .unwrap();
        let vertical = VerticalBeam::new(b5.view(), pg5.view()).unwrap();
        let up = AdcpProducts::new()
            .vadcp_beam_vertical_true(&beams, &vertical, &Attitude::new(0, 0, 0, 1))
            .unwrap();

        assert_relative_eq!(up[[0, 0]], 0.07, epsilon = 1e-12);
        assert!(up[[0, 1]].is_nan());
    }
}
