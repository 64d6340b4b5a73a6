//! velprof: ADCP velocity profile processing
//!
//! Converts raw acoustic Doppler current profiler data into geophysical
//! velocity profiles: beam to instrument coordinates with percent-good
//! screening and the 3-beam solution, instrument to earth coordinates, magnetic
//! declination correction, and bin-depth geolocation from depth or pressure.

pub mod types;
pub mod config;
pub mod core;
pub mod io;

// Re-export main types
pub use types::{
    Attitude, EarthVelocity, GeoReference, InstrumentVelocity, Orientation, PerSample,
    ProfileArray, VelprofError, VelprofResult, ADCP_FILL_VALUE, OUTPUT_FILL_VALUE,
    SYSTEM_FILL_VALUE,
};
pub use config::ProcessingConfig;
pub use core::{
    z_from_p, AdcpProducts, BeamData, BeamGeometry, BeamTransformer, BinDepthCalculator,
    BinGeometry, DeclinationModel, EarthTransformer, FixedDeclination, MagneticCorrector,
    SensorDepth, SphericalHarmonicModel, VerticalBeam,
};
pub use io::CofReader;

#[cfg(feature = "python")]
mod python {
    use super::*;
    use numpy::{PyReadonlyArray2, ToPyArray};
    use pyo3::exceptions::{PyIOError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    fn to_py_err(err: VelprofError) -> PyErr {
        match err {
            VelprofError::Io(e) => PyIOError::new_err(e.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }

    /// Convert Array2<f64> to numpy array
    fn array2_to_numpy(py: Python, arr: &ProfileArray) -> PyObject {
        arr.to_pyarray(py).into()
    }

    /// Fixed declination, or a coefficient file when one is given
    fn declination_model(
        cof_path: Option<String>,
        declination: f64,
    ) -> PyResult<Box<dyn DeclinationModel>> {
        match cof_path {
            Some(path) => Ok(Box::new(CofReader::read_file(&path).map_err(to_py_err)?)),
            None => Ok(Box::new(FixedDeclination(declination))),
        }
    }

    /// Beam-coordinate ADCP data to true-north velocity profiles (m/s)
    #[pyfunction]
    #[pyo3(signature = (
        b1, b2, b3, b4, pg1, pg2, pg3, pg4, heading, pitch, roll, orientation,
        lat, lon, ntp, declination = 0.0, cof_path = None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn adcp_beam_velocity(
        py: Python,
        b1: PyReadonlyArray2<i32>,
        b2: PyReadonlyArray2<i32>,
        b3: PyReadonlyArray2<i32>,
        b4: PyReadonlyArray2<i32>,
        pg1: PyReadonlyArray2<i32>,
        pg2: PyReadonlyArray2<i32>,
        pg3: PyReadonlyArray2<i32>,
        pg4: PyReadonlyArray2<i32>,
        heading: Vec<i32>,
        pitch: Vec<i32>,
        roll: Vec<i32>,
        orientation: Vec<i32>,
        lat: Vec<f64>,
        lon: Vec<f64>,
        ntp: Vec<f64>,
        declination: f64,
        cof_path: Option<String>,
    ) -> PyResult<PyObject> {
        let beams = BeamData::new(
            [b1.as_array(), b2.as_array(), b3.as_array(), b4.as_array()],
            [pg1.as_array(), pg2.as_array(), pg3.as_array(), pg4.as_array()],
        )
        .map_err(to_py_err)?;
        let attitude = Attitude::new(heading, pitch, roll, orientation);
        let geo = GeoReference::new(lat, lon, 0.0, ntp);
        let model = declination_model(cof_path, declination)?;

        let products = AdcpProducts::new();
        let (east, north) = products
            .adcp_beam_horizontal(&beams, &attitude, &geo, model.as_ref())
            .map_err(to_py_err)?;
        let up = products
            .adcp_beam_vertical(&beams, &attitude)
            .map_err(to_py_err)?;
        let error = products.adcp_beam_error(&beams).map_err(to_py_err)?;

        let result = PyDict::new(py);
        result.set_item("eastward", array2_to_numpy(py, &east))?;
        result.set_item("northward", array2_to_numpy(py, &north))?;
        result.set_item("vertical", array2_to_numpy(py, &up))?;
        result.set_item("error", array2_to_numpy(py, &error))?;
        Ok(result.into())
    }

    /// Earth-coordinate ADCP data (mm/s) to true-north velocity profiles (m/s)
    #[pyfunction]
    #[pyo3(signature = (u, v, w, e, depth, lat, lon, ntp, declination = 0.0, cof_path = None))]
    #[allow(clippy::too_many_arguments)]
    fn adcp_earth_velocity(
        py: Python,
        u: PyReadonlyArray2<f64>,
        v: PyReadonlyArray2<f64>,
        w: PyReadonlyArray2<f64>,
        e: PyReadonlyArray2<f64>,
        depth: Vec<f64>,
        lat: Vec<f64>,
        lon: Vec<f64>,
        ntp: Vec<f64>,
        declination: f64,
        cof_path: Option<String>,
    ) -> PyResult<PyObject> {
        let geo = GeoReference::new(lat, lon, depth, ntp);
        let model = declination_model(cof_path, declination)?;

        let products = AdcpProducts::new();
        let (east, north) = products
            .adcp_earth_horizontal(u.as_array(), v.as_array(), &geo, model.as_ref())
            .map_err(to_py_err)?;

        let result = PyDict::new(py);
        result.set_item("eastward", array2_to_numpy(py, &east))?;
        result.set_item("northward", array2_to_numpy(py, &north))?;
        result.set_item(
            "vertical",
            array2_to_numpy(py, &products.adcp_earth_vertical(w.as_array())),
        )?;
        result.set_item(
            "error",
            array2_to_numpy(py, &products.adcp_earth_error(e.as_array())),
        )?;
        Ok(result.into())
    }

    /// Five-beam vertical velocity (m/s) using the vertical beam
    #[pyfunction]
    #[allow(clippy::too_many_arguments)]
    fn vadcp_beam_vertical_true(
        py: Python,
        b1: PyReadonlyArray2<i32>,
        b2: PyReadonlyArray2<i32>,
        b3: PyReadonlyArray2<i32>,
        b4: PyReadonlyArray2<i32>,
        b5: PyReadonlyArray2<i32>,
        pg1: PyReadonlyArray2<i32>,
        pg2: PyReadonlyArray2<i32>,
        pg3: PyReadonlyArray2<i32>,
        pg4: PyReadonlyArray2<i32>,
        pg5: PyReadonlyArray2<i32>,
        heading: Vec<i32>,
        pitch: Vec<i32>,
        roll: Vec<i32>,
        orientation: Vec<i32>,
    ) -> PyResult<PyObject> {
        let beams = BeamData::new(
            [b1.as_array(), b2.as_array(), b3.as_array(), b4.as_array()],
            [pg1.as_array(), pg2.as_array(), pg3.as_array(), pg4.as_array()],
        )
        .map_err(to_py_err)?;
        let vertical = VerticalBeam::new(b5.as_array(), pg5.as_array()).map_err(to_py_err)?;
        let attitude = Attitude::new(heading, pitch, roll, orientation);

        let up = AdcpProducts::new()
            .vadcp_beam_vertical_true(&beams, &vertical, &attitude)
            .map_err(to_py_err)?;
        Ok(array2_to_numpy(py, &up))
    }

    /// Echo intensity counts to dB
    #[pyfunction]
    fn adcp_backscatter(
        py: Python,
        echo: PyReadonlyArray2<i32>,
        scale_factor: Vec<f64>,
    ) -> PyResult<PyObject> {
        let db = AdcpProducts::new()
            .adcp_backscatter(echo.as_array(), &scale_factor.into())
            .map_err(to_py_err)?;
        Ok(array2_to_numpy(py, &db))
    }

    /// Bin depths (m); `units` is "meters", "dapa" or "bar"
    #[pyfunction]
    #[pyo3(signature = (dist_first_bin, bin_size, num_bins, sensor, orientation, units, latitude = None))]
    #[allow(clippy::too_many_arguments)]
    fn adcp_bin_depths(
        py: Python,
        dist_first_bin: Vec<f64>,
        bin_size: Vec<f64>,
        num_bins: Vec<f64>,
        sensor: Vec<f64>,
        orientation: Vec<f64>,
        units: &str,
        latitude: Option<Vec<f64>>,
    ) -> PyResult<PyObject> {
        let geometry = BinGeometry::new(dist_first_bin, bin_size, num_bins, orientation);
        let products = AdcpProducts::new();
        let pressure_latitude = || {
            latitude
                .clone()
                .ok_or_else(|| PyValueError::new_err("pressure units need a latitude"))
        };

        let depths = match units.to_lowercase().as_str() {
            "meters" | "m" => products.adcp_bin_depths_meters(&geometry, sensor),
            "dapa" => products.adcp_bin_depths_dapa(&geometry, sensor, pressure_latitude()?),
            "bar" => products.adcp_bin_depths_bar(&geometry, sensor, pressure_latitude()?),
            _ => {
                return Err(PyValueError::new_err(format!(
                    "Invalid depth units: {}",
                    units
                )))
            }
        }
        .map_err(to_py_err)?;

        Ok(array2_to_numpy(py, &depths))
    }

    /// TEOS-10 height (m) from sea pressure (dbar)
    #[pyfunction]
    #[pyo3(name = "z_from_p")]
    fn py_z_from_p(pressure: Vec<f64>, latitude: Vec<f64>) -> PyResult<Vec<f64>> {
        if pressure.len() != latitude.len() {
            return Err(PyValueError::new_err(
                "pressure and latitude must have the same length",
            ));
        }
        Ok(pressure
            .iter()
            .zip(latitude.iter())
            .map(|(p, lat)| z_from_p(*p, *lat))
            .collect())
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(adcp_beam_velocity, m)?)?;
        m.add_function(wrap_pyfunction!(adcp_earth_velocity, m)?)?;
        m.add_function(wrap_pyfunction!(vadcp_beam_vertical_true, m)?)?;
        m.add_function(wrap_pyfunction!(adcp_backscatter, m)?)?;
        m.add_function(wrap_pyfunction!(adcp_bin_depths, m)?)?;
        m.add_function(wrap_pyfunction!(py_z_from_p, m)?)?;
        Ok(())
    }
}
