//! Core ADCP processing modules
//!
//! Every stage works row by row: a time row shares one attitude, position and
//! declination, and no row reads another row's inputs or outputs. Batches can
//! therefore be split across threads in any order with identical results.

pub mod geometry;
pub mod beam_transform;
pub mod earth_transform;
pub mod magnetic;
pub mod geomagnetic;
pub mod bin_depth;
pub mod products;

// Re-export main types
pub use geometry::{centidegrees_to_radians, Mat3, Vec3};
pub use beam_transform::{BeamData, BeamGeometry, BeamMatrix, BeamTransformer, VerticalBeam};
pub use earth_transform::EarthTransformer;
pub use magnetic::{DeclinationModel, FixedDeclination, MagneticCorrector};
pub use geomagnetic::{GaussCoefficient, SphericalHarmonicModel};
pub use bin_depth::{z_from_p, BinDepthCalculator, BinGeometry, SensorDepth};
pub use products::AdcpProducts;

use crate::types::OUTPUT_FILL_VALUE;
use ndarray::Array2;

/// Evaluate `row_fn` for every time row, in parallel when the batch is large enough
#[cfg(feature = "parallel")]
pub(crate) fn collect_rows<T, F>(rows: usize, min_parallel_rows: usize, row_fn: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    use rayon::prelude::*;

    if rows >= min_parallel_rows {
        log::debug!("Processing {} rows on {} threads", rows, rayon::current_num_threads());
        (0..rows).into_par_iter().map(row_fn).collect()
    } else {
        (0..rows).map(row_fn).collect()
    }
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn collect_rows<T, F>(rows: usize, _min_parallel_rows: usize, row_fn: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..rows).map(row_fn).collect()
}

/// Scatter per-row cell tuples into `N` time x bin output arrays
pub(crate) fn assemble<const N: usize>(
    rows: Vec<Vec<[f64; N]>>,
    bins: usize,
) -> [Array2<f64>; N] {
    let n_rows = rows.len();
    let mut outputs: [Array2<f64>; N] =
        std::array::from_fn(|_| Array2::from_elem((n_rows, bins), OUTPUT_FILL_VALUE));

    for (t, cells) in rows.into_iter().enumerate() {
        for (b, cell) in cells.into_iter().enumerate().take(bins) {
            for (output, value) in outputs.iter_mut().zip(cell) {
                output[[t, b]] = value;
            }
        }
    }

    outputs
}
