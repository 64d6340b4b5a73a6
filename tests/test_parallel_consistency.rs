use ndarray::Array2;
use std::time::Instant;
use velprof::config::{ParallelParams, ProcessingConfig};
use velprof::core::{AdcpProducts, BeamData, BinGeometry, FixedDeclination};
use velprof::types::{Attitude, GeoReference, SYSTEM_FILL_VALUE};

fn products(min_rows: usize) -> AdcpProducts {
    AdcpProducts::with_config(&ProcessingConfig {
        parallel: ParallelParams { min_rows },
        ..Default::default()
    })
}

/// Deterministic pseudo-random beam counts. Low percent-good is scattered
/// over single beams (3-beam cells) and over beams 1 and 2 together (fill cells).
fn synthetic_beams(rows: usize, bins: usize, seed: i32) -> ([Array2<i32>; 4], [Array2<i32>; 4]) {
    let velocity = std::array::from_fn(|beam| {
        Array2::from_shape_fn((rows, bins), |(t, b)| {
            ((t as i32 * 131 + b as i32 * 17 + beam as i32 * 59 + seed) % 1201) - 600
        })
    });
    let percent_good = std::array::from_fn(|beam| {
        Array2::from_shape_fn((rows, bins), |(t, b)| {
            let single = (t + b * 3 + beam * 7) % 23 == 0;
            let paired = beam < 2 && (t * 5 + b) % 19 == 0;
            if single || paired { 10 } else { 100 }
        })
    });
    (velocity, percent_good)
}

#[test]
fn test_parallel_matches_sequential() {
    let _ = env_logger::builder().is_test(true).try_init();

    let (rows, bins) = (600, 40);
    let (velocity, percent_good) = synthetic_beams(rows, bins, 7);
    let beams = BeamData::new(
        [velocity[0].view(), velocity[1].view(), velocity[2].view(), velocity[3].view()],
        [percent_good[0].view(), percent_good[1].view(), percent_good[2].view(), percent_good[3].view()],
    )
    .unwrap();

    let heading: Vec<i32> = (0..rows as i32)
        .map(|t| if t % 97 == 0 { SYSTEM_FILL_VALUE as i32 } else { (t * 53) % 36000 })
        .collect();
    let pitch: Vec<i32> = (0..rows as i32).map(|t| (t % 21) * 50 - 500).collect();
    let roll: Vec<i32> = (0..rows as i32).map(|t| (t % 17) * 40 - 320).collect();
    let orientation: Vec<i32> = (0..rows).map(|t| (t % 2) as i32).collect();
    let attitude = Attitude::new(heading, pitch, roll, orientation);
    let geo = GeoReference::new(44.6, -124.3, 0.0, 3545769600.0);
    let model = FixedDeclination(15.2);

    let sequential = products(usize::MAX);
    let parallel = products(1);

    let start = Instant::now();
    let (u_seq, v_seq) = sequential
        .adcp_beam_horizontal(&beams, &attitude, &geo, &model)
        .unwrap();
    println!("Sequential: {:.3} s", start.elapsed().as_secs_f64());

    let start = Instant::now();
    let (u_par, v_par) = parallel
        .adcp_beam_horizontal(&beams, &attitude, &geo, &model)
        .unwrap();
    println!("Parallel: {:.3} s", start.elapsed().as_secs_f64());

    // NaN != NaN, so compare bit patterns
    let bits = |a: &Array2<f64>| a.mapv(f64::to_bits);
    assert_eq!(bits(&u_seq), bits(&u_par));
    assert_eq!(bits(&v_seq), bits(&v_par));
    assert!(u_seq.iter().any(|v| v.is_finite()));
    assert!(u_seq.row(97).iter().all(|v| v.is_nan()));

    let e_seq = sequential.adcp_beam_error(&beams).unwrap();
    let e_par = parallel.adcp_beam_error(&beams).unwrap();
    assert_eq!(bits(&e_seq), bits(&e_par));

    // Cells with two bad beams are fill even where the attitude is valid
    let paired_fill = (0..rows)
        .filter(|t| t % 97 != 0)
        .flat_map(|t| (0..bins).map(move |b| (t, b)))
        .filter(|(t, b)| (t * 5 + b) % 19 == 0)
        .collect::<Vec<_>>();
    assert!(!paired_fill.is_empty());
    for &(t, b) in &paired_fill {
        assert!(u_seq[[t, b]].is_nan());
        assert!(e_seq[[t, b]].is_nan());
    }
    assert!(e_seq.iter().any(|e| *e == 0.0));
}

#[test]
fn test_parallel_bin_depths_match_sequential() {
    let rows = 1000;
    let geometry = BinGeometry::new(
        vec![900.0; rows],
        vec![400.0; rows],
        30.0,
        (0..rows).map(|t| (t % 2) as f64).collect::<Vec<f64>>(),
    );
    let pressure: Vec<f64> = (0..rows).map(|t| 10000.0 + t as f64 * 500.0).collect();

    let seq = products(usize::MAX)
        .adcp_bin_depths_dapa(&geometry, pressure.clone(), 45.0)
        .unwrap();
    let par = products(1)
        .adcp_bin_depths_dapa(&geometry, pressure, 45.0)
        .unwrap();
    assert_eq!(seq, par);
}
