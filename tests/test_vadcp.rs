use approx::assert_abs_diff_eq;
use ndarray::Array2;
use velprof::core::{AdcpProducts, BeamData, VerticalBeam};
use velprof::types::Attitude;

#[test]
fn test_vadcp_beam_vertical_true() {
    let _ = env_logger::builder().is_test(true).try_init();

    let full = |value: i32| Array2::from_elem((10, 10), value);
    let (b1, b2, b3, b4, b5) = (full(-325), full(188), full(168), full(-338), full(-70));
    let (mut pg1, mut pg2, mut pg5) = (full(100), full(100), full(100));
    let (pg3, pg4) = (full(100), full(100));

    // Two slant beams bad in bins 2 and 3, vertical beam bad in bin 9
    for b in [2, 3] {
        pg1.column_mut(b).fill(24);
        pg2.column_mut(b).fill(24);
    }
    pg5.column_mut(9).fill(24);

    let beams = BeamData::new(
        [b1.view(), b2.view(), b3.view(), b4.view()],
        [pg1.view(), pg2.view(), pg3.view(), pg4.view()],
    )
    .unwrap();
    let vertical = VerticalBeam::new(b5.view(), pg5.view()).unwrap();

    let heading: Vec<i32> = [30, 30, 30, 30, 30, 32, 32, 32, 32, 32]
        .iter()
        .map(|h| h * 100)
        .collect();
    let pitch: Vec<i32> = [0, 2, 3, 3, 1, 2, 2, 3, 3, 1].iter().map(|p| p * 100).collect();
    let roll: Vec<i32> = [0, 4, 3, 4, 3, 3, 4, 3, 4, 3].iter().map(|r| r * 100).collect();
    let attitude = Attitude::new(heading, pitch, roll, vec![1; 10]);

    let expected = [
        0.07000000, -0.00824854, -0.00804866, -0.02112871, 0.01775751,
        0.00485518, -0.00824854, -0.00804866, -0.02112871, 0.01775751,
    ];

    let up = AdcpProducts::new()
        .vadcp_beam_vertical_true(&beams, &vertical, &attitude)
        .unwrap();

    assert_eq!(up.dim(), (10, 10));
    for t in 0..10 {
        for b in 0..10 {
            if [2, 3, 9].contains(&b) {
                assert!(up[[t, b]].is_nan(), "row {} bin {} should be fill", t, b);
            } else {
                assert_abs_diff_eq!(up[[t, b]], expected[t], epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn test_vadcp_slant_products_match_four_beam_products() {
    let b = Array2::from_shape_fn((3, 4), |(t, b)| (t as i32 * 37 - b as i32 * 11) * 5);
    let reversed = b.mapv(|v| -v / 2);
    let pg = Array2::from_elem((3, 4), 100);
    let beams = BeamData::new(
        [b.view(), reversed.view(), b.view(), reversed.view()],
        [pg.view(), pg.view(), pg.view(), pg.view()],
    )
    .unwrap();
    let attitude = Attitude::new(4500, 120, -80, 0);
    let products = AdcpProducts::new();

    let est = products.vadcp_beam_vertical_est(&beams, &attitude).unwrap();
    let w = products.adcp_beam_vertical(&beams, &attitude).unwrap();
    assert_eq!(est, w);

    let e5 = products.vadcp_beam_error(&beams).unwrap();
    let e4 = products.adcp_beam_error(&beams).unwrap();
    assert_eq!(e5, e4);
}

#[test]
fn test_vertical_beam_shape_mismatch() {
    let slant = Array2::from_elem((2, 5), 100);
    let short = Array2::from_elem((2, 4), 100);
    let beams = BeamData::new(
        [slant.view(), slant.view(), slant.view(), slant.view()],
        [slant.view(), slant.view(), slant.view(), slant.view()],
    )
    .unwrap();
    let vertical = VerticalBeam::new(short.view(), short.view()).unwrap();

    let result =
        AdcpProducts::new().vadcp_beam_vertical_true(&beams, &vertical, &Attitude::new(0, 0, 0, 1));
    assert!(result.is_err());
}
