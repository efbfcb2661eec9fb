//! Property-based tests for the spatial substrate

use proptest::prelude::*;
use tenseg_core::{DenseND, InterpolationMode};

fn mode_strategy() -> impl Strategy<Value = InterpolationMode> {
    prop_oneof![
        Just(InterpolationMode::Nearest),
        Just(InterpolationMode::Bilinear),
        Just(InterpolationMode::Bicubic),
        Just(InterpolationMode::Area),
    ]
}

proptest! {
    /// Output spatial dims always equal the requested size
    #[test]
    fn test_interpolate_hits_requested_size(
        in_h in 1usize..12,
        in_w in 1usize..12,
        out_h in 1usize..24,
        out_w in 1usize..24,
        mode in mode_strategy(),
        align in any::<bool>(),
    ) {
        let x = DenseND::<f64>::random_uniform(&[2, 3, in_h, in_w], -1.0, 1.0);
        let align = align && mode.supports_align_corners();
        let y = x.interpolate(Some((out_h, out_w)), None, mode, align).unwrap();
        prop_assert_eq!(y.shape(), &[2, 3, out_h, out_w]);
    }

    /// Bilinear, nearest and area outputs stay inside the input value range
    #[test]
    fn test_convex_modes_are_bounded(
        in_size in 1usize..10,
        out_size in 1usize..20,
        align in any::<bool>(),
    ) {
        let x = DenseND::<f64>::random_uniform(&[1, 1, in_size, in_size], -3.0, 3.0);
        let lo = x.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        for (mode, align) in [
            (InterpolationMode::Nearest, false),
            (InterpolationMode::Bilinear, align),
            (InterpolationMode::Area, false),
        ] {
            let y = x.interpolate(Some((out_size, out_size)), None, mode, align).unwrap();
            for &v in y.iter() {
                prop_assert!(v >= lo - 1e-12 && v <= hi + 1e-12, "{} produced {}", mode, v);
            }
        }
    }

    /// Global pooling equals the per-channel mean
    #[test]
    fn test_global_pool_is_mean(h in 1usize..16, w in 1usize..16) {
        let x = DenseND::<f64>::random_uniform(&[1, 1, h, w], 0.0, 10.0);
        let pooled = x.adaptive_avg_pool2d((1, 1)).unwrap();
        prop_assert!((pooled[&[0, 0, 0, 0]] - x.mean()).abs() < 1e-9);
    }
}
