//! Property-based tests for the resize operator

use proptest::prelude::*;
use tenseg_ad::resize::{resize_forward, Resize, ScaleFactor};
use tenseg_core::{DenseND, InterpolationMode};

fn mode_and_alignment() -> impl Strategy<Value = (InterpolationMode, Option<bool>)> {
    prop_oneof![
        Just((InterpolationMode::Nearest, None)),
        Just((InterpolationMode::Area, None)),
        any::<Option<bool>>().prop_map(|a| (InterpolationMode::Bilinear, a)),
        any::<Option<bool>>().prop_map(|a| (InterpolationMode::Bicubic, a)),
    ]
}

proptest! {
    /// Forward spatial dims equal the requested size after truncation
    #[test]
    fn test_output_matches_truncated_size(
        in_h in 1usize..10,
        in_w in 1usize..10,
        out_h in 1.0f64..24.0,
        out_w in 1.0f64..24.0,
        (mode, align) in mode_and_alignment(),
    ) {
        let x = DenseND::<f64>::random_uniform(&[1, 2, in_h, in_w], -1.0, 1.0);
        let (y, _) = resize_forward(&x, Some((out_h, out_w)), None, mode, align).unwrap();
        prop_assert_eq!(y.shape(), &[1, 2, out_h.trunc() as usize, out_w.trunc() as usize]);
    }

    /// backward(forward(x)) always has the shape of x
    #[test]
    fn test_gradient_shape_round_trip(
        batch in 1usize..3,
        channels in 1usize..4,
        in_h in 1usize..9,
        in_w in 1usize..9,
        factor in 0.5f64..3.0,
        (mode, align) in mode_and_alignment(),
    ) {
        let x = DenseND::<f64>::random_uniform(&[batch, channels, in_h, in_w], -1.0, 1.0);
        let out_h = (in_h as f64 * factor).floor() as usize;
        let out_w = (in_w as f64 * factor).floor() as usize;
        prop_assume!(out_h > 0 && out_w > 0);

        let mut op = Resize::new();
        let y = op.forward(&x, None, Some(ScaleFactor::Uniform(factor)), mode, align).unwrap();
        prop_assert_eq!(y.shape(), &[batch, channels, out_h, out_w]);

        let grad = op.backward(&DenseND::<f64>::ones(y.shape())).unwrap();
        prop_assert_eq!(grad.shape(), x.shape());
        prop_assert!(!op.is_pending());
    }

    /// Any align_corners flag with nearest is rejected
    #[test]
    fn test_nearest_rejects_alignment(flag in any::<bool>(), size in 1.0f64..16.0) {
        let x = DenseND::<f64>::zeros(&[1, 1, 4, 4]);
        let result = resize_forward(&x, Some((size, size)), None, InterpolationMode::Nearest, Some(flag));
        prop_assert!(result.is_err());
    }
}
