//! Integration tests for tenseg-nn
//!
//! Pyramid pooling behaviour on decode-head sized feature maps.

use anyhow::Result;
use tenseg_core::DenseND;
use tenseg_nn::init::constant_init;
use tenseg_nn::ppm::PyramidPoolingModule;
use tenseg_nn::psp_head::{PspHead, PspHeadConfig};

/// Make every branch transform an exact channel average so branch outputs
/// are predictable.
fn averaging_ppm(
    scales: &[usize],
    in_channels: usize,
    channels: usize,
    align_corners: bool,
) -> Result<PyramidPoolingModule<f64>> {
    let mut ppm = PyramidPoolingModule::new(scales, in_channels, channels, align_corners)?;
    for branch in ppm.branches_mut() {
        let block = branch.transform_mut();
        constant_init(block.conv_mut(), 1.0 / in_channels as f64, 0.0);
        if let Some(norm) = block.norm_mut() {
            norm.set_running_stats(DenseND::zeros(&[channels]), DenseND::from_elem(&[channels], 1.0 - 1e-5))?;
        }
    }
    Ok(ppm)
}

#[test]
fn test_standard_pyramid_shapes_and_order() -> Result<()> {
    let ppm = PyramidPoolingModule::<f32>::new(&[1, 2, 3, 6], 256, 64, false)?;
    let x = DenseND::<f32>::random_uniform(&[1, 256, 32, 32], 0.0, 1.0);

    let outs = ppm.forward(&x)?;
    assert_eq!(outs.len(), 4);
    for out in &outs {
        assert_eq!(out.shape(), &[1, 64, 32, 32]);
    }
    assert_eq!(ppm.pool_scales(), vec![1, 2, 3, 6]);
    Ok(())
}

#[test]
fn test_global_branch_is_uniform_global_mean() -> Result<()> {
    let x = DenseND::<f64>::random_uniform(&[1, 4, 32, 32], 0.0, 1.0);
    let ppm = averaging_ppm(&[1], 4, 2, false)?;

    // The 1x1 pooled stage holds the per-channel global mean
    let pooled = x.adaptive_avg_pool2d((1, 1))?;
    let global_mean = x.mean();
    let channel_avg = pooled.mean();
    assert!((channel_avg - global_mean).abs() < 1e-12);

    let outs = ppm.forward(&x)?;
    let branch = &outs[0];
    assert_eq!(branch.shape(), &[1, 2, 32, 32]);

    let first = branch[&[0, 0, 0, 0]];
    assert!((first - global_mean).abs() < 1e-9);
    assert!(branch.iter().all(|&v| (v - first).abs() < 1e-12));
    Ok(())
}

#[test]
fn test_reordering_scales_reorders_outputs() -> Result<()> {
    let x = DenseND::<f64>::random_uniform(&[2, 3, 12, 12], -1.0, 1.0);

    let forward = averaging_ppm(&[1, 2, 3, 6], 3, 2, false)?.forward(&x)?;
    let reversed = averaging_ppm(&[6, 3, 2, 1], 3, 2, false)?.forward(&x)?;

    for (i, out) in forward.iter().enumerate() {
        let twin = &reversed[forward.len() - 1 - i];
        assert!(out.max_abs_diff(twin)? < 1e-12);
    }
    // Different scales do give different summaries
    assert!(forward[0].max_abs_diff(&forward[3])? > 1e-6);
    Ok(())
}

#[test]
fn test_align_corners_flag_is_forwarded() -> Result<()> {
    let x = DenseND::<f64>::random_uniform(&[1, 2, 10, 10], 0.0, 1.0);
    let plain = averaging_ppm(&[2], 2, 1, false)?;
    let corner = averaging_ppm(&[2], 2, 1, true)?;
    assert!(corner.align_corners());

    let p = plain.forward(&x)?;
    let c = corner.forward(&x)?;
    assert_eq!(p[0].shape(), c[0].shape());

    // Aligned corners reproduce the pooled corner cells exactly
    let pooled = corner.branches()[0].forward(&x)?;
    assert!((c[0][&[0, 0, 0, 0]] - pooled[&[0, 0, 0, 0]]).abs() < 1e-12);
    assert!((c[0][&[0, 0, 9, 9]] - pooled[&[0, 0, 1, 1]]).abs() < 1e-12);
    assert!(c[0].max_abs_diff(&p[0])? > 1e-9);
    Ok(())
}

#[test]
fn test_psp_head_end_to_end() -> Result<()> {
    let head = PspHead::<f32>::new(PspHeadConfig {
        in_channels: 32,
        channels: 8,
        num_classes: 4,
        ..PspHeadConfig::default()
    })?;
    let x = DenseND::<f32>::random_uniform(&[2, 32, 24, 24], 0.0, 1.0);

    let fused = head.fuse(&x)?;
    assert_eq!(fused.shape(), &[2, 32 + 4 * 8, 24, 24]);

    let logits = head.forward(&x)?;
    assert_eq!(logits.shape(), &[2, 4, 24, 24]);
    assert!(logits.iter().all(|v| v.is_finite()));
    Ok(())
}
