//! Pyramid pooling module
//!
//! Pools a feature map to several square grids, reduces the channels of each
//! pooled map and resizes every branch back to the input resolution. The
//! branch outputs come back in pool-scale order; fusing them with the input
//! is the decode head's job.
//!
//! [`PyramidPoolingModule::forward_with_contexts`] also returns the resize
//! context of every branch, so the upsampling step can be differentiated.
//!
//! ```text
//! x ─┬─ pool 1x1 ─ ConvModule ─ resize (H, W) ─▶ out[0]
//!    ├─ pool 2x2 ─ ConvModule ─ resize (H, W) ─▶ out[1]
//!    ├─ pool 3x3 ─ ConvModule ─ resize (H, W) ─▶ out[2]
//!    └─ pool 6x6 ─ ConvModule ─ resize (H, W) ─▶ out[3]
//! ```

use crate::conv_module::{ConvModule, ConvModuleConfig};
use anyhow::Result;
use scirs2_core::numeric::{Float, FromPrimitive};
use tenseg_ad::resize::{resize_with_context, ResizeContext};
use tenseg_core::{DenseND, InterpolationMode};

/// One pyramid level: adaptive average pool to `scale x scale`, then a 1x1
/// ConvModule.
#[derive(Debug, Clone)]
pub struct PoolingBranch<T> {
    scale: usize,
    transform: ConvModule<T>,
}

impl<T> PoolingBranch<T>
where
    T: Float + FromPrimitive + 'static,
{
    pub fn new(scale: usize, in_channels: usize, channels: usize) -> Result<Self> {
        anyhow::ensure!(scale > 0, "Pool scale must be > 0");
        Ok(Self {
            scale,
            transform: ConvModule::new(in_channels, channels, ConvModuleConfig::default())?,
        })
    }

    pub fn scale(&self) -> usize {
        self.scale
    }

    pub fn transform(&self) -> &ConvModule<T> {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut ConvModule<T> {
        &mut self.transform
    }

    /// Pool and transform, at `scale x scale` resolution
    pub fn forward(&self, x: &DenseND<T>) -> Result<DenseND<T>> {
        let pooled = x.adaptive_avg_pool2d((self.scale, self.scale))?;
        self.transform.forward(&pooled)
    }
}

/// Multi-scale context aggregation over a fixed, ordered set of pool scales
///
/// # Examples
///
/// ```
/// use tenseg_nn::ppm::PyramidPoolingModule;
/// use tenseg_core::DenseND;
///
/// let ppm = PyramidPoolingModule::<f32>::new(&[1, 2, 3, 6], 16, 4, false).unwrap();
/// let outs = ppm.forward(&DenseND::ones(&[1, 16, 12, 12])).unwrap();
///
/// assert_eq!(outs.len(), 4);
/// assert!(outs.iter().all(|o| o.shape() == &[1, 4, 12, 12]));
/// ```
#[derive(Debug, Clone)]
pub struct PyramidPoolingModule<T> {
    branches: Vec<PoolingBranch<T>>,
    in_channels: usize,
    channels: usize,
    align_corners: bool,
}

impl<T> PyramidPoolingModule<T>
where
    T: Float + FromPrimitive + 'static,
{
    /// Build one branch per scale, in the given order
    pub fn new(
        pool_scales: &[usize],
        in_channels: usize,
        channels: usize,
        align_corners: bool,
    ) -> Result<Self> {
        anyhow::ensure!(!pool_scales.is_empty(), "Pool scale set must not be empty");
        let branches = pool_scales
            .iter()
            .map(|&scale| PoolingBranch::new(scale, in_channels, channels))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            branches,
            in_channels,
            channels,
            align_corners,
        })
    }

    pub fn pool_scales(&self) -> Vec<usize> {
        self.branches.iter().map(PoolingBranch::scale).collect()
    }

    pub fn branches(&self) -> &[PoolingBranch<T>] {
        &self.branches
    }

    pub fn branches_mut(&mut self) -> &mut [PoolingBranch<T>] {
        &mut self.branches
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Output channels of every branch
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn align_corners(&self) -> bool {
        self.align_corners
    }

    /// Run every branch and resize it back to the spatial size of `x`.
    ///
    /// Returns one `(N, channels, H, W)` tensor per pool scale, in order.
    /// `x` itself is not part of the result.
    pub fn forward(&self, x: &DenseND<T>) -> Result<Vec<DenseND<T>>> {
        Ok(self
            .forward_with_contexts(x)?
            .into_iter()
            .map(|(out, _context)| out)
            .collect())
    }

    /// [`forward`](Self::forward) keeping each branch's resize context.
    ///
    /// The context of branch `i` maps a gradient of shape
    /// `(N, channels, H, W)` back to `(N, channels, s_i, s_i)`.
    pub fn forward_with_contexts(
        &self,
        x: &DenseND<T>,
    ) -> Result<Vec<(DenseND<T>, ResizeContext)>> {
        anyhow::ensure!(
            x.rank() == 4 && x.shape()[1] == self.in_channels,
            "PyramidPoolingModule expects (N, {}, H, W), got {:?}",
            self.in_channels,
            x.shape()
        );
        let (h, w) = x.spatial_size()?;

        self.branches
            .iter()
            .map(|branch| -> Result<(DenseND<T>, ResizeContext)> {
                let out = branch.forward(x)?;
                log::debug!(
                    "ppm branch {}x{}: pooled {:?} -> resize to ({}, {})",
                    branch.scale(),
                    branch.scale(),
                    out.shape(),
                    h,
                    w
                );
                let upsampled = resize_with_context(
                    &out,
                    Some((h as f64, w as f64)),
                    None,
                    InterpolationMode::Bilinear,
                    Some(self.align_corners),
                    true,
                )?;
                Ok(upsampled)
            })
            .collect()
    }
}
