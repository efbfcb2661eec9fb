//! PSP decode head
//!
//! `cls_seg(dropout(bottleneck(concat([x, ppm(x)...], channels))))`

use crate::conv_module::{Conv2d, ConvModule, ConvModuleConfig};
use crate::init::normal_init;
use crate::ppm::PyramidPoolingModule;
use anyhow::Result;
use scirs2_core::numeric::{Float, FromPrimitive};
use tenseg_core::{ConvPadding, DenseND};

/// Hyper-parameters of a [`PspHead`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PspHeadConfig {
    /// Pyramid grid sizes, in concatenation order
    pub pool_scales: Vec<usize>,
    /// Channels of the incoming feature map
    pub in_channels: usize,
    /// Channels of each pyramid branch and of the bottleneck
    pub channels: usize,
    pub num_classes: usize,
    /// Dropout before classification; inactive at inference
    pub dropout_ratio: f64,
    pub align_corners: bool,
}

impl Default for PspHeadConfig {
    fn default() -> Self {
        Self {
            pool_scales: vec![1, 2, 3, 6],
            in_channels: 2048,
            channels: 512,
            num_classes: 19,
            dropout_ratio: 0.1,
            align_corners: false,
        }
    }
}

/// Pyramid scene parsing head
///
/// # Examples
///
/// ```
/// use tenseg_nn::psp_head::{PspHead, PspHeadConfig};
/// use tenseg_core::DenseND;
///
/// let head = PspHead::<f32>::new(PspHeadConfig {
///     in_channels: 8,
///     channels: 4,
///     num_classes: 3,
///     ..PspHeadConfig::default()
/// })
/// .unwrap();
///
/// let logits = head.forward(&DenseND::ones(&[1, 8, 12, 12])).unwrap();
/// assert_eq!(logits.shape(), &[1, 3, 12, 12]);
/// ```
#[derive(Debug, Clone)]
pub struct PspHead<T> {
    config: PspHeadConfig,
    psp_modules: PyramidPoolingModule<T>,
    bottleneck: ConvModule<T>,
    conv_seg: Conv2d<T>,
}

impl<T> PspHead<T>
where
    T: Float + FromPrimitive + 'static,
{
    pub fn new(config: PspHeadConfig) -> Result<Self> {
        anyhow::ensure!(
            !config.pool_scales.is_empty(),
            "PSP head needs at least one pool scale"
        );
        anyhow::ensure!(config.num_classes > 0, "num_classes must be > 0");
        anyhow::ensure!(
            (0.0..1.0).contains(&config.dropout_ratio),
            "dropout_ratio must be in [0, 1), got {}",
            config.dropout_ratio
        );

        let psp_modules = PyramidPoolingModule::new(
            &config.pool_scales,
            config.in_channels,
            config.channels,
            config.align_corners,
        )?;
        let fused_channels = config.in_channels + config.pool_scales.len() * config.channels;
        let bottleneck = ConvModule::new(
            fused_channels,
            config.channels,
            ConvModuleConfig::with_kernel(3, 1),
        )?;

        let mut conv_seg = Conv2d::new(
            config.channels,
            config.num_classes,
            1,
            1,
            ConvPadding::Valid,
            1,
            true,
        )?;
        normal_init(&mut conv_seg, 0.0, 0.01, 0.0);

        Ok(Self {
            config,
            psp_modules,
            bottleneck,
            conv_seg,
        })
    }

    pub fn config(&self) -> &PspHeadConfig {
        &self.config
    }

    pub fn psp_modules(&self) -> &PyramidPoolingModule<T> {
        &self.psp_modules
    }

    pub fn psp_modules_mut(&mut self) -> &mut PyramidPoolingModule<T> {
        &mut self.psp_modules
    }

    pub fn bottleneck_mut(&mut self) -> &mut ConvModule<T> {
        &mut self.bottleneck
    }

    pub fn conv_seg_mut(&mut self) -> &mut Conv2d<T> {
        &mut self.conv_seg
    }

    /// `x` followed by every pyramid branch, concatenated on the channel axis
    pub fn fuse(&self, x: &DenseND<T>) -> Result<DenseND<T>> {
        let mut psp_outs = Vec::with_capacity(1 + self.config.pool_scales.len());
        psp_outs.push(x.clone());
        psp_outs.extend(self.psp_modules.forward(x)?);
        DenseND::concatenate(&psp_outs, 1)
    }

    /// Per-pixel class logits at the input resolution
    pub fn forward(&self, x: &DenseND<T>) -> Result<DenseND<T>> {
        let fused = self.fuse(x)?;
        let features = self.bottleneck.forward(&fused)?;
        // Dropout is the identity at inference
        self.cls_seg(&features)
    }

    /// Classify a `channels`-deep feature map
    pub fn cls_seg(&self, features: &DenseND<T>) -> Result<DenseND<T>> {
        self.conv_seg.forward(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> PspHeadConfig {
        PspHeadConfig {
            pool_scales: vec![1, 2],
            in_channels: 6,
            channels: 3,
            num_classes: 5,
            ..PspHeadConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = PspHeadConfig::default();
        assert_eq!(config.pool_scales, vec![1, 2, 3, 6]);
        assert!(!config.align_corners);
    }

    #[test]
    fn test_fuse_concatenates_input_first() {
        let head = PspHead::<f64>::new(small_config()).unwrap();
        let x = DenseND::from_elem(&[2, 6, 5, 5], 42.0);
        let fused = head.fuse(&x).unwrap();

        assert_eq!(fused.shape(), &[2, 6 + 2 * 3, 5, 5]);
        // Leading channels are the untouched input
        for c in 0..6 {
            assert_eq!(fused[&[1, c, 4, 0]], 42.0);
        }
    }

    #[test]
    fn test_forward_shape() {
        let head = PspHead::<f64>::new(small_config()).unwrap();
        let y = head.forward(&DenseND::ones(&[1, 6, 7, 9])).unwrap();
        assert_eq!(y.shape(), &[1, 5, 7, 9]);
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = small_config();
        config.pool_scales.clear();
        assert!(PspHead::<f64>::new(config).is_err());

        let mut config = small_config();
        config.dropout_ratio = 1.5;
        assert!(PspHead::<f64>::new(config).is_err());

        let mut config = small_config();
        config.num_classes = 0;
        assert!(PspHead::<f64>::new(config).is_err());
    }

    #[test]
    fn test_forward_rejects_wrong_channels() {
        let head = PspHead::<f64>::new(small_config()).unwrap();
        assert!(head.forward(&DenseND::ones(&[1, 4, 7, 9])).is_err());
    }
}
