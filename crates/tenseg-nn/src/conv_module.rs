//! Convolution building blocks
//!
//! [`ConvModule`] is the conv → norm → activation stack used by every
//! transform in the decode head. Normalisation runs with stored running
//! statistics (inference mode).

use crate::init::{constant_init, kaiming_init, Distribution, FanMode, Initializable, Nonlinearity};
use anyhow::Result;
use scirs2_core::ndarray_ext::Axis;
use scirs2_core::numeric::{Float, FromPrimitive};
use tenseg_core::{ConvPadding, DenseND};

/// 2D convolution layer over NCHW input
#[derive(Debug, Clone)]
pub struct Conv2d<T> {
    weight: DenseND<T>,
    bias: Option<DenseND<T>>,
    stride: usize,
    padding: ConvPadding,
    dilation: usize,
}

impl<T> Conv2d<T>
where
    T: Float + FromPrimitive + 'static,
{
    /// Create a square-kernel convolution with zero weights.
    ///
    /// Use the helpers in [`crate::init`] to initialise the weights.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: ConvPadding,
        dilation: usize,
        bias: bool,
    ) -> Result<Self> {
        anyhow::ensure!(
            in_channels > 0 && out_channels > 0,
            "Channel counts must be > 0, got {} -> {}",
            in_channels,
            out_channels
        );
        anyhow::ensure!(kernel_size > 0, "Kernel size must be > 0");
        anyhow::ensure!(stride > 0 && dilation > 0, "Stride and dilation must be > 0");

        Ok(Self {
            weight: DenseND::zeros(&[out_channels, in_channels, kernel_size, kernel_size]),
            bias: bias.then(|| DenseND::zeros(&[out_channels])),
            stride,
            padding,
            dilation,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.weight.shape()[1]
    }

    pub fn out_channels(&self) -> usize {
        self.weight.shape()[0]
    }

    pub fn kernel_size(&self) -> usize {
        self.weight.shape()[2]
    }

    pub fn weight(&self) -> &DenseND<T> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&DenseND<T>> {
        self.bias.as_ref()
    }

    /// Replace the weight; the shape must not change
    pub fn set_weight(&mut self, weight: DenseND<T>) -> Result<()> {
        anyhow::ensure!(
            weight.same_shape(&self.weight),
            "Weight shape {:?} does not match {:?}",
            weight.shape(),
            self.weight.shape()
        );
        self.weight = weight;
        Ok(())
    }

    pub fn forward(&self, x: &DenseND<T>) -> Result<DenseND<T>> {
        x.conv2d_nchw(
            &self.weight,
            self.bias.as_ref(),
            self.stride,
            self.padding,
            self.dilation,
        )
    }
}

impl<T> Initializable<T> for Conv2d<T> {
    fn weight_mut(&mut self) -> &mut DenseND<T> {
        &mut self.weight
    }

    fn bias_mut(&mut self) -> Option<&mut DenseND<T>> {
        self.bias.as_mut()
    }
}

/// Batch normalisation with frozen running statistics
///
/// `y = (x - running_mean) / sqrt(running_var + eps) * gamma + beta`, per channel.
#[derive(Debug, Clone)]
pub struct BatchNorm2d<T> {
    gamma: DenseND<T>,
    beta: DenseND<T>,
    running_mean: DenseND<T>,
    running_var: DenseND<T>,
    eps: f64,
}

impl<T> BatchNorm2d<T>
where
    T: Float + FromPrimitive,
{
    /// Default epsilon added to the variance
    pub const DEFAULT_EPS: f64 = 1e-5;

    /// Identity-initialised norm over `channels` channels
    pub fn new(channels: usize) -> Self {
        Self {
            gamma: DenseND::ones(&[channels]),
            beta: DenseND::zeros(&[channels]),
            running_mean: DenseND::zeros(&[channels]),
            running_var: DenseND::ones(&[channels]),
            eps: Self::DEFAULT_EPS,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.gamma.len()
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Install running statistics, e.g. from a trained checkpoint
    pub fn set_running_stats(&mut self, mean: DenseND<T>, var: DenseND<T>) -> Result<()> {
        anyhow::ensure!(
            mean.same_shape(&self.running_mean) && var.same_shape(&self.running_var),
            "Running statistics must have shape [{}]",
            self.num_channels()
        );
        anyhow::ensure!(
            var.iter().all(|&v| v >= T::zero()),
            "Running variance must be non-negative"
        );
        self.running_mean = mean;
        self.running_var = var;
        Ok(())
    }

    pub fn forward(&self, x: &DenseND<T>) -> Result<DenseND<T>> {
        anyhow::ensure!(
            x.rank() == 4 && x.shape()[1] == self.num_channels(),
            "BatchNorm2d over {} channels got input {:?}",
            self.num_channels(),
            x.shape()
        );

        let eps = T::from_f64(self.eps).unwrap_or_else(T::epsilon);
        let coefficients: Vec<(T, T)> = (0..self.num_channels())
            .map(|c| {
                let scale = self.gamma[&[c]] / (self.running_var[&[c]] + eps).sqrt();
                (scale, self.beta[&[c]] - self.running_mean[&[c]] * scale)
            })
            .collect();

        let mut out = x.clone();
        for (mut channel, &(scale, shift)) in out
            .as_array_mut()
            .axis_iter_mut(Axis(1))
            .zip(coefficients.iter())
        {
            channel.mapv_inplace(|v| v * scale + shift);
        }
        Ok(out)
    }
}

impl<T> Initializable<T> for BatchNorm2d<T> {
    fn weight_mut(&mut self) -> &mut DenseND<T> {
        &mut self.gamma
    }

    fn bias_mut(&mut self) -> Option<&mut DenseND<T>> {
        Some(&mut self.beta)
    }
}

/// Layout of a [`ConvModule`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvModuleConfig {
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: ConvPadding,
    pub dilation: usize,
    /// Follow the conv with BatchNorm2d
    pub with_norm: bool,
    /// Finish with ReLU
    pub with_activation: bool,
    /// Conv bias; `None` means "only when there is no norm"
    pub bias: Option<bool>,
}

impl Default for ConvModuleConfig {
    fn default() -> Self {
        Self {
            kernel_size: 1,
            stride: 1,
            padding: ConvPadding::Valid,
            dilation: 1,
            with_norm: true,
            with_activation: true,
            bias: None,
        }
    }
}

impl ConvModuleConfig {
    /// `kernel_size x kernel_size` conv with symmetric `padding`
    pub fn with_kernel(kernel_size: usize, padding: usize) -> Self {
        Self {
            kernel_size,
            padding: ConvPadding::Custom(padding),
            ..Self::default()
        }
    }
}

/// Conv2d → BatchNorm2d → ReLU
///
/// # Examples
///
/// ```
/// use tenseg_nn::conv_module::{ConvModule, ConvModuleConfig};
/// use tenseg_core::DenseND;
///
/// let block = ConvModule::<f32>::new(8, 4, ConvModuleConfig::with_kernel(3, 1)).unwrap();
/// let y = block.forward(&DenseND::ones(&[2, 8, 5, 5])).unwrap();
/// assert_eq!(y.shape(), &[2, 4, 5, 5]);
/// assert!(y.iter().all(|&v| v >= 0.0));
/// ```
#[derive(Debug, Clone)]
pub struct ConvModule<T> {
    conv: Conv2d<T>,
    norm: Option<BatchNorm2d<T>>,
    with_activation: bool,
}

impl<T> ConvModule<T>
where
    T: Float + FromPrimitive + 'static,
{
    /// Build the block and initialise it: Kaiming normal (fan out, relu)
    /// for the conv, ones and zeros for the norm.
    pub fn new(in_channels: usize, out_channels: usize, config: ConvModuleConfig) -> Result<Self> {
        let with_bias = config.bias.unwrap_or(!config.with_norm);
        let mut conv = Conv2d::new(
            in_channels,
            out_channels,
            config.kernel_size,
            config.stride,
            config.padding,
            config.dilation,
            with_bias,
        )?;
        kaiming_init(
            &mut conv,
            0.0,
            FanMode::FanOut,
            Nonlinearity::Relu,
            0.0,
            Distribution::Normal,
        )?;

        let norm = config.with_norm.then(|| {
            let mut norm = BatchNorm2d::new(out_channels);
            constant_init(&mut norm, 1.0, 0.0);
            norm
        });

        Ok(Self {
            conv,
            norm,
            with_activation: config.with_activation,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.conv.in_channels()
    }

    pub fn out_channels(&self) -> usize {
        self.conv.out_channels()
    }

    pub fn conv(&self) -> &Conv2d<T> {
        &self.conv
    }

    pub fn conv_mut(&mut self) -> &mut Conv2d<T> {
        &mut self.conv
    }

    pub fn norm_mut(&mut self) -> Option<&mut BatchNorm2d<T>> {
        self.norm.as_mut()
    }

    pub fn forward(&self, x: &DenseND<T>) -> Result<DenseND<T>> {
        let mut out = self.conv.forward(x)?;
        if let Some(norm) = &self.norm {
            out = norm.forward(&out)?;
        }
        if self.with_activation {
            out = out.relu();
        }
        Ok(out)
    }
}
