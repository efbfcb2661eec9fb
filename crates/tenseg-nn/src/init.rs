//! Weight initialisation helpers
//!
//! Each helper fills a module's weight and, when the module has one, sets
//! its bias to a constant. Fans are computed from a `[C_out, C_in, K...]`
//! weight shape: `fan_in = C_in * prod(K)`, `fan_out = C_out * prod(K)`.

use anyhow::Result;
use scirs2_core::numeric::{Float, FromPrimitive};
use scirs2_core::random::quick::random_f64;
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;
use tenseg_core::DenseND;

/// A module with a weight tensor and an optional bias
pub trait Initializable<T> {
    /// Mutable access to the weight
    fn weight_mut(&mut self) -> &mut DenseND<T>;

    /// Mutable access to the bias, if the module has one
    fn bias_mut(&mut self) -> Option<&mut DenseND<T>>;
}

/// Sampling distribution for Xavier and Kaiming initialisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Distribution {
    #[default]
    Normal,
    Uniform,
}

/// Which fan Kaiming initialisation preserves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FanMode {
    FanIn,
    #[default]
    FanOut,
}

/// Nonlinearity following the initialised layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Nonlinearity {
    Linear,
    Sigmoid,
    Tanh,
    #[default]
    Relu,
    LeakyRelu,
}

impl Nonlinearity {
    /// Recommended gain; `negative_slope` is used by `LeakyRelu` only
    pub fn gain(self, negative_slope: f64) -> f64 {
        match self {
            Nonlinearity::Linear | Nonlinearity::Sigmoid => 1.0,
            Nonlinearity::Tanh => 5.0 / 3.0,
            Nonlinearity::Relu => 2.0_f64.sqrt(),
            Nonlinearity::LeakyRelu => (2.0 / (1.0 + negative_slope * negative_slope)).sqrt(),
        }
    }
}

/// `(fan_in, fan_out)` of a weight shape
pub fn fan_in_and_fan_out(shape: &[usize]) -> Result<(usize, usize)> {
    anyhow::ensure!(
        shape.len() >= 2,
        "Fan in and fan out need a weight of rank >= 2, got shape {:?}",
        shape
    );
    let receptive_field: usize = shape[2..].iter().product();
    Ok((shape[1] * receptive_field, shape[0] * receptive_field))
}

fn fill_bias<T, M>(module: &mut M, bias: f64)
where
    T: Float + FromPrimitive,
    M: Initializable<T> + ?Sized,
{
    if let Some(b) = module.bias_mut() {
        b.fill(T::from_f64(bias).unwrap_or_else(T::zero));
    }
}

fn standard_normal() -> f64 {
    let u1 = 1.0 - random_f64();
    let u2 = random_f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn fill_distribution<T>(weight: &mut DenseND<T>, std: f64, distribution: Distribution)
where
    T: Float + FromPrimitive,
{
    match distribution {
        Distribution::Normal => weight.fill_random(|| std * standard_normal()),
        Distribution::Uniform => {
            let bound = 3.0_f64.sqrt() * std;
            weight.fill_random(|| -bound + 2.0 * bound * random_f64())
        }
    }
}

/// Fill the weight with `val`
pub fn constant_init<T, M>(module: &mut M, val: f64, bias: f64)
where
    T: Float + FromPrimitive,
    M: Initializable<T> + ?Sized,
{
    module
        .weight_mut()
        .fill(T::from_f64(val).unwrap_or_else(T::zero));
    fill_bias(module, bias);
}

/// Draw the weight from `N(mean, std^2)`
pub fn normal_init<T, M>(module: &mut M, mean: f64, std: f64, bias: f64)
where
    T: Float + FromPrimitive,
    M: Initializable<T> + ?Sized,
{
    module
        .weight_mut()
        .fill_random(|| mean + std * standard_normal());
    fill_bias(module, bias);
}

/// Draw the weight from `U(a, b)`
pub fn uniform_init<T, M>(module: &mut M, a: f64, b: f64, bias: f64)
where
    T: Float + FromPrimitive,
    M: Initializable<T> + ?Sized,
{
    module.weight_mut().fill_random(|| a + (b - a) * random_f64());
    fill_bias(module, bias);
}

/// Glorot initialisation: `std = gain * sqrt(2 / (fan_in + fan_out))`
pub fn xavier_init<T, M>(
    module: &mut M,
    gain: f64,
    bias: f64,
    distribution: Distribution,
) -> Result<()>
where
    T: Float + FromPrimitive,
    M: Initializable<T> + ?Sized,
{
    let weight = module.weight_mut();
    let (fan_in, fan_out) = fan_in_and_fan_out(weight.shape())?;
    let std = gain * (2.0 / (fan_in + fan_out) as f64).sqrt();
    fill_distribution(weight, std, distribution);
    fill_bias(module, bias);
    Ok(())
}

/// He initialisation: `std = gain(nonlinearity, a) / sqrt(fan)`
///
/// # Examples
///
/// ```
/// use tenseg_nn::conv_module::Conv2d;
/// use tenseg_nn::init::{kaiming_init, Distribution, FanMode, Nonlinearity};
/// use tenseg_core::ConvPadding;
///
/// let mut conv = Conv2d::<f64>::new(16, 32, 3, 1, ConvPadding::Same, 1, true).unwrap();
/// kaiming_init(&mut conv, 0.0, FanMode::FanOut, Nonlinearity::Relu, 0.0, Distribution::Uniform)
///     .unwrap();
///
/// // bound = sqrt(3) * sqrt(2) / sqrt(32 * 9)
/// let bound = (6.0_f64 / 288.0).sqrt();
/// assert!(conv.weight().iter().all(|w| w.abs() <= bound));
/// assert!(conv.bias().unwrap().iter().all(|&b| b == 0.0));
/// ```
pub fn kaiming_init<T, M>(
    module: &mut M,
    a: f64,
    mode: FanMode,
    nonlinearity: Nonlinearity,
    bias: f64,
    distribution: Distribution,
) -> Result<()>
where
    T: Float + FromPrimitive,
    M: Initializable<T> + ?Sized,
{
    let weight = module.weight_mut();
    let (fan_in, fan_out) = fan_in_and_fan_out(weight.shape())?;
    let fan = match mode {
        FanMode::FanIn => fan_in,
        FanMode::FanOut => fan_out,
    };
    anyhow::ensure!(fan > 0, "Cannot initialise a weight with zero fan");
    let std = nonlinearity.gain(a) / (fan as f64).sqrt();
    fill_distribution(weight, std, distribution);
    fill_bias(module, bias);
    Ok(())
}

/// Caffe2 `XavierFill`: uniform Kaiming with `a = 1`, fan in, leaky relu
pub fn caffe2_xavier_init<T, M>(module: &mut M, bias: f64) -> Result<()>
where
    T: Float + FromPrimitive,
    M: Initializable<T> + ?Sized,
{
    kaiming_init(
        module,
        1.0,
        FanMode::FanIn,
        Nonlinearity::LeakyRelu,
        bias,
        Distribution::Uniform,
    )
}

/// Draw the weight from `N(mean, std^2)` truncated to `[a, b]`
///
/// Samples by inverting the normal CDF over `[cdf(a), cdf(b)]`, so every
/// value follows the truncated density. A mean more than two standard
/// deviations outside `[a, b]` is reported with `log::warn!`.
pub fn trunc_normal_init<T, M>(
    module: &mut M,
    mean: f64,
    std: f64,
    a: f64,
    b: f64,
    bias: f64,
) -> Result<()>
where
    T: Float + FromPrimitive,
    M: Initializable<T> + ?Sized,
{
    anyhow::ensure!(a < b, "Truncation interval [{}, {}] is empty", a, b);
    anyhow::ensure!(std > 0.0, "Standard deviation must be positive, got {}", std);

    if mean < a - 2.0 * std || mean > b + 2.0 * std {
        log::warn!(
            "mean {} is more than 2 std from [{}, {}] in trunc_normal_init; the distribution of values may be incorrect",
            mean,
            a,
            b
        );
    }

    let unit = Normal::new(0.0, 1.0)?;
    let lower = unit.cdf((a - mean) / std);
    let upper = unit.cdf((b - mean) / std);

    module.weight_mut().fill_random(|| {
        let p = (lower + (upper - lower) * random_f64()).clamp(0.0, 1.0);
        let v = mean + std * unit.inverse_cdf(p);
        // Tail round-off can step just past the interval, or to NaN
        if v.is_nan() {
            mean.clamp(a, b)
        } else {
            v.clamp(a, b)
        }
    });
    fill_bias(module, bias);
    Ok(())
}

/// Bias value giving a sigmoid output of `prior_prob`: `-ln((1 - p) / p)`
///
/// # Examples
///
/// ```
/// use tenseg_nn::init::bias_init_with_prob;
///
/// assert!((bias_init_with_prob(0.01) + 4.59512).abs() < 1e-5);
/// assert_eq!(bias_init_with_prob(0.5), 0.0);
/// ```
pub fn bias_init_with_prob(prior_prob: f64) -> f64 {
    -((1.0 - prior_prob) / prior_prob).ln()
}
