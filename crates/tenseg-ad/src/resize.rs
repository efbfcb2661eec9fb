//! Differentiable spatial resize with a custom gradient rule
//!
//! The forward pass resamples the spatial dims of an NCHW feature map. The
//! gradient resamples the upstream gradient back to the original input size
//! with the same mode and `align_corners` (transposed resampling).
//!
//! Transposed resampling is not the exact adjoint of interpolation: it is
//! exact only when input and output sizes match. It is the accepted
//! approximation for resize layers inside segmentation decoders, and it is
//! kept as is.
//!
//! # Forms
//!
//! - [`Resize`]: a stateful function object, `forward` then `backward`
//! - [`resize_forward`]: returns the output plus an explicit [`ResizeContext`]
//! - [`resize`]: inference wrapper that also emits the alignment advisory
//! - [`resize_with_context`]: [`resize`] that keeps the gradient context
//! - [`Upsample`]: recomputes the target size from a stored factor per call
//!
//! # Example
//!
//! ```
//! use tenseg_ad::resize::Resize;
//! use tenseg_core::{DenseND, InterpolationMode};
//!
//! let x = DenseND::<f64>::ones(&[1, 4, 8, 8]);
//! let mut op = Resize::new();
//!
//! let y = op
//!     .forward(&x, Some((16.0, 16.0)), None, InterpolationMode::Bilinear, Some(false))
//!     .unwrap();
//! assert_eq!(y.shape(), &[1, 4, 16, 16]);
//!
//! let grad_x = op.backward(&DenseND::<f64>::ones(y.shape())).unwrap();
//! assert_eq!(grad_x.shape(), x.shape());
//! ```

use crate::error::{ResizeError, ResizeResult};
use crate::vjp::VjpOp;
use scirs2_core::numeric::{Float, FromPrimitive};
use std::fmt;
use tenseg_core::{DenseND, InterpolationMode};

/// Multiplicative scale factor for the spatial dims
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScaleFactor {
    /// Same factor for height and width
    Uniform(f64),
    /// Separate `(height, width)` factors
    Pair(f64, f64),
}

impl ScaleFactor {
    /// `(height, width)` factors
    pub fn pair(self) -> (f64, f64) {
        match self {
            ScaleFactor::Uniform(f) => (f, f),
            ScaleFactor::Pair(fh, fw) => (fh, fw),
        }
    }
}

impl From<f64> for ScaleFactor {
    fn from(factor: f64) -> Self {
        ScaleFactor::Uniform(factor)
    }
}

impl From<(f64, f64)> for ScaleFactor {
    fn from((fh, fw): (f64, f64)) -> Self {
        ScaleFactor::Pair(fh, fw)
    }
}

/// Validated resize target: an absolute size or a scale factor, never both
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleDescriptor {
    /// Absolute `(height, width)` output size
    Size(usize, usize),
    /// Factor applied to the input spatial dims
    Factor(ScaleFactor),
}

impl ScaleDescriptor {
    /// Build a descriptor from the optional caller arguments.
    ///
    /// `size` is truncated to integers. Exactly one argument must be given.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_ad::resize::{ScaleDescriptor, ScaleFactor};
    ///
    /// let d = ScaleDescriptor::new(Some((7.9, 12.2)), None).unwrap();
    /// assert_eq!(d, ScaleDescriptor::Size(7, 12));
    ///
    /// assert!(ScaleDescriptor::new(None, None).is_err());
    /// assert!(ScaleDescriptor::new(Some((4.0, 4.0)), Some(ScaleFactor::Uniform(2.0))).is_err());
    /// ```
    pub fn new(size: Option<(f64, f64)>, scale_factor: Option<ScaleFactor>) -> ResizeResult<Self> {
        match (size, scale_factor) {
            (Some((h, w)), None) => {
                let (h, w) = (truncate_dim(h)?, truncate_dim(w)?);
                Ok(ScaleDescriptor::Size(h, w))
            }
            (None, Some(factor)) => {
                let (fh, fw) = factor.pair();
                if !(fh.is_finite() && fw.is_finite() && fh > 0.0 && fw > 0.0) {
                    return Err(ResizeError::InvalidSize(format!(
                        "scale factor must be positive and finite, got ({}, {})",
                        fh, fw
                    )));
                }
                Ok(ScaleDescriptor::Factor(factor))
            }
            (size, factor) => Err(ResizeError::InvalidDescriptor {
                size: size.is_some(),
                scale_factor: factor.is_some(),
            }),
        }
    }

    /// Output spatial size for an input of spatial size `input_hw`
    pub fn output_size(&self, input_hw: (usize, usize)) -> ResizeResult<(usize, usize)> {
        let out = match *self {
            ScaleDescriptor::Size(h, w) => (h, w),
            ScaleDescriptor::Factor(factor) => {
                let (fh, fw) = factor.pair();
                (
                    (input_hw.0 as f64 * fh).floor() as usize,
                    (input_hw.1 as f64 * fw).floor() as usize,
                )
            }
        };
        if out.0 == 0 || out.1 == 0 {
            return Err(ResizeError::InvalidSize(format!(
                "output spatial size {:?} from input {:?} is empty",
                out, input_hw
            )));
        }
        Ok(out)
    }
}

fn truncate_dim(value: f64) -> ResizeResult<usize> {
    if !value.is_finite() || value < 1.0 {
        return Err(ResizeError::InvalidSize(format!(
            "size entries must be finite and at least 1 after truncation, got {}",
            value
        )));
    }
    Ok(value.trunc() as usize)
}

/// Resolve the caller's `align_corners` against the mode.
///
/// Nearest and area accept only `None`; bilinear and bicubic treat `None`
/// as `false`.
pub fn resolve_align_corners(
    mode: InterpolationMode,
    align_corners: Option<bool>,
) -> ResizeResult<bool> {
    match align_corners {
        Some(_) if !mode.supports_align_corners() => {
            Err(ResizeError::UnsupportedAlignment { mode })
        }
        Some(flag) => Ok(flag),
        None => Ok(false),
    }
}

/// Look up a registered interpolation mode by name
///
/// # Examples
///
/// ```
/// use tenseg_ad::resize::parse_mode;
/// use tenseg_core::InterpolationMode;
///
/// assert_eq!(parse_mode("nearest").unwrap(), InterpolationMode::Nearest);
/// assert!(parse_mode("linear").is_err());
/// ```
pub fn parse_mode(name: &str) -> ResizeResult<InterpolationMode> {
    name.parse::<InterpolationMode>()
        .map_err(|_| ResizeError::UnknownMode(name.to_string()))
}

fn feature_map_hw<T>(input: &DenseND<T>) -> ResizeResult<(usize, usize)>
where
    T: Float + FromPrimitive,
{
    if input.rank() != 4 {
        return Err(ResizeError::NotFeatureMap { rank: input.rank() });
    }
    Ok(input.spatial_size()?)
}

/// Everything the gradient needs from one forward call.
///
/// Input values are not stored; only the shapes and the interpolation
/// parameters are. Contexts are only built by a successful forward call, so
/// both recorded shapes are always rank 4.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeContext {
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    scale_factor: Option<ScaleFactor>,
    mode: InterpolationMode,
    align_corners: Option<bool>,
}

impl ResizeContext {
    /// Full shape of the forward input
    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    /// Full shape of the forward output
    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    /// Scale factor passed to forward, if any
    pub fn scale_factor(&self) -> Option<ScaleFactor> {
        self.scale_factor
    }

    /// Interpolation mode
    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    /// `align_corners` exactly as passed to forward
    pub fn align_corners(&self) -> Option<bool> {
        self.align_corners
    }

    /// Original spatial size of the forward input
    pub fn input_size(&self) -> (usize, usize) {
        (self.input_shape[2], self.input_shape[3])
    }

    /// Resample `output_grad` back to the forward input size.
    ///
    /// The recorded scale factor is passed along with the original size; the
    /// size takes priority, so the result always has the input shape.
    pub fn gradient<T>(&self, output_grad: &DenseND<T>) -> ResizeResult<DenseND<T>>
    where
        T: Float + FromPrimitive,
    {
        if output_grad.shape() != self.output_shape.as_slice() {
            return Err(ResizeError::ShapeMismatch {
                expected: self.output_shape.clone(),
                actual: output_grad.shape_vec(),
            });
        }

        let align = resolve_align_corners(self.mode, self.align_corners)?;
        let grad = output_grad.interpolate(
            Some(self.input_size()),
            self.scale_factor.map(ScaleFactor::pair),
            self.mode,
            align,
        )?;
        Ok(grad)
    }

    /// Consume the context and compute the input gradient
    pub fn backward<T>(self, output_grad: &DenseND<T>) -> ResizeResult<DenseND<T>>
    where
        T: Float + FromPrimitive,
    {
        self.gradient(output_grad)
    }
}

impl<T> VjpOp<T> for ResizeContext
where
    T: Float + FromPrimitive,
{
    fn vjp(&self, output_grad: &DenseND<T>) -> anyhow::Result<Vec<DenseND<T>>> {
        Ok(vec![self.gradient(output_grad)?])
    }

    fn name(&self) -> &str {
        "resize"
    }
}

/// Forward resize returning the output and its gradient context.
///
/// # Errors
///
/// - [`ResizeError::InvalidDescriptor`] unless exactly one of `size` and
///   `scale_factor` is given
/// - [`ResizeError::UnsupportedAlignment`] for `Some(_)` with nearest or area
/// - [`ResizeError::NotFeatureMap`] for non-rank-4 input
/// - [`ResizeError::InvalidSize`] for empty targets and for targets too
///   large to allocate
///
/// # Examples
///
/// ```
/// use tenseg_ad::resize::resize_forward;
/// use tenseg_core::{DenseND, InterpolationMode};
///
/// let x = DenseND::<f32>::zeros(&[2, 3, 5, 5]);
/// let (y, ctx) = resize_forward(&x, None, Some(2.0.into()), InterpolationMode::Nearest, None).unwrap();
/// assert_eq!(y.shape(), &[2, 3, 10, 10]);
/// assert_eq!(ctx.input_size(), (5, 5));
///
/// let grad = ctx.backward(&DenseND::<f32>::ones(&[2, 3, 10, 10])).unwrap();
/// assert_eq!(grad.shape(), &[2, 3, 5, 5]);
/// ```
pub fn resize_forward<T>(
    input: &DenseND<T>,
    size: Option<(f64, f64)>,
    scale_factor: Option<ScaleFactor>,
    mode: InterpolationMode,
    align_corners: Option<bool>,
) -> ResizeResult<(DenseND<T>, ResizeContext)>
where
    T: Float + FromPrimitive,
{
    let descriptor = ScaleDescriptor::new(size, scale_factor)?;
    let align = resolve_align_corners(mode, align_corners)?;
    let input_hw = feature_map_hw(input)?;
    let output_hw = descriptor.output_size(input_hw)?;
    check_output_len::<T>(input.shape(), output_hw)?;

    let output = match descriptor {
        ScaleDescriptor::Size(..) => input.interpolate(Some(output_hw), None, mode, align)?,
        ScaleDescriptor::Factor(factor) => {
            input.interpolate(None, Some(factor.pair()), mode, align)?
        }
    };

    let context = ResizeContext {
        input_shape: input.shape_vec(),
        output_shape: output.shape_vec(),
        scale_factor,
        mode,
        align_corners,
    };
    Ok((output, context))
}

/// Reject targets whose output buffer could never be allocated.
fn check_output_len<T>(input_shape: &[usize], output_hw: (usize, usize)) -> ResizeResult<()> {
    let bytes = [
        input_shape[0],
        input_shape[1],
        output_hw.0,
        output_hw.1,
        std::mem::size_of::<T>(),
    ]
    .iter()
    .try_fold(1usize, |acc, &d| acc.checked_mul(d));
    match bytes {
        Some(bytes) if bytes <= isize::MAX as usize => Ok(()),
        _ => Err(ResizeError::InvalidSize(format!(
            "output spatial size {:?} for input {:?} exceeds addressable memory",
            output_hw, input_shape
        ))),
    }
}

/// Stateful resize function object.
///
/// `forward` records a [`ResizeContext`]; the next `backward` consumes it.
/// Exactly one `backward` must follow each `forward`.
#[derive(Debug, Default)]
pub struct Resize {
    context: Option<ResizeContext>,
}

impl Resize {
    /// Create an operator with no pending context
    pub fn new() -> Self {
        Self { context: None }
    }

    /// Whether a forward call is waiting for its backward call
    pub fn is_pending(&self) -> bool {
        self.context.is_some()
    }

    /// The pending context, if any
    pub fn context(&self) -> Option<&ResizeContext> {
        self.context.as_ref()
    }

    /// Resample `input` and record the context for the paired gradient.
    ///
    /// Fails with [`ResizeError::PendingContext`] if the previous forward has
    /// not been followed by a backward.
    pub fn forward<T>(
        &mut self,
        input: &DenseND<T>,
        size: Option<(f64, f64)>,
        scale_factor: Option<ScaleFactor>,
        mode: InterpolationMode,
        align_corners: Option<bool>,
    ) -> ResizeResult<DenseND<T>>
    where
        T: Float + FromPrimitive,
    {
        if self.context.is_some() {
            return Err(ResizeError::PendingContext);
        }
        let (output, context) = resize_forward(input, size, scale_factor, mode, align_corners)?;
        self.context = Some(context);
        Ok(output)
    }

    /// Gradient w.r.t. the last forward input.
    ///
    /// The context is consumed even when the gradient shape is rejected.
    pub fn backward<T>(&mut self, output_grad: &DenseND<T>) -> ResizeResult<DenseND<T>>
    where
        T: Float + FromPrimitive,
    {
        let context = self.context.take().ok_or(ResizeError::MissingContext)?;
        context.backward(output_grad)
    }
}

/// Non-fatal diagnostic for upsampling with `align_corners = true` to a size
/// whose corners do not line up with the input grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentAdvisory {
    /// Input `(height, width)`
    pub input: (usize, usize),
    /// Output `(height, width)`
    pub output: (usize, usize),
}

impl fmt::Display for AlignmentAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "When align_corners=true, the output would be more aligned if input size {:?} is `x+1` and out size {:?} is `nx+1`",
            self.input, self.output
        )
    }
}

/// Check whether an align-corners upsample lands off the input grid.
///
/// Applies only when the output is larger than the input in some dim and
/// all four sizes exceed 1; triggers when `(out - 1) % (in - 1) != 0` for
/// some dim.
///
/// # Examples
///
/// ```
/// use tenseg_ad::resize::alignment_advisory;
///
/// assert!(alignment_advisory((10, 10), (15, 15)).is_some());
/// assert!(alignment_advisory((9, 9), (17, 17)).is_none());
/// ```
pub fn alignment_advisory(
    input_hw: (usize, usize),
    output_hw: (usize, usize),
) -> Option<AlignmentAdvisory> {
    let (in_h, in_w) = input_hw;
    let (out_h, out_w) = output_hw;

    let upsampling = out_h > in_h || out_w > in_w;
    let all_above_one = in_h > 1 && in_w > 1 && out_h > 1 && out_w > 1;
    if !upsampling || !all_above_one {
        return None;
    }

    let off_grid = (out_h - 1) % (in_h - 1) != 0 || (out_w - 1) % (in_w - 1) != 0;
    off_grid.then_some(AlignmentAdvisory {
        input: input_hw,
        output: output_hw,
    })
}

/// Inference resize with the alignment advisory.
///
/// When `warning` is set, `align_corners == Some(true)` and an explicit
/// `size` is given, an off-grid upsample is reported through `log::warn!`.
/// The advisory never changes the result. The gradient context is dropped;
/// use [`resize_with_context`], [`Resize`] or a tape when the gradient is
/// needed.
pub fn resize<T>(
    input: &DenseND<T>,
    size: Option<(f64, f64)>,
    scale_factor: Option<ScaleFactor>,
    mode: InterpolationMode,
    align_corners: Option<bool>,
    warning: bool,
) -> ResizeResult<DenseND<T>>
where
    T: Float + FromPrimitive,
{
    let (output, _context) =
        resize_with_context(input, size, scale_factor, mode, align_corners, warning)?;
    Ok(output)
}

/// [`resize`] that also hands back the gradient context.
///
/// # Examples
///
/// ```
/// use tenseg_ad::resize::resize_with_context;
/// use tenseg_core::{DenseND, InterpolationMode};
///
/// let x = DenseND::<f64>::ones(&[1, 2, 3, 3]);
/// let (y, ctx) = resize_with_context(
///     &x,
///     Some((6.0, 6.0)),
///     None,
///     InterpolationMode::Bilinear,
///     Some(false),
///     true,
/// )
/// .unwrap();
/// assert_eq!(ctx.output_shape(), y.shape());
/// assert_eq!(ctx.backward(&DenseND::<f64>::ones(y.shape())).unwrap().shape(), x.shape());
/// ```
pub fn resize_with_context<T>(
    input: &DenseND<T>,
    size: Option<(f64, f64)>,
    scale_factor: Option<ScaleFactor>,
    mode: InterpolationMode,
    align_corners: Option<bool>,
    warning: bool,
) -> ResizeResult<(DenseND<T>, ResizeContext)>
where
    T: Float + FromPrimitive,
{
    if warning && align_corners == Some(true) {
        if let (Some((h, w)), Ok(input_hw)) = (size, feature_map_hw(input)) {
            if h.is_finite() && w.is_finite() && h >= 0.0 && w >= 0.0 {
                let output_hw = (h.trunc() as usize, w.trunc() as usize);
                if let Some(advisory) = alignment_advisory(input_hw, output_hw) {
                    log::warn!("{}", advisory);
                }
            }
        }
    }

    resize_forward(input, size, scale_factor, mode, align_corners)
}

/// Resize layer that derives its target size at call time.
///
/// With a stored scale factor the target is `floor(dim * factor)` of the
/// current input, recomputed on every call since inputs may vary in size.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Upsample {
    size: Option<(usize, usize)>,
    scale_factor: Option<(f64, f64)>,
    mode: InterpolationMode,
    align_corners: Option<bool>,
}

impl Upsample {
    /// Create an upsample layer from exactly one of `size` and `scale_factor`
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_ad::resize::Upsample;
    /// use tenseg_core::{DenseND, InterpolationMode};
    ///
    /// let up = Upsample::new(None, Some(2.0.into()), InterpolationMode::Nearest, None).unwrap();
    /// let y = up.forward(&DenseND::<f64>::ones(&[1, 1, 3, 5])).unwrap();
    /// assert_eq!(y.shape(), &[1, 1, 6, 10]);
    /// ```
    pub fn new(
        size: Option<(usize, usize)>,
        scale_factor: Option<ScaleFactor>,
        mode: InterpolationMode,
        align_corners: Option<bool>,
    ) -> ResizeResult<Self> {
        if size.is_some() == scale_factor.is_some() {
            return Err(ResizeError::InvalidDescriptor {
                size: size.is_some(),
                scale_factor: scale_factor.is_some(),
            });
        }
        resolve_align_corners(mode, align_corners)?;
        Ok(Self {
            size,
            scale_factor: scale_factor.map(ScaleFactor::pair),
            mode,
            align_corners,
        })
    }

    /// Fixed output size layer
    pub fn with_size(
        size: (usize, usize),
        mode: InterpolationMode,
        align_corners: Option<bool>,
    ) -> ResizeResult<Self> {
        Self::new(Some(size), None, mode, align_corners)
    }

    /// Scale factor layer
    pub fn with_scale_factor(
        scale_factor: impl Into<ScaleFactor>,
        mode: InterpolationMode,
        align_corners: Option<bool>,
    ) -> ResizeResult<Self> {
        Self::new(None, Some(scale_factor.into()), mode, align_corners)
    }

    /// Interpolation mode
    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    /// Target size for an input of spatial size `input_hw`
    pub fn target_size(&self, input_hw: (usize, usize)) -> (usize, usize) {
        match (self.size, self.scale_factor) {
            (Some(size), _) => size,
            (None, Some((fh, fw))) => (
                (input_hw.0 as f64 * fh).floor() as usize,
                (input_hw.1 as f64 * fw).floor() as usize,
            ),
            (None, None) => input_hw,
        }
    }

    /// Resize `input` to the size derived from its current spatial dims
    pub fn forward<T>(&self, input: &DenseND<T>) -> ResizeResult<DenseND<T>>
    where
        T: Float + FromPrimitive,
    {
        let (h, w) = self.target_size(feature_map_hw(input)?);
        resize(
            input,
            Some((h as f64, w as f64)),
            None,
            self.mode,
            self.align_corners,
            true,
        )
    }
}
