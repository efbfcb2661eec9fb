//! Convolution operations for NCHW feature maps
//!
//! Multi-channel 2D convolution as used by decode heads: a weight bank of
//! shape `[C_out, C_in, KH, KW]` applied to `[N, C_in, H, W]` input.
//!
//! # Performance Optimization: im2col + GEMM
//!
//! Each batch element is unrolled into a column matrix of shape
//! `[C_in * KH * KW, H_out * W_out]` (im2col) and multiplied by the weight
//! bank flattened to `[C_out, C_in * KH * KW]`. The product is the output
//! plane stack for that batch element.

#![allow(clippy::too_many_arguments)]

use super::types::DenseND;
use scirs2_core::ndarray_ext::Array2;
use scirs2_core::numeric::{Float, FromPrimitive};

/// Padding mode for convolution operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConvPadding {
    /// No padding - output size shrinks
    Valid,
    /// Pad to keep output size same as input (when stride=1)
    Same,
    /// Custom padding amount (applied symmetrically)
    Custom(usize),
}

impl ConvPadding {
    fn amount(self, effective_kernel: usize, stride: usize) -> usize {
        match self {
            ConvPadding::Valid => 0,
            ConvPadding::Same if stride == 1 => (effective_kernel - 1) / 2,
            ConvPadding::Same => 0,
            ConvPadding::Custom(p) => p,
        }
    }
}

/// Unroll one `[C, H, W]` plane stack into an im2col matrix.
///
/// Rows are ordered `(channel, ki, kj)`, matching a row-major flatten of
/// `[C_in, KH, KW]`; columns are output positions in row-major order.
/// Positions that fall into the zero padding contribute zero.
fn im2col<T>(
    planes: &[T],
    channels: usize,
    input_h: usize,
    input_w: usize,
    kernel_h: usize,
    kernel_w: usize,
    stride: usize,
    pad: usize,
    dilation: usize,
    output_h: usize,
    output_w: usize,
) -> Array2<T>
where
    T: Float,
{
    let mut col_matrix = Array2::zeros((channels * kernel_h * kernel_w, output_h * output_w));

    for c in 0..channels {
        let plane = &planes[c * input_h * input_w..(c + 1) * input_h * input_w];
        for ki in 0..kernel_h {
            for kj in 0..kernel_w {
                let row = (c * kernel_h + ki) * kernel_w + kj;
                for out_i in 0..output_h {
                    let padded_i = out_i * stride + ki * dilation;
                    if padded_i < pad || padded_i - pad >= input_h {
                        continue;
                    }
                    let in_i = padded_i - pad;
                    for out_j in 0..output_w {
                        let padded_j = out_j * stride + kj * dilation;
                        if padded_j < pad || padded_j - pad >= input_w {
                            continue;
                        }
                        let in_j = padded_j - pad;
                        col_matrix[[row, out_i * output_w + out_j]] = plane[in_i * input_w + in_j];
                    }
                }
            }
        }
    }

    col_matrix
}

impl<T> DenseND<T>
where
    T: Float + FromPrimitive + 'static,
{
    /// Perform multi-channel 2D convolution on an NCHW tensor.
    ///
    /// # Arguments
    ///
    /// * `weight` - Filter bank `[C_out, C_in, KH, KW]`
    /// * `bias` - Optional per-output-channel bias `[C_out]`
    /// * `stride` - Step size (applied to both H and W)
    /// * `padding` - Padding mode (Valid, Same, or Custom)
    /// * `dilation` - Spacing between kernel elements
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::{DenseND, ConvPadding};
    ///
    /// let x = DenseND::<f64>::ones(&[1, 2, 5, 5]);
    /// let w = DenseND::<f64>::ones(&[4, 2, 3, 3]);
    ///
    /// let y = x.conv2d_nchw(&w, None, 1, ConvPadding::Same, 1).unwrap();
    /// assert_eq!(y.shape(), &[1, 4, 5, 5]);
    /// assert_eq!(y[&[0, 0, 2, 2]], 18.0); // 2 channels * 3 * 3 ones
    /// assert_eq!(y[&[0, 3, 0, 0]], 8.0);  // corner sees a 2x2 window
    /// ```
    pub fn conv2d_nchw(
        &self,
        weight: &Self,
        bias: Option<&Self>,
        stride: usize,
        padding: ConvPadding,
        dilation: usize,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(stride > 0, "Stride must be positive");
        anyhow::ensure!(dilation > 0, "Dilation must be positive");
        anyhow::ensure!(
            self.rank() == 4,
            "Input must be NCHW (rank 4), got rank {}",
            self.rank()
        );
        anyhow::ensure!(
            weight.rank() == 4,
            "Weight must be [C_out, C_in, KH, KW], got rank {}",
            weight.rank()
        );

        let (batch, channels, input_h, input_w) = (
            self.shape()[0],
            self.shape()[1],
            self.shape()[2],
            self.shape()[3],
        );
        let (out_channels, weight_in, kernel_h, kernel_w) = (
            weight.shape()[0],
            weight.shape()[1],
            weight.shape()[2],
            weight.shape()[3],
        );
        anyhow::ensure!(
            weight_in == channels,
            "Weight expects {} input channels, input has {}",
            weight_in,
            channels
        );
        anyhow::ensure!(kernel_h > 0 && kernel_w > 0, "Kernel size must be > 0");
        if let Some(bias) = bias {
            anyhow::ensure!(
                bias.shape() == &[out_channels][..],
                "Bias shape {:?} does not match {} output channels",
                bias.shape(),
                out_channels
            );
        }

        let effective_kernel_h = (kernel_h - 1) * dilation + 1;
        let effective_kernel_w = (kernel_w - 1) * dilation + 1;
        let pad = padding.amount(effective_kernel_h.max(effective_kernel_w), stride);
        let padded_h = input_h + 2 * pad;
        let padded_w = input_w + 2 * pad;

        anyhow::ensure!(
            padded_h >= effective_kernel_h && padded_w >= effective_kernel_w,
            "Input size {}x{} (after padding {}) is smaller than effective kernel size {}x{}",
            padded_h,
            padded_w,
            pad,
            effective_kernel_h,
            effective_kernel_w
        );

        let output_h = (padded_h - effective_kernel_h) / stride + 1;
        let output_w = (padded_w - effective_kernel_w) / stride + 1;

        // Flatten the filter bank once, reused for every batch element
        let patch_len = channels * kernel_h * kernel_w;
        let weight_flat =
            Array2::from_shape_vec((out_channels, patch_len), weight.data.iter().copied().collect())?;
        let bias_values: Option<Vec<T>> = bias.map(|b| b.data.iter().copied().collect());

        let source: Vec<T> = self.data.iter().copied().collect();
        let sample_len = channels * input_h * input_w;
        let mut output = Vec::with_capacity(batch * out_channels * output_h * output_w);

        for sample in source.chunks_exact(sample_len.max(1)).take(batch) {
            let col_matrix = im2col(
                sample, channels, input_h, input_w, kernel_h, kernel_w, stride, pad, dilation,
                output_h, output_w,
            );

            // GEMM: [C_out, patch_len] x [patch_len, H_out * W_out]
            let mut planes = weight_flat.dot(&col_matrix);

            if let Some(bias_values) = bias_values.as_ref() {
                for (mut row, &b) in planes.rows_mut().into_iter().zip(bias_values.iter()) {
                    row.mapv_inplace(|v| v + b);
                }
            }

            output.extend(planes.iter().copied());
        }

        Self::from_vec(output, &[batch, out_channels, output_h, output_w])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointwise_conv_is_channel_mixing() {
        // 1x1 conv: out[o] = sum_c w[o, c] * x[c] + b[o]
        let x = DenseND::from_vec(vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0], &[1, 2, 2, 2])
            .unwrap();
        let w = DenseND::from_vec(vec![1.0, 0.5, -1.0, 0.0], &[2, 2, 1, 1]).unwrap();
        let b = DenseND::from_vec(vec![0.0, 1.0], &[2]).unwrap();

        let y = x.conv2d_nchw(&w, Some(&b), 1, ConvPadding::Valid, 1).unwrap();
        assert_eq!(y.shape(), &[1, 2, 2, 2]);
        assert_eq!(y[&[0, 0, 0, 0]], 6.0);
        assert_eq!(y[&[0, 0, 1, 1]], 24.0);
        assert_eq!(y[&[0, 1, 0, 1]], -1.0);
    }

    #[test]
    fn test_conv_valid_stride_and_dilation() {
        let x = DenseND::<f64>::ones(&[2, 1, 7, 7]);
        let w = DenseND::<f64>::ones(&[1, 1, 3, 3]);

        let y = x.conv2d_nchw(&w, None, 2, ConvPadding::Valid, 1).unwrap();
        assert_eq!(y.shape(), &[2, 1, 3, 3]);

        let y = x.conv2d_nchw(&w, None, 1, ConvPadding::Valid, 2).unwrap();
        assert_eq!(y.shape(), &[2, 1, 3, 3]);
        assert!(y.iter().all(|&v| v == 9.0));
    }

    #[test]
    fn test_conv_rejects_mismatches() {
        let x = DenseND::<f64>::ones(&[1, 3, 4, 4]);
        let w = DenseND::<f64>::ones(&[2, 2, 1, 1]);
        assert!(x.conv2d_nchw(&w, None, 1, ConvPadding::Valid, 1).is_err());

        let w = DenseND::<f64>::ones(&[2, 3, 1, 1]);
        let bad_bias = DenseND::<f64>::ones(&[3]);
        assert!(x
            .conv2d_nchw(&w, Some(&bad_bias), 1, ConvPadding::Valid, 1)
            .is_err());
        assert!(x.conv2d_nchw(&w, None, 0, ConvPadding::Valid, 1).is_err());

        let big = DenseND::<f64>::ones(&[2, 3, 5, 5]);
        assert!(x.conv2d_nchw(&big, None, 1, ConvPadding::Valid, 1).is_err());
    }
}
