//! Spatial operations on NCHW feature maps
//!
//! Resampling and adaptive pooling act on dims 2 and 3 only; batch and
//! channel dims pass through untouched.

use super::types::DenseND;
use crate::interpolation::{axis_taps, InterpolationMode, Taps};
use scirs2_core::numeric::{Float, FromPrimitive};

impl<T> DenseND<T>
where
    T: Float + FromPrimitive,
{
    /// Resample the spatial dims of an NCHW tensor.
    ///
    /// The output size is `size` when given. Otherwise each spatial dim is
    /// `floor(dim * factor)` for the matching entry of `scale_factor`, and
    /// the factor also drives the coordinate mapping. When both are given the
    /// explicit size wins and the factor is ignored.
    ///
    /// `align_corners` only affects bilinear and bicubic sampling.
    ///
    /// # Errors
    ///
    /// Fails for non-rank-4 input, empty spatial dims, a missing target,
    /// non-positive or non-finite factors, or a zero-sized output.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::{DenseND, InterpolationMode};
    ///
    /// let x = DenseND::<f64>::ones(&[2, 3, 4, 5]);
    /// let y = x
    ///     .interpolate(Some((7, 9)), None, InterpolationMode::Bilinear, false)
    ///     .unwrap();
    /// assert_eq!(y.shape(), &[2, 3, 7, 9]);
    ///
    /// let z = x
    ///     .interpolate(None, Some((2.0, 0.5)), InterpolationMode::Nearest, false)
    ///     .unwrap();
    /// assert_eq!(z.shape(), &[2, 3, 8, 2]);
    /// ```
    pub fn interpolate(
        &self,
        size: Option<(usize, usize)>,
        scale_factor: Option<(f64, f64)>,
        mode: InterpolationMode,
        align_corners: bool,
    ) -> anyhow::Result<Self> {
        let (in_h, in_w) = self.spatial_size()?;
        anyhow::ensure!(
            in_h > 0 && in_w > 0,
            "Cannot interpolate an empty spatial map {:?}",
            self.shape()
        );

        let ((out_h, out_w), factors) = match (size, scale_factor) {
            (Some(size), _) => (size, (None, None)),
            (None, Some((fh, fw))) => {
                anyhow::ensure!(
                    fh.is_finite() && fw.is_finite() && fh > 0.0 && fw > 0.0,
                    "Scale factor must be positive and finite, got ({}, {})",
                    fh,
                    fw
                );
                let out = (
                    (in_h as f64 * fh).floor() as usize,
                    (in_w as f64 * fw).floor() as usize,
                );
                (out, (Some(fh), Some(fw)))
            }
            (None, None) => anyhow::bail!("interpolate requires either a size or a scale factor"),
        };
        anyhow::ensure!(
            out_h > 0 && out_w > 0,
            "Output spatial size must be > 0, got ({}, {})",
            out_h,
            out_w
        );

        self.resampled_len(out_h, out_w)?;
        let rows = axis_taps(mode, in_h, out_h, align_corners, factors.0)?;
        let cols = axis_taps(mode, in_w, out_w, align_corners, factors.1)?;
        self.resample_separable(&rows, &cols)
    }

    /// 2D adaptive average pooling on an NCHW tensor.
    ///
    /// Cell `i` of an axis of length `in` averages the window
    /// `[floor(i * in / out), ceil((i + 1) * in / out))`, so every input size
    /// maps onto the requested grid, including grids larger than the input.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::DenseND;
    ///
    /// let data: Vec<f64> = (1..=16).map(|x| x as f64).collect();
    /// let x = DenseND::from_vec(data, &[1, 1, 4, 4]).unwrap();
    ///
    /// let pooled = x.adaptive_avg_pool2d((2, 2)).unwrap();
    /// assert_eq!(pooled.shape(), &[1, 1, 2, 2]);
    /// assert_eq!(pooled[&[0, 0, 0, 0]], 3.5); // avg of [1, 2, 5, 6]
    ///
    /// let global = x.adaptive_avg_pool2d((1, 1)).unwrap();
    /// assert_eq!(global[&[0, 0, 0, 0]], 8.5);
    /// ```
    pub fn adaptive_avg_pool2d(&self, output_size: (usize, usize)) -> anyhow::Result<Self> {
        let (in_h, in_w) = self.spatial_size()?;
        let (out_h, out_w) = output_size;
        anyhow::ensure!(out_h > 0 && out_w > 0, "Output size must be > 0");
        anyhow::ensure!(
            in_h > 0 && in_w > 0,
            "Cannot pool an empty spatial map {:?}",
            self.shape()
        );

        self.resampled_len(out_h, out_w)?;
        let rows = axis_taps(InterpolationMode::Area, in_h, out_h, false, None)?;
        let cols = axis_taps(InterpolationMode::Area, in_w, out_w, false, None)?;
        self.resample_separable(&rows, &cols)
    }

    /// Element count of this map resampled to `(out_h, out_w)`, rejected
    /// when it cannot be addressed in memory.
    fn resampled_len(&self, out_h: usize, out_w: usize) -> anyhow::Result<usize> {
        let shape = self.shape();
        [shape[0], shape[1], out_h, out_w, std::mem::size_of::<T>()]
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .map(|bytes| bytes / std::mem::size_of::<T>().max(1))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Output shape [{}, {}, {}, {}] exceeds addressable memory",
                    shape[0],
                    shape[1],
                    out_h,
                    out_w
                )
            })
    }

    /// Apply per-axis taps to every `(batch, channel)` plane.
    fn resample_separable(&self, rows: &[Taps], cols: &[Taps]) -> anyhow::Result<Self> {
        let shape = self.shape();
        let (batch, channels, in_h, in_w) = (shape[0], shape[1], shape[2], shape[3]);
        let (out_h, out_w) = (rows.len(), cols.len());
        let output_len = self.resampled_len(out_h, out_w)?;

        let to_t = |w: f64| T::from_f64(w).unwrap_or_else(T::zero);
        let rows: Vec<Vec<(usize, T)>> = rows
            .iter()
            .map(|taps| taps.iter().map(|&(i, w)| (i, to_t(w))).collect())
            .collect();
        let cols: Vec<Vec<(usize, T)>> = cols
            .iter()
            .map(|taps| taps.iter().map(|&(j, w)| (j, to_t(w))).collect())
            .collect();

        // Logical row-major order regardless of memory layout
        let source: Vec<T> = self.data.iter().copied().collect();
        let plane_in = in_h * in_w;
        let mut output = Vec::new();
        output
            .try_reserve_exact(output_len)
            .map_err(|e| anyhow::anyhow!("Cannot allocate {} output elements: {}", output_len, e))?;

        for plane in source.chunks_exact(plane_in).take(batch * channels) {
            for row_taps in &rows {
                for col_taps in &cols {
                    let mut acc = T::zero();
                    for &(i, wi) in row_taps {
                        let row = &plane[i * in_w..(i + 1) * in_w];
                        for &(j, wj) in col_taps {
                            acc = acc + wi * wj * row[j];
                        }
                    }
                    output.push(acc);
                }
            }
        }

        Self::from_vec(output, &[batch, channels, out_h, out_w])
    }
}
