//! Interpolation modes and 1-D sampling taps.
//!
//! Every spatial resampling in this crate is separable: each output row and
//! each output column is described by a short list of `(source index, weight)`
//! taps, and the 2-D result is the outer product of the two tap lists.
//!
//! # Coordinate mapping
//!
//! For an output index `d` along an axis of input length `in` and output
//! length `out`:
//!
//! ```text
//! align_corners:   src = d * (in - 1) / (out - 1)        (0 when out == 1)
//! half-pixel:      src = (d + 0.5) * scale - 0.5         (bilinear, bicubic)
//! legacy nearest:  src = floor(d * scale)
//! ```
//!
//! where `scale = 1 / scale_factor` when the caller resamples by a scale
//! factor, and `in / out` otherwise.

use std::fmt;
use std::str::FromStr;

/// Cubic convolution coefficient used for bicubic interpolation
pub const CUBIC_A: f64 = -0.75;

/// Spatial interpolation kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InterpolationMode {
    /// Nearest neighbour (floor of the scaled coordinate)
    Nearest,
    /// Bilinear interpolation over the 2x2 neighbourhood
    Bilinear,
    /// Bicubic interpolation over the 4x4 neighbourhood
    Bicubic,
    /// Area averaging (adaptive average pooling to the target size)
    Area,
}

impl InterpolationMode {
    /// Whether the `align_corners` convention is meaningful for this mode
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::InterpolationMode;
    ///
    /// assert!(InterpolationMode::Bilinear.supports_align_corners());
    /// assert!(!InterpolationMode::Nearest.supports_align_corners());
    /// ```
    pub fn supports_align_corners(self) -> bool {
        matches!(self, Self::Bilinear | Self::Bicubic)
    }

    /// Lower-case registry name of the mode
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Bicubic => "bicubic",
            Self::Area => "area",
        }
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpolationMode {
    type Err = anyhow::Error;

    /// Parse a registered mode name
    ///
    /// # Examples
    ///
    /// ```
    /// use tenseg_core::InterpolationMode;
    ///
    /// let mode: InterpolationMode = "bilinear".parse().unwrap();
    /// assert_eq!(mode, InterpolationMode::Bilinear);
    /// assert!("trilinear".parse::<InterpolationMode>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "bicubic" => Ok(Self::Bicubic),
            "area" => Ok(Self::Area),
            other => anyhow::bail!("Unregistered interpolation mode '{}'", other),
        }
    }
}

/// `(source index, weight)` contributions for one output position
pub(crate) type Taps = Vec<(usize, f64)>;

fn coordinate_scale(
    input: usize,
    output: usize,
    align_corners: bool,
    scale_factor: Option<f64>,
) -> f64 {
    if align_corners {
        if output > 1 {
            (input - 1) as f64 / (output - 1) as f64
        } else {
            0.0
        }
    } else {
        match scale_factor {
            Some(factor) => 1.0 / factor,
            None => input as f64 / output as f64,
        }
    }
}

fn cubic_inner(x: f64) -> f64 {
    ((CUBIC_A + 2.0) * x - (CUBIC_A + 3.0)) * x * x + 1.0
}

fn cubic_outer(x: f64) -> f64 {
    ((CUBIC_A * x - 5.0 * CUBIC_A) * x + 8.0 * CUBIC_A) * x - 4.0 * CUBIC_A
}

/// Window `[start, end)` of adaptive pooling cell `index`
pub(crate) fn adaptive_window(index: usize, input: usize, output: usize) -> (usize, usize) {
    let start = (index * input) / output;
    let end = ((index + 1) * input).div_ceil(output);
    (start, end.min(input))
}

/// Build the taps for every output position along one axis.
///
/// `input` and `output` must both be non-zero; callers validate this. An
/// output length whose tap table cannot be allocated is an error.
pub(crate) fn axis_taps(
    mode: InterpolationMode,
    input: usize,
    output: usize,
    align_corners: bool,
    scale_factor: Option<f64>,
) -> anyhow::Result<Vec<Taps>> {
    let last = input - 1;
    let scale = coordinate_scale(input, output, align_corners, scale_factor);

    let mut table = Vec::new();
    table.try_reserve_exact(output).map_err(|e| {
        anyhow::anyhow!("Cannot allocate sampling taps for {} output positions: {}", output, e)
    })?;
    table.extend((0..output).map(|d| match mode {
        InterpolationMode::Nearest => {
            let src = ((d as f64) * scale).floor() as usize;
            vec![(src.min(last), 1.0)]
        }
        InterpolationMode::Bilinear => {
            let src = if align_corners {
                d as f64 * scale
            } else {
                ((d as f64 + 0.5) * scale - 0.5).max(0.0)
            };
            let i0 = (src.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            let lambda = src - i0 as f64;
            vec![(i0, 1.0 - lambda), (i1, lambda)]
        }
        InterpolationMode::Bicubic => {
            let src = if align_corners {
                d as f64 * scale
            } else {
                (d as f64 + 0.5) * scale - 0.5
            };
            let floor = src.floor();
            let t = src - floor;
            let base = floor as isize;
            let weights = [
                cubic_outer(t + 1.0),
                cubic_inner(t),
                cubic_inner(1.0 - t),
                cubic_outer(2.0 - t),
            ];
            weights
                .iter()
                .enumerate()
                .map(|(k, &w)| {
                    let idx = (base - 1 + k as isize).clamp(0, last as isize) as usize;
                    (idx, w)
                })
                .collect()
        }
        InterpolationMode::Area => {
            let (start, end) = adaptive_window(d, input, output);
            let weight = 1.0 / (end - start) as f64;
            (start..end).map(|i| (i, weight)).collect()
        }
    }));
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_sum(taps: &Taps) -> f64 {
        taps.iter().map(|&(_, w)| w).sum()
    }

    #[test]
    fn test_parse_roundtrip_names() {
        for mode in [
            InterpolationMode::Nearest,
            InterpolationMode::Bilinear,
            InterpolationMode::Bicubic,
            InterpolationMode::Area,
        ] {
            assert_eq!(mode.as_str().parse::<InterpolationMode>().unwrap(), mode);
        }
        assert!("Bilinear".parse::<InterpolationMode>().is_err());
    }

    #[test]
    fn test_taps_are_partitions_of_unity() {
        for mode in [
            InterpolationMode::Nearest,
            InterpolationMode::Bilinear,
            InterpolationMode::Bicubic,
            InterpolationMode::Area,
        ] {
            for align in [false, true] {
                for taps in axis_taps(mode, 7, 12, align, None).unwrap() {
                    assert!((weight_sum(&taps) - 1.0).abs() < 1e-12, "{mode}");
                }
            }
        }
    }

    #[test]
    fn test_align_corners_maps_corners_exactly() {
        let taps = axis_taps(InterpolationMode::Bilinear, 5, 9, true, None).unwrap();
        assert_eq!(taps[0][0], (0, 1.0));
        assert_eq!(taps[8][0].0, 4);
        // Every other output sample lands on an input sample
        assert_eq!(taps[2][0], (1, 1.0));
    }

    #[test]
    fn test_nearest_uses_scale_factor_when_given() {
        let taps = axis_taps(InterpolationMode::Nearest, 4, 8, false, Some(2.0)).unwrap();
        let sources: Vec<usize> = taps.iter().map(|t| t[0].0).collect();
        assert_eq!(sources, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_unallocatable_tap_table_is_an_error() {
        assert!(axis_taps(InterpolationMode::Bilinear, 4, usize::MAX, false, None).is_err());
        assert!(axis_taps(InterpolationMode::Nearest, 4, 1 << 60, false, None).is_err());
    }

    #[test]
    fn test_adaptive_window_overlaps_for_uneven_sizes() {
        assert_eq!(adaptive_window(0, 5, 3), (0, 2));
        assert_eq!(adaptive_window(1, 5, 3), (1, 4));
        assert_eq!(adaptive_window(2, 5, 3), (3, 5));
        // Global pooling
        assert_eq!(adaptive_window(0, 32, 1), (0, 32));
    }
}
