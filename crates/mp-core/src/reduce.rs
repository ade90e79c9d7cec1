//! Whole-matrix statistics, norms and axis reductions.

use mp_dtype::{Depth, MatType};
use mp_mat::{Mat, Point, Scalar, Size};

use crate::{CoreError, require_channels, require_non_empty, require_same_layout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormType {
    Inf,
    L1,
    L2,
    MinMax,
}

impl NormType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inf => "NORM_INF",
            Self::L1 => "NORM_L1",
            Self::L2 => "NORM_L2",
            Self::MinMax => "NORM_MINMAX",
        }
    }
}

impl std::fmt::Display for NormType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Sum,
    Avg,
    Max,
    Min,
}

impl ReduceOp {
    pub const ALL: [Self; 4] = [Self::Sum, Self::Avg, Self::Max, Self::Min];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sum => "REDUCE_SUM",
            Self::Avg => "REDUCE_AVG",
            Self::Max => "REDUCE_MAX",
            Self::Min => "REDUCE_MIN",
        }
    }

    /// Destination depth when the caller does not pick one.
    ///
    /// Extremes keep the source depth; sums and averages accumulate into
    /// `32F` (or `64F` for `64F` sources).
    #[must_use]
    pub const fn default_depth(self, src: Depth) -> Depth {
        match (self, src) {
            (Self::Max | Self::Min, depth) => depth,
            (Self::Sum | Self::Avg, Depth::F64) => Depth::F64,
            (Self::Sum | Self::Avg, _) => Depth::F32,
        }
    }

    #[must_use]
    pub fn identity(self) -> f64 {
        match self {
            Self::Sum | Self::Avg => 0.0,
            Self::Max => f64::NEG_INFINITY,
            Self::Min => f64::INFINITY,
        }
    }

    #[must_use]
    pub fn fold(self, acc: f64, value: f64) -> f64 {
        match self {
            Self::Sum | Self::Avg => acc + value,
            Self::Max => acc.max(value),
            Self::Min => acc.min(value),
        }
    }

    #[must_use]
    pub fn finish(self, acc: f64, count: usize) -> f64 {
        match self {
            Self::Avg if count > 0 => acc / count as f64,
            _ => acc,
        }
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Axis collapsed by [`reduce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceDim {
    /// Collapse all rows into a single row.
    Rows,
    /// Collapse all columns into a single column.
    Cols,
}

impl ReduceDim {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rows => "Rows",
            Self::Cols => "Cols",
        }
    }

    #[must_use]
    pub const fn output_size(self, src: Size) -> Size {
        match self {
            Self::Rows => Size::new(src.width, 1),
            Self::Cols => Size::new(1, src.height),
        }
    }
}

impl std::fmt::Display for ReduceDim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-channel sums.
#[must_use]
pub fn sum(src: &Mat) -> Scalar {
    let cn = src.channels();
    let mut out = [0.0; 4];
    for (i, &v) in src.data().iter().enumerate() {
        out[i % cn] += v;
    }
    Scalar(out)
}

/// Per-channel mean and population standard deviation.
pub fn mean_std_dev(src: &Mat) -> Result<(Scalar, Scalar), CoreError> {
    require_non_empty("mean_std_dev", src)?;
    let cn = src.channels();
    let mut sums = [0.0; 4];
    let mut sq_sums = [0.0; 4];
    for (i, &v) in src.data().iter().enumerate() {
        sums[i % cn] += v;
        sq_sums[i % cn] += v * v;
    }
    let count = (src.len() / cn) as f64;
    Ok(moments_to_mean_std(&sums, &sq_sums, cn, count))
}

/// Converts per-channel sums and squared sums into `(mean, stddev)`.
#[must_use]
pub fn moments_to_mean_std(sums: &[f64; 4], sq_sums: &[f64; 4], cn: usize, count: f64) -> (Scalar, Scalar) {
    let mut mean = [0.0; 4];
    let mut stddev = [0.0; 4];
    for ch in 0..cn {
        let m = sums[ch] / count;
        mean[ch] = m;
        stddev[ch] = (sq_sums[ch] / count - m * m).max(0.0).sqrt();
    }
    (Scalar(mean), Scalar(stddev))
}

fn accumulate_norm(norm_type: NormType, values: impl Iterator<Item = f64>) -> Result<f64, CoreError> {
    match norm_type {
        NormType::Inf => Ok(values.fold(0.0, |acc, v| acc.max(v.abs()))),
        NormType::L1 => Ok(values.map(f64::abs).sum()),
        NormType::L2 => Ok(values.map(|v| v * v).sum::<f64>().sqrt()),
        NormType::MinMax => Err(CoreError::InvalidArgument {
            op: "norm",
            detail: "NORM_MINMAX is only valid for normalize".to_string(),
        }),
    }
}

/// Norm over every element of every channel.
pub fn norm(src: &Mat, norm_type: NormType) -> Result<f64, CoreError> {
    accumulate_norm(norm_type, src.data().iter().copied())
}

/// Norm of `src1 - src2`.
pub fn norm_diff(src1: &Mat, src2: &Mat, norm_type: NormType) -> Result<f64, CoreError> {
    require_same_layout("norm_diff", src1, src2)?;
    accumulate_norm(
        norm_type,
        src1.data().iter().zip(src2.data()).map(|(&a, &b)| a - b),
    )
}

pub fn min_max(src: &Mat) -> Result<(f64, f64), CoreError> {
    let (min, max, _, _) = min_max_loc(src)?;
    Ok((min, max))
}

/// Extremes of a single-channel matrix with the first location of each.
pub fn min_max_loc(src: &Mat) -> Result<(f64, f64, Point, Point), CoreError> {
    require_channels("min_max_loc", src, 1)?;
    require_non_empty("min_max_loc", src)?;
    let data = src.data();
    let mut min_idx = 0;
    let mut max_idx = 0;
    for (i, &v) in data.iter().enumerate() {
        if v < data[min_idx] {
            min_idx = i;
        }
        if v > data[max_idx] {
            max_idx = i;
        }
    }
    let point = |idx: usize| {
        let (y, x, _) = src.unravel(idx);
        Point { x, y }
    };
    Ok((data[min_idx], data[max_idx], point(min_idx), point(max_idx)))
}

pub fn count_non_zero(src: &Mat) -> Result<usize, CoreError> {
    require_channels("count_non_zero", src, 1)?;
    Ok(src.data().iter().filter(|&&v| v != 0.0).count())
}

/// Collapses one axis with `op`, keeping channels separate.
pub fn reduce(
    src: &Mat,
    dim: ReduceDim,
    op: ReduceOp,
    dst_depth: Option<Depth>,
) -> Result<Mat, CoreError> {
    require_non_empty("reduce", src)?;
    let depth = dst_depth.unwrap_or_else(|| op.default_depth(src.depth()));
    let cn = src.channels();
    let rows = src.rows();
    let cols = src.cols();
    let out_size = dim.output_size(src.size());
    let out_type = MatType::new(depth, cn)?;
    let mut data = Vec::with_capacity(out_size.width * out_size.height * cn);
    match dim {
        ReduceDim::Rows => {
            let mut acc = vec![op.identity(); cols * cn];
            for r in 0..rows {
                for (slot, &v) in acc.iter_mut().zip(src.row(r)) {
                    *slot = op.fold(*slot, v);
                }
            }
            data.extend(acc.into_iter().map(|a| op.finish(a, rows)));
        }
        ReduceDim::Cols => {
            for r in 0..rows {
                let row = src.row(r);
                for ch in 0..cn {
                    let acc = row
                        .iter()
                        .skip(ch)
                        .step_by(cn)
                        .fold(op.identity(), |acc, &v| op.fold(acc, v));
                    data.push(op.finish(acc, cols));
                }
            }
        }
    }
    Ok(Mat::new(out_size, out_type, data)?)
}

/// Scale that maps a source norm onto `alpha`; zero for an all-zero source.
#[must_use]
pub fn normalize_scale(alpha: f64, src_norm: f64) -> f64 {
    if src_norm > f64::EPSILON {
        alpha / src_norm
    } else {
        0.0
    }
}

/// `(scale, shift)` mapping `[src_min, src_max]` onto the range spanned by
/// `alpha` and `beta`.
#[must_use]
pub fn normalize_range(alpha: f64, beta: f64, src_min: f64, src_max: f64) -> (f64, f64) {
    let dst_min = alpha.min(beta);
    let dst_max = alpha.max(beta);
    let span = src_max - src_min;
    let scale = if span > f64::EPSILON {
        (dst_max - dst_min) / span
    } else {
        0.0
    };
    (scale, dst_min - src_min * scale)
}

/// Rescales `src` so its norm equals `alpha`, or, for `MinMax`, so its values
/// span `[min(alpha, beta), max(alpha, beta)]`.
pub fn normalize(
    src: &Mat,
    alpha: f64,
    beta: f64,
    norm_type: NormType,
    dst_depth: Option<Depth>,
) -> Result<Mat, CoreError> {
    require_non_empty("normalize", src)?;
    let (scale, shift) = match norm_type {
        NormType::MinMax => {
            let (lo, hi) = src
                .data()
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            normalize_range(alpha, beta, lo, hi)
        }
        other => (normalize_scale(alpha, norm(src, other)?), 0.0),
    };
    let depth = dst_depth.unwrap_or(src.depth());
    let data = src
        .data()
        .iter()
        .map(|&v| v * scale + shift)
        .collect();
    Ok(Mat::new(src.size(), src.mat_type().with_depth(depth), data)?)
}
