//! Device reductions. Every kernel produces one partial per row; partials are
//! combined on the calling thread in row order.

use mp_core::reduce::{moments_to_mean_std, normalize_range, normalize_scale};
use mp_core::{CoreError, NormType, ReduceDim, ReduceOp};
use mp_dtype::{Depth, MatType};
use mp_mat::{Point, Scalar};
use rayon::prelude::*;

use crate::{Device, DeviceError, DeviceMat, check_channels, check_non_empty, check_same_layout};

fn channel_sums(row: &[f64], cn: usize, f: impl Fn(f64) -> f64) -> [f64; 4] {
    let mut acc = [0.0; 4];
    for (i, &v) in row.iter().enumerate() {
        acc[i % cn] += f(v);
    }
    acc
}

fn add_partials(partials: &[[f64; 4]]) -> [f64; 4] {
    partials.iter().fold([0.0; 4], |mut acc, p| {
        for (a, v) in acc.iter_mut().zip(p) {
            *a += v;
        }
        acc
    })
}

#[derive(Clone, Copy)]
struct Extremes {
    min: f64,
    min_idx: usize,
    max: f64,
    max_idx: usize,
}

impl Device {
    fn per_channel(&self, src: &DeviceMat, f: impl Fn(f64) -> f64 + Send + Sync) -> Scalar {
        let cn = src.channels();
        let partials = self.row_partials(src, |_, row| channel_sums(row, cn, &f));
        Scalar(add_partials(&partials))
    }

    /// Per-channel sums.
    #[must_use]
    pub fn sum(&self, src: &DeviceMat) -> Scalar {
        self.per_channel(src, |v| v)
    }

    /// Per-channel sums of absolute values.
    #[must_use]
    pub fn abs_sum(&self, src: &DeviceMat) -> Scalar {
        self.per_channel(src, f64::abs)
    }

    /// Per-channel sums of squares.
    #[must_use]
    pub fn sqr_sum(&self, src: &DeviceMat) -> Scalar {
        self.per_channel(src, |v| v * v)
    }

    pub fn mean_std_dev(&self, src: &DeviceMat) -> Result<(Scalar, Scalar), DeviceError> {
        check_non_empty("mean_std_dev", src)?;
        let cn = src.channels();
        let sums = self.sum(src);
        let sq_sums = self.sqr_sum(src);
        let count = (src.len() / cn) as f64;
        Ok(moments_to_mean_std(sums.values(), sq_sums.values(), cn, count))
    }

    fn norm_of<F>(&self, src: &DeviceMat, norm_type: NormType, partial: F) -> Result<f64, DeviceError>
    where
        F: Fn(usize, &[f64]) -> f64 + Send + Sync,
    {
        let partials = self.row_partials(src, partial);
        match norm_type {
            NormType::Inf => Ok(partials.into_iter().fold(0.0, f64::max)),
            NormType::L1 => Ok(partials.into_iter().sum()),
            NormType::L2 => Ok(partials.into_iter().sum::<f64>().sqrt()),
            NormType::MinMax => Err(CoreError::InvalidArgument {
                op: "norm",
                detail: "NORM_MINMAX is only valid for normalize".to_string(),
            }
            .into()),
        }
    }

    pub fn norm(&self, src: &DeviceMat, norm_type: NormType) -> Result<f64, DeviceError> {
        self.norm_of(src, norm_type, |_, row| row_norm(norm_type, row.iter().copied()))
    }

    pub fn norm_diff(&self, a: &DeviceMat, b: &DeviceMat, norm_type: NormType) -> Result<f64, DeviceError> {
        check_same_layout("norm_diff", a, b)?;
        self.norm_of(a, norm_type, |r, row| {
            row_norm(norm_type, row.iter().zip(b.row(r)).map(|(&x, &y)| x - y))
        })
    }

    pub fn min_max(&self, src: &DeviceMat) -> Result<(f64, f64), DeviceError> {
        let (min, max, _, _) = self.min_max_loc(src)?;
        Ok((min, max))
    }

    /// Extremes with the first location of each, scanning in row order.
    pub fn min_max_loc(&self, src: &DeviceMat) -> Result<(f64, f64, Point, Point), DeviceError> {
        check_channels("min_max_loc", src, 1)?;
        check_non_empty("min_max_loc", src)?;
        let partials = self.row_partials(src, |_, row| {
            let mut ext = Extremes {
                min: row[0],
                min_idx: 0,
                max: row[0],
                max_idx: 0,
            };
            for (i, &v) in row.iter().enumerate() {
                if v < ext.min {
                    ext.min = v;
                    ext.min_idx = i;
                }
                if v > ext.max {
                    ext.max = v;
                    ext.max_idx = i;
                }
            }
            ext
        });
        let mut ext = partials[0];
        let (mut min_row, mut max_row) = (0, 0);
        for (r, p) in partials.iter().enumerate().skip(1) {
            if p.min < ext.min {
                ext.min = p.min;
                ext.min_idx = p.min_idx;
                min_row = r;
            }
            if p.max > ext.max {
                ext.max = p.max;
                ext.max_idx = p.max_idx;
                max_row = r;
            }
        }
        Ok((
            ext.min,
            ext.max,
            Point {
                x: ext.min_idx,
                y: min_row,
            },
            Point {
                x: ext.max_idx,
                y: max_row,
            },
        ))
    }

    pub fn count_non_zero(&self, src: &DeviceMat) -> Result<usize, DeviceError> {
        check_channels("count_non_zero", src, 1)?;
        let partials = self.row_partials(src, |_, row| row.iter().filter(|&&v| v != 0.0).count());
        Ok(partials.into_iter().sum())
    }

    pub fn reduce(
        &self,
        src: &DeviceMat,
        dim: ReduceDim,
        op: ReduceOp,
        dst_depth: Option<Depth>,
    ) -> Result<DeviceMat, DeviceError> {
        check_non_empty("reduce", src)?;
        let depth = dst_depth.unwrap_or_else(|| op.default_depth(src.mat_type().depth()));
        let cn = src.channels();
        let rows = src.rows();
        let cols = src.cols();
        let dst_type = MatType::new(depth, cn).map_err(CoreError::from)?;
        let mut dst = self.alloc(dim.output_size(src.size()), dst_type)?;
        match dim {
            ReduceDim::Rows => {
                // single output row; one task per column
                self.for_each_row(&mut dst, |_, row| {
                    row.par_chunks_mut(cn).enumerate().for_each(|(c, px)| {
                        for (ch, out) in px.iter_mut().enumerate() {
                            let acc = (0..rows)
                                .fold(op.identity(), |acc, r| op.fold(acc, src.value(r, c, ch)));
                            *out = depth.saturate(op.finish(acc, rows));
                        }
                    });
                });
            }
            ReduceDim::Cols => {
                self.for_each_row(&mut dst, |r, row| {
                    let src_row = src.row(r);
                    for (ch, out) in row.iter_mut().enumerate() {
                        let acc = src_row
                            .iter()
                            .skip(ch)
                            .step_by(cn)
                            .fold(op.identity(), |acc, &v| op.fold(acc, v));
                        *out = depth.saturate(op.finish(acc, cols));
                    }
                });
            }
        }
        Ok(dst)
    }

    pub fn normalize(
        &self,
        src: &DeviceMat,
        alpha: f64,
        beta: f64,
        norm_type: NormType,
        dst_depth: Option<Depth>,
    ) -> Result<DeviceMat, DeviceError> {
        check_non_empty("normalize", src)?;
        let (scale, shift) = match norm_type {
            NormType::MinMax => {
                let partials = self.row_partials(src, |_, row| {
                    row.iter()
                        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
                });
                let (lo, hi) = partials
                    .into_iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| (lo.min(a), hi.max(b)));
                normalize_range(alpha, beta, lo, hi)
            }
            other => (normalize_scale(alpha, self.norm(src, other)?), 0.0),
        };
        let depth = dst_depth.unwrap_or(src.mat_type().depth());
        let mut dst = self.alloc(src.size(), src.mat_type().with_depth(depth))?;
        self.for_each_row(&mut dst, |r, row| {
            for (out, &v) in row.iter_mut().zip(src.row(r)) {
                *out = depth.saturate(v * scale + shift);
            }
        });
        Ok(dst)
    }
}

/// Partial of one row: the maximum for `Inf`, a sum otherwise.
fn row_norm(norm_type: NormType, values: impl Iterator<Item = f64>) -> f64 {
    match norm_type {
        NormType::Inf => values.fold(0.0, |acc, v| acc.max(v.abs())),
        NormType::L1 => values.map(f64::abs).sum(),
        NormType::L2 | NormType::MinMax => values.map(|v| v * v).sum(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Device, DeviceConfig};
    use mp_core::{NormType, ReduceDim, ReduceOp, reduce};
    use mp_dtype::{Depth, MatType};
    use mp_mat::{Mat, Size};
    use mp_random::{DeterministicRng, FillPolicy, fill_mat};

    fn device() -> Device {
        Device::new(DeviceConfig {
            threads: 3,
            memory_limit: None,
        })
        .expect("device")
    }

    fn random(ty: MatType, policy: FillPolicy, seed: u64) -> Mat {
        let mut rng = DeterministicRng::new(seed);
        let mut mat = Mat::zeros(Size::new(45, 23), ty).expect("mat");
        fill_mat(&mut rng, &mut mat, policy).expect("fill");
        mat
    }

    fn close(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * b.abs().max(f64::MIN_POSITIVE)
    }

    #[test]
    fn integer_statistics_are_exact() {
        let device = device();
        let src = random(MatType::single(Depth::U8), FillPolicy::Warmup, 1);
        let dsrc = device.upload(&src).expect("upload");
        assert_eq!(device.sum(&dsrc), reduce::sum(&src));
        assert_eq!(
            device.mean_std_dev(&dsrc).expect("moments"),
            reduce::mean_std_dev(&src).expect("host moments")
        );
        assert_eq!(
            device.min_max_loc(&dsrc).expect("loc"),
            reduce::min_max_loc(&src).expect("host loc")
        );
        assert_eq!(
            device.count_non_zero(&dsrc).expect("nz"),
            reduce::count_non_zero(&src).expect("host nz")
        );
        for norm in [NormType::Inf, NormType::L1, NormType::L2] {
            assert_eq!(
                device.norm(&dsrc, norm).expect("norm"),
                reduce::norm(&src, norm).expect("host norm")
            );
        }
    }

    #[test]
    fn float_sums_agree_within_relative_tolerance() {
        let device = device();
        let ty = MatType::new(Depth::F32, 3).expect("type");
        let src = random(ty, FillPolicy::Warmup, 2);
        let dsrc = device.upload(&src).expect("upload");
        let got = device.sum(&dsrc);
        let want = reduce::sum(&src);
        for ch in 0..3 {
            assert!(close(got.get(ch), want.get(ch), 1e-9), "channel {ch}");
        }
        let abs = device.abs_sum(&dsrc);
        assert!(abs.get(0) >= got.get(0).abs());
        let sqr = device.sqr_sum(&dsrc);
        assert!(sqr.values().iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn norm_diff_of_identical_inputs_is_zero() {
        let device = device();
        let src = random(MatType::single(Depth::U8), FillPolicy::Warmup, 3);
        let dsrc = device.upload(&src).expect("upload");
        let copy = device.upload(&src).expect("upload");
        assert_eq!(device.norm_diff(&dsrc, &copy, NormType::L2).expect("diff"), 0.0);
        assert!(device.norm(&dsrc, NormType::MinMax).is_err());
    }

    #[test]
    fn axis_reductions_match_host() {
        let device = device();
        for depth in [Depth::U8, Depth::U16, Depth::S16, Depth::F32] {
            for cn in 1..=4 {
                let ty = MatType::new(depth, cn).expect("type");
                let src = random(ty, FillPolicy::Warmup, 4);
                let dsrc = device.upload(&src).expect("upload");
                for op in ReduceOp::ALL {
                    for dim in [ReduceDim::Rows, ReduceDim::Cols] {
                        let got = device.reduce(&dsrc, dim, op, None).expect("reduce");
                        let want = reduce::reduce(&src, dim, op, None).expect("host reduce");
                        assert_eq!(device.download(&got).expect("dl"), want, "{ty} {op} {dim}");
                    }
                }
            }
        }
    }

    #[test]
    fn normalize_matches_host() {
        let device = device();
        let src = random(MatType::single(Depth::U16), FillPolicy::Warmup, 5);
        let dsrc = device.upload(&src).expect("upload");
        for norm in [NormType::Inf, NormType::L1, NormType::L2, NormType::MinMax] {
            let got = device
                .normalize(&dsrc, 1.0, 0.0, norm, Some(Depth::F64))
                .expect("normalize");
            let want = reduce::normalize(&src, 1.0, 0.0, norm, Some(Depth::F64)).expect("host");
            assert_eq!(device.download(&got).expect("dl"), want, "{norm}");
        }
    }
}
