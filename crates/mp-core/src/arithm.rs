//! Per-element arithmetic, comparison and weighted sums.

use mp_dtype::{Depth, MatType};
use mp_mat::{Mat, Scalar};

use crate::kernels::{self, ArithmOp, CmpCode};
use crate::{CoreError, require_same_layout};

fn binary(op: ArithmOp, src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    require_same_layout(op.name(), src1, src2)?;
    let depth = src1.depth();
    let data = src1
        .data()
        .iter()
        .zip(src2.data())
        .map(|(&a, &b)| op.apply(a, b, depth))
        .collect();
    Ok(src1.with_data(data)?)
}

fn binary_scalar(op: ArithmOp, src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    let depth = src.depth();
    let cn = src.channels();
    let data = src
        .data()
        .iter()
        .enumerate()
        .map(|(i, &a)| op.apply(a, scalar.get(i % cn), depth))
        .collect();
    Ok(src.with_data(data)?)
}

pub fn add(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    binary(ArithmOp::Add, src1, src2)
}

pub fn add_scalar(src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    binary_scalar(ArithmOp::Add, src, scalar)
}

pub fn subtract(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    binary(ArithmOp::Sub, src1, src2)
}

pub fn subtract_scalar(src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    binary_scalar(ArithmOp::Sub, src, scalar)
}

pub fn multiply(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    binary(ArithmOp::Mul, src1, src2)
}

pub fn multiply_scalar(src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    binary_scalar(ArithmOp::Mul, src, scalar)
}

/// `src1 / src2`; integer results of a division by zero are zero.
pub fn divide(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    binary(ArithmOp::Div, src1, src2)
}

pub fn divide_scalar(src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    binary_scalar(ArithmOp::Div, src, scalar)
}

/// `scale / src` for every element.
pub fn divide_scalar_inv(scale: f64, src: &Mat) -> Result<Mat, CoreError> {
    let depth = src.depth();
    let data = src
        .data()
        .iter()
        .map(|&b| ArithmOp::Div.apply(scale, b, depth))
        .collect();
    Ok(src.with_data(data)?)
}

pub fn absdiff(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    binary(ArithmOp::AbsDiff, src1, src2)
}

pub fn absdiff_scalar(src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    binary_scalar(ArithmOp::AbsDiff, src, scalar)
}

pub fn min(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    binary(ArithmOp::Min, src1, src2)
}

pub fn min_scalar(src: &Mat, value: f64) -> Result<Mat, CoreError> {
    binary_scalar(ArithmOp::Min, src, Scalar::all(value))
}

pub fn max(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    binary(ArithmOp::Max, src1, src2)
}

pub fn max_scalar(src: &Mat, value: f64) -> Result<Mat, CoreError> {
    binary_scalar(ArithmOp::Max, src, Scalar::all(value))
}

/// `src1 * alpha + src2 * beta + gamma`, stored at `dst_depth`.
///
/// The sources may differ in depth but must agree on size and channels.
pub fn add_weighted(
    src1: &Mat,
    alpha: f64,
    src2: &Mat,
    beta: f64,
    gamma: f64,
    dst_depth: Depth,
) -> Result<Mat, CoreError> {
    if src1.size() != src2.size() || src1.channels() != src2.channels() {
        return Err(CoreError::ShapeMismatch {
            op: "add_weighted",
            detail: format!(
                "{} {} vs {} {}",
                src1.size(),
                src1.mat_type(),
                src2.size(),
                src2.mat_type()
            ),
        });
    }
    let data = src1
        .data()
        .iter()
        .zip(src2.data())
        .map(|(&a, &b)| kernels::weighted(a, alpha, b, beta, gamma, dst_depth))
        .collect();
    Ok(Mat::new(
        src1.size(),
        src1.mat_type().with_depth(dst_depth),
        data,
    )?)
}

/// `8U` mask with the source channel count: 255 where the comparison holds.
pub fn compare(src1: &Mat, src2: &Mat, code: CmpCode) -> Result<Mat, CoreError> {
    require_same_layout("compare", src1, src2)?;
    let data = src1
        .data()
        .iter()
        .zip(src2.data())
        .map(|(&a, &b)| code.apply(a, b))
        .collect();
    Ok(Mat::new(src1.size(), mask_type(src1.mat_type()), data)?)
}

pub fn compare_scalar(src: &Mat, scalar: Scalar, code: CmpCode) -> Result<Mat, CoreError> {
    let cn = src.channels();
    let data = src
        .data()
        .iter()
        .enumerate()
        .map(|(i, &a)| code.apply(a, scalar.get(i % cn)))
        .collect();
    Ok(Mat::new(src.size(), mask_type(src.mat_type()), data)?)
}

fn mask_type(src: MatType) -> MatType {
    src.with_depth(Depth::U8)
}
