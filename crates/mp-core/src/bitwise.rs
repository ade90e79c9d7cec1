//! Bitwise operators over integer depths.

use mp_mat::{Mat, Scalar};

use crate::kernels::{self, BitOp};
use crate::{CoreError, require_integer, require_same_layout};

pub fn bitwise_not(src: &Mat) -> Result<Mat, CoreError> {
    require_integer("bitwise_not", src)?;
    let depth = src.depth();
    let data = src
        .data()
        .iter()
        .map(|&v| kernels::bit_not(v, depth))
        .collect();
    Ok(src.with_data(data)?)
}

fn bitwise_mat(op: BitOp, src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    require_integer(op.name(), src1)?;
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

/// The scalar is rounded to integers before it is combined.
fn bitwise_scalar(op: BitOp, src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    require_integer(op.name(), src)?;
    let depth = src.depth();
    let cn = src.channels();
    let scalar = scalar.to_int();
    let data = src
        .data()
        .iter()
        .enumerate()
        .map(|(i, &a)| op.apply(a, scalar.get(i % cn), depth))
        .collect();
    Ok(src.with_data(data)?)
}

pub fn bitwise_and(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    bitwise_mat(BitOp::And, src1, src2)
}

pub fn bitwise_or(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    bitwise_mat(BitOp::Or, src1, src2)
}

pub fn bitwise_xor(src1: &Mat, src2: &Mat) -> Result<Mat, CoreError> {
    bitwise_mat(BitOp::Xor, src1, src2)
}

pub fn bitwise_and_scalar(src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    bitwise_scalar(BitOp::And, src, scalar)
}

pub fn bitwise_or_scalar(src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    bitwise_scalar(BitOp::Or, src, scalar)
}

pub fn bitwise_xor_scalar(src: &Mat, scalar: Scalar) -> Result<Mat, CoreError> {
    bitwise_scalar(BitOp::Xor, src, scalar)
}
