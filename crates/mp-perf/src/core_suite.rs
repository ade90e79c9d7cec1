//! The `core` suite: element-wise arithmetic, layout, math and reduction
//! benchmarks, each measurable on the host library and on the device.

use mp_core::{
    CmpCode, CoreError, FlipCode, GemmFlags, NormType, ReduceDim, ReduceOp, arithm, bitwise, gemm,
    layout, math, reduce,
};
use mp_device::{Device, DeviceError, DeviceMat};
use mp_dtype::{Depth, MatType};
use mp_mat::{Mat, Scalar, Size};

use crate::case::{CaseContext, CaseError, ExecPath};
use crate::params::{Dimension, ParamTuple};
use crate::procedure::{Check, check, run_comparison, run_device_only};
use crate::sanity::Tolerance;
use crate::suite::{PerfTest, Suite};

pub const SUITE_NAME: &str = "core";

const ARITHM_MAT_DEPTH: [Depth; 4] = [Depth::U8, Depth::U16, Depth::F32, Depth::F64];
const INTEGER_DEPTHS: [Depth; 3] = [Depth::U8, Depth::U16, Depth::S32];
const MINMAX_DEPTHS: [Depth; 3] = [Depth::U8, Depth::U16, Depth::F32];
const MATH_DEPTHS: [Depth; 3] = [Depth::U8, Depth::S16, Depth::F32];
const MULTI_CHANNELS: [usize; 3] = [1, 3, 4];

const TOL_EXACT: Tolerance = Tolerance::absolute(1e-10);
const TOL_DEFAULT: Tolerance = Tolerance::absolute(f64::EPSILON);
const TOL_FINE: Tolerance = Tolerance::absolute(1e-6);
const TOL_REL_FINE: Tolerance = Tolerance::relative(1e-6);
const TOL_REL_SUM: Tolerance = Tolerance::relative(1e-5);

const WEIGHT_ALPHA: f64 = 0.5;
const WEIGHT_BETA: f64 = 0.5;
const WEIGHT_GAMMA: f64 = 10.0;

const GEMM_HOST_SECONDS: f64 = 50.0;
const GEMM_DEVICE_SECONDS: f64 = 5.0;

const SHIFT_AMOUNT: f64 = 4.0;

type HostUnary = fn(&Mat) -> Result<Mat, CoreError>;
type DeviceUnary = fn(&Device, &DeviceMat) -> Result<DeviceMat, DeviceError>;
type HostBinary = fn(&Mat, &Mat) -> Result<Mat, CoreError>;
type DeviceBinary = fn(&Device, &DeviceMat, &DeviceMat) -> Result<DeviceMat, DeviceError>;
type HostWithScalar = fn(&Mat, Scalar) -> Result<Mat, CoreError>;
type DeviceWithScalar = fn(&Device, &DeviceMat, Scalar) -> Result<DeviceMat, DeviceError>;

#[must_use]
pub fn suite() -> Suite {
    Suite::new(
        SUITE_NAME,
        vec![
            PerfTest::new(
                "Core_Merge",
                |s| with_channels(s, &ARITHM_MAT_DEPTH, &[2, 3, 4]),
                merge,
            ),
            PerfTest::new(
                "Core_Split",
                |s| with_channels(s, &ARITHM_MAT_DEPTH, &[2, 3, 4]),
                split,
            ),
            PerfTest::new("Core_AddMat", |s| with_depths(s, &ARITHM_MAT_DEPTH), add_mat),
            PerfTest::new("Core_AddScalar", |s| with_depths(s, &ARITHM_MAT_DEPTH), add_scalar),
            PerfTest::new(
                "Core_SubtractMat",
                |s| with_depths(s, &ARITHM_MAT_DEPTH),
                subtract_mat,
            ),
            PerfTest::new(
                "Core_SubtractScalar",
                |s| with_depths(s, &ARITHM_MAT_DEPTH),
                subtract_scalar,
            ),
            PerfTest::new(
                "Core_MultiplyMat",
                |s| with_depths(s, &ARITHM_MAT_DEPTH),
                multiply_mat,
            ),
            PerfTest::new(
                "Core_MultiplyScalar",
                |s| with_depths(s, &ARITHM_MAT_DEPTH),
                multiply_scalar,
            ),
            PerfTest::new("Core_DivideMat", |s| with_depths(s, &ARITHM_MAT_DEPTH), divide_mat),
            PerfTest::new(
                "Core_DivideScalar",
                |s| with_depths(s, &ARITHM_MAT_DEPTH),
                divide_scalar,
            ),
            PerfTest::new(
                "Core_DivideScalarInv",
                |s| with_depths(s, &ARITHM_MAT_DEPTH),
                divide_scalar_inv,
            ),
            PerfTest::new(
                "Core_AbsDiffMat",
                |s| with_depths(s, &ARITHM_MAT_DEPTH),
                absdiff_mat,
            ),
            PerfTest::new(
                "Core_AbsDiffScalar",
                |s| with_depths(s, &ARITHM_MAT_DEPTH),
                absdiff_scalar,
            ),
            PerfTest::device_only("Core_Abs", |s| with_depths(s, &[Depth::S16, Depth::F32]), abs),
            PerfTest::device_only("Core_Sqr", |s| with_depths(s, &MATH_DEPTHS), sqr),
            PerfTest::new("Core_Sqrt", |s| with_depths(s, &MATH_DEPTHS), sqrt),
            PerfTest::new("Core_Log", |s| with_depths(s, &MATH_DEPTHS), log),
            PerfTest::new("Core_Exp", |s| with_depths(s, &MATH_DEPTHS), exp),
            PerfTest::new(
                "Core_Pow",
                |s| {
                    let mut dims = with_depths(s, &MATH_DEPTHS);
                    dims.push(Dimension::new([0.3, 2.0, 2.4]));
                    dims
                },
                pow,
            ),
            PerfTest::new(
                "Core_CompareMat",
                |s| with_cmp(s, &ARITHM_MAT_DEPTH),
                compare_mat,
            ),
            PerfTest::new(
                "Core_CompareScalar",
                |s| with_cmp(s, &ARITHM_MAT_DEPTH),
                compare_scalar,
            ),
            PerfTest::new("Core_BitwiseNot", |s| with_depths(s, &INTEGER_DEPTHS), bitwise_not),
            PerfTest::new(
                "Core_BitwiseAndMat",
                |s| with_depths(s, &INTEGER_DEPTHS),
                bitwise_and_mat,
            ),
            PerfTest::new(
                "Core_BitwiseAndScalar",
                |s| with_channels(s, &INTEGER_DEPTHS, &MULTI_CHANNELS),
                bitwise_and_scalar,
            ),
            PerfTest::new(
                "Core_BitwiseOrMat",
                |s| with_depths(s, &INTEGER_DEPTHS),
                bitwise_or_mat,
            ),
            PerfTest::new(
                "Core_BitwiseOrScalar",
                |s| with_channels(s, &INTEGER_DEPTHS, &MULTI_CHANNELS),
                bitwise_or_scalar,
            ),
            PerfTest::new(
                "Core_BitwiseXorMat",
                |s| with_depths(s, &INTEGER_DEPTHS),
                bitwise_xor_mat,
            ),
            PerfTest::new(
                "Core_BitwiseXorScalar",
                |s| with_channels(s, &INTEGER_DEPTHS, &MULTI_CHANNELS),
                bitwise_xor_scalar,
            ),
            PerfTest::device_only(
                "Core_RShift",
                |s| with_channels(s, &INTEGER_DEPTHS, &MULTI_CHANNELS),
                rshift,
            ),
            PerfTest::device_only(
                "Core_LShift",
                |s| with_channels(s, &INTEGER_DEPTHS, &MULTI_CHANNELS),
                lshift,
            ),
            PerfTest::new("Core_MinMat", |s| with_depths(s, &MINMAX_DEPTHS), min_mat),
            PerfTest::new("Core_MinScalar", |s| with_depths(s, &MINMAX_DEPTHS), min_scalar),
            PerfTest::new("Core_MaxMat", |s| with_depths(s, &MINMAX_DEPTHS), max_mat),
            PerfTest::new("Core_MaxScalar", |s| with_depths(s, &MINMAX_DEPTHS), max_scalar),
            PerfTest::new(
                "Core_AddWeighted",
                |s| {
                    vec![
                        size_dim(s),
                        depth_dim(&ARITHM_MAT_DEPTH),
                        depth_dim(&ARITHM_MAT_DEPTH),
                        depth_dim(&ARITHM_MAT_DEPTH),
                    ]
                },
                add_weighted,
            ),
            PerfTest::new(
                "Core_GEMM",
                |_| {
                    vec![
                        Dimension::new([Size::new(512, 512), Size::new(1024, 1024)]),
                        type_dim(&[
                            MatType::of::<1>(Depth::F32),
                            MatType::of::<2>(Depth::F32),
                            MatType::of::<1>(Depth::F64),
                        ]),
                        Dimension::new(GemmFlags::MEASURED),
                    ]
                },
                gemm,
            ),
            PerfTest::new(
                "Core_Transpose",
                |s| {
                    vec![
                        size_dim(s),
                        type_dim(&[
                            MatType::of::<1>(Depth::U8),
                            MatType::of::<4>(Depth::U8),
                            MatType::of::<2>(Depth::U16),
                            MatType::of::<2>(Depth::S16),
                            MatType::of::<1>(Depth::S32),
                            MatType::of::<2>(Depth::S32),
                            MatType::of::<1>(Depth::F64),
                        ]),
                    ]
                },
                transpose,
            ),
            PerfTest::new(
                "Core_Flip",
                |s| {
                    let mut dims = with_channels(s, &MINMAX_DEPTHS, &MULTI_CHANNELS);
                    dims.push(Dimension::new(FlipCode::ALL));
                    dims
                },
                flip,
            ),
            PerfTest::new(
                "Core_LutOneChannel",
                |s| {
                    vec![
                        size_dim(s),
                        type_dim(&[MatType::of::<1>(Depth::U8), MatType::of::<3>(Depth::U8)]),
                    ]
                },
                lut_one_channel,
            ),
            PerfTest::new(
                "Core_LutMultiChannel",
                |s| vec![size_dim(s), type_dim(&[MatType::of::<3>(Depth::U8)])],
                lut_multi_channel,
            ),
            PerfTest::new("Core_MagnitudeComplex", |s| vec![size_dim(s)], magnitude_complex),
            PerfTest::device_only(
                "Core_MagnitudeSqrComplex",
                |s| vec![size_dim(s)],
                magnitude_sqr_complex,
            ),
            PerfTest::new("Core_Magnitude", |s| vec![size_dim(s)], magnitude),
            PerfTest::device_only("Core_MagnitudeSqr", |s| vec![size_dim(s)], magnitude_sqr),
            PerfTest::new("Core_Phase", with_degrees, phase),
            PerfTest::new("Core_CartToPolar", with_degrees, cart_to_polar),
            PerfTest::new("Core_PolarToCart", with_degrees, polar_to_cart),
            PerfTest::new("Core_MeanStdDev", |s| vec![size_dim(s)], mean_std_dev),
            PerfTest::new(
                "Core_Norm",
                |s| {
                    vec![
                        size_dim(s),
                        depth_dim(&[Depth::U8, Depth::U16, Depth::S32, Depth::F32]),
                        Dimension::new([NormType::Inf, NormType::L1, NormType::L2]),
                    ]
                },
                norm,
            ),
            PerfTest::new(
                "Core_NormDiff",
                |s| {
                    vec![
                        size_dim(s),
                        Dimension::new([NormType::Inf, NormType::L1, NormType::L2]),
                    ]
                },
                norm_diff,
            ),
            PerfTest::new(
                "Core_Sum",
                |s| with_channels(s, &MINMAX_DEPTHS, &MULTI_CHANNELS),
                sum,
            ),
            PerfTest::device_only(
                "Core_SumAbs",
                |s| with_channels(s, &MINMAX_DEPTHS, &MULTI_CHANNELS),
                sum_abs,
            ),
            PerfTest::device_only(
                "Core_SumSqr",
                |s| with_channels(s, &MINMAX_DEPTHS, &MULTI_CHANNELS),
                sum_sqr,
            ),
            PerfTest::new("Core_MinMax", |s| with_depths(s, &ARITHM_MAT_DEPTH), min_max),
            PerfTest::new("Core_MinMaxLoc", |s| with_depths(s, &ARITHM_MAT_DEPTH), min_max_loc),
            PerfTest::new(
                "Core_CountNonZero",
                |s| with_depths(s, &ARITHM_MAT_DEPTH),
                count_non_zero,
            ),
            PerfTest::new(
                "Core_Reduce",
                |s| {
                    let mut dims = with_channels(
                        s,
                        &[Depth::U8, Depth::U16, Depth::S16, Depth::F32],
                        &[1, 2, 3, 4],
                    );
                    dims.push(Dimension::new(ReduceOp::ALL));
                    dims.push(Dimension::new([ReduceDim::Rows, ReduceDim::Cols]));
                    dims
                },
                reduce_dim,
            ),
            PerfTest::new(
                "Core_Normalize",
                |s| {
                    vec![
                        size_dim(s),
                        depth_dim(&ARITHM_MAT_DEPTH),
                        Dimension::new([
                            NormType::Inf,
                            NormType::L1,
                            NormType::L2,
                            NormType::MinMax,
                        ]),
                    ]
                },
                normalize,
            ),
        ],
    )
}

fn size_dim(sizes: &[Size]) -> Dimension {
    Dimension::new(sizes.iter().copied())
}

fn depth_dim(depths: &[Depth]) -> Dimension {
    Dimension::new(depths.iter().copied())
}

fn type_dim(types: &[MatType]) -> Dimension {
    Dimension::new(types.iter().copied())
}

fn with_depths(sizes: &[Size], depths: &[Depth]) -> Vec<Dimension> {
    vec![size_dim(sizes), depth_dim(depths)]
}

fn with_channels(sizes: &[Size], depths: &[Depth], channels: &[usize]) -> Vec<Dimension> {
    vec![
        size_dim(sizes),
        depth_dim(depths),
        Dimension::new(channels.iter().copied()),
    ]
}

fn with_cmp(sizes: &[Size], depths: &[Depth]) -> Vec<Dimension> {
    vec![size_dim(sizes), depth_dim(depths), Dimension::new(CmpCode::ALL)]
}

fn with_degrees(sizes: &[Size]) -> Vec<Dimension> {
    vec![size_dim(sizes), Dimension::new([false, true])]
}

fn mat_type(depth: Depth, channels: usize) -> Result<MatType, CaseError> {
    MatType::new(depth, channels).map_err(|err| CaseError::setup("building input type", err))
}

/// Type of `(size, depth[, cn])` tuples; single channel when `cn` is absent.
fn src_type(params: &ParamTuple) -> Result<MatType, CaseError> {
    let depth = params.depth(1)?;
    let channels = if params.len() > 2 {
        params.channels(2)?
    } else {
        1
    };
    mat_type(depth, channels)
}

fn float_plane() -> MatType {
    MatType::single(Depth::F32)
}

fn unary_op(
    ctx: &mut CaseContext<'_>,
    src: &Mat,
    host: HostUnary,
    device: DeviceUnary,
    checks: &[Check<'_>],
) -> Result<(), CaseError> {
    run_comparison(ctx, &[src], || host(src), |dev, d| device(dev, &d[0]), checks)
}

fn device_unary(ctx: &mut CaseContext<'_>, device: DeviceUnary, tolerance: Tolerance) -> Result<(), CaseError> {
    ctx.no_host_equivalent()?;
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    run_device_only(ctx, &[&src], |dev, d| device(dev, &d[0]), &[check("dst", tolerance)])
}

fn binary_mat(
    ctx: &mut CaseContext<'_>,
    host: HostBinary,
    device: DeviceBinary,
    tolerance: Tolerance,
) -> Result<(), CaseError> {
    let params = ctx.params();
    let size = params.size(0)?;
    let ty = src_type(params)?;
    let src1 = ctx.declare_in(size, ty)?;
    let src2 = ctx.declare_in(size, ty)?;
    run_comparison(
        ctx,
        &[&src1, &src2],
        || host(&src1, &src2),
        |dev, d| device(dev, &d[0], &d[1]),
        &[check("dst", tolerance)],
    )
}

fn scalar_op(
    ctx: &mut CaseContext<'_>,
    host: HostWithScalar,
    device: DeviceWithScalar,
    tolerance: Tolerance,
) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    let s = ctx.declare_scalar()?;
    run_comparison(
        ctx,
        &[&src],
        || host(&src, s),
        |dev, d| device(dev, &d[0], s),
        &[check("dst", tolerance)],
    )
}

fn merge(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let size = params.size(0)?;
    let plane = MatType::single(params.depth(1)?);
    let planes = (0..params.channels(2)?)
        .map(|_| ctx.declare_in(size, plane))
        .collect::<Result<Vec<_>, _>>()?;
    let inputs: Vec<&Mat> = planes.iter().collect();
    run_comparison(
        ctx,
        &inputs,
        || layout::merge(&planes),
        |dev, d| dev.merge(&d.iter().collect::<Vec<_>>()),
        &[check("dst", TOL_EXACT)],
    )
}

fn split(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    run_comparison(
        ctx,
        &[&src],
        || layout::split(&src),
        |dev, d| dev.split(&d[0]),
        &[check("dst0", TOL_EXACT), check("dst1", TOL_EXACT)],
    )
}

fn add_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, arithm::add, Device::add, TOL_EXACT)
}

fn add_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    scalar_op(ctx, arithm::add_scalar, Device::add_scalar, TOL_EXACT)
}

fn subtract_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, arithm::subtract, Device::subtract, TOL_EXACT)
}

fn subtract_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    scalar_op(ctx, arithm::subtract_scalar, Device::subtract_scalar, TOL_EXACT)
}

fn multiply_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, arithm::multiply, Device::multiply, TOL_FINE)
}

fn multiply_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    scalar_op(ctx, arithm::multiply_scalar, Device::multiply_scalar, TOL_FINE)
}

fn divide_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, arithm::divide, Device::divide, TOL_FINE)
}

fn divide_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    scalar_op(ctx, arithm::divide_scalar, Device::divide_scalar, TOL_FINE)
}

/// `s[0] / src`.
fn divide_scalar_inv(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    let scale = ctx.declare_scalar()?.get(0);
    run_comparison(
        ctx,
        &[&src],
        || arithm::divide_scalar_inv(scale, &src),
        |dev, d| dev.divide_scalar_inv(scale, &d[0]),
        &[check("dst", TOL_FINE)],
    )
}

fn absdiff_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, arithm::absdiff, Device::absdiff, TOL_EXACT)
}

fn absdiff_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    scalar_op(ctx, arithm::absdiff_scalar, Device::absdiff_scalar, TOL_EXACT)
}

fn abs(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    device_unary(ctx, Device::abs, TOL_DEFAULT)
}

fn sqr(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    device_unary(ctx, Device::sqr, TOL_DEFAULT)
}

fn ranged_math(
    ctx: &mut CaseContext<'_>,
    high: f64,
    host: HostUnary,
    device: DeviceUnary,
) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.randu(params.size(0)?, src_type(params)?, 0.0, high)?;
    unary_op(ctx, &src, host, device, &[check("dst", TOL_DEFAULT)])
}

fn sqrt(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    ranged_math(ctx, 100_000.0, math::sqrt, Device::sqrt)
}

fn log(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    ranged_math(ctx, 100_000.0, math::log, Device::log)
}

fn exp(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    ranged_math(ctx, 10.0, math::exp, Device::exp)
}

fn pow(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let power = params.float(2)?;
    let src = ctx.declare_in(params.size(0)?, MatType::single(params.depth(1)?))?;
    run_comparison(
        ctx,
        &[&src],
        || math::pow(&src, power),
        |dev, d| dev.pow(&d[0], power),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn compare_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let size = params.size(0)?;
    let ty = MatType::single(params.depth(1)?);
    let code = params.cmp(2)?;
    let src1 = ctx.declare_in(size, ty)?;
    let src2 = ctx.declare_in(size, ty)?;
    run_comparison(
        ctx,
        &[&src1, &src2],
        || arithm::compare(&src1, &src2, code),
        |dev, d| dev.compare(&d[0], &d[1], code),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn compare_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let code = params.cmp(2)?;
    let src = ctx.declare_in(params.size(0)?, MatType::single(params.depth(1)?))?;
    let s = ctx.declare_scalar()?;
    run_comparison(
        ctx,
        &[&src],
        || arithm::compare_scalar(&src, s, code),
        |dev, d| dev.compare_scalar(&d[0], s, code),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn bitwise_not(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    unary_op(
        ctx,
        &src,
        bitwise::bitwise_not,
        Device::bitwise_not,
        &[check("dst", TOL_DEFAULT)],
    )
}

fn bitwise_and_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, bitwise::bitwise_and, Device::bitwise_and, TOL_DEFAULT)
}

fn bitwise_and_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    scalar_op(ctx, bitwise::bitwise_and_scalar, Device::bitwise_and_scalar, TOL_DEFAULT)
}

fn bitwise_or_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, bitwise::bitwise_or, Device::bitwise_or, TOL_DEFAULT)
}

fn bitwise_or_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    scalar_op(ctx, bitwise::bitwise_or_scalar, Device::bitwise_or_scalar, TOL_DEFAULT)
}

fn bitwise_xor_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, bitwise::bitwise_xor, Device::bitwise_xor, TOL_DEFAULT)
}

fn bitwise_xor_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    scalar_op(ctx, bitwise::bitwise_xor_scalar, Device::bitwise_xor_scalar, TOL_DEFAULT)
}

fn shift(ctx: &mut CaseContext<'_>, device: DeviceWithScalar) -> Result<(), CaseError> {
    ctx.no_host_equivalent()?;
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    let amount = Scalar::all(SHIFT_AMOUNT);
    run_device_only(
        ctx,
        &[&src],
        |dev, d| device(dev, &d[0], amount),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn rshift(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    shift(ctx, Device::rshift)
}

fn lshift(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    shift(ctx, Device::lshift)
}

fn min_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, arithm::min, Device::min, TOL_DEFAULT)
}

fn max_mat(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    binary_mat(ctx, arithm::max, Device::max, TOL_DEFAULT)
}

fn min_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    let value = ctx.declare_scalar()?.get(0);
    run_comparison(
        ctx,
        &[&src],
        || arithm::min_scalar(&src, value),
        |dev, d| dev.min_scalar(&d[0], value),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn max_scalar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    let value = ctx.declare_scalar()?.get(0);
    run_comparison(
        ctx,
        &[&src],
        || arithm::max_scalar(&src, value),
        |dev, d| dev.max_scalar(&d[0], value),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn add_weighted(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let size = params.size(0)?;
    let dst_depth = params.depth(3)?;
    let src1 = ctx.declare_in(size, MatType::single(params.depth(1)?))?;
    let src2 = ctx.declare_in(size, MatType::single(params.depth(2)?))?;
    run_comparison(
        ctx,
        &[&src1, &src2],
        || arithm::add_weighted(&src1, WEIGHT_ALPHA, &src2, WEIGHT_BETA, WEIGHT_GAMMA, dst_depth),
        |dev, d| dev.add_weighted(&d[0], WEIGHT_ALPHA, &d[1], WEIGHT_BETA, WEIGHT_GAMMA, dst_depth),
        &[check("dst", TOL_EXACT)],
    )
}

fn gemm(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let size = params.size(0)?;
    let ty = params.mat_type(1)?;
    let flags = params.gemm_flags(2)?;
    let src1 = ctx.declare_in(size, ty)?;
    let src2 = ctx.declare_in(size, ty)?;
    let src3 = ctx.declare_in(size, ty)?;
    ctx.declare_time(match ctx.path() {
        ExecPath::Host => GEMM_HOST_SECONDS,
        ExecPath::Device => GEMM_DEVICE_SECONDS,
    });
    run_comparison(
        ctx,
        &[&src1, &src2, &src3],
        || gemm::gemm(&src1, &src2, 1.0, Some(&src3), 1.0, flags),
        |dev, d| dev.gemm(&d[0], &d[1], 1.0, Some(&d[2]), 1.0, flags),
        &[check("dst", TOL_REL_FINE)],
    )
}

fn transpose(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, params.mat_type(1)?)?;
    unary_op(
        ctx,
        &src,
        layout::transpose,
        Device::transpose,
        &[check("dst", TOL_EXACT)],
    )
}

fn flip(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let code = params.flip(3)?;
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    run_comparison(
        ctx,
        &[&src],
        || layout::flip(&src, code),
        |dev, d| dev.flip(&d[0], code),
        &[check("dst", TOL_DEFAULT)],
    )
}

/// The table stays host-resident on both paths.
fn lut_with_table(ctx: &mut CaseContext<'_>, table_channels: Option<usize>) -> Result<(), CaseError> {
    let params = ctx.params();
    let ty = params.mat_type(1)?;
    let src = ctx.declare_in(params.size(0)?, ty)?;
    let table_type = mat_type(Depth::U8, table_channels.unwrap_or(ty.channels()))?;
    let table = ctx.declare_in(Size::new(256, 1), table_type)?;
    run_comparison(
        ctx,
        &[&src],
        || layout::lut(&src, &table),
        |dev, d| dev.lut(&d[0], &table),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn lut_one_channel(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    lut_with_table(ctx, Some(1))
}

fn lut_multi_channel(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    lut_with_table(ctx, None)
}

fn complex_input(ctx: &mut CaseContext<'_>) -> Result<Mat, CaseError> {
    let size = ctx.params().size(0)?;
    ctx.declare_in(size, mat_type(Depth::F32, 2)?)
}

fn magnitude_complex(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let src = complex_input(ctx)?;
    let planes = match ctx.path() {
        ExecPath::Host => layout::split(&src).map_err(|err| CaseError::setup("splitting planes", err))?,
        ExecPath::Device => Vec::new(),
    };
    run_comparison(
        ctx,
        &[&src],
        || match planes.as_slice() {
            [re, im] => math::magnitude(re, im),
            _ => Err(CoreError::UnsupportedChannels {
                op: "magnitude",
                channels: planes.len(),
            }),
        },
        |dev, d| dev.magnitude_complex(&d[0]),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn magnitude_sqr_complex(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    ctx.no_host_equivalent()?;
    let src = complex_input(ctx)?;
    run_device_only(
        ctx,
        &[&src],
        |dev, d| dev.magnitude_sqr_complex(&d[0]),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn float_pair(ctx: &mut CaseContext<'_>) -> Result<(Mat, Mat), CaseError> {
    let size = ctx.params().size(0)?;
    let x = ctx.declare_in(size, float_plane())?;
    let y = ctx.declare_in(size, float_plane())?;
    Ok((x, y))
}

fn magnitude(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let (x, y) = float_pair(ctx)?;
    run_comparison(
        ctx,
        &[&x, &y],
        || math::magnitude(&x, &y),
        |dev, d| dev.magnitude(&d[0], &d[1]),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn magnitude_sqr(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    ctx.no_host_equivalent()?;
    let (x, y) = float_pair(ctx)?;
    run_device_only(
        ctx,
        &[&x, &y],
        |dev, d| dev.magnitude_sqr(&d[0], &d[1]),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn phase(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let degrees = ctx.params().flag(1)?;
    let (x, y) = float_pair(ctx)?;
    run_comparison(
        ctx,
        &[&x, &y],
        || math::phase(&x, &y, degrees),
        |dev, d| dev.phase(&d[0], &d[1], degrees),
        &[check("dst", TOL_REL_FINE)],
    )
}

fn cart_to_polar(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let degrees = ctx.params().flag(1)?;
    let (x, y) = float_pair(ctx)?;
    run_comparison(
        ctx,
        &[&x, &y],
        || math::cart_to_polar(&x, &y, degrees),
        |dev, d| dev.cart_to_polar(&d[0], &d[1], degrees),
        &[check("magnitude", TOL_DEFAULT), check("angle", TOL_REL_FINE)],
    )
}

fn polar_to_cart(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let degrees = ctx.params().flag(1)?;
    let (magnitude, angle) = float_pair(ctx)?;
    run_comparison(
        ctx,
        &[&magnitude, &angle],
        || math::polar_to_cart(&magnitude, &angle, degrees),
        |dev, d| dev.polar_to_cart(&d[0], &d[1], degrees),
        &[check("x", TOL_DEFAULT), check("y", TOL_DEFAULT)],
    )
}

fn mean_std_dev(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let size = ctx.params().size(0)?;
    let src = ctx.declare_in(size, MatType::single(Depth::U8))?;
    run_comparison(
        ctx,
        &[&src],
        || reduce::mean_std_dev(&src),
        |dev, d| dev.mean_std_dev(&d[0]),
        &[check("mean", TOL_DEFAULT), check("stddev", TOL_DEFAULT)],
    )
}

/// `8U` inputs stay below 255 so extremes are not all saturated.
fn statistic_input(ctx: &mut CaseContext<'_>) -> Result<Mat, CaseError> {
    let params = ctx.params();
    let size = params.size(0)?;
    let depth = params.depth(1)?;
    let ty = MatType::single(depth);
    if depth == Depth::U8 {
        ctx.randu(size, ty, 0.0, 254.0)
    } else {
        ctx.declare_in(size, ty)
    }
}

fn norm(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let norm_type = ctx.params().norm(2)?;
    let src = statistic_input(ctx)?;
    run_comparison(
        ctx,
        &[&src],
        || reduce::norm(&src, norm_type),
        |dev, d| dev.norm(&d[0], norm_type),
        &[check("dst", TOL_REL_FINE)],
    )
}

fn norm_diff(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let size = params.size(0)?;
    let norm_type = params.norm(1)?;
    let ty = MatType::single(Depth::U8);
    let src1 = ctx.declare_in(size, ty)?;
    let src2 = ctx.declare_in(size, ty)?;
    run_comparison(
        ctx,
        &[&src1, &src2],
        || reduce::norm_diff(&src1, &src2, norm_type),
        |dev, d| dev.norm_diff(&d[0], &d[1], norm_type),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn sum(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    run_comparison(
        ctx,
        &[&src],
        || Ok(reduce::sum(&src)),
        |dev, d| Ok(dev.sum(&d[0])),
        &[check("dst", TOL_REL_SUM)],
    )
}

fn device_sum(ctx: &mut CaseContext<'_>, device: fn(&Device, &DeviceMat) -> Scalar) -> Result<(), CaseError> {
    ctx.no_host_equivalent()?;
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    run_device_only(
        ctx,
        &[&src],
        |dev, d| Ok(device(dev, &d[0])),
        &[check("dst", TOL_REL_FINE)],
    )
}

fn sum_abs(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    device_sum(ctx, Device::abs_sum)
}

fn sum_sqr(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    device_sum(ctx, Device::sqr_sum)
}

fn min_max(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let src = statistic_input(ctx)?;
    run_comparison(
        ctx,
        &[&src],
        || reduce::min_max(&src),
        |dev, d| dev.min_max(&d[0]),
        &[check("min_val", TOL_EXACT), check("max_val", TOL_EXACT)],
    )
}

fn min_max_loc(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let src = statistic_input(ctx)?;
    run_comparison(
        ctx,
        &[&src],
        || reduce::min_max_loc(&src),
        |dev, d| dev.min_max_loc(&d[0]),
        &[
            check("min_val", TOL_EXACT),
            check("max_val", TOL_EXACT),
            check("min_loc", TOL_DEFAULT),
            check("max_loc", TOL_DEFAULT),
        ],
    )
}

fn count_non_zero(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    run_comparison(
        ctx,
        &[&src],
        || reduce::count_non_zero(&src),
        |dev, d| dev.count_non_zero(&d[0]),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn reduce_dim(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let op = params.reduce_op(3)?;
    let dim = params.reduce_dim(4)?;
    let src = ctx.declare_in(params.size(0)?, src_type(params)?)?;
    run_comparison(
        ctx,
        &[&src],
        || reduce::reduce(&src, dim, op, None),
        |dev, d| dev.reduce(&d[0], dim, op, None),
        &[check("dst", TOL_DEFAULT)],
    )
}

fn normalize(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
    let params = ctx.params();
    let norm_type = params.norm(2)?;
    let src = ctx.declare_in(params.size(0)?, MatType::single(params.depth(1)?))?;
    run_comparison(
        ctx,
        &[&src],
        || reduce::normalize(&src, 1.0, 0.0, norm_type, None),
        |dev, d| dev.normalize(&d[0], 1.0, 0.0, norm_type, None),
        &[check("dst", TOL_FINE)],
    )
}

#[cfg(test)]
mod tests {
    use super::suite;
    use mp_mat::{SZ_720P, SZ_VGA};
    use std::collections::BTreeSet;

    #[test]
    fn test_names_are_unique() {
        let suite = suite();
        let names: BTreeSet<&str> = suite.tests().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), suite.tests().len());
        assert!(names.iter().all(|name| name.starts_with("Core_")));
    }

    #[test]
    fn every_test_registers_instances() {
        let suite = suite();
        for test in suite.tests() {
            assert!(!test.space(&[SZ_VGA]).is_empty(), "{}", test.name);
        }
    }

    #[test]
    fn instance_names_are_unique_across_the_suite() {
        let suite = suite();
        let instances = suite.instances(&[SZ_VGA, SZ_720P], None);
        let names: BTreeSet<&str> = instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names.len(), instances.len());
    }

    #[test]
    fn catalogue_shapes_match_their_parameter_lists() {
        let suite = suite();
        let count = |name: &str| {
            suite
                .test(name)
                .map(|t| t.space(&[SZ_VGA]).len())
                .unwrap_or_default()
        };
        assert_eq!(count("Core_AddWeighted"), 64);
        assert_eq!(count("Core_GEMM"), 2 * 3 * 7);
        assert_eq!(count("Core_Transpose"), 7);
        assert_eq!(count("Core_Reduce"), 4 * 4 * 4 * 2);
        assert_eq!(count("Core_CompareMat"), 4 * 6);
        assert_eq!(count("Core_Flip"), 3 * 3 * 3);
    }

    #[test]
    fn typed_tests_enumerate_every_listed_type() {
        let suite = suite();
        let names = |pattern: &str| -> Vec<String> {
            suite
                .instances(&[SZ_VGA], Some(pattern))
                .into_iter()
                .map(|i| i.name)
                .collect()
        };
        assert_eq!(
            names("Core_Transpose"),
            ["8UC1", "8UC4", "16UC2", "16SC2", "32SC1", "32SC2", "64FC1"]
                .map(|ty| format!("Core_Transpose::(640x480, {ty})"))
        );
        assert_eq!(
            names("Core_LutOneChannel"),
            ["8UC1", "8UC3"].map(|ty| format!("Core_LutOneChannel::(640x480, {ty})"))
        );
        assert_eq!(names("Core_GEMM::(512x512, 32FC2, *").len(), 7);
    }

    #[test]
    fn device_only_entries_are_flagged() {
        let suite = suite();
        let device_only: BTreeSet<&str> = suite
            .tests()
            .iter()
            .filter(|t| t.device_only)
            .map(|t| t.name)
            .collect();
        let expected: BTreeSet<&str> = [
            "Core_Abs",
            "Core_Sqr",
            "Core_RShift",
            "Core_LShift",
            "Core_MagnitudeSqrComplex",
            "Core_MagnitudeSqr",
            "Core_SumAbs",
            "Core_SumSqr",
        ]
        .into_iter()
        .collect();
        assert_eq!(device_only, expected);
    }
}
