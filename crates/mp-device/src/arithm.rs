//! Per-element device kernels: arithmetic, comparison, bitwise and math.

use mp_core::kernels::{self, ArithmOp, BitOp, CmpCode, ShiftOp, UnaryOp};
use mp_core::CoreError;
use mp_dtype::{Depth, MatType};
use mp_mat::Scalar;

use crate::{Device, DeviceError, DeviceMat, check_float, check_integer, check_same_layout};

impl Device {
    /// `dst[i] = f(src[i], channel)` row by row.
    fn map_unary<F>(&self, src: &DeviceMat, dst_type: MatType, f: F) -> Result<DeviceMat, DeviceError>
    where
        F: Fn(f64, usize) -> f64 + Send + Sync,
    {
        let mut dst = self.alloc(src.size(), dst_type)?;
        let cn = src.channels();
        self.for_each_row(&mut dst, |r, row| {
            for (i, (out, &v)) in row.iter_mut().zip(src.row(r)).enumerate() {
                *out = f(v, i % cn);
            }
        });
        Ok(dst)
    }

    /// `dst[i] = f(a[i], b[i])` row by row; `a` and `b` share a layout.
    fn map_binary<F>(
        &self,
        a: &DeviceMat,
        b: &DeviceMat,
        dst_type: MatType,
        f: F,
    ) -> Result<DeviceMat, DeviceError>
    where
        F: Fn(f64, f64) -> f64 + Send + Sync,
    {
        let mut dst = self.alloc(a.size(), dst_type)?;
        self.for_each_row(&mut dst, |r, row| {
            for ((out, &x), &y) in row.iter_mut().zip(a.row(r)).zip(b.row(r)) {
                *out = f(x, y);
            }
        });
        Ok(dst)
    }

    fn arithm(&self, op: ArithmOp, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        check_same_layout(op.name(), a, b)?;
        let depth = a.mat_type().depth();
        self.map_binary(a, b, a.mat_type(), |x, y| op.apply(x, y, depth))
    }

    fn arithm_scalar(&self, op: ArithmOp, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        let depth = src.mat_type().depth();
        self.map_unary(src, src.mat_type(), |x, ch| op.apply(x, scalar.get(ch), depth))
    }

    fn unary(&self, op: UnaryOp, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        let depth = src.mat_type().depth();
        self.map_unary(src, src.mat_type(), |x, _| op.apply(x, depth))
    }

    pub fn add(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.arithm(ArithmOp::Add, a, b)
    }

    pub fn add_scalar(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.arithm_scalar(ArithmOp::Add, src, scalar)
    }

    pub fn subtract(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.arithm(ArithmOp::Sub, a, b)
    }

    pub fn subtract_scalar(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.arithm_scalar(ArithmOp::Sub, src, scalar)
    }

    pub fn multiply(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.arithm(ArithmOp::Mul, a, b)
    }

    pub fn multiply_scalar(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.arithm_scalar(ArithmOp::Mul, src, scalar)
    }

    pub fn divide(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.arithm(ArithmOp::Div, a, b)
    }

    pub fn divide_scalar(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.arithm_scalar(ArithmOp::Div, src, scalar)
    }

    /// `scale / src` for every element.
    pub fn divide_scalar_inv(&self, scale: f64, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        let depth = src.mat_type().depth();
        self.map_unary(src, src.mat_type(), |x, _| ArithmOp::Div.apply(scale, x, depth))
    }

    pub fn absdiff(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.arithm(ArithmOp::AbsDiff, a, b)
    }

    pub fn absdiff_scalar(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.arithm_scalar(ArithmOp::AbsDiff, src, scalar)
    }

    pub fn min(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.arithm(ArithmOp::Min, a, b)
    }

    pub fn min_scalar(&self, src: &DeviceMat, value: f64) -> Result<DeviceMat, DeviceError> {
        self.arithm_scalar(ArithmOp::Min, src, Scalar::all(value))
    }

    pub fn max(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.arithm(ArithmOp::Max, a, b)
    }

    pub fn max_scalar(&self, src: &DeviceMat, value: f64) -> Result<DeviceMat, DeviceError> {
        self.arithm_scalar(ArithmOp::Max, src, Scalar::all(value))
    }

    pub fn add_weighted(
        &self,
        a: &DeviceMat,
        alpha: f64,
        b: &DeviceMat,
        beta: f64,
        gamma: f64,
        dst_depth: Depth,
    ) -> Result<DeviceMat, DeviceError> {
        if a.size() != b.size() || a.channels() != b.channels() {
            return Err(CoreError::ShapeMismatch {
                op: "add_weighted",
                detail: format!("{} {} vs {} {}", a.size(), a.mat_type(), b.size(), b.mat_type()),
            }
            .into());
        }
        self.map_binary(a, b, a.mat_type().with_depth(dst_depth), |x, y| {
            kernels::weighted(x, alpha, y, beta, gamma, dst_depth)
        })
    }

    pub fn compare(&self, a: &DeviceMat, b: &DeviceMat, code: CmpCode) -> Result<DeviceMat, DeviceError> {
        check_same_layout("compare", a, b)?;
        self.map_binary(a, b, a.mat_type().with_depth(Depth::U8), |x, y| code.apply(x, y))
    }

    pub fn compare_scalar(&self, src: &DeviceMat, scalar: Scalar, code: CmpCode) -> Result<DeviceMat, DeviceError> {
        self.map_unary(src, src.mat_type().with_depth(Depth::U8), |x, ch| {
            code.apply(x, scalar.get(ch))
        })
    }

    pub fn bitwise_not(&self, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        check_integer("bitwise_not", src)?;
        let depth = src.mat_type().depth();
        self.map_unary(src, src.mat_type(), |x, _| kernels::bit_not(x, depth))
    }

    fn bitwise(&self, op: BitOp, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        check_integer(op.name(), a)?;
        check_same_layout(op.name(), a, b)?;
        let depth = a.mat_type().depth();
        self.map_binary(a, b, a.mat_type(), |x, y| op.apply(x, y, depth))
    }

    fn bitwise_scalar(&self, op: BitOp, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        check_integer(op.name(), src)?;
        let depth = src.mat_type().depth();
        let scalar = scalar.to_int();
        self.map_unary(src, src.mat_type(), |x, ch| op.apply(x, scalar.get(ch), depth))
    }

    pub fn bitwise_and(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.bitwise(BitOp::And, a, b)
    }

    pub fn bitwise_or(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.bitwise(BitOp::Or, a, b)
    }

    pub fn bitwise_xor(&self, a: &DeviceMat, b: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.bitwise(BitOp::Xor, a, b)
    }

    pub fn bitwise_and_scalar(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.bitwise_scalar(BitOp::And, src, scalar)
    }

    pub fn bitwise_or_scalar(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.bitwise_scalar(BitOp::Or, src, scalar)
    }

    pub fn bitwise_xor_scalar(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.bitwise_scalar(BitOp::Xor, src, scalar)
    }

    /// Per-channel shift; the scalar is rounded to non-negative integers.
    fn shift(&self, op: ShiftOp, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        check_integer(op.name(), src)?;
        let depth = src.mat_type().depth();
        let amounts = scalar.to_int();
        self.map_unary(src, src.mat_type(), |x, ch| {
            op.apply(x, amounts.get(ch).max(0.0) as u32, depth)
        })
    }

    pub fn rshift(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.shift(ShiftOp::Right, src, scalar)
    }

    pub fn lshift(&self, src: &DeviceMat, scalar: Scalar) -> Result<DeviceMat, DeviceError> {
        self.shift(ShiftOp::Left, src, scalar)
    }

    pub fn abs(&self, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.unary(UnaryOp::Abs, src)
    }

    pub fn sqr(&self, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.unary(UnaryOp::Sqr, src)
    }

    pub fn sqrt(&self, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.unary(UnaryOp::Sqrt, src)
    }

    pub fn log(&self, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.unary(UnaryOp::Log, src)
    }

    pub fn exp(&self, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        self.unary(UnaryOp::Exp, src)
    }

    pub fn pow(&self, src: &DeviceMat, power: f64) -> Result<DeviceMat, DeviceError> {
        if !power.is_finite() {
            return Err(CoreError::InvalidArgument {
                op: "pow",
                detail: format!("power must be finite, got {power}"),
            }
            .into());
        }
        self.unary(UnaryOp::Pow(power), src)
    }

    fn float_pair<F>(&self, op: &'static str, x: &DeviceMat, y: &DeviceMat, f: F) -> Result<DeviceMat, DeviceError>
    where
        F: Fn(f64, f64) -> f64 + Send + Sync,
    {
        check_float(op, x)?;
        check_same_layout(op, x, y)?;
        self.map_binary(x, y, x.mat_type(), f)
    }

    pub fn magnitude(&self, x: &DeviceMat, y: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        let depth = x.mat_type().depth();
        self.float_pair("magnitude", x, y, |a, b| kernels::magnitude(a, b, depth))
    }

    pub fn magnitude_sqr(&self, x: &DeviceMat, y: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        let depth = x.mat_type().depth();
        self.float_pair("magnitude_sqr", x, y, |a, b| kernels::magnitude_sqr(a, b, depth))
    }

    fn complex_map<F>(&self, op: &'static str, src: &DeviceMat, f: F) -> Result<DeviceMat, DeviceError>
    where
        F: Fn(f64, f64) -> f64 + Send + Sync,
    {
        check_float(op, src)?;
        crate::check_channels(op, src, 2)?;
        let mut dst = self.alloc(src.size(), src.mat_type().with_channels(1).map_err(CoreError::from)?)?;
        self.for_each_row(&mut dst, |r, row| {
            for (out, pair) in row.iter_mut().zip(src.row(r).chunks_exact(2)) {
                *out = f(pair[0], pair[1]);
            }
        });
        Ok(dst)
    }

    /// Magnitude of an interleaved `(re, im)` matrix.
    pub fn magnitude_complex(&self, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        let depth = src.mat_type().depth();
        self.complex_map("magnitude_complex", src, |re, im| kernels::magnitude(re, im, depth))
    }

    pub fn magnitude_sqr_complex(&self, src: &DeviceMat) -> Result<DeviceMat, DeviceError> {
        let depth = src.mat_type().depth();
        self.complex_map("magnitude_sqr_complex", src, |re, im| {
            kernels::magnitude_sqr(re, im, depth)
        })
    }

    pub fn phase(&self, x: &DeviceMat, y: &DeviceMat, degrees: bool) -> Result<DeviceMat, DeviceError> {
        let depth = x.mat_type().depth();
        self.float_pair("phase", x, y, |a, b| kernels::phase(a, b, degrees, depth))
    }

    /// Returns `(magnitude, angle)`.
    pub fn cart_to_polar(
        &self,
        x: &DeviceMat,
        y: &DeviceMat,
        degrees: bool,
    ) -> Result<(DeviceMat, DeviceMat), DeviceError> {
        let magnitude = self.magnitude(x, y)?;
        let angle = self.phase(x, y, degrees)?;
        Ok((magnitude, angle))
    }

    /// Returns `(x, y)`.
    pub fn polar_to_cart(
        &self,
        magnitude: &DeviceMat,
        angle: &DeviceMat,
        degrees: bool,
    ) -> Result<(DeviceMat, DeviceMat), DeviceError> {
        let depth = magnitude.mat_type().depth();
        let x = self.float_pair("polar_to_cart", magnitude, angle, |m, a| {
            kernels::polar_to_cart(m, a, degrees, depth).0
        })?;
        let y = self.float_pair("polar_to_cart", magnitude, angle, |m, a| {
            kernels::polar_to_cart(m, a, degrees, depth).1
        })?;
        Ok((x, y))
    }
}
