//! Elementary functions and polar conversions.

use mp_mat::Mat;

use crate::kernels::{self, UnaryOp};
use crate::{CoreError, require_float, require_same_layout};

fn unary(op: UnaryOp, src: &Mat) -> Result<Mat, CoreError> {
    let depth = src.depth();
    let data = src.data().iter().map(|&v| op.apply(v, depth)).collect();
    Ok(src.with_data(data)?)
}

pub fn sqrt(src: &Mat) -> Result<Mat, CoreError> {
    unary(UnaryOp::Sqrt, src)
}

/// Natural logarithm; zero saturates to the lowest value of the depth.
pub fn log(src: &Mat) -> Result<Mat, CoreError> {
    unary(UnaryOp::Log, src)
}

pub fn exp(src: &Mat) -> Result<Mat, CoreError> {
    unary(UnaryOp::Exp, src)
}

pub fn pow(src: &Mat, power: f64) -> Result<Mat, CoreError> {
    if !power.is_finite() {
        return Err(CoreError::InvalidArgument {
            op: "pow",
            detail: format!("power must be finite, got {power}"),
        });
    }
    unary(UnaryOp::Pow(power), src)
}

fn float_pair(op: &'static str, x: &Mat, y: &Mat) -> Result<(), CoreError> {
    require_float(op, x)?;
    require_same_layout(op, x, y)
}

fn pairwise(
    op: &'static str,
    x: &Mat,
    y: &Mat,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Mat, CoreError> {
    float_pair(op, x, y)?;
    let data = x.data().iter().zip(y.data()).map(|(&a, &b)| f(a, b)).collect();
    Ok(x.with_data(data)?)
}

pub fn magnitude(x: &Mat, y: &Mat) -> Result<Mat, CoreError> {
    let depth = x.depth();
    pairwise("magnitude", x, y, |a, b| kernels::magnitude(a, b, depth))
}

pub fn phase(x: &Mat, y: &Mat, degrees: bool) -> Result<Mat, CoreError> {
    let depth = x.depth();
    pairwise("phase", x, y, |a, b| kernels::phase(a, b, degrees, depth))
}

/// Returns `(magnitude, angle)`.
pub fn cart_to_polar(x: &Mat, y: &Mat, degrees: bool) -> Result<(Mat, Mat), CoreError> {
    let magnitude = magnitude(x, y)?;
    let angle = phase(x, y, degrees)?;
    Ok((magnitude, angle))
}

/// Returns `(x, y)`.
pub fn polar_to_cart(magnitude: &Mat, angle: &Mat, degrees: bool) -> Result<(Mat, Mat), CoreError> {
    float_pair("polar_to_cart", magnitude, angle)?;
    let depth = magnitude.depth();
    let (xs, ys): (Vec<f64>, Vec<f64>) = magnitude
        .data()
        .iter()
        .zip(angle.data())
        .map(|(&m, &a)| kernels::polar_to_cart(m, a, degrees, depth))
        .unzip();
    Ok((magnitude.with_data(xs)?, magnitude.with_data(ys)?))
}

#[cfg(test)]
mod tests {
    use super::{cart_to_polar, exp, log, magnitude, phase, polar_to_cart, pow, sqrt};
    use crate::CoreError;
    use mp_dtype::{Depth, MatType};
    use mp_mat::{Mat, Size};

    fn row(depth: Depth, values: &[f64]) -> Mat {
        Mat::new(Size::new(values.len(), 1), MatType::single(depth), values.to_vec()).expect("mat")
    }

    #[test]
    fn elementary_functions_saturate() {
        let src = row(Depth::U8, &[0.0, 4.0, 250.0]);
        assert_eq!(sqrt(&src).expect("sqrt").data(), &[0.0, 2.0, 16.0]);
        assert_eq!(exp(&src).expect("exp").data(), &[1.0, 55.0, 255.0]);
        let logs = log(&row(Depth::F64, &[1.0, std::f64::consts::E])).expect("log");
        assert!((logs.data()[1] - 1.0).abs() < 1e-15);
        assert_eq!(logs.data()[0], 0.0);
    }

    #[test]
    fn pow_rejects_non_finite_power() {
        let src = row(Depth::F32, &[2.0]);
        assert!(matches!(
            pow(&src, f64::NAN),
            Err(CoreError::InvalidArgument { op: "pow", .. })
        ));
        assert_eq!(pow(&src, 3.0).expect("pow").data(), &[8.0]);
    }

    #[test]
    fn polar_conversions_round_trip() {
        let x = row(Depth::F64, &[3.0, -1.0, 0.0]);
        let y = row(Depth::F64, &[4.0, 0.0, -2.0]);
        let (mag, angle) = cart_to_polar(&x, &y, false).expect("polar");
        assert_eq!(mag.data()[0], 5.0);
        assert!((angle.data()[1] - std::f64::consts::PI).abs() < 1e-12);
        let (bx, by) = polar_to_cart(&mag, &angle, false).expect("cart");
        for (a, b) in bx.data().iter().zip(x.data()) {
            assert!((a - b).abs() < 1e-12);
        }
        for (a, b) in by.data().iter().zip(y.data()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn polar_functions_require_float() {
        let x = row(Depth::S16, &[1.0]);
        assert!(matches!(
            magnitude(&x, &x),
            Err(CoreError::UnsupportedDepth { op: "magnitude", .. })
        ));
        let y = row(Depth::F32, &[1.0, 2.0]);
        let x = row(Depth::F32, &[1.0]);
        assert!(matches!(
            phase(&x, &y, true),
            Err(CoreError::ShapeMismatch { .. })
        ));
    }
}
