//! Per-element math shared by the host library and the device runtime.

use mp_dtype::Depth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmOp {
    Add,
    Sub,
    Mul,
    Div,
    AbsDiff,
    Min,
    Max,
}

impl ArithmOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "subtract",
            Self::Mul => "multiply",
            Self::Div => "divide",
            Self::AbsDiff => "absdiff",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// `lhs op rhs`, saturated to `depth`.
    ///
    /// Integer division by zero yields zero.
    #[must_use]
    pub fn apply(self, lhs: f64, rhs: f64, depth: Depth) -> f64 {
        let raw = match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => {
                if rhs == 0.0 && depth.is_integer() {
                    0.0
                } else {
                    lhs / rhs
                }
            }
            Self::AbsDiff => (lhs - rhs).abs(),
            Self::Min => lhs.min(rhs),
            Self::Max => lhs.max(rhs),
        };
        depth.saturate(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Abs,
    Sqr,
    Sqrt,
    Log,
    Exp,
    Pow(f64),
}

impl UnaryOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Sqr => "sqr",
            Self::Sqrt => "sqrt",
            Self::Log => "log",
            Self::Exp => "exp",
            Self::Pow(_) => "pow",
        }
    }

    #[must_use]
    pub fn apply(self, x: f64, depth: Depth) -> f64 {
        let raw = match self {
            Self::Abs => x.abs(),
            Self::Sqr => x * x,
            Self::Sqrt => x.sqrt(),
            Self::Log => x.ln(),
            Self::Exp => x.exp(),
            Self::Pow(power) => pow(x, power),
        };
        depth.saturate(raw)
    }
}

/// Integral powers keep the sign of the base; fractional powers use `|x|`.
#[must_use]
pub fn pow(x: f64, power: f64) -> f64 {
    if power.fract() == 0.0 && power.abs() <= f64::from(i32::MAX) {
        x.powi(power as i32)
    } else {
        x.abs().powf(power)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

impl BitOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::And => "bitwise_and",
            Self::Or => "bitwise_or",
            Self::Xor => "bitwise_xor",
        }
    }

    #[must_use]
    pub fn apply(self, lhs: f64, rhs: f64, depth: Depth) -> f64 {
        let a = depth.to_bits(lhs);
        let b = depth.to_bits(rhs);
        let bits = match self {
            Self::And => a & b,
            Self::Or => a | b,
            Self::Xor => a ^ b,
        };
        depth.from_bits(bits)
    }
}

#[must_use]
pub fn bit_not(x: f64, depth: Depth) -> f64 {
    depth.from_bits(!depth.to_bits(x))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftOp {
    Left,
    Right,
}

impl ShiftOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Left => "lshift",
            Self::Right => "rshift",
        }
    }

    /// Right shifts are arithmetic for signed depths; left shifts wrap.
    #[must_use]
    pub fn apply(self, x: f64, shift: u32, depth: Depth) -> f64 {
        let bits = depth.to_bits(x);
        let shift = shift.min(63);
        let shifted = match self {
            Self::Left => bits.wrapping_shl(shift),
            Self::Right => bits >> shift,
        };
        depth.from_bits(shifted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpCode {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Ne,
}

impl CmpCode {
    pub const ALL: [Self; 6] = [Self::Eq, Self::Gt, Self::Ge, Self::Lt, Self::Le, Self::Ne];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "CMP_EQ",
            Self::Gt => "CMP_GT",
            Self::Ge => "CMP_GE",
            Self::Lt => "CMP_LT",
            Self::Le => "CMP_LE",
            Self::Ne => "CMP_NE",
        }
    }

    /// `255.0` when the comparison holds, `0.0` otherwise.
    #[must_use]
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        let holds = match self {
            Self::Eq => lhs == rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Ne => lhs != rhs,
        };
        if holds { 255.0 } else { 0.0 }
    }
}

impl std::fmt::Display for CmpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[must_use]
pub fn weighted(a: f64, alpha: f64, b: f64, beta: f64, gamma: f64, depth: Depth) -> f64 {
    depth.saturate(a * alpha + b * beta + gamma)
}

#[must_use]
pub fn magnitude(x: f64, y: f64, depth: Depth) -> f64 {
    depth.saturate(x.hypot(y))
}

#[must_use]
pub fn magnitude_sqr(x: f64, y: f64, depth: Depth) -> f64 {
    depth.saturate(x * x + y * y)
}

/// Angle of `(x, y)` in `[0, 2pi)`, or `[0, 360)` degrees.
#[must_use]
pub fn phase(x: f64, y: f64, degrees: bool, depth: Depth) -> f64 {
    let mut angle = y.atan2(x);
    if angle < 0.0 {
        angle += std::f64::consts::TAU;
    }
    if degrees {
        angle = angle.to_degrees();
    }
    depth.saturate(angle)
}

#[must_use]
pub fn polar_to_cart(magnitude: f64, angle: f64, degrees: bool, depth: Depth) -> (f64, f64) {
    let radians = if degrees { angle.to_radians() } else { angle };
    let (sin, cos) = radians.sin_cos();
    (
        depth.saturate(magnitude * cos),
        depth.saturate(magnitude * sin),
    )
}

#[cfg(test)]
mod tests {
    use super::{ArithmOp, BitOp, CmpCode, ShiftOp, UnaryOp, bit_not, phase, polar_to_cart, pow};
    use mp_dtype::Depth;

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(ArithmOp::Add.apply(200.0, 100.0, Depth::U8), 255.0);
        assert_eq!(ArithmOp::Sub.apply(10.0, 20.0, Depth::U16), 0.0);
        assert_eq!(ArithmOp::AbsDiff.apply(10.0, 20.0, Depth::U8), 10.0);
        assert_eq!(ArithmOp::Mul.apply(3.0, 0.5, Depth::U8), 2.0);
    }

    #[test]
    fn integer_division_by_zero_is_zero() {
        assert_eq!(ArithmOp::Div.apply(7.0, 0.0, Depth::U8), 0.0);
        assert_eq!(ArithmOp::Div.apply(7.0, 0.0, Depth::F64), f64::INFINITY);
        assert_eq!(ArithmOp::Div.apply(7.0, 2.0, Depth::S16), 4.0);
    }

    #[test]
    fn unary_ops() {
        assert_eq!(UnaryOp::Sqrt.apply(81.0, Depth::U8), 9.0);
        assert_eq!(UnaryOp::Sqr.apply(-3.0, Depth::S16), 9.0);
        assert_eq!(UnaryOp::Abs.apply(-32768.0, Depth::S16), 32767.0);
        assert_eq!(UnaryOp::Log.apply(0.0, Depth::S16), -32768.0);
        assert_eq!(UnaryOp::Exp.apply(10.0, Depth::U8), 255.0);
        assert_eq!(pow(-2.0, 3.0), -8.0);
        assert!((pow(-4.0, 0.5) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn bitwise_ops_follow_depth_width() {
        assert_eq!(BitOp::And.apply(0xF0 as f64, 0x3C as f64, Depth::U8), 0x30 as f64);
        assert_eq!(BitOp::Xor.apply(-1.0, 1.0, Depth::S32), -2.0);
        assert_eq!(bit_not(0.0, Depth::U16), 65535.0);
        assert_eq!(bit_not(0.0, Depth::S32), -1.0);
    }

    #[test]
    fn shifts() {
        assert_eq!(ShiftOp::Right.apply(255.0, 4, Depth::U8), 15.0);
        assert_eq!(ShiftOp::Left.apply(255.0, 4, Depth::U8), 240.0);
        assert_eq!(ShiftOp::Right.apply(-64.0, 4, Depth::S32), -4.0);
    }

    #[test]
    fn compare_produces_mask() {
        assert_eq!(CmpCode::Ge.apply(3.0, 3.0), 255.0);
        assert_eq!(CmpCode::Lt.apply(3.0, 3.0), 0.0);
        assert_eq!(CmpCode::Ne.to_string(), "CMP_NE");
    }

    #[test]
    fn polar_helpers() {
        let angle = phase(-1.0, 0.0, true, Depth::F64);
        assert!((angle - 180.0).abs() < 1e-12);
        assert!(phase(1.0, -1e-9, false, Depth::F64) > 6.0);
        let (x, y) = polar_to_cart(2.0, 90.0, true, Depth::F64);
        assert!(x.abs() < 1e-12);
        assert!((y - 2.0).abs() < 1e-12);
    }
}
