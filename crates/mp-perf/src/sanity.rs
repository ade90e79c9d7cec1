//! Output values under verification and the tolerance they are compared with.

use mp_mat::{Mat, Point, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceMode {
    /// `|actual - expected| <= eps`
    Absolute,
    /// `|actual - expected| / max(|expected|, f64::MIN_POSITIVE) <= eps`
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub eps: f64,
    pub mode: ToleranceMode,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::absolute(f64::EPSILON)
    }
}

impl Tolerance {
    #[must_use]
    pub const fn absolute(eps: f64) -> Self {
        Self {
            eps,
            mode: ToleranceMode::Absolute,
        }
    }

    #[must_use]
    pub const fn relative(eps: f64) -> Self {
        Self {
            eps,
            mode: ToleranceMode::Relative,
        }
    }

    /// Error measure between the two values; zero for matching NaNs and
    /// equal infinities, infinite when only one side is NaN.
    #[must_use]
    pub fn error(&self, expected: f64, actual: f64) -> f64 {
        match (expected.is_nan(), actual.is_nan()) {
            (true, true) => return 0.0,
            (true, false) | (false, true) => return f64::INFINITY,
            (false, false) => {}
        }
        if expected == actual {
            return 0.0;
        }
        let diff = (actual - expected).abs();
        match self.mode {
            ToleranceMode::Absolute => diff,
            ToleranceMode::Relative => diff / expected.abs().max(f64::MIN_POSITIVE),
        }
    }

    #[must_use]
    pub fn accepts(&self, expected: f64, actual: f64) -> bool {
        self.error(expected, actual) <= self.eps
    }
}

impl std::fmt::Display for Tolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            ToleranceMode::Absolute => write!(f, "abs {:e}", self.eps),
            ToleranceMode::Relative => write!(f, "rel {:e}", self.eps),
        }
    }
}

/// One named output of a case, as seen by the verifier.
#[derive(Debug, Clone, PartialEq)]
pub enum SanityValue {
    Mat(Mat),
    Scalars(Vec<f64>),
}

impl SanityValue {
    /// Shape and type signature checked before any element.
    #[must_use]
    pub fn layout(&self) -> String {
        match self {
            Self::Mat(mat) => format!("{} {}", mat.size(), mat.mat_type()),
            Self::Scalars(values) => format!("scalars[{}]", values.len()),
        }
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        match self {
            Self::Mat(mat) => mat.data(),
            Self::Scalars(values) => values,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// `(row, col, channel)` for matrices, `[i]` for scalar lists.
    #[must_use]
    pub fn describe_index(&self, flat: usize) -> String {
        match self {
            Self::Mat(mat) => {
                let (row, col, channel) = mat.unravel(flat);
                format!("({row}, {col}, {channel})")
            }
            Self::Scalars(_) => format!("[{flat}]"),
        }
    }
}

impl From<Mat> for SanityValue {
    fn from(mat: Mat) -> Self {
        Self::Mat(mat)
    }
}

impl From<Scalar> for SanityValue {
    fn from(scalar: Scalar) -> Self {
        Self::Scalars(scalar.values().to_vec())
    }
}

impl From<f64> for SanityValue {
    fn from(value: f64) -> Self {
        Self::Scalars(vec![value])
    }
}

impl From<Point> for SanityValue {
    fn from(point: Point) -> Self {
        Self::Scalars(vec![point.x as f64, point.y as f64])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SanityFailure {
    Layout {
        arg: String,
        expected: String,
        actual: String,
    },
    Value {
        arg: String,
        index: String,
        expected: f64,
        actual: f64,
        error: f64,
        tolerance: Tolerance,
    },
}

impl std::fmt::Display for SanityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Layout {
                arg,
                expected,
                actual,
            } => write!(f, "argument '{arg}' layout {actual} differs from reference {expected}"),
            Self::Value {
                arg,
                index,
                expected,
                actual,
                error,
                tolerance,
            } => write!(
                f,
                "argument '{arg}' element {index}: expected {expected} actual {actual} error {error:e} exceeds {tolerance}"
            ),
        }
    }
}

pub fn check_layout(arg: &str, expected: &str, actual: &SanityValue) -> Result<(), SanityFailure> {
    let layout = actual.layout();
    if layout == expected {
        Ok(())
    } else {
        Err(SanityFailure::Layout {
            arg: arg.to_string(),
            expected: expected.to_string(),
            actual: layout,
        })
    }
}

pub fn check_value(
    arg: &str,
    index: impl FnOnce() -> String,
    expected: f64,
    actual: f64,
    tolerance: Tolerance,
) -> Result<(), SanityFailure> {
    let error = tolerance.error(expected, actual);
    if error <= tolerance.eps {
        return Ok(());
    }
    Err(SanityFailure::Value {
        arg: arg.to_string(),
        index: index(),
        expected,
        actual,
        error,
        tolerance,
    })
}

/// Element-by-element comparison of two complete values.
pub fn compare_values(
    arg: &str,
    expected: &SanityValue,
    actual: &SanityValue,
    tolerance: Tolerance,
) -> Result<(), SanityFailure> {
    check_layout(arg, &expected.layout(), actual)?;
    for (flat, (&e, &a)) in expected.values().iter().zip(actual.values()).enumerate() {
        check_value(arg, || actual.describe_index(flat), e, a, tolerance)?;
    }
    Ok(())
}
