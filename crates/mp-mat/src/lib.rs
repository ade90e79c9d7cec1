#![forbid(unsafe_code)]

use mp_dtype::{Depth, MatType};

pub const SZ_VGA: Size = Size::new(640, 480);
pub const SZ_720P: Size = Size::new(1280, 720);
pub const SZ_SXGA: Size = Size::new(1280, 1024);
pub const SZ_1080P: Size = Size::new(1920, 1080);

pub const TYPICAL_MAT_SIZES: [Size; 3] = [SZ_720P, SZ_SXGA, SZ_1080P];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatError {
    Overflow,
    InvalidLength { expected: usize, actual: usize },
    SizeMismatch { lhs: Size, rhs: Size },
    TypeMismatch { lhs: MatType, rhs: MatType },
    IndexOutOfBounds { row: usize, col: usize, channel: usize },
    InvalidSizeToken(String),
}

impl MatError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Overflow => "mat_size_overflow",
            Self::InvalidLength { .. } => "mat_invalid_input_length",
            Self::SizeMismatch { .. } => "mat_size_mismatch",
            Self::TypeMismatch { .. } => "mat_type_mismatch",
            Self::IndexOutOfBounds { .. } => "mat_index_out_of_bounds",
            Self::InvalidSizeToken(_) => "mat_size_token_invalid",
        }
    }
}

impl std::fmt::Display for MatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overflow => write!(f, "size arithmetic overflow"),
            Self::InvalidLength { expected, actual } => {
                write!(f, "invalid data length expected={expected} actual={actual}")
            }
            Self::SizeMismatch { lhs, rhs } => write!(f, "size mismatch {lhs} vs {rhs}"),
            Self::TypeMismatch { lhs, rhs } => write!(f, "type mismatch {lhs} vs {rhs}"),
            Self::IndexOutOfBounds { row, col, channel } => {
                write!(f, "element ({row}, {col}, {channel}) out of bounds")
            }
            Self::InvalidSizeToken(token) => write!(f, "invalid size '{token}'"),
        }
    }
}

impl std::error::Error for MatError {}

/// Matrix extent as `width x height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    #[must_use]
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> Result<usize, MatError> {
        self.width
            .checked_mul(self.height)
            .ok_or(MatError::Overflow)
    }

    #[must_use]
    pub const fn transposed(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Parses `640x480`.
    pub fn parse(token: &str) -> Result<Self, MatError> {
        let invalid = || MatError::InvalidSizeToken(token.to_string());
        let (w, h) = token.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = w.trim().parse::<usize>().map_err(|_| invalid())?;
        let height = h.trim().parse::<usize>().map_err(|_| invalid())?;
        Ok(Self::new(width, height))
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

/// Four per-channel components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scalar(pub [f64; 4]);

impl Scalar {
    #[must_use]
    pub const fn all(value: f64) -> Self {
        Self([value; 4])
    }

    #[must_use]
    pub const fn new(v0: f64, v1: f64, v2: f64, v3: f64) -> Self {
        Self([v0, v1, v2, v3])
    }

    #[must_use]
    pub fn get(&self, channel: usize) -> f64 {
        self.0.get(channel).copied().unwrap_or(0.0)
    }

    /// Rounds every component to the nearest `i32`, as an integer scalar would.
    #[must_use]
    pub fn to_int(self) -> Self {
        Self(self.0.map(|v| {
            if v.is_nan() {
                0.0
            } else {
                v.round_ties_even().clamp(f64::from(i32::MIN), f64::from(i32::MAX))
            }
        }))
    }

    #[must_use]
    pub fn values(&self) -> &[f64; 4] {
        &self.0
    }
}

/// Dense row-major host matrix with interleaved channels.
///
/// Elements are held as `f64`; every constructor and producer saturates them
/// to the matrix depth, so the stored values are always representable.
#[derive(Debug, Clone, PartialEq)]
pub struct Mat {
    size: Size,
    mat_type: MatType,
    data: Vec<f64>,
}

impl Mat {
    pub fn zeros(size: Size, mat_type: MatType) -> Result<Self, MatError> {
        let len = element_count(size, mat_type)?;
        Ok(Self {
            size,
            mat_type,
            data: vec![0.0; len],
        })
    }

    pub fn new(size: Size, mat_type: MatType, data: Vec<f64>) -> Result<Self, MatError> {
        let expected = element_count(size, mat_type)?;
        if data.len() != expected {
            return Err(MatError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        let depth = mat_type.depth();
        let data = data.into_iter().map(|v| depth.saturate(v)).collect();
        Ok(Self {
            size,
            mat_type,
            data,
        })
    }

    /// Builds a matrix whose flat element `i` is `f(i)`, saturated.
    pub fn from_fn(
        size: Size,
        mat_type: MatType,
        mut f: impl FnMut(usize) -> f64,
    ) -> Result<Self, MatError> {
        let len = element_count(size, mat_type)?;
        let depth = mat_type.depth();
        let data = (0..len).map(|i| depth.saturate(f(i))).collect();
        Ok(Self {
            size,
            mat_type,
            data,
        })
    }

    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.size.height
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.size.width
    }

    #[must_use]
    pub const fn mat_type(&self) -> MatType {
        self.mat_type
    }

    #[must_use]
    pub const fn depth(&self) -> Depth {
        self.mat_type.depth()
    }

    #[must_use]
    pub const fn channels(&self) -> usize {
        self.mat_type.channels()
    }

    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of values in one row (`cols * channels`).
    #[must_use]
    pub const fn row_len(&self) -> usize {
        self.size.width * self.mat_type.channels()
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        let len = self.row_len();
        &self.data[row * len..(row + 1) * len]
    }

    pub fn at(&self, row: usize, col: usize, channel: usize) -> Result<f64, MatError> {
        let idx = self.offset(row, col, channel)?;
        Ok(self.data[idx])
    }

    /// Stores `value` saturated to the matrix depth.
    pub fn set(&mut self, row: usize, col: usize, channel: usize, value: f64) -> Result<(), MatError> {
        let idx = self.offset(row, col, channel)?;
        self.data[idx] = self.depth().saturate(value);
        Ok(())
    }

    /// Overwrites every element through `f(flat_index)`, saturating the result.
    pub fn fill_with(&mut self, mut f: impl FnMut(usize) -> f64) {
        let depth = self.depth();
        for (i, slot) in self.data.iter_mut().enumerate() {
            *slot = depth.saturate(f(i));
        }
    }

    /// Splits a flat index into `(row, col, channel)`.
    #[must_use]
    pub const fn unravel(&self, flat: usize) -> (usize, usize, usize) {
        let cn = self.mat_type.channels();
        let row_len = self.size.width * cn;
        if row_len == 0 {
            return (0, 0, 0);
        }
        let row = flat / row_len;
        let rem = flat % row_len;
        (row, rem / cn, rem % cn)
    }

    /// Copy saturated to `depth`, channels unchanged.
    #[must_use]
    pub fn convert_to(&self, depth: Depth) -> Self {
        Self {
            size: self.size,
            mat_type: self.mat_type.with_depth(depth),
            data: self.data.iter().map(|&v| depth.saturate(v)).collect(),
        }
    }

    /// Same type and size, values replaced.
    pub fn with_data(&self, data: Vec<f64>) -> Result<Self, MatError> {
        Self::new(self.size, self.mat_type, data)
    }

    pub fn ensure_same_layout(&self, other: &Self) -> Result<(), MatError> {
        if self.size != other.size {
            return Err(MatError::SizeMismatch {
                lhs: self.size,
                rhs: other.size,
            });
        }
        if self.mat_type != other.mat_type {
            return Err(MatError::TypeMismatch {
                lhs: self.mat_type,
                rhs: other.mat_type,
            });
        }
        Ok(())
    }

    fn offset(&self, row: usize, col: usize, channel: usize) -> Result<usize, MatError> {
        let cn = self.channels();
        if row >= self.rows() || col >= self.cols() || channel >= cn {
            return Err(MatError::IndexOutOfBounds { row, col, channel });
        }
        Ok((row * self.cols() + col) * cn + channel)
    }
}

pub fn element_count(size: Size, mat_type: MatType) -> Result<usize, MatError> {
    size.area()?
        .checked_mul(mat_type.channels())
        .ok_or(MatError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::{Mat, MatError, SZ_VGA, Scalar, Size, element_count};
    use mp_dtype::{Depth, MatType};

    #[test]
    fn size_parse_and_display() {
        let size = Size::parse("640x480").expect("size");
        assert_eq!(size, SZ_VGA);
        assert_eq!(size.to_string(), "640x480");
        assert_eq!(size.transposed(), Size::new(480, 640));
        assert!(matches!(
            Size::parse("640-480"),
            Err(MatError::InvalidSizeToken(_))
        ));
    }

    #[test]
    fn constructor_saturates_and_checks_length() {
        let ty = MatType::single(Depth::U8);
        let mat = Mat::new(Size::new(2, 1), ty, vec![-3.0, 400.0]).expect("mat");
        assert_eq!(mat.data(), &[0.0, 255.0]);

        let err = Mat::new(Size::new(2, 2), ty, vec![0.0; 3]).expect_err("length");
        assert_eq!(
            err,
            MatError::InvalidLength {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn interleaved_indexing() {
        let ty = MatType::new(Depth::S16, 3).expect("type");
        let mut mat = Mat::zeros(Size::new(4, 2), ty).expect("zeros");
        mat.set(1, 2, 1, 7.4).expect("set");
        assert_eq!(mat.at(1, 2, 1).expect("at"), 7.0);
        let flat = (4 + 2) * 3 + 1;
        assert_eq!(mat.data()[flat], 7.0);
        assert_eq!(mat.unravel(flat), (1, 2, 1));
        assert_eq!(mat.row(1).len(), 12);
        assert!(mat.at(2, 0, 0).is_err());
    }

    #[test]
    fn layout_checks() {
        let a = Mat::zeros(Size::new(3, 3), MatType::single(Depth::F32)).expect("a");
        let b = Mat::zeros(Size::new(3, 3), MatType::single(Depth::F64)).expect("b");
        assert!(matches!(
            a.ensure_same_layout(&b),
            Err(MatError::TypeMismatch { .. })
        ));
        assert_eq!(a.convert_to(Depth::F64), b);
    }

    #[test]
    fn scalar_to_int_rounds() {
        let s = Scalar::new(1.5, -2.5, 3.7, f64::NAN).to_int();
        assert_eq!(s.values(), &[2.0, -2.0, 4.0, 0.0]);
        assert_eq!(Scalar::all(3.0).get(7), 0.0);
    }

    #[test]
    fn element_count_overflow() {
        let huge = Size::new(usize::MAX, 2);
        assert_eq!(
            element_count(huge, MatType::single(Depth::U8)),
            Err(MatError::Overflow)
        );
    }
}
