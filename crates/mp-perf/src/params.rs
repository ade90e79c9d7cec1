//! Parameter values, dimensions and their Cartesian product.

use mp_core::{CmpCode, FlipCode, GemmFlags, NormType, ReduceDim, ReduceOp};
use mp_dtype::{Depth, MatType};
use mp_mat::Size;

pub const PARAM_REASON_CODES: [&str; 2] = ["param_index_missing", "param_kind_mismatch"];

/// One value of one parameter dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Size(Size),
    Depth(Depth),
    Type(MatType),
    Channels(usize),
    Float(f64),
    Cmp(CmpCode),
    Gemm(GemmFlags),
    Flip(FlipCode),
    Norm(NormType),
    ReduceOp(ReduceOp),
    ReduceDim(ReduceDim),
    Flag(bool),
}

impl ParamValue {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Size(_) => "size",
            Self::Depth(_) => "depth",
            Self::Type(_) => "type",
            Self::Channels(_) => "channels",
            Self::Float(_) => "float",
            Self::Cmp(_) => "cmp",
            Self::Gemm(_) => "gemm_flags",
            Self::Flip(_) => "flip",
            Self::Norm(_) => "norm",
            Self::ReduceOp(_) => "reduce_op",
            Self::ReduceDim(_) => "reduce_dim",
            Self::Flag(_) => "flag",
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Size(v) => write!(f, "{v}"),
            Self::Depth(v) => write!(f, "{v}"),
            Self::Type(v) => write!(f, "{v}"),
            Self::Channels(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Cmp(v) => write!(f, "{v}"),
            Self::Gemm(v) => write!(f, "{v}"),
            Self::Flip(v) => write!(f, "{v}"),
            Self::Norm(v) => write!(f, "{v}"),
            Self::ReduceOp(v) => write!(f, "{v}"),
            Self::ReduceDim(v) => write!(f, "{v}"),
            Self::Flag(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! impl_from_param {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_param! {
    Size => Size,
    Depth => Depth,
    MatType => Type,
    usize => Channels,
    f64 => Float,
    CmpCode => Cmp,
    GemmFlags => Gemm,
    FlipCode => Flip,
    NormType => Norm,
    ReduceOp => ReduceOp,
    ReduceDim => ReduceDim,
    bool => Flag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    Missing {
        index: usize,
        len: usize,
    },
    WrongKind {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
}

impl ParamError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "param_index_missing",
            Self::WrongKind { .. } => "param_kind_mismatch",
        }
    }
}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { index, len } => {
                write!(f, "parameter {index} missing from tuple of {len}")
            }
            Self::WrongKind {
                index,
                expected,
                actual,
            } => write!(f, "parameter {index} is {actual}, expected {expected}"),
        }
    }
}

impl std::error::Error for ParamError {}

/// Ordered values of one parameter; duplicates keep their first position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimension {
    values: Vec<ParamValue>,
}

impl Dimension {
    pub fn new<T, I>(values: I) -> Self
    where
        T: Into<ParamValue>,
        I: IntoIterator<Item = T>,
    {
        let mut unique: Vec<ParamValue> = Vec::new();
        for value in values.into_iter().map(Into::into) {
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        Self { values: unique }
    }

    #[must_use]
    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Immutable parameter combination handed to one case instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTuple {
    values: Vec<ParamValue>,
}

impl ParamTuple {
    #[must_use]
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&ParamValue, ParamError> {
        self.values.get(index).ok_or(ParamError::Missing {
            index,
            len: self.values.len(),
        })
    }

    /// `"{test}::(v0, v1, ...)"`.
    #[must_use]
    pub fn instance_name(&self, test: &str) -> String {
        let rendered: Vec<String> = self.values.iter().map(ToString::to_string).collect();
        format!("{test}::({})", rendered.join(", "))
    }

    fn pick<T>(
        &self,
        index: usize,
        expected: &'static str,
        extract: impl FnOnce(&ParamValue) -> Option<T>,
    ) -> Result<T, ParamError> {
        let value = self.get(index)?;
        extract(value).ok_or(ParamError::WrongKind {
            index,
            expected,
            actual: value.kind(),
        })
    }

    pub fn size(&self, index: usize) -> Result<Size, ParamError> {
        self.pick(index, "size", |v| match v {
            ParamValue::Size(s) => Some(*s),
            _ => None,
        })
    }

    pub fn depth(&self, index: usize) -> Result<Depth, ParamError> {
        self.pick(index, "depth", |v| match v {
            ParamValue::Depth(d) => Some(*d),
            _ => None,
        })
    }

    pub fn mat_type(&self, index: usize) -> Result<MatType, ParamError> {
        self.pick(index, "type", |v| match v {
            ParamValue::Type(t) => Some(*t),
            _ => None,
        })
    }

    pub fn channels(&self, index: usize) -> Result<usize, ParamError> {
        self.pick(index, "channels", |v| match v {
            ParamValue::Channels(cn) => Some(*cn),
            _ => None,
        })
    }

    pub fn float(&self, index: usize) -> Result<f64, ParamError> {
        self.pick(index, "float", |v| match v {
            ParamValue::Float(x) => Some(*x),
            _ => None,
        })
    }

    pub fn cmp(&self, index: usize) -> Result<CmpCode, ParamError> {
        self.pick(index, "cmp", |v| match v {
            ParamValue::Cmp(c) => Some(*c),
            _ => None,
        })
    }

    pub fn gemm_flags(&self, index: usize) -> Result<GemmFlags, ParamError> {
        self.pick(index, "gemm_flags", |v| match v {
            ParamValue::Gemm(g) => Some(*g),
            _ => None,
        })
    }

    pub fn flip(&self, index: usize) -> Result<FlipCode, ParamError> {
        self.pick(index, "flip", |v| match v {
            ParamValue::Flip(c) => Some(*c),
            _ => None,
        })
    }

    pub fn norm(&self, index: usize) -> Result<NormType, ParamError> {
        self.pick(index, "norm", |v| match v {
            ParamValue::Norm(n) => Some(*n),
            _ => None,
        })
    }

    pub fn reduce_op(&self, index: usize) -> Result<ReduceOp, ParamError> {
        self.pick(index, "reduce_op", |v| match v {
            ParamValue::ReduceOp(op) => Some(*op),
            _ => None,
        })
    }

    pub fn reduce_dim(&self, index: usize) -> Result<ReduceDim, ParamError> {
        self.pick(index, "reduce_dim", |v| match v {
            ParamValue::ReduceDim(dim) => Some(*dim),
            _ => None,
        })
    }

    pub fn flag(&self, index: usize) -> Result<bool, ParamError> {
        self.pick(index, "flag", |v| match v {
            ParamValue::Flag(b) => Some(*b),
            _ => None,
        })
    }
}

/// Every combination of a list of dimensions, last dimension varying fastest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSpace {
    tuples: Vec<ParamTuple>,
}

impl ParamSpace {
    /// An empty dimension yields an empty space; no dimensions yield one
    /// empty tuple.
    #[must_use]
    pub fn combine(dims: Vec<Dimension>) -> Self {
        let mut partial: Vec<Vec<ParamValue>> = vec![Vec::new()];
        for dim in &dims {
            let mut next = Vec::with_capacity(partial.len() * dim.len());
            for prefix in &partial {
                for value in dim.values() {
                    let mut tuple = Vec::with_capacity(prefix.len() + 1);
                    tuple.extend_from_slice(prefix);
                    tuple.push(*value);
                    next.push(tuple);
                }
            }
            partial = next;
        }
        Self {
            tuples: partial.into_iter().map(ParamTuple::new).collect(),
        }
    }

    #[must_use]
    pub fn tuples(&self) -> &[ParamTuple] {
        &self.tuples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Dimension, ParamError, ParamSpace, ParamTuple, ParamValue};
    use mp_core::CmpCode;
    use mp_dtype::{Depth, MatType};
    use mp_mat::{SZ_720P, SZ_VGA, Size};

    #[test]
    fn product_varies_last_dimension_fastest() {
        let space = ParamSpace::combine(vec![
            Dimension::new([SZ_VGA, SZ_720P]),
            Dimension::new([Depth::U8, Depth::F32, Depth::F64]),
        ]);
        assert_eq!(space.len(), 6);
        let names: Vec<String> = space
            .tuples()
            .iter()
            .map(|t| t.instance_name("Core_AddMat"))
            .collect();
        assert_eq!(names[0], "Core_AddMat::(640x480, 8U)");
        assert_eq!(names[1], "Core_AddMat::(640x480, 32F)");
        assert_eq!(names[3], "Core_AddMat::(1280x720, 8U)");
        assert_eq!(names[5], "Core_AddMat::(1280x720, 64F)");
    }

    #[test]
    fn empty_dimension_yields_no_instances() {
        let space = ParamSpace::combine(vec![
            Dimension::new([SZ_VGA]),
            Dimension::new(Vec::<Depth>::new()),
        ]);
        assert!(space.is_empty());
    }

    #[test]
    fn no_dimensions_yield_one_empty_tuple() {
        let space = ParamSpace::combine(Vec::new());
        assert_eq!(space.len(), 1);
        assert!(space.tuples()[0].is_empty());
        assert_eq!(space.tuples()[0].instance_name("Core_MeanStdDev"), "Core_MeanStdDev::()");
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let dim = Dimension::new([3usize, 1, 3, 4, 1]);
        assert_eq!(
            dim.values(),
            &[
                ParamValue::Channels(3),
                ParamValue::Channels(1),
                ParamValue::Channels(4)
            ]
        );
    }

    #[test]
    fn accessors_reject_missing_and_mismatched_values() {
        let tuple = ParamTuple::new(vec![
            Size::new(4, 2).into(),
            MatType::new(Depth::U16, 2).expect("type").into(),
            CmpCode::Ge.into(),
            0.3.into(),
        ]);
        assert_eq!(tuple.size(0).expect("size"), Size::new(4, 2));
        assert_eq!(tuple.mat_type(1).expect("type").channels(), 2);
        assert_eq!(tuple.cmp(2).expect("cmp"), CmpCode::Ge);
        assert!((tuple.float(3).expect("float") - 0.3).abs() < f64::EPSILON);
        assert_eq!(
            tuple.depth(0).expect_err("kind"),
            ParamError::WrongKind {
                index: 0,
                expected: "depth",
                actual: "size"
            }
        );
        let missing = tuple.flag(9).expect_err("missing");
        assert_eq!(missing.reason_code(), "param_index_missing");
    }

    #[test]
    fn names_render_every_kind() {
        let tuple = ParamTuple::new(vec![
            true.into(),
            mp_core::GemmFlags::A_T.into(),
            mp_core::FlipCode::X.into(),
            mp_core::NormType::L2.into(),
            mp_core::ReduceOp::Avg.into(),
            mp_core::ReduceDim::Cols.into(),
        ]);
        assert_eq!(
            tuple.instance_name("t"),
            "t::(true, GEMM_1_T, FLIP_X, NORM_L2, REDUCE_AVG, Cols)"
        );
    }
}
