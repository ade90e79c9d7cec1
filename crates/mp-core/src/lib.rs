#![forbid(unsafe_code)]

//! Host implementations of the matrix primitives measured by the perf suite.
//!
//! Every operation validates its operands, computes in `f64` and saturates to
//! the destination depth. Per-element math lives in [`kernels`] so the device
//! runtime computes exactly the same values.

pub mod arithm;
pub mod bitwise;
pub mod gemm;
pub mod kernels;
pub mod layout;
pub mod math;
pub mod reduce;

use mp_dtype::{Depth, DepthError};
use mp_mat::{Mat, MatError};

pub use gemm::GemmFlags;
pub use kernels::{ArithmOp, BitOp, CmpCode, ShiftOp, UnaryOp};
pub use layout::FlipCode;
pub use reduce::{NormType, ReduceDim, ReduceOp};

pub const CORE_REASON_CODES: [&str; 7] = [
    "core_mat_contract_violation",
    "core_type_contract_violation",
    "core_unsupported_depth",
    "core_unsupported_channels",
    "core_shape_mismatch",
    "core_empty_input",
    "core_invalid_argument",
];

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    Mat(MatError),
    Type(DepthError),
    UnsupportedDepth { op: &'static str, depth: Depth },
    UnsupportedChannels { op: &'static str, channels: usize },
    ShapeMismatch { op: &'static str, detail: String },
    EmptyInput { op: &'static str },
    InvalidArgument { op: &'static str, detail: String },
}

impl CoreError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Mat(_) => "core_mat_contract_violation",
            Self::Type(_) => "core_type_contract_violation",
            Self::UnsupportedDepth { .. } => "core_unsupported_depth",
            Self::UnsupportedChannels { .. } => "core_unsupported_channels",
            Self::ShapeMismatch { .. } => "core_shape_mismatch",
            Self::EmptyInput { .. } => "core_empty_input",
            Self::InvalidArgument { .. } => "core_invalid_argument",
        }
    }
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mat(err) => write!(f, "matrix error: {err}"),
            Self::Type(err) => write!(f, "type error: {err}"),
            Self::UnsupportedDepth { op, depth } => {
                write!(f, "{op}: depth {depth} is not supported")
            }
            Self::UnsupportedChannels { op, channels } => {
                write!(f, "{op}: {channels} channel(s) not supported")
            }
            Self::ShapeMismatch { op, detail } => write!(f, "{op}: shape mismatch: {detail}"),
            Self::EmptyInput { op } => write!(f, "{op}: empty input"),
            Self::InvalidArgument { op, detail } => write!(f, "{op}: {detail}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<MatError> for CoreError {
    fn from(err: MatError) -> Self {
        Self::Mat(err)
    }
}

impl From<DepthError> for CoreError {
    fn from(err: DepthError) -> Self {
        Self::Type(err)
    }
}

pub(crate) fn require_integer(op: &'static str, mat: &Mat) -> Result<(), CoreError> {
    if mat.depth().is_integer() {
        Ok(())
    } else {
        Err(CoreError::UnsupportedDepth {
            op,
            depth: mat.depth(),
        })
    }
}

pub(crate) fn require_float(op: &'static str, mat: &Mat) -> Result<(), CoreError> {
    if mat.depth().is_float() {
        Ok(())
    } else {
        Err(CoreError::UnsupportedDepth {
            op,
            depth: mat.depth(),
        })
    }
}

pub(crate) fn require_channels(op: &'static str, mat: &Mat, channels: usize) -> Result<(), CoreError> {
    if mat.channels() == channels {
        Ok(())
    } else {
        Err(CoreError::UnsupportedChannels {
            op,
            channels: mat.channels(),
        })
    }
}

pub(crate) fn require_non_empty(op: &'static str, mat: &Mat) -> Result<(), CoreError> {
    if mat.is_empty() {
        Err(CoreError::EmptyInput { op })
    } else {
        Ok(())
    }
}

pub(crate) fn require_same_layout(op: &'static str, lhs: &Mat, rhs: &Mat) -> Result<(), CoreError> {
    lhs.ensure_same_layout(rhs).map_err(|err| CoreError::ShapeMismatch {
        op,
        detail: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{CORE_REASON_CODES, CoreError};
    use mp_dtype::Depth;
    use mp_mat::MatError;

    #[test]
    fn reason_codes_are_in_vocabulary() {
        let errors = [
            CoreError::Mat(MatError::Overflow),
            CoreError::UnsupportedDepth {
                op: "bitwise_not",
                depth: Depth::F32,
            },
            CoreError::EmptyInput { op: "min_max" },
            CoreError::InvalidArgument {
                op: "lut",
                detail: "x".to_string(),
            },
        ];
        for err in errors {
            assert!(CORE_REASON_CODES.contains(&err.reason_code()), "{err}");
        }
    }

    #[test]
    fn display_names_the_operation() {
        let err = CoreError::UnsupportedChannels {
            op: "phase",
            channels: 3,
        };
        assert_eq!(err.to_string(), "phase: 3 channel(s) not supported");
    }
}
