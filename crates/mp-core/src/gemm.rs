//! Generalized matrix multiply: `alpha * op(A) * op(B) + beta * op(C)`.
//!
//! Two-channel matrices are complex numbers stored as `(re, im)`. Transposes
//! are plain (not conjugate).

use mp_dtype::MatType;
use mp_mat::{Mat, Size, element_count};

use crate::{CoreError, require_float};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GemmFlags(u8);

impl GemmFlags {
    pub const NONE: Self = Self(0);
    pub const A_T: Self = Self(1);
    pub const B_T: Self = Self(2);
    pub const C_T: Self = Self(4);

    /// The flag combinations measured by the perf suite.
    pub const MEASURED: [Self; 7] = [
        Self::NONE,
        Self::A_T,
        Self::B_T,
        Self::C_T,
        Self(1 | 2),
        Self(1 | 4),
        Self(1 | 2 | 4),
    ];

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for GemmFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::fmt::Display for GemmFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            return f.write_str("0");
        }
        let names: Vec<&str> = [
            (Self::A_T, "GEMM_1_T"),
            (Self::B_T, "GEMM_2_T"),
            (Self::C_T, "GEMM_3_T"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
        f.write_str(&names.join("|"))
    }
}

/// Element accessor `(row, col, channel) -> value` over a stored operand.
pub type Operand<'a> = &'a (dyn Fn(usize, usize, usize) -> f64 + Sync);

/// Validated dimensions of one multiply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GemmPlan {
    m: usize,
    n: usize,
    k: usize,
    mat_type: MatType,
    flags: GemmFlags,
    alpha: f64,
    beta: f64,
    has_c: bool,
}

impl GemmPlan {
    pub fn new(
        a: (Size, MatType),
        b: (Size, MatType),
        c: Option<(Size, MatType)>,
        alpha: f64,
        beta: f64,
        flags: GemmFlags,
    ) -> Result<Self, CoreError> {
        let (a_size, mat_type) = a;
        let depth = mat_type.depth();
        if !depth.is_float() {
            return Err(CoreError::UnsupportedDepth { op: "gemm", depth });
        }
        if mat_type.channels() > 2 {
            return Err(CoreError::UnsupportedChannels {
                op: "gemm",
                channels: mat_type.channels(),
            });
        }
        let check_type = |ty: MatType| {
            if ty == mat_type {
                Ok(())
            } else {
                Err(CoreError::ShapeMismatch {
                    op: "gemm",
                    detail: format!("operand type {ty} differs from {mat_type}"),
                })
            }
        };
        check_type(b.1)?;

        let (m, k) = oriented(a_size, flags.contains(GemmFlags::A_T));
        let (k2, n) = oriented(b.0, flags.contains(GemmFlags::B_T));
        if k != k2 {
            return Err(CoreError::ShapeMismatch {
                op: "gemm",
                detail: format!("inner dimensions {k} vs {k2}"),
            });
        }
        if let Some((c_size, c_type)) = c {
            check_type(c_type)?;
            let (cm, cn) = oriented(c_size, flags.contains(GemmFlags::C_T));
            if (cm, cn) != (m, n) {
                return Err(CoreError::ShapeMismatch {
                    op: "gemm",
                    detail: format!("addend is {cm}x{cn}, product is {m}x{n}"),
                });
            }
        }
        Ok(Self {
            m,
            n,
            k,
            mat_type,
            flags,
            alpha,
            beta,
            has_c: c.is_some(),
        })
    }

    #[must_use]
    pub const fn output_size(&self) -> Size {
        Size::new(self.n, self.m)
    }

    #[must_use]
    pub const fn output_type(&self) -> MatType {
        self.mat_type
    }

    /// Computes output row `i` into `out` (`n * channels` values).
    pub fn compute_row(&self, i: usize, a: Operand<'_>, b: Operand<'_>, c: Option<Operand<'_>>, out: &mut [f64]) {
        let complex = self.mat_type.channels() == 2;
        let depth = self.mat_type.depth();
        let a_t = self.flags.contains(GemmFlags::A_T);
        let b_t = self.flags.contains(GemmFlags::B_T);
        let c_t = self.flags.contains(GemmFlags::C_T);
        let at = |row: usize, col: usize, ch: usize| if a_t { a(col, row, ch) } else { a(row, col, ch) };
        let bt = |row: usize, col: usize, ch: usize| if b_t { b(col, row, ch) } else { b(row, col, ch) };

        for j in 0..self.n {
            let (mut re, mut im) = (0.0, 0.0);
            for p in 0..self.k {
                if complex {
                    let (ar, ai) = (at(i, p, 0), at(i, p, 1));
                    let (br, bi) = (bt(p, j, 0), bt(p, j, 1));
                    re += ar * br - ai * bi;
                    im += ar * bi + ai * br;
                } else {
                    re += at(i, p, 0) * bt(p, j, 0);
                }
            }
            let mut values = [self.alpha * re, self.alpha * im];
            if let (true, Some(c)) = (self.has_c, c) {
                for (ch, value) in values.iter_mut().enumerate().take(self.mat_type.channels()) {
                    let addend = if c_t { c(j, i, ch) } else { c(i, j, ch) };
                    *value += self.beta * addend;
                }
            }
            let cn = self.mat_type.channels();
            for ch in 0..cn {
                out[j * cn + ch] = depth.saturate(values[ch]);
            }
        }
    }
}

fn oriented(size: Size, transposed: bool) -> (usize, usize) {
    if transposed {
        (size.width, size.height)
    } else {
        (size.height, size.width)
    }
}

fn dense(mat: &Mat) -> impl Fn(usize, usize, usize) -> f64 + Sync + '_ {
    let cols = mat.cols();
    let cn = mat.channels();
    let data = mat.data();
    move |row, col, ch| data[(row * cols + col) * cn + ch]
}

pub fn gemm(
    a: &Mat,
    b: &Mat,
    alpha: f64,
    c: Option<&Mat>,
    beta: f64,
    flags: GemmFlags,
) -> Result<Mat, CoreError> {
    require_float("gemm", a)?;
    let plan = GemmPlan::new(
        (a.size(), a.mat_type()),
        (b.size(), b.mat_type()),
        c.map(|m| (m.size(), m.mat_type())),
        alpha,
        beta,
        flags,
    )?;
    let size = plan.output_size();
    let mat_type = plan.output_type();
    let a_at = dense(a);
    let b_at = dense(b);
    let c_at = c.map(dense);
    let row_len = size.width * mat_type.channels();
    let mut data = vec![0.0; element_count(size, mat_type)?];
    if row_len > 0 {
        for (i, row) in data.chunks_mut(row_len).enumerate() {
            plan.compute_row(i, &a_at, &b_at, c_at.as_ref().map(|f| f as Operand<'_>), row);
        }
    }
    Ok(Mat::new(size, mat_type, data)?)
}
