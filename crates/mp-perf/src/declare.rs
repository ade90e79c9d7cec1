//! Seeded construction of case inputs.

use mp_dtype::MatType;
use mp_mat::{Mat, Scalar, Size};
use mp_random::{DeterministicRng, FillPolicy, fill_mat, random_scalar};

use crate::case::CaseError;

/// Owns the random stream of one case; reset to `seed` before every case.
#[derive(Debug, Clone)]
pub struct InputFactory {
    seed: u64,
    rng: DeterministicRng,
}

impl InputFactory {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: DeterministicRng::new(seed),
        }
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    pub fn reset(&mut self) {
        self.rng.reset(self.seed);
    }

    fn filled(&mut self, size: Size, mat_type: MatType, policy: FillPolicy) -> Result<Mat, CaseError> {
        let mut mat = Mat::zeros(size, mat_type)
            .map_err(|err| CaseError::Setup(format!("allocating {size} {mat_type}: {err}")))?;
        fill_mat(&mut self.rng, &mut mat, policy)
            .map_err(|err| CaseError::Setup(format!("filling {size} {mat_type}: {err}")))?;
        Ok(mat)
    }

    /// Warm-up fill: full range for integer depths, `[-4095, 4095)` for floats.
    pub fn declare_in(&mut self, size: Size, mat_type: MatType) -> Result<Mat, CaseError> {
        self.filled(size, mat_type, FillPolicy::Warmup)
    }

    /// Uniform over `[low, high)`, saturated to the depth.
    pub fn randu(
        &mut self,
        size: Size,
        mat_type: MatType,
        low: f64,
        high: f64,
    ) -> Result<Mat, CaseError> {
        self.filled(size, mat_type, FillPolicy::Range { low, high })
    }

    pub fn declare_scalar(&mut self) -> Result<Scalar, CaseError> {
        random_scalar(&mut self.rng)
            .map_err(|err| CaseError::Setup(format!("drawing scalar: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::InputFactory;
    use mp_dtype::{Depth, MatType};
    use mp_mat::Size;

    #[test]
    fn reset_replays_the_same_inputs() {
        let mut inputs = InputFactory::new(7);
        let first = inputs
            .declare_in(Size::new(16, 4), MatType::single(Depth::S16))
            .expect("declare");
        let _ = inputs.declare_scalar().expect("scalar");
        inputs.reset();
        let again = inputs
            .declare_in(Size::new(16, 4), MatType::single(Depth::S16))
            .expect("declare");
        assert_eq!(first, again);
    }

    #[test]
    fn randu_respects_bounds() {
        let mut inputs = InputFactory::new(3);
        let mat = inputs
            .randu(Size::new(64, 64), MatType::single(Depth::F32), 0.0, 10.0)
            .expect("randu");
        assert!(mat.data().iter().all(|&v| (0.0..=10.0).contains(&v)));
    }

    #[test]
    fn inverted_range_is_a_setup_error() {
        let mut inputs = InputFactory::new(3);
        let err = inputs
            .randu(Size::new(4, 4), MatType::single(Depth::F32), 5.0, 1.0)
            .expect_err("range");
        assert_eq!(err.reason_code(), "case_setup_failed");
    }
}
