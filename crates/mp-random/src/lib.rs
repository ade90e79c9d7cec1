#![forbid(unsafe_code)]

use mp_dtype::Depth;
use mp_mat::{Mat, Scalar};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const MIX_CONST1: u64 = 0xBF58_476D_1CE4_E5B9;
const MIX_CONST2: u64 = 0x94D0_49BB_1331_11EB;

pub const DEFAULT_PERF_SEED: u64 = 809_564;

/// Half-width of the warm-up fill range used for floating point depths.
pub const WARMUP_FLOAT_BOUND: f64 = 4095.0;

pub const RANDOM_REASON_CODES: [&str; 2] = ["random_upper_bound_rejected", "random_range_invalid"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RandomError {
    InvalidUpperBound,
    InvalidRange { low: f64, high: f64 },
}

impl RandomError {
    #[must_use]
    pub const fn reason_code(self) -> &'static str {
        match self {
            Self::InvalidUpperBound => "random_upper_bound_rejected",
            Self::InvalidRange { .. } => "random_range_invalid",
        }
    }
}

impl std::fmt::Display for RandomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUpperBound => write!(f, "upper_bound must be > 0"),
            Self::InvalidRange { low, high } => {
                write!(f, "range [{low}, {high}) must be finite and non-empty")
            }
        }
    }
}

impl std::error::Error for RandomError {}

/// Counter-based splitmix stream; the same seed always yields the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicRng {
    stream_seed: u64,
    counter: u64,
}

impl DeterministicRng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            stream_seed: seed,
            counter: 0,
        }
    }

    #[must_use]
    pub const fn state(self) -> (u64, u64) {
        (self.stream_seed, self.counter)
    }

    /// Rewinds the stream to its first value.
    pub fn reset(&mut self, seed: u64) {
        self.stream_seed = seed;
        self.counter = 0;
    }

    pub fn jump_ahead(&mut self, steps: u64) {
        self.counter = self.counter.wrapping_add(steps);
    }

    #[must_use]
    pub fn next_u64(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(1);
        splitmix64(
            self.stream_seed
                .wrapping_add(self.counter.wrapping_mul(GOLDEN_GAMMA)),
        )
    }

    #[must_use]
    pub fn next_f64(&mut self) -> f64 {
        // high 53 bits -> [0, 1)
        let sample = self.next_u64() >> 11;
        sample as f64 / (1u64 << 53) as f64
    }

    pub fn bounded_u64(&mut self, upper_bound: u64) -> Result<u64, RandomError> {
        if upper_bound == 0 {
            return Err(RandomError::InvalidUpperBound);
        }

        let threshold = u64::MAX - u64::MAX % upper_bound;

        loop {
            let candidate = self.next_u64();
            if candidate < threshold {
                return Ok(candidate % upper_bound);
            }
        }
    }

    /// Uniform sample in `[low, high)`.
    pub fn uniform(&mut self, low: f64, high: f64) -> Result<f64, RandomError> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(RandomError::InvalidRange { low, high });
        }
        let value = low + (high - low) * self.next_f64();
        // rounding can land exactly on `high` for wide ranges
        Ok(if value < high { value } else { low })
    }

    /// Uniform integer over the whole representable range of an integer depth.
    pub fn integer_in_depth(&mut self, depth: Depth) -> Result<f64, RandomError> {
        let low = depth.min_value() as i64;
        let high = depth.max_value() as i64;
        let span = u64::try_from(high - low + 1).map_err(|_| RandomError::InvalidUpperBound)?;
        let offset = self.bounded_u64(span)?;
        Ok((low + offset as i64) as f64)
    }

    #[must_use]
    pub fn fill_u64(&mut self, len: usize) -> Vec<u64> {
        (0..len).map(|_| self.next_u64()).collect()
    }
}

/// How an input buffer is populated before a case runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillPolicy {
    /// Integer depths over their full range, float depths over
    /// `[-WARMUP_FLOAT_BOUND, WARMUP_FLOAT_BOUND)`.
    Warmup,
    /// Uniform over `[low, high)`, saturated to the depth afterwards.
    Range { low: f64, high: f64 },
}

pub fn fill_mat(rng: &mut DeterministicRng, mat: &mut Mat, policy: FillPolicy) -> Result<(), RandomError> {
    let depth = mat.depth();
    let mut values = Vec::with_capacity(mat.len());
    for _ in 0..mat.len() {
        values.push(sample(rng, depth, policy)?);
    }
    let mut iter = values.into_iter();
    mat.fill_with(|_| iter.next().unwrap_or(0.0));
    Ok(())
}

/// Random four-component scalar drawn like a `64F` warm-up fill.
pub fn random_scalar(rng: &mut DeterministicRng) -> Result<Scalar, RandomError> {
    let mut out = [0.0; 4];
    for slot in &mut out {
        *slot = rng.uniform(-WARMUP_FLOAT_BOUND, WARMUP_FLOAT_BOUND)?;
    }
    Ok(Scalar(out))
}

fn sample(rng: &mut DeterministicRng, depth: Depth, policy: FillPolicy) -> Result<f64, RandomError> {
    match policy {
        FillPolicy::Warmup if depth.is_integer() => rng.integer_in_depth(depth),
        FillPolicy::Warmup => rng.uniform(-WARMUP_FLOAT_BOUND, WARMUP_FLOAT_BOUND),
        FillPolicy::Range { low, high } => rng.uniform(low, high),
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(MIX_CONST1);
    x ^= x >> 27;
    x = x.wrapping_mul(MIX_CONST2);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_PERF_SEED, DeterministicRng, FillPolicy, RandomError, WARMUP_FLOAT_BOUND,
        fill_mat, random_scalar,
    };
    use mp_dtype::{Depth, MatType};
    use mp_mat::{Mat, Size};

    #[test]
    fn same_seed_same_stream() {
        let mut a = DeterministicRng::new(DEFAULT_PERF_SEED);
        let mut b = DeterministicRng::new(DEFAULT_PERF_SEED);
        assert_eq!(a.fill_u64(16), b.fill_u64(16));

        let mut c = DeterministicRng::new(DEFAULT_PERF_SEED + 1);
        let mut a = DeterministicRng::new(DEFAULT_PERF_SEED);
        assert_ne!(a.fill_u64(4), c.fill_u64(4));
    }

    #[test]
    fn reset_rewinds_stream() {
        let mut rng = DeterministicRng::new(7);
        let first = rng.next_u64();
        rng.jump_ahead(10);
        rng.reset(7);
        assert_eq!(rng.next_u64(), first);
        assert_eq!(rng.state(), (7, 1));
    }

    #[test]
    fn uniform_rejects_bad_ranges() {
        let mut rng = DeterministicRng::new(1);
        assert!(matches!(
            rng.uniform(5.0, 5.0),
            Err(RandomError::InvalidRange { .. })
        ));
        assert!(rng.uniform(0.0, f64::INFINITY).is_err());
        assert_eq!(
            rng.bounded_u64(0).expect_err("zero bound").reason_code(),
            "random_upper_bound_rejected"
        );
    }

    #[test]
    fn warmup_covers_integer_range() {
        let mut rng = DeterministicRng::new(3);
        let mut mat = Mat::zeros(Size::new(64, 64), MatType::single(Depth::S16)).expect("mat");
        fill_mat(&mut rng, &mut mat, FillPolicy::Warmup).expect("fill");
        let min = mat.data().iter().copied().fold(f64::INFINITY, f64::min);
        let max = mat.data().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(min < -16_000.0);
        assert!(max > 16_000.0);
        assert!(mat.data().iter().all(|v| v.fract() == 0.0));
    }

    #[test]
    fn warmup_float_bound() {
        let mut rng = DeterministicRng::new(3);
        let mut mat = Mat::zeros(Size::new(32, 32), MatType::single(Depth::F32)).expect("mat");
        fill_mat(&mut rng, &mut mat, FillPolicy::Warmup).expect("fill");
        assert!(
            mat.data()
                .iter()
                .all(|v| (-WARMUP_FLOAT_BOUND..=WARMUP_FLOAT_BOUND).contains(v))
        );
    }

    #[test]
    fn range_fill_never_leaves_range() {
        let mut rng = DeterministicRng::new(11);
        let mut mat = Mat::zeros(Size::new(100, 50), MatType::single(Depth::F32)).expect("mat");
        let policy = FillPolicy::Range {
            low: 0.0,
            high: 100_000.0,
        };
        fill_mat(&mut rng, &mut mat, policy).expect("fill");
        assert!(mat.data().iter().all(|&v| (0.0..=100_000.0).contains(&v)));
    }

    #[test]
    fn random_scalar_is_seeded() {
        let mut a = DeterministicRng::new(5);
        let mut b = DeterministicRng::new(5);
        let sa = random_scalar(&mut a).expect("scalar");
        assert_eq!(sa, random_scalar(&mut b).expect("scalar"));
        assert!(sa.values().iter().all(|v| v.abs() <= WARMUP_FLOAT_BOUND));
    }
}
