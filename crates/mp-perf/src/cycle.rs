//! Timed execution cycle and sample statistics.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_WARMUP_RUNS: usize = 1;
pub const DEFAULT_MIN_SAMPLES: usize = 10;
pub const DEFAULT_MAX_SAMPLES: usize = 100;
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(3);

/// When the cycle stops sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPolicy {
    pub warmup_runs: usize,
    pub min_samples: usize,
    pub max_samples: usize,
    pub time_limit: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            warmup_runs: DEFAULT_WARMUP_RUNS,
            min_samples: DEFAULT_MIN_SAMPLES,
            max_samples: DEFAULT_MAX_SAMPLES,
            time_limit: DEFAULT_TIME_LIMIT,
        }
    }
}

impl TimingPolicy {
    /// `min_samples >= 1` and `max_samples >= min_samples`.
    #[must_use]
    pub fn normalized(self) -> Self {
        let min_samples = self.min_samples.max(1);
        Self {
            min_samples,
            max_samples: self.max_samples.max(min_samples),
            ..self
        }
    }

    #[must_use]
    pub fn with_time_limit(self, time_limit: Duration) -> Self {
        Self { time_limit, ..self }
    }

    #[must_use]
    pub fn should_stop(&self, taken: usize, elapsed: Duration) -> bool {
        taken >= self.max_samples || (taken >= self.min_samples && elapsed >= self.time_limit)
    }
}

/// Ordered per-invocation durations of one case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingSamples {
    samples: Vec<Duration>,
}

impl TimingSamples {
    pub fn push(&mut self, sample: Duration) {
        self.samples.push(sample);
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Duration] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.samples.iter().sum()
    }

    #[must_use]
    pub fn summary(&self) -> TimingSummary {
        let ms: Vec<f64> = self
            .samples
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        summarize_samples(&ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    pub samples: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub gmean_ms: f64,
    pub stddev_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

fn percentile_index(len: usize, percentile_num: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    (last * percentile_num + 50) / 100
}

pub fn summarize_samples(samples: &[f64]) -> TimingSummary {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let at = |p: usize| sorted.get(percentile_index(n, p)).copied().unwrap_or(0.0);

    let (mean_ms, gmean_ms, stddev_ms) = if n == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let count = n as f64;
        let mean = sorted.iter().sum::<f64>() / count;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        // zero-length samples are clamped so the log stays finite
        let log_sum: f64 = sorted.iter().map(|v| v.max(1e-9).ln()).sum();
        (mean, (log_sum / count).exp(), variance.sqrt())
    };
    let median_ms = match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    };

    TimingSummary {
        samples: n,
        min_ms: sorted.first().copied().unwrap_or(0.0),
        max_ms: sorted.last().copied().unwrap_or(0.0),
        mean_ms,
        median_ms,
        gmean_ms,
        stddev_ms,
        p50_ms: at(50),
        p95_ms: at(95),
        p99_ms: at(99),
    }
}

/// Samples and the output of the last timed invocation.
#[derive(Debug)]
pub struct CycleOutcome<T> {
    pub samples: TimingSamples,
    pub output: T,
}

/// Runs `op` untimed `warmup_runs` times, then times it until the policy
/// stops. The first error aborts the cycle.
pub fn run_cycle<T, E, F>(policy: TimingPolicy, mut op: F) -> Result<CycleOutcome<T>, E>
where
    F: FnMut() -> Result<T, E>,
{
    let policy = policy.normalized();
    for _ in 0..policy.warmup_runs {
        std::hint::black_box(op()?);
    }

    let mut samples = TimingSamples::default();
    let mut timed = |samples: &mut TimingSamples| -> Result<T, E> {
        let start = Instant::now();
        let out = std::hint::black_box(op()?);
        samples.push(start.elapsed());
        Ok(out)
    };

    let mut output = timed(&mut samples)?;
    while !policy.should_stop(samples.len(), samples.total()) {
        output = timed(&mut samples)?;
    }
    Ok(CycleOutcome { samples, output })
}
