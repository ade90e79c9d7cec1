//! Per-instance execution context, outcome taxonomy and status.

use mp_device::Device;
use mp_dtype::MatType;
use mp_mat::{Mat, Scalar, Size};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cycle::{TimingPolicy, TimingSamples, run_cycle};
use crate::declare::InputFactory;
use crate::params::{ParamError, ParamTuple};
use crate::reference::ReferenceStore;
use crate::sanity::{SanityFailure, SanityValue, Tolerance};

pub const CASE_REASON_CODES: [&str; 7] = [
    "case_setup_failed",
    "case_operation_failed",
    "case_sanity_mismatch",
    "case_reference_unavailable",
    "case_no_host_equivalent",
    "case_sanity_undeclared",
    "case_cycle_undeclared",
];

/// Which implementation a case measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecPath {
    Host,
    Device,
}

impl ExecPath {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Device => "device",
        }
    }

    pub fn parse(token: &str) -> Result<Self, String> {
        match token.trim().to_ascii_lowercase().as_str() {
            "host" | "cpu" => Ok(Self::Host),
            "device" | "gpu" => Ok(Self::Device),
            other => Err(format!("unknown path '{other}' (expected host|device)")),
        }
    }
}

impl std::fmt::Display for ExecPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseError {
    /// Parameter access, allocation, upload or input construction failed.
    Setup(String),
    /// The operation under test failed inside the cycle.
    Operation(String),
    Mismatch(SanityFailure),
    /// Reference artifact missing or unusable for this case.
    Reference(String),
    /// Device-only case asked to run on the host.
    NoHostEquivalent,
    SanityUndeclared,
    CycleUndeclared,
}

impl CaseError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Setup(_) => "case_setup_failed",
            Self::Operation(_) => "case_operation_failed",
            Self::Mismatch(_) => "case_sanity_mismatch",
            Self::Reference(_) => "case_reference_unavailable",
            Self::NoHostEquivalent => "case_no_host_equivalent",
            Self::SanityUndeclared => "case_sanity_undeclared",
            Self::CycleUndeclared => "case_cycle_undeclared",
        }
    }

    pub fn setup(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Setup(format!("{context}: {err}"))
    }
}

impl std::fmt::Display for CaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup(msg) => write!(f, "setup failed: {msg}"),
            Self::Operation(msg) => f.write_str(msg),
            Self::Mismatch(failure) => write!(f, "{failure}"),
            Self::Reference(msg) => f.write_str(msg),
            Self::NoHostEquivalent => write!(f, "no host equivalent"),
            Self::SanityUndeclared => write!(f, "no sanity check declared"),
            Self::CycleUndeclared => write!(f, "no timed cycle declared"),
        }
    }
}

impl std::error::Error for CaseError {}

impl From<ParamError> for CaseError {
    fn from(err: ParamError) -> Self {
        Self::Setup(err.to_string())
    }
}

impl From<SanityFailure> for CaseError {
    fn from(failure: SanityFailure) -> Self {
        Self::Mismatch(failure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    NotApplicable,
}

impl CaseStatus {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::NotApplicable => "not_applicable",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Checked,
    Unchecked,
}

/// Terminal state of one case instance.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub status: CaseStatus,
    pub error: Option<CaseError>,
    pub samples: TimingSamples,
}

/// Everything a case body may touch while it runs.
pub struct CaseContext<'a> {
    name: &'a str,
    path: ExecPath,
    params: &'a ParamTuple,
    device: Option<&'a Device>,
    references: &'a mut ReferenceStore,
    inputs: InputFactory,
    policy: TimingPolicy,
    samples: Option<TimingSamples>,
    verdict: Option<Verdict>,
}

impl<'a> CaseContext<'a> {
    #[must_use]
    pub fn new(
        name: &'a str,
        path: ExecPath,
        params: &'a ParamTuple,
        device: Option<&'a Device>,
        references: &'a mut ReferenceStore,
        seed: u64,
        policy: TimingPolicy,
    ) -> Self {
        Self {
            name,
            path,
            params,
            device,
            references,
            inputs: InputFactory::new(seed),
            policy,
            samples: None,
            verdict: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    #[must_use]
    pub const fn path(&self) -> ExecPath {
        self.path
    }

    #[must_use]
    pub fn params(&self) -> &'a ParamTuple {
        self.params
    }

    pub fn device(&self) -> Result<&'a Device, CaseError> {
        self.device
            .ok_or_else(|| CaseError::Setup("device path selected without a device".to_string()))
    }

    #[must_use]
    pub const fn policy(&self) -> TimingPolicy {
        self.policy
    }

    pub fn declare_in(&mut self, size: Size, mat_type: MatType) -> Result<Mat, CaseError> {
        self.inputs.declare_in(size, mat_type)
    }

    pub fn randu(
        &mut self,
        size: Size,
        mat_type: MatType,
        low: f64,
        high: f64,
    ) -> Result<Mat, CaseError> {
        self.inputs.randu(size, mat_type, low, high)
    }

    pub fn declare_scalar(&mut self) -> Result<Scalar, CaseError> {
        self.inputs.declare_scalar()
    }

    /// Overrides the time limit of this case's cycle.
    pub fn declare_time(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            self.policy = self.policy.with_time_limit(Duration::from_secs_f64(seconds));
        }
    }

    /// Times `op` under the case policy and returns its last output.
    pub fn cycle<T, E, F>(&mut self, op: F) -> Result<T, CaseError>
    where
        E: std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let outcome = run_cycle(self.policy, op).map_err(|err| CaseError::Operation(err.to_string()))?;
        self.samples = Some(outcome.samples);
        Ok(outcome.output)
    }

    pub fn sanity_check(
        &mut self,
        arg: &str,
        value: &SanityValue,
        tolerance: Tolerance,
    ) -> Result<(), CaseError> {
        self.references.check(self.name, arg, value, tolerance)?;
        self.verdict = Some(Verdict::Checked);
        Ok(())
    }

    pub fn sanity_check_nothing(&mut self) {
        if self.verdict.is_none() {
            self.verdict = Some(Verdict::Unchecked);
        }
    }

    /// Ends a host run of a device-only case before any setup.
    pub fn no_host_equivalent(&self) -> Result<(), CaseError> {
        match self.path {
            ExecPath::Host => Err(CaseError::NoHostEquivalent),
            ExecPath::Device => Ok(()),
        }
    }

    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.verdict == Some(Verdict::Checked)
    }

    /// Classifies the body result into exactly one status.
    #[must_use]
    pub fn finish(self, result: Result<(), CaseError>) -> CaseOutcome {
        let samples = self.samples.unwrap_or_default();
        let error = match result {
            Err(CaseError::NoHostEquivalent) => {
                return CaseOutcome {
                    status: CaseStatus::NotApplicable,
                    error: Some(CaseError::NoHostEquivalent),
                    samples,
                };
            }
            Err(err) => Some(err),
            Ok(()) if samples.is_empty() => Some(CaseError::CycleUndeclared),
            Ok(()) if self.verdict.is_none() => Some(CaseError::SanityUndeclared),
            Ok(()) => None,
        };
        let status = if error.is_some() {
            CaseStatus::Failed
        } else {
            CaseStatus::Passed
        };
        CaseOutcome {
            status,
            error,
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CaseContext, CaseError, CaseStatus, ExecPath};
    use crate::cycle::TimingPolicy;
    use crate::params::ParamTuple;
    use crate::reference::{ReferenceMode, ReferenceStore};
    use mp_dtype::{Depth, MatType};
    use mp_mat::Size;
    use std::time::Duration;

    fn quick() -> TimingPolicy {
        TimingPolicy {
            warmup_runs: 0,
            min_samples: 2,
            max_samples: 2,
            time_limit: Duration::ZERO,
        }
    }

    fn store() -> ReferenceStore {
        ReferenceStore::open(std::path::Path::new("unused"), "core", ReferenceMode::Off)
            .expect("store")
    }

    #[test]
    fn missing_verdict_fails_the_case() {
        let params = ParamTuple::default();
        let mut refs = store();
        let mut ctx = CaseContext::new("t", ExecPath::Host, &params, None, &mut refs, 1, quick());
        ctx.cycle(|| Ok::<_, String>(())).expect("cycle");
        let outcome = ctx.finish(Ok(()));
        assert_eq!(outcome.status, CaseStatus::Failed);
        assert_eq!(outcome.error, Some(CaseError::SanityUndeclared));
        assert_eq!(outcome.samples.len(), 2);
    }

    #[test]
    fn unchecked_host_run_passes() {
        let params = ParamTuple::default();
        let mut refs = store();
        let mut ctx = CaseContext::new("t", ExecPath::Host, &params, None, &mut refs, 1, quick());
        ctx.cycle(|| Ok::<_, String>(1)).expect("cycle");
        ctx.sanity_check_nothing();
        assert_eq!(ctx.finish(Ok(())).status, CaseStatus::Passed);
    }

    #[test]
    fn device_only_case_is_not_applicable_on_host() {
        let params = ParamTuple::default();
        let mut refs = store();
        let ctx = CaseContext::new("t", ExecPath::Host, &params, None, &mut refs, 1, quick());
        let result = ctx.no_host_equivalent();
        let outcome = ctx.finish(result);
        assert_eq!(outcome.status, CaseStatus::NotApplicable);
        assert!(outcome.samples.is_empty());
    }

    #[test]
    fn operation_errors_surface_verbatim() {
        let params = ParamTuple::default();
        let mut refs = store();
        let mut ctx = CaseContext::new("t", ExecPath::Host, &params, None, &mut refs, 1, quick());
        let result = ctx.cycle(|| Err::<(), _>("unsupported depth 8S"));
        let outcome = ctx.finish(result);
        assert_eq!(outcome.status, CaseStatus::Failed);
        assert_eq!(
            outcome.error.map(|err| err.to_string()),
            Some("unsupported depth 8S".to_string())
        );
    }

    #[test]
    fn inputs_restart_from_the_seed_for_each_context() {
        let params = ParamTuple::default();
        let mut refs = store();
        let ty = MatType::single(Depth::U8);
        let first = {
            let mut ctx = CaseContext::new("a", ExecPath::Host, &params, None, &mut refs, 42, quick());
            ctx.declare_in(Size::new(8, 8), ty).expect("declare")
        };
        let second = {
            let mut ctx = CaseContext::new("b", ExecPath::Host, &params, None, &mut refs, 42, quick());
            ctx.declare_in(Size::new(8, 8), ty).expect("declare")
        };
        assert_eq!(first, second);
    }

    #[test]
    fn device_path_without_device_is_setup_error() {
        let params = ParamTuple::default();
        let mut refs = store();
        let ctx = CaseContext::new("t", ExecPath::Device, &params, None, &mut refs, 1, quick());
        assert_eq!(
            ctx.device().map(|_| ()).expect_err("device").reason_code(),
            "case_setup_failed"
        );
    }

    #[test]
    fn path_tokens() {
        assert_eq!(ExecPath::parse("GPU").expect("path"), ExecPath::Device);
        assert!(ExecPath::parse("tpu").is_err());
    }
}
