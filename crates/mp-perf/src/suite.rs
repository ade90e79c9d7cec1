//! Test registration, instance enumeration and the sequential case runner.

use mp_device::Device;
use mp_mat::Size;

use crate::case::{CaseContext, CaseError, CaseOutcome, CaseStatus, ExecPath};
use crate::cycle::{TimingPolicy, TimingSamples};
use crate::params::{Dimension, ParamSpace, ParamTuple};
use crate::reference::ReferenceStore;
use crate::report::CaseRecord;

/// Builds the parameter dimensions of a test from the configured sizes.
pub type DimsFn = fn(&[Size]) -> Vec<Dimension>;

pub type CaseBody = fn(&mut CaseContext<'_>) -> Result<(), CaseError>;

#[derive(Debug, Clone, Copy)]
pub struct PerfTest {
    pub name: &'static str,
    pub device_only: bool,
    pub dims: DimsFn,
    pub body: CaseBody,
}

impl PerfTest {
    #[must_use]
    pub const fn new(name: &'static str, dims: DimsFn, body: CaseBody) -> Self {
        Self {
            name,
            device_only: false,
            dims,
            body,
        }
    }

    /// A test with no host implementation.
    #[must_use]
    pub const fn device_only(name: &'static str, dims: DimsFn, body: CaseBody) -> Self {
        Self {
            name,
            device_only: true,
            dims,
            body,
        }
    }

    #[must_use]
    pub fn space(&self, sizes: &[Size]) -> ParamSpace {
        ParamSpace::combine((self.dims)(sizes))
    }
}

/// One registered `(test, tuple)` pair.
#[derive(Debug, Clone)]
pub struct Instance<'s> {
    pub test: &'s PerfTest,
    pub params: ParamTuple,
    pub name: String,
}

/// Everything a run needs besides the suite itself.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions<'a> {
    pub path: ExecPath,
    pub seed: u64,
    pub policy: TimingPolicy,
    pub device: Option<&'a Device>,
}

#[derive(Debug, Clone)]
pub struct Suite {
    name: &'static str,
    tests: Vec<PerfTest>,
}

impl Suite {
    #[must_use]
    pub fn new(name: &'static str, tests: Vec<PerfTest>) -> Self {
        Self { name, tests }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn tests(&self) -> &[PerfTest] {
        &self.tests
    }

    #[must_use]
    pub fn test(&self, name: &str) -> Option<&PerfTest> {
        self.tests.iter().find(|t| t.name == name)
    }

    /// Registered instances in registration order, optionally filtered by a
    /// `*` glob matched against the test or the instance name.
    #[must_use]
    pub fn instances(&self, sizes: &[Size], filter: Option<&str>) -> Vec<Instance<'_>> {
        let mut out = Vec::new();
        for test in &self.tests {
            for params in test.space(sizes).tuples() {
                let name = params.instance_name(test.name);
                let selected = filter.is_none_or(|pattern| {
                    glob_matches(pattern, test.name) || glob_matches(pattern, &name)
                });
                if selected {
                    out.push(Instance {
                        test,
                        params: params.clone(),
                        name,
                    });
                }
            }
        }
        out
    }

    /// Runs every selected instance in order. `on_case` sees each record as
    /// soon as its case ends; its first error stops the run.
    pub fn run<F>(
        &self,
        instances: &[Instance<'_>],
        options: RunOptions<'_>,
        references: &mut ReferenceStore,
        mut on_case: F,
    ) -> Result<Vec<CaseRecord>, String>
    where
        F: FnMut(&CaseRecord) -> Result<(), String>,
    {
        let mut records = Vec::with_capacity(instances.len());
        for instance in instances {
            let record = run_instance(instance, options, references);
            on_case(&record)?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Runs one instance through setup, cycle and verification.
pub fn run_instance(
    instance: &Instance<'_>,
    options: RunOptions<'_>,
    references: &mut ReferenceStore,
) -> CaseRecord {
    let test = instance.test;
    if test.device_only && options.path == ExecPath::Host {
        let outcome = CaseOutcome {
            status: CaseStatus::NotApplicable,
            error: Some(CaseError::NoHostEquivalent),
            samples: TimingSamples::default(),
        };
        return CaseRecord::from_outcome(test.name, &instance.name, options.path, &outcome);
    }
    let mut ctx = CaseContext::new(
        &instance.name,
        options.path,
        &instance.params,
        options.device,
        references,
        options.seed,
        options.policy,
    );
    let result = (test.body)(&mut ctx);
    let outcome = ctx.finish(result);
    CaseRecord::from_outcome(test.name, &instance.name, options.path, &outcome)
}

/// `*` matches any run of characters; everything else is literal.
#[must_use]
pub fn glob_matches(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return pattern == text;
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::{PerfTest, RunOptions, Suite, glob_matches, run_instance};
    use crate::case::{CaseContext, CaseError, CaseStatus, ExecPath};
    use crate::cycle::TimingPolicy;
    use crate::params::Dimension;
    use crate::reference::{ReferenceMode, ReferenceStore};
    use mp_dtype::Depth;
    use mp_mat::{SZ_720P, SZ_VGA};
    use std::time::Duration;

    fn passing(ctx: &mut CaseContext<'_>) -> Result<(), CaseError> {
        ctx.cycle(|| Ok::<_, String>(()))?;
        ctx.sanity_check_nothing();
        Ok(())
    }

    fn suite() -> Suite {
        Suite::new(
            "unit",
            vec![
                PerfTest::new(
                    "Unit_Pass",
                    |sizes| vec![Dimension::new(sizes.iter().copied()), Dimension::new([Depth::U8, Depth::F32])],
                    passing,
                ),
                PerfTest::device_only("Unit_DeviceOnly", |sizes| vec![Dimension::new(sizes.iter().copied())], passing),
            ],
        )
    }

    fn options() -> RunOptions<'static> {
        RunOptions {
            path: ExecPath::Host,
            seed: 1,
            policy: TimingPolicy {
                warmup_runs: 0,
                min_samples: 1,
                max_samples: 1,
                time_limit: Duration::ZERO,
            },
            device: None,
        }
    }

    #[test]
    fn instances_are_enumerated_and_filtered() {
        let suite = suite();
        let all = suite.instances(&[SZ_VGA, SZ_720P], None);
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].name, "Unit_Pass::(640x480, 8U)");
        let filtered = suite.instances(&[SZ_VGA, SZ_720P], Some("*32F*"));
        assert_eq!(filtered.len(), 2);
        let by_test = suite.instances(&[SZ_VGA], Some("Unit_DeviceOnly"));
        assert_eq!(by_test.len(), 1);
    }

    #[test]
    fn device_only_tests_skip_on_host() {
        let suite = suite();
        let instances = suite.instances(&[SZ_VGA], Some("Unit_DeviceOnly"));
        let mut refs = ReferenceStore::open(std::path::Path::new("unused"), "unit", ReferenceMode::Off)
            .expect("store");
        let record = run_instance(&instances[0], options(), &mut refs);
        assert_eq!(record.status, CaseStatus::NotApplicable);
    }

    #[test]
    fn run_reports_every_instance() {
        let suite = suite();
        let instances = suite.instances(&[SZ_VGA], None);
        let mut refs = ReferenceStore::open(std::path::Path::new("unused"), "unit", ReferenceMode::Off)
            .expect("store");
        let mut seen = 0;
        let records = suite
            .run(&instances, options(), &mut refs, |_| {
                seen += 1;
                Ok(())
            })
            .expect("run");
        assert_eq!(records.len(), 3);
        assert_eq!(seen, 3);
        assert_eq!(
            records.iter().filter(|r| r.status == CaseStatus::Passed).count(),
            2
        );
    }

    #[test]
    fn glob_semantics() {
        assert!(glob_matches("Core_*", "Core_AddMat"));
        assert!(glob_matches("*AddMat*", "Core_AddMat::(640x480, 8U)"));
        assert!(glob_matches("Core_AddMat", "Core_AddMat"));
        assert!(!glob_matches("Core_Add", "Core_AddMat"));
        assert!(glob_matches("*", ""));
        assert!(!glob_matches("a*a", "a"));
        assert!(glob_matches("a*b*c", "a_b_b_c"));
    }
}
