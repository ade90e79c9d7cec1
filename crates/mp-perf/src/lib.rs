#![forbid(unsafe_code)]

pub mod case;
pub mod core_suite;
pub mod cycle;
pub mod declare;
pub mod params;
pub mod procedure;
pub mod reference;
pub mod report;
pub mod sanity;
pub mod suite;

use crate::case::ExecPath;
use crate::cycle::TimingPolicy;
use crate::reference::{ReferenceMode, ReferenceStore};
use crate::report::{CaseLogEntry, CaseRecord, DeviceSummary, SuiteReport};
use crate::suite::{RunOptions, Suite};
use mp_device::{Device, DeviceConfig};
use mp_mat::{SZ_720P, SZ_1080P, SZ_SXGA, Size};
use mp_random::DEFAULT_PERF_SEED;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

pub const TYPICAL_MAT_SIZES: [Size; 3] = [SZ_720P, SZ_SXGA, SZ_1080P];

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub reference_root: PathBuf,
    pub path: ExecPath,
    pub seed: u64,
    pub reference_mode: ReferenceMode,
    pub filter: Option<String>,
    pub sizes: Vec<Size>,
    pub policy: TimingPolicy,
    /// Device worker threads; `0` uses every core.
    pub threads: usize,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        Self {
            reference_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/references"),
            path: ExecPath::Device,
            seed: DEFAULT_PERF_SEED,
            reference_mode: ReferenceMode::Verify,
            filter: None,
            sizes: TYPICAL_MAT_SIZES.to_vec(),
            policy: TimingPolicy::default(),
            threads: 0,
        }
    }

    /// Applies `MP_PERF_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("MP_PERF_PATH") {
            self.path = ExecPath::parse(&value)?;
        }
        if let Some(value) = lookup("MP_PERF_SEED") {
            self.seed = value
                .trim()
                .parse()
                .map_err(|err| format!("invalid MP_PERF_SEED '{value}': {err}"))?;
        }
        if let Some(value) = lookup("MP_PERF_REFERENCE_MODE") {
            self.reference_mode = ReferenceMode::parse(&value)?;
        }
        if let Some(value) = lookup("MP_PERF_FILTER") {
            self.filter = (!value.trim().is_empty()).then(|| value.trim().to_string());
        }
        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

static CASE_LOG_PATH: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();

pub fn set_case_log_path(path: Option<PathBuf>) {
    let cell = CASE_LOG_PATH.get_or_init(|| Mutex::new(None));
    if let Ok(mut slot) = cell.lock() {
        *slot = path;
    }
}

fn maybe_append_case_log(entry: &CaseLogEntry) -> Result<(), String> {
    let configured = CASE_LOG_PATH
        .get()
        .and_then(|cell| cell.lock().ok())
        .and_then(|slot| slot.clone());
    let from_env = std::env::var_os("MP_PERF_CASE_LOG_PATH").map(PathBuf::from);
    let Some(path) = configured.or(from_env) else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| format!("failed opening {}: {err}", path.display()))?;
    let line = serde_json::to_string(entry)
        .map_err(|err| format!("failed serializing case log entry: {err}"))?;
    let mut payload = line.into_bytes();
    payload.push(b'\n');
    file.write_all(&payload)
        .map_err(|err| format!("failed appending case log {}: {err}", path.display()))
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Instance names the configuration would run, in run order.
#[must_use]
pub fn list_instances(config: &HarnessConfig) -> Vec<String> {
    core_suite::suite()
        .instances(&config.sizes, config.filter.as_deref())
        .into_iter()
        .map(|instance| instance.name)
        .collect()
}

pub fn run_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    run_suite_reporting(&core_suite::suite(), config, |_| {})
}

/// Runs `suite` under `config`, handing each finished case to `progress`.
pub fn run_suite_reporting<F>(
    suite: &Suite,
    config: &HarnessConfig,
    mut progress: F,
) -> Result<SuiteReport, String>
where
    F: FnMut(&CaseRecord),
{
    let device = match config.path {
        ExecPath::Host => None,
        ExecPath::Device => Some(
            Device::new(DeviceConfig {
                threads: config.threads,
                memory_limit: None,
            })
            .map_err(|err| format!("failed starting device runtime: {err}"))?,
        ),
    };
    let mut references =
        ReferenceStore::open(&config.reference_root, suite.name(), config.reference_mode)?;

    let instances = suite.instances(&config.sizes, config.filter.as_deref());
    if instances.is_empty() {
        return Err(format!(
            "no instances of suite '{}' selected (filter: {})",
            suite.name(),
            config.filter.as_deref().unwrap_or("<none>")
        ));
    }

    let options = RunOptions {
        path: config.path,
        seed: config.seed,
        policy: config.policy.normalized(),
        device: device.as_ref(),
    };
    let outcome = suite.run(&instances, options, &mut references, |record| {
        progress(record);
        maybe_append_case_log(&CaseLogEntry::new(suite.name(), record, config.seed))
    });
    // Artifacts recorded before a failed log append are still written.
    let saved = references.save();
    let cases = outcome?;
    saved?;

    let (pass_count, not_applicable_count, failures) = report::tally(&cases);
    Ok(SuiteReport {
        schema_version: report::REPORT_SCHEMA_VERSION,
        suite: suite.name().to_string(),
        path: config.path,
        seed: config.seed,
        reference_mode: config.reference_mode.name().to_string(),
        generated_at_unix_ms: report::now_unix_ms(),
        git_commit: report::git_commit_short(&repo_root()),
        case_count: cases.len(),
        pass_count,
        not_applicable_count,
        failures,
        device: device.as_ref().map(|dev| {
            let stats = dev.stats();
            DeviceSummary {
                threads: stats.threads,
                peak_bytes: stats.peak_bytes,
                allocations: stats.allocations,
            }
        }),
        cases,
    })
}

/// Path of the reference file `config` reads and writes.
#[must_use]
pub fn reference_file(config: &HarnessConfig) -> PathBuf {
    ReferenceStore::suite_path(&config.reference_root, core_suite::SUITE_NAME)
}

/// Writes `report` to `path`, or to `artifacts/perf/<suite>_<path>.json` at the
/// repository root.
pub fn write_report(report: &SuiteReport, path: Option<&Path>) -> Result<PathBuf, String> {
    let target = path.map_or_else(
        || repo_root().join(format!("artifacts/perf/{}_{}.json", report.suite, report.path)),
        Path::to_path_buf,
    );
    report.write(&target)?;
    Ok(target)
}
