//! Per-case records, the run report and the JSONL case log line.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::case::{CaseOutcome, CaseStatus, ExecPath};
use crate::cycle::TimingSummary;

pub const REPORT_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub test: String,
    pub name: String,
    pub path: ExecPath,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingSummary>,
}

impl CaseRecord {
    #[must_use]
    pub fn from_outcome(test: &str, name: &str, path: ExecPath, outcome: &CaseOutcome) -> Self {
        let timing = (!outcome.samples.is_empty()).then(|| outcome.samples.summary());
        Self {
            test: test.to_string(),
            name: name.to_string(),
            path,
            status: outcome.status,
            reason_code: outcome.error.as_ref().map(|err| err.reason_code().to_string()),
            reason: outcome.error.as_ref().map(ToString::to_string),
            timing,
        }
    }

    /// One human-readable progress line.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let mut line = format!("[{}] {} ({})", self.status, self.name, self.path);
        if let Some(timing) = &self.timing {
            line.push_str(&format!(
                " median={:.3}ms samples={}",
                timing.median_ms, timing.samples
            ));
        }
        if let Some(reason) = &self.reason {
            line.push_str(&format!(": {reason}"));
        }
        line
    }
}

/// JSONL line appended per case to the structured case log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseLogEntry {
    pub suite: String,
    pub name: String,
    pub path: ExecPath,
    pub status: CaseStatus,
    pub samples: usize,
    pub median_ms: Option<f64>,
    pub reason_code: Option<String>,
    pub reason: Option<String>,
    pub seed: u64,
    pub timestamp_unix_ms: u128,
}

impl CaseLogEntry {
    #[must_use]
    pub fn new(suite: &str, record: &CaseRecord, seed: u64) -> Self {
        Self {
            suite: suite.to_string(),
            name: record.name.clone(),
            path: record.path,
            status: record.status,
            samples: record.timing.as_ref().map_or(0, |t| t.samples),
            median_ms: record.timing.as_ref().map(|t| t.median_ms),
            reason_code: record.reason_code.clone(),
            reason: record.reason.clone(),
            seed,
            timestamp_unix_ms: now_unix_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub threads: usize,
    pub peak_bytes: usize,
    pub allocations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub schema_version: u8,
    pub suite: String,
    pub path: ExecPath,
    pub seed: u64,
    pub reference_mode: String,
    pub generated_at_unix_ms: u128,
    pub git_commit: String,
    pub case_count: usize,
    pub pass_count: usize,
    pub not_applicable_count: usize,
    pub failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSummary>,
    pub cases: Vec<CaseRecord>,
}

impl SuiteReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty() && self.pass_count + self.not_applicable_count == self.case_count
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.case_count - self.pass_count - self.not_applicable_count
    }

    pub fn write(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|err| format!("failed serializing suite report: {err}"))?;
        fs::write(path, raw).map_err(|err| format!("failed writing {}: {err}", path.display()))
    }
}

/// Counts records by status into a report skeleton.
#[must_use]
pub fn tally(cases: &[CaseRecord]) -> (usize, usize, Vec<String>) {
    let mut pass_count = 0;
    let mut not_applicable_count = 0;
    let mut failures = Vec::new();
    for record in cases {
        match record.status {
            CaseStatus::Passed => pass_count += 1,
            CaseStatus::NotApplicable => not_applicable_count += 1,
            CaseStatus::Failed => failures.push(format!(
                "{}: {}",
                record.name,
                record.reason.as_deref().unwrap_or("failed")
            )),
        }
    }
    (pass_count, not_applicable_count, failures)
}

pub(crate) fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

pub(crate) fn git_commit_short(repo_root: &Path) -> String {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(repo_root)
        .output();

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{CaseLogEntry, CaseRecord, tally};
    use crate::case::{CaseError, CaseOutcome, CaseStatus, ExecPath};
    use crate::cycle::TimingSamples;
    use std::time::Duration;

    fn record(status: CaseStatus, error: Option<CaseError>) -> CaseRecord {
        let mut samples = TimingSamples::default();
        if status == CaseStatus::Passed {
            samples.push(Duration::from_millis(2));
        }
        let outcome = CaseOutcome {
            status,
            error,
            samples,
        };
        CaseRecord::from_outcome("Core_Abs", "Core_Abs::(640x480, 16S)", ExecPath::Host, &outcome)
    }

    #[test]
    fn records_carry_reason_codes() {
        let na = record(CaseStatus::NotApplicable, Some(CaseError::NoHostEquivalent));
        assert_eq!(na.reason_code.as_deref(), Some("case_no_host_equivalent"));
        assert!(na.timing.is_none());
        let raw = serde_json::to_string(&na).expect("json");
        assert!(raw.contains(r#""status":"not_applicable""#));
        assert!(raw.contains(r#""path":"host""#));
    }

    #[test]
    fn tally_separates_statuses() {
        let cases = vec![
            record(CaseStatus::Passed, None),
            record(CaseStatus::NotApplicable, Some(CaseError::NoHostEquivalent)),
            record(CaseStatus::Failed, Some(CaseError::SanityUndeclared)),
        ];
        let (pass, na, failures) = tally(&cases);
        assert_eq!((pass, na), (1, 1));
        assert_eq!(failures, vec!["Core_Abs::(640x480, 16S): no sanity check declared"]);
    }

    #[test]
    fn log_entry_reports_median() {
        let passed = record(CaseStatus::Passed, None);
        assert!(passed.summary_line().starts_with("[passed] Core_Abs::(640x480, 16S) (host)"));
        let entry = CaseLogEntry::new("core", &passed, 9);
        assert_eq!(entry.samples, 1);
        assert!(entry.median_ms.is_some_and(|ms| (ms - 2.0).abs() < 1e-9));
    }
}
