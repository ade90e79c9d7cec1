#![forbid(unsafe_code)]

use mp_mat::Size;
use mp_perf::case::ExecPath;
use mp_perf::reference::ReferenceMode;
use mp_perf::{
    HarnessConfig, core_suite, list_instances, reference_file, run_suite_reporting,
    set_case_log_path, write_report,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

const USAGE: &str = "Usage: cargo run -p mp-perf --bin run_perf_core -- [--path host|device] [--filter <glob>] [--reference-root <dir>] [--reference-mode verify|write|off] [--seed <u64>] [--min-samples <n>] [--max-samples <n>] [--time-limit <secs>] [--sizes <WxH,...>] [--threads <n>] [--report <file>] [--log-path <file>] [--list]";

#[derive(Debug)]
struct RunOptions {
    config: HarnessConfig,
    report_path: Option<PathBuf>,
    log_path: Option<PathBuf>,
    list_only: bool,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    suite: String,
    path: ExecPath,
    reference_mode: String,
    reference_file: String,
    case_count: usize,
    pass_count: usize,
    not_applicable_count: usize,
    failed_count: usize,
    report: String,
    status: String,
}

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("run_perf_core failed: {err}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<bool, String> {
    let options = parse_args()?;
    let config = options.config;

    if options.list_only {
        for name in list_instances(&config) {
            println!("{name}");
        }
        return Ok(true);
    }

    if options.log_path.is_some() {
        set_case_log_path(options.log_path.clone());
    }

    let report = run_suite_reporting(&core_suite::suite(), &config, |record| {
        println!("{}", record.summary_line());
    })?;
    let report_path = write_report(&report, options.report_path.as_deref())?;

    let passed = report.all_passed();
    let summary = RunSummary {
        suite: report.suite.clone(),
        path: report.path,
        reference_mode: report.reference_mode.clone(),
        reference_file: reference_file(&config).display().to_string(),
        case_count: report.case_count,
        pass_count: report.pass_count,
        not_applicable_count: report.not_applicable_count,
        failed_count: report.failed_count(),
        report: report_path.display().to_string(),
        status: if passed { "pass" } else { "fail" }.to_string(),
    };
    let rendered = serde_json::to_string_pretty(&summary)
        .map_err(|err| format!("failed serializing run summary: {err}"))?;
    println!("{rendered}");

    for failure in &report.failures {
        eprintln!("FAILED {failure}");
    }
    Ok(passed)
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_number<T>(flag: &str, value: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| format!("invalid {flag} value '{value}': {err}"))
}

fn parse_sizes(value: &str) -> Result<Vec<Size>, String> {
    let sizes = value
        .split(',')
        .filter(|token| !token.trim().is_empty())
        .map(|token| {
            Size::parse(token.trim()).map_err(|err| format!("invalid --sizes value '{token}': {err}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if sizes.is_empty() {
        return Err("--sizes requires at least one WxH entry".to_string());
    }
    Ok(sizes)
}

fn parse_args() -> Result<RunOptions, String> {
    let mut config = HarnessConfig::default_paths();
    config.apply_env()?;
    let mut report_path: Option<PathBuf> = None;
    let mut log_path: Option<PathBuf> = None;
    let mut list_only = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--path" => {
                let value = next_value(&mut args, "--path")?;
                config.path = ExecPath::parse(&value)?;
            }
            "--filter" => {
                config.filter = Some(next_value(&mut args, "--filter")?);
            }
            "--reference-root" => {
                config.reference_root = PathBuf::from(next_value(&mut args, "--reference-root")?);
            }
            "--reference-mode" => {
                let value = next_value(&mut args, "--reference-mode")?;
                config.reference_mode = ReferenceMode::parse(&value)?;
            }
            "--seed" => {
                let value = next_value(&mut args, "--seed")?;
                config.seed = parse_number("--seed", &value)?;
            }
            "--min-samples" => {
                let value = next_value(&mut args, "--min-samples")?;
                config.policy.min_samples = parse_number("--min-samples", &value)?;
            }
            "--max-samples" => {
                let value = next_value(&mut args, "--max-samples")?;
                config.policy.max_samples = parse_number("--max-samples", &value)?;
            }
            "--time-limit" => {
                let value = next_value(&mut args, "--time-limit")?;
                let seconds: f64 = parse_number("--time-limit", &value)?;
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(format!(
                        "--time-limit must be a non-negative number of seconds, got {value}"
                    ));
                }
                config.policy.time_limit = Duration::from_secs_f64(seconds);
            }
            "--sizes" => {
                let value = next_value(&mut args, "--sizes")?;
                config.sizes = parse_sizes(&value)?;
            }
            "--threads" => {
                let value = next_value(&mut args, "--threads")?;
                config.threads = parse_number("--threads", &value)?;
            }
            "--report" => {
                report_path = Some(PathBuf::from(next_value(&mut args, "--report")?));
            }
            "--log-path" => {
                log_path = Some(PathBuf::from(next_value(&mut args, "--log-path")?));
            }
            "--list" => list_only = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            unknown => return Err(format!("unknown argument: {unknown}")),
        }
    }

    Ok(RunOptions {
        config,
        report_path,
        log_path,
        list_only,
    })
}
