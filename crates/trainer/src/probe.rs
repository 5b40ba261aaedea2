//! Environment sanity checks
//!
//! Three independent checks: the training data is readable, an accelerator is
//! visible, and the output directory is writable. Each yields one pass/fail
//! line; only a dataset that exists but cannot be parsed is an error.

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::capabilities::{capabilities, Capabilities};
use crate::config::StarterConfig;
use crate::dataset::Table;
use crate::errors::Result;

pub const PROBE_FILE: &str = "test_output.txt";
pub const PROBE_TEXT: &str = "write test OK";

/// Which check an outcome belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    ReadData,
    Accelerator,
    WriteOutput,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Check::ReadData => "data read",
            Check::Accelerator => "accelerator",
            Check::WriteOutput => "write",
        };
        f.write_str(name)
    }
}

/// Paths the probe touches
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
}

impl ProbeConfig {
    pub fn from_config(config: &StarterConfig) -> Self {
        Self {
            data_path: config.paths.data_raw_dir.join("train.csv"),
            output_path: config.paths.data_output_dir.join(PROBE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub check: Check,
    pub passed: bool,
    pub message: String,
}

impl CheckOutcome {
    fn pass(check: Check, message: String) -> Self {
        info!("[ok] {}", message);
        Self {
            check,
            passed: true,
            message,
        }
    }

    fn fail(check: Check, message: String) -> Self {
        warn!("[fail] {}", message);
        Self {
            check,
            passed: false,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl ProbeReport {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn outcome(&self, check: Check) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.check == check)
    }
}

/// Run all checks against the process-wide capability flags
pub fn run_probe(config: &ProbeConfig) -> Result<ProbeReport> {
    run_probe_with(config, capabilities())
}

pub fn run_probe_with(config: &ProbeConfig, caps: &Capabilities) -> Result<ProbeReport> {
    info!("=== Environment check start ===");

    let outcomes = vec![
        check_read(config)?,
        check_accelerator(caps),
        check_write(config),
    ];

    info!("=== Environment check end ===");
    Ok(ProbeReport { outcomes })
}

fn check_read(config: &ProbeConfig) -> Result<CheckOutcome> {
    let path = &config.data_path;
    if !path.exists() {
        return Ok(CheckOutcome::fail(
            Check::ReadData,
            format!("data not found: {}", path.display()),
        ));
    }

    // parse failures propagate; existence is the only guard
    let table = Table::from_csv(path)?;
    Ok(CheckOutcome::pass(
        Check::ReadData,
        format!("data loaded: {} shape {:?}", path.display(), table.shape()),
    ))
}

fn check_accelerator(caps: &Capabilities) -> CheckOutcome {
    match caps.accelerators.first() {
        Some(device) => CheckOutcome::pass(
            Check::Accelerator,
            format!("accelerator detected: {}", device.name),
        ),
        None => CheckOutcome::fail(
            Check::Accelerator,
            "no accelerator found (running in CPU mode)".to_string(),
        ),
    }
}

fn check_write(config: &ProbeConfig) -> CheckOutcome {
    let path = &config.output_path;
    match std::fs::write(path, PROBE_TEXT) {
        Ok(()) => CheckOutcome::pass(
            Check::WriteOutput,
            format!("write test passed: {}", path.display()),
        ),
        Err(e) => CheckOutcome::fail(Check::WriteOutput, format!("write failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::AcceleratorInfo;
    use tempfile::TempDir;

    fn caps(accelerators: Vec<AcceleratorInfo>) -> Capabilities {
        Capabilities {
            parallel_runtime: false,
            worker_threads: 1,
            accelerators,
        }
    }

    #[test]
    fn test_all_checks_pass() {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join("train.csv");
        std::fs::write(&data_path, "id,Age\n0,54\n1,61\n").unwrap();
        let config = ProbeConfig {
            data_path,
            output_path: dir.path().join(PROBE_FILE),
        };
        let gpu = AcceleratorInfo {
            index: 0,
            name: "Tesla T4".into(),
        };

        let report = run_probe_with(&config, &caps(vec![gpu])).unwrap();

        assert!(report.all_passed());
        assert!(report.outcome(Check::ReadData).unwrap().message.contains("(2, 2)"));
        assert!(report.outcome(Check::Accelerator).unwrap().message.contains("Tesla T4"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(PROBE_FILE)).unwrap(),
            PROBE_TEXT
        );
    }

    #[test]
    fn test_failures_are_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let config = ProbeConfig {
            data_path: dir.path().join("missing.csv"),
            output_path: dir.path().join("no_such_dir").join(PROBE_FILE),
        };

        let report = run_probe_with(&config, &caps(Vec::new())).unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes.iter().all(|o| !o.passed));
        assert!(report
            .outcome(Check::Accelerator)
            .unwrap()
            .message
            .contains("CPU mode"));
    }

    #[test]
    fn test_malformed_data_propagates() {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join("train.csv");
        std::fs::write(&data_path, "a,b\n1,2\n3\n").unwrap();
        let config = ProbeConfig {
            data_path,
            output_path: dir.path().join(PROBE_FILE),
        };

        assert!(run_probe_with(&config, &caps(Vec::new())).is_err());
    }
}
