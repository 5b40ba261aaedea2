//! Optional-capability detection and training device selection
//!
//! Capabilities are probed once per process; everything that cares about
//! accelerators or the parallel runtime consults the cached flags instead of
//! probing again.

use crate::errors::{Result, StarterError};
use once_cell::sync::Lazy;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Environment variable selecting the baseline training device
pub const DEVICE_ENV: &str = "LGBM_DEVICE";

/// A visible accelerator device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratorInfo {
    pub index: usize,
    pub name: String,
}

/// Flags resolved once at process start
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Multi-threaded training runtime compiled in
    pub parallel_runtime: bool,
    pub worker_threads: usize,
    pub accelerators: Vec<AcceleratorInfo>,
}

impl Capabilities {
    pub fn detect() -> Self {
        let parallel_runtime = cfg!(feature = "parallel");
        let worker_threads = worker_threads();
        let accelerators = detect_accelerators(Path::new("/proc/driver/nvidia/gpus"), Path::new("/dev"));

        debug!(
            parallel_runtime,
            worker_threads,
            accelerators = accelerators.len(),
            "capabilities detected"
        );

        Self {
            parallel_runtime,
            worker_threads,
            accelerators,
        }
    }

    pub fn has_accelerator(&self) -> bool {
        !self.accelerators.is_empty()
    }
}

static CAPABILITIES: Lazy<Capabilities> = Lazy::new(Capabilities::detect);

/// Process-wide capability flags
pub fn capabilities() -> &'static Capabilities {
    &CAPABILITIES
}

#[cfg(feature = "parallel")]
fn worker_threads() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
fn worker_threads() -> usize {
    1
}

/// List accelerators from the driver's proc tree, falling back to device nodes.
fn detect_accelerators(proc_dir: &Path, dev_dir: &Path) -> Vec<AcceleratorInfo> {
    let mut from_proc: Vec<(String, String)> = std::fs::read_dir(proc_dir)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|entry| {
                    let info = std::fs::read_to_string(entry.path().join("information")).ok()?;
                    let name = info
                        .lines()
                        .find_map(|l| l.strip_prefix("Model:"))
                        .map(|m| m.trim().to_string())
                        .unwrap_or_else(|| "unknown accelerator".to_string());
                    Some((entry.file_name().to_string_lossy().into_owned(), name))
                })
                .collect()
        })
        .unwrap_or_default();

    if !from_proc.is_empty() {
        from_proc.sort();
        return from_proc
            .into_iter()
            .enumerate()
            .map(|(index, (_, name))| AcceleratorInfo { index, name })
            .collect();
    }

    let mut nodes: Vec<usize> = std::fs::read_dir(dev_dir)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|entry| {
                    let file = entry.file_name();
                    let idx = file.to_str()?.strip_prefix("nvidia")?;
                    idx.parse::<usize>().ok()
                })
                .collect()
        })
        .unwrap_or_default();
    nodes.sort_unstable();

    nodes
        .into_iter()
        .map(|index| AcceleratorInfo {
            index,
            name: format!("nvidia{index}"),
        })
        .collect()
}

/// Where histogram construction runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// Data-parallel across the worker pool
    #[default]
    Accelerated,
    /// Single thread
    Cpu,
}

impl FromStr for Device {
    type Err = StarterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cuda" | "gpu" => Ok(Device::Accelerated),
            "cpu" => Ok(Device::Cpu),
            other => Err(StarterError::InvalidConfiguration(format!(
                "unknown device `{other}` (expected `cuda` or `cpu`)"
            ))),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Accelerated => write!(f, "cuda"),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

impl Device {
    /// Read `LGBM_DEVICE`, defaulting to accelerated mode
    pub fn from_env() -> Result<Self> {
        match std::env::var(DEVICE_ENV) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Device::default()),
        }
    }

    /// Device actually used given the compiled-in runtime
    pub fn resolve(self, caps: &Capabilities) -> Device {
        match self {
            Device::Accelerated if !caps.parallel_runtime => {
                warn!("accelerated device requested but parallel runtime not built; using cpu");
                Device::Cpu
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_device_parsing() {
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Accelerated);
        assert_eq!("GPU".parse::<Device>().unwrap(), Device::Accelerated);
        assert_eq!(" cpu ".parse::<Device>().unwrap(), Device::Cpu);

        let err = "tpu".parse::<Device>().unwrap_err();
        assert!(err.to_string().contains("tpu"));
    }

    #[test]
    fn test_device_display_matches_env_values() {
        assert_eq!(Device::Accelerated.to_string(), "cuda");
        assert_eq!(Device::Cpu.to_string(), "cpu");
    }

    #[test]
    fn test_resolve_without_runtime() {
        let caps = Capabilities {
            parallel_runtime: false,
            worker_threads: 1,
            accelerators: Vec::new(),
        };
        assert_eq!(Device::Accelerated.resolve(&caps), Device::Cpu);
        assert_eq!(Device::Cpu.resolve(&caps), Device::Cpu);
    }

    #[test]
    fn test_detect_from_proc_tree() {
        let proc_dir = TempDir::new().unwrap();
        let gpu = proc_dir.path().join("0000:01:00.0");
        std::fs::create_dir(&gpu).unwrap();
        std::fs::write(
            gpu.join("information"),
            "Model: \t\t NVIDIA A100-SXM4-40GB\nIRQ: 42\n",
        )
        .unwrap();

        let dev_dir = TempDir::new().unwrap();
        let found = detect_accelerators(proc_dir.path(), dev_dir.path());
        assert_eq!(
            found,
            vec![AcceleratorInfo {
                index: 0,
                name: "NVIDIA A100-SXM4-40GB".to_string()
            }]
        );
    }

    #[test]
    fn test_detect_from_device_nodes() {
        let proc_dir = TempDir::new().unwrap();
        let dev_dir = TempDir::new().unwrap();
        for name in ["nvidia1", "nvidia0", "nvidiactl", "null"] {
            std::fs::write(dev_dir.path().join(name), "").unwrap();
        }

        let found = detect_accelerators(&proc_dir.path().join("missing"), dev_dir.path());
        let indices: Vec<usize> = found.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_capabilities_are_cached() {
        let a = capabilities() as *const Capabilities;
        let b = capabilities() as *const Capabilities;
        assert_eq!(a, b);
        assert!(capabilities().worker_threads >= 1);
    }
}
