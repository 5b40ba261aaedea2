//! Path and constant configuration
//!
//! Defaults are resolved once, relative to the workspace root rather than the
//! caller's working directory. A TOML file can overlay any subset of fields.

use crate::errors::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Seed used when nothing else is specified
pub const DEFAULT_SEED: u64 = 42;

/// Evaluation metric reported by the workflows
pub const EVAL_METRIC: &str = "roc_auc";

/// Competition identifier used for submissions
pub const COMPETITION_ID: &str = "playground-series-s6e2";

static CONFIG: Lazy<StarterConfig> = Lazy::new(StarterConfig::default);

/// Process-wide default configuration, built on first use
pub fn config() -> &'static StarterConfig {
    &CONFIG
}

/// Workspace root: two levels above the trainer crate manifest
pub fn project_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .unwrap_or(manifest)
        .to_path_buf()
}

/// Data and model directories
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub data_raw_dir: PathBuf,
    pub data_processed_dir: PathBuf,
    pub data_output_dir: PathBuf,
    pub models_dir: PathBuf,
}

impl PathsConfig {
    /// Standard layout under `root`
    pub fn under(root: &Path) -> Self {
        let data = root.join("data");
        Self {
            data_raw_dir: data.join("raw"),
            data_processed_dir: data.join("processed"),
            data_output_dir: data.join("output"),
            models_dir: root.join("models"),
        }
    }

    fn resolve_against(&mut self, root: &Path) {
        for dir in [
            &mut self.data_raw_dir,
            &mut self.data_processed_dir,
            &mut self.data_output_dir,
            &mut self.models_dir,
        ] {
            if dir.is_relative() {
                *dir = root.join(&*dir);
            }
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::under(&project_root())
    }
}

/// Static starter-kit configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StarterConfig {
    pub paths: PathsConfig,
    pub default_seed: u64,
    pub eval_metric: String,
    pub competition_id: String,
}

impl Default for StarterConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            default_seed: DEFAULT_SEED,
            eval_metric: EVAL_METRIC.to_string(),
            competition_id: COMPETITION_ID.to_string(),
        }
    }
}

impl StarterConfig {
    /// Load a TOML overlay; absent keys keep their defaults and relative
    /// paths are taken from the workspace root.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config: StarterConfig = toml::from_str(&content)?;
        config.paths.resolve_against(&project_root());
        Ok(config)
    }
}
