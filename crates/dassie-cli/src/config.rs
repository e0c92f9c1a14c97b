use anyhow::{Context, Result};
use dassie_hierarchy::{BuildConfig, TraversalConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Database directory used when neither `--db`, `DASSIE_DB` nor the config
/// file names one.
pub const DEFAULT_DB_DIR: &str = "lcsh-db";

/// Contents of `--config FILE.json`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DassieConfig {
    pub db: Option<PathBuf>,
    pub build: BuildConfig,
    pub traversal: TraversalConfig,
}

impl DassieConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// `override_dir` (from `--db` / `DASSIE_DB`) wins over the file.
    pub fn db_dir(&self, override_dir: Option<&Path>) -> PathBuf {
        override_dir
            .map(Path::to_path_buf)
            .or_else(|| self.db.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_DIR))
    }
}
