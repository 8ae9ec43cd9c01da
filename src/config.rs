use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::harness_config::{CONFIG_FILE, CliOverrides, HarnessConfig, HarnessToml};

/// The name of the provcheck project directory.
pub const HARNESS_DIR: &str = ".provcheck";

/// Runtime configuration for provcheck.
///
/// Resolves the project layout and bridges the layered `HarnessConfig` to the
/// commands that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub harness_dir: PathBuf,
    pub config_file: PathBuf,
    pub runs_dir: PathBuf,
    pub verbose: bool,
    harness: HarnessConfig,
}

impl Config {
    /// Resolve the project directory, load `.env` and `provcheck.toml`, and apply
    /// CLI overrides.
    pub fn new(project_dir: PathBuf, verbose: bool, overrides: CliOverrides) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;

        load_dotenv(&project_dir)?;

        let harness_dir = get_harness_dir(&project_dir);
        let toml = HarnessToml::load_or_default(&harness_dir)?;
        let harness = HarnessConfig::new(project_dir.clone(), toml, overrides);

        Ok(Self {
            config_file: harness_dir.join(CONFIG_FILE),
            runs_dir: harness_dir.join("runs"),
            harness_dir,
            project_dir,
            verbose,
            harness,
        })
    }

    pub fn harness(&self) -> &HarnessConfig {
        &self.harness
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.runs_dir).context("Failed to create runs directory")?;
        Ok(())
    }
}

pub fn get_harness_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(HARNESS_DIR)
}

/// Load `<project_dir>/.env` if present. Existing variables win.
fn load_dotenv(project_dir: &Path) -> Result<()> {
    let env_file = project_dir.join(".env");
    if env_file.exists() {
        dotenvy::from_path(&env_file)
            .with_context(|| format!("Failed to load {}", env_file.display()))?;
    }
    Ok(())
}
