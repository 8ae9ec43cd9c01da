//! Harness configuration file for provcheck.
//!
//! Settings are read from `.provcheck/provcheck.toml`, then overridden by the
//! environment, then by CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [provisioning]
//! terraform_dir = "../"
//! terraform_cmd = "terraform"
//!
//! [provisioning.vars]
//! labelPrefix = "t1"
//!
//! [run]
//! deadline_secs = 900
//! cancel_grace_secs = 60
//!
//! [teardown]
//! max_attempts = 5
//! interval_secs = 30
//!
//! [azure]
//! subscription_id = "00000000-0000-0000-0000-000000000000"
//! az_cmd = "az"
//!
//! [verification]
//! enabled = true
//! expected_os_version = "22"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::ProvisioningOptions;
use crate::errors::HarnessError;
use crate::lifecycle::{HarnessSettings, RetryPolicy};

/// Name of the configuration file inside the harness directory.
pub const CONFIG_FILE: &str = "provcheck.toml";

/// Environment variable carrying the subscription identifier.
pub const ENV_SUBSCRIPTION_ID: &str = "ARM_SUBSCRIPTION_ID";
pub const ENV_TERRAFORM_CMD: &str = "PROVCHECK_TERRAFORM_CMD";
pub const ENV_AZ_CMD: &str = "PROVCHECK_AZ_CMD";

/// What to provision and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningSection {
    /// Directory holding the terraform definition, relative to the project directory
    #[serde(default = "default_terraform_dir")]
    pub terraform_dir: PathBuf,
    /// Terraform CLI command (default: "terraform")
    #[serde(default)]
    pub terraform_cmd: Option<String>,
    /// Input variables passed to apply and destroy
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

fn default_terraform_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ProvisioningSection {
    fn default() -> Self {
        Self {
            terraform_dir: default_terraform_dir(),
            terraform_cmd: None,
            vars: BTreeMap::new(),
        }
    }
}

/// Deadline settings for the apply/verify phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// How long a timed-out worker gets to stop before teardown starts
    #[serde(default = "default_cancel_grace_secs")]
    pub cancel_grace_secs: u64,
}

fn default_deadline_secs() -> u64 {
    900
}

fn default_cancel_grace_secs() -> u64 {
    60
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            cancel_grace_secs: default_cancel_grace_secs(),
        }
    }
}

/// Destroy retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeardownSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for TeardownSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Azure verification API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureSection {
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Azure CLI command (default: "az")
    #[serde(default)]
    pub az_cmd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSection {
    #[serde(default = "default_verification_enabled")]
    pub enabled: bool,
    /// Substring the VM image SKU must contain
    #[serde(default = "default_expected_os_version")]
    pub expected_os_version: String,
}

fn default_verification_enabled() -> bool {
    true
}

fn default_expected_os_version() -> String {
    "22".to_string()
}

impl Default for VerificationSection {
    fn default() -> Self {
        Self {
            enabled: default_verification_enabled(),
            expected_os_version: default_expected_os_version(),
        }
    }
}

/// The complete provcheck.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessToml {
    #[serde(default)]
    pub provisioning: ProvisioningSection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub teardown: TeardownSection,
    #[serde(default)]
    pub azure: AzureSection,
    #[serde(default)]
    pub verification: VerificationSection,
}

impl HarnessToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse provcheck.toml")
    }

    /// Load from `<harness_dir>/provcheck.toml`, or defaults if it does not exist.
    pub fn load_or_default(harness_dir: &Path) -> Result<Self> {
        let config_path = harness_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize provcheck.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.teardown.max_attempts == 0 {
            warnings.push("teardown.max_attempts must be at least 1".to_string());
        }
        if self.run.deadline_secs == 0 {
            warnings.push("run.deadline_secs is 0: every run will time out".to_string());
        }
        if self.verification.enabled && self.verification.expected_os_version.trim().is_empty() {
            warnings.push(
                "verification.expected_os_version is empty: the OS check accepts any image"
                    .to_string(),
            );
        }
        if self.verification.enabled && self.azure.subscription_id.is_none() {
            warnings.push(format!(
                "azure.subscription_id is not set: verification relies on {} or the az default",
                ENV_SUBSCRIPTION_ID
            ));
        }
        for key in self.provisioning.vars.keys() {
            if key.trim().is_empty() || key.contains('=') {
                warnings.push(format!("Invalid variable name '{}'", key));
            }
        }

        warnings
    }
}

/// CLI overrides applied on top of file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub terraform_dir: Option<PathBuf>,
    pub vars: Vec<(String, String)>,
    pub deadline: Option<Duration>,
    pub max_attempts: Option<u32>,
    pub retry_interval: Option<Duration>,
    pub subscription_id: Option<String>,
    pub no_verify: bool,
}

/// Fully resolved settings for one invocation.
///
/// Layers, lowest to highest precedence:
/// 1. provcheck.toml
/// 2. Environment variables (including a project `.env`)
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub project_dir: PathBuf,
    pub toml: HarnessToml,
    pub cli: CliOverrides,
}

impl HarnessConfig {
    pub fn new(project_dir: PathBuf, toml: HarnessToml, cli: CliOverrides) -> Self {
        Self {
            project_dir,
            toml,
            cli,
        }
    }

    pub fn terraform_cmd(&self) -> String {
        std::env::var(ENV_TERRAFORM_CMD)
            .ok()
            .or_else(|| self.toml.provisioning.terraform_cmd.clone())
            .unwrap_or_else(|| "terraform".to_string())
    }

    pub fn az_cmd(&self) -> String {
        std::env::var(ENV_AZ_CMD)
            .ok()
            .or_else(|| self.toml.azure.az_cmd.clone())
            .unwrap_or_else(|| "az".to_string())
    }

    /// Subscription identifier; empty means "use the az CLI default".
    pub fn subscription_id(&self) -> String {
        self.cli
            .subscription_id
            .clone()
            .or_else(|| std::env::var(ENV_SUBSCRIPTION_ID).ok())
            .or_else(|| self.toml.azure.subscription_id.clone())
            .unwrap_or_default()
    }

    pub fn terraform_dir(&self) -> PathBuf {
        let dir = self
            .cli
            .terraform_dir
            .clone()
            .unwrap_or_else(|| self.toml.provisioning.terraform_dir.clone());
        if dir.is_absolute() {
            dir
        } else {
            self.project_dir.join(dir)
        }
    }

    pub fn verification_enabled(&self) -> bool {
        self.toml.verification.enabled && !self.cli.no_verify
    }

    pub fn provisioning_options(&self) -> ProvisioningOptions {
        let mut options = ProvisioningOptions::new(self.terraform_dir());
        for (k, v) in &self.toml.provisioning.vars {
            options = options.with_var(k.clone(), v.clone());
        }
        for (k, v) in &self.cli.vars {
            options = options.with_var(k.clone(), v.clone());
        }
        let subscription_id = self.subscription_id();
        if !subscription_id.is_empty() {
            options = options.with_env(ENV_SUBSCRIPTION_ID, subscription_id);
        }
        options
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, HarnessError> {
        RetryPolicy::new(
            self.cli
                .max_attempts
                .unwrap_or(self.toml.teardown.max_attempts),
            self.cli
                .retry_interval
                .unwrap_or(Duration::from_secs(self.toml.teardown.interval_secs)),
        )
    }

    pub fn settings(&self) -> Result<HarnessSettings, HarnessError> {
        Ok(HarnessSettings {
            deadline: self
                .cli
                .deadline
                .unwrap_or(Duration::from_secs(self.toml.run.deadline_secs)),
            retry: self.retry_policy()?,
            cancel_grace: Duration::from_secs(self.toml.run.cancel_grace_secs),
        })
    }
}

/// Parse `90`, `90s`, `15m` or `1h` into a duration.
pub fn parse_duration(input: &str) -> Result<Duration, HarnessError> {
    let s = input.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, 's')) => (&s[..i], 1),
        Some((i, 'm')) => (&s[..i], 60),
        Some((i, 'h')) => (&s[..i], 3600),
        Some(_) => (s, 1),
        None => return Err(HarnessError::InvalidDuration(input.to_string())),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|value| value.checked_mul(multiplier))
        .map(Duration::from_secs)
        .ok_or_else(|| HarnessError::InvalidDuration(input.to_string()))
}

/// Parse a `key=value` CLI variable.
pub fn parse_var(input: &str) -> Result<(String, String), HarnessError> {
    match input.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(HarnessError::InvalidVariable(input.to_string())),
    }
}
