//! Provisioning engine abstraction.
//!
//! The harness never talks to a cloud provider directly for provisioning; it drives
//! an engine through three operations:
//! - `apply`: create/update infrastructure and return its outputs
//! - `output`: read a single named output after apply
//! - `destroy`: remove everything the definition created
//!
//! `TerraformCli` is the real implementation. Tests substitute an in-memory double.

pub mod terraform;

pub use terraform::TerraformCli;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::errors::EngineError;

/// Named outputs exposed by the engine after apply.
pub type Outputs = BTreeMap<String, String>;

/// Immutable configuration handed to every engine call.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProvisioningOptions {
    /// Directory holding the infrastructure definition
    pub working_dir: PathBuf,
    /// Input variables passed as `-var key=value`
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    /// Extra environment for the engine process
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ProvisioningOptions {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            vars: BTreeMap::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Black-box provisioning engine.
///
/// `apply` and `output` observe the cancellation token and return
/// `EngineError::Cancelled` once it fires; interrupting an in-flight provider call is
/// best-effort. `destroy` is never cancelled and is assumed idempotent.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    async fn apply(
        &self,
        options: &ProvisioningOptions,
        cancel: &CancellationToken,
    ) -> Result<Outputs, EngineError>;

    async fn output(
        &self,
        options: &ProvisioningOptions,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError>;

    async fn destroy(&self, options: &ProvisioningOptions) -> Result<String, EngineError>;
}
