//! `terraform` CLI driver.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Outputs, ProvisioningEngine, ProvisioningOptions};
use crate::errors::EngineError;
use crate::process::{STDERR_TAIL_LINES, run_captured, tail_lines};

/// How long a cancelled terraform gets to finish after SIGINT before it is killed.
pub const DEFAULT_INTERRUPT_GRACE: Duration = Duration::from_secs(30);

/// Drives the `terraform` binary as a subprocess.
///
/// A cancelled `apply` is interrupted rather than killed, so terraform can write
/// state for resources it already created and release any backend lock.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    program: String,
    interrupt_grace: Duration,
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new("terraform")
    }
}

impl TerraformCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            interrupt_grace: DEFAULT_INTERRUPT_GRACE,
        }
    }

    pub fn with_interrupt_grace(mut self, grace: Duration) -> Self {
        self.interrupt_grace = grace;
        self
    }

    pub fn interrupt_grace(&self) -> Duration {
        self.interrupt_grace
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, options: &ProvisioningOptions, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(&options.working_dir)
            .envs(&options.env)
            .env("TF_IN_AUTOMATION", "1");
        cmd
    }

    /// Run one terraform subcommand and return its stdout.
    async fn execute(
        &self,
        options: &ProvisioningOptions,
        args: Vec<String>,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, EngineError> {
        // Only the subcommand is named in errors; -var values may be sensitive.
        let label = format!(
            "{} {}",
            self.program,
            args.first().map(String::as_str).unwrap_or_default()
        );
        debug!(command = %label, dir = %options.working_dir.display(), "running terraform");

        let output = run_captured(self.command(options, &args), cancel, self.interrupt_grace)
            .await
            .map_err(|source| EngineError::SpawnFailed {
                command: label.clone(),
                source,
            })?
            .ok_or_else(|| EngineError::Cancelled {
                command: label.clone(),
            })?;

        if !output.success() {
            return Err(EngineError::NonZeroExit {
                command: label,
                exit_code: output.exit_code,
                stderr: tail_lines(&output.stderr, STDERR_TAIL_LINES),
            });
        }
        Ok(output.stdout)
    }
}

fn var_args(options: &ProvisioningOptions) -> Vec<String> {
    options
        .vars
        .iter()
        .flat_map(|(k, v)| ["-var".to_string(), format!("{}={}", k, v)])
        .collect()
}

pub fn init_args() -> Vec<String> {
    ["init", "-input=false", "-no-color"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn apply_args(options: &ProvisioningOptions) -> Vec<String> {
    let mut args: Vec<String> = ["apply", "-auto-approve", "-input=false", "-no-color"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.extend(var_args(options));
    args
}

pub fn destroy_args(options: &ProvisioningOptions) -> Vec<String> {
    let mut args: Vec<String> = ["destroy", "-auto-approve", "-input=false", "-no-color"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.extend(var_args(options));
    args
}

/// Parse `terraform output -json` into a flat map.
///
/// String values are kept verbatim; any other JSON value is rendered compactly.
pub fn parse_outputs(json: &str) -> Result<Outputs, serde_json::Error> {
    #[derive(serde::Deserialize)]
    struct OutputValue {
        value: serde_json::Value,
    }

    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Outputs::new());
    }
    let raw: std::collections::BTreeMap<String, OutputValue> = serde_json::from_str(trimmed)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| {
            let value = match v.value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}

#[async_trait]
impl ProvisioningEngine for TerraformCli {
    async fn apply(
        &self,
        options: &ProvisioningOptions,
        cancel: &CancellationToken,
    ) -> Result<Outputs, EngineError> {
        info!(dir = %options.working_dir.display(), "terraform init");
        self.execute(options, init_args(), Some(cancel)).await?;

        info!(vars = options.vars.len(), "terraform apply");
        self.execute(options, apply_args(options), Some(cancel)).await?;

        let args = vec!["output".to_string(), "-json".to_string(), "-no-color".to_string()];
        let stdout = self.execute(options, args, Some(cancel)).await?;
        parse_outputs(&stdout).map_err(|e| EngineError::MalformedOutput {
            command: format!("{} output -json", self.program),
            message: e.to_string(),
        })
    }

    async fn output(
        &self,
        options: &ProvisioningOptions,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        let args = vec![
            "output".to_string(),
            "-raw".to_string(),
            "-no-color".to_string(),
            key.to_string(),
        ];
        let stdout = self.execute(options, args, Some(cancel)).await?;
        let value = stdout.trim().to_string();
        if value.is_empty() {
            return Err(EngineError::MissingOutput {
                key: key.to_string(),
            });
        }
        Ok(value)
    }

    async fn destroy(&self, options: &ProvisioningOptions) -> Result<String, EngineError> {
        self.execute(options, destroy_args(options), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ProvisioningOptions {
        ProvisioningOptions::new(".")
            .with_var("labelPrefix", "t1")
            .with_var("admin_user", "azureadmin")
    }

    #[test]
    fn test_apply_args_are_non_interactive_and_carry_vars() {
        let args = apply_args(&options());
        assert_eq!(args[0], "apply");
        assert!(args.contains(&"-auto-approve".to_string()));
        assert!(args.contains(&"-input=false".to_string()));
        // BTreeMap ordering: admin_user before labelPrefix
        let tail: Vec<&str> = args[4..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec!["-var", "admin_user=azureadmin", "-var", "labelPrefix=t1"]
        );
    }

    #[test]
    fn test_destroy_args_carry_same_vars_as_apply() {
        let opts = options();
        assert_eq!(apply_args(&opts)[4..], destroy_args(&opts)[4..]);
        assert_eq!(destroy_args(&opts)[0], "destroy");
    }

    #[test]
    fn test_init_args() {
        assert_eq!(init_args(), vec!["init", "-input=false", "-no-color"]);
    }

    #[test]
    fn test_parse_outputs_flattens_values() {
        let json = r#"{
            "vm_name": {"sensitive": false, "type": "string", "value": "t1-vm"},
            "resource_group_name": {"sensitive": false, "type": "string", "value": "t1-rg"},
            "public_ip_count": {"sensitive": false, "type": "number", "value": 2},
            "tags": {"sensitive": false, "type": ["map", "string"], "value": {"env": "test"}}
        }"#;
        let outputs = parse_outputs(json).unwrap();
        assert_eq!(outputs.get("vm_name").map(String::as_str), Some("t1-vm"));
        assert_eq!(
            outputs.get("resource_group_name").map(String::as_str),
            Some("t1-rg")
        );
        assert_eq!(outputs.get("public_ip_count").map(String::as_str), Some("2"));
        assert_eq!(
            outputs.get("tags").map(String::as_str),
            Some(r#"{"env":"test"}"#)
        );
    }

    #[test]
    fn test_parse_outputs_empty_input_is_empty_map() {
        assert!(parse_outputs("").unwrap().is_empty());
        assert!(parse_outputs("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_outputs_rejects_garbage() {
        assert!(parse_outputs("not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_maps_to_spawn_failed() {
        let tf = TerraformCli::new("/nonexistent/terraform");
        let err = tf.destroy(&options()).await.unwrap_err();
        match err {
            EngineError::SpawnFailed { command, .. } => {
                assert_eq!(command, "/nonexistent/terraform destroy");
            }
            other => panic!("Expected SpawnFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_interrupt_grace_defaults_and_overrides() {
        let tf = TerraformCli::new("terraform");
        assert_eq!(tf.interrupt_grace(), DEFAULT_INTERRUPT_GRACE);
        let tf = tf.with_interrupt_grace(Duration::from_secs(5));
        assert_eq!(tf.interrupt_grace(), Duration::from_secs(5));
    }

    /// A terraform stand-in whose `apply` saves state when interrupted.
    #[cfg(unix)]
    fn fake_terraform(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("terraform");
        let script = r#"#!/bin/sh
case "$1" in
  apply)
    trap 'echo saved > state_saved; exit 1' INT TERM
    touch apply_started
    while true; do sleep 0.1; done
    ;;
  *) exit 0 ;;
esac
"#;
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_apply_lets_terraform_save_state() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_terraform(dir.path());
        let tf = TerraformCli::new(program.clone()).with_interrupt_grace(Duration::from_secs(20));
        let opts = ProvisioningOptions::new(dir.path());
        let cancel = CancellationToken::new();

        let canceller = {
            let started = dir.path().join("apply_started");
            let cancel = cancel.clone();
            tokio::spawn(async move {
                while !started.exists() {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                cancel.cancel();
            })
        };

        let result = tokio::time::timeout(Duration::from_secs(30), tf.apply(&opts, &cancel))
            .await
            .expect("apply did not return after cancellation");
        canceller.await.unwrap();

        match result {
            Err(EngineError::Cancelled { command }) => {
                assert_eq!(command, format!("{program} apply"));
            }
            other => panic!("Expected Cancelled, got {other:?}"),
        }
        let saved = std::fs::read_to_string(dir.path().join("state_saved")).unwrap();
        assert_eq!(saved.trim(), "saved");
    }
}
