//! `az` CLI driver for the resource-state API.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{NetworkInterface, ResourceApi, ResourceRef, VirtualMachine};
use crate::errors::ResourceApiError;
use crate::process::{STDERR_TAIL_LINES, run_captured, tail_lines};

/// Markers the Azure CLI prints when a resource does not exist.
const NOT_FOUND_MARKERS: &[&str] = &["ResourceNotFound", "ResourceGroupNotFound", "was not found"];

/// Queries Azure resource state through the `az` binary.
#[derive(Debug, Clone)]
pub struct AzureCli {
    program: String,
}

impl Default for AzureCli {
    fn default() -> Self {
        Self::new("az")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmRecord {
    name: String,
    #[serde(default)]
    storage_profile: Option<StorageProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageProfile {
    #[serde(default)]
    image_reference: Option<ImageReference>,
}

#[derive(Debug, Deserialize)]
struct ImageReference {
    #[serde(default)]
    sku: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NicRecord {
    name: String,
    #[serde(default)]
    virtual_machine: Option<SubResource>,
}

#[derive(Debug, Deserialize)]
struct SubResource {
    id: String,
}

impl AzureCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `az <group> show` for one resource, returning `None` when it does not exist.
    async fn show(
        &self,
        kind: &'static str,
        group_args: &[&str],
        resource: &ResourceRef,
    ) -> Result<Option<String>, ResourceApiError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(group_args)
            .arg("show")
            .args(["--name", resource.name.as_str()])
            .args(["--resource-group", resource.resource_group.as_str()])
            .args(["--output", "json"]);
        if !resource.subscription_id.is_empty() {
            cmd.args(["--subscription", resource.subscription_id.as_str()]);
        }

        let command = format!("{} {} show", self.program, group_args.join(" "));
        debug!(command = %command, name = %resource.name, "querying resource");

        let output = run_captured(cmd, None, Duration::ZERO)
            .await
            .map_err(|source| ResourceApiError::SpawnFailed {
                command: command.clone(),
                source,
            })?
            .ok_or_else(|| ResourceApiError::LookupFailed {
                kind,
                name: resource.name.clone(),
                message: "lookup interrupted".to_string(),
            })?;

        if output.success() {
            return Ok(Some(output.stdout));
        }
        if is_not_found(&output.stderr) {
            return Ok(None);
        }
        Err(ResourceApiError::LookupFailed {
            kind,
            name: resource.name.clone(),
            message: tail_lines(&output.stderr, STDERR_TAIL_LINES),
        })
    }
}

pub fn is_not_found(stderr: &str) -> bool {
    NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m))
}

pub fn parse_virtual_machine(json: &str) -> Result<VirtualMachine, serde_json::Error> {
    let record: VmRecord = serde_json::from_str(json)?;
    Ok(VirtualMachine {
        name: record.name,
        image_sku: record
            .storage_profile
            .and_then(|p| p.image_reference)
            .and_then(|r| r.sku),
    })
}

pub fn parse_network_interface(json: &str) -> Result<NetworkInterface, serde_json::Error> {
    let record: NicRecord = serde_json::from_str(json)?;
    Ok(NetworkInterface {
        name: record.name,
        attached_vm: record.virtual_machine.map(|vm| vm.id),
    })
}

#[async_trait]
impl ResourceApi for AzureCli {
    async fn virtual_machine_exists(
        &self,
        resource: &ResourceRef,
    ) -> Result<bool, ResourceApiError> {
        Ok(self.virtual_machine(resource).await?.is_some())
    }

    async fn virtual_machine(
        &self,
        resource: &ResourceRef,
    ) -> Result<Option<VirtualMachine>, ResourceApiError> {
        const KIND: &str = "virtual machine";
        let Some(json) = self.show(KIND, &["vm"], resource).await? else {
            return Ok(None);
        };
        parse_virtual_machine(&json)
            .map(Some)
            .map_err(|source| ResourceApiError::Decode {
                kind: KIND,
                name: resource.name.clone(),
                source,
            })
    }

    async fn network_interface(
        &self,
        resource: &ResourceRef,
    ) -> Result<Option<NetworkInterface>, ResourceApiError> {
        const KIND: &str = "network interface";
        let Some(json) = self.show(KIND, &["network", "nic"], resource).await? else {
            return Ok(None);
        };
        parse_network_interface(&json)
            .map(Some)
            .map_err(|source| ResourceApiError::Decode {
                kind: KIND,
                name: resource.name.clone(),
                source,
            })
    }
}
