//! Built-in checks for a single Linux VM deployment.

use async_trait::async_trait;

use super::{Check, CheckContext, CheckFailure};

/// Output naming the virtual machine.
pub const VM_NAME: &str = "vm_name";
/// Output naming the resource group.
pub const RESOURCE_GROUP_NAME: &str = "resource_group_name";
/// Output naming the network interface.
pub const NIC_NAME: &str = "nic_name";

/// The VM named by an output exists.
pub struct VmExists {
    vm_key: String,
    group_key: String,
}

impl VmExists {
    pub fn new(vm_key: &str, group_key: &str) -> Self {
        Self {
            vm_key: vm_key.to_string(),
            group_key: group_key.to_string(),
        }
    }
}

#[async_trait]
impl Check for VmExists {
    fn name(&self) -> &str {
        "VM exists"
    }

    fn required_outputs(&self) -> Vec<&str> {
        vec![self.vm_key.as_str(), self.group_key.as_str()]
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        let vm = ctx.resource(&self.vm_key, &self.group_key)?;
        if ctx.api.virtual_machine_exists(&vm).await? {
            Ok(())
        } else {
            Err(CheckFailure::Assertion(format!(
                "VM '{}' does not exist in resource group '{}'",
                vm.name, vm.resource_group
            )))
        }
    }
}

/// The NIC named by an output exists and is attached to a VM.
pub struct NicAttached {
    nic_key: String,
    group_key: String,
}

impl NicAttached {
    pub fn new(nic_key: &str, group_key: &str) -> Self {
        Self {
            nic_key: nic_key.to_string(),
            group_key: group_key.to_string(),
        }
    }
}

#[async_trait]
impl Check for NicAttached {
    fn name(&self) -> &str {
        "NIC attached"
    }

    fn required_outputs(&self) -> Vec<&str> {
        vec![self.nic_key.as_str(), self.group_key.as_str()]
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        let nic_ref = ctx.resource(&self.nic_key, &self.group_key)?;
        match ctx.api.network_interface(&nic_ref).await? {
            None => Err(CheckFailure::Assertion(format!(
                "NIC '{}' does not exist in resource group '{}'",
                nic_ref.name, nic_ref.resource_group
            ))),
            Some(nic) if nic.attached_vm.is_none() => Err(CheckFailure::Assertion(format!(
                "NIC '{}' exists but is not attached to a VM",
                nic.name
            ))),
            Some(_) => Ok(()),
        }
    }
}

/// The VM's image SKU contains an expected version string.
///
/// A substring match, so `"22"` accepts `22_04-lts` and `22_04-lts-gen2`.
pub struct ImageSkuContains {
    vm_key: String,
    group_key: String,
    expected: String,
}

impl ImageSkuContains {
    pub fn new(vm_key: &str, group_key: &str, expected: &str) -> Self {
        Self {
            vm_key: vm_key.to_string(),
            group_key: group_key.to_string(),
            expected: expected.to_string(),
        }
    }
}

#[async_trait]
impl Check for ImageSkuContains {
    fn name(&self) -> &str {
        "OS image version"
    }

    fn required_outputs(&self) -> Vec<&str> {
        vec![self.vm_key.as_str(), self.group_key.as_str()]
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
        let vm_ref = ctx.resource(&self.vm_key, &self.group_key)?;
        let sku = ctx
            .api
            .virtual_machine(&vm_ref)
            .await?
            .and_then(|vm| vm.image_sku)
            .ok_or_else(|| {
                CheckFailure::Assertion(format!(
                    "VM '{}' information is incomplete, cannot read image SKU",
                    vm_ref.name
                ))
            })?;

        if sku.contains(&self.expected) {
            Ok(())
        } else {
            Err(CheckFailure::Assertion(format!(
                "VM '{}' image SKU '{}' does not contain '{}'",
                vm_ref.name, sku, self.expected
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Outputs;
    use crate::errors::ResourceApiError;
    use crate::verify::{NetworkInterface, ResourceApi, ResourceRef, VirtualMachine};

    #[derive(Default)]
    struct FixedApi {
        vm_exists: bool,
        vm: Option<VirtualMachine>,
        nic: Option<NetworkInterface>,
        fail: bool,
    }

    impl FixedApi {
        fn error(name: &str) -> ResourceApiError {
            ResourceApiError::LookupFailed {
                kind: "resource",
                name: name.to_string(),
                message: "boom".to_string(),
            }
        }
    }

    #[async_trait]
    impl ResourceApi for FixedApi {
        async fn virtual_machine_exists(&self, r: &ResourceRef) -> Result<bool, ResourceApiError> {
            if self.fail {
                return Err(Self::error(&r.name));
            }
            Ok(self.vm_exists)
        }
        async fn virtual_machine(
            &self,
            r: &ResourceRef,
        ) -> Result<Option<VirtualMachine>, ResourceApiError> {
            if self.fail {
                return Err(Self::error(&r.name));
            }
            Ok(self.vm.clone())
        }
        async fn network_interface(
            &self,
            r: &ResourceRef,
        ) -> Result<Option<NetworkInterface>, ResourceApiError> {
            if self.fail {
                return Err(Self::error(&r.name));
            }
            Ok(self.nic.clone())
        }
    }

    fn outputs() -> Outputs {
        [
            (VM_NAME, "t1-vm"),
            (RESOURCE_GROUP_NAME, "t1-rg"),
            (NIC_NAME, "t1-nic"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    async fn run_check(check: &dyn Check, api: &FixedApi) -> Result<(), CheckFailure> {
        let outputs = outputs();
        let ctx = CheckContext {
            outputs: &outputs,
            subscription_id: "sub-1",
            api,
        };
        check.run(&ctx).await
    }

    #[tokio::test]
    async fn test_vm_exists_passes_and_fails() {
        let check = VmExists::new(VM_NAME, RESOURCE_GROUP_NAME);
        let present = FixedApi {
            vm_exists: true,
            ..Default::default()
        };
        assert!(run_check(&check, &present).await.is_ok());

        let absent = FixedApi::default();
        match run_check(&check, &absent).await {
            Err(CheckFailure::Assertion(msg)) => {
                assert!(msg.contains("t1-vm"));
                assert!(msg.contains("t1-rg"));
            }
            other => panic!("Expected assertion failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_vm_exists_api_error_propagates() {
        let check = VmExists::new(VM_NAME, RESOURCE_GROUP_NAME);
        let api = FixedApi {
            fail: true,
            ..Default::default()
        };
        assert!(matches!(
            run_check(&check, &api).await,
            Err(CheckFailure::Api(_))
        ));
    }

    #[tokio::test]
    async fn test_nic_attached_requires_attachment() {
        let check = NicAttached::new(NIC_NAME, RESOURCE_GROUP_NAME);

        let missing = FixedApi::default();
        assert!(matches!(
            run_check(&check, &missing).await,
            Err(CheckFailure::Assertion(_))
        ));

        let detached = FixedApi {
            nic: Some(NetworkInterface {
                name: "t1-nic".into(),
                attached_vm: None,
            }),
            ..Default::default()
        };
        match run_check(&check, &detached).await {
            Err(CheckFailure::Assertion(msg)) => assert!(msg.contains("not attached")),
            other => panic!("Expected assertion failure, got {other:?}"),
        }

        let attached = FixedApi {
            nic: Some(NetworkInterface {
                name: "t1-nic".into(),
                attached_vm: Some("/subscriptions/sub-1/.../t1-vm".into()),
            }),
            ..Default::default()
        };
        assert!(run_check(&check, &attached).await.is_ok());
    }

    #[tokio::test]
    async fn test_image_sku_substring_match() {
        let check = ImageSkuContains::new(VM_NAME, RESOURCE_GROUP_NAME, "22");
        for sku in ["22_04-lts", "22_04-lts-gen2"] {
            let api = FixedApi {
                vm: Some(VirtualMachine {
                    name: "t1-vm".into(),
                    image_sku: Some(sku.into()),
                }),
                ..Default::default()
            };
            assert!(run_check(&check, &api).await.is_ok(), "sku {sku}");
        }

        let wrong = FixedApi {
            vm: Some(VirtualMachine {
                name: "t1-vm".into(),
                image_sku: Some("20_04-lts".into()),
            }),
            ..Default::default()
        };
        match run_check(&check, &wrong).await {
            Err(CheckFailure::Assertion(msg)) => assert!(msg.contains("20_04-lts")),
            other => panic!("Expected assertion failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_image_sku_incomplete_vm_info() {
        let check = ImageSkuContains::new(VM_NAME, RESOURCE_GROUP_NAME, "22");
        let api = FixedApi {
            vm: Some(VirtualMachine {
                name: "t1-vm".into(),
                image_sku: None,
            }),
            ..Default::default()
        };
        match run_check(&check, &api).await {
            Err(CheckFailure::Assertion(msg)) => assert!(msg.contains("incomplete")),
            other => panic!("Expected assertion failure, got {other:?}"),
        }
    }

    #[test]
    fn test_required_outputs() {
        let check = NicAttached::new(NIC_NAME, RESOURCE_GROUP_NAME);
        assert_eq!(check.required_outputs(), vec!["nic_name", "resource_group_name"]);
    }
}
