//! Verification of provisioned infrastructure.
//!
//! A `VerificationSuite` is an ordered list of `Check`s. Each check reads named
//! engine outputs and queries a `ResourceApi`; the first failing check stops the
//! suite. Checks never mutate provider state.
//!
//! | Failure                              | Outcome               |
//! |--------------------------------------|-----------------------|
//! | API call returned an error           | `ProvisioningFailure` |
//! | API answered, predicate not satisfied | `VerificationFailure` |

pub mod azure;
pub mod checks;

pub use azure::AzureCli;
pub use checks::{ImageSkuContains, NicAttached, VmExists};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::Outputs;
use crate::errors::ResourceApiError;
use crate::lifecycle::Outcome;

/// Identifies one provider resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub name: String,
    pub resource_group: String,
    pub subscription_id: String,
}

/// The subset of a virtual machine record the checks look at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub name: String,
    /// Image SKU from the storage profile, e.g. `22_04-lts-gen2`
    pub image_sku: Option<String>,
}

/// The subset of a network interface record the checks look at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    /// Resource id of the VM this NIC is attached to, if any
    pub attached_vm: Option<String>,
}

/// Black-box resource-state API.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn virtual_machine_exists(&self, resource: &ResourceRef)
    -> Result<bool, ResourceApiError>;

    async fn virtual_machine(
        &self,
        resource: &ResourceRef,
    ) -> Result<Option<VirtualMachine>, ResourceApiError>;

    async fn network_interface(
        &self,
        resource: &ResourceRef,
    ) -> Result<Option<NetworkInterface>, ResourceApiError>;
}

/// Everything a check may consult.
pub struct CheckContext<'a> {
    pub outputs: &'a Outputs,
    pub subscription_id: &'a str,
    pub api: &'a dyn ResourceApi,
}

impl CheckContext<'_> {
    /// Look up a named output; absence is an assertion failure.
    pub fn output(&self, key: &str) -> Result<&str, CheckFailure> {
        self.outputs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| CheckFailure::Assertion(format!("output '{}' is not available", key)))
    }

    /// Build a resource reference from two named outputs.
    pub fn resource(&self, name_key: &str, group_key: &str) -> Result<ResourceRef, CheckFailure> {
        Ok(ResourceRef {
            name: self.output(name_key)?.to_string(),
            resource_group: self.output(group_key)?.to_string(),
            subscription_id: self.subscription_id.to_string(),
        })
    }
}

/// Why a single check failed.
#[derive(Debug)]
pub enum CheckFailure {
    /// The verification API call itself failed
    Api(ResourceApiError),
    /// The API answered but the predicate does not hold
    Assertion(String),
}

impl From<ResourceApiError> for CheckFailure {
    fn from(err: ResourceApiError) -> Self {
        CheckFailure::Api(err)
    }
}

#[async_trait]
pub trait Check: Send + Sync {
    /// Human-readable name used in failure reasons.
    fn name(&self) -> &str;

    /// Output keys this check reads.
    fn required_outputs(&self) -> Vec<&str>;

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), CheckFailure>;
}

/// Ordered, fail-fast sequence of checks.
#[derive(Default)]
pub struct VerificationSuite {
    checks: Vec<Box<dyn Check>>,
}

impl VerificationSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check(mut self, check: impl Check + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// VM exists, its NIC is attached, and the VM runs the expected OS version.
    pub fn linux_vm(expected_os_version: &str) -> Self {
        Self::new()
            .with_check(VmExists::new(checks::VM_NAME, checks::RESOURCE_GROUP_NAME))
            .with_check(NicAttached::new(
                checks::NIC_NAME,
                checks::RESOURCE_GROUP_NAME,
            ))
            .with_check(ImageSkuContains::new(
                checks::VM_NAME,
                checks::RESOURCE_GROUP_NAME,
                expected_os_version,
            ))
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Ordered, de-duplicated union of every check's required outputs.
    pub fn required_outputs(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for key in self.checks.iter().flat_map(|c| c.required_outputs()) {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        keys
    }

    /// Run every check in order and classify the first failure.
    ///
    /// The cancellation token is consulted before each check; a cancelled suite
    /// reports a provisioning failure since the result is no longer observed.
    pub async fn verify(
        &self,
        outputs: &Outputs,
        subscription_id: &str,
        api: &dyn ResourceApi,
        cancel: &CancellationToken,
    ) -> Outcome {
        let ctx = CheckContext {
            outputs,
            subscription_id,
            api,
        };

        for check in &self.checks {
            if cancel.is_cancelled() {
                return Outcome::ProvisioningFailure(format!(
                    "verification cancelled before check '{}'",
                    check.name()
                ));
            }

            debug!(check = check.name(), "running verification check");
            match check.run(&ctx).await {
                Ok(()) => info!(check = check.name(), "verification check passed"),
                Err(CheckFailure::Api(e)) => {
                    return Outcome::ProvisioningFailure(format!(
                        "check '{}' could not query the provider: {}",
                        check.name(),
                        e
                    ));
                }
                Err(CheckFailure::Assertion(reason)) => {
                    return Outcome::VerificationFailure(format!(
                        "check '{}' failed: {}",
                        check.name(),
                        reason
                    ));
                }
            }
        }

        Outcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoApi;

    #[async_trait]
    impl ResourceApi for NoApi {
        async fn virtual_machine_exists(&self, _: &ResourceRef) -> Result<bool, ResourceApiError> {
            Ok(true)
        }
        async fn virtual_machine(
            &self,
            _: &ResourceRef,
        ) -> Result<Option<VirtualMachine>, ResourceApiError> {
            Ok(None)
        }
        async fn network_interface(
            &self,
            _: &ResourceRef,
        ) -> Result<Option<NetworkInterface>, ResourceApiError> {
            Ok(None)
        }
    }

    enum Behaviour {
        Pass,
        Assert,
        ApiError,
    }

    struct CountingCheck {
        name: String,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl CountingCheck {
        fn new(name: &str, behaviour: Behaviour) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name: name.to_string(),
                    behaviour,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Check for CountingCheck {
        fn name(&self) -> &str {
            &self.name
        }
        fn required_outputs(&self) -> Vec<&str> {
            vec!["vm_name"]
        }
        async fn run(&self, _ctx: &CheckContext<'_>) -> Result<(), CheckFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Pass => Ok(()),
                Behaviour::Assert => Err(CheckFailure::Assertion("observed false".into())),
                Behaviour::ApiError => Err(CheckFailure::Api(ResourceApiError::LookupFailed {
                    kind: "virtual machine",
                    name: "vm".into(),
                    message: "throttled".into(),
                })),
            }
        }
    }

    #[tokio::test]
    async fn test_verify_all_pass_is_success() {
        let (a, a_calls) = CountingCheck::new("a", Behaviour::Pass);
        let (b, b_calls) = CountingCheck::new("b", Behaviour::Pass);
        let suite = VerificationSuite::new().with_check(a).with_check(b);
        let outcome = suite
            .verify(&Outputs::new(), "sub", &NoApi, &CancellationToken::new())
            .await;
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verify_short_circuits_on_first_failure() {
        let (a, a_calls) = CountingCheck::new("VM exists", Behaviour::Assert);
        let (b, b_calls) = CountingCheck::new("NIC attached", Behaviour::Pass);
        let suite = VerificationSuite::new().with_check(a).with_check(b);
        let outcome = suite
            .verify(&Outputs::new(), "sub", &NoApi, &CancellationToken::new())
            .await;
        match outcome {
            Outcome::VerificationFailure(reason) => {
                assert!(reason.contains("VM exists"));
                assert!(reason.contains("observed false"));
            }
            other => panic!("Expected VerificationFailure, got {other:?}"),
        }
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_verify_api_error_is_provisioning_failure() {
        let (a, _) = CountingCheck::new("VM exists", Behaviour::ApiError);
        let suite = VerificationSuite::new().with_check(a);
        let outcome = suite
            .verify(&Outputs::new(), "sub", &NoApi, &CancellationToken::new())
            .await;
        match outcome {
            Outcome::ProvisioningFailure(reason) => assert!(reason.contains("throttled")),
            other => panic!("Expected ProvisioningFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_verify_cancelled_runs_no_checks() {
        let (a, a_calls) = CountingCheck::new("a", Behaviour::Pass);
        let suite = VerificationSuite::new().with_check(a);
        let token = CancellationToken::new();
        token.cancel();
        let outcome = suite.verify(&Outputs::new(), "sub", &NoApi, &token).await;
        assert!(matches!(outcome, Outcome::ProvisioningFailure(_)));
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_suite_is_success() {
        let suite = VerificationSuite::new();
        assert!(suite.is_empty());
        let outcome = suite
            .verify(&Outputs::new(), "sub", &NoApi, &CancellationToken::new())
            .await;
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn test_linux_vm_suite_outputs_are_deduplicated_in_order() {
        let suite = VerificationSuite::linux_vm("22");
        assert_eq!(suite.len(), 3);
        assert_eq!(
            suite.required_outputs(),
            vec!["vm_name", "resource_group_name", "nic_name"]
        );
    }

    #[test]
    fn test_check_context_missing_output_is_assertion() {
        let outputs = Outputs::new();
        let ctx = CheckContext {
            outputs: &outputs,
            subscription_id: "sub",
            api: &NoApi,
        };
        assert!(matches!(
            ctx.output("vm_name"),
            Err(CheckFailure::Assertion(_))
        ));
    }
}
