//! Background apply -> read outputs -> verify unit of work.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::outcome::{Outcome, OutcomeReceiver, outcome_slot};
use super::run::TestRun;
use crate::engine::{ProvisioningEngine, ProvisioningOptions};
use crate::verify::{ResourceApi, VerificationSuite};

/// Collaborators the phase needs, shared with the spawned task.
#[derive(Clone)]
pub struct PhaseWorker {
    engine: Arc<dyn ProvisioningEngine>,
    api: Arc<dyn ResourceApi>,
    suite: Arc<VerificationSuite>,
}

/// Handle to a spawned phase.
///
/// Dropping the handle does not stop the task.
pub struct WorkerHandle {
    pub(crate) receiver: OutcomeReceiver,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait up to `grace` for the task to exit. Returns whether it did.
    pub async fn settle(&mut self, grace: Duration) -> bool {
        if self.join.is_finished() {
            return true;
        }
        tokio::time::timeout(grace, &mut self.join).await.is_ok()
    }
}

impl PhaseWorker {
    pub fn new(
        engine: Arc<dyn ProvisioningEngine>,
        api: Arc<dyn ResourceApi>,
        suite: Arc<VerificationSuite>,
    ) -> Self {
        Self { engine, api, suite }
    }

    /// Spawn the phase on the runtime.
    ///
    /// Exactly one outcome is published, including on early failure paths; a panic
    /// inside the task drops the writer and the receiver reports a provisioning failure.
    pub fn spawn(&self, run: &TestRun, cancel: CancellationToken) -> WorkerHandle {
        let (writer, receiver) = outcome_slot();
        let worker = self.clone();
        let options = run.shared_options();
        let subscription_id = run.subscription_id().to_string();
        let run_id = run.id();

        let join = tokio::spawn(async move {
            let outcome = worker.run(&options, &subscription_id, &cancel).await;
            info!(run_id = %run_id, outcome = %outcome, "phase finished");
            if !writer.publish(outcome) {
                debug!(run_id = %run_id, "outcome discarded, caller no longer waiting");
            }
        });

        WorkerHandle { receiver, join }
    }

    /// Run the phase inline: apply, read every output the suite needs, verify.
    pub async fn run(
        &self,
        options: &ProvisioningOptions,
        subscription_id: &str,
        cancel: &CancellationToken,
    ) -> Outcome {
        info!(dir = %options.working_dir.display(), "applying infrastructure");
        let mut outputs = match self.engine.apply(options, cancel).await {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!(error = %e, "apply failed");
                return Outcome::ProvisioningFailure(format!("apply failed: {}", e));
            }
        };
        info!(outputs = outputs.len(), "apply completed");

        for key in self.suite.required_outputs() {
            match self.engine.output(options, &key, cancel).await {
                Ok(value) if !value.is_empty() => {
                    outputs.insert(key, value);
                }
                Ok(_) => {
                    return Outcome::ProvisioningFailure(format!("output '{}' is empty", key));
                }
                Err(e) => {
                    return Outcome::ProvisioningFailure(format!(
                        "reading output '{}' failed: {}",
                        key, e
                    ));
                }
            }
        }

        self.suite
            .verify(&outputs, subscription_id, self.api.as_ref(), cancel)
            .await
    }
}
