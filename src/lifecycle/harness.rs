//! Full lifecycle for one test run: phase under deadline, then teardown.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::deadline::DeadlineRace;
use super::outcome::Outcome;
use super::run::{RunState, TestRun};
use super::teardown::{RetryPolicy, RetryingTeardown, TeardownResult};
use super::worker::PhaseWorker;
use crate::engine::ProvisioningEngine;
use crate::errors::HarnessError;
use crate::verify::{ResourceApi, VerificationSuite};

/// Default deadline for apply + verify.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(15 * 60);
/// Default time a timed-out worker gets to observe cancellation before teardown.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(60);
/// Extra wait past `cancel_grace` so a worker whose engine killed its child can report.
const SETTLE_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct HarnessSettings {
    pub deadline: Duration,
    pub retry: RetryPolicy,
    pub cancel_grace: Duration,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            retry: RetryPolicy::default(),
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }
}

/// How the run should be reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    PhaseFailed,
    /// Teardown exhausted its budget; takes precedence over the phase outcome
    TeardownFatal,
}

impl Verdict {
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Passed => 0,
            Verdict::PhaseFailed => 1,
            Verdict::TeardownFatal => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessReport {
    pub outcome: Outcome,
    pub teardown: TeardownResult,
    pub phase_duration: Duration,
    pub teardown_duration: Duration,
    /// False when a timed-out worker was still running when teardown began
    pub worker_settled: bool,
}

impl HarnessReport {
    pub fn verdict(&self) -> Verdict {
        if !self.teardown.succeeded {
            Verdict::TeardownFatal
        } else if self.outcome.is_success() {
            Verdict::Passed
        } else {
            Verdict::PhaseFailed
        }
    }

    /// One diagnostic line per failed stage, naming the stage and the last error.
    pub fn diagnostics(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match &self.outcome {
            Outcome::Success => {}
            Outcome::Timeout => lines.push(format!(
                "apply/verify phase timed out after {:.0}s",
                self.phase_duration.as_secs_f64()
            )),
            other => lines.push(format!("apply/verify phase failed with {}", other)),
        }
        if !self.worker_settled {
            lines.push(
                "phase worker was still running when teardown started; state may be incomplete"
                    .to_string(),
            );
        }
        if !self.teardown.succeeded {
            lines.push(format!(
                "FATAL: teardown failed after {} attempts: {}",
                self.teardown.attempts_used,
                self.teardown.last_error.as_deref().unwrap_or("unknown error")
            ));
        }
        lines
    }
}

/// Drives apply -> verify under a deadline, then always tears down.
pub struct Harness {
    worker: PhaseWorker,
    teardown: RetryingTeardown,
    settings: HarnessSettings,
}

impl Harness {
    pub fn new(
        engine: Arc<dyn ProvisioningEngine>,
        api: Arc<dyn ResourceApi>,
        suite: VerificationSuite,
        settings: HarnessSettings,
    ) -> Self {
        Self {
            worker: PhaseWorker::new(Arc::clone(&engine), api, Arc::new(suite)),
            teardown: RetryingTeardown::new(engine),
            settings,
        }
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Execute the run. Teardown runs exactly once whatever the phase outcome.
    ///
    /// Fails only if `run` is not freshly created; nothing has been provisioned then.
    pub async fn execute(&self, run: &mut TestRun) -> Result<HarnessReport, HarnessError> {
        run.advance(RunState::Running)?;
        info!(
            run_id = %run.id(),
            deadline_secs = self.settings.deadline.as_secs_f64(),
            "starting apply/verify phase"
        );

        let cancel = CancellationToken::new();
        let phase_started = Instant::now();
        let mut handle = self.worker.spawn(run, cancel.clone());
        let outcome = DeadlineRace::new(self.settings.deadline)
            .await_outcome(&mut handle)
            .await;
        let phase_duration = phase_started.elapsed();

        if let Err(e) = run.record_outcome(outcome.clone()) {
            error!(error = %e, "outcome bookkeeping failed");
        }
        transition(run, RunState::for_outcome(&outcome));

        let mut worker_settled = true;
        if outcome == Outcome::Timeout {
            cancel.cancel();
            let settle_window = self.settings.cancel_grace + SETTLE_MARGIN;
            worker_settled = handle.settle(settle_window).await;
            if !worker_settled {
                warn!(
                    grace_secs = settle_window.as_secs_f64(),
                    "phase worker did not stop after cancellation, tearing down anyway"
                );
            }
        }

        transition(run, RunState::TearingDown);
        let teardown_started = Instant::now();
        let teardown = self
            .teardown
            .teardown(run.options(), &self.settings.retry)
            .await;
        let teardown_duration = teardown_started.elapsed();

        transition(
            run,
            if teardown.succeeded {
                RunState::TornDown
            } else {
                RunState::TeardownFailed
            },
        );

        Ok(HarnessReport {
            outcome,
            teardown,
            phase_duration,
            teardown_duration,
            worker_settled,
        })
    }
}

/// Advance after the phase has started. Teardown must still run, so a rejected
/// transition is logged rather than returned.
fn transition(run: &mut TestRun, next: RunState) {
    if let Err(e) = run.advance(next) {
        error!(error = %e, "state bookkeeping failed");
    }
}
