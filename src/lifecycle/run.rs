//! A single test run and its lifecycle state machine.
//!
//! ```text
//! Created -> Running -> { Succeeded | VerificationFailed | ProvisioningFailed | TimedOut }
//!         -> TearingDown -> { TornDown | TeardownFailed }
//! ```
//!
//! `TearingDown` is reachable from every phase-terminal state.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use super::outcome::Outcome;
use crate::engine::ProvisioningOptions;
use crate::errors::HarnessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Created,
    Running,
    Succeeded,
    VerificationFailed,
    ProvisioningFailed,
    TimedOut,
    TearingDown,
    TornDown,
    /// Fatal: destroy exhausted its retry budget
    TeardownFailed,
}

impl RunState {
    /// Phase-terminal state corresponding to an outcome.
    pub fn for_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success => RunState::Succeeded,
            Outcome::VerificationFailure(_) => RunState::VerificationFailed,
            Outcome::ProvisioningFailure(_) => RunState::ProvisioningFailed,
            Outcome::Timeout => RunState::TimedOut,
        }
    }

    pub fn is_phase_terminal(self) -> bool {
        matches!(
            self,
            RunState::Succeeded
                | RunState::VerificationFailed
                | RunState::ProvisioningFailed
                | RunState::TimedOut
        )
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        match self {
            RunState::Created => next == RunState::Running,
            RunState::Running => next.is_phase_terminal(),
            s if s.is_phase_terminal() => next == RunState::TearingDown,
            RunState::TearingDown => {
                matches!(next, RunState::TornDown | RunState::TeardownFailed)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Created => "created",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::VerificationFailed => "verification_failed",
            RunState::ProvisioningFailed => "provisioning_failed",
            RunState::TimedOut => "timed_out",
            RunState::TearingDown => "tearing_down",
            RunState::TornDown => "torn_down",
            RunState::TeardownFailed => "teardown_failed",
        };
        write!(f, "{}", s)
    }
}

/// One execution of the apply -> verify -> destroy lifecycle.
///
/// Owned by the caller. The worker only receives a shared handle to the options;
/// the resolved outcome is recorded here once.
#[derive(Debug)]
pub struct TestRun {
    id: Uuid,
    options: Arc<ProvisioningOptions>,
    subscription_id: String,
    state: RunState,
    outcome: OnceLock<Outcome>,
}

impl TestRun {
    pub fn new(options: ProvisioningOptions, subscription_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            options: Arc::new(options),
            subscription_id: subscription_id.into(),
            state: RunState::Created,
            outcome: OnceLock::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &ProvisioningOptions {
        &self.options
    }

    /// Shared handle for the background worker.
    pub fn shared_options(&self) -> Arc<ProvisioningOptions> {
        Arc::clone(&self.options)
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn advance(&mut self, next: RunState) -> Result<(), HarnessError> {
        if !self.state.can_transition_to(next) {
            return Err(HarnessError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Record the resolved outcome. Rejected if one is already recorded.
    pub fn record_outcome(&self, outcome: Outcome) -> Result<(), HarnessError> {
        self.outcome
            .set(outcome)
            .map_err(|_| HarnessError::OutcomeAlreadyRecorded { run_id: self.id })
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.get()
    }
}
