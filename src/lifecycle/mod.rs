//! Test-run lifecycle: apply -> verify under a deadline, then retrying teardown.
//!
//! | Module     | Role                                                          |
//! |------------|---------------------------------------------------------------|
//! | `outcome`  | `Outcome` and the write-once worker -> caller handoff          |
//! | `run`      | `TestRun` and its state machine                               |
//! | `worker`   | `PhaseWorker`, the background apply/outputs/verify task        |
//! | `deadline` | `DeadlineRace`, worker completion vs. wall clock              |
//! | `teardown` | `RetryingTeardown` with `RetryPolicy`                         |
//! | `harness`  | `Harness`, composes all of the above                           |

pub mod deadline;
pub mod harness;
pub mod outcome;
pub mod run;
pub mod teardown;
pub mod worker;

pub use deadline::DeadlineRace;
pub use harness::{Harness, HarnessReport, HarnessSettings, Verdict};
pub use outcome::{Outcome, OutcomeReceiver, OutcomeWriter, outcome_slot};
pub use run::{RunState, TestRun};
pub use teardown::{RetryPolicy, RetryingTeardown, TeardownResult};
pub use worker::{PhaseWorker, WorkerHandle};
