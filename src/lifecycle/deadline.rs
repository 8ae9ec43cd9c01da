//! Race the phase worker against a wall-clock deadline.

use std::time::Duration;
use tracing::warn;

use super::outcome::Outcome;
use super::worker::WorkerHandle;

#[derive(Debug, Clone, Copy)]
pub struct DeadlineRace {
    deadline: Duration,
}

impl DeadlineRace {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Block until the worker reports or the deadline elapses.
    ///
    /// On timeout the worker is left running; stopping it is the caller's decision.
    pub async fn await_outcome(&self, handle: &mut WorkerHandle) -> Outcome {
        match tokio::time::timeout(self.deadline, handle.receiver.recv()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    deadline_secs = self.deadline.as_secs_f64(),
                    "deadline reached before the phase reported"
                );
                Outcome::Timeout
            }
        }
    }
}
