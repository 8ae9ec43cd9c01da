//! Phase outcome and the write-once handoff between worker and caller.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Terminal result of the apply + verify phase. Exactly one per test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// Infrastructure exists but failed an assertion
    VerificationFailure(String),
    /// Apply, output read, or a provider query failed
    ProvisioningFailure(String),
    /// The deadline elapsed before the worker reported
    Timeout,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Short label for summaries and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::VerificationFailure(_) => "verification failure",
            Outcome::ProvisioningFailure(_) => "provisioning failure",
            Outcome::Timeout => "timeout",
        }
    }

    /// Underlying reason, if the variant carries one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::VerificationFailure(r) | Outcome::ProvisioningFailure(r) => Some(r.as_str()),
            Outcome::Success | Outcome::Timeout => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.label(), reason),
            None => write!(f, "{}", self.label()),
        }
    }
}

/// Reported when the worker went away without publishing.
pub const WORKER_VANISHED: &str = "phase worker exited without reporting an outcome";

/// Create a connected writer/receiver pair.
///
/// The writer is consumed by `publish`, so the slot can be written at most once.
pub fn outcome_slot() -> (OutcomeWriter, OutcomeReceiver) {
    let (tx, rx) = oneshot::channel();
    (OutcomeWriter { tx }, OutcomeReceiver { rx })
}

/// Worker side of the slot.
#[derive(Debug)]
pub struct OutcomeWriter {
    tx: oneshot::Sender<Outcome>,
}

impl OutcomeWriter {
    /// Publish the outcome. Returns `false` if the caller stopped listening.
    pub fn publish(self, outcome: Outcome) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

/// Caller side of the slot.
#[derive(Debug)]
pub struct OutcomeReceiver {
    rx: oneshot::Receiver<Outcome>,
}

impl OutcomeReceiver {
    /// Wait for the worker's outcome.
    ///
    /// A writer dropped without publishing (panic, abort) resolves to a provisioning
    /// failure. Cancel-safe: dropping this future leaves the slot intact.
    pub async fn recv(&mut self) -> Outcome {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::ProvisioningFailure(WORKER_VANISHED.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Success.to_string(), "success");
        assert_eq!(Outcome::Timeout.to_string(), "timeout");
        assert_eq!(
            Outcome::VerificationFailure("VM missing".into()).to_string(),
            "verification failure: VM missing"
        );
        assert_eq!(
            Outcome::ProvisioningFailure("apply failed".into()).to_string(),
            "provisioning failure: apply failed"
        );
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::VerificationFailure("x".into())).unwrap();
        assert_eq!(json["kind"], "verification_failure");
        assert_eq!(json["reason"], "x");

        let json = serde_json::to_value(Outcome::Timeout).unwrap();
        assert_eq!(json["kind"], "timeout");
    }

    #[test]
    fn test_only_success_is_success() {
        assert!(Outcome::Success.is_success());
        assert!(!Outcome::Timeout.is_success());
        assert!(!Outcome::VerificationFailure(String::new()).is_success());
        assert!(!Outcome::ProvisioningFailure(String::new()).is_success());
    }

    #[tokio::test]
    async fn test_slot_delivers_published_outcome() {
        let (writer, mut receiver) = outcome_slot();
        assert!(writer.publish(Outcome::Success));
        assert_eq!(receiver.recv().await, Outcome::Success);
    }

    #[tokio::test]
    async fn test_slot_dropped_writer_is_provisioning_failure() {
        let (writer, mut receiver) = outcome_slot();
        drop(writer);
        assert_eq!(
            receiver.recv().await,
            Outcome::ProvisioningFailure(WORKER_VANISHED.to_string())
        );
    }

    #[tokio::test]
    async fn test_publish_after_receiver_dropped_reports_false() {
        let (writer, receiver) = outcome_slot();
        drop(receiver);
        assert!(!writer.publish(Outcome::Success));
    }
}
