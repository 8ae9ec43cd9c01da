//! Typed error hierarchy for provcheck.
//!
//! Four enums cover the collaborators and the harness itself:
//! - `EngineError`: provisioning engine (terraform) invocations
//! - `ResourceApiError`: verification API (az) lookups
//! - `TeardownError`: fatal, exhausted teardown; implies leaked infrastructure
//! - `HarnessError`: lifecycle bookkeeping and configuration

use thiserror::Error;

/// Errors from a provisioning engine invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Output '{key}' is missing or empty")]
    MissingOutput { key: String },

    #[error("Failed to parse output of `{command}`: {message}")]
    MalformedOutput { command: String, message: String },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },
}

/// Errors from the resource-state verification API.
#[derive(Debug, Error)]
pub enum ResourceApiError {
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Lookup of {kind} '{name}' failed: {message}")]
    LookupFailed {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("Failed to decode {kind} '{name}': {source}")]
    Decode {
        kind: &'static str,
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Terminal teardown failure.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error(
        "Destroy failed after {attempts} attempts, infrastructure may be leaked: {last_error}"
    )]
    Exhausted { attempts: u32, last_error: String },
}

/// Errors from harness bookkeeping.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("Invalid state transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Outcome for run {run_id} was already recorded")]
    OutcomeAlreadyRecorded { run_id: uuid::Uuid },

    #[error("Invalid duration '{0}': expected e.g. 90, 90s, 15m or 1h")]
    InvalidDuration(String),

    #[error("Invalid variable '{0}': expected key=value")]
    InvalidVariable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
