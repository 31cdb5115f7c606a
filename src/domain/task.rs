//! Dispatchable tasks and the results specialists report back.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::failure::ClassifiedFailure;
use super::signature::{DomainId, Priority};

/// One unit of specialist work: all of a domain's failures for a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub domain: DomainId,
    pub failures: Vec<ClassifiedFailure>,
    pub priority: Priority,
    /// Heuristic cost estimate, not a measurement
    #[serde(with = "duration_ms")]
    pub estimated_duration: Duration,
}

impl Task {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Outcome of one specialist invocation. `domain` always matches the task it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub domain: DomainId,
    pub success: bool,
    /// Raw combined output of the specialist (or the failure reason)
    pub output: String,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub timed_out: bool,
}

impl WorkerResult {
    /// Result of a specialist that ran to completion.
    pub fn completed(domain: DomainId, exit_code: Option<i32>, output: impl Into<String>, duration: Duration) -> Self {
        Self {
            domain,
            success: exit_code == Some(0),
            output: output.into(),
            duration,
            exit_code,
            timed_out: false,
        }
    }

    /// Result of a specialist that could not run or crashed.
    pub fn failed(domain: DomainId, reason: impl Into<String>, duration: Duration) -> Self {
        Self {
            domain,
            success: false,
            output: reason.into(),
            duration,
            exit_code: None,
            timed_out: false,
        }
    }

    /// Result of a specialist that was terminated at its deadline.
    pub fn timed_out(domain: DomainId, timeout: Duration) -> Self {
        Self {
            domain,
            success: false,
            output: format!("Worker timed out after {:?}", timeout),
            duration: timeout,
            exit_code: None,
            timed_out: true,
        }
    }
}

/// Serde helper storing durations as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
