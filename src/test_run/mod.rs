//! Test-run collaborator.
//!
//! The controller asks a `TestRunSource` for the current list of failures at the
//! start of every cycle and again when verifying. `CommandTestRun` gets them by
//! running a shell command and parsing its output.

mod command;
mod parse;

pub use command::{CommandTestRun, TestRunConfig};
pub use parse::{parse_cargo, parse_json};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::FailureRecord;
use crate::error::Result;

/// Produces the current set of test failures. An empty list means the run passed.
#[async_trait]
pub trait TestRunSource: Send + Sync {
    async fn collect(&self) -> Result<Vec<FailureRecord>>;
}

/// How test-run output is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// JSON if the output parses as a failure list, cargo text otherwise
    #[default]
    Auto,
    Json,
    Cargo,
}
