//! Worker Invoker.
//!
//! A worker invoker turns one `Task` into one `WorkerResult`. Failures of any
//! kind (launch errors, non-zero exits, timeouts) are reported in the result;
//! `invoke` itself never fails.

mod context;
mod process;

pub use context::{ContextFailure, PayloadFormat, WorkerContext};
pub use process::{ENV_DOMAIN, ENV_RESOURCE_LOCATION, ProcessInvoker, WorkerConfig};

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Task, WorkerResult};

/// Runs one specialist for one task, bounded by `timeout`.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    async fn invoke(&self, task: &Task, timeout: Duration) -> WorkerResult;
}
