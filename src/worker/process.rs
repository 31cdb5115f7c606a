//! Worker invoker that launches one external specialist process per task.
//!
//! The process gets the task context on stdin and runs in the domain's resource
//! location. It is bounded by a hard timeout: on expiry the child's whole process
//! group is killed and the task reports `success: false`. No "wrap up" signal is
//! sent first.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::WorkerInvoker;
use super::context::{PayloadFormat, WorkerContext};
use crate::domain::{DomainId, Task, WorkerResult};
use crate::error::{DispatchError, Result};
use crate::registry::Registry;
use crate::shell;

/// Environment variable carrying the domain id to the specialist.
pub const ENV_DOMAIN: &str = "DISPATCHR_DOMAIN";
/// Environment variable carrying the resolved resource location.
pub const ENV_RESOURCE_LOCATION: &str = "DISPATCHR_RESOURCE_LOCATION";

/// Explicit configuration for the process invoker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WorkerConfig {
    /// Shell command line that starts the specialist
    pub command: String,
    /// Per-task timeout in milliseconds
    pub timeout_ms: u64,
    /// Directory that domain resource locations are resolved against
    pub resource_root: PathBuf,
    /// Extra environment for the specialist
    pub env: BTreeMap<String, String>,
    pub payload: PayloadFormat,
    /// Cap on captured output kept in the result
    pub max_output_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: "claude -p".to_string(),
            timeout_ms: 600_000, // 10 minutes
            resource_root: PathBuf::from("."),
            env: BTreeMap::new(),
            payload: PayloadFormat::Text,
            max_output_bytes: 100_000,
        }
    }
}

impl WorkerConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_resource_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resource_root = root.into();
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_payload(mut self, format: PayloadFormat) -> Self {
        self.payload = format;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Launches specialist processes.
pub struct ProcessInvoker {
    config: WorkerConfig,
    registry: Arc<Registry>,
}

impl ProcessInvoker {
    pub fn new(config: WorkerConfig, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Resolve a domain's resource location against the resource root.
    ///
    /// Two domains may resolve to the same directory; nothing here serializes them.
    pub fn resolve_location(&self, domain: &DomainId) -> Result<PathBuf> {
        let signature = self
            .registry
            .get(domain)
            .ok_or_else(|| DispatchError::Worker(format!("unknown domain '{}'", domain)))?;
        Ok(self.config.resource_root.join(&signature.signature.resource_location))
    }

    /// Build the context payload for a task.
    pub fn build_context(&self, task: &Task) -> Result<WorkerContext> {
        let location = self.resolve_location(&task.domain)?;
        Ok(WorkerContext::build(task, &self.registry, location))
    }

    async fn run(&self, task: &Task, timeout: Duration) -> Result<WorkerResult> {
        let location = self.resolve_location(&task.domain)?;
        if !location.is_dir() {
            return Err(DispatchError::Worker(format!(
                "resource location {} for '{}' is not a directory",
                location.display(),
                task.domain
            )));
        }
        let payload = WorkerContext::build(task, &self.registry, location.clone()).payload(self.config.payload)?;

        let mut cmd = shell::command(&self.config.command);
        cmd.current_dir(&location)
            .env(ENV_DOMAIN, task.domain.as_str())
            .env(ENV_RESOURCE_LOCATION, &location);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        let start = Instant::now();
        log::debug!("Launching specialist for {} in {}", task.domain, location.display());
        let output = shell::run(cmd, Some(payload.into_bytes()), timeout)
            .await
            .map_err(|e| DispatchError::Worker(format!("specialist for '{}' failed to run: {}", task.domain, e)))?;

        let Some(output) = output else {
            log::warn!("Specialist for {} timed out after {:?}; killed", task.domain, timeout);
            return Ok(WorkerResult::timed_out(task.domain.clone(), timeout));
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            combined.push_str("\n--- stderr ---\n");
            combined.push_str(stderr.trim_end());
        }
        Ok(WorkerResult::completed(
            task.domain.clone(),
            output.status.code(),
            truncate_bytes(&combined, self.config.max_output_bytes),
            start.elapsed(),
        ))
    }
}

#[async_trait]
impl WorkerInvoker for ProcessInvoker {
    async fn invoke(&self, task: &Task, timeout: Duration) -> WorkerResult {
        let start = Instant::now();
        match self.run(task, timeout).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Specialist for {} failed: {}", task.domain, e);
                WorkerResult::failed(task.domain.clone(), e.to_string(), start.elapsed())
            }
        }
    }
}

/// Keep at most `max` bytes, cut on a char boundary.
fn truncate_bytes(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... (truncated)", &s[..end])
}
