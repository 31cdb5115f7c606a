use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::parse::{parse_cargo, parse_json};
use super::{ReportFormat, TestRunSource};
use crate::domain::FailureRecord;
use crate::error::{DispatchError, Result};
use crate::shell;

/// Test name used for records synthesized from the run itself.
const RUN_RECORD_NAME: &str = "test-run";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TestRunConfig {
    /// Shell command line that runs the tests
    pub command: String,
    pub timeout_ms: u64,
    pub format: ReportFormat,
    /// Directory the command runs in
    pub working_dir: PathBuf,
}

impl Default for TestRunConfig {
    fn default() -> Self {
        Self {
            command: "cargo test --no-fail-fast".to_string(),
            timeout_ms: 600_000, // 10 minutes
            format: ReportFormat::Auto,
            working_dir: PathBuf::from("."),
        }
    }
}

impl TestRunConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Runs the configured test command and parses its failures.
pub struct CommandTestRun {
    config: TestRunConfig,
}

impl CommandTestRun {
    pub fn new(config: TestRunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TestRunConfig {
        &self.config
    }

    /// Turn raw command output into failure records.
    pub fn interpret(&self, exit_code: Option<i32>, stdout: &str, stderr: &str) -> Result<Vec<FailureRecord>> {
        let passed = exit_code == Some(0);
        let combined = format!("{}\n{}", stdout, stderr);

        let records = match self.config.format {
            ReportFormat::Json => parse_json(stdout).ok_or_else(|| {
                DispatchError::TestRun(format!(
                    "expected a JSON failure list from '{}', got: {}",
                    self.config.command,
                    truncate_output(stdout, 5)
                ))
            })?,
            ReportFormat::Cargo => parse_cargo(&combined),
            ReportFormat::Auto => parse_json(stdout).unwrap_or_else(|| parse_cargo(&combined)),
        };

        if records.is_empty() && !passed {
            // Non-zero exit with nothing recognizable still counts as a failure
            let reason = match exit_code {
                Some(code) => format!("test command exited with status {}", code),
                None => "test command was terminated by a signal".to_string(),
            };
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            let message = format!("{}\n{}", reason, truncate_output(detail, 50));
            return Ok(vec![FailureRecord::new(RUN_RECORD_NAME, message.trim_end())]);
        }

        Ok(records)
    }
}

#[async_trait]
impl TestRunSource for CommandTestRun {
    async fn collect(&self) -> Result<Vec<FailureRecord>> {
        let start = Instant::now();
        log::info!("Running tests: {}", self.config.command);

        let mut cmd = shell::command(&self.config.command);
        cmd.current_dir(&self.config.working_dir);
        let output = shell::run(cmd, None, self.config.timeout()).await;

        match output {
            Ok(Some(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let records = self.interpret(output.status.code(), &stdout, &stderr)?;
                log::info!(
                    "Test run finished in {:?}: exit={:?}, {} failures",
                    start.elapsed(),
                    output.status.code(),
                    records.len()
                );
                Ok(records)
            }
            Err(e) => Err(DispatchError::TestRun(format!(
                "failed to run '{}' in {}: {}",
                self.config.command,
                self.config.working_dir.display(),
                e
            ))),
            Ok(None) => {
                log::warn!("Test run timed out after {:?}", self.config.timeout());
                Ok(vec![FailureRecord::new(
                    RUN_RECORD_NAME,
                    format!("test command timed out after {:?}", self.config.timeout()),
                )])
            }
        }
    }
}

/// Keep the last `max_lines` lines of output.
fn truncate_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    if lines.len() <= max_lines {
        return output.trim_end().to_string();
    }
    format!(
        "... ({} lines omitted)\n{}",
        lines.len() - max_lines,
        lines[lines.len() - max_lines..].join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner(command: &str, temp: &TempDir) -> CommandTestRun {
        CommandTestRun::new(TestRunConfig::new(command).with_working_dir(temp.path()))
    }

    #[test]
    fn test_config_default() {
        let config = TestRunConfig::default();
        assert_eq!(config.command, "cargo test --no-fail-fast");
        assert_eq!(config.timeout(), Duration::from_secs(600));
        assert_eq!(config.format, ReportFormat::Auto);
    }

    #[test]
    fn test_interpret_pass() {
        let temp = TempDir::new().unwrap();
        let records = runner("true", &temp).interpret(Some(0), "test result: ok", "").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_interpret_unparseable_failure_yields_generic_record() {
        let temp = TempDir::new().unwrap();
        let records = runner("x", &temp).interpret(Some(2), "", "segfault in runner").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].test_name, "test-run");
        assert!(records[0].error_message.contains("status 2"));
        assert!(records[0].error_message.contains("segfault"));
    }

    #[test]
    fn test_interpret_json_format_rejects_text() {
        let temp = TempDir::new().unwrap();
        let run = CommandTestRun::new(
            TestRunConfig::new("x")
                .with_working_dir(temp.path())
                .with_format(ReportFormat::Json),
        );
        assert!(matches!(run.interpret(Some(1), "not json", ""), Err(DispatchError::TestRun(_))));
    }

    #[test]
    fn test_interpret_json_with_zero_exit() {
        let temp = TempDir::new().unwrap();
        let stdout = r#"[{"test_name": "login", "error_message": "401"}]"#;
        let records = runner("x", &temp).interpret(Some(0), stdout, "").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_collect_json_from_command() {
        let temp = TempDir::new().unwrap();
        let run = runner(
            r#"echo '[{"test_name":"a","error_message":"NullPointerException","location_hint":"backend/x.java"}]'; exit 1"#,
            &temp,
        );
        let records = run.collect().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_message, "NullPointerException");
    }

    #[tokio::test]
    async fn test_collect_passing_command() {
        let temp = TempDir::new().unwrap();
        let records = runner("echo 'test result: ok. 3 passed'", &temp).collect().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_collect_timeout_becomes_failure() {
        let temp = TempDir::new().unwrap();
        let run = CommandTestRun::new(
            TestRunConfig::new("sleep 10")
                .with_working_dir(temp.path())
                .with_timeout_ms(100),
        );
        let records = run.collect().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].error_message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_timed_out_run_leaves_no_stragglers() {
        let temp = TempDir::new().unwrap();
        let run = CommandTestRun::new(
            TestRunConfig::new("sh -c 'sleep 1; touch late_write'; true")
                .with_working_dir(temp.path())
                .with_timeout_ms(200),
        );
        let records = run.collect().await.unwrap();
        assert!(records[0].error_message.contains("timed out"));

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!temp.path().join("late_write").exists());
    }

    #[tokio::test]
    async fn test_collect_missing_working_dir_is_error() {
        let temp = TempDir::new().unwrap();
        let run = CommandTestRun::new(TestRunConfig::new("true").with_working_dir(temp.path().join("gone")));
        assert!(matches!(run.collect().await, Err(DispatchError::TestRun(_))));
    }

    #[test]
    fn test_truncate_output() {
        let output = (1..=10).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let cut = truncate_output(&output, 3);
        assert!(cut.starts_with("... (7 lines omitted)"));
        assert!(cut.ends_with("8\n9\n10"));
    }
}
