//! Shell command execution shared by specialists and test runs.
//!
//! The command runs as `sh -c` in its own process group. Input is written while
//! stdout and stderr are drained, so large payloads cannot stall on a full pipe.
//! On timeout the whole group is killed, including anything `sh` forked, and the
//! child is reaped before returning.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Captured result of a command that exited on its own.
#[derive(Debug)]
pub struct ShellOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Build `sh -c <command_line>`.
pub fn command(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line);
    cmd
}

/// Run `cmd`, feeding it `input`. Returns `Ok(None)` if it hit `timeout` and was killed.
pub async fn run(mut cmd: Command, input: Option<Vec<u8>>, timeout: Duration) -> io::Result<Option<ShellOutput>> {
    cmd.stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    let pid = child.id();
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let completion = async {
        let write = async move {
            if let (Some(mut stdin), Some(input)) = (stdin, input) {
                // A command may exit without reading its input
                if let Err(e) = stdin.write_all(&input).await {
                    if e.kind() != io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                }
            }
            Ok(())
        };
        let (written, stdout, stderr, status) = tokio::join!(write, read_all(stdout), read_all(stderr), child.wait());
        written?;
        Ok::<_, io::Error>(ShellOutput {
            status: status?,
            stdout: stdout?,
            stderr: stderr?,
        })
    };

    match tokio::time::timeout(timeout, completion).await {
        Ok(result) => result.map(Some),
        Err(_) => {
            kill_group(pid);
            if let Err(e) = child.kill().await {
                log::debug!("Reaping timed out child {:?}: {}", pid, e);
            }
            Ok(None)
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// SIGKILL the process group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    // The child leads its own group, so its pid is the group id
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        log::debug!("killpg({}) failed: {}", pid, io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_captures_output_and_status() {
        let output = run(command("echo out; echo err >&2; exit 4"), None, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(output.status.code(), Some(4));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
    }

    #[tokio::test]
    async fn test_large_input_echoed_back() {
        let input = "0123456789abcdef".repeat(20_000).into_bytes();
        let output = run(command("cat"), Some(input.clone()), Duration::from_secs(10))
            .await
            .unwrap()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, input);
    }

    #[tokio::test]
    async fn test_input_ignored_by_command() {
        let input = vec![b'x'; 300_000];
        let output = run(command("exit 0"), Some(input), Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert!(output.status.success());
    }

    #[tokio::test]
    async fn test_timeout_kills_forked_processes() {
        let temp = TempDir::new().unwrap();
        let mut cmd = command("sh -c 'sleep 1; touch late_write'; true");
        cmd.current_dir(temp.path());

        let start = Instant::now();
        let output = run(cmd, None, Duration::from_millis(200)).await.unwrap();
        assert!(output.is_none());
        assert!(start.elapsed() < Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert!(!temp.path().join("late_write").exists());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let temp = TempDir::new().unwrap();
        let mut cmd = command("true");
        cmd.current_dir(temp.path().join("missing"));
        assert!(run(cmd, None, Duration::from_secs(1)).await.is_err());
    }
}
