//! Process Runner
//!
//! This module executes concrete invocations as child processes. Processes are
//! created directly from argv (never through a shell), bounded by the
//! invocation's deadline, and always reaped before a result is returned.

use super::builder::ConcreteInvocation;
use super::outcome::ExecutionOutcome;
use crate::error::GatewayError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as TokioCommand};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default cap on captured bytes per stream (16 MiB)
const MAX_OUTPUT_SIZE: usize = 16 * 1024 * 1024;

/// How long to wait for pipe readers after the process is gone
const READER_GRACE: Duration = Duration::from_secs(2);

/// Something that can run a concrete invocation
///
/// The gateway only talks to this trait, so tests can substitute a recorder
/// and assert exactly which argv would have been launched.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &ConcreteInvocation) -> ExecutionOutcome;
}

/// Configuration for the Tokio-backed runner
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum captured bytes per stream (default: 16 MiB)
    pub max_output_size: usize,

    /// Time allowed for draining pipes once the process has exited or been killed
    pub reader_grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_output_size: MAX_OUTPUT_SIZE,
            reader_grace: READER_GRACE,
        }
    }
}

impl ExecutorConfig {
    /// Create a new executor config with custom output limit
    pub fn with_max_output_size(size: usize) -> Self {
        Self {
            max_output_size: size,
            ..Default::default()
        }
    }
}

/// Runs invocations with `tokio::process`
///
/// Each child is placed in its own process group. On timeout the whole group
/// is killed, then the direct child is killed and awaited so nothing is left
/// behind as a zombie.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    config: ExecutorConfig,
}

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    fn spawn(&self, invocation: &ConcreteInvocation) -> std::io::Result<Child> {
        let mut process = TokioCommand::new(invocation.program());
        process
            .args(invocation.args())
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        process.process_group(0);

        process.spawn()
    }

    /// Join both readers, giving up on either after the grace period
    async fn collect(
        &self,
        stdout: JoinHandle<Captured>,
        stderr: JoinHandle<Captured>,
    ) -> (String, String) {
        let limit = self.config.max_output_size;
        let grace = self.config.reader_grace;
        let (stdout, stderr) =
            tokio::join!(join_reader(stdout, grace), join_reader(stderr, grace));
        (stdout.into_text(limit), stderr.into_text(limit))
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: &ConcreteInvocation) -> ExecutionOutcome {
        let start = Instant::now();
        let summary = invocation.summary();
        info!("Executing: {}", summary);

        if invocation.argv.is_empty() {
            return ExecutionOutcome::launch_error("Empty command", start.elapsed());
        }

        let mut child = match self.spawn(invocation) {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", summary, e);
                let err = GatewayError::LaunchError {
                    program: invocation.program().to_string(),
                    message: e.to_string(),
                };
                return ExecutionOutcome::launch_error(err.to_string(), start.elapsed());
            }
        };

        let pid = child.id();
        let group = GroupGuard(pid);
        let max = self.config.max_output_size;
        let stdout = tokio::spawn(read_capped(child.stdout.take(), max));
        let stderr = tokio::spawn(read_capped(child.stderr.take(), max));

        let limit = invocation.timeout.duration();
        match tokio::time::timeout(limit, child.wait()).await {
            Ok(Ok(status)) => {
                // Descendants must not outlive the request or hold the pipes open.
                group.kill();
                let (stdout, stderr) = self.collect(stdout, stderr).await;
                let outcome =
                    ExecutionOutcome::exited(stdout, stderr, status.code(), pid, start.elapsed());
                if status.success() {
                    info!("Command succeeded: {}", summary);
                } else {
                    warn!("Command failed: {} (exit code: {:?})", summary, status.code());
                }
                outcome
            }
            Ok(Err(e)) => {
                warn!("Failed waiting on {}: {}", summary, e);
                terminate(&mut child, group).await;
                let _ = self.collect(stdout, stderr).await;
                let err = GatewayError::LaunchError {
                    program: invocation.program().to_string(),
                    message: format!("wait failed: {}", e),
                };
                ExecutionOutcome::launch_error(err.to_string(), start.elapsed())
            }
            Err(_) => {
                warn!("Command timed out after {:?}: {}", limit, summary);
                terminate(&mut child, group).await;
                let (stdout, stderr) = self.collect(stdout, stderr).await;
                ExecutionOutcome::timed_out(stdout, stderr, pid, limit, start.elapsed())
            }
        }
    }
}

/// Bytes read from one pipe
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn into_text(self, limit: usize) -> String {
        let text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            truncate_string(text, limit)
        } else {
            text
        }
    }
}

/// Drain a pipe to EOF, keeping at most `max` bytes
///
/// Reading continues past the cap so the child never blocks on a full pipe.
async fn read_capped<R>(pipe: Option<R>, max: usize) -> Captured
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let Some(mut pipe) = pipe else {
        return captured;
    };

    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = max.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.truncated = true;
                }
                captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                debug!("Pipe read stopped early: {}", e);
                break;
            }
        }
    }
    captured
}

async fn join_reader(handle: JoinHandle<Captured>, grace: Duration) -> Captured {
    let abort = handle.abort_handle();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(captured)) => captured,
        Ok(Err(e)) => {
            warn!("Output reader failed: {}", e);
            Captured::default()
        }
        Err(_) => {
            warn!("Output pipe still open after {:?}; dropping its contents", grace);
            abort.abort();
            Captured::default()
        }
    }
}

/// Kills the child's process group when dropped
///
/// A cancelled `run` (client disconnect, caller timeout) drops this before the
/// `Child`, so the whole group is signalled, not only the direct child that
/// `kill_on_drop` covers.
struct GroupGuard(Option<u32>);

impl GroupGuard {
    fn kill(mut self) {
        kill_group(self.0.take());
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        kill_group(self.0.take());
    }
}

/// Kill the process group, then kill and reap the direct child
async fn terminate(child: &mut Child, group: GroupGuard) {
    group.kill();
    if let Err(e) = child.kill().await {
        debug!("Child kill after group kill: {}", e);
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Shorten capped output so that it, ellipsis included, fits in `max_len` bytes
fn truncate_string(mut s: String, max_len: usize) -> String {
    let mut cut = max_len.saturating_sub(3).min(s.len());
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s.push_str("...");
    s
}
