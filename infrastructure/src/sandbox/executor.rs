//! SandboxedExecutor: run a subprocess under a hard wall-clock budget.
//!
//! Two modes:
//! - [`SandboxedExecutor::run_shell`] runs a validated command line via `sh -c`.
//! - [`SandboxedExecutor::run_script`] writes model-supplied source into a
//!   fresh scratch directory under the working tree and runs an interpreter
//!   on it. The scratch directory is removed on every exit path.
//!
//! Each child leads its own process group. An explicit timer races the
//! child's exit and the cancellation token; when the timer or the token wins
//! the whole group gets `SIGKILL`. Captured output is capped per stream at
//! the transport layer.

use super::process_group::ProcessGroupGuard;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use warden_application::InterpreterConfig;
use warden_domain::core::string::lossy_with_overflow;

/// How long to keep reading pipes after the child is gone
const READ_GRACE: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("I/O error while waiting for process: {0}")]
    Io(#[from] std::io::Error),
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Exited(i32),
    /// Killed by a signal we did not send.
    Signaled(i32),
    TimedOut,
    Cancelled,
}

impl ExitKind {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitKind::Exited(0))
    }
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit: ExitKind,
    pub duration: Duration,
    /// Scratch directory used by a script run (already removed).
    pub scratch_dir: Option<PathBuf>,
}

impl ExecOutput {
    /// stdout, then stderr under a separator.
    pub fn combined(&self) -> String {
        let mut combined = String::new();
        if !self.stdout.is_empty() {
            combined.push_str(&self.stdout);
        }
        if !self.stderr.is_empty() {
            if !combined.is_empty() {
                combined.push_str("\n--- stderr ---\n");
            }
            combined.push_str(&self.stderr);
        }
        combined
    }
}

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub cwd: PathBuf,
    pub timeout: Duration,
    pub env: Vec<(String, String)>,
    pub max_output_bytes: usize,
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn new(cwd: impl Into<PathBuf>, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            cwd: cwd.into(),
            timeout,
            env: Vec::new(),
            max_output_bytes: 1024 * 1024,
            cancel,
        }
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxedExecutor;

impl SandboxedExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run a command line through `sh -c`.
    pub async fn run_shell(&self, command: &str, opts: &RunOptions) -> Result<ExecOutput, ExecutorError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        self.run("sh", cmd, opts).await
    }

    /// Write `source` to a scratch file and run the interpreter on it.
    pub async fn run_script(
        &self,
        source: &str,
        interpreter: &InterpreterConfig,
        opts: &RunOptions,
    ) -> Result<ExecOutput, ExecutorError> {
        let scratch = tempfile::Builder::new()
            .prefix(".warden-scratch-")
            .tempdir_in(&opts.cwd)
            .map_err(ExecutorError::Scratch)?;
        let scratch_dir = scratch.path().to_path_buf();
        let script = scratch_dir.join(format!("script.{}", interpreter.extension));

        // From here on `scratch` is dropped (and removed) on every path,
        // including this future being dropped mid-run
        let result = match tokio::fs::write(&script, source).await {
            Ok(()) => {
                let mut cmd = Command::new(&interpreter.program);
                cmd.args(interpreter.resolved_args(&opts.cwd)).arg(&script);
                self.run(&interpreter.program, cmd, opts).await
            }
            Err(e) => Err(ExecutorError::Scratch(e)),
        };

        if let Err(e) = scratch.close() {
            warn!(dir = %scratch_dir.display(), error = %e, "Failed to remove scratch directory");
        }

        result.map(|mut output| {
            output.scratch_dir = Some(scratch_dir);
            output
        })
    }

    async fn run(&self, program: &str, mut cmd: Command, opts: &RunOptions) -> Result<ExecOutput, ExecutorError> {
        cmd.current_dir(&opts.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &opts.env {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExecutorError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let mut group = ProcessGroupGuard::new(child.id());
        debug!(program, pid = ?child.id(), timeout_ms = opts.timeout.as_millis() as u64, "Spawned");

        let stdout = tokio::spawn(read_capped(child.stdout.take(), opts.max_output_bytes));
        let stderr = tokio::spawn(read_capped(child.stderr.take(), opts.max_output_bytes));

        let exit = tokio::select! {
            status = child.wait() => exit_kind(status?),
            _ = tokio::time::sleep(opts.timeout) => ExitKind::TimedOut,
            _ = opts.cancel.cancelled() => ExitKind::Cancelled,
        };

        // Kill the group on every path: stragglers must not outlive the run
        group.kill();
        if matches!(exit, ExitKind::TimedOut | ExitKind::Cancelled) {
            let _ = child.start_kill();
            let _ = child.wait().await;
            debug!(program, ?exit, "Process group killed");
        }

        let (stdout, stdout_dropped) = collect(stdout).await;
        let (stderr, stderr_dropped) = collect(stderr).await;

        Ok(ExecOutput {
            stdout: lossy_with_overflow(&stdout, stdout_dropped),
            stderr: lossy_with_overflow(&stderr, stderr_dropped),
            exit,
            duration: started.elapsed(),
            scratch_dir: None,
        })
    }
}

fn exit_kind(status: ExitStatus) -> ExitKind {
    if let Some(code) = status.code() {
        return ExitKind::Exited(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitKind::Signaled(signal);
        }
    }
    ExitKind::Exited(-1)
}

/// Read a pipe to EOF, keeping at most `max` bytes. Returns the kept bytes
/// and how many were dropped. Keeps draining past the cap so the child never
/// blocks on a full pipe.
async fn read_capped<R>(reader: Option<R>, max: usize) -> (Vec<u8>, usize)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return (Vec::new(), 0);
    };
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = max.saturating_sub(kept.len());
                let take = room.min(n);
                kept.extend_from_slice(&chunk[..take]);
                dropped += n - take;
            }
        }
    }
    (kept, dropped)
}

async fn collect(mut task: tokio::task::JoinHandle<(Vec<u8>, usize)>) -> (Vec<u8>, usize) {
    match tokio::time::timeout(READ_GRACE, &mut task).await {
        Ok(Ok(captured)) => captured,
        Ok(Err(_)) => (Vec::new(), 0),
        Err(_) => {
            task.abort();
            (Vec::new(), 0)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    fn opts(dir: &Path, timeout_ms: u64) -> RunOptions {
        RunOptions::new(dir, Duration::from_millis(timeout_ms), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let output = SandboxedExecutor
            .run_shell("echo out; echo err 1>&2", &opts(dir.path(), 5_000))
            .await
            .unwrap();
        assert_eq!(output.exit, ExitKind::Exited(0));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.combined(), "out\n\n--- stderr ---\nerr\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let output = SandboxedExecutor
            .run_shell("exit 3", &opts(dir.path(), 5_000))
            .await
            .unwrap();
        assert_eq!(output.exit, ExitKind::Exited(3));
        assert!(!output.exit.is_success());
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let output = SandboxedExecutor
            .run_shell("ls", &opts(dir.path(), 5_000))
            .await
            .unwrap();
        assert!(output.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_timeout_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let output = SandboxedExecutor
            .run_shell("sleep 5", &opts(dir.path(), 200))
            .await
            .unwrap();
        assert_eq!(output.exit, ExitKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_timeout_kills_the_whole_group() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("child.pid");
        let command = format!("sh -c 'echo $$ > {}; sleep 30' ; sleep 30", pid_file.display());
        let output = SandboxedExecutor
            .run_shell(&command, &opts(dir.path(), 300))
            .await
            .unwrap();
        assert_eq!(output.exit, ExitKind::TimedOut);

        let pid: i32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!process_alive(pid), "grandchild {pid} survived the timeout");
    }

    /// A killed process nobody reaps lingers as a zombie; that counts as dead.
    fn process_alive(pid: i32) -> bool {
        // SAFETY: signal 0 only checks for existence
        if unsafe { libc::kill(pid, 0) } != 0 {
            return false;
        }
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            // The state follows the parenthesised command name
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z" && state != "X"),
            Err(_) => true,
        }
    }

    #[test]
    fn test_reaped_and_zombie_processes_are_not_alive() {
        assert!(process_alive(std::process::id() as i32));

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        // Exited but not yet waited on
        std::thread::sleep(Duration::from_millis(200));
        if Path::new("/proc").exists() {
            assert!(!process_alive(pid));
        }
        child.wait().unwrap();
        assert!(!process_alive(pid));
    }

    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let options = RunOptions::new(dir.path(), Duration::from_secs(30), cancel.clone());
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let output = SandboxedExecutor.run_shell("sleep 30", &options).await.unwrap();
        assert_eq!(output.exit, ExitKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let options = opts(dir.path(), 10_000).with_max_output_bytes(1_000);
        let output = SandboxedExecutor
            .run_shell("head -c 100000 /dev/zero | tr '\\0' 'a'", &options)
            .await
            .unwrap();
        assert_eq!(output.exit, ExitKind::Exited(0));
        assert!(output.stdout.starts_with(&"a".repeat(1_000)));
        assert!(output.stdout.ends_with("[output truncated: 99000 bytes omitted]"));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let interpreter = InterpreterConfig {
            program: "definitely-not-an-interpreter-xyz".into(),
            args: vec![],
            extension: "js".into(),
        };
        let err = SandboxedExecutor
            .run_script("1", &interpreter, &opts(dir.path(), 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Spawn { .. }));
        // Scratch dir is gone even when spawning failed
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    fn sh_interpreter() -> InterpreterConfig {
        InterpreterConfig {
            program: "sh".into(),
            args: vec![],
            extension: "sh".into(),
        }
    }

    #[tokio::test]
    async fn test_script_scratch_is_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let output = SandboxedExecutor
            .run_script("echo from-script; pwd", &sh_interpreter(), &opts(dir.path(), 5_000))
            .await
            .unwrap();
        assert!(output.stdout.starts_with("from-script\n"));
        let scratch = output.scratch_dir.unwrap();
        assert!(scratch.starts_with(dir.path()));
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_script_scratch_is_removed_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let output = SandboxedExecutor
            .run_script("while :; do :; done", &sh_interpreter(), &opts(dir.path(), 300))
            .await
            .unwrap();
        assert_eq!(output.exit, ExitKind::TimedOut);
        assert!(!output.scratch_dir.unwrap().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_script_scratch_is_removed_when_future_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let options = opts(dir.path(), 30_000);
        let interpreter = sh_interpreter();
        let run = SandboxedExecutor.run_script("sleep 30", &interpreter, &options);
        let _ = tokio::time::timeout(Duration::from_millis(200), run).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
