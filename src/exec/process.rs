//! Build tool process spawning and control.
//!
//! Spawns the external build tool, forwards its merged stdout/stderr to the
//! caller's output sink line by line, and reports the exit status.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::exec::BazelCommandBuilder;
use crate::output::OutputSink;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The build tool binary was not found.
    #[error("Build tool binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// A running build tool process.
pub struct BuildProcess {
    child: Child,
    forwarders: Vec<JoinHandle<()>>,
}

impl BuildProcess {
    /// Spawn the build tool with the given command configuration.
    ///
    /// Stdout and stderr are forwarded to `sink` as status lines with
    /// trailing whitespace trimmed, in arrival order per stream.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn. Failure is local
    /// to this invocation; no broader state is affected.
    pub fn spawn(
        builder: &BazelCommandBuilder,
        event_file: &Path,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Self, SpawnError> {
        let args = builder.build_args(event_file);

        let mut cmd = Command::new(builder.binary());
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = builder.get_working_dir() {
            cmd.current_dir(dir);
        }
        for (key, value) in builder.get_env() {
            cmd.env(key, value);
        }

        tracing::debug!(
            command = %builder.display_command(event_file),
            "Spawning build tool"
        );
        let mut child = cmd.spawn().map_err(SpawnError::from_io)?;

        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(tokio::spawn(forward_lines(stdout, Arc::clone(&sink))));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(tokio::spawn(forward_lines(stderr, sink)));
        }

        Ok(Self { child, forwarders })
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit and for all output to be forwarded.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        for forwarder in self.forwarders.drain(..) {
            let _ = forwarder.await;
        }
        Ok(status)
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill. Calling this on an
    /// already-terminated process is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        if matches!(self.try_wait(), Ok(Some(_))) {
            return Ok(());
        }

        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.id() {
            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            let _ = kill(nix_pid, Signal::SIGTERM);

            match tokio::time::timeout(timeout, self.child.wait()).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(_) => self.child.kill().await,
            }
        } else {
            // Process already exited
            Ok(())
        }
    }
}

/// Forward one output stream to the sink, one trimmed line at a time.
async fn forward_lines<R>(stream: R, sink: Arc<dyn OutputSink>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => sink.status(line.trim_end()),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Build tool output stream closed");
                break;
            }
        }
    }
}
