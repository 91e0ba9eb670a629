//! One build invocation, from spawn to terminal result.
//!
//! An [`Invocation`] owns the whole lifecycle: allocate the event file, spawn
//! the process, stream events live, wait for exit, run the aggregation pass,
//! and deliver exactly one terminal value. Cancellation is cooperative and
//! idempotent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{self, AggregatedResult};
use crate::bep::{ByteTailer, EventSink};
use crate::config::DriverConfig;
use crate::diagnostics::BuildEventParser;
use crate::exec::{BazelCommandBuilder, BuildProcess};
use crate::invocation::{EventStreamReader, ExitClassification};
use crate::output::OutputSink;

/// Lifecycle state of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    /// The driver task has not started the process yet.
    Created,
    /// The process is running (or being spawned).
    Running,
    /// The process exited and a result was produced.
    Completed,
    /// The invocation was cancelled before the process finished.
    Cancelled,
    /// The invocation failed to start or its output could not be extracted.
    Failed,
}

/// Error type for a failed invocation.
///
/// Cloneable so the one terminal value can be handed to every waiter.
#[derive(thiserror::Error, Debug, Clone)]
pub enum InvocationError {
    /// The build tool could not be spawned or waited on.
    #[error("Failed to run build tool: {message}")]
    Start { message: String },

    /// The event file could not be aggregated after the build finished.
    #[error("{message}")]
    ArtifactExtraction { message: String, bytes_consumed: u64 },

    /// The invocation was cancelled.
    #[error("Build invocation cancelled")]
    Cancelled,
}

/// The single terminal value of an invocation.
pub type InvocationOutcome = Result<Arc<AggregatedResult>, InvocationError>;

/// Handle to a running (or finished) build invocation.
pub struct Invocation {
    cancel: CancellationToken,
    state: Arc<Mutex<InvocationState>>,
    outcome: watch::Receiver<Option<InvocationOutcome>>,
}

impl Invocation {
    /// Start a build invocation in the background.
    ///
    /// Process output and live diagnostics flow to `sink` while the build
    /// runs; the terminal value is retrieved with
    /// [`await_result`](Self::await_result).
    #[must_use]
    pub fn start(
        builder: BazelCommandBuilder,
        sink: Arc<dyn OutputSink>,
        config: &DriverConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let state = Arc::new(Mutex::new(InvocationState::Created));
        let (outcome_tx, outcome_rx) = watch::channel(None);

        tokio::spawn(drive(
            builder,
            sink,
            config.clone(),
            cancel.clone(),
            Arc::clone(&state),
            outcome_tx,
        ));

        Self {
            cancel,
            state,
            outcome: outcome_rx,
        }
    }

    /// Request cancellation. Safe to call any number of times, before or
    /// after completion; a finished invocation is unaffected.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this invocation; handy for signal handlers that
    /// outlive the handle.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> InvocationState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(InvocationState::Failed)
    }

    /// Wait for the terminal value. Every caller observes the same value.
    pub async fn await_result(&self) -> InvocationOutcome {
        let mut outcome = self.outcome.clone();
        let result = match outcome.wait_for(Option::is_some).await {
            Ok(value) => value.clone().unwrap_or(Err(InvocationError::Cancelled)),
            Err(_) => Err(InvocationError::Start {
                message: "invocation task exited without a result".to_string(),
            }),
        };
        result
    }

    /// The terminal value, if already delivered.
    #[must_use]
    pub fn try_result(&self) -> Option<InvocationOutcome> {
        self.outcome.borrow().clone()
    }
}

/// Driver task: runs the build and delivers the terminal value exactly once.
async fn drive(
    builder: BazelCommandBuilder,
    sink: Arc<dyn OutputSink>,
    config: DriverConfig,
    cancel: CancellationToken,
    state: Arc<Mutex<InvocationState>>,
    outcome_tx: watch::Sender<Option<InvocationOutcome>>,
) {
    if let Ok(mut s) = state.lock() {
        *s = InvocationState::Running;
    }

    let event_sink = EventSink::create();
    let (final_state, outcome) = run_build(&builder, sink, &config, &cancel, &event_sink).await;
    event_sink.delete().await;

    if let Ok(mut s) = state.lock() {
        *s = final_state;
    }
    let _ = outcome_tx.send(Some(outcome));
}

async fn run_build(
    builder: &BazelCommandBuilder,
    sink: Arc<dyn OutputSink>,
    config: &DriverConfig,
    cancel: &CancellationToken,
    event_sink: &EventSink,
) -> (InvocationState, InvocationOutcome) {
    let mut process =
        match BuildProcess::spawn(builder, event_sink.path(), Arc::clone(&sink)) {
            Ok(process) => process,
            Err(e) => {
                return (
                    InvocationState::Failed,
                    Err(InvocationError::Start {
                        message: e.to_string(),
                    }),
                );
            }
        };

    let reader_cancel = cancel.child_token();
    let process_done = CancellationToken::new();
    let reader = EventStreamReader::new(
        ByteTailer::new(event_sink.path().to_path_buf()),
        BuildEventParser::default(),
        sink,
        config.poll_interval(),
    );
    let reader_task = tokio::spawn(reader.run(reader_cancel.clone(), process_done.clone()));

    let status = tokio::select! {
        () = cancel.cancelled() => {
            tracing::info!("Cancelling build invocation");
            if let Err(e) = process.graceful_terminate(config.terminate_timeout()).await {
                tracing::warn!(error = %e, "Failed to terminate build process");
            }
            process_done.cancel();
            stop_reader(reader_task, &reader_cancel, config.drain_grace()).await;
            return (InvocationState::Cancelled, Err(InvocationError::Cancelled));
        }
        status = process.wait() => status,
    };

    process_done.cancel();
    stop_reader(reader_task, &reader_cancel, config.drain_grace()).await;

    let status = match status {
        Ok(status) => status,
        Err(e) => {
            return (
                InvocationState::Failed,
                Err(InvocationError::Start {
                    message: format!("failed waiting for build process: {e}"),
                }),
            );
        }
    };

    let exit_code = status.code().unwrap_or(-1);
    let classification = ExitClassification::from_exit_code(exit_code);
    tracing::info!(exit_code, %classification, "Build process exited");

    if !classification.build_completed() {
        return (
            InvocationState::Completed,
            Ok(Arc::new(AggregatedResult::no_outputs(
                classification,
                exit_code,
            ))),
        );
    }

    match aggregate::aggregate(event_sink.path(), classification, exit_code).await {
        Ok(result) => (InvocationState::Completed, Ok(Arc::new(result))),
        Err(e) => (
            InvocationState::Failed,
            Err(InvocationError::ArtifactExtraction {
                bytes_consumed: e.bytes_consumed(),
                message: e.to_string(),
            }),
        ),
    }
}

/// Let the live reader drain within the grace period, then force it down.
async fn stop_reader(
    mut task: JoinHandle<u64>,
    reader_cancel: &CancellationToken,
    grace: Duration,
) {
    match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(consumed)) => {
            tracing::debug!(consumed, "Event stream reader finished");
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Event stream reader task failed");
        }
        Err(_) => {
            tracing::debug!("Event stream reader exceeded drain grace; cancelling");
            reader_cancel.cancel();
            let _ = task.await;
        }
    }
}
