use std::{fmt, future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use log::{debug, warn};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};

/// Lifecycle of a submitted training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Handle to a training job running in the background.
pub struct Job {
    name: String,
    tx: Arc<watch::Sender<JobState>>,
    rx: watch::Receiver<JobState>,
    task: JoinHandle<()>,
}

impl Job {
    /// Runs `work` as a background task on the current tokio runtime.
    ///
    /// The job moves from `Pending` to `Running` once the task starts, then to
    /// `Succeeded` or `Failed` depending on the outcome. A panic inside `work`
    /// counts as a failure.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn spawn<N, F>(name: N, work: F) -> Self
    where
        N: Into<String>,
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = watch::channel(JobState::Pending);
        let tx = Arc::new(tx);

        let task_tx = Arc::clone(&tx);
        let task_name = name.clone();
        let task = tokio::spawn(async move {
            advance(&task_tx, JobState::Running);

            let state = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(())) => JobState::Succeeded,
                Ok(Err(msg)) => {
                    warn!(job = task_name.as_str(); "job failed: {msg}");
                    JobState::Failed
                }
                Err(_) => {
                    warn!(job = task_name.as_str(); "job panicked");
                    JobState::Failed
                }
            };

            advance(&task_tx, state);
        });

        Self { name, tx, rx, task }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current state, without waiting.
    pub fn state(&self) -> JobState {
        *self.rx.borrow()
    }

    /// Waits until the job reaches a terminal state and returns it.
    pub async fn wait(&self) -> JobState {
        let mut rx = self.rx.clone();
        match rx.wait_for(JobState::is_terminal).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// Stops the job unless it already finished.
    pub fn cancel(&self) {
        if advance(&self.tx, JobState::Cancelled) {
            self.task.abort();
            debug!(job = self.name.as_str(); "job cancelled");
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Moves to `next` unless the job is already terminal. Returns whether the
/// state changed.
fn advance(tx: &watch::Sender<JobState>, next: JobState) -> bool {
    tx.send_if_modified(|state| {
        if state.is_terminal() {
            return false;
        }
        *state = next;
        true
    })
}
