//! Single-shot completion for asynchronous capture jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::warn;
use viewcap_types::VideoOutput;

use crate::error::SessionError;

/// Outcome of a recording or assembly job.
pub type JobResult = Result<VideoOutput, SessionError>;

/// Caller side of a job: resolves exactly once with the job's result.
#[must_use = "the handle is the only way to observe the job's result"]
#[derive(Debug)]
pub struct CompletionHandle {
    result_rx: Receiver<JobResult>,
    cancelled: Arc<AtomicBool>,
}

/// Worker side of a job.
#[derive(Debug)]
pub(crate) struct Completer {
    result_tx: Sender<JobResult>,
    cancelled: Arc<AtomicBool>,
}

/// Create a connected completer/handle pair.
pub(crate) fn completion_pair() -> (Completer, CompletionHandle) {
    let (result_tx, result_rx) = crossbeam_channel::bounded(1);
    let cancelled = Arc::new(AtomicBool::new(false));

    (
        Completer {
            result_tx,
            cancelled: Arc::clone(&cancelled),
        },
        CompletionHandle {
            result_rx,
            cancelled,
        },
    )
}

impl Completer {
    /// Deliver the result. Consumes the completer, so it can happen only once.
    pub(crate) fn complete(self, result: JobResult) {
        if self.result_tx.send(result).is_err() {
            warn!("Completion handle dropped before the job finished");
        }
    }

    /// Returns true if the caller asked to cancel the job.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl CompletionHandle {
    /// Block until the job finishes.
    pub fn wait(self) -> JobResult {
        self.result_rx
            .recv()
            .unwrap_or(Err(SessionError::WorkerLost))
    }

    /// Block until the job finishes or `timeout` elapses.
    ///
    /// On timeout the handle is returned so the caller can keep waiting.
    pub fn wait_timeout(self, timeout: Duration) -> Result<JobResult, Self> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => Err(self),
            Err(RecvTimeoutError::Disconnected) => Ok(Err(SessionError::WorkerLost)),
        }
    }

    /// Take the result if the job has already finished.
    pub fn try_result(self) -> Result<JobResult, Self> {
        match self.result_rx.try_recv() {
            Ok(result) => Ok(result),
            Err(TryRecvError::Empty) => Err(self),
            Err(TryRecvError::Disconnected) => Ok(Err(SessionError::WorkerLost)),
        }
    }

    /// Returns true once the result is available.
    pub fn is_finished(&self) -> bool {
        !self.result_rx.is_empty()
    }

    /// Ask the job to stop. The partial output is discarded and the handle
    /// resolves with [`SessionError::Cancelled`] unless the job already
    /// finished.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Run `callback` with the result on a background thread.
    pub fn on_complete<F>(self, callback: F) -> std::io::Result<()>
    where
        F: FnOnce(JobResult) + Send + 'static,
    {
        thread::Builder::new()
            .name("viewcap-completion".to_string())
            .spawn(move || callback(self.wait()))?;
        Ok(())
    }
}
