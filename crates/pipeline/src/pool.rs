//! Worker pool that drains a [`ChunkQueue`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;
use std::time::Duration;

use chunkcp_remote::{Transport, TransportError};
use chunkcp_transfer::{ChunkQueue, ProgressReporter, QueueSummary, TaskState, TransferEvent};
use tracing::{debug, error, info, warn};

use crate::QUEUE_POP_WAIT;

/// Fixed-size pool of OS threads uploading chunks through one transport.
///
/// Each worker pops a task, copies the chunk, and acknowledges the result;
/// the queue decides whether a failure is re-enqueued or abandoned. A
/// worker exits once it finds the queue empty.
pub struct WorkerPool<'t> {
    workers: usize,
    transport: &'t dyn Transport,
    progress: &'t dyn ProgressReporter,
    pop_wait: Duration,
}

impl<'t> WorkerPool<'t> {
    pub fn new(
        workers: usize,
        transport: &'t dyn Transport,
        progress: &'t dyn ProgressReporter,
    ) -> Self {
        Self {
            workers: workers.max(1),
            transport,
            progress,
            pop_wait: QUEUE_POP_WAIT,
        }
    }

    /// Overrides how long an idle worker blocks on the queue.
    pub fn pop_wait(mut self, wait: Duration) -> Self {
        self.pop_wait = wait;
        self
    }

    /// Runs every task in `queue` to a terminal state and returns the summary.
    ///
    /// Blocks until the queue's join barrier releases; `total` is only used
    /// for progress events.
    pub fn run(&self, queue: &ChunkQueue<'_>, total: usize) -> QueueSummary {
        info!(workers = self.workers, chunks = total, "starting transfer workers");

        thread::scope(|scope| {
            let mut spawned = 0;
            for id in 0..self.workers {
                let worker = thread::Builder::new()
                    .name(format!("chunkcp-worker-{id}"))
                    .spawn_scoped(scope, move || self.work(id, queue, total));
                match worker {
                    Ok(_) => spawned += 1,
                    Err(e) => warn!(worker = id, error = %e, "failed to spawn worker"),
                }
            }
            if spawned == 0 {
                warn!("no worker threads available, transferring on the calling thread");
                self.work(0, queue, total);
            }
            queue.join();
        });

        let summary = queue.summary();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failures.len(),
            "transfer workers finished"
        );
        summary
    }

    fn work(&self, id: usize, queue: &ChunkQueue<'_>, total: usize) {
        loop {
            if queue.is_empty() {
                debug!(worker = id, "queue empty, worker exiting");
                return;
            }
            let Some(task) = queue.pop_timeout(self.pop_wait) else {
                continue;
            };

            let chunk = task.chunk();
            self.notify(&TransferEvent::ChunkStarted {
                index: chunk.index,
                total,
                attempt: task.attempts(),
                queued: queue.len(),
            });

            let result = self.copy(chunk.local_path.as_path(), &chunk.remote_path);
            if let Err(e) = &result {
                warn!(
                    worker = id,
                    index = chunk.index,
                    attempt = task.attempts(),
                    error = %e,
                    "chunk upload failed"
                );
            }

            let ack = queue.finish(task, result.is_ok());
            let event = match ack.state {
                TaskState::Succeeded => TransferEvent::ChunkFinished {
                    index: ack.index,
                    total,
                    bytes: chunk.len,
                },
                TaskState::Pending => TransferEvent::ChunkRequeued {
                    index: ack.index,
                    retries_left: ack.retries_left,
                },
                TaskState::PermanentlyFailed => {
                    error!(index = ack.index, attempts = ack.attempts, "chunk upload abandoned");
                    TransferEvent::ChunkAbandoned {
                        index: ack.index,
                        attempts: ack.attempts,
                    }
                }
                TaskState::InFlight => continue,
            };
            self.notify(&event);
        }
    }

    /// Reports `event`. A panicking reporter must not keep a popped task
    /// from being acknowledged, or `join` would never return.
    fn notify(&self, event: &TransferEvent) {
        if catch_unwind(AssertUnwindSafe(|| self.progress.report(event))).is_err() {
            warn!(?event, "progress reporter panicked");
        }
    }

    /// One upload attempt. A panicking transport counts as a failed attempt.
    fn copy(&self, local: &std::path::Path, remote: &str) -> Result<(), TransportError> {
        match catch_unwind(AssertUnwindSafe(|| self.transport.copy_file(local, remote))) {
            Ok(result) => result,
            Err(_) => Err(TransportError::Io(std::io::Error::other(
                "transport panicked during upload",
            ))),
        }
    }
}
