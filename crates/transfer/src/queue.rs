use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::types::{ChunkDescriptor, TaskState, TransferTask};

/// A chunk whose retry budget ran out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub index: usize,
    pub local_path: PathBuf,
    pub attempts: u32,
}

/// Outcome counts once the queue has drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub succeeded: usize,
    /// Permanent failures, in the order they were acknowledged.
    pub failures: Vec<ChunkFailure>,
}

/// Result of acknowledging a popped task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledged {
    pub index: usize,
    /// `Succeeded`, `PermanentlyFailed`, or `Pending` when re-enqueued.
    pub state: TaskState,
    pub retries_left: u32,
    pub attempts: u32,
}

/// Thread-safe FIFO of [`TransferTask`]s with join-until-drained semantics.
///
/// Every pushed task counts as unfinished until it is acknowledged through
/// [`finish`](Self::finish). A failed task with budget left goes back to the
/// tail and stays unfinished, so [`join`](Self::join) keeps waiting for it.
pub struct ChunkQueue<'a> {
    state: Mutex<QueueState<'a>>,
    available: Condvar,
    drained: Condvar,
}

struct QueueState<'a> {
    pending: VecDeque<TransferTask<'a>>,
    unfinished: usize,
    summary: QueueSummary,
}

impl Default for ChunkQueue<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ChunkQueue<'a> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                unfinished: 0,
                summary: QueueSummary::default(),
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    /// Creates a queue holding one task per chunk, in index order.
    pub fn from_chunks(chunks: &'a [ChunkDescriptor], budget: u32) -> Self {
        let queue = Self::new();
        for chunk in chunks {
            queue.push(TransferTask::new(chunk, budget));
        }
        queue
    }

    // A worker panicking mid-transfer never leaves the state half-updated,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, QueueState<'a>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a task to the tail.
    pub fn push(&self, task: TransferTask<'a>) {
        let mut s = self.lock();
        s.pending.push_back(task);
        s.unfinished += 1;
        self.available.notify_one();
    }

    /// Pops the head task, waiting at most `wait` for one to arrive.
    ///
    /// The returned task is already marked in flight and must be handed back
    /// through [`finish`](Self::finish).
    pub fn pop_timeout(&self, wait: Duration) -> Option<TransferTask<'a>> {
        let s = self.lock();
        let (mut s, _) = self
            .available
            .wait_timeout_while(s, wait, |s| s.pending.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        let mut task = s.pending.pop_front()?;
        task.begin();
        Some(task)
    }

    /// Acknowledges a popped task.
    ///
    /// On failure the task is re-enqueued at the tail while its budget lasts,
    /// otherwise it is recorded as a permanent failure.
    pub fn finish(&self, mut task: TransferTask<'a>, succeeded: bool) -> Acknowledged {
        let index = task.chunk().index;
        let mut s = self.lock();

        let state = if succeeded {
            s.summary.succeeded += 1;
            task.succeed()
        } else {
            task.fail()
        };
        let ack = Acknowledged {
            index,
            state,
            retries_left: task.retries_left(),
            attempts: task.attempts(),
        };

        match state {
            TaskState::Pending => {
                debug!(index, retries_left = ack.retries_left, "re-queuing chunk");
                s.pending.push_back(task);
                s.unfinished += 1;
                self.available.notify_one();
            }
            TaskState::PermanentlyFailed => {
                warn!(index, attempts = ack.attempts, "chunk retry budget exhausted");
                s.summary.failures.push(ChunkFailure {
                    index,
                    local_path: task.chunk().local_path.clone(),
                    attempts: ack.attempts,
                });
            }
            TaskState::Succeeded | TaskState::InFlight => {}
        }

        s.unfinished -= 1;
        if s.unfinished == 0 {
            self.drained.notify_all();
        }
        ack
    }

    /// Blocks until every task ever pushed has succeeded or permanently failed.
    pub fn join(&self) {
        let s = self.lock();
        let _s = self
            .drained
            .wait_while(s, |s| s.unfinished > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Returns `true` if no task is waiting to be popped.
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Number of tasks waiting to be popped.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of tasks not yet acknowledged as terminal (queued or in flight).
    #[cfg(test)]
    fn unfinished(&self) -> usize {
        self.lock().unfinished
    }

    /// Snapshot of the outcomes recorded so far.
    pub fn summary(&self) -> QueueSummary {
        self.lock().summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    const WAIT: Duration = Duration::from_millis(20);

    fn descriptors(n: usize) -> Vec<ChunkDescriptor> {
        (0..n)
            .map(|index| ChunkDescriptor {
                index,
                local_path: PathBuf::from(format!("chunk_.{index:05}")),
                remote_path: format!("file.bin.{index:05}"),
                checksum: String::new(),
                len: 10,
            })
            .collect()
    }

    #[test]
    fn pops_in_index_order() {
        let chunks = descriptors(3);
        let queue = ChunkQueue::from_chunks(&chunks, 1);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.unfinished(), 3);

        let order: Vec<usize> = (0..3)
            .map(|_| {
                let task = queue.pop_timeout(WAIT).unwrap();
                assert_eq!(task.state(), TaskState::InFlight);
                let index = task.chunk().index;
                queue.finish(task, true);
                index
            })
            .collect();

        assert_eq!(order, vec![0, 1, 2]);
        assert!(queue.is_empty());
        assert_eq!(queue.unfinished(), 0);
    }

    #[test]
    fn pop_times_out_when_empty() {
        let queue = ChunkQueue::new();
        assert!(queue.pop_timeout(WAIT).is_none());
    }

    #[test]
    fn failed_task_goes_to_tail() {
        let chunks = descriptors(3);
        let queue = ChunkQueue::from_chunks(&chunks, 2);

        let first = queue.pop_timeout(WAIT).unwrap();
        let ack = queue.finish(first, false);
        assert_eq!(ack.state, TaskState::Pending);
        assert_eq!(ack.retries_left, 1);
        assert_eq!(queue.unfinished(), 3);

        let order: Vec<usize> = std::iter::from_fn(|| queue.pop_timeout(WAIT))
            .map(|task| {
                let index = task.chunk().index;
                queue.finish(task, true);
                index
            })
            .collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(queue.summary().succeeded, 3);
    }

    #[test]
    fn exhausted_budget_is_recorded_not_requeued() {
        let chunks = descriptors(1);
        let queue = ChunkQueue::from_chunks(&chunks, 2);

        let task = queue.pop_timeout(WAIT).unwrap();
        queue.finish(task, false);
        let task = queue.pop_timeout(WAIT).unwrap();
        assert_eq!(task.attempts(), 2);
        let ack = queue.finish(task, false);

        assert_eq!(ack.state, TaskState::PermanentlyFailed);
        assert!(queue.is_empty());
        assert_eq!(queue.unfinished(), 0);

        let summary = queue.summary();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(
            summary.failures,
            vec![ChunkFailure {
                index: 0,
                local_path: PathBuf::from("chunk_.00000"),
                attempts: 2,
            }]
        );
    }

    #[test]
    fn join_on_empty_queue_returns() {
        let queue = ChunkQueue::new();
        queue.join();
    }

    #[test]
    fn join_waits_for_requeued_success() {
        let chunks = descriptors(1);
        let queue = ChunkQueue::from_chunks(&chunks, 3);
        let joined = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                queue.join();
                joined.store(true, Ordering::SeqCst);
            });

            for attempt in 1..=3 {
                let task = queue.pop_timeout(Duration::from_secs(1)).unwrap();
                assert_eq!(task.attempts(), attempt);
                thread::sleep(Duration::from_millis(10));
                assert!(!joined.load(Ordering::SeqCst));
                let ack = queue.finish(task, attempt == 3);
                if attempt < 3 {
                    assert_eq!(ack.state, TaskState::Pending);
                } else {
                    assert_eq!(ack.state, TaskState::Succeeded);
                }
            }
        });

        assert!(joined.load(Ordering::SeqCst));
        let summary = queue.summary();
        assert_eq!(summary.succeeded, 1);
        assert!(summary.failures.is_empty());
    }

    #[test]
    fn concurrent_consumers_drain_everything() {
        let chunks = descriptors(200);
        let queue = ChunkQueue::from_chunks(&chunks, 2);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    while !queue.is_empty() {
                        let Some(task) = queue.pop_timeout(WAIT) else {
                            continue;
                        };
                        // Odd chunks fail their first attempt.
                        let ok = task.chunk().index % 2 == 0 || task.attempts() > 1;
                        queue.finish(task, ok);
                    }
                });
            }
            queue.join();
        });

        let summary = queue.summary();
        assert_eq!(summary.succeeded, 200);
        assert!(summary.failures.is_empty());
        assert_eq!(queue.unfinished(), 0);
    }
}
