//! Chunked parallel transfer of a single large file.
//!
//! This crate implements the run itself. It has no CLI or console
//! dependencies: the caller supplies a [`Transport`](chunkcp_remote::Transport)
//! and a [`ProgressReporter`](chunkcp_transfer::ProgressReporter).
//!
//! # Pipeline
//!
//! 1. **Split**: write numbered chunk files, hashing the whole file and each chunk
//! 2. **Digest upload**: write `<source>.md5` and copy it to the destination
//! 3. **Transfer**: workers drain the chunk queue with per-chunk retry budgets
//! 4. **Reassembly**: concatenate remote chunks strictly in index order
//! 5. **Verification**: compare the remote file's MD5 with the local one
//! 6. **Cleanup**: remove local and remote chunks, only after a verified match

pub mod cleanup;
pub mod error;
pub mod orchestrator;
pub mod pool;
pub mod reassemble;
pub mod types;
pub mod verify;

pub use cleanup::Cleanup;
pub use error::{ConfigError, PipelineError};
pub use orchestrator::TransferOrchestrator;
pub use pool::WorkerPool;
pub use reassemble::Reassembler;
pub use types::{
    CleanupFailure, CleanupReport, PhaseTimings, TransferConfig, TransferReport, TransferSession,
};
pub use verify::Verifier;

use std::time::Duration;

/// Default number of concurrent transfer workers.
pub const DEFAULT_WORKERS: usize = 3;

/// Default per-chunk attempt budget.
pub const DEFAULT_RETRIES: u32 = 3;

/// How long an idle worker waits on the queue before re-checking it.
pub const QUEUE_POP_WAIT: Duration = Duration::from_secs(1);
