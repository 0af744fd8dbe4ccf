//! File chunking and chunk bookkeeping for parallel transfers.
//!
//! Splits a source file into numbered chunk files in a single pass while
//! hashing both the whole file and every chunk, and provides the
//! thread-safe queue that transfer workers drain.

mod chunked;
mod progress;
mod queue;
mod types;

use std::path::PathBuf;

pub use chunked::{Chunker, calculate_file_checksum, checksum_bytes, remote_join};
pub use progress::{NoProgress, Phase, ProgressReporter, TransferEvent};
pub use queue::{Acknowledged, ChunkFailure, ChunkQueue, QueueSummary};
pub use types::{ChunkDescriptor, FileDigest, TaskState, TransferTask};

/// Default chunk size: 500 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 500 * 1024 * 1024;

/// Read buffer used while splitting, independent of the chunk size (5 MiB).
pub const READ_BUFFER_SIZE: usize = 5 * 1024 * 1024;

/// Width of the zero-padded index suffix on chunk file names.
pub const INDEX_WIDTH: usize = 5;

/// Default prefix for local chunk files.
pub const DEFAULT_CHUNK_PREFIX: &str = "chunk_";

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read source {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write chunk {}: {source}", path.display())]
    ChunkWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("chunk size must be positive")]
    InvalidChunkSize,

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
