//! Pipeline error types.

use std::path::PathBuf;

use chunkcp_remote::TransportError;
use chunkcp_transfer::TransferError;

/// Invalid run configuration, detected before anything is written.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("source file does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("source is not a regular file: {}", .0.display())]
    SourceNotFile(PathBuf),

    #[error("chunk size must be positive")]
    ZeroChunkSize,

    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("remote host must not be empty")]
    EmptyRemote,
}

/// Errors that abort a transfer run.
///
/// Failures after the split leave every local and remote artifact in place.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("splitting failed: {0}")]
    Split(#[from] TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't upload checksum to remote host: {0}")]
    DigestUpload(#[source] TransportError),

    #[error("{} chunk(s) failed to upload: {indices:?}", indices.len())]
    ChunksFailed { indices: Vec<usize> },

    #[error("re-assembly failed at chunk {index}: {source}")]
    Reassembly {
        index: usize,
        source: TransportError,
    },

    #[error("remote checksum failed: {0}")]
    RemoteDigest(#[source] TransportError),

    #[error("remote checksum output has no MD5 digest: {output:?}")]
    UnreadableDigest { output: String },

    #[error("MD5s do not match: local ({local}) != remote ({remote})")]
    ChecksumMismatch { local: String, remote: String },
}
