use std::path::PathBuf;

/// Pipeline phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Split,
    DigestUpload,
    Transfer,
    Reassembly,
    Verification,
    Cleanup,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Split => "splitting file",
            Phase::DigestUpload => "uploading checksum",
            Phase::Transfer => "transferring chunks",
            Phase::Reassembly => "re-assembling file at remote end",
            Phase::Verification => "checking remote file checksum",
            Phase::Cleanup => "cleaning up",
        };
        f.write_str(name)
    }
}

/// Progress notification emitted by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    PhaseStarted(Phase),
    /// A chunk file was fully written to disk.
    ChunkWritten { index: usize, path: PathBuf, bytes: u64 },
    /// A worker started an attempt; `queued` is what is left in the queue.
    ChunkStarted {
        index: usize,
        total: usize,
        attempt: u32,
        queued: usize,
    },
    ChunkFinished { index: usize, total: usize, bytes: u64 },
    ChunkRequeued { index: usize, retries_left: u32 },
    /// Retry budget exhausted.
    ChunkAbandoned { index: usize, attempts: u32 },
    Reassembled { index: usize, total: usize },
    ArtifactRemoved { path: String, remote: bool },
}

/// Receives progress events.
///
/// Implementations are shared by every worker thread, so they must be
/// `Send + Sync`. Any `Fn(&TransferEvent) + Send + Sync` closure qualifies.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &TransferEvent);
}

impl<F> ProgressReporter for F
where
    F: Fn(&TransferEvent) + Send + Sync,
{
    fn report(&self, event: &TransferEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: &TransferEvent) {}
}
