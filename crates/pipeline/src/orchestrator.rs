//! Drives one transfer through every phase.

use std::time::{Duration, Instant};

use chunkcp_remote::Transport;
use chunkcp_transfer::{ChunkQueue, Chunker, Phase, ProgressReporter, TransferEvent};
use tracing::{error, info};

use crate::QUEUE_POP_WAIT;
use crate::cleanup::Cleanup;
use crate::error::PipelineError;
use crate::pool::WorkerPool;
use crate::reassemble::Reassembler;
use crate::types::{TransferReport, TransferSession};
use crate::verify::Verifier;

/// Runs split, digest upload, transfer, reassembly, verification and cleanup.
///
/// Any error after the split stops the run and leaves all local and remote
/// artifacts in place, so a failed transfer can be inspected or resumed by
/// hand. Cleanup only runs after the checksums match.
pub struct TransferOrchestrator<'t> {
    transport: &'t dyn Transport,
    progress: &'t dyn ProgressReporter,
    pop_wait: Duration,
}

impl<'t> TransferOrchestrator<'t> {
    pub fn new(transport: &'t dyn Transport, progress: &'t dyn ProgressReporter) -> Self {
        Self {
            transport,
            progress,
            pop_wait: QUEUE_POP_WAIT,
        }
    }

    /// Overrides the idle wait of transfer workers.
    pub fn pop_wait(mut self, wait: Duration) -> Self {
        self.pop_wait = wait;
        self
    }

    pub fn run(&self, session: &mut TransferSession) -> Result<TransferReport, PipelineError> {
        info!(
            source = %session.config().source.display(),
            remote = %session.config().remote,
            dest = %session.remote_file(),
            "starting transfer"
        );

        let result = self.run_phases(session);
        if let Err(e) = &result {
            error!(error = %e, "transfer failed, artifacts left in place");
        }
        result
    }

    fn run_phases(&self, session: &mut TransferSession) -> Result<TransferReport, PipelineError> {
        self.split(session)?;
        self.upload_digest(session)?;
        self.transfer(session)?;

        let dest = session.remote_file();
        let started = self.begin(Phase::Reassembly);
        Reassembler::new(self.transport, self.progress).reassemble(session.chunks(), &dest)?;
        session.record(Phase::Reassembly, started.elapsed());

        let started = self.begin(Phase::Verification);
        let digest = session
            .digest()
            .cloned()
            .ok_or_else(|| std::io::Error::other("source was not split"))?;
        let checksum = Verifier::new(self.transport).verify(&digest, &dest)?;
        session.record(Phase::Verification, started.elapsed());

        let started = self.begin(Phase::Cleanup);
        let cleanup = Cleanup::new(self.transport, self.progress).run(session.chunks());
        session.record(Phase::Cleanup, started.elapsed());

        let report = TransferReport {
            file_name: session.file_name().to_string(),
            remote_file: dest,
            chunks: session.chunks().len(),
            total_bytes: session.total_bytes(),
            checksum,
            timings: *session.timings(),
            cleanup,
        };
        info!(
            file = %report.file_name,
            bytes = report.total_bytes,
            chunks = report.chunks,
            elapsed_ms = report.timings.total().as_millis() as u64,
            "transfer complete"
        );
        Ok(report)
    }

    fn begin(&self, phase: Phase) -> Instant {
        info!(%phase, "phase started");
        self.progress.report(&TransferEvent::PhaseStarted(phase));
        Instant::now()
    }

    fn split(&self, session: &mut TransferSession) -> Result<(), PipelineError> {
        let started = self.begin(Phase::Split);
        let config = session.config();
        let mut chunker = Chunker::new(config.chunk_size)
            .prefix(config.prefix.clone())
            .remote_dir(config.dest_dir.clone());
        if let Some(dir) = &config.work_dir {
            chunker = chunker.work_dir(dir.clone());
        }

        let (digest, chunks) = chunker.split(&config.source, self.progress)?;
        info!(chunks = chunks.len(), checksum = %digest.checksum, "split complete");
        session.set_split(digest, chunks);
        session.record(Phase::Split, started.elapsed());
        Ok(())
    }

    /// Writes `<source>.md5` and copies it next to the destination file.
    fn upload_digest(&self, session: &mut TransferSession) -> Result<(), PipelineError> {
        let started = self.begin(Phase::DigestUpload);
        let record = session
            .digest()
            .map(|d| d.record())
            .ok_or_else(|| std::io::Error::other("source was not split"))?;
        let local = session.digest_file();
        std::fs::write(&local, record)?;

        self.transport
            .copy_file(&local, &session.remote_digest_file())
            .map_err(PipelineError::DigestUpload)?;
        session.record(Phase::DigestUpload, started.elapsed());
        Ok(())
    }

    fn transfer(&self, session: &mut TransferSession) -> Result<(), PipelineError> {
        let started = self.begin(Phase::Transfer);
        let summary = {
            let config = session.config();
            let chunks = session.chunks();
            let queue = ChunkQueue::from_chunks(chunks, config.retries);
            WorkerPool::new(config.workers, self.transport, self.progress)
                .pop_wait(self.pop_wait)
                .run(&queue, chunks.len())
        };
        session.record(Phase::Transfer, started.elapsed());

        if summary.failures.is_empty() {
            Ok(())
        } else {
            let mut indices: Vec<usize> = summary.failures.iter().map(|f| f.index).collect();
            indices.sort_unstable();
            for failure in &summary.failures {
                error!(
                    index = failure.index,
                    path = %failure.local_path.display(),
                    attempts = failure.attempts,
                    "FAILED to upload chunk"
                );
            }
            Err(PipelineError::ChunksFailed { indices })
        }
    }
}
