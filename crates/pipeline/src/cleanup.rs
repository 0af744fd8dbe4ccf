//! Best-effort removal of chunk artifacts after a verified transfer.

use std::io::ErrorKind;

use chunkcp_remote::{RemoteCommand, Transport};
use chunkcp_transfer::{ChunkDescriptor, ProgressReporter, TransferEvent};
use tracing::{info, warn};

use crate::types::{CleanupFailure, CleanupReport};

/// Deletes local chunk files and their remote copies.
///
/// Individual failures are logged and collected; they never abort the run,
/// since the destination file is already verified by the time this runs.
pub struct Cleanup<'t> {
    transport: &'t dyn Transport,
    progress: &'t dyn ProgressReporter,
}

impl<'t> Cleanup<'t> {
    pub fn new(transport: &'t dyn Transport, progress: &'t dyn ProgressReporter) -> Self {
        Self {
            transport,
            progress,
        }
    }

    pub fn run(&self, chunks: &[ChunkDescriptor]) -> CleanupReport {
        let mut report = CleanupReport::default();

        for chunk in chunks {
            let local = chunk.local_path.display().to_string();
            match std::fs::remove_file(&chunk.local_path) {
                Ok(()) => {
                    report.local_removed += 1;
                    self.removed(local, false);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(path = %local, "local chunk already gone");
                }
                Err(e) => {
                    warn!(path = %local, error = %e, "failed to remove local chunk");
                    report.failures.push(CleanupFailure {
                        path: local,
                        remote: false,
                        error: e.to_string(),
                    });
                }
            }

            let command = RemoteCommand::Remove {
                path: chunk.remote_path.clone(),
            };
            match self
                .transport
                .run_remote(&command)
                .and_then(|output| output.check(&command))
            {
                Ok(_) => {
                    report.remote_removed += 1;
                    self.removed(chunk.remote_path.clone(), true);
                }
                Err(e) => {
                    warn!(path = %chunk.remote_path, error = %e, "failed to remove remote chunk");
                    report.failures.push(CleanupFailure {
                        path: chunk.remote_path.clone(),
                        remote: true,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            local = report.local_removed,
            remote = report.remote_removed,
            failed = report.failures.len(),
            "cleanup finished"
        );
        report
    }

    fn removed(&self, path: String, remote: bool) {
        self.progress
            .report(&TransferEvent::ArtifactRemoved { path, remote });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkcp_remote::LocalTransport;
    use chunkcp_transfer::NoProgress;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn chunk(dir: &TempDir, index: usize) -> ChunkDescriptor {
        let local_path = dir.path().join(format!("chunk_.{index:05}"));
        std::fs::write(&local_path, b"x").unwrap();
        ChunkDescriptor {
            index,
            local_path,
            remote_path: format!("f.{index:05}"),
            checksum: String::new(),
            len: 1,
        }
    }

    #[test]
    fn removes_both_sides() {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let chunks: Vec<_> = (0..3).map(|i| chunk(&local, i)).collect();
        for c in &chunks {
            std::fs::write(remote.path().join(&c.remote_path), b"x").unwrap();
        }

        let transport = LocalTransport::new(remote.path());
        let report = Cleanup::new(&transport, &NoProgress).run(&chunks);

        assert_eq!(report.local_removed, 3);
        assert_eq!(report.remote_removed, 3);
        assert!(report.is_clean());
        for c in &chunks {
            assert!(!c.local_path.exists());
            assert!(!remote.path().join(&c.remote_path).exists());
        }
    }

    #[test]
    fn failures_are_collected_not_fatal() {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let mut chunks: Vec<_> = (0..2).map(|i| chunk(&local, i)).collect();
        // A directory cannot be removed with remove_file.
        let blocker = local.path().join("dir.00002");
        std::fs::create_dir(&blocker).unwrap();
        chunks.push(ChunkDescriptor {
            index: 2,
            local_path: blocker,
            remote_path: "f.00002".into(),
            checksum: String::new(),
            len: 0,
        });

        let transport = LocalTransport::new(remote.path());
        let report = Cleanup::new(&transport, &NoProgress).run(&chunks);

        assert_eq!(report.local_removed, 2);
        assert_eq!(report.remote_removed, 3);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.failures[0].remote);
    }

    #[test]
    fn missing_local_chunk_is_not_a_failure() {
        let remote = TempDir::new().unwrap();
        let chunks = vec![ChunkDescriptor {
            index: 0,
            local_path: PathBuf::from("/nonexistent/chunk_.00000"),
            remote_path: "f.00000".into(),
            checksum: String::new(),
            len: 0,
        }];
        let transport = LocalTransport::new(remote.path());
        let report = Cleanup::new(&transport, &NoProgress).run(&chunks);
        assert_eq!(report.local_removed, 0);
        assert!(report.is_clean());
    }
}
