use chunkcp_remote::{RemoteCommand, Transport};
use chunkcp_transfer::{ChunkDescriptor, ProgressReporter, TransferEvent};
use tracing::{debug, info};

use crate::error::PipelineError;

/// Rebuilds the destination file from uploaded chunks.
///
/// Runs strictly in ascending index order, regardless of the order in which
/// chunks finished uploading. Chunk 0 creates or truncates the destination;
/// every later chunk is appended. The first failing command aborts the run.
pub struct Reassembler<'t> {
    transport: &'t dyn Transport,
    progress: &'t dyn ProgressReporter,
}

impl<'t> Reassembler<'t> {
    pub fn new(transport: &'t dyn Transport, progress: &'t dyn ProgressReporter) -> Self {
        Self {
            transport,
            progress,
        }
    }

    pub fn reassemble(&self, chunks: &[ChunkDescriptor], dest: &str) -> Result<(), PipelineError> {
        let mut ordered: Vec<&ChunkDescriptor> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.index);
        let total = ordered.len();
        info!(dest, chunks = total, "re-assembling remote file");

        for (position, chunk) in ordered.into_iter().enumerate() {
            let command = if position == 0 {
                RemoteCommand::Truncate {
                    chunk: chunk.remote_path.clone(),
                    dest: dest.to_string(),
                }
            } else {
                RemoteCommand::Append {
                    chunk: chunk.remote_path.clone(),
                    dest: dest.to_string(),
                }
            };
            debug!(index = chunk.index, command = %command, "re-assembly step");

            self.transport
                .run_remote(&command)
                .and_then(|output| output.check(&command))
                .map_err(|source| PipelineError::Reassembly {
                    index: chunk.index,
                    source,
                })?;

            self.progress.report(&TransferEvent::Reassembled {
                index: chunk.index,
                total,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkcp_remote::{RemoteOutput, TransportError};
    use chunkcp_transfer::NoProgress;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<RemoteCommand>>,
        fail_at: Option<String>,
    }

    impl Transport for Recorder {
        fn copy_file(&self, _local: &Path, _remote: &str) -> Result<(), TransportError> {
            Ok(())
        }

        fn run_remote(&self, command: &RemoteCommand) -> Result<RemoteOutput, TransportError> {
            self.commands.lock().unwrap().push(command.clone());
            let failing = matches!(
                (command, &self.fail_at),
                (RemoteCommand::Append { chunk, .. }, Some(f)) if chunk == f
            );
            Ok(RemoteOutput {
                status: if failing { 1 } else { 0 },
                stdout: String::new(),
                stderr: if failing { "No space left on device".into() } else { String::new() },
            })
        }
    }

    fn chunk(index: usize) -> ChunkDescriptor {
        ChunkDescriptor {
            index,
            local_path: PathBuf::from(format!("chunk_.{index:05}")),
            remote_path: format!("in/f.{index:05}"),
            checksum: String::new(),
            len: 1,
        }
    }

    #[test]
    fn concatenates_in_index_order() {
        let recorder = Recorder::default();
        // Completion order from the workers is irrelevant.
        let chunks = vec![chunk(2), chunk(0), chunk(3), chunk(1)];
        Reassembler::new(&recorder, &NoProgress)
            .reassemble(&chunks, "in/f")
            .unwrap();

        let commands = recorder.commands.into_inner().unwrap();
        let rendered: Vec<String> = commands.iter().map(|c| c.render()).collect();
        assert_eq!(
            rendered,
            [
                "cat in/f.00000 > in/f",
                "cat in/f.00001 >> in/f",
                "cat in/f.00002 >> in/f",
                "cat in/f.00003 >> in/f",
            ]
        );
    }

    #[test]
    fn single_chunk_only_truncates() {
        let recorder = Recorder::default();
        Reassembler::new(&recorder, &NoProgress)
            .reassemble(&[chunk(0)], "f")
            .unwrap();
        let commands = recorder.commands.into_inner().unwrap();
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], RemoteCommand::Truncate { .. }));
    }

    #[test]
    fn first_failure_aborts() {
        let recorder = Recorder {
            fail_at: Some("in/f.00001".into()),
            ..Default::default()
        };
        let chunks: Vec<_> = (0..4).map(chunk).collect();
        let err = Reassembler::new(&recorder, &NoProgress)
            .reassemble(&chunks, "in/f")
            .unwrap_err();

        match err {
            PipelineError::Reassembly { index, source } => {
                assert_eq!(index, 1);
                assert!(source.to_string().contains("No space left"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(recorder.commands.into_inner().unwrap().len(), 2);
    }
}
