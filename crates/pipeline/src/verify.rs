use chunkcp_remote::{RemoteCommand, Transport, parse_md5_output};
use chunkcp_transfer::FileDigest;
use tracing::{error, info};

use crate::error::PipelineError;

/// Compares the reassembled remote file's MD5 with the local digest.
pub struct Verifier<'t> {
    transport: &'t dyn Transport,
}

impl<'t> Verifier<'t> {
    pub fn new(transport: &'t dyn Transport) -> Self {
        Self { transport }
    }

    /// Asks the remote host for the MD5 of `path`.
    pub fn remote_digest(&self, path: &str) -> Result<String, PipelineError> {
        let command = RemoteCommand::Digest {
            path: path.to_string(),
        };
        let output = self
            .transport
            .run_remote(&command)
            .and_then(|output| output.check(&command))
            .map_err(PipelineError::RemoteDigest)?;
        parse_md5_output(&output.stdout).ok_or(PipelineError::UnreadableDigest {
            output: output.stdout,
        })
    }

    /// Returns the matching digest, or [`PipelineError::ChecksumMismatch`].
    pub fn verify(&self, expected: &FileDigest, path: &str) -> Result<String, PipelineError> {
        let local = expected.checksum.to_ascii_lowercase();
        let remote = self.remote_digest(path)?;
        if local == remote {
            info!(path, checksum = %remote, "checksums match");
            Ok(remote)
        } else {
            error!(path, %local, %remote, "checksum mismatch");
            Err(PipelineError::ChecksumMismatch { local, remote })
        }
    }
}
