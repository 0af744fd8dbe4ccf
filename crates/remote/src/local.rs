//! Transport that treats a local directory as the destination host.
//!
//! Useful when the destination is a mounted network share, and as a
//! deterministic backend for exercising the pipeline.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chunkcp_transfer::calculate_file_checksum;
use tracing::debug;

use crate::Transport;
use crate::command::{RemoteCommand, RemoteOutput};
use crate::error::TransportError;

/// Executes transport operations against the local filesystem.
///
/// Relative remote paths resolve against `root`; absolute paths are used
/// as given.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a remote path onto the local filesystem.
    pub fn resolve(&self, remote_path: &str) -> PathBuf {
        self.root.join(remote_path)
    }

    fn concat(&self, chunk: &str, dest: &str, append: bool) -> std::io::Result<u64> {
        let mut src = File::open(self.resolve(chunk))?;
        let mut dst = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(self.resolve(dest))?;
        std::io::copy(&mut src, &mut dst)
    }

    fn execute(&self, command: &RemoteCommand) -> Result<String, String> {
        match command {
            RemoteCommand::Truncate { chunk, dest } => self
                .concat(chunk, dest, false)
                .map(|_| String::new())
                .map_err(|e| format!("cat: {chunk}: {e}")),
            RemoteCommand::Append { chunk, dest } => self
                .concat(chunk, dest, true)
                .map(|_| String::new())
                .map_err(|e| format!("cat: {chunk}: {e}")),
            RemoteCommand::Digest { path } => calculate_file_checksum(&self.resolve(path))
                .map(|hex| format!("MD5({path})= {hex}\n"))
                .map_err(|e| format!("{path}: {e}")),
            RemoteCommand::Remove { path } => match std::fs::remove_file(self.resolve(path)) {
                Ok(()) => Ok(String::new()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
                Err(e) => Err(format!("rm: {path}: {e}")),
            },
        }
    }
}

impl Transport for LocalTransport {
    fn copy_file(&self, local: &Path, remote_path: &str) -> Result<(), TransportError> {
        let target = self.resolve(remote_path);
        debug!(local = %local.display(), target = %target.display(), "local copy");
        std::fs::copy(local, &target)?;
        Ok(())
    }

    fn run_remote(&self, command: &RemoteCommand) -> Result<RemoteOutput, TransportError> {
        debug!(command = %command, root = %self.root.display(), "local command");
        Ok(match self.execute(command) {
            Ok(stdout) => RemoteOutput {
                status: 0,
                stdout,
                stderr: String::new(),
            },
            Err(stderr) => RemoteOutput {
                status: 1,
                stdout: String::new(),
                stderr,
            },
        })
    }
}
