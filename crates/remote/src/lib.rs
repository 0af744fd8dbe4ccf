//! Transport adapters that move chunk files and run commands remotely.
//!
//! The pipeline only sees the [`Transport`] trait. [`ScpTransport`] shells
//! out to `scp`/`ssh` with a bounded timeout per call; [`LocalTransport`]
//! performs the same operations against a local directory tree.

pub mod command;
pub mod error;
pub mod local;
pub mod scp;

pub use command::{RemoteCommand, RemoteOutput, parse_md5_output, shell_quote};
pub use error::TransportError;
pub use local::LocalTransport;
pub use scp::{ScpConfig, ScpTransport};

use std::path::Path;
use std::time::Duration;

/// Default ssh cipher.
pub const DEFAULT_CIPHER: &str = "aes128-ctr";

/// Default timeout for a single adapter call (one hour).
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Moves files to, and runs commands on, the destination host.
///
/// Implementations are shared by all transfer workers. Every call blocks
/// until it completes or its own timeout fires.
pub trait Transport: Send + Sync {
    /// Copies `local` to `remote_path` on the destination.
    fn copy_file(&self, local: &Path, remote_path: &str) -> Result<(), TransportError>;

    /// Runs `command` on the destination and returns its output and exit status.
    ///
    /// A non-zero exit status is not an error at this level; see
    /// [`RemoteOutput::check`].
    fn run_remote(&self, command: &RemoteCommand) -> Result<RemoteOutput, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn copy_file(&self, local: &Path, remote_path: &str) -> Result<(), TransportError> {
        (**self).copy_file(local, remote_path)
    }

    fn run_remote(&self, command: &RemoteCommand) -> Result<RemoteOutput, TransportError> {
        (**self).run_remote(command)
    }
}
