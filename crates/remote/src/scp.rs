//! `scp`/`ssh` transport.
//!
//! Each call spawns one child process in batch mode (key-based auth only,
//! never prompts) and kills it if it outlives the configured timeout.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::{RemoteCommand, RemoteOutput};
use crate::error::TransportError;
use crate::{DEFAULT_CALL_TIMEOUT, Transport};

/// Connection settings shared by `scp` and `ssh` invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScpConfig {
    /// Remote host, optionally `user@host`.
    pub host: String,
    /// Cipher passed with `-c`; `None` keeps the ssh default.
    pub cipher: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
    /// Upper bound for a single scp/ssh invocation.
    pub timeout: Duration,
}

impl ScpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            cipher: None,
            port: None,
            identity_file: None,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Transport backed by the system `scp` and `ssh` binaries.
///
/// Calls are blocking; an internal runtime drives the child processes so
/// any number of worker threads can call in concurrently.
pub struct ScpTransport {
    config: ScpConfig,
    runtime: tokio::runtime::Runtime,
}

impl ScpTransport {
    /// Creates the transport and its process-driving runtime.
    pub fn new(config: ScpConfig) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("chunkcp-proc")
            .enable_all()
            .build()?;
        Ok(Self { config, runtime })
    }

    /// Arguments for `scp` copying `local` to `remote_path`.
    pub fn scp_args(&self, local: &Path, remote_path: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-q".into(), "-oBatchMode=yes".into()];
        if let Some(cipher) = &self.config.cipher {
            args.push("-c".into());
            args.push(cipher.into());
        }
        if let Some(port) = self.config.port {
            args.push("-P".into());
            args.push(port.to_string().into());
        }
        if let Some(identity) = &self.config.identity_file {
            args.push("-i".into());
            args.push(identity.into());
        }
        args.push(local.into());
        args.push(format!("{}:{}", self.config.host, remote_path).into());
        args
    }

    /// Arguments for `ssh` running `command` on the host.
    pub fn ssh_args(&self, command: &RemoteCommand) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-oBatchMode=yes".into()];
        if let Some(cipher) = &self.config.cipher {
            args.push("-c".into());
            args.push(cipher.into());
        }
        if let Some(port) = self.config.port {
            args.push("-p".into());
            args.push(port.to_string().into());
        }
        if let Some(identity) = &self.config.identity_file {
            args.push("-i".into());
            args.push(identity.into());
        }
        args.push(self.config.host.as_str().into());
        args.push(command.render().into());
        args
    }

    fn execute(
        &self,
        program: &'static str,
        args: Vec<OsString>,
    ) -> Result<RemoteOutput, TransportError> {
        let timeout = self.config.timeout;
        self.runtime.block_on(async move {
            let mut cmd = Command::new(program);
            cmd.args(&args).stdin(Stdio::null()).kill_on_drop(true);

            let output = match tokio::time::timeout(timeout, cmd.output()).await {
                Ok(result) => result.map_err(|e| TransportError::Spawn { program, source: e })?,
                Err(_) => {
                    warn!(program, timeout_secs = timeout.as_secs(), "call timed out, child killed");
                    return Err(TransportError::Timeout { program, timeout });
                }
            };

            Ok(RemoteOutput {
                status: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}

impl Transport for ScpTransport {
    fn copy_file(&self, local: &Path, remote_path: &str) -> Result<(), TransportError> {
        debug!(local = %local.display(), remote = %remote_path, "scp");
        let output = self.execute("scp", self.scp_args(local, remote_path))?;
        if output.success() {
            Ok(())
        } else {
            Err(TransportError::CommandFailed {
                program: "scp".into(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    fn run_remote(&self, command: &RemoteCommand) -> Result<RemoteOutput, TransportError> {
        debug!(host = %self.config.host, command = %command, "ssh");
        self.execute("ssh", self.ssh_args(command))
    }
}
