//! Remote command model and shell rendering.

use std::fmt;

use crate::error::TransportError;

/// A command executed on the destination host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Create or overwrite `dest` with the bytes of `chunk`.
    Truncate { chunk: String, dest: String },
    /// Append the bytes of `chunk` to `dest`.
    Append { chunk: String, dest: String },
    /// Compute the MD5 digest of `path`.
    Digest { path: String },
    /// Delete `path`, ignoring a missing file.
    Remove { path: String },
}

impl RemoteCommand {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCommand::Truncate { .. } => "truncate",
            RemoteCommand::Append { .. } => "append",
            RemoteCommand::Digest { .. } => "digest",
            RemoteCommand::Remove { .. } => "remove",
        }
    }

    /// Renders the command line for a POSIX remote shell.
    ///
    /// The digest uses `openssl md5`, available on both Linux and macOS.
    pub fn render(&self) -> String {
        match self {
            RemoteCommand::Truncate { chunk, dest } => {
                format!("cat {} > {}", shell_quote(chunk), shell_quote(dest))
            }
            RemoteCommand::Append { chunk, dest } => {
                format!("cat {} >> {}", shell_quote(chunk), shell_quote(dest))
            }
            RemoteCommand::Digest { path } => format!("openssl md5 {}", shell_quote(path)),
            RemoteCommand::Remove { path } => format!("rm -f {}", shell_quote(path)),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    /// Exit status; `-1` when the process was killed by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Converts a non-zero exit status into [`TransportError::CommandFailed`].
    pub fn check(self, command: &RemoteCommand) -> Result<Self, TransportError> {
        if self.success() {
            Ok(self)
        } else {
            Err(TransportError::CommandFailed {
                program: command.name().to_string(),
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Quotes `arg` for a POSIX shell when it contains anything unusual.
///
/// A leading `~/` stays unquoted so the remote shell still expands it.
pub fn shell_quote(arg: &str) -> String {
    if let Some(rest) = arg.strip_prefix("~/") {
        return format!("~/{}", shell_quote(rest));
    }
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./+:=@,%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Extracts the MD5 hex digest from `openssl md5` or `md5sum` output.
///
/// Accepts `MD5(path)= <hex>` and `<hex>  path`; returns the digest
/// lowercased, or `None` if the output holds no 32-digit hex digest.
pub fn parse_md5_output(output: &str) -> Option<String> {
    let line = output.lines().rev().find(|l| !l.trim().is_empty())?.trim();
    let candidate = match line.rsplit_once("= ") {
        Some((_, digest)) => digest.trim(),
        None => line.split_whitespace().next()?,
    };
    let candidate = candidate.strip_prefix('\\').unwrap_or(candidate);
    let valid = candidate.len() == 32 && candidate.chars().all(|c| c.is_ascii_hexdigit());
    valid.then(|| candidate.to_ascii_lowercase())
}
