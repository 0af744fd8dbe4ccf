use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::size::parse_size;

/// Copy one large file to a remote host as parallel scp chunks.
///
/// The file is split locally, the chunks are uploaded by several scp
/// processes at once, re-assembled at the remote end and verified by MD5.
#[derive(Debug, Parser)]
#[command(name = "chunkcp", version)]
pub struct Cli {
    /// Local file to send
    pub source: PathBuf,

    /// Remote host ([user@]host)
    pub remote: String,

    /// Destination directory on the remote host
    pub dest: String,

    /// Chunk size, e.g. 500M, 1Gi, 250kilo [default: 500M]
    #[arg(short = 's', long = "size", value_name = "SIZE", value_parser = parse_size)]
    pub size: Option<u64>,

    /// Number of concurrent scp transfers [default: 3]
    #[arg(short = 't', long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Attempts per chunk before giving up [default: 3]
    #[arg(short = 'r', long = "retries", value_name = "N")]
    pub retries: Option<u32>,

    /// ssh cipher; an empty string keeps the ssh default [default: aes128-ctr]
    #[arg(short = 'c', long = "cipher")]
    pub cipher: Option<String>,

    /// Timeout for a single scp/ssh call, in seconds [default: 3600]
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory for local chunk files [default: the source's directory]
    #[arg(long = "work-dir", value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Prefix for local chunk files [default: chunk_]
    #[arg(long = "prefix")]
    pub prefix: Option<String>,

    /// ssh port
    #[arg(long = "port")]
    pub port: Option<u16>,

    /// ssh identity file
    #[arg(short = 'i', long = "identity", value_name = "PATH")]
    pub identity: Option<PathBuf>,

    /// Treat DEST as a local directory (e.g. a mounted share) instead of using ssh
    #[arg(long = "local")]
    pub local: bool,

    /// Config file [default: ~/.config/chunkcp/config.toml]
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positionals_only() {
        let cli = Cli::try_parse_from(["chunkcp", "2GB.mov", "backup@nas", "~/"]).unwrap();
        assert_eq!(cli.source, PathBuf::from("2GB.mov"));
        assert_eq!(cli.remote, "backup@nas");
        assert_eq!(cli.dest, "~/");
        assert!(cli.size.is_none());
        assert!(cli.threads.is_none());
        assert!(!cli.local);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn all_options() {
        let cli = Cli::try_parse_from([
            "chunkcp",
            "-s",
            "250M",
            "-t",
            "8",
            "-r",
            "5",
            "-c",
            "aes256-ctr",
            "--timeout",
            "60",
            "--work-dir",
            "/scratch",
            "--prefix",
            "part_",
            "--port",
            "2222",
            "-i",
            "/home/me/.ssh/id",
            "-vv",
            "--log-file",
            "/tmp/chunkcp.log",
            "disk.img",
            "nas",
            "/srv/in",
        ])
        .unwrap();
        assert_eq!(cli.size, Some(262_144_000));
        assert_eq!(cli.threads, Some(8));
        assert_eq!(cli.retries, Some(5));
        assert_eq!(cli.cipher.as_deref(), Some("aes256-ctr"));
        assert_eq!(cli.timeout, Some(60));
        assert_eq!(cli.work_dir, Some(PathBuf::from("/scratch")));
        assert_eq!(cli.prefix.as_deref(), Some("part_"));
        assert_eq!(cli.port, Some(2222));
        assert_eq!(cli.identity, Some(PathBuf::from("/home/me/.ssh/id")));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/chunkcp.log")));
    }

    #[test]
    fn bad_size_is_rejected() {
        let err = Cli::try_parse_from(["chunkcp", "-s", "12 foo", "a", "h", "d"]).unwrap_err();
        assert!(err.to_string().contains("can't interpret '12 foo'"));
    }

    #[test]
    fn missing_dest_is_rejected() {
        assert!(Cli::try_parse_from(["chunkcp", "a", "h"]).is_err());
    }
}
