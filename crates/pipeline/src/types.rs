use std::path::{Path, PathBuf};
use std::time::Duration;

use chunkcp_transfer::{
    ChunkDescriptor, DEFAULT_CHUNK_PREFIX, DEFAULT_CHUNK_SIZE, FileDigest, Phase, remote_join,
};

use crate::error::ConfigError;
use crate::{DEFAULT_RETRIES, DEFAULT_WORKERS};

/// Settings for one transfer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Local file to send.
    pub source: PathBuf,
    /// Destination host, used for logging; the transport holds the connection.
    pub remote: String,
    /// Destination directory on the host. Empty means the login directory.
    pub dest_dir: String,
    pub chunk_size: u64,
    pub workers: usize,
    /// Attempts allowed per chunk; `0` behaves like `1`.
    pub retries: u32,
    /// Prefix for local chunk files.
    pub prefix: String,
    /// Where local chunks are written; defaults to the source's directory.
    pub work_dir: Option<PathBuf>,
}

impl TransferConfig {
    pub fn new(
        source: impl Into<PathBuf>,
        remote: impl Into<String>,
        dest_dir: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            remote: remote.into(),
            dest_dir: dest_dir.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: DEFAULT_WORKERS,
            retries: DEFAULT_RETRIES,
            prefix: DEFAULT_CHUNK_PREFIX.to_string(),
            work_dir: None,
        }
    }

    /// Checks the settings before any file is written.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.trim().is_empty() {
            return Err(ConfigError::EmptyRemote);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        match std::fs::metadata(&self.source) {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(ConfigError::SourceNotFile(self.source.clone())),
            Err(_) => Err(ConfigError::SourceMissing(self.source.clone())),
        }
    }
}

/// Wall-clock time spent in each phase that ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub split: Option<Duration>,
    pub digest_upload: Option<Duration>,
    pub transfer: Option<Duration>,
    pub reassembly: Option<Duration>,
    pub verification: Option<Duration>,
    pub cleanup: Option<Duration>,
}

impl PhaseTimings {
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        let slot = match phase {
            Phase::Split => &mut self.split,
            Phase::DigestUpload => &mut self.digest_upload,
            Phase::Transfer => &mut self.transfer,
            Phase::Reassembly => &mut self.reassembly,
            Phase::Verification => &mut self.verification,
            Phase::Cleanup => &mut self.cleanup,
        };
        *slot = Some(elapsed);
    }

    pub fn get(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::Split => self.split,
            Phase::DigestUpload => self.digest_upload,
            Phase::Transfer => self.transfer,
            Phase::Reassembly => self.reassembly,
            Phase::Verification => self.verification,
            Phase::Cleanup => self.cleanup,
        }
    }

    /// Sum of all recorded phases.
    pub fn total(&self) -> Duration {
        [
            self.split,
            self.digest_upload,
            self.transfer,
            self.reassembly,
            self.verification,
            self.cleanup,
        ]
        .into_iter()
        .flatten()
        .sum()
    }
}

/// State of a single run: its configuration plus everything the split produced.
#[derive(Debug)]
pub struct TransferSession {
    config: TransferConfig,
    file_name: String,
    digest: Option<FileDigest>,
    chunks: Vec<ChunkDescriptor>,
    timings: PhaseTimings,
}

impl TransferSession {
    /// Validates `config` and opens a session for it.
    pub fn new(config: TransferConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let file_name = config
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ConfigError::SourceNotFile(config.source.clone()))?;
        Ok(Self {
            config,
            file_name,
            digest: None,
            chunks: Vec::new(),
            timings: PhaseTimings::default(),
        })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Base name of the source file.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Whole-file digest, once split.
    pub fn digest(&self) -> Option<&FileDigest> {
        self.digest.as_ref()
    }

    /// Chunks in index order; empty until split.
    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.len).sum()
    }

    /// Path of the reassembled file on the remote host.
    pub fn remote_file(&self) -> String {
        remote_join(&self.config.dest_dir, &self.file_name)
    }

    /// Local `<source>.md5` side file.
    pub fn digest_file(&self) -> PathBuf {
        digest_path(&self.config.source, &self.file_name)
    }

    /// Remote destination of the `.md5` side file.
    pub fn remote_digest_file(&self) -> String {
        remote_join(&self.config.dest_dir, &format!("{}.md5", self.file_name))
    }

    pub(crate) fn set_split(&mut self, digest: FileDigest, chunks: Vec<ChunkDescriptor>) {
        self.digest = Some(digest);
        self.chunks = chunks;
    }

    pub(crate) fn record(&mut self, phase: Phase, elapsed: Duration) {
        self.timings.record(phase, elapsed);
    }
}

fn digest_path(source: &Path, file_name: &str) -> PathBuf {
    source.with_file_name(format!("{file_name}.md5"))
}

/// A cleanup step that could not be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub path: String,
    pub remote: bool,
    pub error: String,
}

/// Outcome of the best-effort cleanup phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub local_removed: usize,
    pub remote_removed: usize,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Summary of a verified transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub file_name: String,
    /// Reassembled path on the remote host.
    pub remote_file: String,
    pub chunks: usize,
    pub total_bytes: u64,
    /// MD5 that matched on both ends.
    pub checksum: String,
    pub timings: PhaseTimings,
    pub cleanup: CleanupReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_in(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("disk.img");
        std::fs::write(&path, b"data").unwrap();
        path
    }

    #[test]
    fn defaults() {
        let config = TransferConfig::new("/tmp/a", "host", "in");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.workers, 3);
        assert_eq!(config.retries, 3);
        assert_eq!(config.prefix, "chunk_");
        assert!(config.work_dir.is_none());
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let dir = TempDir::new().unwrap();
        let source = source_in(&dir);

        let ok = TransferConfig::new(&source, "host", "");
        assert!(ok.validate().is_ok());

        let mut c = ok.clone();
        c.chunk_size = 0;
        assert!(matches!(c.validate(), Err(ConfigError::ZeroChunkSize)));

        let mut c = ok.clone();
        c.workers = 0;
        assert!(matches!(c.validate(), Err(ConfigError::ZeroWorkers)));

        let mut c = ok.clone();
        c.remote = "  ".into();
        assert!(matches!(c.validate(), Err(ConfigError::EmptyRemote)));

        let mut c = ok.clone();
        c.source = dir.path().join("missing");
        assert!(matches!(c.validate(), Err(ConfigError::SourceMissing(_))));

        let mut c = ok;
        c.source = dir.path().to_path_buf();
        assert!(matches!(c.validate(), Err(ConfigError::SourceNotFile(_))));
    }

    #[test]
    fn session_paths() {
        let dir = TempDir::new().unwrap();
        let source = source_in(&dir);
        let session = TransferSession::new(TransferConfig::new(&source, "host", "backup/")).unwrap();

        assert_eq!(session.file_name(), "disk.img");
        assert_eq!(session.remote_file(), "backup/disk.img");
        assert_eq!(session.remote_digest_file(), "backup/disk.img.md5");
        assert_eq!(session.digest_file(), dir.path().join("disk.img.md5"));
        assert!(session.chunks().is_empty());
        assert!(session.digest().is_none());
    }

    #[test]
    fn timings_record_and_total() {
        let mut t = PhaseTimings::default();
        t.record(Phase::Split, Duration::from_secs(2));
        t.record(Phase::Transfer, Duration::from_secs(5));
        assert_eq!(t.get(Phase::Split), Some(Duration::from_secs(2)));
        assert_eq!(t.get(Phase::Cleanup), None);
        assert_eq!(t.total(), Duration::from_secs(7));
    }
}
