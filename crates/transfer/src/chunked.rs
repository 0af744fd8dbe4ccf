use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use tracing::debug;

use crate::progress::{ProgressReporter, TransferEvent};
use crate::types::{ChunkDescriptor, FileDigest};
use crate::{DEFAULT_CHUNK_PREFIX, INDEX_WIDTH, READ_BUFFER_SIZE, TransferError};

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes MD5 of `data` and returns the lowercase hex digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes MD5 of an entire file without loading it into memory.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 2 * 1024 * 1024];
    loop {
        let n = read_some(&mut file, &mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Joins a remote directory and a file name with `/`.
///
/// An empty directory yields the bare name (the remote login directory).
pub fn remote_join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        return name.to_string();
    }
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() {
        format!("/{name}")
    } else {
        format!("{trimmed}/{name}")
    }
}

fn read_some(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

// ---------------------------------------------------------------------------
// Chunker
// ---------------------------------------------------------------------------

/// Splits a file into numbered chunk files, hashing as it goes.
///
/// Local chunks are named `<prefix>.<index>` and written next to the source
/// (or into the configured work directory). Remote chunk names use the
/// source's base name instead of the prefix so the destination mirrors it.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: u64,
    prefix: String,
    work_dir: Option<PathBuf>,
    remote_dir: String,
    buffer_size: usize,
}

impl Chunker {
    /// Creates a chunker producing chunks of at most `chunk_size` bytes.
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            prefix: DEFAULT_CHUNK_PREFIX.to_string(),
            work_dir: None,
            remote_dir: String::new(),
            buffer_size: READ_BUFFER_SIZE,
        }
    }

    /// Sets the local chunk file prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Writes chunks into `dir` instead of the source's directory.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Sets the remote directory used to build each chunk's remote path.
    pub fn remote_dir(mut self, dir: impl Into<String>) -> Self {
        self.remote_dir = dir.into();
        self
    }

    /// Overrides the read buffer size (mostly useful for tests).
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Returns the local path of chunk `index` for `source`.
    pub fn local_chunk_path(&self, source: &Path, index: usize) -> PathBuf {
        let dir = match &self.work_dir {
            Some(dir) => dir.clone(),
            None => source
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        dir.join(format!("{}.{index:0INDEX_WIDTH$}", self.prefix))
    }

    /// Splits `source` into chunk files.
    ///
    /// Returns the whole-file digest and the chunks in index order. A source
    /// smaller than one chunk (including an empty one) yields exactly one
    /// chunk. Chunks already written when an error occurs are left on disk.
    pub fn split(
        &self,
        source: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<(FileDigest, Vec<ChunkDescriptor>), TransferError> {
        if self.chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::InvalidPath(source.display().to_string()))?;

        let source_err = |e| TransferError::SourceRead {
            path: source.to_path_buf(),
            source: e,
        };
        let mut src = File::open(source).map_err(source_err)?;
        let canonical_source = std::fs::canonicalize(source).map_err(source_err)?;

        let mut file_hasher = Md5::new();
        let mut buf = vec![0u8; self.buffer_size];
        let mut chunks: Vec<ChunkDescriptor> = Vec::new();
        let mut current: Option<ChunkFile> = None;

        loop {
            let room = current
                .as_ref()
                .map_or(self.chunk_size, |c| self.chunk_size - c.written);
            let want = room.min(buf.len() as u64) as usize;
            let n = read_some(&mut src, &mut buf[..want]).map_err(source_err)?;
            if n == 0 {
                break;
            }
            file_hasher.update(&buf[..n]);

            let mut chunk = match current.take() {
                Some(chunk) => chunk,
                None => self.open_chunk(source, &canonical_source, chunks.len())?,
            };
            chunk.write(&buf[..n])?;

            if chunk.written == self.chunk_size {
                chunks.push(self.close_chunk(chunk, &file_name, progress)?);
            } else {
                current = Some(chunk);
            }
        }

        if let Some(last) = current.take() {
            chunks.push(self.close_chunk(last, &file_name, progress)?);
        }
        if chunks.is_empty() {
            let empty = self.open_chunk(source, &canonical_source, 0)?;
            chunks.push(self.close_chunk(empty, &file_name, progress)?);
        }

        let digest = FileDigest {
            checksum: hex::encode(file_hasher.finalize()),
            file_name,
        };
        debug!(
            source = %source.display(),
            chunks = chunks.len(),
            checksum = %digest.checksum,
            "split complete"
        );
        Ok((digest, chunks))
    }

    /// Creates chunk `index`, refusing a path that resolves to the source itself.
    fn open_chunk(
        &self,
        source: &Path,
        canonical_source: &Path,
        index: usize,
    ) -> Result<ChunkFile, TransferError> {
        let path = self.local_chunk_path(source, index);
        if std::fs::canonicalize(&path).is_ok_and(|p| p == canonical_source) {
            return Err(TransferError::InvalidPath(format!(
                "chunk {} would overwrite the source file",
                path.display()
            )));
        }
        let file = File::create(&path).map_err(|e| TransferError::ChunkWrite {
            path: path.clone(),
            source: e,
        })?;
        Ok(ChunkFile {
            index,
            path,
            file,
            hasher: Md5::new(),
            written: 0,
        })
    }

    fn close_chunk(
        &self,
        mut chunk: ChunkFile,
        file_name: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<ChunkDescriptor, TransferError> {
        chunk.file.flush().map_err(|e| TransferError::ChunkWrite {
            path: chunk.path.clone(),
            source: e,
        })?;

        let remote_name = format!("{file_name}.{:0INDEX_WIDTH$}", chunk.index);
        let descriptor = ChunkDescriptor {
            index: chunk.index,
            remote_path: remote_join(&self.remote_dir, &remote_name),
            checksum: hex::encode(chunk.hasher.finalize()),
            len: chunk.written,
            local_path: chunk.path,
        };
        progress.report(&TransferEvent::ChunkWritten {
            index: descriptor.index,
            path: descriptor.local_path.clone(),
            bytes: descriptor.len,
        });
        Ok(descriptor)
    }
}

/// A chunk file currently being written.
struct ChunkFile {
    index: usize,
    path: PathBuf,
    file: File,
    hasher: Md5,
    written: u64,
}

impl ChunkFile {
    fn write(&mut self, data: &[u8]) -> Result<(), TransferError> {
        self.file
            .write_all(data)
            .map_err(|e| TransferError::ChunkWrite {
                path: self.path.clone(),
                source: e,
            })?;
        self.hasher.update(data);
        self.written += data.len() as u64;
        Ok(())
    }
}
