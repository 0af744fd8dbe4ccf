use std::path::PathBuf;

/// One chunk of the source file, as written to disk by the [`Chunker`](crate::Chunker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Zero-based sequence index; defines reassembly order.
    pub index: usize,
    /// Local chunk file.
    pub local_path: PathBuf,
    /// Destination path of the chunk on the remote host.
    pub remote_path: String,
    /// MD5 hex digest of the chunk bytes.
    pub checksum: String,
    /// Chunk length in bytes.
    pub len: u64,
}

/// Whole-file digest computed while splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase MD5 hex digest of the full source.
    pub checksum: String,
    /// Base name of the source file.
    pub file_name: String,
}

impl FileDigest {
    /// Renders the `<hex> <name>` line stored in the `.md5` side file.
    pub fn record(&self) -> String {
        format!("{} {}", self.checksum, self.file_name)
    }
}

/// Lifecycle of a [`TransferTask`].
///
/// `Pending -> InFlight -> {Succeeded | Pending | PermanentlyFailed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,
    Succeeded,
    PermanentlyFailed,
}

/// A queued transfer of one chunk with its remaining attempt budget.
#[derive(Debug)]
pub struct TransferTask<'a> {
    chunk: &'a ChunkDescriptor,
    retries_left: u32,
    attempts: u32,
    state: TaskState,
}

impl<'a> TransferTask<'a> {
    /// Creates a pending task allowed `budget` attempts (at least one).
    pub fn new(chunk: &'a ChunkDescriptor, budget: u32) -> Self {
        Self {
            chunk,
            retries_left: budget.max(1),
            attempts: 0,
            state: TaskState::Pending,
        }
    }

    /// Marks the task as in flight and counts the attempt.
    pub fn begin(&mut self) {
        debug_assert_eq!(self.state, TaskState::Pending);
        self.state = TaskState::InFlight;
        self.attempts += 1;
    }

    /// Records a successful transfer.
    pub fn succeed(&mut self) -> TaskState {
        debug_assert_eq!(self.state, TaskState::InFlight);
        self.state = TaskState::Succeeded;
        self.state
    }

    /// Records a failed attempt, returning `Pending` while budget remains.
    pub fn fail(&mut self) -> TaskState {
        debug_assert_eq!(self.state, TaskState::InFlight);
        self.retries_left = self.retries_left.saturating_sub(1);
        self.state = if self.retries_left > 0 {
            TaskState::Pending
        } else {
            TaskState::PermanentlyFailed
        };
        self.state
    }

    pub fn chunk(&self) -> &'a ChunkDescriptor {
        self.chunk
    }

    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> TaskState {
        self.state
    }
}
