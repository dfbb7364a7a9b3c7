use thiserror::Error;

/// Error kinds surfaced by the inspector. Structural corruption aborts the
/// current traversal; unsupported constructs skip the affected object only.
#[derive(Debug, Error)]
pub enum IbdError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Compressed, encrypted, temporary or flags-invalid tablespace. The
    /// whole session is unusable.
    #[error("unsupported tablespace: {0}")]
    UnsupportedSpace(String),

    /// Per-table/per-index capability miss; the object is skipped and the
    /// session continues.
    #[error("unsupported object: {0}")]
    UnsupportedObject(String),

    #[error("corrupt page {page_no}: {reason}")]
    CorruptPage { page_no: u32, reason: String },

    #[error("corrupt record at 0x{offset:x}: {reason}")]
    CorruptRecord { offset: usize, reason: String },

    #[error("corrupt SDI: {0}")]
    CorruptSdi(String),

    /// Violated internal invariant. Treated as a bug, terminates the session.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = IbdError> = std::result::Result<T, E>;
