//! Error types for the PBV pipeline

use thiserror::Error;

/// PBV error types
#[derive(Debug, Error)]
pub enum PbvError {
    /// Input is not a valid zip container, or the write target was declined.
    #[error("Archive error: {0}")]
    Archive(String),
    /// An entry expected to hold JSON failed to parse.
    #[error("Malformed JSON in '{path}': {reason}")]
    MalformedJson {
        /// Entry path inside the container or extracted tree.
        path: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// Two split-group members collide on the same sanitized identifier.
    #[error("Duplicate member identifier '{identifier}' in split group '{group}'")]
    DuplicateIdentifier {
        /// Split group field name.
        group: String,
        /// Colliding sanitized identifier.
        identifier: String,
    },
    /// The ordering record names a member with no corresponding file.
    #[error("Split group '{group}' is missing member '{identifier}'")]
    MissingMember {
        /// Split group field name.
        group: String,
        /// Sanitized identifier the ordering record references.
        identifier: String,
    },
    /// A member file exists that the ordering record does not name.
    #[error("Split group '{group}' has unexpected member '{identifier}'")]
    UnexpectedMember {
        /// Split group field name.
        group: String,
        /// Sanitized identifier of the stray file.
        identifier: String,
    },
    /// A path is missing, already exists, or is otherwise unusable.
    #[error("Filesystem error at '{path}': {reason}")]
    Filesystem {
        /// Offending path.
        path: String,
        /// What went wrong.
        reason: String,
    },
    /// Entry bytes do not decode in the encoding the host uses for them.
    #[error("Encoding error in '{path}': {reason}")]
    Encoding {
        /// Entry path inside the container or extracted tree.
        path: String,
        /// What went wrong.
        reason: String,
    },
    /// I/O operation failed while reading or writing data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization failed outside any specific entry.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PbvError {
    /// Process exit code for this error kind.
    ///
    /// 2 archive, 3 malformed input, 4 split-group inconsistency,
    /// 5 filesystem, 1 anything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            PbvError::Archive(_) => 2,
            PbvError::MalformedJson { .. } | PbvError::Encoding { .. } => 3,
            PbvError::DuplicateIdentifier { .. }
            | PbvError::MissingMember { .. }
            | PbvError::UnexpectedMember { .. } => 4,
            PbvError::Filesystem { .. } => 5,
            PbvError::Io(_) | PbvError::Json(_) => 1,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PbvError>;
