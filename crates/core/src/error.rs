//! Error types for loading, saving and correlating a session.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::Address;

/// Process exit codes, kept stable for scripts driving the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    InvalidCallHistory,
    CannotLoadCallHistory,
    InvalidArchive,
    CannotLoadArchive,
    InvalidFileCombination,
    InternalAssertion,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::InvalidCallHistory => -1,
            ExitCode::CannotLoadCallHistory => -2,
            ExitCode::InvalidArchive => -3,
            ExitCode::CannotLoadArchive => -4,
            ExitCode::InvalidFileCombination => -5,
            ExitCode::InternalAssertion => -6,
        }
    }
}

/// Failure to load a call-history dump.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Call history file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read call history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt call history file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported dump version {found}; this build reads version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Failure to write a call-history dump.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode call history: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure to open or read the symbol archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    #[error("Unreadable archive {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("File not found in archive: {0}")]
    MissingFile(String),
}

/// Consistency failure during correlation.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The dump references an address the archive knows nothing about; the
    /// two inputs belong to different analyses.
    #[error(
        "Address {address} missing from archive line info \
         (wrong combination of dump and archive?)"
    )]
    InvalidFileCombination { address: Address },
}

/// Any fatal error while opening a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl SessionError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SessionError::Load(LoadError::NotFound(_)) => ExitCode::InvalidCallHistory,
            SessionError::Load(_) => ExitCode::CannotLoadCallHistory,
            SessionError::Archive(ArchiveError::NotFound(_)) => ExitCode::InvalidArchive,
            SessionError::Archive(_) => ExitCode::CannotLoadArchive,
            SessionError::Index(_) => ExitCode::InvalidFileCombination,
        }
    }
}

/// An internal invariant broke while handling a command. The session was
/// dumped to `snapshot` when that succeeded.
#[derive(Debug, Error)]
#[error("Internal assertion failed: {message}{}", snapshot_note(.snapshot))]
pub struct InternalAssertion {
    pub message: String,
    pub snapshot: Option<PathBuf>,
}

fn snapshot_note(snapshot: &Option<PathBuf>) -> String {
    match snapshot {
        Some(path) => format!(" (current work stored in {})", path.display()),
        None => String::new(),
    }
}

impl InternalAssertion {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::InternalAssertion
    }
}
