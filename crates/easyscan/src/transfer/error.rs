//! Transfer error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum StagingError {
    /// Leftover files from an earlier cycle. Never deleted automatically.
    #[error(
        "Staging directory '{}' is not empty: {}",
        .path.display(),
        .entries.join(", ")
    )]
    DirtyStaging { path: PathBuf, entries: Vec<String> },

    #[error("Failed to create staging directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read staging directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write staged file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove staged file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a handoff did not complete.
#[derive(Error, Debug)]
pub enum HandoffFailure {
    #[error("Remote credentials unavailable: {0}")]
    Credentials(String),

    #[error("Remote host key rejected: {0}")]
    HostKeyRejected(String),

    #[error("Remote authentication failed: {0}")]
    Authentication(String),

    #[error("Could not connect to remote host: {0}")]
    Connect(String),

    #[error("Transfer of '{file}' failed: {message}")]
    Transfer { file: String, message: String },

    #[error("Remote operation timed out after {0}s")]
    Timeout(u64),

    #[error("Closing the remote session failed: {0}")]
    Close(String),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A failed handoff, with the files that did and did not reach the remote side.
#[derive(Error, Debug)]
#[error(
    "Handoff failed: {reason} (completed: [{}], pending: [{}])",
    .completed.join(", "),
    .pending.join(", ")
)]
pub struct HandoffError {
    pub completed: Vec<String>,
    pub pending: Vec<String>,
    #[source]
    pub reason: HandoffFailure,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// The staged pair is left in place under `stem` for operator follow-up.
    #[error("Handoff of '{stem}' failed: {source}")]
    Handoff {
        stem: String,
        #[source]
        source: HandoffError,
    },

    /// Files were delivered but the local pair could not be removed.
    #[error("Delivered '{stem}', but releasing the staged files failed: {source}")]
    Release {
        stem: String,
        #[source]
        source: StagingError,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Scan request {0} not found")]
    RecordNotFound(i64),
}

/// Classifies ssh/sftp stderr into a [`HandoffFailure`].
pub fn classify_ssh_error(stderr: &str) -> HandoffFailure {
    let lower = stderr.to_lowercase();
    let message = stderr.trim().to_string();

    if lower.contains("host key verification failed")
        || lower.contains("remote host identification has changed")
        || lower.contains("no matching host key")
        || lower.contains("host key for") && lower.contains("has changed")
    {
        return HandoffFailure::HostKeyRejected(message);
    }

    if lower.contains("permission denied")
        || lower.contains("authentication failed")
        || lower.contains("too many authentication failures")
        || lower.contains("no supported authentication methods")
    {
        return HandoffFailure::Authentication(message);
    }

    HandoffFailure::Connect(message)
}
