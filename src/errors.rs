//! Error types for the notekeep backend.
//!
//! This module defines custom error types that categorize different failures
//! that can occur while managing notes, catalogs, and backups.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The main error type for the notekeep backend.
#[derive(Error, Debug)]
pub enum NotesError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors related to zip operations.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: i64 },

    /// Setting key does not exist.
    #[error("Setting not found: {key}")]
    SettingNotFound { key: String },

    /// An area with the same name already exists in the catalog.
    #[error("Area already exists: {name}")]
    AreaAlreadyExists { name: String },

    /// A tag with the same name already exists in the catalog.
    #[error("Tag already exists: {name}")]
    TagAlreadyExists { name: String },

    /// Invalid input: bad export format, empty content, out-of-range
    /// pagination or calendar arguments. No partial effect occurred.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockPoisoned { message: String },

    /// Errors related to backup operations.
    #[error("Backup failed: {message}")]
    BackupFailed { message: String },

    /// Error when attempting to restore from backup.
    #[error("Restore failed: {message}")]
    RestoreFailed { message: String },
}

impl NotesError {
    /// Shorthand for a [`NotesError::Validation`] with a formatted message.
    pub fn validation(message: impl Into<String>) -> Self {
        NotesError::Validation {
            message: message.into(),
        }
    }
}
