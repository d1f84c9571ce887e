use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration management.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Document exists but is not a valid remap document.
    #[error("Config document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document path is a symlink; rewriting it would replace the link
    /// with a regular file and silently detach it from its target.
    #[error("Config document is a symlink, refusing to rewrite it: {0}")]
    SymlinkedDocument(PathBuf),

    /// Backup directory cannot be created or written to.
    #[error("Backup directory not writable: {0}")]
    BackupDirNotWritable(PathBuf),

    /// Failed to create backup file.
    #[error("Failed to create backup: {0}")]
    BackupFailed(String),

    /// Atomic write operation failed.
    #[error("Atomic write failed: {0}")]
    WriteFailed(String),

    /// File system watcher could not be installed.
    #[error("Failed to watch config directory: {0}")]
    Watch(#[from] notify::Error),

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
