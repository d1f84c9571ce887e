//! Configuration persistence with atomic writes and backup support.
//!
//! This module owns the on-disk remap document. Key features:
//!
//! - **Atomic writes**: Uses temp-file-then-rename to prevent corruption
//! - **Automatic backups**: Every save creates a timestamped backup
//! - **Rollback safety**: Failed transactions leave the original untouched
//! - **Symlink refusal**: A symlinked document is never rewritten in place
//! - **Live reload**: A watcher reports saves so the engine can reload
//!
//! # Example
//!
//! ```no_run
//! use keyremapd::config::{ConfigManager, RemapDocument};
//!
//! let manager = ConfigManager::new("/home/user/.config/keyremapd/remaps.json".into())?;
//!
//! // A missing document reads as the empty default
//! let mut document = manager.load()?;
//! document.chord_window_ms = 75;
//!
//! // Transactional save: backup, then atomic replace
//! manager.save(&document)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

pub mod document;
pub mod watcher;

mod error;
mod transaction;

pub use document::RemapDocument;
pub use error::ConfigError;
pub use transaction::ConfigTransaction;
pub use watcher::ConfigWatcher;

#[cfg(test)]
mod tests;

/// The conventional document location, with `~` expanded.
pub fn default_document_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.config/keyremapd/remaps.json").as_ref())
}

/// Manages the remap document with safe atomic operations.
///
/// Provides load/save access with automatic backup creation. All writes go
/// through the transaction API to ensure atomicity and recoverability. A
/// missing document is not an error: it loads as the empty default, so the
/// engine can start before any configuration has been written.
#[derive(Debug)]
pub struct ConfigManager {
    /// Path to the remap document.
    document_path: PathBuf,
    backup_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager for the given document path.
    ///
    /// Creates the document's directory and the backup directory next to it
    /// if they don't exist. If the document is a symlink, a warning is
    /// logged here; transactions against it are refused at `begin`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::BackupDirNotWritable` if the backup directory
    /// cannot be created or written to.
    pub fn new(document_path: PathBuf) -> Result<Self, ConfigError> {
        if document_path.read_link().is_ok() {
            warn!(
                path = %document_path.display(),
                "Config document is a symlink; saves will be refused"
            );
        }

        let parent = match document_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        // Backups live next to the document
        // e.g. ~/.config/keyremapd/remaps.json -> ~/.config/keyremapd/backups/
        let backup_dir = parent.join("backups");

        if !backup_dir.exists() {
            fs::create_dir_all(&backup_dir)
                .map_err(|_| ConfigError::BackupDirNotWritable(backup_dir.clone()))?;
        }

        if backup_dir.metadata()?.permissions().readonly() {
            return Err(ConfigError::BackupDirNotWritable(backup_dir));
        }

        Ok(Self {
            document_path,
            backup_dir,
        })
    }

    /// Path of the managed document.
    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// Directory holding timestamped backups.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Loads the document, treating a missing file as the empty default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the file exists but is not a valid
    /// document, and `ConfigError::Io` for any other read failure.
    pub fn load(&self) -> Result<RemapDocument, ConfigError> {
        let text = match fs::read_to_string(&self.document_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(RemapDocument::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Ok(RemapDocument::from_json(&text)?)
    }

    /// Saves the document through a backup-then-atomic-write transaction.
    ///
    /// Returns the backup path when the previous document version was
    /// backed up (there is nothing to back up on first save).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::SymlinkedDocument` for symlinked documents and
    /// the underlying error when the backup or write fails. The previous
    /// document content survives any failure.
    pub fn save(&self, document: &RemapDocument) -> Result<Option<PathBuf>, ConfigError> {
        let tx = ConfigTransaction::begin(self)?;
        let backup = tx.backup_path().map(Path::to_path_buf);
        tx.commit(document)?;
        Ok(backup)
    }

    /// Copies the current document into the backup directory.
    ///
    /// Returns `None` when the document does not exist yet. Backup names
    /// follow `<stem>_YYYY-MM-DD_HHMMSS.<ext>`.
    pub(crate) fn create_timestamped_backup(&self) -> Result<Option<PathBuf>, ConfigError> {
        let content = match fs::read(&self.document_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::Io(e)),
        };

        // Timestamp in YYYY-MM-DD_HHMMSS format
        let timestamp = Local::now().format("%Y-%m-%d_%H%M%S");

        let stem = self
            .document_path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("remaps");
        let ext = self
            .document_path
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or("json");

        let backup_path = self
            .backup_dir
            .join(format!("{}_{}.{}", stem, timestamp, ext));

        fs::write(&backup_path, &content)
            .map_err(|e| ConfigError::BackupFailed(e.to_string()))?;

        Ok(Some(backup_path))
    }
}
