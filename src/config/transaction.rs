// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration transaction management with automatic backups
//!
//! Provides atomic write operations with rollback support.

use atomic_write_file::AtomicWriteFile;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::config::{ConfigError, ConfigManager, RemapDocument};

/// Atomic configuration transaction with automatic backup.
///
/// # Lifecycle
///
/// 1. `begin()` - Refuses symlinked documents, creates timestamped backup
/// 2. Caller prepares the new document (in memory)
/// 3. `commit()` - Writes atomically, or `rollback()` - Restores begin state
///
/// The write is atomic at the filesystem level (temp file + rename), so the
/// document is never observable in a half-written state. The engine's file
/// watcher picks up the rename as a single change.
///
/// # Example
///
/// ```no_run
/// use keyremapd::config::{ConfigManager, ConfigTransaction, RemapDocument};
/// use std::path::PathBuf;
///
/// let manager = ConfigManager::new(PathBuf::from("remaps.json"))?;
/// let tx = ConfigTransaction::begin(&manager)?;
///
/// let document = RemapDocument::default();
///
/// match tx.commit(&document) {
///     Ok(()) => println!("Changes applied successfully"),
///     Err(e) => eprintln!("Commit failed: {}", e),
/// }
/// # Ok::<(), keyremapd::config::ConfigError>(())
/// ```
pub struct ConfigTransaction<'a> {
    manager: &'a ConfigManager,
    backup_path: Option<PathBuf>,
}

impl<'a> ConfigTransaction<'a> {
    /// Begins a new transaction by creating a timestamped backup.
    ///
    /// The backup is created immediately, ensuring a rollback point exists
    /// before any modification is attempted. A missing document is a valid
    /// starting state and produces no backup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::SymlinkedDocument` if the document path is a
    /// symlink: the atomic rename would replace the link with a regular
    /// file, silently detaching it from its target. Returns an error if the
    /// backup cannot be written.
    pub fn begin(manager: &'a ConfigManager) -> Result<Self, ConfigError> {
        if manager.document_path().read_link().is_ok() {
            return Err(ConfigError::SymlinkedDocument(
                manager.document_path().to_path_buf(),
            ));
        }

        // Create backup immediately - this is our rollback point
        let backup_path = manager.create_timestamped_backup()?;

        Ok(Self {
            manager,
            backup_path,
        })
    }

    /// The backup created at `begin()`, if the document existed then.
    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }

    /// Commits the transaction by atomically writing the new document.
    ///
    /// Consumes the transaction, preventing accidental double-commits. The
    /// backup created during `begin()` remains available in the backup
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::WriteFailed` if the temp file cannot be
    /// created, written, or renamed into place. The original document is
    /// untouched in that case.
    pub fn commit(self, document: &RemapDocument) -> Result<(), ConfigError> {
        let text = document.to_json()?;
        write_atomic(self.manager.document_path(), &text)
    }

    /// Rolls back to the state captured at `begin()`.
    ///
    /// Restores the backup if one was taken, or removes the document if it
    /// did not exist when the transaction began. Borrows `self` immutably,
    /// allowing repeated attempts.
    pub fn rollback(&self) -> Result<(), ConfigError> {
        match &self.backup_path {
            Some(backup) => {
                let backup_content = fs::read_to_string(backup)?;
                write_atomic(self.manager.document_path(), &backup_content)
            }
            None => match fs::remove_file(self.manager.document_path()) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ConfigError::Io(e)),
            },
        }
    }
}

/// Temp-file-then-rename write shared by commit and rollback.
fn write_atomic(path: &Path, content: &str) -> Result<(), ConfigError> {
    let mut file = AtomicWriteFile::options().open(path).map_err(|e| {
        ConfigError::WriteFailed(format!("Failed to open for atomic write: {}", e))
    })?;

    file.write_all(content.as_bytes())
        .map_err(|e| ConfigError::WriteFailed(format!("Failed to write content: {}", e)))?;

    file.commit().map_err(|e| {
        ConfigError::WriteFailed(format!("Failed to commit atomic write: {}", e))
    })?;

    Ok(())
}
