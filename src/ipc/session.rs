//! src/ipc/session.rs
//!
//! Editor-side editing protocol: raise the suspension signal, mutate a
//! scratch copy of the document, validate, then commit through the
//! transactional config layer. The engine notices the committed file via
//! its watcher and reloads.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, ConfigManager, RemapDocument};
use crate::core::{validate, ValidationIssue, ValidationOutcome, ValidationWarning};
use crate::ipc::suspension::{SuspensionFlag, SuspensionGuard};

/// Errors raised when committing an edit session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Hard conflicts; the document was not saved.
    #[error("Cannot commit: {} blocking conflict(s)", .0.len())]
    Blocked(Vec<ValidationIssue>),

    /// Ambiguities that need explicit confirmation; not saved.
    #[error("Commit requires confirmation: {} warning(s)", .0.len())]
    NeedsConfirmation(Vec<ValidationWarning>),

    /// The save itself failed; the previous document version is intact.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One editing pass over the remap document.
///
/// Opening a session raises the suspension signal so the engine pauses live
/// remapping while configuration is in flux. If the signal cannot be
/// acquired the session still opens in a degraded mode: editing works, but
/// remapping stays live. The signal is released when the session is
/// dropped, on every exit path.
///
/// Commits are gated on validation: hard conflicts block outright, and
/// ambiguous tables (chord prefixes, orphaned keys) must be explicitly
/// confirmed by the caller.
///
/// # Example
///
/// ```no_run
/// use keyremapd::config::ConfigManager;
/// use keyremapd::ipc::{EditSession, SuspensionFlag};
///
/// let manager = ConfigManager::new("remaps.json".into())?;
/// let flag = SuspensionFlag::at_runtime_dir();
///
/// let mut session = EditSession::open(manager, &flag)?;
/// session.document_mut().chord_window_ms = 75;
/// session.commit(false)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct EditSession {
    manager: ConfigManager,
    document: RemapDocument,
    suspension: Option<SuspensionGuard>,
}

impl EditSession {
    /// Opens a session: acquires the suspension signal and loads the
    /// current document as the scratch copy.
    ///
    /// A failed signal acquisition degrades rather than fails: the session
    /// opens, a warning is logged, and [`is_degraded`](Self::is_degraded)
    /// reports it.
    ///
    /// # Errors
    ///
    /// Returns an error only when the document exists but cannot be read
    /// or parsed.
    pub fn open(manager: ConfigManager, flag: &SuspensionFlag) -> Result<Self, ConfigError> {
        let suspension = match flag.acquire() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("Editing without suspension, remapping stays live: {}", e);
                None
            }
        };

        let document = manager.load()?;

        Ok(Self {
            manager,
            document,
            suspension,
        })
    }

    /// True when the suspension signal could not be acquired.
    pub fn is_degraded(&self) -> bool {
        self.suspension.is_none()
    }

    /// The scratch copy under edit.
    pub fn document(&self) -> &RemapDocument {
        &self.document
    }

    /// Mutable access to the scratch copy. Changes are invisible to the
    /// engine until [`commit`](Self::commit).
    pub fn document_mut(&mut self) -> &mut RemapDocument {
        &mut self.document
    }

    /// Runs validation on the scratch copy.
    pub fn validate(&self) -> ValidationOutcome {
        validate(&self.document.remaps)
    }

    /// Validates and saves the scratch copy.
    ///
    /// `confirmed` is the caller's answer to a prior
    /// [`NeedsConfirmation`](ValidationOutcome::NeedsConfirmation) outcome;
    /// pass `false` on the first attempt. Returns the backup path when a
    /// previous document version was backed up.
    ///
    /// The session stays open after a successful commit: the suspension
    /// signal is released when the session is dropped, mirroring the
    /// editor's window lifetime rather than its save button.
    ///
    /// # Errors
    ///
    /// [`SessionError::Blocked`] for hard conflicts,
    /// [`SessionError::NeedsConfirmation`] for unconfirmed warnings, and
    /// [`SessionError::Config`] when the save itself fails (the previous
    /// document version survives).
    pub fn commit(&mut self, confirmed: bool) -> Result<Option<PathBuf>, SessionError> {
        match self.validate() {
            ValidationOutcome::Blocked(issues) => {
                return Err(SessionError::Blocked(issues));
            }
            ValidationOutcome::NeedsConfirmation(warnings) if !confirmed => {
                return Err(SessionError::NeedsConfirmation(warnings));
            }
            _ => {}
        }

        let backup = self.manager.save(&self.document)?;

        match &backup {
            Some(path) => info!(
                entries = self.document.remaps.len(),
                backup = %path.display(),
                "Committed remap document"
            ),
            None => info!(
                entries = self.document.remaps.len(),
                "Committed remap document"
            ),
        }

        Ok(backup)
    }
}
