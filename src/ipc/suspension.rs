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

//! Edit suspension signal
//!
//! A cross-process boolean flag backed by an advisory file lock. The editor
//! holds the lock exclusively while its window is open; the engine probes it
//! with a non-blocking shared lock to learn whether live remapping should
//! pause. Because the kernel releases `flock` locks when the holder dies,
//! a crashed editor can never leave the engine suspended.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use rustix::fs::{flock, FlockOperation};
use thiserror::Error;

/// Bounded acquisition: a handful of short retries, never an open wait.
const ACQUIRE_ATTEMPTS: u32 = 5;
const ACQUIRE_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Errors raised while acquiring or probing the suspension signal.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Another editor already holds the suspension.
    #[error("Edit suspension is already held by another editor")]
    AlreadyHeld,

    /// The signal file or its directory could not be set up.
    #[error("Failed to set up signal file {path}: {source}")]
    Setup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the engine observes when it probes the signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuspensionState {
    /// No editor holds the flag; remapping runs live.
    Active,
    /// An editor holds the flag; events must pass through unmodified.
    Suspended,
}

/// The suspension signal at a known filesystem location.
///
/// Both sides construct this over the same path (`editor.lock` under the
/// runtime directory): the editor calls [`acquire`](Self::acquire), the
/// engine calls [`poll`](Self::poll).
#[derive(Clone, Debug)]
pub struct SuspensionFlag {
    path: PathBuf,
}

impl SuspensionFlag {
    /// A flag over an explicit lock file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The flag at its conventional location under the runtime directory.
    pub fn at_runtime_dir() -> Self {
        Self::new(crate::ipc::runtime_dir().join("editor.lock"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raises the suspension signal for the lifetime of the returned guard.
    ///
    /// Attempts are bounded: a busy flag fails with
    /// [`SignalError::AlreadyHeld`] after a few short retries rather than
    /// waiting for the other editor to finish. The holder's PID is written
    /// into the file for diagnostics.
    pub fn acquire(&self) -> Result<SuspensionGuard, SignalError> {
        let mut file = open_lock_file(&self.path)?;

        let mut attempt = 0;
        loop {
            match flock(&file, FlockOperation::NonBlockingLockExclusive) {
                Ok(()) => break,
                Err(rustix::io::Errno::WOULDBLOCK) => {
                    attempt += 1;
                    if attempt >= ACQUIRE_ATTEMPTS {
                        return Err(SignalError::AlreadyHeld);
                    }
                    thread::sleep(ACQUIRE_RETRY_DELAY);
                }
                Err(errno) => return Err(SignalError::Io(errno.into())),
            }
        }

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;

        Ok(SuspensionGuard { file })
    }

    /// Probes the flag without blocking.
    ///
    /// A missing file means no editor has ever raised the signal. Probe
    /// errors read as `Active`: a broken signal must not freeze remapping.
    pub fn poll(&self) -> SuspensionState {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return SuspensionState::Active,
        };

        match flock(&file, FlockOperation::NonBlockingLockShared) {
            Ok(()) => {
                let _ = flock(&file, FlockOperation::Unlock);
                SuspensionState::Active
            }
            Err(rustix::io::Errno::WOULDBLOCK) => SuspensionState::Suspended,
            Err(_) => SuspensionState::Active,
        }
    }
}

/// Holds the suspension until dropped.
///
/// The lock rides on the open file descriptor, so every exit path of the
/// holder (including a crash) releases it.
#[derive(Debug)]
pub struct SuspensionGuard {
    file: File,
}

impl Drop for SuspensionGuard {
    fn drop(&mut self) {
        let _ = flock(&self.file, FlockOperation::Unlock);
    }
}

fn open_lock_file(path: &Path) -> Result<File, SignalError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| SignalError::Setup {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| SignalError::Setup {
            path: path.to_path_buf(),
            source,
        })
}
