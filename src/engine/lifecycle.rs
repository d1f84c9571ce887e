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

//! Process lifecycle: single instancing, parent watching, signals
//!
//! A machine wants exactly one engine rewriting its keyboards. The
//! [`InstanceLock`] makes relaunches idempotent with an exclusive `flock`
//! under the runtime directory; the kernel releases it when the holder
//! dies, so a crash never wedges the next start. The watchers in this
//! module turn "my parent exited" and "I was told to terminate" into
//! ordinary messages on the engine loop.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;

use rustix::fs::{flock, FlockOperation};
use tracing::{info, warn};

use super::{EngineError, EngineEvent};
use crate::ipc::runtime_dir;

/// File name of the single-instance lock under the runtime directory.
const LOCK_FILE: &str = "engine.lock";

/// Outcome of trying to become the running engine instance.
#[derive(Debug)]
pub enum LockState {
    /// This process holds the lock for its lifetime.
    Acquired(InstanceLock),
    /// Another engine holds it. `pid` is whatever the holder wrote into
    /// the lock file, if readable.
    AlreadyRunning { pid: Option<u32> },
}

/// Held exclusive lock marking the one live engine process.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Tries to take the engine lock at its runtime-directory path.
    ///
    /// # Errors
    ///
    /// Fails when the lock file cannot be created or locked for reasons
    /// other than another holder.
    pub fn acquire() -> Result<LockState, EngineError> {
        Self::acquire_at(&runtime_dir().join(LOCK_FILE))
    }

    /// Tries to take the engine lock at `path`.
    pub fn acquire_at(path: &Path) -> Result<LockState, EngineError> {
        let lock_error = |source: std::io::Error| EngineError::Lock {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(lock_error)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(lock_error)?;

        match flock(&file, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => {}
            Err(rustix::io::Errno::WOULDBLOCK) => {
                return Ok(LockState::AlreadyRunning { pid: read_holder_pid(&mut file) });
            }
            Err(errno) => return Err(lock_error(errno.into())),
        }

        // Holder PID is advisory, for diagnostics only; the flock is the
        // actual exclusion.
        file.set_len(0).map_err(lock_error)?;
        file.write_all(std::process::id().to_string().as_bytes())
            .map_err(lock_error)?;

        Ok(LockState::Acquired(InstanceLock { file, path: path.to_path_buf() }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = flock(&self.file, FlockOperation::Unlock);
    }
}

fn read_holder_pid(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}

/// Watches the launcher process and posts a shutdown message when it
/// exits. A parent that is already gone posts immediately.
pub fn watch_parent(parent_pid: u32, events: Sender<EngineEvent>) {
    let spawn = thread::Builder::new().name("parent-watch".into()).spawn(move || {
        match waitpid_any::WaitHandle::open(parent_pid as i32) {
            Ok(mut handle) => {
                if let Err(e) = handle.wait() {
                    warn!(pid = parent_pid, error = %e, "Waiting on the parent failed");
                } else {
                    info!(pid = parent_pid, "Parent process exited");
                }
            }
            Err(e) => {
                info!(pid = parent_pid, error = %e, "Parent process not found, assuming it exited");
            }
        }
        let _ = events.send(EngineEvent::Shutdown("parent process exited"));
    });
    if let Err(e) = spawn {
        warn!(error = %e, "Could not start the parent watcher");
    }
}

/// Forwards SIGINT and SIGTERM into the loop as a shutdown message.
///
/// # Errors
///
/// Fails when the process-global handler cannot be installed.
pub fn install_signal_handler(events: Sender<EngineEvent>) -> Result<(), EngineError> {
    ctrlc::set_handler(move || {
        let _ = events.send(EngineEvent::Shutdown("termination signal"));
    })
    .map_err(EngineError::Signals)
}
