// Copyright 2025 bakri (tidynest@proton.me)
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

//! Cross-process coordination between the engine and the editor
//!
//! Two processes cooperate over the filesystem, with no sockets and no
//! message protocol:
//!
//! - **Suspension signal** ([`suspension`]): an advisory lock the editor
//!   holds while its window is open, telling the engine to pass events
//!   through unmodified.
//! - **Edit session** ([`session`]): the editor's suspend → mutate →
//!   validate → commit protocol over the shared remap document.
//!
//! Both primitives live under a per-user runtime directory so that locks
//! never collide across users and disappear with the session.

use std::env;
use std::path::PathBuf;

pub mod session;
pub mod suspension;

pub use session::{EditSession, SessionError};
pub use suspension::{SignalError, SuspensionFlag, SuspensionGuard, SuspensionState};

/// Per-user directory holding the lock files.
///
/// `$XDG_RUNTIME_DIR/keyremapd` when the session provides a runtime
/// directory, `/tmp/keyremapd-<uid>` otherwise.
pub fn runtime_dir() -> PathBuf {
    match env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join("keyremapd"),
        _ => {
            let uid = rustix::process::getuid().as_raw();
            PathBuf::from(format!("/tmp/keyremapd-{}", uid))
        }
    }
}

#[cfg(test)]
mod tests;
