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

//! IPC module tests
//!
//! Suspension flag semantics and the edit session protocol. Every test
//! uses its own lock file under a temp directory, so suites can run in
//! parallel without contending on the real runtime directory.

use tempfile::TempDir;

use crate::{
    config::ConfigManager,
    core::{Action, RemapEntry, Scope, ValidationOutcome},
    ipc::{EditSession, SessionError, SignalError, SuspensionFlag, SuspensionState},
};

/// Helper: a flag over a private lock file.
fn flag_in(dir: &TempDir) -> SuspensionFlag {
    SuspensionFlag::new(dir.path().join("editor.lock"))
}

fn manager_in(dir: &TempDir) -> ConfigManager {
    ConfigManager::new(dir.path().join("remaps.json")).unwrap()
}

fn entry(source: &str, target: &str) -> RemapEntry {
    RemapEntry {
        source: source.parse().unwrap(),
        action: Action::Key { to: target.parse().unwrap() },
        scope: Scope::Global,
    }
}

#[test]
fn test_poll_without_editor_reads_active() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);

    assert_eq!(flag.poll(), SuspensionState::Active, "Missing file means no editor");
}

#[test]
fn test_acquire_raises_and_drop_lowers() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);

    let guard = flag.acquire().unwrap();
    assert_eq!(flag.poll(), SuspensionState::Suspended);

    drop(guard);
    assert_eq!(flag.poll(), SuspensionState::Active);
}

#[test]
fn test_second_acquire_fails_bounded() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);

    let _held = flag.acquire().unwrap();

    match flag.acquire() {
        Err(SignalError::AlreadyHeld) => {}
        Ok(_) => panic!("Two editors must not both hold the suspension"),
        Err(other) => panic!("Expected AlreadyHeld, got: {:?}", other),
    }
}

#[test]
fn test_holder_pid_written_to_lock_file() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);

    let _guard = flag.acquire().unwrap();

    let content = std::fs::read_to_string(flag.path()).unwrap();
    assert_eq!(
        content.trim().parse::<u32>().unwrap(),
        std::process::id(),
        "Lock file should carry the holder's PID"
    );
}

#[test]
fn test_session_suspends_while_open() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);

    let session = EditSession::open(manager_in(&dir), &flag).unwrap();
    assert!(!session.is_degraded());
    assert_eq!(flag.poll(), SuspensionState::Suspended);

    drop(session);
    assert_eq!(flag.poll(), SuspensionState::Active);
}

#[test]
fn test_session_commit_round_trips_entries() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);
    let mut session = EditSession::open(manager_in(&dir), &flag).unwrap();

    session.document_mut().remaps.push(entry("CAPSLOCK", "ESC"));
    assert!(session.validate().is_clean());

    let backup = session.commit(false).unwrap();
    assert!(backup.is_none(), "First commit has nothing to back up");
    drop(session);

    let loaded = manager_in(&dir).load().unwrap();
    assert_eq!(loaded.remaps, vec![entry("CAPSLOCK", "ESC")]);
}

#[test]
fn test_session_blocks_conflicting_commit() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);

    let mut session = EditSession::open(manager_in(&dir), &flag).unwrap();
    session.document_mut().remaps.push(entry("CAPSLOCK", "ESC"));
    session.commit(false).unwrap();

    // Same source twice: a hard conflict
    session.document_mut().remaps.push(entry("CAPSLOCK", "TAB"));

    match session.commit(false) {
        Err(SessionError::Blocked(issues)) => {
            assert_eq!(issues.len(), 1, "The duplicate source should be reported once");
        }
        other => panic!("Expected Blocked, got: {:?}", other.map(|_| ())),
    }
    drop(session);

    let loaded = manager_in(&dir).load().unwrap();
    assert_eq!(loaded.remaps.len(), 1, "A blocked commit must not touch the document");
}

#[test]
fn test_session_requires_confirmation_for_chord_prefix() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);
    let mut session = EditSession::open(manager_in(&dir), &flag).unwrap();

    // {A} and {A,B}: ambiguous but not conflicting
    session.document_mut().remaps.push(entry("A", "F1"));
    session.document_mut().remaps.push(entry("A+B", "F2"));

    match session.validate() {
        ValidationOutcome::NeedsConfirmation(warnings) => {
            assert!(!warnings.is_empty());
        }
        other => panic!("Expected NeedsConfirmation, got: {:?}", other),
    }

    match session.commit(false) {
        Err(SessionError::NeedsConfirmation(_)) => {}
        other => panic!("Unconfirmed commit should be refused, got: {:?}", other.map(|_| ())),
    }

    session.commit(true).unwrap();
    drop(session);

    let loaded = manager_in(&dir).load().unwrap();
    assert_eq!(loaded.remaps.len(), 2, "A confirmed commit should save");
}

#[test]
fn test_session_degrades_when_flag_is_held() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);

    let _other_editor = flag.acquire().unwrap();

    let mut session = EditSession::open(manager_in(&dir), &flag).unwrap();
    assert!(session.is_degraded(), "Held flag should degrade, not fail");

    // Editing still works in degraded mode
    session.document_mut().remaps.push(entry("CAPSLOCK", "ESC"));
    session.commit(false).unwrap();

    let loaded = manager_in(&dir).load().unwrap();
    assert_eq!(loaded.remaps.len(), 1);
}

#[test]
fn test_suspension_outlives_commit() {
    let dir = TempDir::new().unwrap();
    let flag = flag_in(&dir);

    let mut session = EditSession::open(manager_in(&dir), &flag).unwrap();
    session.document_mut().remaps.push(entry("CAPSLOCK", "ESC"));
    session.commit(false).unwrap();

    // The signal tracks the session lifetime, not the save
    assert_eq!(flag.poll(), SuspensionState::Suspended);

    drop(session);
    assert_eq!(flag.poll(), SuspensionState::Active);
}
