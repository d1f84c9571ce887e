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

use std::fs;

use tempfile::TempDir;

use crate::config::{ConfigError, ConfigManager, ConfigTransaction, RemapDocument};

fn manager_in(dir: &TempDir) -> ConfigManager {
    ConfigManager::new(dir.path().join("remaps.json")).unwrap()
}

fn document_with_window(ms: u64) -> RemapDocument {
    RemapDocument { chord_window_ms: ms, remaps: Vec::new() }
}

#[test]
fn test_begin_without_document_takes_no_backup() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    let tx = ConfigTransaction::begin(&manager).unwrap();
    assert!(tx.backup_path().is_none());

    tx.commit(&document_with_window(55)).unwrap();
    assert_eq!(manager.load().unwrap().chord_window_ms, 55);
}

#[test]
fn test_commit_writes_parseable_pretty_json() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    let tx = ConfigTransaction::begin(&manager).unwrap();
    tx.commit(&document_with_window(50)).unwrap();

    let text = fs::read_to_string(manager.document_path()).unwrap();
    assert!(text.contains("\"chord_window_ms\""), "Field names should appear in output");
    assert!(text.contains('\n'), "Output should be pretty-printed");
    assert!(text.ends_with('\n'), "Output should end with a newline");

    RemapDocument::from_json(&text).unwrap();
}

#[test]
fn test_backup_survives_commit() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    manager.save(&document_with_window(40)).unwrap();

    let tx = ConfigTransaction::begin(&manager).unwrap();
    let backup = tx.backup_path().expect("Existing document should be backed up").to_path_buf();
    tx.commit(&document_with_window(90)).unwrap();

    assert!(backup.exists(), "Backup should remain after commit");
    let backed_up = RemapDocument::from_json(&fs::read_to_string(&backup).unwrap()).unwrap();
    assert_eq!(backed_up.chord_window_ms, 40);
}

#[test]
fn test_rollback_restores_begin_state() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    manager.save(&document_with_window(40)).unwrap();

    let tx = ConfigTransaction::begin(&manager).unwrap();

    // Clobber the document mid-transaction, then undo
    fs::write(manager.document_path(), "scribbles").unwrap();
    tx.rollback().unwrap();

    assert_eq!(manager.load().unwrap().chord_window_ms, 40);
}

#[test]
fn test_rollback_removes_document_that_did_not_exist() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    let tx = ConfigTransaction::begin(&manager).unwrap();
    fs::write(manager.document_path(), "{}").unwrap();

    tx.rollback().unwrap();
    assert!(
        !manager.document_path().exists(),
        "Rollback should remove a document created after begin"
    );

    // Rollback is repeatable
    tx.rollback().unwrap();
}

#[cfg(unix)]
#[test]
fn test_begin_refuses_symlinked_document() {
    use std::os::unix::fs::symlink;

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("real.json");
    fs::write(&target, "{}").unwrap();

    let link = dir.path().join("remaps.json");
    symlink(&target, &link).unwrap();

    let manager = ConfigManager::new(link).unwrap();
    match ConfigTransaction::begin(&manager) {
        Err(ConfigError::SymlinkedDocument(path)) => {
            assert_eq!(path, manager.document_path());
        }
        Ok(_) => panic!("Symlinked document must refuse transactions"),
        Err(other) => panic!("Expected SymlinkedDocument error, got: {:?}", other),
    }

    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "{}",
        "Link target must be untouched"
    );
}
