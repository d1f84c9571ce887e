use std::fs;

use tempfile::TempDir;

use crate::config::{ConfigError, ConfigManager, RemapDocument};
use crate::core::{Action, RemapEntry, Scope};

/// Helper: a manager rooted in a fresh temporary directory.
fn manager_in(dir: &TempDir) -> ConfigManager {
    ConfigManager::new(dir.path().join("remaps.json")).unwrap()
}

fn sample_document() -> RemapDocument {
    RemapDocument {
        chord_window_ms: 60,
        remaps: vec![
            RemapEntry {
                source: "CAPSLOCK".parse().unwrap(),
                action: Action::Key { to: "ESC".parse().unwrap() },
                scope: Scope::Global,
            },
            RemapEntry {
                source: "LEFTCTRL+T".parse().unwrap(),
                action: Action::Disabled,
                scope: Scope::app("kitty"),
            },
        ],
    }
}

#[test]
fn test_new_creates_directories() {
    let dir = TempDir::new().unwrap();
    let document_path = dir.path().join("nested").join("remaps.json");

    let manager = ConfigManager::new(document_path.clone()).unwrap();

    assert_eq!(manager.document_path(), document_path);
    assert!(
        document_path.parent().unwrap().is_dir(),
        "Document directory should be created"
    );
    assert!(manager.backup_dir().is_dir(), "Backup directory should be created");
}

#[test]
fn test_load_missing_document_gives_default() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    let document = manager.load().unwrap();
    assert_eq!(document, RemapDocument::default());
}

#[test]
fn test_save_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    let document = sample_document();

    let backup = manager.save(&document).unwrap();
    assert!(backup.is_none(), "First save has nothing to back up");

    let loaded = manager.load().unwrap();
    assert_eq!(loaded, document, "A saved document must load back identically");
}

#[test]
fn test_second_save_backs_up_previous_version() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    let first = sample_document();
    manager.save(&first).unwrap();

    let mut second = first.clone();
    second.chord_window_ms = 90;
    let backup = manager.save(&second).unwrap().expect("Second save should back up");

    let backed_up = RemapDocument::from_json(&fs::read_to_string(&backup).unwrap()).unwrap();
    assert_eq!(backed_up, first, "Backup must hold the pre-save version");

    let loaded = manager.load().unwrap();
    assert_eq!(loaded, second);
}

#[test]
fn test_backup_naming_format() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    manager.save(&sample_document()).unwrap();
    let backup = manager
        .save(&RemapDocument::default())
        .unwrap()
        .expect("Second save should back up");

    assert_eq!(backup.parent().unwrap(), manager.backup_dir());

    let filename = backup.file_name().unwrap().to_str().unwrap();
    let timestamp = filename
        .strip_prefix("remaps_")
        .and_then(|rest| rest.strip_suffix(".json"))
        .unwrap_or_else(|| panic!("Unexpected backup name: {filename}"));

    let parsed = chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d_%H%M%S");
    assert!(
        parsed.is_ok(),
        "Timestamp should be valid chrono format: {}",
        timestamp,
    );
}

#[test]
fn test_multiple_backups_dont_overwrite() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    let mut document = sample_document();
    manager.save(&document).unwrap();

    document.chord_window_ms = 70;
    let backup1 = manager.save(&document).unwrap().unwrap();

    // Backup names have one-second resolution
    std::thread::sleep(std::time::Duration::from_secs(1));

    document.chord_window_ms = 80;
    let backup2 = manager.save(&document).unwrap().unwrap();

    assert!(backup1.exists(), "First backup should exist");
    assert!(backup2.exists(), "Second backup should exist");
    assert_ne!(backup1, backup2, "Backups should not collide");

    let first = RemapDocument::from_json(&fs::read_to_string(&backup1).unwrap()).unwrap();
    let second = RemapDocument::from_json(&fs::read_to_string(&backup2).unwrap()).unwrap();
    assert_eq!(first.chord_window_ms, 60);
    assert_eq!(second.chord_window_ms, 70);
}

#[test]
fn test_load_rejects_invalid_document() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    fs::write(manager.document_path(), "{ not json").unwrap();

    match manager.load() {
        Err(ConfigError::Parse(_)) => {}
        other => panic!("Expected Parse error, got: {:?}", other),
    }
}
