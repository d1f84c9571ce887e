use crate::core::table::{RemapTable, TableDefect};
use crate::core::types::{Action, KeyChord, RemapEntry, Scope};
use crate::core::KeyId;

/// Helper to parse a key name
fn key(name: &str) -> KeyId {
    name.parse().unwrap()
}

/// Helper to parse a chord string
fn chord(s: &str) -> KeyChord {
    s.parse().unwrap()
}

/// Helper to create a key-to-key entry
fn entry(source: &str, to: &str, scope: Scope) -> RemapEntry {
    RemapEntry {
        source: chord(source),
        action: Action::Key { to: key(to) },
        scope,
    }
}

#[test]
fn test_empty_table_matches_nothing() {
    let table = RemapTable::empty();
    assert!(table.is_empty());
    assert!(table.lookup(&chord("A"), None).is_none());
    assert!(!table.is_chord_prefix(&chord("A"), None));
}

#[test]
fn test_single_key_lookup() {
    let (table, defects) = RemapTable::build(vec![entry("CAPSLOCK", "ESC", Scope::Global)]);
    assert!(defects.is_empty());
    assert_eq!(table.len(), 1);

    let action = table.lookup(&chord("CAPSLOCK"), None);
    assert_eq!(action, Some(&Action::Key { to: key("ESC") }));
}

#[test]
fn test_chord_lookup_is_order_insensitive() {
    let (table, _) = RemapTable::build(vec![entry("LEFTCTRL+C", "F5", Scope::Global)]);

    let pressed = KeyChord::new([key("C"), key("LEFTCTRL")]);
    assert!(table.lookup(&pressed, None).is_some());
}

#[test]
fn test_app_scope_wins_over_global() {
    let (table, _) = RemapTable::build(vec![
        entry("A", "X", Scope::Global),
        entry("A", "Z", Scope::app("Foo")),
    ]);

    // Focused on foo: the scoped entry wins
    let action = table.lookup(&chord("A"), Some("foo"));
    assert_eq!(action, Some(&Action::Key { to: key("Z") }));

    // Any other focus falls back to global
    let action = table.lookup(&chord("A"), Some("bar"));
    assert_eq!(action, Some(&Action::Key { to: key("X") }));

    let action = table.lookup(&chord("A"), None);
    assert_eq!(action, Some(&Action::Key { to: key("X") }));
}

#[test]
fn test_global_chord_visible_under_app_focus() {
    let (table, _) = RemapTable::build(vec![entry("LEFTCTRL+C", "F5", Scope::Global)]);

    assert!(table.lookup(&chord("LEFTCTRL+C"), Some("kitty")).is_some());
    assert!(table.is_chord_prefix(&chord("LEFTCTRL"), Some("kitty")));
}

#[test]
fn test_resolve_prefers_full_chord_over_single() {
    let (table, _) = RemapTable::build(vec![
        entry("A", "X", Scope::Global),
        entry("A+B", "Y", Scope::Global),
    ]);

    // A held, B pressed: chord wins
    let pressed = chord("A+B");
    let action = table.resolve(&pressed, key("B"), None);
    assert_eq!(action, Some(&Action::Key { to: key("Y") }));

    // A alone resolves to the single mapping
    let action = table.resolve(&chord("A"), key("A"), None);
    assert_eq!(action, Some(&Action::Key { to: key("X") }));
}

#[test]
fn test_resolve_falls_back_to_trigger_key() {
    let (table, _) = RemapTable::build(vec![entry("A", "X", Scope::Global)]);

    // Shift is held but no {LEFTSHIFT, A} chord exists: the single-key
    // mapping still applies to the newly pressed A
    let pressed = chord("LEFTSHIFT+A");
    let action = table.resolve(&pressed, key("A"), None);
    assert_eq!(action, Some(&Action::Key { to: key("X") }));

    // The held modifier itself resolves to nothing
    let action = table.resolve(&chord("LEFTSHIFT"), key("LEFTSHIFT"), None);
    assert!(action.is_none());
}

#[test]
fn test_lookup_is_deterministic() {
    let (table, _) = RemapTable::build(vec![
        entry("A", "X", Scope::Global),
        entry("A+B", "Y", Scope::Global),
        entry("A", "Z", Scope::app("foo")),
    ]);

    let pressed = chord("A+B");
    let first = table.resolve(&pressed, key("B"), Some("foo")).cloned();
    for _ in 0..100 {
        let again = table.resolve(&pressed, key("B"), Some("foo")).cloned();
        assert_eq!(first, again);
    }
}

#[test]
fn test_prefix_index_covers_all_proper_subsets() {
    let (table, _) = RemapTable::build(vec![entry("A+B+C", "X", Scope::Global)]);

    // Whatever order the user presses, every intermediate held set is a
    // recognised prefix
    for prefix in ["A", "B", "C", "A+B", "A+C", "B+C"] {
        assert!(
            table.is_chord_prefix(&chord(prefix), None),
            "{} should be a chord prefix",
            prefix
        );
    }

    // The full chord is a match, not a prefix
    assert!(!table.is_chord_prefix(&chord("A+B+C"), None));
    // Unrelated keys are not prefixes
    assert!(!table.is_chord_prefix(&chord("Q"), None));
}

#[test]
fn test_duplicate_source_keeps_first_entry() {
    let (table, defects) = RemapTable::build(vec![
        entry("A", "X", Scope::Global),
        entry("A", "Y", Scope::Global),
    ]);

    assert_eq!(table.len(), 1);
    assert_eq!(defects.len(), 1);
    assert!(matches!(defects[0], TableDefect::DuplicateSource { .. }));

    let action = table.lookup(&chord("A"), None);
    assert_eq!(action, Some(&Action::Key { to: key("X") }), "First entry wins");
}

#[test]
fn test_same_source_in_different_scopes_is_not_a_defect() {
    let (table, defects) = RemapTable::build(vec![
        entry("A", "X", Scope::Global),
        entry("A", "Y", Scope::app("foo")),
        entry("A", "Z", Scope::app("bar")),
    ]);

    assert!(defects.is_empty());
    assert_eq!(table.len(), 3);
}

#[test]
fn test_empty_source_is_dropped() {
    let entries = vec![RemapEntry {
        source: KeyChord::empty(),
        action: Action::Disabled,
        scope: Scope::Global,
    }];

    let (table, defects) = RemapTable::build(entries);
    assert!(table.is_empty());
    assert_eq!(defects, vec![TableDefect::EmptySource]);
}

#[test]
fn test_entries_roundtrip_in_stable_order() {
    let originals = vec![
        entry("CAPSLOCK", "ESC", Scope::Global),
        entry("LEFTCTRL+C", "F5", Scope::Global),
        entry("A", "B", Scope::app("kitty")),
        entry("Q", "W", Scope::app("firefox")),
    ];

    let (table, _) = RemapTable::build(originals.clone());
    let rebuilt = table.entries();

    assert_eq!(rebuilt.len(), originals.len());
    for original in &originals {
        assert!(
            rebuilt.contains(original),
            "{} should survive the round trip",
            original
        );
    }

    // Stable output: globals first, then apps alphabetically
    let (again, _) = RemapTable::build(rebuilt.clone());
    assert_eq!(again.entries(), rebuilt);
}
