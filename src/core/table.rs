//! src/core/table.rs
//!
//! The published remap table
//!
//! A [`RemapTable`] is the immutable lookup structure the event path reads
//! on every keystroke. It is partitioned by scope: one global partition plus
//! one per application name, each a `HashMap` keyed on the normalized chord,
//! so a lookup costs two hash probes regardless of table size.
//!
//! Tables are built once (at load or commit) and never mutated afterwards;
//! the engine publishes replacements wholesale through an atomic pointer
//! swap. Alongside the action map, each partition carries a precomputed
//! chord-prefix set so the event path can answer "could this held set still
//! grow into a mapped chord?" with a single probe.

use crate::core::keys::KeyId;
use crate::core::types::{Action, KeyChord, RemapEntry, Scope};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Problems found while building a table from persisted entries
///
/// Defects are recoverable by construction: the builder drops the offending
/// entry and keeps going, so a hand-edited document still produces a working
/// engine. The editor-side validator refuses to commit documents that would
/// produce defects in the first place.
///
/// `Display` and `Error` are implemented by hand because the `source` field
/// names the offending chord, not an error cause, which rules out the
/// thiserror derive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDefect {
    DuplicateSource { source: KeyChord, scope: Scope },

    EmptySource,
}

impl fmt::Display for TableDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableDefect::DuplicateSource { source, scope } => {
                write!(f, "duplicate mapping for {source} in scope {scope}, keeping the first")
            }
            TableDefect::EmptySource => write!(f, "entry with an empty source dropped"),
        }
    }
}

impl std::error::Error for TableDefect {}

/// One scope's share of the table.
#[derive(Debug, Default, Clone)]
struct Partition {
    /// Chord → action, keyed on the sorted chord.
    actions: HashMap<KeyChord, Action>,
    /// Every proper subset of every multi-key source in this partition.
    prefixes: HashSet<KeyChord>,
}

impl Partition {
    fn insert(&mut self, source: KeyChord, action: Action) {
        for subset in source.proper_subsets() {
            self.prefixes.insert(subset);
        }
        self.actions.insert(source, action);
    }
}

/// Immutable-once-published remap lookup structure
///
/// # Lookup contract
/// - Application-scoped entries win over global entries for the same source.
/// - Chord matches are exact on the held set; [`RemapTable::resolve`] adds
///   the longest-match-first fallback from the full held set to the single
///   trigger key.
/// - Deterministic and side-effect free.
#[derive(Debug, Default, Clone)]
pub struct RemapTable {
    global: Partition,
    apps: HashMap<String, Partition>,
    len: usize,
}

impl RemapTable {
    /// An empty table: every event forwards unmodified.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from persisted entries, dropping defective ones.
    ///
    /// The first entry wins when two share a (source, scope) pair; each
    /// dropped entry is reported so the engine can log it.
    pub fn build(entries: Vec<RemapEntry>) -> (Self, Vec<TableDefect>) {
        let mut table = RemapTable::default();
        let mut defects = Vec::new();

        for entry in entries {
            if entry.source.is_empty() {
                defects.push(TableDefect::EmptySource);
                continue;
            }

            let partition = match &entry.scope {
                Scope::Global => &mut table.global,
                Scope::App(name) => table.apps.entry(name.clone()).or_default(),
            };

            if partition.actions.contains_key(&entry.source) {
                defects.push(TableDefect::DuplicateSource {
                    source: entry.source,
                    scope: entry.scope,
                });
                continue;
            }

            partition.insert(entry.source, entry.action);
            table.len += 1;
        }

        (table, defects)
    }

    /// Number of entries across all scopes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exact-match lookup of a held-key set.
    ///
    /// `app` is the focused application class, already lowercase (scope
    /// names normalize at construction, focus providers normalize at the
    /// source). Application partitions win over the global one.
    pub fn lookup(&self, pressed: &KeyChord, app: Option<&str>) -> Option<&Action> {
        if let Some(partition) = app.and_then(|name| self.apps.get(name)) {
            if let Some(action) = partition.actions.get(pressed) {
                return Some(action);
            }
        }
        self.global.actions.get(pressed)
    }

    /// Longest-match-first resolution for a newly pressed key.
    ///
    /// Tries the full held set (chord match), then the trigger key alone.
    /// A single-key mapping therefore still applies while unrelated keys or
    /// modifiers are held, but any exact chord on the full set wins.
    pub fn resolve(&self, pressed: &KeyChord, trigger: KeyId, app: Option<&str>) -> Option<&Action> {
        if let Some(action) = self.lookup(pressed, app) {
            return Some(action);
        }
        if pressed.is_single() {
            return None;
        }
        self.lookup(&KeyChord::single(trigger), app)
    }

    /// True when `pressed` is a proper subset of some longer mapped chord
    /// visible from `app` (its own partition or the global one).
    pub fn is_chord_prefix(&self, pressed: &KeyChord, app: Option<&str>) -> bool {
        if let Some(partition) = app.and_then(|name| self.apps.get(name)) {
            if partition.prefixes.contains(pressed) {
                return true;
            }
        }
        self.global.prefixes.contains(pressed)
    }

    /// Reconstructs the entry list, globals first, in a stable order.
    pub fn entries(&self) -> Vec<RemapEntry> {
        let mut entries = Vec::with_capacity(self.len);

        let mut globals: Vec<RemapEntry> = self
            .global
            .actions
            .iter()
            .map(|(source, action)| RemapEntry {
                source: source.clone(),
                action: action.clone(),
                scope: Scope::Global,
            })
            .collect();
        globals.sort_by(|a, b| a.source.cmp(&b.source));
        entries.extend(globals);

        let mut app_names: Vec<&String> = self.apps.keys().collect();
        app_names.sort();
        for name in app_names {
            let mut scoped: Vec<RemapEntry> = self.apps[name]
                .actions
                .iter()
                .map(|(source, action)| RemapEntry {
                    source: source.clone(),
                    action: action.clone(),
                    scope: Scope::App(name.clone()),
                })
                .collect();
            scoped.sort_by(|a, b| a.source.cmp(&b.source));
            entries.extend(scoped);
        }

        entries
    }
}
