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

//! Candidate-table validation
//!
//! Pure checks that run on the editor's working copy before a commit is
//! allowed, never on the live table and never from the event path. Three
//! severities exist:
//! - hard conflicts ([`ValidationIssue`]) block saving outright
//! - ambiguities and orphans ([`ValidationWarning`]) need user confirmation
//! - everything else is clean
//!
//! The [`validate`] entry point folds both checks into a single
//! [`ValidationOutcome`], the first half of the two-step commit protocol
//! (validate, confirm if asked, then commit).

use crate::core::keys::KeyId;
use crate::core::types::{Action, KeyChord, RemapEntry, Scope, MAX_CHORD_KEYS};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Hard problems that block saving
///
/// `Display` and `Error` are implemented by hand because the `source` field
/// names the offending chord, not an error cause, which rules out the
/// thiserror derive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Two entries share an identical (source, scope) pair.
    Conflict { source: KeyChord, scope: Scope },

    /// An entry has no source keys at all.
    EmptySource,

    /// A source chord exceeds the supported key count.
    ChordTooLong { source: KeyChord },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Conflict { source, scope } => {
                write!(f, "conflicting mappings for {source} in scope {scope}")
            }
            ValidationIssue::EmptySource => write!(f, "entry has an empty source"),
            ValidationIssue::ChordTooLong { source } => {
                write!(f, "chord {source} has more than {MAX_CHORD_KEYS} keys")
            }
        }
    }
}

impl std::error::Error for ValidationIssue {}

/// Confirmable conditions that do not block saving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// One source is a proper subset of another in the same scope: the
    /// shorter mapping only fires after the chord window closes.
    PartialMapping {
        shorter: KeyChord,
        longer: KeyChord,
        scope: Scope,
    },

    /// Keys remapped away with nothing left producing them.
    OrphanedKeys { keys: Vec<KeyId> },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::PartialMapping {
                shorter,
                longer,
                scope,
            } => write!(
                f,
                "{} is a prefix of chord {} in scope {}: it will only fire after the chord window",
                shorter, longer, scope
            ),
            ValidationWarning::OrphanedKeys { keys } => {
                write!(f, "keys left unreachable: {}", join_keys(keys.iter().copied()))
            }
        }
    }
}

/// Result of validating a candidate entry set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Safe to commit as-is.
    Clean,
    /// Commit is allowed once the user confirms the listed warnings.
    NeedsConfirmation(Vec<ValidationWarning>),
    /// Commit must be refused until the listed issues are fixed.
    Blocked(Vec<ValidationIssue>),
}

impl ValidationOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, ValidationOutcome::Clean)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, ValidationOutcome::Blocked(_))
    }
}

/// Formats keys the way confirmation prompts show them: `"A, B, C"`.
pub fn join_keys(keys: impl IntoIterator<Item = KeyId>) -> String {
    keys.into_iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finds hard conflicts: duplicate (source, scope) pairs and structurally
/// invalid sources.
///
/// Buckets entries by their normalized (source, scope) key, then reports
/// each bucket that collected more than one entry exactly once. Hash
/// bucketing keeps this O(n) over the entry count.
pub fn check_conflicts(entries: &[RemapEntry]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen: HashMap<(&KeyChord, &Scope), usize> = HashMap::new();

    for entry in entries {
        if entry.source.is_empty() {
            issues.push(ValidationIssue::EmptySource);
            continue;
        }
        if entry.source.len() > MAX_CHORD_KEYS {
            issues.push(ValidationIssue::ChordTooLong {
                source: entry.source.clone(),
            });
            continue;
        }

        let count = seen.entry((&entry.source, &entry.scope)).or_insert(0);
        *count += 1;
        if *count == 2 {
            // Report once per clashing pair, however many copies exist
            issues.push(ValidationIssue::Conflict {
                source: entry.source.clone(),
                scope: entry.scope.clone(),
            });
        }
    }

    issues
}

/// Finds ambiguous chord prefixes: a source that is a proper subset of
/// another source in the same scope.
///
/// These are legal (the chord window disambiguates at runtime) but worth a
/// confirmation, because the shorter mapping picks up latency.
pub fn check_partial_mappings(entries: &[RemapEntry]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut by_scope: HashMap<&Scope, Vec<&RemapEntry>> = HashMap::new();

    for entry in entries {
        by_scope.entry(&entry.scope).or_default().push(entry);
    }

    for (scope, bucket) in by_scope {
        for a in &bucket {
            for b in &bucket {
                if a.source.is_proper_subset_of(&b.source) {
                    warnings.push(ValidationWarning::PartialMapping {
                        shorter: a.source.clone(),
                        longer: b.source.clone(),
                        scope: scope.clone(),
                    });
                }
            }
        }
    }

    // Deterministic order for prompts and tests
    warnings.sort_by(|a, b| format!("{}", a).cmp(&format!("{}", b)));
    warnings
}

/// Computes the orphan set: keys a user can no longer type at all.
///
/// A key K is orphaned when some entry remaps the plain press of K away
/// (single-key source, action other than `Disabled`) and no entry's action
/// produces K. Chord sources do not orphan their keys (the plain press
/// still works), and `Disabled` sources are unmapped by design.
pub fn find_orphans(entries: &[RemapEntry]) -> BTreeSet<KeyId> {
    let mut produced: BTreeSet<KeyId> = BTreeSet::new();
    for entry in entries {
        produced.extend(entry.action.produced_keys().iter().copied());
    }

    let mut orphans = BTreeSet::new();
    for entry in entries {
        if !entry.source.is_single() {
            continue;
        }
        if matches!(entry.action, Action::Disabled) {
            continue;
        }
        let key = entry.source.keys()[0];
        if !produced.contains(&key) {
            orphans.insert(key);
        }
    }

    orphans
}

/// Validates a candidate entry set: step one of the commit protocol.
///
/// # Returns
/// - [`ValidationOutcome::Blocked`] when any hard conflict exists
/// - [`ValidationOutcome::NeedsConfirmation`] when only partial mappings
///   and/or orphaned keys were found
/// - [`ValidationOutcome::Clean`] otherwise
///
/// # Example
/// ```
/// use keyremapd::core::validator::{validate, ValidationOutcome};
/// use keyremapd::core::{Action, KeyChord, RemapEntry, Scope};
///
/// let entries = vec![RemapEntry {
///     source: "CAPSLOCK".parse::<KeyChord>().unwrap(),
///     action: Action::Key { to: "ESC".parse().unwrap() },
///     scope: Scope::Global,
/// }];
/// assert!(matches!(validate(&entries), ValidationOutcome::NeedsConfirmation(_)));
/// ```
/// (CAPSLOCK is orphaned there: nothing maps back to it.)
pub fn validate(entries: &[RemapEntry]) -> ValidationOutcome {
    let issues = check_conflicts(entries);
    if !issues.is_empty() {
        return ValidationOutcome::Blocked(issues);
    }

    let mut warnings = check_partial_mappings(entries);
    let orphans = find_orphans(entries);
    if !orphans.is_empty() {
        warnings.push(ValidationWarning::OrphanedKeys {
            keys: orphans.into_iter().collect(),
        });
    }

    if warnings.is_empty() {
        ValidationOutcome::Clean
    } else {
        ValidationOutcome::NeedsConfirmation(warnings)
    }
}
