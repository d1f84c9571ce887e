//! src/core/types.rs
//!
//! Core type definitions for keyboard remapping
//!
//! This module defines the fundamental types used throughout the engine:
//! - `KeyChord`: an ordered set of one or more simultaneously-held keys
//! - `Action`: what a matched source is rewritten into
//! - `Scope`: whether an entry applies globally or per-application
//! - `RemapEntry`: one complete source → action mapping
//!
//! All types serialize for config persistence. Chords and scopes normalize
//! at construction (sorted keys, lowercase application names) so equality
//! and hashing never depend on input order or spelling.

use crate::core::keys::KeyId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Upper bound on keys in a single chord source or shortcut target.
///
/// Keeps the precomputed chord-prefix index bounded and matches what a human
/// can physically hold with intent.
pub const MAX_CHORD_KEYS: usize = 4;

/// An ordered set of simultaneously-held keys
///
/// One key is a plain remap source; two or more form a chord. Keys are
/// sorted and deduplicated at construction, so two chords built from the
/// same keys in any order are equal and hash identically (required for use
/// as a `HashMap` key in the lookup partitions).
///
/// Storage is inline up to [`MAX_CHORD_KEYS`], so the event path can build
/// and probe chords without heap allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyChord {
    keys: SmallVec<[KeyId; MAX_CHORD_KEYS]>,
}

/// Canonical position of a key inside a chord: modifiers first, then by
/// code. A pure function of the key, so equal key sets always normalize to
/// the same sequence.
fn chord_order(key: &KeyId) -> (bool, u16) {
    (!key.is_modifier(), key.code())
}

impl KeyChord {
    /// Creates a chord from any key collection, sorting and deduplicating.
    pub fn new(keys: impl IntoIterator<Item = KeyId>) -> Self {
        let mut keys: SmallVec<[KeyId; MAX_CHORD_KEYS]> = keys.into_iter().collect();
        keys.sort_unstable_by_key(chord_order);
        keys.dedup();
        Self { keys }
    }

    /// Creates a single-key chord.
    pub fn single(key: KeyId) -> Self {
        Self {
            keys: SmallVec::from_elem(key, 1),
        }
    }

    /// Creates an empty chord (useful as a reusable scratch buffer).
    pub fn empty() -> Self {
        Self {
            keys: SmallVec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True when the chord is exactly one key.
    pub fn is_single(&self) -> bool {
        self.keys.len() == 1
    }

    pub fn keys(&self) -> &[KeyId] {
        &self.keys
    }

    pub fn contains(&self, key: KeyId) -> bool {
        self.keys
            .binary_search_by_key(&chord_order(&key), chord_order)
            .is_ok()
    }

    /// Inserts a key, keeping canonical order. No-op if already present.
    pub fn insert(&mut self, key: KeyId) {
        if let Err(pos) = self
            .keys
            .binary_search_by_key(&chord_order(&key), chord_order)
        {
            self.keys.insert(pos, key);
        }
    }

    /// Removes a key if present.
    pub fn remove(&mut self, key: KeyId) {
        if let Ok(pos) = self
            .keys
            .binary_search_by_key(&chord_order(&key), chord_order)
        {
            self.keys.remove(pos);
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Replaces the contents with `other` plus `extra`, without allocating
    /// for chords within [`MAX_CHORD_KEYS`].
    pub fn clone_from_with(&mut self, other: &KeyChord, extra: KeyId) {
        self.keys.clear();
        self.keys.extend_from_slice(&other.keys);
        self.insert(extra);
    }

    /// True when every key of `self` is in `other` and `other` is larger.
    ///
    /// Chords match on held sets, so "prefix of a longer chord" means any
    /// proper subset: whichever order the user presses the keys, the held
    /// set passes through a subset on its way to the full chord.
    pub fn is_proper_subset_of(&self, other: &KeyChord) -> bool {
        self.keys.len() < other.keys.len() && self.keys.iter().all(|k| other.contains(*k))
    }

    /// All proper non-empty subsets of this chord, smallest last.
    ///
    /// Bounded by [`MAX_CHORD_KEYS`], so at most 14 subsets. Used once per
    /// table build to precompute the prefix index, never per event.
    pub fn proper_subsets(&self) -> Vec<KeyChord> {
        let n = self.keys.len();
        let mut subsets = Vec::new();
        if n < 2 {
            return subsets;
        }
        // Enumerate bitmasks, skipping empty and full sets
        for mask in 1..((1u32 << n) - 1) {
            let keys = self
                .keys
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, k)| *k);
            subsets.push(KeyChord::new(keys));
        }
        subsets.sort_unstable_by(|a, b| b.len().cmp(&a.len()));
        subsets.dedup();
        subsets
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for key in &self.keys {
            if !first {
                write!(f, "+")?;
            }
            write!(f, "{}", key)?;
            first = false;
        }
        Ok(())
    }
}

impl TryFrom<String> for KeyChord {
    type Error = crate::core::parser::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        crate::core::parser::parse_chord(&value)
    }
}

impl std::str::FromStr for KeyChord {
    type Err = crate::core::parser::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::core::parser::parse_chord(s)
    }
}

impl From<KeyChord> for String {
    fn from(chord: KeyChord) -> String {
        chord.to_string()
    }
}

/// Where a remap entry applies
///
/// Application names match the focused window's application class,
/// case-insensitively; they are stored lowercase. The name `global` is
/// reserved for the global scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    /// Applies regardless of the focused application.
    Global,
    /// Applies only while the named application is focused.
    App(String),
}

impl Scope {
    /// Builds an application scope, normalizing the name to lowercase.
    pub fn app(name: &str) -> Self {
        Scope::App(name.trim().to_lowercase())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    fn global_default() -> Scope {
        Scope::Global
    }

    /// The application name, if scoped.
    pub fn app_name(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::App(name) => Some(name),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::App(name) => write!(f, "{}", name),
        }
    }
}

/// Scope string was empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scope must be 'global' or an application name")]
pub struct InvalidScope;

impl TryFrom<String> for Scope {
    type Error = InvalidScope;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(InvalidScope);
        }
        if trimmed.eq_ignore_ascii_case("global") {
            Ok(Scope::Global)
        } else {
            Ok(Scope::app(trimmed))
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> String {
        scope.to_string()
    }
}

/// What a matched source is rewritten into
///
/// `Disabled` is an explicit "swallow this key" marker, distinct from having
/// no entry at all: a disabled source suppresses its events, an absent one
/// forwards them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Replace the source with a single key.
    Key { to: KeyId },
    /// Replace the source with a full shortcut.
    Shortcut { to: KeyChord },
    /// Run a program (spawned off the event path, argv split on whitespace).
    Launch {
        program: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<String>,
    },
    /// Open a URI with the desktop handler.
    OpenUri { uri: String },
    /// Swallow the source entirely.
    Disabled,
}

impl Action {
    /// True when triggering this action emits no synthesized key events.
    pub fn is_silent(&self) -> bool {
        !matches!(self, Action::Key { .. } | Action::Shortcut { .. })
    }

    /// Keys this action produces, for orphan analysis.
    pub fn produced_keys(&self) -> &[KeyId] {
        match self {
            Action::Key { to } => std::slice::from_ref(to),
            Action::Shortcut { to } => to.keys(),
            _ => &[],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Key { to } => write!(f, "key {}", to),
            Action::Shortcut { to } => write!(f, "shortcut {}", to),
            Action::Launch { program, args } => {
                write!(f, "launch {}", program)?;
                if let Some(args) = args {
                    write!(f, " {}", args)?;
                }
                Ok(())
            }
            Action::OpenUri { uri } => write!(f, "open {}", uri),
            Action::Disabled => write!(f, "disabled"),
        }
    }
}

/// One complete remap definition
///
/// # Invariant
/// `source` is non-empty, and (source, scope) is unique across the whole
/// table. Uniqueness is enforced by the validator before commit and by the
/// table builder at load.
///
/// # Example
/// ```
/// use keyremapd::core::{Action, KeyChord, RemapEntry, Scope};
///
/// let entry = RemapEntry {
///     source: "CAPSLOCK".parse::<KeyChord>().unwrap(),
///     action: Action::Key { to: "ESC".parse().unwrap() },
///     scope: Scope::Global,
/// };
/// assert_eq!(entry.to_string(), "CAPSLOCK => key ESC");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapEntry {
    /// The held-key set that triggers this entry.
    pub source: KeyChord,

    /// What the source is rewritten into.
    pub action: Action,

    /// Global or per-application applicability.
    #[serde(default = "Scope::global_default", skip_serializing_if = "Scope::is_global")]
    pub scope: Scope,
}

impl fmt::Display for RemapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Scope::App(name) = &self.scope {
            write!(f, "[{}] ", name)?;
        }
        write!(f, "{} => {}", self.source, self.action)
    }
}
