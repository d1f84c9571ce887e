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

//! Keyremapd
//!
//! A system-wide key remapping engine for Linux with chords, per-app
//! scopes, and live reload, built on evdev interception.
//!
//! # Features
//!
//! - **Key remapping:** Single keys, chords, and emitted shortcuts
//! - **Per-app scopes:** Mappings that apply only in a focused application
//! - **Action mappings:** Launch a program or open a URI from a key
//! - **Live reload:** Document saves swap the active table atomically
//! - **Suspension:** An editor can pause rewriting while it captures keys
//! - **Conflict Detection:** Validation before anything reaches the engine
//! - **Automatic Backups:** Timestamped backups before every document change
//! - **Atomic Operations:** Safe file writes with rollback on failure
//!
//! # Architecture
//!
//! - **`core`:** Business logic (keys, chords, remap table, parser, validation)
//! - **`config`:** File operations (document load/save, atomic updates, backups, watching)
//! - **`engine`:** Event interception (device hook, rewrite state machine, lifecycle)
//! - **`ipc`:** Cross-process coordination (suspension flag, edit sessions)
//!
//! # Examples
//!
//! ## Loading and validating a document
//!
//! ```no_run
//! use keyremapd::config::ConfigManager;
//! use keyremapd::core::validator::validate;
//! use std::path::PathBuf;
//!
//! let manager = ConfigManager::new(PathBuf::from("/tmp/remaps.json"))?;
//! let document = manager.load()?;
//! let outcome = validate(&document.remaps);
//! println!("{} mappings, clean: {}", document.remaps.len(), outcome.is_clean());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Building a lookup table
//!
//! ```
//! use keyremapd::core::types::{Action, KeyChord, RemapEntry, Scope};
//! use keyremapd::core::RemapTable;
//!
//! let capslock: KeyChord = "CAPSLOCK".parse()?;
//! let esc = "ESC".parse()?;
//!
//! let (table, defects) = RemapTable::build(vec![RemapEntry {
//!     source: capslock.clone(),
//!     action: Action::Key { to: esc },
//!     scope: Scope::Global,
//! }]);
//!
//! assert!(defects.is_empty());
//! assert!(table.lookup(&capslock, None).is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Running the engine
//!
//! ```no_run
//! use keyremapd::config::default_document_path;
//! use keyremapd::engine::{Engine, EngineOptions};
//!
//! Engine::run(EngineOptions {
//!     document_path: default_document_path(),
//!     devices: Vec::new(),
//!     parent_pid: None,
//!     focus: None,
//! })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod ipc;

// Re-export commonly used types for convenience
pub use crate::core::types::{Action, KeyChord, RemapEntry, Scope};
pub use crate::core::{KeyId, RemapTable};
