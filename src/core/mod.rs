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

//! src/core/mod.rs
//!
//! Core remapping logic module
//!
//! This module contains the fundamental data structures and algorithms
//! of the remapping engine, including:
//! - Key, chord, action, and entry type definitions
//! - The scope-partitioned remap table with O(1) hash lookup
//! - Candidate validation (conflicts, chord prefixes, orphaned keys)
//! - Chord string parsing
//!
//! Everything here is pure: no device I/O, no processes, no clocks. That
//! isolation is what lets the interception pipeline and the editor protocol
//! be tested without real input hardware.

pub mod keys;
pub mod parser;
pub mod table;
pub mod types;
pub mod validator;

pub use keys::KeyId;
pub use table::{RemapTable, TableDefect};
pub use types::*;
pub use validator::{validate, ValidationIssue, ValidationOutcome, ValidationWarning};

#[cfg(test)]
mod tests;
