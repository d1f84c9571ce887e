//! Core module tests
//!
//! Contains test suites for core functionality:
//! - Remap table lookup, precedence, and prefix indexing
//! - Validation tests (conflicts, partial mappings, orphans)
//! - Chord parser tests
//! - Type round-trip tests (chords, actions, entries)

#[cfg(test)]
mod table_tests;
#[cfg(test)]
mod parser_tests;
