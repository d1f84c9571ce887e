//! src/config/tests/mod.rs
//!
//! Filesystem-backed tests for the persistence layer: manager load/save
//! behavior and the backup/commit/rollback transaction cycle.

#[cfg(test)]
mod manager_tests;

#[cfg(test)]
mod transaction_tests;
