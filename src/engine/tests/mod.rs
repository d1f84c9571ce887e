//! Engine tests
//!
//! The interceptor suite drives the rewrite state machine event by event
//! with scripted timestamps; the swap suite hammers table publication
//! from reader threads while a writer swaps snapshots.
