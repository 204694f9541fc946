//! Persistent quote store.
//!
//! # Responsibility
//! - Define the storage contract used by the repository.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - One record per quote id; writes replace the whole record.
//! - Storage faults surface as `StorageError`, never as panics.

pub mod quote_store;
