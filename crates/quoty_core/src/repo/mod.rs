//! Repository layer: orchestration between the remote provider, the store
//! and the state projections.
//!
//! # Invariants
//! - The repository is the only writer of the quote store.

pub mod quote_repo;
