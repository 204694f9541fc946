//! Domain model for cached quotations.
//!
//! # Invariants
//! - Every quotation is identified by a provider-issued `QuoteId`.
//! - Records are replaced in full on re-fetch; there is no partial merge.

pub mod quote;
