//! Quote cache and delivery core for Quoty.
//!
//! Quotes fetched from a remote provider are mirrored into a local SQLite
//! store so they stay available offline. Every fetch is exposed to
//! presentation code as a `Loading -> Success | Error` projection.

pub mod config;
pub mod db;
pub mod live;
pub mod logging;
pub mod model;
pub mod projection;
pub mod remote;
pub mod repo;
pub mod store;

pub use config::CoreConfig;
pub use live::Subscription;
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::quote::{CategoryError, Quote, QuoteCategory, QuoteId, QuoteValidationError};
pub use projection::{
    Channel, PendingInvocation, Projection, QuoteState, Ticket, CANCELLED_MESSAGE,
};
pub use remote::{QuoteProvider, TransportError};
pub use repo::quote_repo::{QuoteRepository, RepoError, RepoResult, DEFAULT_FETCH_TIMEOUT};
pub use store::quote_store::{QuoteStore, SqliteQuoteStore, StorageError, StoreResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
