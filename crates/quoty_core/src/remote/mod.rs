//! Remote quote provider contract.
//!
//! # Responsibility
//! - Describe the fetch capability the repository depends on.
//! - Classify transport failures.
//!
//! The wire protocol lives with the caller; core only consumes this trait.

use crate::model::quote::{Quote, QuoteCategory};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Remote fetch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network unreachable or connection refused.
    Unreachable(String),
    /// Non-success response status.
    Status(u16),
    Timeout,
    MalformedPayload(String),
    Other(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable(details) => write!(f, "quote provider unreachable: {details}"),
            Self::Status(code) => write!(f, "quote provider responded with status {code}"),
            Self::Timeout => write!(f, "quote provider timed out"),
            Self::MalformedPayload(details) => {
                write!(f, "malformed quote payload: {details}")
            }
            Self::Other(details) => write!(f, "quote fetch failed: {details}"),
        }
    }
}

impl Error for TransportError {}

impl TransportError {
    /// Stable short code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::Status(_) => "status",
            Self::Timeout => "timeout",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::Other(_) => "other",
        }
    }
}

/// Remote fetch capability.
///
/// `category = None` asks for a random quote.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch(&self, category: Option<&QuoteCategory>) -> Result<Quote, TransportError>;
}
