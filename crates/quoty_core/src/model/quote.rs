//! Quotation record and category tag.
//!
//! # Responsibility
//! - Define the record shared by the remote provider, the store and the
//!   state projection.
//! - Reject category tags that cannot be sent to the provider at all.
//!
//! # Invariants
//! - `id` and `content` are never empty for a valid quote.
//! - `author` is always present, possibly as an empty string.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Provider-issued stable identifier; the natural primary key of the store.
pub type QuoteId = String;

/// One quotation as fetched from the provider and cached locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quote {
    /// Providers commonly ship this as `_id`.
    #[serde(alias = "_id")]
    pub id: QuoteId,
    pub content: String,
    #[serde(default)]
    pub author: String,
}

/// Validation failures for quote records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteValidationError {
    EmptyId,
    EmptyContent { id: QuoteId },
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "quote id must not be empty"),
            Self::EmptyContent { id } => write!(f, "quote `{id}` has empty content"),
        }
    }
}

impl Error for QuoteValidationError {}

impl Quote {
    /// Builds a quote record without validating it.
    pub fn new(
        id: impl Into<QuoteId>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            author: author.into(),
        }
    }

    /// Checks record-level invariants.
    pub fn validate(&self) -> Result<(), QuoteValidationError> {
        if self.id.trim().is_empty() {
            return Err(QuoteValidationError::EmptyId);
        }
        if self.content.trim().is_empty() {
            return Err(QuoteValidationError::EmptyContent {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Author for display, with a placeholder for anonymous quotes.
    pub fn author_or_unknown(&self) -> &str {
        let trimmed = self.author.trim();
        if trimmed.is_empty() {
            "Unknown"
        } else {
            trimmed
        }
    }
}

/// Rejected category input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryError {
    Empty,
    Malformed(String),
}

impl Display for CategoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "category must not be empty"),
            Self::Malformed(value) => {
                write!(f, "malformed category {value:?}: contains control characters")
            }
        }
    }
}

impl Error for CategoryError {}

/// Category tag forwarded verbatim to the provider (`life`, `wisdom`, ...).
///
/// Whether the provider knows the tag is the provider's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteCategory(String);

impl QuoteCategory {
    /// Accepts any tag that is not blank and has no control characters.
    /// Case, spacing and punctuation are kept as given.
    pub fn parse(value: &str) -> Result<Self, CategoryError> {
        if value.trim().is_empty() {
            return Err(CategoryError::Empty);
        }
        if value.chars().any(char::is_control) {
            return Err(CategoryError::Malformed(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for QuoteCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
