//! Quote repository: the single entry point for presentation code.
//!
//! # Responsibility
//! - Fetch quotes from the remote provider and upsert them into the store.
//! - Project every fetch onto its channel as `Loading -> Success | Error`.
//! - Serve the saved-quotes listing straight from the store.
//!
//! # Invariants
//! - A failed fetch never writes to the store.
//! - `Loading` is emitted when a fetch is invoked, before the returned future
//!   is first polled.
//! - Dropping the returned future before it resolves settles the channel with
//!   a cancellation `Error`; it never stays in `Loading`.
//! - Only the latest invocation per channel may publish its terminal state.
//! - Every failure reaches the projection as `QuoteState::Error`; none escapes
//!   as a panic.

use crate::live::Subscription;
use crate::model::quote::{CategoryError, Quote, QuoteCategory};
use crate::projection::{Channel, PendingInvocation, Projection, QuoteState};
use crate::remote::{QuoteProvider, TransportError};
use crate::store::quote_store::{QuoteStore, StorageError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default upper bound for one remote fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure of a repository operation.
#[derive(Debug)]
pub enum RepoError {
    /// Category rejected before any remote call.
    InvalidCategory(CategoryError),
    Transport(TransportError),
    Storage(StorageError),
    /// A blocking storage task died before reporting back.
    Worker(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCategory(err) => write!(f, "{err}"),
            Self::Transport(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "local storage failure: {err}"),
            Self::Worker(details) => write!(f, "storage worker failed: {details}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCategory(err) => Some(err),
            Self::Transport(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Worker(_) => None,
        }
    }
}

impl RepoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidCategory(_) => "invalid_category",
            Self::Transport(err) => err.code(),
            Self::Storage(_) => "storage",
            Self::Worker(_) => "worker",
        }
    }
}

impl From<CategoryError> for RepoError {
    fn from(value: CategoryError) -> Self {
        Self::InvalidCategory(value)
    }
}

impl From<TransportError> for RepoError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<tokio::task::JoinError> for RepoError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Worker(value.to_string())
    }
}

/// Read-through repository over a quote store and a remote provider.
///
/// Holds one projection per channel; the random and by-category channels
/// never touch each other's state.
pub struct QuoteRepository<S, P: ?Sized> {
    store: Arc<S>,
    provider: Arc<P>,
    random: Projection,
    by_category: Projection,
    fetch_timeout: Duration,
}

impl<S, P> QuoteRepository<S, P>
where
    S: QuoteStore + 'static,
    P: QuoteProvider + ?Sized,
{
    pub fn new(store: Arc<S>, provider: Arc<P>) -> Self {
        Self {
            store,
            provider,
            random: Projection::new(Channel::Random),
            by_category: Projection::new(Channel::ByCategory),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Overrides the per-fetch timeout; expiry is reported as
    /// `TransportError::Timeout`.
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Fetches a random quote on the random channel.
    ///
    /// Resolves to this invocation's own terminal state, which is published
    /// only if no newer random fetch has started meanwhile.
    pub fn fetch_random(&self) -> impl Future<Output = QuoteState> + Send + '_ {
        let pending = self.random.start();
        info!(
            "event=quote_fetch module=repo status=start channel={} generation={}",
            Channel::Random,
            pending.generation()
        );

        async move {
            let started_at = Instant::now();
            let outcome = self.fetch_and_store(None).await;
            self.settle(&self.random, pending, outcome, started_at)
        }
    }

    /// Fetches a quote tagged `category` on the by-category channel.
    ///
    /// The tag is forwarded to the provider exactly as given. Only blank tags
    /// and tags with control characters fail locally; tags the provider does
    /// not know fail however it says so.
    pub fn fetch_by_category(
        &self,
        category: &str,
    ) -> impl Future<Output = QuoteState> + Send + '_ {
        let pending = self.by_category.start();
        let category = QuoteCategory::parse(category);
        info!(
            "event=quote_fetch module=repo status=start channel={} generation={} category={:?}",
            Channel::ByCategory,
            pending.generation(),
            category.as_ref().map_or("<invalid>", QuoteCategory::as_str)
        );

        async move {
            let started_at = Instant::now();
            let outcome = match category {
                Ok(category) => self.fetch_and_store(Some(&category)).await,
                Err(err) => Err(RepoError::from(err)),
            };
            self.settle(&self.by_category, pending, outcome, started_at)
        }
    }

    /// Lists every saved quote. Never touches the network.
    pub async fn list_saved(&self) -> RepoResult<Vec<Quote>> {
        let store = Arc::clone(&self.store);
        let quotes = tokio::task::spawn_blocking(move || store.get_all()).await??;
        Ok(quotes)
    }

    /// Live view of one saved quote; see `QuoteStore::watch_quote`.
    pub fn watch_saved(&self, id: &str) -> RepoResult<Subscription<Quote>> {
        Ok(self.store.watch_quote(id)?)
    }

    /// Replaying subscription to one channel's state.
    pub fn subscribe(&self, channel: Channel) -> Subscription<QuoteState> {
        self.projection(channel).subscribe()
    }

    /// Latest state of one channel, or `None` before its first fetch.
    pub fn state(&self, channel: Channel) -> Option<QuoteState> {
        self.projection(channel).current()
    }

    /// Last quote successfully shown on one channel.
    pub fn last_quote(&self, channel: Channel) -> Option<Quote> {
        self.projection(channel).last_success()
    }

    fn projection(&self, channel: Channel) -> &Projection {
        match channel {
            Channel::Random => &self.random,
            Channel::ByCategory => &self.by_category,
        }
    }

    async fn fetch_and_store(&self, category: Option<&QuoteCategory>) -> RepoResult<Quote> {
        let quote = tokio::time::timeout(self.fetch_timeout, self.provider.fetch(category))
            .await
            .map_err(|_| TransportError::Timeout)??;
        quote
            .validate()
            .map_err(|err| TransportError::MalformedPayload(err.to_string()))?;

        let store = Arc::clone(&self.store);
        let record = quote.clone();
        tokio::task::spawn_blocking(move || store.upsert(&record)).await??;
        Ok(quote)
    }

    fn settle(
        &self,
        projection: &Projection,
        pending: PendingInvocation<'_>,
        outcome: RepoResult<Quote>,
        started_at: Instant,
    ) -> QuoteState {
        let generation = pending.generation();
        let state = match outcome {
            Ok(quote) => QuoteState::Success(quote),
            Err(err) => {
                warn!(
                    "event=quote_fetch module=repo status=error channel={} generation={} duration_ms={} error_code={} error={}",
                    projection.channel(),
                    generation,
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                QuoteState::Error(err.to_string())
            }
        };

        if pending.finish(state.clone()) {
            info!(
                "event=quote_publish module=repo status=ok channel={} generation={} state={} duration_ms={} quote_id={}",
                projection.channel(),
                generation,
                state.label(),
                started_at.elapsed().as_millis(),
                state.quote().map_or("-", |quote| quote.id.as_str())
            );
        } else {
            info!(
                "event=quote_publish module=repo status=superseded channel={} generation={} current_generation={}",
                projection.channel(),
                generation,
                projection.generation()
            );
        }
        state
    }
}
