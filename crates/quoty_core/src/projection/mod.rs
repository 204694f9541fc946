//! Loading/Success/Error projection of asynchronous quote queries.
//!
//! # Responsibility
//! - Hold the latest state of one logical query channel.
//! - Discard completions from invocations that have been superseded.
//! - Settle invocations whose caller gave up as cancelled.
//!
//! # Invariants
//! - Every invocation emits `Loading` exactly once, before its terminal state.
//! - At most one terminal state is applied per invocation.
//! - Only the most recent invocation may apply a terminal state.
//! - Every state is delivered to every subscriber, in order.
//! - A current invocation dropped before completing ends in `Error`.

use crate::live::{Publisher, Subscription};
use crate::model::quote::Quote;
use log::{debug, warn};
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Error message applied when an invocation is dropped before completing.
pub const CANCELLED_MESSAGE: &str = "fetch cancelled before completion";

/// Observable state of one query channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteState {
    Loading,
    Success(Quote),
    /// Human-readable failure message.
    Error(String),
}

impl QuoteState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }

    pub fn quote(&self) -> Option<&Quote> {
        match self {
            Self::Success(quote) => Some(quote),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
        }
    }
}

/// Named query channels exposed by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Random,
    ByCategory,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::ByCategory => "by_category",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof of one invocation; redeemed by `Projection::complete`.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an invocation that is never completed stays in Loading"]
pub struct Ticket {
    channel: Channel,
    generation: u64,
}

impl Ticket {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Latest-state holder for one channel.
#[derive(Debug)]
pub struct Projection {
    channel: Channel,
    // Held while publishing so begin/complete are serialized per channel.
    inner: Mutex<Inner>,
    state: Publisher<QuoteState>,
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    last_success: Option<Quote>,
}

impl Projection {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            inner: Mutex::new(Inner::default()),
            state: Publisher::new(None),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every write to `Inner` is a single assignment, so a poisoned lock
        // still guards consistent data.
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new invocation: emits `Loading` and supersedes any earlier one.
    pub fn begin(&self) -> Ticket {
        let mut inner = self.lock();
        inner.generation += 1;
        self.state.publish(QuoteState::Loading);
        Ticket {
            channel: self.channel,
            generation: inner.generation,
        }
    }

    /// Applies the terminal state of `ticket`'s invocation.
    ///
    /// Returns `false` and leaves the channel untouched when a newer
    /// invocation has begun since `ticket` was issued.
    pub fn complete(&self, ticket: Ticket, state: QuoteState) -> bool {
        debug_assert!(state.is_terminal(), "complete() takes a terminal state");
        debug_assert_eq!(ticket.channel, self.channel);

        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            return false;
        }
        debug!(
            "event=projection_complete module=projection status=ok channel={} generation={} state={}",
            self.channel,
            ticket.generation,
            state.label()
        );
        if let QuoteState::Success(quote) = &state {
            inner.last_success = Some(quote.clone());
        }
        self.state.publish(state);
        true
    }

    /// Like [`Projection::begin`], but the returned guard settles the
    /// invocation with [`CANCELLED_MESSAGE`] if it is dropped unfinished.
    pub fn start(&self) -> PendingInvocation<'_> {
        PendingInvocation {
            projection: self,
            ticket: Some(self.begin()),
        }
    }

    /// Latest state, or `None` before the first invocation.
    pub fn current(&self) -> Option<QuoteState> {
        self.state.current()
    }

    /// Generation of the most recent invocation; `0` before the first.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Quote of the most recent applied `Success`, kept across later
    /// `Loading` and `Error` states so callers can keep showing it.
    pub fn last_success(&self) -> Option<Quote> {
        self.lock().last_success.clone()
    }

    /// Returns whether `ticket` still belongs to the most recent invocation.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.generation() == ticket.generation
    }

    /// Subscription that replays the latest state, then every later state
    /// in order.
    pub fn subscribe(&self) -> Subscription<QuoteState> {
        self.state.subscribe()
    }
}

/// Invocation in flight on a [`Projection`].
#[must_use = "dropping a pending invocation cancels it"]
#[derive(Debug)]
pub struct PendingInvocation<'a> {
    projection: &'a Projection,
    ticket: Option<Ticket>,
}

impl PendingInvocation<'_> {
    pub fn generation(&self) -> u64 {
        self.ticket.as_ref().map_or(0, Ticket::generation)
    }

    /// Applies the terminal state; see [`Projection::complete`].
    pub fn finish(mut self, state: QuoteState) -> bool {
        match self.ticket.take() {
            Some(ticket) => self.projection.complete(ticket, state),
            None => false,
        }
    }
}

impl Drop for PendingInvocation<'_> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        let generation = ticket.generation;
        if self
            .projection
            .complete(ticket, QuoteState::Error(CANCELLED_MESSAGE.to_string()))
        {
            warn!(
                "event=projection_cancelled module=projection status=error channel={} generation={}",
                self.projection.channel, generation
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Channel, Projection, QuoteState, CANCELLED_MESSAGE};
    use crate::model::quote::Quote;

    fn success(id: &str) -> QuoteState {
        QuoteState::Success(Quote::new(id, "content", "author"))
    }

    #[test]
    fn starts_unset() {
        let projection = Projection::new(Channel::Random);
        assert_eq!(projection.current(), None);
        assert_eq!(projection.generation(), 0);
    }

    #[test]
    fn begin_then_complete_holds_terminal_state() {
        let projection = Projection::new(Channel::Random);
        let ticket = projection.begin();
        assert_eq!(projection.current(), Some(QuoteState::Loading));

        assert!(projection.complete(ticket, success("q1")));
        assert_eq!(projection.current(), Some(success("q1")));
    }

    #[test]
    fn stale_ticket_is_discarded() {
        let projection = Projection::new(Channel::ByCategory);
        let first = projection.begin();
        let second = projection.begin();
        assert!(!projection.is_current(&first));

        assert!(!projection.complete(first, success("stale")));
        assert_eq!(projection.current(), Some(QuoteState::Loading));

        assert!(projection.complete(second, QuoteState::Error("boom".into())));
        assert_eq!(
            projection.current().and_then(|s| s.error_message().map(str::to_owned)),
            Some("boom".to_string())
        );
    }

    #[test]
    fn new_invocation_supersedes_terminal_state() {
        let projection = Projection::new(Channel::Random);
        let ticket = projection.begin();
        assert!(projection.complete(ticket, success("q1")));

        let next = projection.begin();
        assert_eq!(projection.current(), Some(QuoteState::Loading));

        assert!(projection.complete(next, QuoteState::Error("offline".into())));
        assert_eq!(
            projection.last_success().map(|quote| quote.id),
            Some("q1".to_string())
        );
    }

    #[test]
    fn dropped_invocation_ends_as_cancelled() {
        let projection = Projection::new(Channel::Random);
        drop(projection.start());

        assert_eq!(
            projection.current(),
            Some(QuoteState::Error(CANCELLED_MESSAGE.to_string()))
        );
    }

    #[test]
    fn dropped_superseded_invocation_leaves_newer_one_alone() {
        let projection = Projection::new(Channel::ByCategory);
        let stale = projection.start();
        let fresh = projection.start();
        assert_eq!(fresh.generation(), 2);

        drop(stale);
        assert_eq!(projection.current(), Some(QuoteState::Loading));

        assert!(fresh.finish(success("q2")));
        assert_eq!(projection.current(), Some(success("q2")));
    }

    #[tokio::test]
    async fn subscriber_polled_after_completion_still_sees_loading_first() {
        let projection = Projection::new(Channel::Random);
        let pending = projection.start();
        let mut states = projection.subscribe();
        assert!(pending.finish(success("q1")));

        assert_eq!(states.next().await, Some(QuoteState::Loading));
        assert_eq!(states.next().await, Some(success("q1")));
        assert!(!states.has_pending());
    }
}
