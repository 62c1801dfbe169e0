// SPDX-License-Identifier: MIT OR Apache-2.0
//! Redelivery budgets.
//!
//! A [`RedeliveryTracker`] counts deliveries per message identity. Once a
//! message is delivered more often than the budget allows, the tracker
//! raises [`RedeliveryExhausted`]; the propagate policy then consumes the
//! message through [`RedeliveryExceeded`] instead of retrying it.

use crate::event::Event;
use crate::failure::{FailureKind, FailureRecord};
use crate::processor::{ProcessorChain, ProcessorFailure};
use dashmap::DashMap;
use errflow_mapping::{Exception, classes};
use errflow_types::{BuiltinErrorType, ErrorTypeRepository, RepositoryError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Budget used when none is configured.
pub const DEFAULT_MAX_REDELIVERY_COUNT: u32 = 5;

/// Extracts a message identity from an event.
pub type IdExtractor = Arc<dyn Fn(&Event) -> Option<String> + Send + Sync>;

/// Where the tracker takes the message identity from.
#[derive(Clone, Default)]
pub enum IdSource {
    /// [`Event::message_id`].
    #[default]
    MessageId,
    /// A caller-supplied extractor, e.g. a hash of the payload.
    Custom(IdExtractor),
}

impl IdSource {
    /// Wrap a closure.
    pub fn custom(f: impl Fn(&Event) -> Option<String> + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    fn extract(&self, event: &Event) -> Option<String> {
        match self {
            Self::MessageId => event.message_id().map(str::to_string),
            Self::Custom(f) => f(event),
        }
    }
}

impl fmt::Debug for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageId => f.write_str("MessageId"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Redelivery budget and identity source.
#[derive(Debug, Clone)]
pub struct RedeliveryPolicy {
    max_redelivery_count: u32,
    id_source: IdSource,
}

impl RedeliveryPolicy {
    /// Allow `max_redelivery_count` deliveries per message id.
    pub fn new(max_redelivery_count: u32) -> Self {
        Self {
            max_redelivery_count,
            id_source: IdSource::MessageId,
        }
    }

    /// Take identities from `source`.
    #[must_use]
    pub fn with_id_source(mut self, source: IdSource) -> Self {
        self.id_source = source;
        self
    }

    /// The budget.
    pub fn max_redelivery_count(&self) -> u32 {
        self.max_redelivery_count
    }

    /// The identity source.
    pub fn id_source(&self) -> &IdSource {
        &self.id_source
    }
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REDELIVERY_COUNT)
    }
}

/// A message went over its redelivery budget.
#[derive(Debug, Clone, Error)]
#[error(
    "message '{message_id}' has been delivered {redelivery_count} times, exceeding the maximum of {max_redelivery}"
)]
pub struct RedeliveryExhausted {
    /// Identity of the message.
    pub message_id: String,
    /// Delivery attempt that went over the budget.
    pub redelivery_count: u32,
    /// Configured budget.
    pub max_redelivery: u32,
    /// The unit of work of that attempt.
    pub event: Event,
}

impl RedeliveryExhausted {
    /// The tagged failure kind.
    pub fn kind(&self) -> FailureKind {
        FailureKind::RedeliveryExhausted {
            message_id: self.message_id.clone(),
            redelivery_count: self.redelivery_count,
            max_redelivery: self.max_redelivery,
        }
    }

    /// Turn the signal into a failure for the handler chain.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Unknown`] if `repo` lacks the built-in catalog.
    pub fn into_failure(self, repo: &ErrorTypeRepository) -> Result<FailureRecord, RepositoryError> {
        let error_type = BuiltinErrorType::RedeliveryExhausted.lookup(repo)?;
        let cause =
            Exception::new(&classes::MESSAGE_REDELIVERED, self.to_string()).typed(error_type.clone());
        let kind = self.kind();
        Ok(FailureRecord::new(cause, self.event, error_type)
            .with_kind(kind)
            .with_info("redelivery_count", self.redelivery_count)
            .with_info("max_redelivery", self.max_redelivery))
    }
}

/// Errors from [`RedeliveryTracker::record_delivery`].
#[derive(Debug, Error)]
pub enum RedeliveryError {
    /// The event has no identity to count by.
    #[error("event {event_id} has no message id to track redelivery by")]
    MissingMessageId {
        /// The event.
        event_id: Uuid,
    },
    /// The budget was exceeded.
    #[error(transparent)]
    Exhausted(Box<RedeliveryExhausted>),
}

/// Concurrent per-message delivery counters.
///
/// Increments for one id are atomic; distinct ids never contend on a
/// shared lock. Counters live until the message is forgotten: call
/// [`complete`](Self::complete) once a delivery is processed successfully
/// or consumed after exhaustion, otherwise the map keeps one entry per
/// message id and an exhausted id stays exhausted.
#[derive(Debug, Default)]
pub struct RedeliveryTracker {
    policy: RedeliveryPolicy,
    counters: DashMap<String, u32>,
}

impl RedeliveryTracker {
    /// A tracker enforcing `policy`.
    pub fn new(policy: RedeliveryPolicy) -> Self {
        Self {
            policy,
            counters: DashMap::new(),
        }
    }

    /// Count one delivery of `event` and return its delivery number.
    ///
    /// # Errors
    ///
    /// [`RedeliveryError::MissingMessageId`] when no identity can be
    /// extracted, [`RedeliveryError::Exhausted`] when the delivery number
    /// exceeds the budget.
    pub fn record_delivery(&self, event: &Event) -> Result<u32, RedeliveryError> {
        let message_id = self
            .policy
            .id_source
            .extract(event)
            .ok_or(RedeliveryError::MissingMessageId { event_id: event.id() })?;
        let count = {
            let mut entry = self.counters.entry(message_id.clone()).or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };
        let max = self.policy.max_redelivery_count;
        if count > max {
            warn!(
                target: "errflow.redelivery",
                message_id = %message_id,
                redelivery_count = count,
                max_redelivery = max,
                "redelivery budget exhausted"
            );
            return Err(RedeliveryError::Exhausted(Box::new(RedeliveryExhausted {
                message_id,
                redelivery_count: count,
                max_redelivery: max,
                event: event.clone(),
            })));
        }
        debug!(target: "errflow.redelivery", message_id = %message_id, redelivery_count = count, "delivery recorded");
        Ok(count)
    }

    /// Forget the message carried by `event`, returning its last count.
    ///
    /// Returns `None` when the event has no identity or was never counted.
    pub fn complete(&self, event: &Event) -> Option<u32> {
        let message_id = self.policy.id_source.extract(event)?;
        let count = self.reset(&message_id);
        if let Some(count) = count {
            debug!(target: "errflow.redelivery", message_id = %message_id, redelivery_count = count, "delivery completed");
        }
        count
    }

    /// Forget a message, returning its last count.
    pub fn reset(&self, message_id: &str) -> Option<u32> {
        self.counters.remove(message_id).map(|(_, count)| count)
    }

    /// Deliveries recorded for `message_id`.
    pub fn count(&self, message_id: &str) -> u32 {
        self.counters.get(message_id).map_or(0, |c| *c)
    }

    /// Number of tracked message ids.
    pub fn tracked(&self) -> usize {
        self.counters.len()
    }

    /// The enforced policy.
    pub fn policy(&self) -> &RedeliveryPolicy {
        &self.policy
    }
}

/// Terminal action for a message that went over its budget: run clean-up
/// processors, then strip the error so the message reads as freshly accepted.
#[derive(Debug, Clone, Default)]
pub struct RedeliveryExceeded {
    processors: ProcessorChain,
}

impl RedeliveryExceeded {
    /// Consume through `processors`.
    pub fn new(processors: ProcessorChain) -> Self {
        Self { processors }
    }

    /// Run the clean-up processors and clear error metadata.
    ///
    /// # Errors
    ///
    /// The first clean-up [`ProcessorFailure`].
    pub async fn process(&self, event: Event) -> Result<Event, ProcessorFailure> {
        let event = self.processors.execute(event).await?;
        Ok(event.without_error())
    }

    /// The clean-up processors.
    pub fn processors(&self) -> &ProcessorChain {
        &self.processors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ErrorInfo;
    use errflow_types::bootstrap;

    fn event(id: &str) -> Event {
        Event::builder().payload("x").message_id(id).build()
    }

    #[test]
    fn counts_per_message() {
        let tracker = RedeliveryTracker::new(RedeliveryPolicy::new(3));
        assert_eq!(tracker.record_delivery(&event("a")).unwrap(), 1);
        assert_eq!(tracker.record_delivery(&event("a")).unwrap(), 2);
        assert_eq!(tracker.record_delivery(&event("b")).unwrap(), 1);
        assert_eq!(tracker.count("a"), 2);
        assert_eq!(tracker.tracked(), 2);
    }

    #[test]
    fn fourth_delivery_of_three_is_exhausted() {
        let tracker = RedeliveryTracker::new(RedeliveryPolicy::new(3));
        for _ in 0..3 {
            tracker.record_delivery(&event("m")).unwrap();
        }
        let Err(RedeliveryError::Exhausted(exhausted)) = tracker.record_delivery(&event("m")) else {
            panic!("expected exhaustion");
        };
        assert_eq!(exhausted.redelivery_count, 4);
        assert_eq!(exhausted.max_redelivery, 3);
        assert_eq!(exhausted.message_id, "m");
    }

    #[test]
    fn reset_forgets() {
        let tracker = RedeliveryTracker::new(RedeliveryPolicy::new(1));
        tracker.record_delivery(&event("m")).unwrap();
        assert_eq!(tracker.reset("m"), Some(1));
        assert_eq!(tracker.count("m"), 0);
        assert_eq!(tracker.record_delivery(&event("m")).unwrap(), 1);
    }

    #[test]
    fn missing_id_is_an_error() {
        let tracker = RedeliveryTracker::default();
        assert!(matches!(
            tracker.record_delivery(&Event::new("x")),
            Err(RedeliveryError::MissingMessageId { .. })
        ));
    }

    #[test]
    fn custom_id_source() {
        let policy = RedeliveryPolicy::new(1).with_id_source(IdSource::custom(|e| {
            e.message().payload.as_str().map(str::to_string)
        }));
        let tracker = RedeliveryTracker::new(policy);
        tracker.record_delivery(&Event::new("same")).unwrap();
        assert!(tracker.record_delivery(&Event::new("same")).is_err());
    }

    #[test]
    fn into_failure_is_tagged() {
        let repo = bootstrap();
        let exhausted = RedeliveryExhausted {
            message_id: "m".into(),
            redelivery_count: 4,
            max_redelivery: 3,
            event: event("m"),
        };
        let failure = exhausted.into_failure(&repo).unwrap();
        assert!(failure.is_redelivery_exhausted());
        assert_eq!(failure.error_type().identifier(), "REDELIVERY_EXHAUSTED");
        assert!(failure.caused_exactly_by(&classes::MESSAGE_REDELIVERED));
        assert_eq!(failure.info()["redelivery_count"], 4);
    }

    #[tokio::test]
    async fn exceeded_strips_error() {
        let repo = bootstrap();
        let info = ErrorInfo::new(
            BuiltinErrorType::RedeliveryExhausted.lookup(&repo).unwrap(),
            Exception::new(&classes::MESSAGE_REDELIVERED, "too many"),
        );
        let out = RedeliveryExceeded::default()
            .process(event("m").with_error(info))
            .await
            .unwrap();
        assert!(out.error().is_none());
    }
}
