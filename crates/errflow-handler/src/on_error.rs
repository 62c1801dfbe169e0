// SPDX-License-Identifier: MIT OR Apache-2.0
//! The on-error handler state machine.
//!
//! An [`OnErrorHandler`] accepts failures by error type and an optional
//! predicate, then runs a fixed sequence:
//!
//! 1. fire the start notification
//! 2. log the failure
//! 3. bind the error to the unit of work
//! 4. mark handled (continue policy)
//! 5. roll back the owned transaction (propagate policy)
//! 6. route through the recovery processors
//! 7. clear the error (continue policy)
//! 8. reply and close streams
//! 9. fire the end notification
//!
//! The two stock policies are [`OnErrorPolicy::continue_on_error`] and
//! [`OnErrorPolicy::propagate_on_error`]; both are plain values, so custom
//! combinations need no subclassing.

use crate::cancel::CancellationToken;
use crate::chain::ExceptionHandlerAcceptor;
use crate::error::HandlingError;
use crate::event::{ErrorInfo, Event};
use crate::failure::FailureRecord;
use crate::notification::{EndGuard, EndStatus, NotificationDispatcher};
use crate::outcome::Outcome;
use crate::processor::{Processor, ProcessorChain, ProcessorFailure};
use crate::redelivery::RedeliveryExceeded;
use crate::resources::owns_transaction;
use crate::statistics::FlowStatistics;
use async_trait::async_trait;
use errflow_mapping::ErrorTypeLocator;
use errflow_types::{ErrorType, ErrorTypeMatcher, SharedMatcher};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Predicate over the unit of work.
pub type EventPredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Predicate over a failure.
pub type FailurePredicate = Arc<dyn Fn(&FailureRecord) -> bool + Send + Sync>;

/// Hook run around recovery routing.
pub type RoutingHook = Arc<dyn Fn(Event, &FailureRecord) -> Event + Send + Sync>;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What a handler does around its recovery processors.
#[derive(Clone, Default)]
pub struct OnErrorPolicy {
    /// Mark the failure handled and clear the error after routing.
    pub suppress_error_on_success: bool,
    /// Roll back the owned transaction before routing.
    pub rollback_on_entry: bool,
    /// Accept redelivery-exhausted failures regardless of type.
    pub accept_redelivery_exhausted: bool,
    /// Runs after step 5, before routing.
    pub before_routing: Option<RoutingHook>,
    /// Runs after routing, before replying.
    pub after_routing: Option<RoutingHook>,
}

impl OnErrorPolicy {
    /// Recover: the failure is handled and processing resumes.
    pub fn continue_on_error() -> Self {
        Self {
            suppress_error_on_success: true,
            ..Self::default()
        }
    }

    /// Roll back and re-raise.
    pub fn propagate_on_error() -> Self {
        Self {
            rollback_on_entry: true,
            accept_redelivery_exhausted: true,
            ..Self::default()
        }
    }

    /// Set the before-routing hook.
    #[must_use]
    pub fn before_routing(
        mut self,
        hook: impl Fn(Event, &FailureRecord) -> Event + Send + Sync + 'static,
    ) -> Self {
        self.before_routing = Some(Arc::new(hook));
        self
    }

    /// Set the after-routing hook.
    #[must_use]
    pub fn after_routing(
        mut self,
        hook: impl Fn(Event, &FailureRecord) -> Event + Send + Sync + 'static,
    ) -> Self {
        self.after_routing = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for OnErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnErrorPolicy")
            .field("suppress_error_on_success", &self.suppress_error_on_success)
            .field("rollback_on_entry", &self.rollback_on_entry)
            .field("accept_redelivery_exhausted", &self.accept_redelivery_exhausted)
            .field("before_routing", &self.before_routing.is_some())
            .field("after_routing", &self.after_routing.is_some())
            .finish()
    }
}

/// When a handler logs the failures it handles.
#[derive(Clone, Default)]
pub enum LogMode {
    /// Every failure.
    #[default]
    Always,
    /// Never.
    Never,
    /// Failures matching the predicate.
    When(FailurePredicate),
}

impl LogMode {
    /// Log only failures matching `f`.
    pub fn when(f: impl Fn(&FailureRecord) -> bool + Send + Sync + 'static) -> Self {
        Self::When(Arc::new(f))
    }

    /// Whether `failure` is logged.
    pub fn should_log(&self, failure: &FailureRecord) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::When(f) => f(failure),
        }
    }
}

impl From<bool> for LogMode {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Always } else { Self::Never }
    }
}

impl fmt::Debug for LogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Never => f.write_str("Never"),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// A configured on-error handler.
pub struct OnErrorHandler {
    name: String,
    flow: Option<String>,
    policy: OnErrorPolicy,
    error_type: Option<SharedMatcher>,
    when: Option<EventPredicate>,
    accepts_all: bool,
    log: LogMode,
    processors: ProcessorChain,
    redelivery_exceeded: Option<RedeliveryExceeded>,
    notifications: NotificationDispatcher,
    statistics: Option<Arc<FlowStatistics>>,
    locator: Option<Arc<ErrorTypeLocator>>,
}

enum Routed {
    Done(Event),
    Failed(FailureRecord),
    Cancelled,
}

impl OnErrorHandler {
    /// Start building a handler with a custom policy.
    pub fn builder(name: impl Into<String>) -> OnErrorHandlerBuilder {
        OnErrorHandlerBuilder::new(name.into())
    }

    /// Start building a continue handler.
    pub fn continue_on_error(name: impl Into<String>) -> OnErrorHandlerBuilder {
        Self::builder(name).policy(OnErrorPolicy::continue_on_error())
    }

    /// Start building a propagate handler.
    pub fn propagate_on_error(name: impl Into<String>) -> OnErrorHandlerBuilder {
        Self::builder(name).policy(OnErrorPolicy::propagate_on_error())
    }

    /// The policy.
    pub fn policy(&self) -> &OnErrorPolicy {
        &self.policy
    }

    /// The flow whose transactions this handler owns.
    pub fn flow(&self) -> Option<&str> {
        self.flow.as_deref()
    }

    /// The recovery processors.
    pub fn processors(&self) -> &ProcessorChain {
        &self.processors
    }

    fn rollback_owned(&self, event: &Event) -> bool {
        let Some(tx) = event.transaction() else {
            return false;
        };
        if !owns_transaction(self.flow.as_deref(), tx.as_ref()) {
            debug!(target: "errflow.handler", handler = %self.name, tx = tx.id(), "transaction owned by another flow, not rolling back");
            return false;
        }
        match tx.rollback() {
            Ok(()) => {
                debug!(target: "errflow.handler", handler = %self.name, tx = tx.id(), "transaction rolled back");
                true
            }
            Err(err) => {
                warn!(target: "errflow.handler", handler = %self.name, tx = tx.id(), error = %err, "rollback failed");
                false
            }
        }
    }

    fn recovery_error_type(&self, failure: &ProcessorFailure, original: &FailureRecord) -> ErrorType {
        if let Some(typed) = failure.exception.error_type() {
            return typed.clone();
        }
        match &self.locator {
            Some(locator) => locator.lookup_error_type(&failure.exception),
            None => original.error_type().clone(),
        }
    }

    async fn route(&self, event: Event, failure: &FailureRecord, cancel: &CancellationToken) -> Routed {
        let exceeded = self
            .redelivery_exceeded
            .as_ref()
            .filter(|_| failure.is_redelivery_exhausted() && self.policy.rollback_on_entry);
        let has_processors = match exceeded {
            Some(exceeded) => !exceeded.processors().is_empty(),
            None => !self.processors.is_empty(),
        };
        let routing = async {
            match exceeded {
                Some(exceeded) => exceeded.process(event.clone()).await,
                None => self.processors.execute(event.clone()).await,
            }
        };
        // Cancellation only interrupts running processors.
        let result = if has_processors {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Routed::Cancelled,
                result = routing => result,
            }
        } else {
            routing.await
        };
        match result {
            Ok(event) => Routed::Done(event),
            Err(pf) => {
                error!(
                    target: "errflow.handler",
                    handler = %self.name,
                    processor = %pf.processor,
                    error = %pf.exception,
                    "exception during exception strategy execution"
                );
                if let Some(stats) = &self.statistics {
                    stats.increment_fatal_errors();
                }
                self.rollback_owned(&event);
                let error_type = self.recovery_error_type(&pf, failure);
                let record = FailureRecord::new(pf.exception, event, error_type)
                    .with_info("processor", pf.processor)
                    .with_info("original_error_type", failure.error_type().to_string())
                    .mark_rollback();
                Routed::Failed(record)
            }
        }
    }

    async fn release(&self, original: &Event, result: Option<&Event>) {
        if let Some(event) = result {
            if let Some(reply_to) = event.reply_to() {
                if let Err(err) = reply_to.reply(event).await {
                    warn!(target: "errflow.handler", handler = %self.name, error = %err, "reply-to failed");
                }
            }
        }
        for stream in original.streams() {
            if let Err(err) = stream.close() {
                warn!(target: "errflow.handler", handler = %self.name, stream = stream.name(), error = %err, "failed to close stream");
            }
        }
    }
}

#[async_trait]
impl ExceptionHandlerAcceptor for OnErrorHandler {
    fn accept(&self, event: &Event) -> bool {
        if self.accepts_all {
            return true;
        }
        let error = event.error();
        if self.policy.accept_redelivery_exhausted
            && error.is_some_and(ErrorInfo::is_redelivery_exhausted)
        {
            return true;
        }
        let type_matches = match (&self.error_type, error) {
            (None, _) => true,
            (Some(matcher), Some(error)) => matcher.matches(error.error_type()),
            (Some(_), None) => false,
        };
        type_matches && self.when.as_ref().is_none_or(|when| when(event))
    }

    fn accepts_all(&self) -> bool {
        self.accepts_all
    }

    async fn handle_exception(
        &self,
        failure: FailureRecord,
        cancel: &CancellationToken,
    ) -> Result<Outcome, HandlingError> {
        let mut guard = EndGuard::start(&self.notifications, &self.name, failure.event());

        if self.log.should_log(&failure) {
            warn!(
                target: "errflow.handler",
                handler = %self.name,
                error_type = %failure.error_type(),
                event_id = %failure.event().id(),
                message_id = failure.event().message_id().unwrap_or("-"),
                cause = %failure.cause(),
                "handling failure"
            );
        }
        if let Some(stats) = &self.statistics {
            stats.increment_execution_errors();
        }

        let bound = failure.event().clone().with_error(failure.error_info());
        let mut failure = failure.with_event(bound);
        if self.policy.suppress_error_on_success {
            failure = failure.mark_handled();
        }
        let original = failure.event().clone();
        guard.own_streams(original.streams());

        let exhausted = failure.is_redelivery_exhausted();
        if self.policy.rollback_on_entry && !exhausted {
            self.rollback_owned(failure.event());
            failure = failure.mark_rollback();
        }
        let mut event = failure.event().clone();
        if let Some(hook) = &self.policy.before_routing {
            event = hook(event, &failure);
        }
        guard.update(&event);

        let routed = if exhausted && self.policy.rollback_on_entry {
            failure = failure.mark_handled();
            if self.redelivery_exceeded.is_none() {
                info!(
                    target: "errflow.handler",
                    handler = %self.name,
                    message_id = event.message_id().unwrap_or("-"),
                    "redelivery exhausted, message consumed"
                );
                Routed::Done(event.without_error())
            } else {
                self.route(event, &failure, cancel).await
            }
        } else {
            self.route(event, &failure, cancel).await
        };

        let outcome = match routed {
            Routed::Cancelled => {
                warn!(target: "errflow.handler", handler = %self.name, reason = ?cancel.reason(), "recovery routing cancelled");
                self.release(&original, None).await;
                guard.finish(failure.event(), EndStatus::Aborted);
                return Err(HandlingError::Cancelled {
                    handler: self.name.clone(),
                    failure: Box::new(failure),
                });
            }
            Routed::Failed(record) => {
                let mut event = record.event().clone();
                if let Some(hook) = &self.policy.after_routing {
                    event = hook(event, &record);
                }
                Outcome::Propagate(record.with_event(event))
            }
            Routed::Done(mut event) => {
                if self.policy.suppress_error_on_success {
                    event = event.without_error();
                }
                if let Some(hook) = &self.policy.after_routing {
                    event = hook(event, &failure);
                }
                if failure.handled() {
                    Outcome::Continue(event)
                } else {
                    Outcome::Propagate(failure.with_event(event))
                }
            }
        };

        let continued = outcome.is_continue();
        self.release(&original, continued.then(|| outcome.event()))
            .await;
        if let Some(stats) = &self.statistics {
            if continued {
                stats.increment_handled();
            } else {
                stats.increment_propagated();
            }
        }
        let status = if continued {
            EndStatus::Continued
        } else {
            EndStatus::Propagated
        };
        guard.finish(outcome.event(), status);
        Ok(outcome)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for OnErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnErrorHandler")
            .field("name", &self.name)
            .field("flow", &self.flow)
            .field("policy", &self.policy)
            .field("error_type", &self.error_type)
            .field("when", &self.when.is_some())
            .field("accepts_all", &self.accepts_all)
            .field("log", &self.log)
            .field("processors", &self.processors)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`OnErrorHandler`].
pub struct OnErrorHandlerBuilder {
    name: String,
    flow: Option<String>,
    policy: OnErrorPolicy,
    error_type: Option<SharedMatcher>,
    when: Option<EventPredicate>,
    accepts_all: bool,
    log: LogMode,
    processors: ProcessorChain,
    redelivery_exceeded: Option<RedeliveryExceeded>,
    notifications: NotificationDispatcher,
    statistics: Option<Arc<FlowStatistics>>,
    locator: Option<Arc<ErrorTypeLocator>>,
}

impl OnErrorHandlerBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            flow: None,
            policy: OnErrorPolicy::default(),
            error_type: None,
            when: None,
            accepts_all: false,
            log: LogMode::Always,
            processors: ProcessorChain::new(),
            redelivery_exceeded: None,
            notifications: NotificationDispatcher::new(),
            statistics: None,
            locator: None,
        }
    }

    /// Set the policy.
    #[must_use]
    pub fn policy(mut self, policy: OnErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bind to a flow; only its transactions are rolled back.
    #[must_use]
    pub fn flow(mut self, flow: impl Into<String>) -> Self {
        self.flow = Some(flow.into());
        self
    }

    /// Accept only error types matching `matcher`.
    #[must_use]
    pub fn error_type(mut self, matcher: SharedMatcher) -> Self {
        self.error_type = Some(matcher);
        self
    }

    /// Accept only error types matching `matcher`.
    #[must_use]
    pub fn error_type_matcher(self, matcher: impl ErrorTypeMatcher + 'static) -> Self {
        self.error_type(Arc::new(matcher))
    }

    /// Accept only events for which `when` holds.
    #[must_use]
    pub fn when(mut self, when: impl Fn(&Event) -> bool + Send + Sync + 'static) -> Self {
        self.when = Some(Arc::new(when));
        self
    }

    /// Accept every failure.
    #[must_use]
    pub fn accepts_all(mut self, accepts_all: bool) -> Self {
        self.accepts_all = accepts_all;
        self
    }

    /// Set the log mode.
    #[must_use]
    pub fn log(mut self, log: impl Into<LogMode>) -> Self {
        self.log = log.into();
        self
    }

    /// Append a recovery processor.
    #[must_use]
    pub fn processor<P: Processor + 'static>(mut self, processor: P) -> Self {
        self.processors = self.processors.processor(processor);
        self
    }

    /// Replace the recovery processors.
    #[must_use]
    pub fn processors(mut self, processors: ProcessorChain) -> Self {
        self.processors = processors;
        self
    }

    /// Consume redelivery-exhausted failures through `exceeded`.
    #[must_use]
    pub fn redelivery_exceeded(mut self, exceeded: RedeliveryExceeded) -> Self {
        self.redelivery_exceeded = Some(exceeded);
        self
    }

    /// Set the lifecycle listeners.
    #[must_use]
    pub fn notifications(mut self, notifications: NotificationDispatcher) -> Self {
        self.notifications = notifications;
        self
    }

    /// Share flow statistics.
    #[must_use]
    pub fn statistics(mut self, statistics: Arc<FlowStatistics>) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Classify recovery failures with `locator`.
    #[must_use]
    pub fn locator(mut self, locator: Arc<ErrorTypeLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Finish.
    pub fn build(self) -> OnErrorHandler {
        OnErrorHandler {
            name: self.name,
            flow: self.flow,
            policy: self.policy,
            error_type: self.error_type,
            when: self.when,
            accepts_all: self.accepts_all,
            log: self.log,
            processors: self.processors,
            redelivery_exceeded: self.redelivery_exceeded,
            notifications: self.notifications,
            statistics: self.statistics,
            locator: self.locator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errflow_mapping::{Exception, classes};
    use errflow_types::{
        BuiltinErrorType, ErrorTypeRepository, SingleErrorTypeMatcher, bootstrap,
    };

    fn failure(repo: &ErrorTypeRepository, builtin: BuiltinErrorType) -> FailureRecord {
        FailureRecord::new(
            Exception::new(&classes::EXCEPTION, "boom"),
            Event::new("x"),
            builtin.lookup(repo).unwrap(),
        )
    }

    fn bound(failure: &FailureRecord) -> Event {
        failure.event().clone().with_error(failure.error_info())
    }

    #[test]
    fn stock_policies() {
        let c = OnErrorPolicy::continue_on_error();
        assert!(c.suppress_error_on_success && !c.rollback_on_entry && !c.accept_redelivery_exhausted);
        let p = OnErrorPolicy::propagate_on_error();
        assert!(!p.suppress_error_on_success && p.rollback_on_entry && p.accept_redelivery_exhausted);
    }

    #[test]
    fn accept_by_type_hierarchy() {
        let repo = bootstrap();
        let handler = OnErrorHandler::continue_on_error("c")
            .error_type_matcher(SingleErrorTypeMatcher::new(
                BuiltinErrorType::Connectivity.lookup(&repo).unwrap(),
            ))
            .build();
        assert!(handler.accept(&bound(&failure(&repo, BuiltinErrorType::Connectivity))));
        assert!(!handler.accept(&bound(&failure(&repo, BuiltinErrorType::Timeout))));
        assert!(!handler.accept(&Event::new("no error")));
    }

    #[test]
    fn when_predicate_combines_with_type() {
        let repo = bootstrap();
        let handler = OnErrorHandler::continue_on_error("c")
            .when(|e| e.variable("retry").is_some())
            .build();
        let f = failure(&repo, BuiltinErrorType::Timeout);
        assert!(!handler.accept(&bound(&f)));
        assert!(handler.accept(&bound(&f).with_variable("retry", 1)));
    }

    #[test]
    fn accepts_all_ignores_missing_error() {
        let handler = OnErrorHandler::propagate_on_error("p").accepts_all(true).build();
        assert!(handler.accept(&Event::new("x")));
        assert!(handler.accepts_all());
    }

    #[test]
    fn log_mode_from_bool() {
        let repo = bootstrap();
        let f = failure(&repo, BuiltinErrorType::Timeout);
        assert!(LogMode::from(true).should_log(&f));
        assert!(!LogMode::from(false).should_log(&f));
        assert!(LogMode::when(|f| f.error_type().identifier() == "TIMEOUT").should_log(&f));
    }
}
