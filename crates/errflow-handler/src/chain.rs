// SPDX-License-Identifier: MIT OR Apache-2.0
//! The ordered handler chain.
//!
//! [`ErrorHandler`] owns an ordered list of [`ExceptionHandlerAcceptor`]s
//! and dispatches each failure to the first one that accepts it. Critical
//! failures skip the chain entirely.

use crate::cancel::CancellationToken;
use crate::error::{ChainError, HandlingError};
use crate::event::Event;
use crate::failure::FailureRecord;
use crate::on_error::OnErrorHandler;
use crate::outcome::Outcome;
use crate::statistics::FlowStatistics;
use async_trait::async_trait;
use errflow_types::{
    BuiltinErrorType, ErrorTypeMatcher, ErrorTypeRepository, SingleErrorTypeMatcher,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Name of the propagate handler appended to chains without a catch-all.
pub const DEFAULT_HANDLER_NAME: &str = "default-propagate";

/// A handler that may take responsibility for a failure.
#[async_trait]
pub trait ExceptionHandlerAcceptor: Send + Sync {
    /// Whether this handler takes the failure bound to `event`.
    fn accept(&self, event: &Event) -> bool;

    /// Whether [`accept`](Self::accept) holds for every event.
    fn accepts_all(&self) -> bool;

    /// Handle an accepted failure.
    ///
    /// # Errors
    ///
    /// [`HandlingError::Cancelled`] if `cancel` fires while routing.
    async fn handle_exception(
        &self,
        failure: FailureRecord,
        cancel: &CancellationToken,
    ) -> Result<Outcome, HandlingError>;

    /// Name used in logs and notifications.
    fn name(&self) -> &str;
}

/// Shared handle to a handler.
pub type SharedHandler = Arc<dyn ExceptionHandlerAcceptor>;

/// Ordered exception-handler chain of one flow.
pub struct ErrorHandler {
    handlers: Vec<SharedHandler>,
    critical: SingleErrorTypeMatcher,
    flow: Option<String>,
    statistics: Option<Arc<FlowStatistics>>,
}

impl ErrorHandler {
    /// Start building a chain.
    pub fn builder(repo: &ErrorTypeRepository) -> ErrorHandlerBuilder<'_> {
        ErrorHandlerBuilder {
            repo,
            handlers: Vec::new(),
            flow: None,
            statistics: None,
        }
    }

    /// A chain over `handlers`, in order.
    ///
    /// # Errors
    ///
    /// See [`ErrorHandlerBuilder::build`].
    pub fn with_listeners(
        repo: &ErrorTypeRepository,
        handlers: Vec<SharedHandler>,
    ) -> Result<Self, ChainError> {
        handlers
            .into_iter()
            .fold(Self::builder(repo), ErrorHandlerBuilder::listener_arc)
            .build()
    }

    /// Dispatch `failure` with a fresh cancellation token.
    ///
    /// # Errors
    ///
    /// See [`handle_exception_with_cancel`](Self::handle_exception_with_cancel).
    pub async fn handle_exception(&self, failure: FailureRecord) -> Result<Outcome, HandlingError> {
        self.handle_exception_with_cancel(failure, &CancellationToken::new())
            .await
    }

    /// Dispatch `failure` to the first accepting handler.
    ///
    /// Critical failures propagate unhandled without reaching any handler.
    ///
    /// # Errors
    ///
    /// [`HandlingError::NoAcceptingHandler`] if nothing accepts the failure,
    /// or whatever the chosen handler returns.
    pub async fn handle_exception_with_cancel(
        &self,
        failure: FailureRecord,
        cancel: &CancellationToken,
    ) -> Result<Outcome, HandlingError> {
        let event = failure.event().clone().with_error(failure.error_info());
        let failure = failure.with_event(event);

        if self.critical.matches(failure.error_type()) {
            if let Some(stats) = &self.statistics {
                stats.increment_critical_bypasses();
            }
            debug!(target: "errflow.chain", error_type = %failure.error_type(), "critical error bypasses handlers");
            return Ok(Outcome::Propagate(failure));
        }

        let Some(handler) = self.handlers.iter().find(|h| h.accept(failure.event())) else {
            return Err(HandlingError::NoAcceptingHandler {
                failure: Box::new(failure),
            });
        };
        debug!(target: "errflow.chain", handler = handler.name(), error_type = %failure.error_type(), "dispatching");
        handler.handle_exception(failure, cancel).await
    }

    /// The handlers, in dispatch order.
    pub fn handlers(&self) -> &[SharedHandler] {
        &self.handlers
    }

    /// Handler names, in dispatch order.
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// The flow this chain belongs to.
    pub fn flow(&self) -> Option<&str> {
        self.flow.as_deref()
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("handlers", &self.handler_names())
            .field("flow", &self.flow)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ErrorHandler`].
pub struct ErrorHandlerBuilder<'a> {
    repo: &'a ErrorTypeRepository,
    handlers: Vec<SharedHandler>,
    flow: Option<String>,
    statistics: Option<Arc<FlowStatistics>>,
}

impl ErrorHandlerBuilder<'_> {
    /// Append a handler.
    #[must_use]
    pub fn listener<H: ExceptionHandlerAcceptor + 'static>(self, handler: H) -> Self {
        self.listener_arc(Arc::new(handler))
    }

    /// Append a shared handler.
    #[must_use]
    pub fn listener_arc(mut self, handler: SharedHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Bind the chain, and its default handler, to a flow.
    #[must_use]
    pub fn flow(mut self, flow: impl Into<String>) -> Self {
        self.flow = Some(flow.into());
        self
    }

    /// Count critical bypasses, and default-handler outcomes, in `statistics`.
    #[must_use]
    pub fn statistics(mut self, statistics: Arc<FlowStatistics>) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Validate and finish.
    ///
    /// A chain whose last handler does not accept everything gets a
    /// propagate catch-all appended.
    ///
    /// # Errors
    ///
    /// [`ChainError::CatchAllNotLast`] if a catch-all precedes another
    /// handler; [`ChainError::Repository`] if the repository lacks the
    /// built-in catalog.
    pub fn build(self) -> Result<ErrorHandler, ChainError> {
        let critical = SingleErrorTypeMatcher::new(BuiltinErrorType::Critical.lookup(self.repo)?);
        let mut handlers = self.handlers;
        let last = handlers.len().saturating_sub(1);
        if let Some((position, h)) = handlers
            .iter()
            .enumerate()
            .find(|(i, h)| *i < last && h.accepts_all())
        {
            return Err(ChainError::CatchAllNotLast {
                name: h.name().to_string(),
                position,
            });
        }
        if !handlers.last().is_some_and(|h| h.accepts_all()) {
            let mut default = OnErrorHandler::propagate_on_error(DEFAULT_HANDLER_NAME).accepts_all(true);
            if let Some(flow) = &self.flow {
                default = default.flow(flow.clone());
            }
            if let Some(stats) = &self.statistics {
                default = default.statistics(Arc::clone(stats));
            }
            handlers.push(Arc::new(default.build()));
        }
        Ok(ErrorHandler {
            handlers,
            critical,
            flow: self.flow,
            statistics: self.statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errflow_mapping::{Exception, classes};
    use errflow_types::bootstrap;

    fn propagate_all(name: &str) -> OnErrorHandler {
        OnErrorHandler::propagate_on_error(name).accepts_all(true).build()
    }

    #[test]
    fn catch_all_must_be_last() {
        let repo = bootstrap();
        let err = ErrorHandler::builder(&repo)
            .listener(propagate_all("first"))
            .listener(OnErrorHandler::continue_on_error("second").build())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::CatchAllNotLast {
                name: "first".into(),
                position: 0
            }
        );
    }

    #[test]
    fn default_catch_all_is_appended() {
        let repo = bootstrap();
        let chain = ErrorHandler::builder(&repo)
            .listener(OnErrorHandler::continue_on_error("c").build())
            .build()
            .unwrap();
        assert_eq!(chain.handler_names(), vec!["c", DEFAULT_HANDLER_NAME]);
        let empty = ErrorHandler::builder(&repo).build().unwrap();
        assert_eq!(empty.handler_names(), vec![DEFAULT_HANDLER_NAME]);
    }

    #[test]
    fn explicit_catch_all_is_kept() {
        let repo = bootstrap();
        let chain = ErrorHandler::with_listeners(&repo, vec![Arc::new(propagate_all("all"))]).unwrap();
        assert_eq!(chain.handler_names(), vec!["all"]);
    }

    #[test]
    fn missing_catalog_is_reported() {
        let repo = ErrorTypeRepository::new();
        assert!(matches!(
            ErrorHandler::builder(&repo).build(),
            Err(ChainError::Repository(_))
        ));
    }

    #[tokio::test]
    async fn critical_bypasses_chain() {
        let repo = bootstrap();
        let stats = Arc::new(FlowStatistics::new());
        let chain = ErrorHandler::builder(&repo)
            .listener(OnErrorHandler::continue_on_error("c").accepts_all(true).build())
            .statistics(Arc::clone(&stats))
            .build()
            .unwrap();
        let failure = FailureRecord::new(
            Exception::new(&classes::RESOURCE_EXHAUSTED, "heap"),
            Event::new("x"),
            BuiltinErrorType::Overload.lookup(&repo).unwrap(),
        );
        let outcome = chain.handle_exception(failure).await.unwrap();
        let failure = outcome.failure().unwrap();
        assert!(!failure.handled());
        assert_eq!(failure.event().error().unwrap().error_type().identifier(), "OVERLOAD");
        assert_eq!(stats.snapshot().critical_bypasses, 1);
        assert_eq!(stats.snapshot().execution_errors, 0);
    }
}
