// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recovery processors.
//!
//! A [`ProcessorChain`] runs zero or more [`Processor`]s over an event in
//! insertion order; the first failure short-circuits the rest.

use crate::event::Event;
use async_trait::async_trait;
use errflow_mapping::Exception;
use std::sync::Arc;
use tracing::debug;

/// A single step applied to a unit of work.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Process the event, returning the (possibly new) event.
    async fn process(&self, event: Event) -> Result<Event, Exception>;

    /// Name used in logs and failure reports.
    fn name(&self) -> &str;
}

/// A processor failed inside a chain.
#[derive(Debug, Clone, thiserror::Error)]
#[error("processor '{processor}' failed: {exception}")]
pub struct ProcessorFailure {
    /// Name of the failing processor.
    pub processor: String,
    /// What it raised.
    #[source]
    pub exception: Exception,
}

/// An ordered chain of processors.
#[derive(Clone, Default)]
pub struct ProcessorChain {
    processors: Vec<Arc<dyn Processor>>,
}

impl ProcessorChain {
    /// An empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a processor (builder pattern).
    #[must_use]
    pub fn processor<P: Processor + 'static>(mut self, processor: P) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Append a shared processor.
    pub fn push(&mut self, processor: Arc<dyn Processor>) {
        self.processors.push(processor);
    }

    /// Run every processor in order.
    ///
    /// # Errors
    ///
    /// The first [`ProcessorFailure`]; later processors do not run.
    pub async fn execute(&self, mut event: Event) -> Result<Event, ProcessorFailure> {
        for processor in &self.processors {
            debug!(target: "errflow.processor", processor = %processor.name(), event_id = %event.id(), "executing");
            event = processor
                .process(event)
                .await
                .map_err(|exception| ProcessorFailure {
                    processor: processor.name().to_string(),
                    exception,
                })?;
        }
        Ok(event)
    }

    /// Number of processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Processor names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errflow_mapping::classes;
    use serde_json::json;

    struct SetVar(&'static str);

    #[async_trait]
    impl Processor for SetVar {
        async fn process(&self, event: Event) -> Result<Event, Exception> {
            Ok(event.with_variable(self.0, true))
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    struct Fail;

    #[async_trait]
    impl Processor for Fail {
        async fn process(&self, _event: Event) -> Result<Event, Exception> {
            Err(Exception::new(&classes::ROUTING, "dead letter queue down"))
        }
        fn name(&self) -> &str {
            "fail"
        }
    }

    #[tokio::test]
    async fn runs_in_order() {
        let chain = ProcessorChain::new().processor(SetVar("a")).processor(SetVar("b"));
        let event = chain.execute(Event::new("x")).await.unwrap();
        assert_eq!(event.variable("a"), Some(&json!(true)));
        assert_eq!(event.variable("b"), Some(&json!(true)));
        assert_eq!(chain.names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failure_short_circuits() {
        let chain = ProcessorChain::new()
            .processor(SetVar("a"))
            .processor(Fail)
            .processor(SetVar("c"));
        let err = chain.execute(Event::new("x")).await.unwrap_err();
        assert_eq!(err.processor, "fail");
        assert_eq!(
            err.to_string(),
            "processor 'fail' failed: RoutingException: dead letter queue down"
        );
    }

    #[tokio::test]
    async fn empty_chain_is_identity() {
        let event = Event::new("x");
        let id = event.id();
        let out = ProcessorChain::new().execute(event).await.unwrap();
        assert_eq!(out.id(), id);
    }
}
