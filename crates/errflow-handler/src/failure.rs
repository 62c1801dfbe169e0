// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`FailureRecord`] bound to a failing unit of work.

use crate::event::{ErrorInfo, Event};
use errflow_mapping::{Component, ErrorTypeLocator, Exception, ExceptionClass, classify};
use errflow_types::ErrorType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Upper bound, in characters, of [`FailureRecord::message_summary`].
pub const MESSAGE_SUMMARY_LIMIT: usize = 256;

/// What kind of failure a record carries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Any failure raised by processing.
    #[default]
    Ordinary,
    /// A message went over its redelivery budget.
    RedeliveryExhausted {
        /// Identity of the message.
        message_id: String,
        /// Delivery attempt that went over the budget.
        redelivery_count: u32,
        /// Configured budget.
        max_redelivery: u32,
    },
}

/// A classified failure bound to the unit of work it interrupted.
///
/// State changes are consuming builders; each returns the updated record.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    cause: Exception,
    event: Event,
    failing_component: Option<Component>,
    error_type: ErrorType,
    kind: FailureKind,
    handled: bool,
    causes_rollback: bool,
    message_summary: String,
    info: BTreeMap<String, Value>,
}

impl FailureRecord {
    /// Bind `cause`, already classified as `error_type`, to `event`.
    pub fn new(cause: Exception, event: Event, error_type: ErrorType) -> Self {
        let message_summary = summarize(&event);
        Self {
            cause,
            event,
            failing_component: None,
            error_type,
            kind: FailureKind::Ordinary,
            handled: false,
            causes_rollback: false,
            message_summary,
            info: BTreeMap::new(),
        }
    }

    /// Classify `cause` with `locator` and bind it to `event`.
    pub fn classify(
        cause: Exception,
        event: Event,
        component: Option<Component>,
        locator: &ErrorTypeLocator,
    ) -> Self {
        let error_type = classify(component.as_ref(), &cause, locator);
        let record = Self::new(cause, event, error_type);
        match component {
            Some(c) => record.with_component(c),
            None => record,
        }
    }

    /// Record the component the failure came from.
    #[must_use]
    pub fn with_component(mut self, component: Component) -> Self {
        self.failing_component = Some(component);
        self
    }

    /// Set the failure kind.
    #[must_use]
    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = kind;
        self
    }

    /// Flag the failure as handled so the caller does not re-raise it.
    #[must_use]
    pub fn mark_handled(mut self) -> Self {
        self.handled = true;
        self
    }

    /// Flag that handling rolled back the transaction.
    #[must_use]
    pub fn mark_rollback(mut self) -> Self {
        self.causes_rollback = true;
        self
    }

    /// Re-bind to another unit of work and refresh the message summary.
    #[must_use]
    pub fn with_event(mut self, event: Event) -> Self {
        self.message_summary = summarize(&event);
        self.event = event;
        self
    }

    /// Attach diagnostic information.
    #[must_use]
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    /// The raised exception.
    pub fn cause(&self) -> &Exception {
        &self.cause
    }

    /// The unit of work.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Take the unit of work.
    pub fn into_event(self) -> Event {
        self.event
    }

    /// The failing component, if known.
    pub fn failing_component(&self) -> Option<&Component> {
        self.failing_component.as_ref()
    }

    /// The classification.
    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }

    /// The failure kind.
    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }

    /// Whether this is a redelivery-exhausted signal.
    pub fn is_redelivery_exhausted(&self) -> bool {
        matches!(self.kind, FailureKind::RedeliveryExhausted { .. })
    }

    /// Whether the failure was handled.
    pub fn handled(&self) -> bool {
        self.handled
    }

    /// Whether handling rolled back the transaction.
    pub fn causes_rollback(&self) -> bool {
        self.causes_rollback
    }

    /// Bounded preview of the payload at the time of binding.
    pub fn message_summary(&self) -> &str {
        &self.message_summary
    }

    /// Diagnostic information.
    pub fn info(&self) -> &BTreeMap<String, Value> {
        &self.info
    }

    /// Error metadata to bind to the unit of work.
    pub fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.error_type.clone(), self.cause.clone()).with_kind(self.kind.clone())
    }

    /// Whether any cause is of `class` or a subclass.
    pub fn caused_by(&self, class: &ExceptionClass) -> bool {
        self.cause.caused_by(class)
    }

    /// Whether any cause is of exactly `class`.
    pub fn caused_exactly_by(&self, class: &ExceptionClass) -> bool {
        self.cause.caused_exactly_by(class)
    }

    /// Whether any cause's `Class: message` text matches `pattern`.
    pub fn caused_by_matching(&self, pattern: &Regex) -> bool {
        self.cause.caused_by_matching(pattern)
    }

    /// The innermost cause.
    pub fn root_cause(&self) -> &Exception {
        self.cause.root_cause()
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.cause)
    }
}

impl std::error::Error for FailureRecord {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

fn summarize(event: &Event) -> String {
    let rendered = match &event.message().payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match rendered.char_indices().nth(MESSAGE_SUMMARY_LIMIT) {
        Some((cut, _)) => format!("{}...", &rendered[..cut]),
        None => rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errflow_mapping::{classes, default_locator};
    use errflow_types::{BuiltinErrorType, ComponentIdentifier, bootstrap};

    fn record(payload: Value) -> FailureRecord {
        let repo = bootstrap();
        FailureRecord::new(
            Exception::new(&classes::TIMEOUT, "slow"),
            Event::new(payload),
            BuiltinErrorType::Timeout.lookup(&repo).unwrap(),
        )
    }

    #[test]
    fn new_record_is_unhandled() {
        let r = record(Value::from("x"));
        assert!(!r.handled());
        assert!(!r.causes_rollback());
        assert_eq!(r.kind(), &FailureKind::Ordinary);
        assert_eq!(r.to_string(), "CORE:TIMEOUT: TimeoutException: slow");
    }

    #[test]
    fn flags_are_sticky() {
        let r = record(Value::Null).mark_handled().mark_rollback();
        assert!(r.handled());
        assert!(r.causes_rollback());
        let r = r.with_info("attempt", 2);
        assert!(r.handled());
        assert_eq!(r.info()["attempt"], 2);
    }

    #[test]
    fn summary_is_bounded_and_refreshed() {
        let long = "é".repeat(MESSAGE_SUMMARY_LIMIT + 10);
        let r = record(Value::from(long));
        assert_eq!(r.message_summary().chars().count(), MESSAGE_SUMMARY_LIMIT + 3);
        assert!(r.message_summary().ends_with("..."));

        let r = r.with_event(Event::new(serde_json::json!({"a": 1})));
        assert_eq!(r.message_summary(), r#"{"a":1}"#);
    }

    #[test]
    fn classify_records_component() {
        let repo = bootstrap();
        let locator = default_locator(&repo).unwrap();
        let component = Component::new(ComponentIdentifier::new("HTTP", "request"));
        let r = FailureRecord::classify(
            Exception::new(&classes::CONNECT, "refused"),
            Event::new("x"),
            Some(component),
            &locator,
        );
        assert_eq!(r.error_type().identifier(), "CONNECTIVITY");
        assert_eq!(
            r.failing_component().map(|c| c.identifier().to_string()),
            Some("HTTP:request".to_string())
        );
    }

    #[test]
    fn error_info_carries_kind() {
        let kind = FailureKind::RedeliveryExhausted {
            message_id: "m".into(),
            redelivery_count: 4,
            max_redelivery: 3,
        };
        let r = record(Value::Null).with_kind(kind.clone());
        assert!(r.is_redelivery_exhausted());
        let info = r.error_info();
        assert!(info.is_redelivery_exhausted());
        assert_eq!(info.kind(), &kind);
    }

    #[test]
    fn kind_serialises_tagged() {
        let kind = FailureKind::RedeliveryExhausted {
            message_id: "m".into(),
            redelivery_count: 4,
            max_redelivery: 3,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "redelivery_exhausted");
        assert_eq!(json["redelivery_count"], 4);
    }

    #[test]
    fn cause_chain_search() {
        let repo = bootstrap();
        let r = FailureRecord::new(
            Exception::new(&classes::MESSAGING, "wrapped")
                .with_source(Exception::new(&classes::FILE_NOT_FOUND, "/tmp/x")),
            Event::new("x"),
            BuiltinErrorType::Unknown.lookup(&repo).unwrap(),
        );
        assert!(r.caused_by(&classes::IO));
        assert!(!r.caused_exactly_by(&classes::IO));
        assert!(r.caused_by_matching(&Regex::new("/tmp/x").unwrap()));
        assert_eq!(r.root_cause().message(), "/tmp/x");
    }
}
