// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Exception`] cause chain.

use crate::class::{ExceptionClass, classes};
use errflow_types::ErrorType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// A failure raised while processing a message.
///
/// Carries its class, a message, and an optional cause. An exception may
/// also be *typed*: it then knows its own [`ErrorType`] and skips mapper
/// resolution entirely.
#[derive(Clone)]
pub struct Exception {
    class: &'static ExceptionClass,
    message: String,
    source: Option<Box<Exception>>,
    error_type: Option<ErrorType>,
}

impl Exception {
    /// Create an exception of `class`.
    pub fn new(class: &'static ExceptionClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            source: None,
            error_type: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: Exception) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach an explicit classification.
    pub fn typed(mut self, error_type: ErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    /// The exception class.
    pub fn class(&self) -> &'static ExceptionClass {
        self.class
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The direct cause.
    pub fn cause(&self) -> Option<&Exception> {
        self.source.as_deref()
    }

    /// The explicit classification of a typed exception.
    pub fn error_type(&self) -> Option<&ErrorType> {
        self.error_type.as_ref()
    }

    /// The chain, starting with `self`.
    pub fn causes(&self) -> Causes<'_> {
        Causes { next: Some(self) }
    }

    /// The innermost cause, `self` when there is none.
    pub fn root_cause(&self) -> &Exception {
        self.causes().last().unwrap_or(self)
    }

    /// Whether any link is of `class` or a subclass of it.
    pub fn caused_by(&self, class: &ExceptionClass) -> bool {
        self.find_cause(class).is_some()
    }

    /// Whether any link is of exactly `class`.
    pub fn caused_exactly_by(&self, class: &ExceptionClass) -> bool {
        self.causes().any(|e| e.class == class)
    }

    /// Whether any link's `Class: message` text matches `pattern`.
    pub fn caused_by_matching(&self, pattern: &Regex) -> bool {
        self.causes().any(|e| pattern.is_match(&e.to_string()))
    }

    /// The first link of `class` or a subclass of it.
    pub fn find_cause(&self, class: &ExceptionClass) -> Option<&Exception> {
        self.causes().find(|e| e.class.is_a(class))
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class.name(), self.message)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Exception");
        d.field("class", &self.class.name());
        d.field("message", &self.message);
        if let Some(ref t) = self.error_type {
            d.field("error_type", &t.to_string());
        }
        if let Some(ref src) = self.source {
            d.field("source", src);
        }
        d.finish()
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for Exception {
    fn from(err: io::Error) -> Self {
        let class = match err.kind() {
            io::ErrorKind::NotFound => &classes::FILE_NOT_FOUND,
            io::ErrorKind::TimedOut => &classes::TIMEOUT,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => &classes::CONNECT,
            _ => &classes::IO,
        };
        Exception::new(class, err.to_string())
    }
}

/// Iterator returned by [`Exception::causes`].
pub struct Causes<'a> {
    next: Option<&'a Exception>,
}

impl<'a> Iterator for Causes<'a> {
    type Item = &'a Exception;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.cause();
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of an [`Exception`] chain, outermost first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExceptionDto {
    /// Class name of the outermost link.
    pub class: String,
    /// Message of the outermost link.
    pub message: String,
    /// Explicit classification, if typed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Remaining links as `Class: message`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl From<&Exception> for ExceptionDto {
    fn from(e: &Exception) -> Self {
        Self {
            class: e.class.name().to_string(),
            message: e.message.clone(),
            error_type: e.error_type.as_ref().map(ToString::to_string),
            causes: e.causes().skip(1).map(ToString::to_string).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use errflow_types::{BuiltinErrorType, bootstrap};
    use std::error::Error as _;

    fn nested() -> Exception {
        Exception::new(&classes::MESSAGING, "flow failed").with_source(
            Exception::new(&classes::CONNECTION, "pool drained")
                .with_source(Exception::new(&classes::CONNECT, "connection refused")),
        )
    }

    #[test]
    fn causes_start_with_self() {
        let e = nested();
        let classes: Vec<_> = e.causes().map(|c| c.class().name()).collect();
        assert_eq!(
            classes,
            vec!["MessagingException", "ConnectionException", "ConnectException"]
        );
        assert_eq!(e.root_cause().message(), "connection refused");
    }

    #[test]
    fn caused_by_follows_subclasses() {
        let e = nested();
        assert!(e.caused_by(&classes::IO));
        assert!(e.caused_by(&classes::CONNECT));
        assert!(!e.caused_by(&classes::TIMEOUT));
        assert_eq!(
            e.find_cause(&classes::IO).map(|c| c.class()),
            Some(&classes::CONNECTION)
        );
    }

    #[test]
    fn caused_exactly_by_ignores_subclasses() {
        let e = nested();
        assert!(e.caused_exactly_by(&classes::CONNECT));
        assert!(!e.caused_exactly_by(&classes::IO));
    }

    #[test]
    fn caused_by_matching_uses_class_and_message() {
        let e = nested();
        assert!(e.caused_by_matching(&Regex::new(r"^ConnectException: .*refused$").unwrap()));
        assert!(!e.caused_by_matching(&Regex::new("^TimeoutException").unwrap()));
    }

    #[test]
    fn std_error_source_chain() {
        let e = nested();
        let src = e.source().unwrap();
        assert_eq!(src.to_string(), "ConnectionException: pool drained");
        assert!(src.source().is_some());
    }

    #[test]
    fn io_error_conversion() {
        let e: Exception = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(e.class(), &classes::FILE_NOT_FOUND);
        let e: Exception = io::Error::new(io::ErrorKind::ConnectionRefused, "no").into();
        assert_eq!(e.class(), &classes::CONNECT);
        let e: Exception = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert_eq!(e.class(), &classes::TIMEOUT);
        let e: Exception = io::Error::other("x").into();
        assert_eq!(e.class(), &classes::IO);
    }

    #[test]
    fn typed_exception_keeps_its_type() {
        let repo = bootstrap();
        let t = BuiltinErrorType::Security.lookup(&repo).unwrap();
        let e = Exception::new(&classes::EXCEPTION, "denied").typed(t.clone());
        assert_eq!(e.error_type(), Some(&t));
    }

    #[test]
    fn dto_snapshot() {
        let dto = ExceptionDto::from(&nested());
        assert_eq!(dto.class, "MessagingException");
        assert_eq!(dto.causes.len(), 2);
        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("error_type").is_none());
    }
}
