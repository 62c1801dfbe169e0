// SPDX-License-Identifier: MIT OR Apache-2.0
//! Statically declared exception classes.
//!
//! Each failure carries an [`ExceptionClass`]; classes form a single-parent
//! tree rooted at [`classes::THROWABLE`]. Mapping rules are keyed on classes
//! and apply to every subclass, so connectors declare their own classes as
//! `static` items parented on the built-ins:
//!
//! ```
//! use errflow_mapping::{ExceptionClass, classes};
//!
//! static HTTP_STATUS: ExceptionClass = ExceptionClass::new("HttpStatus", Some(&classes::IO));
//! assert!(HTTP_STATUS.is_a(&classes::EXCEPTION));
//! ```

use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A node in the exception class tree.
#[derive(Clone, Copy)]
pub struct ExceptionClass {
    name: &'static str,
    parent: Option<&'static ExceptionClass>,
}

impl ExceptionClass {
    /// Declare a class.
    pub const fn new(name: &'static str, parent: Option<&'static ExceptionClass>) -> Self {
        Self { name, parent }
    }

    /// Class name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Direct superclass.
    pub fn parent(&self) -> Option<&'static ExceptionClass> {
        self.parent
    }

    /// Whether `self` is `other` or one of its subclasses.
    pub fn is_a(&self, other: &ExceptionClass) -> bool {
        if self == other {
            return true;
        }
        let mut current = self.parent;
        while let Some(class) = current {
            if class == other {
                return true;
            }
            current = class.parent;
        }
        false
    }

    /// Number of superclasses; the root has depth 0.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent;
        while let Some(class) = current {
            depth += 1;
            current = class.parent;
        }
        depth
    }
}

impl PartialEq for ExceptionClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ExceptionClass {}

impl Hash for ExceptionClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for ExceptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Debug for ExceptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExceptionClass({})", self.name)
    }
}

impl Serialize for ExceptionClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

/// Built-in classes.
pub mod classes {
    use super::ExceptionClass;

    /// Root of every failure.
    pub static THROWABLE: ExceptionClass = ExceptionClass::new("Throwable", None);

    /// Recoverable failures.
    pub static EXCEPTION: ExceptionClass = ExceptionClass::new("Exception", Some(&THROWABLE));
    /// I/O failures.
    pub static IO: ExceptionClass = ExceptionClass::new("IoException", Some(&EXCEPTION));
    /// A file or resource was not found.
    pub static FILE_NOT_FOUND: ExceptionClass =
        ExceptionClass::new("FileNotFoundException", Some(&IO));
    /// A connection-level I/O failure.
    pub static CONNECTION: ExceptionClass = ExceptionClass::new("ConnectionException", Some(&IO));
    /// A connection could not be established.
    pub static CONNECT: ExceptionClass = ExceptionClass::new("ConnectException", Some(&CONNECTION));
    /// Value conversion failed.
    pub static TRANSFORMATION: ExceptionClass =
        ExceptionClass::new("TransformationException", Some(&EXCEPTION));
    /// Expression evaluation failed.
    pub static EXPRESSION: ExceptionClass =
        ExceptionClass::new("ExpressionException", Some(&EXCEPTION));
    /// A router failed to dispatch.
    pub static ROUTING: ExceptionClass = ExceptionClass::new("RoutingException", Some(&EXCEPTION));
    /// A security check failed.
    pub static SECURITY: ExceptionClass =
        ExceptionClass::new("SecurityException", Some(&EXCEPTION));
    /// An operation timed out.
    pub static TIMEOUT: ExceptionClass = ExceptionClass::new("TimeoutException", Some(&EXCEPTION));
    /// Reconnection attempts were exhausted.
    pub static RETRY_EXHAUSTED: ExceptionClass =
        ExceptionClass::new("RetryPolicyExhaustedException", Some(&EXCEPTION));
    /// A message was redelivered too many times.
    pub static MESSAGE_REDELIVERED: ExceptionClass =
        ExceptionClass::new("MessageRedeliveredException", Some(&EXCEPTION));
    /// Message content failed validation.
    pub static VALIDATION: ExceptionClass =
        ExceptionClass::new("ValidationException", Some(&EXCEPTION));
    /// Generic messaging failure raised by processors.
    pub static MESSAGING: ExceptionClass =
        ExceptionClass::new("MessagingException", Some(&EXCEPTION));

    /// Unrecoverable failures.
    pub static FATAL_ERROR: ExceptionClass = ExceptionClass::new("Error", Some(&THROWABLE));
    /// A resource such as memory ran out.
    pub static RESOURCE_EXHAUSTED: ExceptionClass =
        ExceptionClass::new("ResourceExhaustedError", Some(&FATAL_ERROR));

    /// Every built-in class, parents before children.
    pub static ALL: &[&ExceptionClass] = &[
        &THROWABLE,
        &EXCEPTION,
        &IO,
        &FILE_NOT_FOUND,
        &CONNECTION,
        &CONNECT,
        &TRANSFORMATION,
        &EXPRESSION,
        &ROUTING,
        &SECURITY,
        &TIMEOUT,
        &RETRY_EXHAUSTED,
        &MESSAGE_REDELIVERED,
        &VALIDATION,
        &MESSAGING,
        &FATAL_ERROR,
        &RESOURCE_EXHAUSTED,
    ];

    /// Find a built-in class by name.
    pub fn by_name(name: &str) -> Option<&'static ExceptionClass> {
        ALL.iter().copied().find(|c| c.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::classes::*;
    use super::*;

    static CUSTOM: ExceptionClass = ExceptionClass::new("Custom", Some(&CONNECT));

    #[test]
    fn is_a_is_reflexive_and_transitive() {
        assert!(CONNECT.is_a(&CONNECT));
        assert!(CONNECT.is_a(&IO));
        assert!(CUSTOM.is_a(&THROWABLE));
        assert!(!IO.is_a(&CONNECT));
        assert!(!RESOURCE_EXHAUSTED.is_a(&EXCEPTION));
    }

    #[test]
    fn depth_counts_superclasses() {
        assert_eq!(THROWABLE.depth(), 0);
        assert_eq!(EXCEPTION.depth(), 1);
        assert_eq!(CONNECT.depth(), 4);
        assert_eq!(CUSTOM.depth(), 5);
    }

    #[test]
    fn all_is_topologically_ordered() {
        for (i, class) in ALL.iter().enumerate() {
            if let Some(parent) = class.parent() {
                assert!(ALL[..i].contains(&parent), "{class} before {parent}");
            }
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(by_name("TimeoutException"), Some(&TIMEOUT));
        assert!(by_name("Nope").is_none());
    }
}
