// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`ErrorType`] node.

use crate::identifier::{CORE_NAMESPACE, ComponentIdentifier};
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identifier of the root of the recoverable hierarchy.
pub const ANY_IDENTIFIER: &str = "ANY";

/// Identifier of the root of the unrecoverable hierarchy.
pub const CRITICAL_IDENTIFIER: &str = "CRITICAL";

/// An immutable node in the namespaced error hierarchy.
///
/// Only an [`ErrorTypeRepository`](crate::ErrorTypeRepository) creates
/// instances, which keeps one node per `(namespace, identifier)` pair.
/// Equality and hashing look at that pair only. Clones share the node.
#[derive(Clone)]
pub struct ErrorType {
    inner: Arc<Node>,
}

struct Node {
    id: ComponentIdentifier,
    parent: Option<ErrorType>,
}

impl ErrorType {
    pub(crate) fn new(id: ComponentIdentifier, parent: Option<ErrorType>) -> Self {
        Self {
            inner: Arc::new(Node { id, parent }),
        }
    }

    /// Namespace, e.g. `CORE` or `HTTP`.
    pub fn namespace(&self) -> &str {
        self.inner.id.namespace()
    }

    /// Identifier within the namespace, e.g. `CONNECTIVITY`.
    pub fn identifier(&self) -> &str {
        self.inner.id.name()
    }

    /// The `(namespace, identifier)` key.
    pub fn component_identifier(&self) -> &ComponentIdentifier {
        &self.inner.id
    }

    /// Direct parent, `None` for the two roots (ANY and CRITICAL) and for
    /// orphan types.
    pub fn parent(&self) -> Option<&ErrorType> {
        self.inner.parent.as_ref()
    }

    /// Ancestors, nearest first. `self` is not included.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            next: self.parent(),
        }
    }

    /// The topmost ancestor, or `self` when there is no parent.
    pub fn root(&self) -> &ErrorType {
        self.ancestors().last().unwrap_or(self)
    }

    /// Whether `other` is a strict ancestor of `self`.
    pub fn is_descendant_of(&self, other: &ErrorType) -> bool {
        self.ancestors().any(|a| a == other)
    }

    /// Whether this is `CORE:ANY`.
    pub fn is_any(&self) -> bool {
        self.namespace() == CORE_NAMESPACE && self.identifier() == ANY_IDENTIFIER
    }

    /// Whether this is `CORE:CRITICAL`.
    pub fn is_critical(&self) -> bool {
        self.namespace() == CORE_NAMESPACE && self.identifier() == CRITICAL_IDENTIFIER
    }

    /// Whether two handles point to the same registered node.
    pub fn same_instance(&self, other: &ErrorType) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for ErrorType {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ErrorType {}

impl Hash for ErrorType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.id, f)
    }
}

impl fmt::Debug for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ErrorType");
        d.field("id", &self.inner.id.to_string());
        if let Some(parent) = self.parent() {
            d.field("parent", &parent.to_string());
        }
        d.finish()
    }
}

impl Serialize for ErrorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Iterator returned by [`ErrorType::ancestors`].
pub struct Ancestors<'a> {
    next: Option<&'a ErrorType>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ErrorType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}
