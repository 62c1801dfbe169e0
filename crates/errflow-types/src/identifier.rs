// SPDX-License-Identifier: MIT OR Apache-2.0
//! Namespaced identifiers (`NS:NAME`) for error types and components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace used when an identifier is written without one.
pub const CORE_NAMESPACE: &str = "CORE";

/// Token that stands for "any namespace" or "any name" in matcher expressions.
pub const WILDCARD_TOKEN: &str = "*";

/// Failure to parse a `NS:NAME` string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The input was empty or whitespace.
    #[error("identifier must not be empty")]
    Empty,
    /// One half of `NS:NAME` was empty, or there were too many separators.
    #[error("malformed identifier '{0}', expected NAMESPACE:NAME")]
    Malformed(String),
}

/// A `(namespace, name)` pair.
///
/// Used as the interned key of an [`ErrorType`](crate::ErrorType) and as the
/// identity of the component that raised a failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentIdentifier {
    namespace: String,
    name: String,
}

impl ComponentIdentifier {
    /// Build an identifier from its two halves, verbatim.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build an identifier in the [`CORE_NAMESPACE`].
    pub fn core(name: impl Into<String>) -> Self {
        Self::new(CORE_NAMESPACE, name)
    }

    /// Parse `NS:NAME`, or `NAME` (core namespace). The namespace is
    /// upper-cased; the name is kept as written.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IdentifierError::Empty);
        }
        let mut parts = input.split(':');
        let first = parts.next().unwrap_or_default().trim();
        match (parts.next(), parts.next()) {
            (None, _) => Ok(Self::core(first)),
            (Some(name), None) => {
                let name = name.trim();
                if first.is_empty() || name.is_empty() {
                    return Err(IdentifierError::Malformed(input.to_string()));
                }
                Ok(Self::new(first.to_uppercase(), name))
            }
            (Some(_), Some(_)) => Err(IdentifierError::Malformed(input.to_string())),
        }
    }

    /// The namespace half.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The name half.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether either half is the [`WILDCARD_TOKEN`].
    pub fn has_wildcard(&self) -> bool {
        self.namespace == WILDCARD_TOKEN || self.name == WILDCARD_TOKEN
    }
}

impl fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

impl FromStr for ComponentIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ComponentIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ComponentIdentifier> for String {
    fn from(id: ComponentIdentifier) -> Self {
        id.to_string()
    }
}
