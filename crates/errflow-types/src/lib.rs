// SPDX-License-Identifier: MIT OR Apache-2.0
//! errflow-types
//!
//! Namespaced, hierarchical error types for message processing.
//!
//! Every failure is classified into an [`ErrorType`] identified by a
//! `(namespace, identifier)` pair, e.g. `CORE:CONNECTIVITY` or
//! `HTTP:NOT_FOUND`. Types form two disjoint trees rooted at `CORE:ANY`
//! (recoverable) and `CORE:CRITICAL` (unrecoverable). The
//! [`ErrorTypeRepository`] owns exactly one node per pair, and
//! [`ErrorTypeMatcher`]s decide which handler owns a failure.
//!
//! ```
//! use errflow_types::{BuiltinErrorType, ErrorTypeMatcher, SingleErrorTypeMatcher, bootstrap};
//!
//! let repo = bootstrap();
//! let connectivity = BuiltinErrorType::Connectivity.lookup(&repo).unwrap();
//! let retry = BuiltinErrorType::RetryExhausted.lookup(&repo).unwrap();
//! assert!(SingleErrorTypeMatcher::new(connectivity).matches(&retry));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// The built-in `CORE` catalog.
pub mod catalog;
/// The error type node.
pub mod error_type;
/// `NS:NAME` identifiers.
pub mod identifier;
/// Error type matchers and matcher expressions.
pub mod matcher;
/// The error type registry.
pub mod repository;

pub use catalog::{BuiltinErrorType, bootstrap, register_catalog};
pub use error_type::{ANY_IDENTIFIER, Ancestors, CRITICAL_IDENTIFIER, ErrorType};
pub use identifier::{CORE_NAMESPACE, ComponentIdentifier, IdentifierError, WILDCARD_TOKEN};
pub use matcher::{
    DisjunctiveErrorTypeMatcher, ErrorTypeMatcher, MatcherError, SharedMatcher,
    SingleErrorTypeMatcher, WildcardErrorTypeMatcher, parse_matcher, parse_matcher_lazy,
};
pub use repository::{ErrorTypeRepository, RepositoryError};
