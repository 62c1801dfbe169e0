// SPDX-License-Identifier: MIT OR Apache-2.0
//! The fixed catalog of core error types registered at startup.

use crate::error_type::ErrorType;
use crate::identifier::ComponentIdentifier;
use crate::repository::{ErrorTypeRepository, RepositoryError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// BuiltinErrorType
// ---------------------------------------------------------------------------

/// Core error types every deployment starts with.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` identifier in the
/// `CORE` namespace that is guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuiltinErrorType {
    /// Root of every recoverable error.
    Any,
    /// Root of the unrecoverable hierarchy.
    Critical,

    // -- children of ANY --
    /// A value could not be converted between representations.
    Transformation,
    /// An expression failed to evaluate.
    Expression,
    /// A router could not dispatch the message.
    Routing,
    /// One or more routes of a scatter-style router failed.
    CompositeRouting,
    /// A remote endpoint could not be reached.
    Connectivity,
    /// Reconnection attempts were exhausted.
    RetryExhausted,
    /// A message was redelivered more times than allowed.
    RedeliveryExhausted,
    /// A security constraint failed.
    Security,
    /// The caller could not be authenticated or authorised.
    ClientSecurity,
    /// The server rejected its own credentials or policy.
    ServerSecurity,
    /// An operation did not complete in time.
    Timeout,
    /// A stream grew beyond its configured limit.
    StreamMaximumSizeExceeded,
    /// Message content failed validation.
    Validation,
    /// A message was already processed.
    DuplicateMessage,
    /// No classification rule matched.
    Unknown,

    // -- children of CRITICAL --
    /// The runtime ran out of a resource (memory, threads, queue capacity).
    Overload,
    /// The runtime itself is in an inconsistent state.
    Fatal,
}

impl BuiltinErrorType {
    /// Every variant, parents before children.
    pub const ALL: &'static [BuiltinErrorType] = &[
        Self::Any,
        Self::Critical,
        Self::Transformation,
        Self::Expression,
        Self::Routing,
        Self::CompositeRouting,
        Self::Connectivity,
        Self::RetryExhausted,
        Self::RedeliveryExhausted,
        Self::Security,
        Self::ClientSecurity,
        Self::ServerSecurity,
        Self::Timeout,
        Self::StreamMaximumSizeExceeded,
        Self::Validation,
        Self::DuplicateMessage,
        Self::Unknown,
        Self::Overload,
        Self::Fatal,
    ];

    /// Stable identifier within the `CORE` namespace.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::Critical => "CRITICAL",
            Self::Transformation => "TRANSFORMATION",
            Self::Expression => "EXPRESSION",
            Self::Routing => "ROUTING",
            Self::CompositeRouting => "COMPOSITE_ROUTING",
            Self::Connectivity => "CONNECTIVITY",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
            Self::RedeliveryExhausted => "REDELIVERY_EXHAUSTED",
            Self::Security => "SECURITY",
            Self::ClientSecurity => "CLIENT_SECURITY",
            Self::ServerSecurity => "SERVER_SECURITY",
            Self::Timeout => "TIMEOUT",
            Self::StreamMaximumSizeExceeded => "STREAM_MAXIMUM_SIZE_EXCEEDED",
            Self::Validation => "VALIDATION",
            Self::DuplicateMessage => "DUPLICATE_MESSAGE",
            Self::Unknown => "UNKNOWN",
            Self::Overload => "OVERLOAD",
            Self::Fatal => "FATAL",
        }
    }

    /// Parent in the catalog; `None` for the two roots.
    pub fn parent(&self) -> Option<BuiltinErrorType> {
        match self {
            Self::Any | Self::Critical => None,
            Self::CompositeRouting => Some(Self::Routing),
            Self::RetryExhausted => Some(Self::Connectivity),
            Self::ClientSecurity | Self::ServerSecurity => Some(Self::Security),
            Self::DuplicateMessage => Some(Self::Validation),
            Self::Overload | Self::Fatal => Some(Self::Critical),
            Self::Transformation
            | Self::Expression
            | Self::Routing
            | Self::Connectivity
            | Self::RedeliveryExhausted
            | Self::Security
            | Self::Timeout
            | Self::StreamMaximumSizeExceeded
            | Self::Validation
            | Self::Unknown => Some(Self::Any),
        }
    }

    /// `CORE:<as_str>`.
    pub fn identifier(&self) -> ComponentIdentifier {
        ComponentIdentifier::core(self.as_str())
    }

    /// Resolve this variant in `repo`.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Unknown`] if `repo` was not produced by
    /// [`bootstrap`].
    pub fn lookup(&self, repo: &ErrorTypeRepository) -> Result<ErrorType, RepositoryError> {
        repo.lookup_error_type(&self.identifier())
    }
}

impl fmt::Display for BuiltinErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Build a repository holding the full built-in catalog.
pub fn bootstrap() -> ErrorTypeRepository {
    let mut repo = ErrorTypeRepository::new();
    register_catalog(&mut repo).unwrap_or_else(|e| unreachable!("built-in catalog is consistent: {e}"));
    repo
}

/// Register the built-in catalog into an existing repository, e.g. one that
/// already carries connector-specific types.
///
/// # Errors
///
/// [`RepositoryError::Duplicate`] if any built-in type is already present.
pub fn register_catalog(repo: &mut ErrorTypeRepository) -> Result<(), RepositoryError> {
    for builtin in BuiltinErrorType::ALL {
        let Some(parent) = builtin.parent() else {
            continue;
        };
        let parent = parent.lookup(repo)?;
        repo.add_error_type(builtin.identifier(), &parent)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
