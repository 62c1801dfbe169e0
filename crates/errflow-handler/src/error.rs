// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by the handling core itself.

use crate::failure::FailureRecord;
use errflow_types::RepositoryError;
use thiserror::Error;

/// Runtime errors of [`ErrorHandler`](crate::ErrorHandler) dispatch.
///
/// Both variants hand the failure back so the caller never loses it.
#[derive(Debug, Error)]
pub enum HandlingError {
    /// No handler in the chain accepted the failure.
    #[error("no exception handler accepted error type '{}'", .failure.error_type())]
    NoAcceptingHandler {
        /// The unhandled failure.
        failure: Box<FailureRecord>,
    },

    /// Recovery routing was cancelled.
    #[error("error handler '{handler}' was cancelled while routing")]
    Cancelled {
        /// Handler that was routing.
        handler: String,
        /// The failure being handled.
        failure: Box<FailureRecord>,
    },
}

impl HandlingError {
    /// The failure carried by the error.
    pub fn failure(&self) -> &FailureRecord {
        match self {
            Self::NoAcceptingHandler { failure } | Self::Cancelled { failure, .. } => failure,
        }
    }

    /// Take the failure carried by the error.
    pub fn into_failure(self) -> FailureRecord {
        match self {
            Self::NoAcceptingHandler { failure } | Self::Cancelled { failure, .. } => *failure,
        }
    }
}

/// Defects in the shape of a handler chain, detected at build time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// A catch-all handler is followed by other handlers.
    #[error("handler '{name}' at position {position} accepts all errors but is not the last handler")]
    CatchAllNotLast {
        /// Name of the offending handler.
        name: String,
        /// Zero-based position in the chain.
        position: usize,
    },

    /// The repository lacks the built-in catalog.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
