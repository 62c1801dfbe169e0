// SPDX-License-Identifier: MIT OR Apache-2.0
//! Predicates over [`ErrorType`]s.
//!
//! Matching is structural: a matcher configured for a type accepts that type
//! and its descendants, but never climbs past `CORE:ANY`. Only a matcher
//! configured for ANY itself accepts the whole recoverable tree, and nothing
//! in the CRITICAL tree is ever accepted by it.

use crate::error_type::ErrorType;
use crate::identifier::{ComponentIdentifier, IdentifierError, WILDCARD_TOKEN};
use crate::repository::ErrorTypeRepository;
use std::fmt::Debug;
use std::sync::Arc;

/// Decides whether an error type belongs to a configured set.
pub trait ErrorTypeMatcher: Debug + Send + Sync {
    /// Whether `error_type` is accepted.
    fn matches(&self, error_type: &ErrorType) -> bool;
}

/// Shared, type-erased matcher as stored by handlers.
pub type SharedMatcher = Arc<dyn ErrorTypeMatcher>;

// ---------------------------------------------------------------------------
// Single
// ---------------------------------------------------------------------------

/// Matches one configured type and its descendants.
#[derive(Debug, Clone)]
pub struct SingleErrorTypeMatcher {
    error_type: ErrorType,
}

impl SingleErrorTypeMatcher {
    /// Matcher for `error_type`.
    pub fn new(error_type: ErrorType) -> Self {
        Self { error_type }
    }

    /// The configured type.
    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }
}

impl ErrorTypeMatcher for SingleErrorTypeMatcher {
    fn matches(&self, error_type: &ErrorType) -> bool {
        if self.error_type.is_any() {
            return error_type.root().is_any();
        }
        let mut candidate = error_type;
        loop {
            if *candidate == self.error_type {
                return true;
            }
            match candidate.parent() {
                Some(parent) if !parent.is_any() => candidate = parent,
                _ => return false,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wildcard
// ---------------------------------------------------------------------------

/// Matches by namespace (`NS:*`), by identifier (`*:ID`), or the whole
/// recoverable tree (`*:*`).
///
/// A candidate matches when it, or one of its ancestors below ANY, fits the
/// pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardErrorTypeMatcher {
    namespace: Option<String>,
    identifier: Option<String>,
}

impl WildcardErrorTypeMatcher {
    /// Build from a pattern whose halves may be `*`.
    pub fn new(pattern: &ComponentIdentifier) -> Self {
        let half = |s: &str| (s != WILDCARD_TOKEN).then(|| s.to_string());
        Self {
            namespace: half(pattern.namespace()),
            identifier: half(pattern.name()),
        }
    }

    fn fits(&self, error_type: &ErrorType) -> bool {
        self.namespace
            .as_deref()
            .is_none_or(|ns| ns == error_type.namespace())
            && self
                .identifier
                .as_deref()
                .is_none_or(|id| id == error_type.identifier())
    }
}

impl ErrorTypeMatcher for WildcardErrorTypeMatcher {
    fn matches(&self, error_type: &ErrorType) -> bool {
        if !error_type.root().is_any() {
            return false;
        }
        if self.namespace.is_none() && self.identifier.is_none() {
            return true;
        }
        std::iter::once(error_type)
            .chain(error_type.ancestors())
            .take_while(|t| !t.is_any())
            .any(|t| self.fits(t))
    }
}

// ---------------------------------------------------------------------------
// Disjunctive
// ---------------------------------------------------------------------------

/// Matches when any of its children matches.
#[derive(Debug, Clone, Default)]
pub struct DisjunctiveErrorTypeMatcher {
    matchers: Vec<SharedMatcher>,
}

impl DisjunctiveErrorTypeMatcher {
    /// Any-of over `matchers`. An empty list matches nothing.
    pub fn new(matchers: Vec<SharedMatcher>) -> Self {
        Self { matchers }
    }

    /// Number of child matchers.
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Whether there are no child matchers.
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl ErrorTypeMatcher for DisjunctiveErrorTypeMatcher {
    fn matches(&self, error_type: &ErrorType) -> bool {
        self.matchers.iter().any(|m| m.matches(error_type))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Errors from [`parse_matcher`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatcherError {
    /// An entry was not a valid identifier.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    /// A plain entry named a type that is not registered.
    #[error("could not find error type '{0}'")]
    UnknownErrorType(ComponentIdentifier),
    /// The expression held no entries.
    #[error("error type expression is empty")]
    Empty,
}

/// Parse a comma-separated list such as `"HTTP:NOT_FOUND, DB:*"`.
///
/// Entries containing `*` become wildcard matchers; other entries must be
/// registered in `repo`. A single entry yields that matcher directly, more
/// than one yields a disjunction.
///
/// # Errors
///
/// [`MatcherError`] on an empty expression, a malformed entry, or an
/// unregistered type.
pub fn parse_matcher(repo: &ErrorTypeRepository, expr: &str) -> Result<SharedMatcher, MatcherError> {
    build_matcher(expr, |id| {
        repo.get_error_type(id)
            .ok_or_else(|| MatcherError::UnknownErrorType(id.clone()))
    })
}

/// Like [`parse_matcher`], but unregistered plain entries are created as
/// children of ANY.
///
/// # Errors
///
/// [`MatcherError`] on an empty expression or a malformed entry.
pub fn parse_matcher_lazy(
    repo: &mut ErrorTypeRepository,
    expr: &str,
) -> Result<SharedMatcher, MatcherError> {
    build_matcher(expr, |id| Ok(repo.lookup_or_add(id)))
}

fn build_matcher(
    expr: &str,
    mut resolve: impl FnMut(&ComponentIdentifier) -> Result<ErrorType, MatcherError>,
) -> Result<SharedMatcher, MatcherError> {
    let mut matchers: Vec<SharedMatcher> = Vec::new();
    for entry in expr.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = ComponentIdentifier::parse(entry)?;
        if id.has_wildcard() {
            matchers.push(Arc::new(WildcardErrorTypeMatcher::new(&id)));
        } else {
            matchers.push(Arc::new(SingleErrorTypeMatcher::new(resolve(&id)?)));
        }
    }
    match matchers.len() {
        0 => Err(MatcherError::Empty),
        1 => Ok(matchers.remove(0)),
        _ => Ok(Arc::new(DisjunctiveErrorTypeMatcher::new(matchers))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
