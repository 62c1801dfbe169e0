// SPDX-License-Identifier: MIT OR Apache-2.0
//! Failing components and their error remappings.

use crate::exception::Exception;
use crate::locator::ErrorTypeLocator;
use errflow_types::{ComponentIdentifier, ErrorType, ErrorTypeMatcher, SharedMatcher};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Replace a resolved error type for one component, e.g. turn
/// `HTTP:NOT_FOUND` into `APP:MISSING_CUSTOMER`.
#[derive(Debug, Clone)]
pub struct ErrorMapping {
    source: SharedMatcher,
    target: ErrorType,
}

impl ErrorMapping {
    /// Map anything `source` accepts to `target`.
    pub fn new(source: SharedMatcher, target: ErrorType) -> Self {
        Self { source, target }
    }

    /// Map from a concrete matcher value.
    pub fn from_matcher(source: impl ErrorTypeMatcher + 'static, target: ErrorType) -> Self {
        Self::new(Arc::new(source), target)
    }

    /// Whether this mapping applies to `error_type`.
    pub fn matches(&self, error_type: &ErrorType) -> bool {
        self.source.matches(error_type)
    }

    /// The replacement type.
    pub fn target(&self) -> &ErrorType {
        &self.target
    }
}

/// The processing step a failure came from.
#[derive(Debug, Clone)]
pub struct Component {
    identifier: ComponentIdentifier,
    location: Option<String>,
    error_mappings: Vec<ErrorMapping>,
}

impl Component {
    /// A component with no location and no remappings.
    pub fn new(identifier: ComponentIdentifier) -> Self {
        Self {
            identifier,
            location: None,
            error_mappings: Vec::new(),
        }
    }

    /// Set the location, e.g. `orders-flow/processors/2`.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Append a remapping. Earlier mappings take precedence.
    #[must_use]
    pub fn with_error_mapping(mut self, mapping: ErrorMapping) -> Self {
        self.error_mappings.push(mapping);
        self
    }

    /// The component identifier.
    pub fn identifier(&self) -> &ComponentIdentifier {
        &self.identifier
    }

    /// The location, if known.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Remappings in precedence order.
    pub fn error_mappings(&self) -> &[ErrorMapping] {
        &self.error_mappings
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} @ {location}", self.identifier),
            None => fmt::Display::fmt(&self.identifier, f),
        }
    }
}

/// Classify `exception`.
///
/// A typed exception keeps its own type. Otherwise the component's table is
/// consulted (when the component is known), then the default table, then
/// `CORE:UNKNOWN`. The first component remapping whose source accepts the
/// result replaces it.
pub fn classify(
    component: Option<&Component>,
    exception: &Exception,
    locator: &ErrorTypeLocator,
) -> ErrorType {
    let resolved = match component {
        Some(c) => locator.lookup_component_error_type(c.identifier(), exception),
        None => locator.lookup_error_type(exception),
    };
    let Some(component) = component else {
        return resolved;
    };
    match component.error_mappings.iter().find(|m| m.matches(&resolved)) {
        Some(mapping) => {
            debug!(
                target: "errflow.locator",
                component = %component,
                from = %resolved,
                to = %mapping.target,
                "error mapping applied"
            );
            mapping.target.clone()
        }
        None => resolved,
    }
}
