// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered exception-class → error-type tables.

use crate::class::{ExceptionClass, classes};
use crate::exception::Exception;
use errflow_types::ErrorType;

/// One rule: failures of `class` (or a subclass) become `error_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionMapping {
    class: &'static ExceptionClass,
    error_type: ErrorType,
}

impl ExceptionMapping {
    /// Create a rule.
    pub fn new(class: &'static ExceptionClass, error_type: ErrorType) -> Self {
        Self { class, error_type }
    }

    /// The class this rule applies to.
    pub fn class(&self) -> &'static ExceptionClass {
        self.class
    }

    /// The resulting error type.
    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }

    /// Whether `class` is covered by this rule.
    pub fn matches(&self, class: &ExceptionClass) -> bool {
        class.is_a(self.class)
    }
}

/// Rules sorted most specific first, so a subclass rule wins over a
/// superclass rule regardless of registration order.
#[derive(Debug, Clone, Default)]
pub struct ExceptionMapper {
    mappings: Vec<ExceptionMapping>,
}

impl ExceptionMapper {
    /// Start building a mapper.
    pub fn builder() -> ExceptionMapperBuilder {
        ExceptionMapperBuilder::default()
    }

    /// The error type of the first rule covering the exception's class.
    pub fn resolve(&self, exception: &Exception) -> Option<ErrorType> {
        self.resolve_class(exception.class())
    }

    /// The error type of the first rule covering `class`.
    pub fn resolve_class(&self, class: &ExceptionClass) -> Option<ErrorType> {
        self.mappings
            .iter()
            .find(|m| m.matches(class))
            .map(|m| m.error_type.clone())
    }

    /// Whether some rule covers every recoverable failure.
    pub fn has_catch_all(&self) -> bool {
        self.mappings
            .iter()
            .any(|m| *m.class == classes::EXCEPTION || *m.class == classes::THROWABLE)
    }

    /// Rules in evaluation order.
    pub fn mappings(&self) -> &[ExceptionMapping] {
        &self.mappings
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether the mapper has no rules.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Builder for [`ExceptionMapper`].
#[derive(Debug, Default)]
pub struct ExceptionMapperBuilder {
    mappings: Vec<ExceptionMapping>,
}

impl ExceptionMapperBuilder {
    /// Add a rule.
    #[must_use]
    pub fn add_exception_mapping(
        mut self,
        class: &'static ExceptionClass,
        error_type: ErrorType,
    ) -> Self {
        self.mappings.push(ExceptionMapping::new(class, error_type));
        self
    }

    /// Sort rules deepest class first and finish. The sort is stable, so
    /// rules at the same depth keep their registration order.
    pub fn build(mut self) -> ExceptionMapper {
        self.mappings
            .sort_by_key(|m| std::cmp::Reverse(m.class.depth()));
        ExceptionMapper {
            mappings: self.mappings,
        }
    }
}
