// SPDX-License-Identifier: MIT OR Apache-2.0
//! Resolution of exceptions to error types, globally and per component.

use crate::class::{ExceptionClass, classes};
use crate::exception::Exception;
use crate::mapper::ExceptionMapper;
use errflow_types::{
    BuiltinErrorType, ComponentIdentifier, ErrorType, ErrorTypeRepository, RepositoryError,
};
use std::collections::HashMap;
use tracing::trace;

/// Configuration defects detected when a locator is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocatorError {
    /// No default mapper was supplied.
    #[error("error type locator requires a default exception mapper")]
    MissingDefaultMapper,
    /// The default mapper has no rule for the root exception class.
    #[error("default exception mapper has no catch-all rule for Exception or Throwable")]
    MissingCatchAll,
    /// The repository lacks the built-in catalog.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Maps exceptions to error types.
///
/// Built once at startup and shared read-only; resolution never fails and
/// falls back to `CORE:UNKNOWN`.
#[derive(Debug, Clone)]
pub struct ErrorTypeLocator {
    default_mapper: ExceptionMapper,
    component_mappers: HashMap<ComponentIdentifier, ExceptionMapper>,
    unknown: ErrorType,
}

impl ErrorTypeLocator {
    /// Start building a locator over `repo`.
    pub fn builder(repo: &ErrorTypeRepository) -> ErrorTypeLocatorBuilder<'_> {
        ErrorTypeLocatorBuilder {
            repo,
            default_mapper: None,
            component_mappers: HashMap::new(),
        }
    }

    /// Resolve a failure that has no known originating component.
    pub fn lookup_error_type(&self, exception: &Exception) -> ErrorType {
        if let Some(t) = exception.error_type() {
            return t.clone();
        }
        self.default_mapper
            .resolve(exception)
            .unwrap_or_else(|| self.unknown.clone())
    }

    /// Resolve a failure raised by `component`, preferring its own table.
    pub fn lookup_component_error_type(
        &self,
        component: &ComponentIdentifier,
        exception: &Exception,
    ) -> ErrorType {
        if let Some(t) = exception.error_type() {
            return t.clone();
        }
        let resolved = self
            .component_mappers
            .get(component)
            .and_then(|m| m.resolve(exception));
        match resolved {
            Some(t) => {
                trace!(target: "errflow.locator", component = %component, error_type = %t, "component mapping");
                t
            }
            None => self.lookup_error_type(exception),
        }
    }

    /// Resolve a bare class through the default table.
    pub fn lookup_class(&self, class: &ExceptionClass) -> ErrorType {
        self.default_mapper
            .resolve_class(class)
            .unwrap_or_else(|| self.unknown.clone())
    }

    /// The fallback type.
    pub fn unknown_error_type(&self) -> &ErrorType {
        &self.unknown
    }

    /// The default table.
    pub fn default_mapper(&self) -> &ExceptionMapper {
        &self.default_mapper
    }

    /// Components with their own table.
    pub fn components(&self) -> impl Iterator<Item = &ComponentIdentifier> {
        self.component_mappers.keys()
    }
}

/// Builder for [`ErrorTypeLocator`].
#[derive(Debug)]
pub struct ErrorTypeLocatorBuilder<'a> {
    repo: &'a ErrorTypeRepository,
    default_mapper: Option<ExceptionMapper>,
    component_mappers: HashMap<ComponentIdentifier, ExceptionMapper>,
}

impl ErrorTypeLocatorBuilder<'_> {
    /// Set the table used when no component table applies.
    #[must_use]
    pub fn default_exception_mapper(mut self, mapper: ExceptionMapper) -> Self {
        self.default_mapper = Some(mapper);
        self
    }

    /// Set the table for one component, replacing any earlier one.
    #[must_use]
    pub fn add_component_exception_mapper(
        mut self,
        component: ComponentIdentifier,
        mapper: ExceptionMapper,
    ) -> Self {
        self.component_mappers.insert(component, mapper);
        self
    }

    /// Validate and finish.
    ///
    /// # Errors
    ///
    /// [`LocatorError::MissingDefaultMapper`], [`LocatorError::MissingCatchAll`],
    /// or [`LocatorError::Repository`] when `CORE:UNKNOWN` is not registered.
    pub fn build(self) -> Result<ErrorTypeLocator, LocatorError> {
        let default_mapper = self
            .default_mapper
            .ok_or(LocatorError::MissingDefaultMapper)?;
        if !default_mapper.has_catch_all() {
            return Err(LocatorError::MissingCatchAll);
        }
        let unknown = BuiltinErrorType::Unknown.lookup(self.repo)?;
        Ok(ErrorTypeLocator {
            default_mapper,
            component_mappers: self.component_mappers,
            unknown,
        })
    }
}

/// The stock default table.
///
/// # Errors
///
/// [`RepositoryError::Unknown`] if `repo` lacks the built-in catalog.
pub fn default_exception_mapper(
    repo: &ErrorTypeRepository,
) -> Result<ExceptionMapper, RepositoryError> {
    use BuiltinErrorType as B;
    let table: [(&'static ExceptionClass, BuiltinErrorType); 13] = [
        (&classes::EXCEPTION, B::Unknown),
        (&classes::IO, B::Connectivity),
        (&classes::CONNECTION, B::Connectivity),
        (&classes::TRANSFORMATION, B::Transformation),
        (&classes::EXPRESSION, B::Expression),
        (&classes::ROUTING, B::Routing),
        (&classes::SECURITY, B::Security),
        (&classes::TIMEOUT, B::Timeout),
        (&classes::RETRY_EXHAUSTED, B::RetryExhausted),
        (&classes::MESSAGE_REDELIVERED, B::RedeliveryExhausted),
        (&classes::VALIDATION, B::Validation),
        (&classes::FATAL_ERROR, B::Fatal),
        (&classes::RESOURCE_EXHAUSTED, B::Overload),
    ];
    let mut builder = ExceptionMapper::builder();
    for (class, builtin) in table {
        builder = builder.add_exception_mapping(class, builtin.lookup(repo)?);
    }
    Ok(builder.build())
}

/// A locator over the stock default table with no component tables.
///
/// # Errors
///
/// [`LocatorError::Repository`] if `repo` lacks the built-in catalog.
pub fn default_locator(repo: &ErrorTypeRepository) -> Result<ErrorTypeLocator, LocatorError> {
    ErrorTypeLocator::builder(repo)
        .default_exception_mapper(default_exception_mapper(repo)?)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use errflow_types::bootstrap;

    fn t(repo: &ErrorTypeRepository, b: BuiltinErrorType) -> ErrorType {
        b.lookup(repo).unwrap()
    }

    #[test]
    fn missing_default_mapper() {
        let repo = bootstrap();
        let err = ErrorTypeLocator::builder(&repo).build().unwrap_err();
        assert_eq!(err, LocatorError::MissingDefaultMapper);
    }

    #[test]
    fn missing_catch_all() {
        let repo = bootstrap();
        let mapper = ExceptionMapper::builder()
            .add_exception_mapping(&classes::IO, t(&repo, BuiltinErrorType::Connectivity))
            .build();
        let err = ErrorTypeLocator::builder(&repo)
            .default_exception_mapper(mapper)
            .build()
            .unwrap_err();
        assert_eq!(err, LocatorError::MissingCatchAll);
    }

    #[test]
    fn plain_repository_is_rejected() {
        let repo = ErrorTypeRepository::new();
        assert!(matches!(
            default_locator(&repo),
            Err(LocatorError::Repository(_))
        ));
    }

    #[test]
    fn default_table() {
        let repo = bootstrap();
        let locator = default_locator(&repo).unwrap();
        let cases = [
            (&classes::CONNECT, BuiltinErrorType::Connectivity),
            (&classes::FILE_NOT_FOUND, BuiltinErrorType::Connectivity),
            (&classes::MESSAGING, BuiltinErrorType::Unknown),
            (&classes::TIMEOUT, BuiltinErrorType::Timeout),
            (&classes::MESSAGE_REDELIVERED, BuiltinErrorType::RedeliveryExhausted),
            (&classes::RESOURCE_EXHAUSTED, BuiltinErrorType::Overload),
            (&classes::FATAL_ERROR, BuiltinErrorType::Fatal),
        ];
        for (class, expected) in cases {
            let e = Exception::new(class, "x");
            assert_eq!(locator.lookup_error_type(&e), t(&repo, expected), "{class}");
        }
    }

    #[test]
    fn unmapped_throwable_falls_back_to_unknown() {
        let repo = bootstrap();
        let locator = default_locator(&repo).unwrap();
        let e = Exception::new(&classes::THROWABLE, "bare");
        assert_eq!(&locator.lookup_error_type(&e), locator.unknown_error_type());
    }

    #[test]
    fn component_table_precedes_default() {
        let mut repo = bootstrap();
        let conn = t(&repo, BuiltinErrorType::Connectivity);
        let http = repo
            .add_error_type(ComponentIdentifier::new("HTTP", "CONNECTIVITY"), &conn)
            .unwrap();
        let component = ComponentIdentifier::new("HTTP", "request");
        let locator = ErrorTypeLocator::builder(&repo)
            .default_exception_mapper(default_exception_mapper(&repo).unwrap())
            .add_component_exception_mapper(
                component.clone(),
                ExceptionMapper::builder()
                    .add_exception_mapping(&classes::IO, http.clone())
                    .build(),
            )
            .build()
            .unwrap();

        let io = Exception::new(&classes::CONNECT, "refused");
        assert_eq!(locator.lookup_component_error_type(&component, &io), http);

        let timeout = Exception::new(&classes::TIMEOUT, "slow");
        assert_eq!(
            locator.lookup_component_error_type(&component, &timeout),
            t(&repo, BuiltinErrorType::Timeout)
        );

        let other = ComponentIdentifier::new("DB", "select");
        assert_eq!(locator.lookup_component_error_type(&other, &io), conn);
    }

    #[test]
    fn typed_exception_bypasses_tables() {
        let repo = bootstrap();
        let locator = default_locator(&repo).unwrap();
        let security = t(&repo, BuiltinErrorType::Security);
        let e = Exception::new(&classes::IO, "typed").typed(security.clone());
        assert_eq!(locator.lookup_error_type(&e), security);
        assert_eq!(
            locator.lookup_component_error_type(&ComponentIdentifier::core("x"), &e),
            security
        );
    }
}
