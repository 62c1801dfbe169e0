// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration tests for exception resolution.

use errflow_mapping::{
    Component, ErrorMapping, ErrorTypeLocator, Exception, ExceptionClass, ExceptionMapper,
    LocatorError, classes, classify, default_exception_mapper, default_locator,
};
use errflow_types::{
    BuiltinErrorType, ComponentIdentifier, ErrorType, ErrorTypeRepository, bootstrap,
    parse_matcher,
};
use std::sync::Arc;
use std::thread;

static HTTP_STATUS: ExceptionClass = ExceptionClass::new("HttpStatusException", Some(&classes::IO));
static HTTP_NOT_FOUND: ExceptionClass =
    ExceptionClass::new("HttpNotFoundException", Some(&HTTP_STATUS));

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn t(repo: &ErrorTypeRepository, b: BuiltinErrorType) -> ErrorType {
    b.lookup(repo).unwrap()
}

fn http_repo() -> (ErrorTypeRepository, ErrorType) {
    let mut repo = bootstrap();
    let conn = t(&repo, BuiltinErrorType::Connectivity);
    let not_found = repo
        .add_error_type(ComponentIdentifier::new("HTTP", "NOT_FOUND"), &conn)
        .unwrap();
    (repo, not_found)
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

#[test]
fn user_classes_inherit_builtin_mappings() {
    let repo = bootstrap();
    let locator = default_locator(&repo).unwrap();
    let e = Exception::new(&HTTP_NOT_FOUND, "404");
    assert_eq!(
        locator.lookup_error_type(&e),
        t(&repo, BuiltinErrorType::Connectivity)
    );
}

#[test]
fn component_table_with_user_class() {
    let (repo, not_found) = http_repo();
    let component = ComponentIdentifier::new("HTTP", "request");
    let locator = ErrorTypeLocator::builder(&repo)
        .default_exception_mapper(default_exception_mapper(&repo).unwrap())
        .add_component_exception_mapper(
            component.clone(),
            ExceptionMapper::builder()
                .add_exception_mapping(&HTTP_NOT_FOUND, not_found.clone())
                .build(),
        )
        .build()
        .unwrap();

    let e = Exception::new(&HTTP_NOT_FOUND, "404");
    assert_eq!(locator.lookup_component_error_type(&component, &e), not_found);
    let e = Exception::new(&HTTP_STATUS, "500");
    assert_eq!(
        locator.lookup_component_error_type(&component, &e),
        t(&repo, BuiltinErrorType::Connectivity)
    );
    assert_eq!(locator.components().count(), 1);
}

#[test]
fn locator_errors_render() {
    assert_eq!(
        LocatorError::MissingDefaultMapper.to_string(),
        "error type locator requires a default exception mapper"
    );
    assert!(LocatorError::MissingCatchAll.to_string().contains("catch-all"));
}

#[test]
fn locator_is_shareable_across_threads() {
    let repo = bootstrap();
    let locator = Arc::new(default_locator(&repo).unwrap());
    let expected = t(&repo, BuiltinErrorType::Timeout);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let locator = Arc::clone(&locator);
            let expected = expected.clone();
            thread::spawn(move || {
                let e = Exception::new(&classes::TIMEOUT, "slow");
                assert_eq!(locator.lookup_error_type(&e), expected);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[test]
fn classify_remaps_with_parsed_matcher() {
    let (mut repo, not_found) = http_repo();
    let any = repo.any_error_type().clone();
    let missing = repo
        .add_error_type(ComponentIdentifier::new("APP", "MISSING_CUSTOMER"), &any)
        .unwrap();
    let component_id = ComponentIdentifier::new("HTTP", "request");
    let locator = ErrorTypeLocator::builder(&repo)
        .default_exception_mapper(default_exception_mapper(&repo).unwrap())
        .add_component_exception_mapper(
            component_id.clone(),
            ExceptionMapper::builder()
                .add_exception_mapping(&HTTP_NOT_FOUND, not_found)
                .build(),
        )
        .build()
        .unwrap();
    let component = Component::new(component_id).with_error_mapping(ErrorMapping::new(
        parse_matcher(&repo, "HTTP:*").unwrap(),
        missing.clone(),
    ));

    let e = Exception::new(&HTTP_NOT_FOUND, "customer 42");
    assert_eq!(classify(Some(&component), &e, &locator), missing);

    let e = Exception::new(&classes::CONNECT, "refused");
    assert_eq!(
        classify(Some(&component), &e, &locator),
        t(&repo, BuiltinErrorType::Connectivity)
    );
}

#[test]
fn classify_typed_exception_can_still_be_remapped() {
    let repo = bootstrap();
    let locator = default_locator(&repo).unwrap();
    let security = t(&repo, BuiltinErrorType::ClientSecurity);
    let validation = t(&repo, BuiltinErrorType::Validation);
    let component = Component::new(ComponentIdentifier::core("auth")).with_error_mapping(
        ErrorMapping::new(parse_matcher(&repo, "SECURITY").unwrap(), validation.clone()),
    );
    let e = Exception::new(&classes::EXCEPTION, "bad token").typed(security);
    assert_eq!(classify(Some(&component), &e, &locator), validation);
}

#[test]
fn classify_wrapped_failure_uses_outer_class() {
    let repo = bootstrap();
    let locator = default_locator(&repo).unwrap();
    let e = Exception::new(&classes::TRANSFORMATION, "bad payload")
        .with_source(Exception::new(&classes::IO, "read"));
    assert_eq!(
        classify(None, &e, &locator),
        t(&repo, BuiltinErrorType::Transformation)
    );
    assert!(e.caused_by(&classes::IO));
}
