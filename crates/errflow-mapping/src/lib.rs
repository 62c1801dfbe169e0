// SPDX-License-Identifier: MIT OR Apache-2.0
//! errflow-mapping
//!
//! Turns raised failures into [`ErrorType`](errflow_types::ErrorType)s.
//!
//! A failure is an [`Exception`]: a class from a static [`ExceptionClass`]
//! tree, a message, and an optional cause. [`ExceptionMapper`] tables map
//! classes to error types, most specific class first, and the
//! [`ErrorTypeLocator`] combines a default table with per-component tables.
//! Resolution never fails; anything unmapped is `CORE:UNKNOWN`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Exception classes.
pub mod class;
/// Failing components and error remappings.
pub mod component;
/// The exception cause chain.
pub mod exception;
/// Exception-to-error-type resolution.
pub mod locator;
/// Exception mapping tables.
pub mod mapper;

pub use class::{ExceptionClass, classes};
pub use component::{Component, ErrorMapping, classify};
pub use exception::{Causes, Exception, ExceptionDto};
pub use locator::{
    ErrorTypeLocator, ErrorTypeLocatorBuilder, LocatorError, default_exception_mapper,
    default_locator,
};
pub use mapper::{ExceptionMapper, ExceptionMapperBuilder, ExceptionMapping};
