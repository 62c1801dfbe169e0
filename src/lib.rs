// SPDX-License-Identifier: MIT OR Apache-2.0
//! errflow
//!
//! Error classification and exception handling for message flows.
//!
//! This crate re-exports the workspace crates under one roof:
//!
//! - [`types`]: namespaced error types, the repository and matchers.
//! - [`mapping`]: exception classes and the class-to-type locator.
//! - [`handler`]: the handler chain, on-error handlers and redelivery.
//! - [`config`]: TOML configuration for repositories and policies.
//!
//! ```
//! use errflow::{BuiltinErrorType, ErrorTypeMatcher, bootstrap, parse_matcher};
//!
//! let repo = bootstrap();
//! let matcher = parse_matcher(&repo, "CONNECTIVITY, SECURITY").unwrap();
//! let retry = BuiltinErrorType::RetryExhausted.lookup(&repo).unwrap();
//! assert!(matcher.matches(&retry));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use errflow_config as config;
pub use errflow_handler as handler;
pub use errflow_mapping as mapping;
pub use errflow_types as types;

pub use errflow_config::{ErrflowConfig, load_config, validate_config};
pub use errflow_handler::{
    ErrorHandler, Event, FailureRecord, OnErrorHandler, Outcome, RedeliveryPolicy,
    RedeliveryTracker,
};
pub use errflow_mapping::{Exception, ErrorTypeLocator, classes, default_locator};
pub use errflow_types::{
    BuiltinErrorType, ErrorType, ErrorTypeMatcher, ErrorTypeRepository, bootstrap, parse_matcher,
};
