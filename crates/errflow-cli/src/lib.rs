// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library half of the `errflow` binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Command implementations.
pub mod commands;
