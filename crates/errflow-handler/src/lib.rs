// SPDX-License-Identifier: MIT OR Apache-2.0
//! errflow-handler
//!
//! Exception handling for message flows.
//!
//! A failing unit of work becomes a [`FailureRecord`]. The flow's
//! [`ErrorHandler`] hands it to the first [`OnErrorHandler`] that accepts
//! it; that handler either recovers ([`Outcome::Continue`]) or re-raises
//! ([`Outcome::Propagate`]). Critical failures never reach a handler.
//! [`RedeliveryTracker`] enforces per-message delivery budgets.
//!
//! ```
//! use errflow_handler::{ErrorHandler, Event, FailureRecord, OnErrorHandler};
//! use errflow_mapping::{Exception, classes, default_locator};
//! use errflow_types::bootstrap;
//!
//! # tokio_test_block(async {
//! let repo = bootstrap();
//! let locator = default_locator(&repo).unwrap();
//! let chain = ErrorHandler::builder(&repo)
//!     .listener(OnErrorHandler::continue_on_error("recover").build())
//!     .build()
//!     .unwrap();
//!
//! let failure = FailureRecord::classify(
//!     Exception::new(&classes::TIMEOUT, "upstream slow"),
//!     Event::new("order-42"),
//!     None,
//!     &locator,
//! );
//! let outcome = chain.handle_exception(failure).await.unwrap();
//! assert!(outcome.is_continue());
//! assert!(outcome.event().error().is_none());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Cancellation of in-flight handling.
pub mod cancel;
/// The handler chain.
pub mod chain;
/// Handling-core errors.
pub mod error;
/// Units of work.
pub mod event;
/// Failure records.
pub mod failure;
/// Lifecycle notifications.
pub mod notification;
/// The on-error handler.
pub mod on_error;
/// Handling outcomes.
pub mod outcome;
/// Recovery processors.
pub mod processor;
/// Redelivery budgets.
pub mod redelivery;
/// Transactions, replies and streams.
pub mod resources;
/// Flow statistics.
pub mod statistics;

pub use cancel::{CancellationReason, CancellationToken};
pub use chain::{
    DEFAULT_HANDLER_NAME, ErrorHandler, ErrorHandlerBuilder, ExceptionHandlerAcceptor,
    SharedHandler,
};
pub use error::{ChainError, HandlingError};
pub use event::{ErrorInfo, Event, EventBuilder, Message};
pub use failure::{FailureKind, FailureRecord, MESSAGE_SUMMARY_LIMIT};
pub use notification::{
    EndStatus, ListenerError, LoggingListener, NotificationDispatcher, NotificationListener,
};
pub use on_error::{
    EventPredicate, FailurePredicate, LogMode, OnErrorHandler, OnErrorHandlerBuilder,
    OnErrorPolicy, RoutingHook,
};
pub use outcome::Outcome;
pub use processor::{Processor, ProcessorChain, ProcessorFailure};
pub use redelivery::{
    DEFAULT_MAX_REDELIVERY_COUNT, IdExtractor, IdSource, RedeliveryError, RedeliveryExceeded,
    RedeliveryExhausted, RedeliveryPolicy, RedeliveryTracker,
};
pub use resources::{
    LocalTransaction, ReplyToHandler, StreamResource, Transaction, TransactionError,
    TransactionState, owns_transaction,
};
pub use statistics::{FlowStatistics, StatisticsSnapshot};
