// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transactions, reply-to handlers and stream resources carried by an
//! [`Event`](crate::Event).

use crate::event::Event;
use async_trait::async_trait;
use errflow_mapping::Exception;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Errors from completing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    /// The transaction was already committed or rolled back.
    #[error("transaction {id} is already {state}")]
    AlreadyCompleted {
        /// Transaction id.
        id: String,
        /// State it completed in.
        state: TransactionState,
    },
    /// The underlying resource refused the operation.
    #[error("transaction {id} failed: {reason}")]
    Resource {
        /// Transaction id.
        id: String,
        /// Reason given by the resource.
        reason: String,
    },
}

/// Lifecycle of a [`LocalTransaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Open.
    Active,
    /// Committed.
    Committed,
    /// Rolled back.
    RolledBack,
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        })
    }
}

/// A transaction bound to the unit of work.
pub trait Transaction: Debug + Send + Sync {
    /// Transaction id.
    fn id(&self) -> &str;

    /// Name of the flow that began the transaction.
    fn owner(&self) -> Option<&str>;

    /// Roll back.
    ///
    /// # Errors
    ///
    /// [`TransactionError`] if the transaction cannot be rolled back.
    fn rollback(&self) -> Result<(), TransactionError>;

    /// Commit.
    ///
    /// # Errors
    ///
    /// [`TransactionError`] if the transaction cannot be committed.
    fn commit(&self) -> Result<(), TransactionError>;
}

/// Whether a handler bound to `flow` owns `tx`.
///
/// A handler with no flow is a default handler and owns whatever
/// transaction is active; otherwise the flow must have begun it.
pub fn owns_transaction(flow: Option<&str>, tx: &dyn Transaction) -> bool {
    match flow {
        None => true,
        Some(flow) => tx.owner() == Some(flow),
    }
}

/// In-process transaction that only tracks its own state.
#[derive(Debug)]
pub struct LocalTransaction {
    id: String,
    owner: Option<String>,
    state: Mutex<TransactionState>,
}

impl LocalTransaction {
    /// Begin a transaction owned by `owner`.
    pub fn begin(id: impl Into<String>, owner: Option<String>) -> Self {
        Self {
            id: id.into(),
            owner,
            state: Mutex::new(TransactionState::Active),
        }
    }

    /// Current state.
    pub fn state(&self) -> TransactionState {
        *self.state.lock().expect("transaction lock poisoned")
    }

    fn complete(&self, target: TransactionState) -> Result<(), TransactionError> {
        let mut state = self.state.lock().expect("transaction lock poisoned");
        match *state {
            TransactionState::Active => {
                *state = target;
                Ok(())
            }
            done if done == target => Ok(()),
            done => Err(TransactionError::AlreadyCompleted {
                id: self.id.clone(),
                state: done,
            }),
        }
    }
}

impl Transaction for LocalTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn rollback(&self) -> Result<(), TransactionError> {
        self.complete(TransactionState::RolledBack)
    }

    fn commit(&self) -> Result<(), TransactionError> {
        self.complete(TransactionState::Committed)
    }
}

// ---------------------------------------------------------------------------
// Reply-to and streams
// ---------------------------------------------------------------------------

/// Sends the result of a recovered unit of work to a waiting requester.
#[async_trait]
pub trait ReplyToHandler: Debug + Send + Sync {
    /// Deliver `event` as the reply.
    async fn reply(&self, event: &Event) -> Result<(), Exception>;
}

/// A streaming resource opened while processing the unit of work.
pub trait StreamResource: Debug + Send + Sync {
    /// Name for diagnostics.
    fn name(&self) -> &str;

    /// Release the resource. Closing twice must be harmless.
    fn close(&self) -> Result<(), Exception>;
}
