// SPDX-License-Identifier: MIT OR Apache-2.0
//! The unit of work flowing through message processing.

use crate::failure::FailureKind;
use crate::resources::{ReplyToHandler, StreamResource, Transaction};
use errflow_mapping::Exception;
use errflow_types::ErrorType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// The message carried by an [`Event`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Message body.
    pub payload: Value,
    /// Transport and user attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    /// Identity used for redelivery tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl Message {
    /// A message with `payload` and nothing else.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::default()
        }
    }

    /// Set the message id.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Error metadata bound to an [`Event`] while it is being handled.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    error_type: ErrorType,
    description: String,
    cause: Exception,
    kind: FailureKind,
}

impl ErrorInfo {
    /// Bind `cause`, classified as `error_type`.
    pub fn new(error_type: ErrorType, cause: Exception) -> Self {
        Self {
            error_type,
            description: cause.message().to_string(),
            cause,
            kind: FailureKind::Ordinary,
        }
    }

    /// Set the failure kind.
    #[must_use]
    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = kind;
        self
    }

    /// The classification.
    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }

    /// Human-readable description of the failure.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The raised exception.
    pub fn cause(&self) -> &Exception {
        &self.cause
    }

    /// The failure kind.
    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }

    /// Whether this error signals redelivery exhaustion.
    pub fn is_redelivery_exhausted(&self) -> bool {
        matches!(self.kind, FailureKind::RedeliveryExhausted { .. })
    }
}

/// An in-flight message plus the processing metadata error handling acts on.
///
/// Cloning is cheap for the metadata; resources are shared through `Arc`.
#[derive(Clone)]
pub struct Event {
    id: Uuid,
    message: Message,
    error: Option<ErrorInfo>,
    variables: BTreeMap<String, Value>,
    transaction: Option<Arc<dyn Transaction>>,
    reply_to: Option<Arc<dyn ReplyToHandler>>,
    streams: Vec<Arc<dyn StreamResource>>,
}

impl Event {
    /// Start building an event.
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }

    /// An event carrying `payload` and nothing else.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self::builder().payload(payload).build()
    }

    /// Event id, unique per unit of work.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Shorthand for `message().message_id`.
    pub fn message_id(&self) -> Option<&str> {
        self.message.message_id.as_deref()
    }

    /// Replace the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.message.payload = payload.into();
        self
    }

    /// Current error metadata.
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Bind error metadata, replacing any previous one.
    #[must_use]
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Clear error metadata.
    #[must_use]
    pub fn without_error(mut self) -> Self {
        self.error = None;
        self
    }

    /// Flow variables.
    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    /// One flow variable.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Set a flow variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// The active transaction.
    pub fn transaction(&self) -> Option<&Arc<dyn Transaction>> {
        self.transaction.as_ref()
    }

    /// The pending reply-to handler.
    pub fn reply_to(&self) -> Option<&Arc<dyn ReplyToHandler>> {
        self.reply_to.as_ref()
    }

    /// Streams opened while processing.
    pub fn streams(&self) -> &[Arc<dyn StreamResource>] {
        &self.streams
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Event");
        d.field("id", &self.id);
        d.field("message", &self.message);
        if let Some(ref error) = self.error {
            d.field("error", &error.error_type.to_string());
        }
        if !self.variables.is_empty() {
            d.field("variables", &self.variables);
        }
        if let Some(ref tx) = self.transaction {
            d.field("transaction", &tx.id());
        }
        if !self.streams.is_empty() {
            d.field("streams", &self.streams.len());
        }
        d.finish()
    }
}

/// Builder for [`Event`].
#[derive(Default)]
pub struct EventBuilder {
    id: Option<Uuid>,
    message: Message,
    variables: BTreeMap<String, Value>,
    transaction: Option<Arc<dyn Transaction>>,
    reply_to: Option<Arc<dyn ReplyToHandler>>,
    streams: Vec<Arc<dyn StreamResource>>,
}

impl EventBuilder {
    /// Use a fixed id instead of a random one.
    #[must_use]
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the whole message.
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.message = message;
        self
    }

    /// Set the payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Value>) -> Self {
        self.message.payload = payload.into();
        self
    }

    /// Set the message id.
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message.message_id = Some(id.into());
        self
    }

    /// Set a flow variable.
    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Bind a transaction.
    #[must_use]
    pub fn transaction(mut self, tx: Arc<dyn Transaction>) -> Self {
        self.transaction = Some(tx);
        self
    }

    /// Bind a reply-to handler.
    #[must_use]
    pub fn reply_to(mut self, handler: Arc<dyn ReplyToHandler>) -> Self {
        self.reply_to = Some(handler);
        self
    }

    /// Register an open stream.
    #[must_use]
    pub fn stream(mut self, stream: Arc<dyn StreamResource>) -> Self {
        self.streams.push(stream);
        self
    }

    /// Finish.
    pub fn build(self) -> Event {
        Event {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            message: self.message,
            error: None,
            variables: self.variables,
            transaction: self.transaction,
            reply_to: self.reply_to,
            streams: self.streams,
        }
    }
}
