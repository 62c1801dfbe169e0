// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error-handler lifecycle notifications.
//!
//! Register [`NotificationListener`]s with a [`NotificationDispatcher`] to
//! observe when handlers start and finish processing a failure. Delivery is
//! fire-and-forget: listener errors are logged and never affect handling.

use crate::event::Event;
use crate::resources::StreamResource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// How a handler invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndStatus {
    /// The failure was recovered.
    Continued,
    /// The failure propagates to the caller.
    Propagated,
    /// Handling was cancelled, failed, or dropped before completing.
    Aborted,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Observer of error-handler lifecycle events.
///
/// Both callbacks default to no-ops.
pub trait NotificationListener: Send + Sync {
    /// A handler started processing the failure bound to `event`.
    ///
    /// # Errors
    ///
    /// Informational only; the dispatcher logs and discards it.
    fn on_process_start(&self, _handler: &str, _event: &Event) -> Result<(), ListenerError> {
        Ok(())
    }

    /// A handler finished; fired exactly once per start.
    ///
    /// # Errors
    ///
    /// Informational only; the dispatcher logs and discards it.
    fn on_process_end(
        &self,
        _handler: &str,
        _event: &Event,
        _status: EndStatus,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Name used in diagnostics.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Ordered set of listeners fired in registration order.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    listeners: Vec<Arc<dyn NotificationListener>>,
}

impl NotificationDispatcher {
    /// A dispatcher with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener (builder pattern).
    #[must_use]
    pub fn listener<L: NotificationListener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Append a shared listener.
    pub fn register(&mut self, listener: Arc<dyn NotificationListener>) {
        self.listeners.push(listener);
    }

    /// Fire [`NotificationListener::on_process_start`] on every listener.
    pub fn fire_start(&self, handler: &str, event: &Event) {
        for l in &self.listeners {
            if let Err(error) = l.on_process_start(handler, event) {
                warn!(target: "errflow.notify", listener = %l.name(), handler, %error, "start notification failed");
            }
        }
    }

    /// Fire [`NotificationListener::on_process_end`] on every listener.
    pub fn fire_end(&self, handler: &str, event: &Event, status: EndStatus) {
        for l in &self.listeners {
            if let Err(error) = l.on_process_end(handler, event, status) {
                warn!(target: "errflow.notify", listener = %l.name(), handler, %error, "end notification failed");
            }
        }
    }

    /// Number of listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Listener names in registration order.
    #[must_use]
    pub fn listener_names(&self) -> Vec<&str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("listeners", &self.listener_names())
            .finish()
    }
}

/// Fires the end notification exactly once: explicitly through
/// [`finish`](Self::finish), or as [`EndStatus::Aborted`] on drop.
pub(crate) struct EndGuard<'a> {
    dispatcher: &'a NotificationDispatcher,
    handler: &'a str,
    event: Event,
    streams: Vec<Arc<dyn StreamResource>>,
    fired: bool,
}

impl<'a> EndGuard<'a> {
    /// Fire the start notification and arm the guard.
    pub(crate) fn start(dispatcher: &'a NotificationDispatcher, handler: &'a str, event: &Event) -> Self {
        dispatcher.fire_start(handler, event);
        Self {
            dispatcher,
            handler,
            event: event.clone(),
            streams: Vec::new(),
            fired: false,
        }
    }

    /// Close `streams` if the guard is dropped before [`finish`](Self::finish).
    pub(crate) fn own_streams(&mut self, streams: &[Arc<dyn StreamResource>]) {
        self.streams = streams.to_vec();
    }

    /// Track the latest event so an abort reports it.
    pub(crate) fn update(&mut self, event: &Event) {
        self.event = event.clone();
    }

    /// Fire the end notification with `status`.
    pub(crate) fn finish(mut self, event: &Event, status: EndStatus) {
        self.fired = true;
        self.dispatcher.fire_end(self.handler, event, status);
    }
}

impl Drop for EndGuard<'_> {
    fn drop(&mut self) {
        if self.fired {
            return;
        }
        for stream in &self.streams {
            if let Err(err) = stream.close() {
                warn!(
                    target: "errflow.notify",
                    handler = self.handler,
                    stream = stream.name(),
                    error = %err,
                    "failed to close stream of abandoned handler"
                );
            }
        }
        self.dispatcher
            .fire_end(self.handler, &self.event, EndStatus::Aborted);
    }
}

// ---------------------------------------------------------------------------
// Built-in: LoggingListener
// ---------------------------------------------------------------------------

/// Logs lifecycle transitions via `tracing`.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl NotificationListener for LoggingListener {
    fn on_process_start(&self, handler: &str, event: &Event) -> Result<(), ListenerError> {
        let error_type = event.error().map(|e| e.error_type().to_string());
        debug!(
            target: "errflow.notify",
            handler,
            event_id = %event.id(),
            error_type = error_type.as_deref().unwrap_or("-"),
            "error handler starting"
        );
        Ok(())
    }

    fn on_process_end(
        &self,
        handler: &str,
        event: &Event,
        status: EndStatus,
    ) -> Result<(), ListenerError> {
        info!(
            target: "errflow.notify",
            handler,
            event_id = %event.id(),
            ?status,
            "error handler finished"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl NotificationListener for Arc<Recorder> {
        fn on_process_start(&self, handler: &str, _event: &Event) -> Result<(), ListenerError> {
            self.calls.lock().unwrap().push(format!("start:{handler}"));
            Ok(())
        }
        fn on_process_end(
            &self,
            handler: &str,
            _event: &Event,
            status: EndStatus,
        ) -> Result<(), ListenerError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("end:{handler}:{status:?}"));
            Ok(())
        }
        fn name(&self) -> &str {
            "recorder"
        }
    }

    struct Failing;

    impl NotificationListener for Failing {
        fn on_process_start(&self, _handler: &str, _event: &Event) -> Result<(), ListenerError> {
            Err("sink unavailable".into())
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn failing_listener_does_not_stop_others() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = NotificationDispatcher::new()
            .listener(Failing)
            .listener(Arc::clone(&recorder));
        dispatcher.fire_start("h", &Event::new("x"));
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["start:h"]);
        assert_eq!(dispatcher.listener_names(), vec!["failing", "recorder"]);
    }

    #[test]
    fn guard_fires_aborted_on_drop() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = NotificationDispatcher::new().listener(Arc::clone(&recorder));
        {
            let _guard = EndGuard::start(&dispatcher, "h", &Event::new("x"));
        }
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec!["start:h", "end:h:Aborted"]
        );
    }

    #[test]
    fn guard_fires_once_when_finished() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = NotificationDispatcher::new().listener(Arc::clone(&recorder));
        let event = Event::new("x");
        let guard = EndGuard::start(&dispatcher, "h", &event);
        guard.finish(&event, EndStatus::Continued);
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec!["start:h", "end:h:Continued"]
        );
    }

    #[derive(Debug, Default)]
    struct Closable {
        closed: std::sync::atomic::AtomicUsize,
    }

    impl StreamResource for Closable {
        fn name(&self) -> &str {
            "body"
        }
        fn close(&self) -> Result<(), errflow_mapping::Exception> {
            self.closed
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn dropped_guard_closes_owned_streams() {
        let dispatcher = NotificationDispatcher::new();
        let stream = Arc::new(Closable::default());
        let streams: Vec<Arc<dyn StreamResource>> = vec![stream.clone()];
        {
            let mut guard = EndGuard::start(&dispatcher, "h", &Event::new("x"));
            guard.own_streams(&streams);
        }
        assert_eq!(stream.closed.load(std::sync::atomic::Ordering::SeqCst), 1);

        let event = Event::new("y");
        let mut guard = EndGuard::start(&dispatcher, "h", &event);
        guard.own_streams(&streams);
        guard.finish(&event, EndStatus::Propagated);
        assert_eq!(stream.closed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
