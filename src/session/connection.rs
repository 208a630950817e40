//! Per-connection dispatch task.
//!
//! Each connection runs as one tokio task that owns its job buffer, its
//! completed printables and its event publisher. Transport notifications and
//! manager directives are handled one at a time, so handlers for the same
//! connection never run concurrently.
//!
//! # Event Loop
//!
//! ```text
//!   manager ── Directive ──┐
//!                          ▼
//!                  ┌───────────────┐       PrintEvent
//!                  │  Connection   │ ───────────────────► EventStream
//!                  │  (biased      │
//!                  │   select!)    │ ── Command ────────► Transport
//!                  └───────────────┘
//!                          ▲
//!   transport ─ Notification
//! ```
//!
//! The inbox is polled first, so a `Disconnect` directive takes effect before
//! any queued notification is processed. Requests and render waits run in
//! detached tasks that post their outcome back into the inbox.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::identifiers::{ConnectionId, JobId};
use crate::protocol::{Chunk, Command};
use crate::render::SharedSink;
use crate::transport::{Ack, Notification, Transport};

use super::reassembly::{
    ChunkReassembler, INCONSISTENT_FILE_LENGTH, Printable, ReassemblyConfig, Step,
};
use super::{ErrorKind, EventPublisher, PrintEvent};

// ============================================================================
// Types
// ============================================================================

/// Callback run once when the transport stopped for good.
pub(crate) type CloseHook = Box<dyn FnOnce(ConnectionId) + Send>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created; the transport is dialing.
    Connecting,
    /// Session established.
    Connected,
    /// Session lost or closed.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Per-connection limits derived from the connect options.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionSettings {
    pub reassembly: ReassemblyConfig,
    pub request_timeout: Duration,
    pub render_timeout: Duration,
}

// ============================================================================
// Inbox
// ============================================================================

/// Command issued by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Directive {
    EnablePrinting,
    DisablePrinting,
    OpenPrintable(JobId),
    Disconnect,
}

/// Result of a correlated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RequestOutcome {
    Acked(bool),
    TimedOut,
    Failed(String),
}

/// Message delivered to the dispatch task.
#[derive(Debug)]
pub(crate) enum Inbox {
    Directive(Directive),
    Requested {
        command: Command,
        outcome: RequestOutcome,
    },
    Rendered {
        job_id: JobId,
        delivered: bool,
    },
}

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Registry entry for a live connection.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionHandle {
    inbox: mpsc::UnboundedSender<Inbox>,
    state: Arc<Mutex<ConnectionState>>,
}

impl ConnectionHandle {
    /// Posts a directive. Returns `false` if the task already ended.
    pub fn send(&self, directive: Directive) -> bool {
        self.inbox.send(Inbox::Directive(directive)).is_ok()
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A connection's task: its two input channels plus the dispatcher.
pub(crate) struct Connection {
    inbox_rx: mpsc::UnboundedReceiver<Inbox>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    dispatcher: Dispatcher,
}

impl Connection {
    /// Builds a connection in `Connecting` state and the handle to reach it.
    pub fn new(
        id: ConnectionId,
        transport: Arc<dyn Transport>,
        notifications: mpsc::UnboundedReceiver<Notification>,
        publisher: EventPublisher,
        sink: Arc<SharedSink>,
        settings: ConnectionSettings,
        on_close: CloseHook,
    ) -> (Self, ConnectionHandle) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));

        let dispatcher = Dispatcher {
            id,
            state: Arc::clone(&state),
            transport,
            publisher,
            sink,
            settings,
            reassembler: ChunkReassembler::new(settings.reassembly),
            printables: FxHashMap::default(),
            inbox: inbox_tx.downgrade(),
            on_close: Some(on_close),
        };

        let connection = Self {
            inbox_rx,
            notifications,
            dispatcher,
        };
        let handle = ConnectionHandle {
            inbox: inbox_tx,
            state,
        };

        (connection, handle)
    }

    /// Runs the dispatch loop until the connection ends.
    ///
    /// Dropping the connection at the end drops its publisher, which ends
    /// the host's event stream.
    pub async fn run(self) {
        let Self {
            mut inbox_rx,
            mut notifications,
            mut dispatcher,
        } = self;

        debug!(connection_id = %dispatcher.id, "Connection task started");

        loop {
            tokio::select! {
                biased;

                message = inbox_rx.recv() => match message {
                    Some(Inbox::Directive(Directive::Disconnect)) => {
                        dispatcher.disconnect();
                        break;
                    }
                    Some(message) => dispatcher.handle_inbox(message),
                    None => {
                        debug!(connection_id = %dispatcher.id, "Manager dropped");
                        dispatcher.disconnect();
                        break;
                    }
                },

                notification = notifications.recv() => match notification {
                    Some(Notification::Closed) | None => {
                        dispatcher.transport_closed();
                        break;
                    }
                    Some(notification) => dispatcher.handle_notification(notification),
                },
            }
        }

        debug!(connection_id = %dispatcher.id, "Connection task terminated");
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// State owned by the dispatch task.
struct Dispatcher {
    id: ConnectionId,
    state: Arc<Mutex<ConnectionState>>,
    transport: Arc<dyn Transport>,
    publisher: EventPublisher,
    sink: Arc<SharedSink>,
    settings: ConnectionSettings,
    reassembler: ChunkReassembler,
    printables: FxHashMap<JobId, Printable>,
    inbox: mpsc::WeakUnboundedSender<Inbox>,
    on_close: Option<CloseHook>,
}

impl Dispatcher {
    // ========================================================================
    // State
    // ========================================================================

    /// Moves to `next`. Returns `false` if already there.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if *state == next {
            return false;
        }
        let from = *state;
        trace!(connection_id = %self.id, %from, to = %next, "State transition");
        *state = next;
        true
    }

    /// Moves to `Disconnected`, publishing the event once.
    fn mark_disconnected(&self) {
        if self.transition(ConnectionState::Disconnected) {
            self.publisher.publish(PrintEvent::Disconnected);
        }
    }

    /// Drops buffered jobs and undelivered printables.
    fn clear_jobs(&mut self) {
        let partial = self.reassembler.discard_all();
        let printables = self.printables.len();
        self.printables.clear();

        if partial > 0 || printables > 0 {
            debug!(connection_id = %self.id, partial, printables, "Discarded print jobs");
        }
    }

    /// Handles an explicit disconnect.
    fn disconnect(&mut self) {
        self.transport.shutdown();
        self.clear_jobs();
        self.mark_disconnected();
        info!(connection_id = %self.id, "Print connection closed");
    }

    /// Handles a transport that stopped for good.
    fn transport_closed(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close(self.id);
        }
        self.clear_jobs();
        self.mark_disconnected();
        info!(connection_id = %self.id, "Print transport closed");
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    fn handle_notification(&mut self, notification: Notification) {
        match notification {
            Notification::Connected => {
                if self.transition(ConnectionState::Connected) {
                    info!(connection_id = %self.id, "Print connection established");
                    self.publisher.publish(PrintEvent::Connected);
                } else {
                    debug!(connection_id = %self.id, "Ignoring duplicate connected");
                }
            }

            Notification::Disconnected => {
                if self.transition(ConnectionState::Disconnected) {
                    info!(connection_id = %self.id, "Print connection lost");
                    self.publisher.publish(PrintEvent::Disconnected);
                } else {
                    debug!(connection_id = %self.id, "Ignoring duplicate disconnected");
                }
            }

            Notification::ConnectError(message) => {
                self.publish_error(ErrorKind::Connection, message);
            }

            Notification::Error(message) => {
                self.publish_error(ErrorKind::Transport, message);
            }

            Notification::Exception(message) => {
                self.publish_error(ErrorKind::Exception, message);
            }

            Notification::JobHandled(job_id) => {
                if self.printables.remove(&job_id).is_some() {
                    debug!(connection_id = %self.id, %job_id, "Printable handled elsewhere");
                }
                self.publisher.publish(PrintEvent::JobHandled { job_id });
            }

            Notification::TransferStarted(job_id) => {
                self.publisher.publish(PrintEvent::TransferStarted { job_id });
            }

            Notification::TransferTerminated(job_id) => {
                self.publisher
                    .publish(PrintEvent::TransferTerminated { job_id });
            }

            Notification::Chunk { chunk, ack } => self.handle_chunk(chunk, ack),

            // Handled by the run loop.
            Notification::Closed => {}
        }
    }

    fn handle_chunk(&mut self, chunk: Chunk, ack: Ack) {
        let mut ack = Some(ack);

        for step in self.reassembler.push(chunk) {
            match step {
                Step::Rejected { reason, .. } => {
                    if let Some(ack) = ack.take() {
                        ack.send(false);
                    }
                    self.publish_error(ErrorKind::Protocol, reason);
                }

                Step::Received {
                    job_id,
                    chunk_id,
                    chunk_count,
                    chunk_length,
                } => {
                    if let Some(ack) = ack.take() {
                        ack.send(true);
                    }
                    self.publisher.publish(PrintEvent::ChunkReceived {
                        job_id,
                        chunk_id,
                        chunk_count,
                        chunk_length,
                    });
                }

                Step::Evicted { reason, .. } => {
                    self.publish_error(ErrorKind::Protocol, reason);
                }

                Step::Completed(printable) => {
                    let event = PrintEvent::JobAvailable {
                        job_id: printable.job_id,
                        file_name: printable.file_name.clone(),
                        file_length: printable.file_length(),
                    };
                    debug!(
                        connection_id = %self.id,
                        job_id = %printable.job_id,
                        file_length = printable.file_length(),
                        "Print job available"
                    );
                    if self
                        .printables
                        .insert(printable.job_id, printable)
                        .is_some()
                    {
                        debug!(connection_id = %self.id, "Replaced unopened printable");
                    }
                    self.publisher.publish(event);
                }

                Step::LengthMismatch { .. } => {
                    self.publish_error(ErrorKind::Protocol, INCONSISTENT_FILE_LENGTH);
                }

                Step::DecodeFailed { reason, .. } => {
                    self.publish_error(
                        ErrorKind::Protocol,
                        format!("Invalid print data encoding: {reason}"),
                    );
                }

                // Logged by the reassembler; no event.
                Step::Dropped { .. } => {}
            }
        }
    }

    fn publish_error(&self, kind: ErrorKind, message: impl Into<String>) {
        let message = message.into();
        debug!(connection_id = %self.id, ?kind, %message, "Publishing error");
        self.publisher.publish(PrintEvent::error(kind, message));
    }

    // ========================================================================
    // Inbox
    // ========================================================================

    fn handle_inbox(&mut self, message: Inbox) {
        match message {
            Inbox::Directive(Directive::EnablePrinting) => {
                self.spawn_request(Command::EnablePrint);
            }
            Inbox::Directive(Directive::DisablePrinting) => {
                self.spawn_request(Command::DisablePrint);
            }
            Inbox::Directive(Directive::OpenPrintable(job_id)) => self.open_printable(job_id),
            // Handled by the run loop.
            Inbox::Directive(Directive::Disconnect) => {}
            Inbox::Requested { command, outcome } => self.handle_request_outcome(command, outcome),
            Inbox::Rendered { job_id, delivered } => {
                if delivered {
                    debug!(connection_id = %self.id, %job_id, "Printable rendered");
                } else {
                    self.publisher.publish(PrintEvent::RenderFailed { job_id });
                }
            }
        }
    }

    /// Sends a correlated request from a detached task.
    fn spawn_request(&self, command: Command) {
        let transport = Arc::clone(&self.transport);
        let inbox = self.inbox.clone();
        let request_timeout = self.settings.request_timeout;

        debug!(connection_id = %self.id, method = command.method(), "Sending request");

        tokio::spawn(async move {
            let outcome = match timeout(request_timeout, transport.request(command, request_timeout)).await {
                Ok(Ok(acked)) => RequestOutcome::Acked(acked),
                Ok(Err(e)) if e.is_timeout() => RequestOutcome::TimedOut,
                Ok(Err(e)) => RequestOutcome::Failed(e.to_string()),
                Err(_) => RequestOutcome::TimedOut,
            };

            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(Inbox::Requested { command, outcome });
            }
        });
    }

    fn handle_request_outcome(&self, command: Command, outcome: RequestOutcome) {
        match outcome {
            RequestOutcome::Acked(true) => match command {
                Command::EnablePrint => self.publisher.publish(PrintEvent::PrintEnabled),
                Command::DisablePrint => self.publisher.publish(PrintEvent::PrintDisabled),
                Command::JobHandled(_) => {}
            },
            RequestOutcome::Acked(false) => {
                self.publish_error(
                    ErrorKind::Exception,
                    format!("Server rejected {}", command.method()),
                );
            }
            RequestOutcome::TimedOut => {
                self.publish_error(
                    ErrorKind::Timeout,
                    format!(
                        "{} was not acknowledged within {}ms",
                        command.method(),
                        self.settings.request_timeout.as_millis()
                    ),
                );
            }
            RequestOutcome::Failed(message) => {
                self.publish_error(ErrorKind::Transport, message);
            }
        }
    }

    /// Acknowledges a printable to the server and hands it to the sink.
    fn open_printable(&mut self, job_id: JobId) {
        let Some(printable) = self.printables.remove(&job_id) else {
            debug!(connection_id = %self.id, %job_id, "No printable to open");
            return;
        };

        if let Err(e) = self.transport.notify(Command::JobHandled(job_id)) {
            warn!(connection_id = %self.id, %job_id, error = %e, "Failed to acknowledge print job");
        }

        let sink = self.sink.get();
        let inbox = self.inbox.clone();
        let render_timeout = self.settings.render_timeout;
        let connection_id = self.id;

        debug!(%connection_id, %job_id, "Delivering printable to render sink");

        tokio::spawn(async move {
            let render = tokio::spawn(async move { sink.open(printable).await });

            let delivered = match timeout(render_timeout, render).await {
                Ok(Ok(Ok(()))) => true,
                Ok(Ok(Err(e))) => {
                    warn!(%connection_id, %job_id, error = %e, "Render sink failed");
                    false
                }
                Ok(Err(e)) => {
                    warn!(%connection_id, %job_id, error = %e, "Render task panicked");
                    false
                }
                Err(_) => {
                    warn!(
                        %connection_id,
                        %job_id,
                        timeout_ms = render_timeout.as_millis(),
                        "Render sink did not answer in time"
                    );
                    false
                }
            };

            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(Inbox::Rendered { job_id, delivered });
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use futures_util::future::pending;

    use crate::error::Result;
    use crate::render::{NullSink, RenderSink};
    use crate::session::{EventStream, event_channel};

    /// Transport that records notifies and answers requests with a fixed ack.
    #[derive(Default)]
    struct RecordingTransport {
        ack: Option<bool>,
        notified: Mutex<Vec<Command>>,
        shutdown: Mutex<bool>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn request(&self, _command: Command, _timeout: Duration) -> Result<bool> {
            match self.ack {
                Some(ack) => Ok(ack),
                None => pending().await,
            }
        }

        fn notify(&self, command: Command) -> Result<()> {
            self.notified.lock().push(command);
            Ok(())
        }

        fn shutdown(&self) {
            *self.shutdown.lock() = true;
        }
    }

    struct Harness {
        handle: ConnectionHandle,
        notify_tx: mpsc::UnboundedSender<Notification>,
        events: EventStream,
        transport: Arc<RecordingTransport>,
    }

    fn start(ack: Option<bool>, sink: Arc<dyn RenderSink>) -> Harness {
        let id = ConnectionId::next();
        let transport = Arc::new(RecordingTransport {
            ack,
            ..RecordingTransport::default()
        });
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (publisher, events) = event_channel(id);
        let settings = ConnectionSettings {
            reassembly: ReassemblyConfig::default(),
            request_timeout: Duration::from_millis(50),
            render_timeout: Duration::from_millis(50),
        };

        let (connection, handle) = Connection::new(
            id,
            Arc::clone(&transport) as Arc<dyn Transport>,
            notify_rx,
            publisher,
            Arc::new(SharedSink::new(move || Arc::clone(&sink))),
            settings,
            Box::new(|_| {}),
        );
        tokio::spawn(connection.run());

        Harness {
            handle,
            notify_tx,
            events,
            transport,
        }
    }

    fn chunk(chunk: Chunk) -> Notification {
        Notification::Chunk {
            chunk,
            ack: Ack::noop(),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[tokio::test]
    async fn test_duplicate_connected_publishes_once() {
        let mut h = start(Some(true), Arc::new(NullSink));

        h.notify_tx.send(Notification::Connected).expect("send");
        h.notify_tx.send(Notification::Connected).expect("send");
        h.notify_tx.send(Notification::Disconnected).expect("send");
        h.notify_tx.send(Notification::Disconnected).expect("send");
        h.notify_tx.send(Notification::Connected).expect("send");

        assert_eq!(h.events.next_event().await, Some(PrintEvent::Connected));
        assert_eq!(h.events.next_event().await, Some(PrintEvent::Disconnected));
        assert_eq!(h.events.next_event().await, Some(PrintEvent::Connected));
        assert_eq!(h.handle.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream() {
        let mut h = start(Some(true), Arc::new(NullSink));

        h.notify_tx.send(Notification::Connected).expect("send");
        assert_eq!(h.events.next_event().await, Some(PrintEvent::Connected));

        assert!(h.handle.send(Directive::Disconnect));
        assert_eq!(h.events.next_event().await, Some(PrintEvent::Disconnected));
        assert_eq!(h.events.next_event().await, None);
        assert!(*h.transport.shutdown.lock());
        assert_eq!(h.handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_transport_closed_ends_stream() {
        let mut h = start(Some(true), Arc::new(NullSink));

        h.notify_tx.send(Notification::ConnectError("refused".into())).expect("send");
        h.notify_tx.send(Notification::Closed).expect("send");

        assert_eq!(
            h.events.next_event().await,
            Some(PrintEvent::error(ErrorKind::Connection, "refused"))
        );
        assert_eq!(h.events.next_event().await, Some(PrintEvent::Disconnected));
        assert_eq!(h.events.next_event().await, None);
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    #[tokio::test]
    async fn test_open_printable_acks_once() {
        let mut h = start(Some(true), Arc::new(NullSink));
        let job_id = JobId::new(4);

        for c in Chunk::split_document(job_id, "a.pdf", b"hello", 1024) {
            h.notify_tx.send(chunk(c)).expect("send");
        }
        assert!(matches!(h.events.next_event().await, Some(PrintEvent::ChunkReceived { .. })));
        assert!(matches!(
            h.events.next_event().await,
            Some(PrintEvent::JobAvailable { file_length: 5, .. })
        ));

        h.handle.send(Directive::OpenPrintable(job_id));
        h.handle.send(Directive::OpenPrintable(job_id));
        h.handle.send(Directive::Disconnect);

        assert_eq!(h.events.next_event().await, Some(PrintEvent::Disconnected));
        assert_eq!(*h.transport.notified.lock(), vec![Command::JobHandled(job_id)]);
    }

    #[tokio::test]
    async fn test_server_job_handled_removes_printable() {
        let mut h = start(Some(true), Arc::new(NullSink));
        let job_id = JobId::new(5);

        for c in Chunk::split_document(job_id, "a.pdf", b"x", 1024) {
            h.notify_tx.send(chunk(c)).expect("send");
        }
        h.notify_tx.send(Notification::JobHandled(job_id)).expect("send");

        h.events.next_event().await;
        h.events.next_event().await;
        assert_eq!(h.events.next_event().await, Some(PrintEvent::JobHandled { job_id }));

        h.handle.send(Directive::OpenPrintable(job_id));
        h.handle.send(Directive::Disconnect);
        assert_eq!(h.events.next_event().await, Some(PrintEvent::Disconnected));
        assert!(h.transport.notified.lock().is_empty());
    }

    // ========================================================================
    // Requests
    // ========================================================================

    #[tokio::test]
    async fn test_enable_acked() {
        let mut h = start(Some(true), Arc::new(NullSink));
        h.handle.send(Directive::EnablePrinting);
        assert_eq!(h.events.next_event().await, Some(PrintEvent::PrintEnabled));
    }

    #[tokio::test]
    async fn test_disable_rejected() {
        let mut h = start(Some(false), Arc::new(NullSink));
        h.handle.send(Directive::DisablePrinting);
        assert_eq!(
            h.events.next_event().await.and_then(|e| e.error_kind()),
            Some(ErrorKind::Exception)
        );
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let mut h = start(None, Arc::new(NullSink));
        h.handle.send(Directive::EnablePrinting);
        assert_eq!(
            h.events.next_event().await.and_then(|e| e.error_kind()),
            Some(ErrorKind::Timeout)
        );
    }
}
