//! WebSocket event loop and request correlation.
//!
//! This module owns the WebSocket to the print server, including
//! request/response correlation, chunk acknowledgement and reconnection.
//!
//! # Event Loop
//!
//! The transport spawns one tokio task that:
//!
//! - Dials the server and re-dials according to the [`ReconnectPolicy`](super::ReconnectPolicy)
//! - Turns incoming events into [`Notification`]s
//! - Writes outgoing requests, notifies and chunk acknowledgements
//! - Correlates responses with pending requests by UUID
//!
//! Notifies issued while the socket is down are buffered (up to
//! [`MAX_OFFLINE_NOTIFIES`], oldest dropped first) and written as soon as
//! the next session opens. Requests and event replies are not buffered.
//!
//! # Wire Format
//!
//! Every frame is a single JSON text message (see [`crate::protocol`]).
//! This is not the socket.io framing: talking to a socket.io print server
//! needs an adapter [`Connector`](super::Connector).

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{from_str, to_string};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Command, Event, EventReply, ParsedEvent, Request, Response};

use super::connector::{WsStream, dial, redacted};
use super::{Ack, Endpoint, Notification, NotificationSender, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Maximum pending requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 100;

/// Maximum notifies buffered while the socket is down.
pub const MAX_OFFLINE_NOTIFIES: usize = 100;

/// Event method that carries job chunks.
const CHUNK_METHOD: &str = "print_job_data";

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

/// Write half of the WebSocket.
type WsWrite = SplitSink<WsStream, Message>;

// ============================================================================
// TransportCommand
// ============================================================================

/// Internal commands for the event loop.
enum TransportCommand {
    /// Send a request and wait for response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Send a request without waiting.
    Notify(Request),
    /// Answer a server event.
    Reply(EventReply),
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Shutdown the transport.
    Shutdown,
}

/// Why a session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Remote closed or the socket failed.
    Lost,
    /// Local shutdown requested.
    Shutdown,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket transport to a print server.
///
/// Cheap to clone; clones share the same event loop.
#[derive(Clone)]
pub struct WebSocketTransport {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<TransportCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
}

impl WebSocketTransport {
    /// Spawns the transport task and returns its handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(endpoint: Endpoint, notifications: NotificationSender) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));

        tokio::spawn(Self::run(
            endpoint,
            command_rx,
            command_tx.downgrade(),
            Arc::clone(&correlation),
            notifications,
        ));

        Self {
            command_tx,
            correlation,
        }
    }

    /// Sends a request and waits for its response.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the transport is gone
    /// - [`Error::RequestTimeout`] if no response arrives within `request_timeout`
    /// - [`Error::Protocol`] if too many requests are pending
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        let request_id = request.id;

        // Check pending request limit
        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(TransportCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(TransportCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }
}

// ============================================================================
// WebSocketTransport - Transport
// ============================================================================

#[async_trait]
impl Transport for WebSocketTransport {
    async fn request(&self, command: Command, request_timeout: Duration) -> Result<bool> {
        let response = self
            .send_with_timeout(Request::new(command), request_timeout)
            .await?;

        if !response.is_success() {
            debug!(
                method = command.method(),
                message = response.message.as_deref().unwrap_or_default(),
                "Server answered with error"
            );
        }

        Ok(response.ack())
    }

    fn notify(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(TransportCommand::Notify(Request::new(command)))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn shutdown(&self) {
        let _ = self.command_tx.send(TransportCommand::Shutdown);
    }
}

// ============================================================================
// WebSocketTransport - Event Loop
// ============================================================================

impl WebSocketTransport {
    /// Supervisor loop: dial, run a session, back off, repeat.
    async fn run(
        endpoint: Endpoint,
        mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
        reply_tx: mpsc::WeakUnboundedSender<TransportCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        notifications: NotificationSender,
    ) {
        let url = redacted(&endpoint);
        let mut attempt: u32 = 0;
        let mut offline = VecDeque::new();

        loop {
            match dial(&endpoint).await {
                Ok(ws_stream) => {
                    attempt = 0;
                    info!(url = %url, "Print server connected");
                    let _ = notifications.send(Notification::Connected);

                    let end = Self::run_session(
                        ws_stream,
                        &mut offline,
                        &mut command_rx,
                        &reply_tx,
                        &correlation,
                        &notifications,
                    )
                    .await;

                    Self::fail_pending_requests(&correlation);
                    let _ = notifications.send(Notification::Disconnected);

                    if end == SessionEnd::Shutdown {
                        break;
                    }
                    info!(url = %url, "Print server connection lost");
                }

                Err(e) => {
                    warn!(url = %url, error = %e, "Print server connection failed");
                    let _ = notifications.send(Notification::ConnectError(e.to_string()));
                }
            }

            attempt = attempt.saturating_add(1);
            let Some(delay) = endpoint.reconnection.delay_for(attempt) else {
                debug!(attempt, "Reconnection exhausted or disabled");
                break;
            };

            debug!(attempt, delay_ms = delay.as_millis(), "Reconnecting after delay");
            if Self::back_off(delay, &mut command_rx, &mut offline, &correlation).await
                == SessionEnd::Shutdown
            {
                break;
            }
        }

        if !offline.is_empty() {
            warn!(count = offline.len(), "Discarding notifies buffered while offline");
        }
        Self::fail_pending_requests(&correlation);
        let _ = notifications.send(Notification::Closed);

        debug!(url = %url, "Transport loop terminated");
    }

    /// Waits out a reconnect delay while rejecting commands that need a socket.
    async fn back_off(
        delay: Duration,
        command_rx: &mut mpsc::UnboundedReceiver<TransportCommand>,
        offline: &mut VecDeque<Request>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) -> SessionEnd {
        let mut delay = pin!(sleep(delay));

        loop {
            tokio::select! {
                () = &mut delay => return SessionEnd::Lost,

                command = command_rx.recv() => match command {
                    Some(TransportCommand::Shutdown) | None => return SessionEnd::Shutdown,
                    Some(command) => Self::handle_offline(command, offline, correlation),
                },
            }
        }
    }

    /// Handles a command that arrived while no socket is open.
    fn handle_offline(
        command: TransportCommand,
        offline: &mut VecDeque<Request>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        match command {
            TransportCommand::Send { response_tx, .. } => {
                let _ = response_tx.send(Err(Error::ConnectionClosed));
            }
            TransportCommand::Notify(request) => {
                if offline.len() >= MAX_OFFLINE_NOTIFIES
                    && let Some(dropped) = offline.pop_front()
                {
                    warn!(
                        method = dropped.command.method(),
                        max = MAX_OFFLINE_NOTIFIES,
                        "Offline notify buffer full, dropping oldest"
                    );
                }
                debug!(method = request.command.method(), "Buffering notify until reconnected");
                offline.push_back(request);
            }
            TransportCommand::Reply(reply) => {
                debug!(id = %reply.id, "Dropping event reply while offline");
            }
            TransportCommand::RemoveCorrelation(request_id) => {
                correlation.lock().remove(&request_id);
            }
            TransportCommand::Shutdown => {}
        }
    }

    /// Runs one established WebSocket session until it ends.
    async fn run_session(
        ws_stream: WsStream,
        offline: &mut VecDeque<Request>,
        command_rx: &mut mpsc::UnboundedReceiver<TransportCommand>,
        reply_tx: &mpsc::WeakUnboundedSender<TransportCommand>,
        correlation: &Arc<Mutex<CorrelationMap>>,
        notifications: &NotificationSender,
    ) -> SessionEnd {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        if !offline.is_empty() {
            debug!(count = offline.len(), "Flushing notifies buffered while offline");
        }
        while let Some(request) = offline.pop_front() {
            Self::write_json(&mut ws_write, &request).await;
        }

        loop {
            tokio::select! {
                // Incoming messages from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, reply_tx, correlation, notifications);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            return SessionEnd::Lost;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            let _ = notifications.send(Notification::Error(e.to_string()));
                            return SessionEnd::Lost;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            return SessionEnd::Lost;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the connection task
                command = command_rx.recv() => {
                    match command {
                        Some(TransportCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(request, response_tx, &mut ws_write, correlation).await;
                        }

                        Some(TransportCommand::Notify(request)) => {
                            Self::write_json(&mut ws_write, &request).await;
                            trace!(method = request.command.method(), "Notify sent");
                        }

                        Some(TransportCommand::Reply(reply)) => {
                            Self::write_json(&mut ws_write, &reply).await;
                            trace!(id = %reply.id, "Event reply sent");
                        }

                        Some(TransportCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(%request_id, "Removed timed-out correlation");
                        }

                        Some(TransportCommand::Shutdown) | None => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            return SessionEnd::Shutdown;
                        }
                    }
                }
            }
        }
    }

    /// Handles an incoming text message from the server.
    fn handle_incoming_message(
        text: &str,
        reply_tx: &mpsc::WeakUnboundedSender<TransportCommand>,
        correlation: &Arc<Mutex<CorrelationMap>>,
        notifications: &NotificationSender,
    ) {
        // Try to parse as Response first
        if let Ok(response) = from_str::<Response>(text) {
            let tx = correlation.lock().remove(&response.id);

            if let Some(tx) = tx {
                let _ = tx.send(Ok(response));
            } else {
                warn!(id = %response.id, "Response for unknown request");
            }
            return;
        }

        let event = match from_str::<Event>(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Failed to parse incoming message");
                return;
            }
        };

        let notification = match event.parse() {
            ParsedEvent::JobData(chunk) => {
                let ack = match event.id {
                    Some(id) => {
                        let reply_tx = reply_tx.clone();
                        Ack::new(move |accepted| {
                            if let Some(tx) = reply_tx.upgrade() {
                                let _ = tx.send(TransportCommand::Reply(EventReply::ack(
                                    id,
                                    CHUNK_METHOD,
                                    accepted,
                                )));
                            }
                        })
                    }
                    None => {
                        warn!(job_id = %chunk.job_id, "Chunk without id cannot be acknowledged");
                        Ack::noop()
                    }
                };
                Notification::Chunk { chunk, ack }
            }
            ParsedEvent::JobStarted(job_id) => Notification::TransferStarted(job_id),
            ParsedEvent::JobTerminated(job_id) => Notification::TransferTerminated(job_id),
            ParsedEvent::JobHandled(job_id) => Notification::JobHandled(job_id),
            ParsedEvent::Exception { message } => Notification::Exception(message),
            ParsedEvent::Error { message } => Notification::Error(message),
            ParsedEvent::Malformed { method, reason } => {
                warn!(%method, %reason, "Malformed server event");
                if method == CHUNK_METHOD
                    && let Some(id) = event.id
                    && let Some(tx) = reply_tx.upgrade()
                {
                    let _ = tx.send(TransportCommand::Reply(EventReply::ack(id, CHUNK_METHOD, false)));
                }
                Notification::Error(format!("Malformed {method} event: {reason}"))
            }
            ParsedEvent::Unknown { method, .. } => {
                debug!(%method, "Ignoring unknown server event");
                return;
            }
        };

        let _ = notifications.send(notification);
    }

    /// Handles a send command from the connection task.
    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut WsWrite,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await
            && let Some(tx) = correlation.lock().remove(&request_id)
        {
            let _ = tx.send(Err(Error::connection(e.to_string())));
        }

        trace!(%request_id, "Request sent");
    }

    /// Serializes and writes a message, logging failures.
    async fn write_json(ws_write: &mut WsWrite, message: &impl serde::Serialize) {
        match to_string(message) {
            Ok(json) => {
                if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                    warn!(error = %e, "Failed to write message");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize message"),
        }
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
