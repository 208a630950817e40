//! WebSocket dialing.
//!
//! [`WebSocketConnector`] is the default [`Connector`]: it spawns a
//! [`WebSocketTransport`] that dials the print server in the background,
//! so opening a connection never waits for the network.
//!
//! # Connection Flow
//!
//! 1. `Connector::open` spawns the transport task and returns immediately
//! 2. The task dials `endpoint.url` with `endpoint.connect_timeout`
//! 3. On success it reports `Connected` and runs the session loop
//! 4. On failure or loss it reports and retries per the reconnect policy

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::{Error, Result};

use super::{Connector, Endpoint, NotificationSender, Transport, WebSocketTransport};

// ============================================================================
// Types
// ============================================================================

/// Client-side WebSocket stream.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Opens [`WebSocketTransport`]s.
///
/// `ws://` endpoints work out of the box. `wss://` needs a TLS backend
/// enabled on `tokio-tungstenite`; without one the attempt fails and is
/// reported as a connection error event.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &self,
        endpoint: Endpoint,
        notifications: NotificationSender,
    ) -> Result<Arc<dyn Transport>> {
        let transport = WebSocketTransport::spawn(endpoint, notifications);
        Ok(Arc::new(transport))
    }
}

// ============================================================================
// Dialing
// ============================================================================

/// Performs one connection attempt.
///
/// # Errors
///
/// - [`Error::Connection`] if the attempt times out
/// - [`Error::WebSocket`] if the handshake fails
pub(crate) async fn dial(endpoint: &Endpoint) -> Result<WsStream> {
    debug!(url = %redacted(endpoint), "Dialing print server");

    let (ws_stream, response) = timeout(endpoint.connect_timeout, connect_async(endpoint.url.as_str()))
        .await
        .map_err(|_| {
            Error::connection(format!(
                "Connection attempt timed out after {}ms",
                endpoint.connect_timeout.as_millis()
            ))
        })??;

    debug!(status = %response.status(), "WebSocket handshake completed");
    Ok(ws_stream)
}

/// Returns the endpoint URL without its query, which may carry the token.
pub(crate) fn redacted(endpoint: &Endpoint) -> String {
    let mut url = endpoint.url.clone();
    url.set_query(None);
    url.to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use url::Url;

    use crate::transport::ReconnectPolicy;

    fn endpoint(url: &str) -> Endpoint {
        Endpoint {
            url: Url::parse(url).expect("valid url"),
            reconnection: ReconnectPolicy::disabled(),
            connect_timeout: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_redacted_hides_token() {
        let endpoint = endpoint("ws://127.0.0.1:9000/print?token=secret");
        let shown = redacted(&endpoint);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("/print"));
    }

    #[tokio::test]
    async fn test_dial_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let result = dial(&endpoint(&format!("ws://127.0.0.1:{port}"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dial_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let _ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let result = dial(&endpoint(&format!("ws://127.0.0.1:{port}"))).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_connector_open_does_not_block() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = WebSocketConnector::new()
            .open(endpoint("ws://127.0.0.1:9"), tx)
            .expect("open");
        transport.shutdown();
    }
}
