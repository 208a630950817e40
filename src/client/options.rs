//! Connection target and options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use printlink::{ConnectOptions, ConnectTarget, ReconnectPolicy};
//!
//! let target = ConnectTarget::new("print.example.com")
//!     .with_path("/client")
//!     .with_token("secret");
//!
//! let options = ConnectOptions::new()
//!     .with_request_timeout(Duration::from_secs(2))
//!     .with_reconnection(ReconnectPolicy::default().with_max_attempts(5));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::session::connection::ConnectionSettings;
use crate::session::reassembly::{DEFAULT_JOB_TIMEOUT, DEFAULT_MAX_PENDING_JOBS};
use crate::session::{ChunkOrdering, ReassemblyConfig};
use crate::transport::{Endpoint, ReconnectPolicy};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for one connection attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default timeout for `enable_print` / `disable_print` acknowledgements.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bounded wait for the render sink.
const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_millis(200);

/// Query parameter carrying the access token.
const TOKEN_QUERY_PARAM: &str = "token";

// ============================================================================
// ConnectTarget
// ============================================================================

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// Host, optionally with scheme and port (`print.local:9000`, `wss://host`).
    pub host: String,
    /// URL path on the server.
    pub path: Option<String>,
    /// Access token, sent as the `token` query parameter.
    pub token: Option<String>,
}

impl ConnectTarget {
    /// Creates a target for `host`.
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: None,
            token: None,
        }
    }

    /// Sets the URL path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the access token.
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Resolves the WebSocket URL.
    ///
    /// A host without scheme is dialed over `ws://`; `http` and `https` map
    /// to `ws` and `wss`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the host is empty or the scheme is unsupported
    /// - [`Error::Url`] if the host does not form a valid URL
    pub fn endpoint_url(&self) -> Result<Url> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(Error::config("host is required"));
        }

        let mut url = if host.contains("://") {
            Url::parse(host)?
        } else {
            Url::parse(&format!("ws://{host}"))?
        };

        let scheme = match url.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => {
                return Err(Error::config(format!(
                    "unsupported scheme '{other}', expected ws, wss, http or https"
                )));
            }
        };
        if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
            return Err(Error::config(format!("cannot use scheme '{scheme}'")));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::config("host is required"));
        }

        if let Some(path) = &self.path {
            url.set_path(path);
        }

        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
        }

        Ok(url)
    }
}

// ============================================================================
// ConnectOptions
// ============================================================================

/// Per-connection options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Reconnection policy, passed to the transport unmodified.
    pub reconnection: ReconnectPolicy,
    /// Timeout for one connection attempt.
    pub connect_timeout: Duration,
    /// Timeout for acknowledged requests.
    pub request_timeout: Duration,
    /// Bounded wait for the render sink.
    pub render_timeout: Duration,
    /// Maximum partial jobs buffered per connection.
    pub max_pending_jobs: usize,
    /// Idle time after which a partial job is abandoned.
    pub job_timeout: Duration,
    /// Chunk ordinal policy.
    pub ordering: ChunkOrdering,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            reconnection: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            max_pending_jobs: DEFAULT_MAX_PENDING_JOBS,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            ordering: ChunkOrdering::default(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn with_reconnection(mut self, reconnection: ReconnectPolicy) -> Self {
        self.reconnection = reconnection;
        self
    }

    /// Sets the connection attempt timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the request acknowledgement timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the render sink wait.
    #[inline]
    #[must_use]
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Sets the partial job capacity.
    #[inline]
    #[must_use]
    pub fn with_max_pending_jobs(mut self, max: usize) -> Self {
        self.max_pending_jobs = max;
        self
    }

    /// Sets the partial job idle timeout.
    #[inline]
    #[must_use]
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Sets the chunk ordinal policy.
    #[inline]
    #[must_use]
    pub fn with_ordering(mut self, ordering: ChunkOrdering) -> Self {
        self.ordering = ordering;
        self
    }
}

// ============================================================================
// Validation & Conversion
// ============================================================================

impl ConnectOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a timeout is zero, the job capacity is
    /// zero, or the reconnection policy is inconsistent.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("request_timeout", self.request_timeout),
            ("render_timeout", self.render_timeout),
            ("job_timeout", self.job_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }

        if self.max_pending_jobs == 0 {
            return Err(Error::config("max_pending_jobs must be greater than zero"));
        }

        self.reconnection.validate()
    }

    /// Returns the reassembler configuration.
    #[inline]
    #[must_use]
    pub fn reassembly_config(&self) -> ReassemblyConfig {
        ReassemblyConfig {
            max_pending_jobs: self.max_pending_jobs,
            job_timeout: self.job_timeout,
            ordering: self.ordering,
        }
    }

    /// Builds the transport endpoint for `url`.
    pub(crate) fn endpoint(&self, url: Url) -> Endpoint {
        Endpoint {
            url,
            reconnection: self.reconnection,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Returns the per-connection settings.
    pub(crate) fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            reassembly: self.reassembly_config(),
            request_timeout: self.request_timeout,
            render_timeout: self.render_timeout,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // ConnectTarget
    // ========================================================================

    #[test]
    fn test_bare_host_uses_ws() {
        let url = ConnectTarget::new("print.local:9000").endpoint_url().expect("url");
        assert_eq!(url.as_str(), "ws://print.local:9000/");
    }

    #[test]
    fn test_https_maps_to_wss() {
        let url = ConnectTarget::new("https://print.example.com")
            .endpoint_url()
            .expect("url");
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn test_path_and_token() {
        let url = ConnectTarget::new("ws://print.local")
            .with_path("/client")
            .with_token("a b")
            .endpoint_url()
            .expect("url");
        assert_eq!(url.as_str(), "ws://print.local/client?token=a+b");
    }

    #[test]
    fn test_empty_host_rejected() {
        let err = ConnectTarget::new("  ").endpoint_url().expect_err("empty host");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        let err = ConnectTarget::new("ftp://print.local")
            .endpoint_url()
            .expect_err("ftp");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_invalid_host_rejected() {
        let err = ConnectTarget::new("exa mple").endpoint_url().expect_err("space");
        assert!(matches!(err, Error::Url(_)));
    }

    // ========================================================================
    // ConnectOptions
    // ========================================================================

    #[test]
    fn test_defaults() {
        let options = ConnectOptions::default();
        assert_eq!(options.render_timeout, Duration::from_millis(200));
        assert_eq!(options.connect_timeout, Duration::from_secs(1));
        assert_eq!(options.max_pending_jobs, 64);
        assert_eq!(options.ordering, ChunkOrdering::Arrival);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let options = ConnectOptions::new().with_request_timeout(Duration::ZERO);
        let err = options.validate().expect_err("zero timeout");
        assert!(err.to_string().contains("request_timeout"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let options = ConnectOptions::new().with_max_pending_jobs(0);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_inconsistent_reconnection_rejected() {
        let policy = ReconnectPolicy::default()
            .with_delay(Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(1));
        let options = ConnectOptions::new().with_reconnection(policy);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_reassembly_config() {
        let config = ConnectOptions::new()
            .with_ordering(ChunkOrdering::Strict)
            .with_max_pending_jobs(3)
            .reassembly_config();
        assert_eq!(config.ordering, ChunkOrdering::Strict);
        assert_eq!(config.max_pending_jobs, 3);
    }
}
