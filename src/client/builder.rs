//! Builder pattern for connecting.
//!
//! Provides a fluent API for configuring and establishing a [`Connection`].
//!
//! # Example
//!
//! ```no_run
//! use sockets_client::Connection;
//! use sockets_client::client::{ConnectOptions, StaticNegotiator};
//! use sockets_client::transport::MemoryTransport;
//!
//! # async fn example() -> sockets_client::Result<()> {
//! let connection = Connection::builder()
//!     .url("http://localhost:5000/chat")
//!     .transport(MemoryTransport::new())
//!     .negotiator(StaticNegotiator::new("abc"))
//!     .options(ConnectOptions::new().with_id_param("connectionId"))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::field::Empty;
use tracing::{Instrument, Span, debug, error, info, info_span};
use url::Url;

use crate::channel::{self, CompletionError};
use crate::error::{Error, Result};
use crate::message::MessageType;
use crate::transport::Transport;

use super::connection::{ClosedHandler, Connection, Handlers, ReceivedHandler};
use super::negotiate::{HttpNegotiator, Negotiator};
use super::options::ConnectOptions;

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder for configuring a [`Connection`].
///
/// Use [`Connection::builder()`] to create a new builder.
#[derive(Default)]
pub struct ConnectionBuilder {
    /// Endpoint URL.
    url: Option<String>,
    /// Transport to start.
    transport: Option<Box<dyn Transport>>,
    /// Negotiation collaborator.
    negotiator: Option<Box<dyn Negotiator>>,
    /// URL composition options.
    options: ConnectOptions,
    /// Span for connection logs.
    span: Option<Span>,
    /// Received handler installed before the receive loop starts.
    on_received: Option<ReceivedHandler>,
    /// Closed handler installed before the receive loop starts.
    on_closed: Option<ClosedHandler>,
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("url", &self.url)
            .field("transport", &self.transport.as_ref().map(|t| t.name()))
            .field("has_negotiator", &self.negotiator.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionBuilder Implementation
// ============================================================================

impl ConnectionBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint URL.
    ///
    /// # Arguments
    ///
    /// * `url` - Endpoint URL (e.g., "http://localhost:5000/chat")
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Sets the negotiation collaborator.
    #[inline]
    #[must_use]
    pub fn negotiator(mut self, negotiator: impl Negotiator + 'static) -> Self {
        self.negotiator = Some(Box::new(negotiator));
        self
    }

    /// Negotiates over HTTP with `client`.
    ///
    /// Shorthand for `.negotiator(HttpNegotiator::with_client(client))`.
    #[inline]
    #[must_use]
    pub fn http_client(self, client: reqwest::Client) -> Self {
        self.negotiator(HttpNegotiator::with_client(client))
    }

    /// Sets URL composition options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the span connection logs are recorded in.
    ///
    /// Defaults to an `info` span named `connection` carrying the `url` and
    /// `connection_id` fields.
    #[inline]
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Sets the handler called for every received message.
    #[inline]
    #[must_use]
    pub fn on_received(
        mut self,
        handler: impl Fn(Bytes, MessageType) + Send + Sync + 'static,
    ) -> Self {
        self.on_received = Some(Arc::new(handler));
        self
    }

    /// Sets the handler called once when the connection closes.
    #[inline]
    #[must_use]
    pub fn on_closed(
        mut self,
        handler: impl FnOnce(Option<CompletionError>) + Send + 'static,
    ) -> Self {
        self.on_closed = Some(Box::new(handler));
        self
    }

    /// Negotiates, starts the transport and returns the open connection.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if url, transport or negotiator is not set,
    ///   or the url is not a valid base URL
    /// - [`Error::NegotiationFailed`] if no connection id was obtained
    /// - [`Error::TransportStartFailed`] if the transport did not start
    pub async fn connect(mut self) -> Result<Connection> {
        let span = self.span.take().unwrap_or_else(
            || info_span!("connection", url = Empty, connection_id = Empty),
        );
        self.connect_in(span.clone()).instrument(span).await
    }
}

// ============================================================================
// Connect Steps
// ============================================================================

impl ConnectionBuilder {
    async fn connect_in(self, span: Span) -> Result<Connection> {
        let url = self.validate_url()?;
        let transport = self
            .transport
            .ok_or_else(|| Error::invalid_argument("transport is required. Use .transport() to set it."))?;
        let negotiator = self.negotiator.ok_or_else(|| {
            Error::invalid_argument(
                "negotiator is required. Use .negotiator() or .http_client() to set it.",
            )
        })?;

        span.record("url", url.as_str());

        // Get a connection id from the server
        let negotiate_url = self.options.negotiate_url(&url);
        debug!(url = %negotiate_url, "Establishing connection");
        let connection_id = match negotiator.negotiate(&negotiate_url).await {
            Ok(connection_id) => connection_id,
            Err(e) => {
                error!(url = %negotiate_url, error = %e, "Failed to start connection. Error getting connection id");
                return Err(match e {
                    e @ Error::NegotiationFailed { .. } => e,
                    other => Error::negotiation_failed(negotiate_url.as_str(), other.to_string()),
                });
            }
        };
        span.record("connection_id", connection_id.as_str());
        debug!(connection_id = %connection_id, "Connection id received");

        let connected_url = self.options.connected_url(&url, &connection_id);
        let (local, remote) = channel::pair();

        // Start the transport, giving it one end of the channel
        if let Err(e) = transport.start(connected_url, remote).await {
            error!(transport = transport.name(), error = %e, "Failed to start connection. Error starting transport");
            return Err(Error::transport_start_failed(transport.name(), e.to_string()));
        }

        info!(transport = transport.name(), "Connection established");

        let handlers = Handlers::new(self.on_received, self.on_closed);
        Ok(Connection::start(
            url,
            connection_id,
            transport,
            local,
            handlers,
            span,
        ))
    }

    /// Validates the url configuration.
    fn validate_url(&self) -> Result<Url> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| Error::invalid_argument("url is required. Use .url() to set it."))?;

        let url = Url::parse(raw)
            .map_err(|e| Error::invalid_argument(format!("url '{raw}' is invalid: {e}")))?;

        if url.cannot_be_a_base() {
            return Err(Error::invalid_argument(format!(
                "url '{raw}' cannot carry a path"
            )));
        }

        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
