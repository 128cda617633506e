//! Negotiation: exchanging the endpoint URL for a connection id.
//!
//! The server answers a GET on `<url>/negotiate` with the connection id as
//! a UTF-8 text body.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

// ============================================================================
// Negotiator
// ============================================================================

/// Obtains a connection id from the server.
#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Requests a connection id from `negotiate_url`.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success response or an
    /// empty id.
    async fn negotiate(&self, negotiate_url: &Url) -> Result<ConnectionId>;
}

// ============================================================================
// HttpNegotiator
// ============================================================================

/// Negotiates over HTTP with a [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpNegotiator {
    client: reqwest::Client,
}

impl HttpNegotiator {
    /// Creates a negotiator with a default HTTP client.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a negotiator that reuses `client`.
    #[inline]
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Negotiator for HttpNegotiator {
    async fn negotiate(&self, negotiate_url: &Url) -> Result<ConnectionId> {
        let response = self
            .client
            .get(negotiate_url.clone())
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        trace!(len = body.len(), "Negotiate response received");

        ConnectionId::new(&body)
            .ok_or_else(|| Error::negotiation_failed(negotiate_url.as_str(), "empty connection id"))
    }
}

// ============================================================================
// StaticNegotiator
// ============================================================================

/// Hands out a fixed connection id without any I/O.
///
/// Useful for tests and for deployments where the id was obtained
/// out of band.
#[derive(Debug, Clone)]
pub struct StaticNegotiator {
    connection_id: Option<ConnectionId>,
}

impl StaticNegotiator {
    /// Creates a negotiator answering with `connection_id`.
    ///
    /// An empty id makes every negotiation fail.
    #[inline]
    #[must_use]
    pub fn new(connection_id: impl AsRef<str>) -> Self {
        Self {
            connection_id: ConnectionId::new(connection_id),
        }
    }

    /// Creates a negotiator answering with a random id.
    #[inline]
    #[must_use]
    pub fn random() -> Self {
        Self {
            connection_id: Some(ConnectionId::generate()),
        }
    }
}

#[async_trait]
impl Negotiator for StaticNegotiator {
    async fn negotiate(&self, negotiate_url: &Url) -> Result<ConnectionId> {
        self.connection_id
            .clone()
            .ok_or_else(|| Error::negotiation_failed(negotiate_url.as_str(), "empty connection id"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiate_url() -> Url {
        Url::parse("http://localhost/chat/negotiate").expect("valid url")
    }

    #[tokio::test]
    async fn test_static_negotiator() {
        let negotiator = StaticNegotiator::new("abc");
        let id = negotiator.negotiate(&negotiate_url()).await.expect("id");
        assert_eq!(id.as_str(), "abc");
    }

    #[tokio::test]
    async fn test_static_negotiator_empty_id_fails() {
        let negotiator = StaticNegotiator::new("");
        let err = negotiator.negotiate(&negotiate_url()).await.unwrap_err();
        assert!(matches!(err, Error::NegotiationFailed { .. }));
    }

    #[tokio::test]
    async fn test_random_negotiator() {
        let negotiator = StaticNegotiator::random();
        let first = negotiator.negotiate(&negotiate_url()).await.expect("id");
        let second = negotiator.negotiate(&negotiate_url()).await.expect("id");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_http_negotiator_unreachable_host() {
        let negotiator = HttpNegotiator::new();
        let url = Url::parse("http://127.0.0.1:1/negotiate").expect("valid url");
        let err = negotiator.negotiate(&url).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
