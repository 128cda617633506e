//! Connection options.
//!
//! Controls how the negotiate URL and the connected URL are derived from the
//! endpoint URL.
//!
//! # Example
//!
//! ```
//! use sockets_client::client::ConnectOptions;
//!
//! let options = ConnectOptions::new()
//!     .with_negotiate_path("handshake")
//!     .with_id_param("connectionId");
//!
//! assert_eq!(options.negotiate_path, "handshake");
//! ```

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::identifiers::ConnectionId;

// ============================================================================
// Constants
// ============================================================================

/// Path segment appended to the endpoint for negotiation.
pub const DEFAULT_NEGOTIATE_PATH: &str = "negotiate";

/// Query parameter carrying the connection id.
pub const DEFAULT_ID_PARAM: &str = "id";

// ============================================================================
// ConnectOptions
// ============================================================================

/// Options applied while connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Path segment appended to the endpoint URL for negotiation.
    pub negotiate_path: String,

    /// Query parameter name carrying the negotiated connection id.
    pub id_param: String,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectOptions {
    /// Creates options with the default negotiate path and id parameter.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            negotiate_path: DEFAULT_NEGOTIATE_PATH.to_string(),
            id_param: DEFAULT_ID_PARAM.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectOptions {
    /// Sets the negotiation path segment.
    #[inline]
    #[must_use]
    pub fn with_negotiate_path(mut self, path: impl Into<String>) -> Self {
        self.negotiate_path = path.into();
        self
    }

    /// Sets the connection id query parameter name.
    #[inline]
    #[must_use]
    pub fn with_id_param(mut self, param: impl Into<String>) -> Self {
        self.id_param = param.into();
        self
    }
}

// ============================================================================
// URL Composition
// ============================================================================

impl ConnectOptions {
    /// Appends the negotiate path to the endpoint path.
    ///
    /// `http://host/chat?x=1` becomes `http://host/chat/negotiate?x=1`.
    #[must_use]
    pub fn negotiate_url(&self, url: &Url) -> Url {
        let mut negotiate = url.clone();
        let base = url.path().trim_end_matches('/');
        let segment = self.negotiate_path.trim_start_matches('/');
        negotiate.set_path(&format!("{base}/{segment}"));
        negotiate
    }

    /// Appends the connection id to the endpoint query.
    ///
    /// Existing query pairs are kept.
    #[must_use]
    pub fn connected_url(&self, url: &Url, connection_id: &ConnectionId) -> Url {
        let mut connected = url.clone();
        connected
            .query_pairs_mut()
            .append_pair(&self.id_param, connection_id.as_str());
        connected
    }
}

// ============================================================================
// Tests
// ============================================================================
