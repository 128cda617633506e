//! Type-safe identifier wrappers.
//!
//! Newtypes keep server-issued ids from being mixed up with arbitrary strings.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use uuid::Uuid;

// ============================================================================
// ConnectionId
// ============================================================================

/// Opaque connection identifier issued by the server during negotiation.
///
/// The id is used verbatim as the `id` query parameter of the connected URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Creates an id from server-provided text, kept verbatim.
    ///
    /// Returns `None` if the text is empty.
    #[inline]
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Option<Self> {
        let id = id.as_ref();
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_string()))
        }
    }

    /// Generates a random id.
    ///
    /// Used by in-process negotiators that play the server role.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Tests
// ============================================================================
