//! Error types for the sockets client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use sockets_client::{Connection, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     connection.send(b"hello".to_vec()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Setup | [`Error::InvalidArgument`], [`Error::NegotiationFailed`], [`Error::TransportStartFailed`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::PipeClosed`], [`Error::Transport`] |
//! | Framing | [`Error::Format`] (see [`FormatError`]) |
//! | External | [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Setup Errors
    // ========================================================================
    /// A required argument was missing or malformed.
    ///
    /// Returned by `connect` before any I/O happens.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// The negotiation request did not yield a connection id.
    #[error("Negotiation with '{url}' failed: {message}")]
    NegotiationFailed {
        /// The negotiate URL that was requested.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The transport refused to start.
    #[error("Transport '{transport}' failed to start: {message}")]
    TransportStartFailed {
        /// Type name of the transport.
        transport: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The connection is closed and cannot send.
    #[error("Cannot send messages if the connection is disconnected")]
    ConnectionClosed,

    /// A write hit a completed pipe.
    #[error("Pipe closed")]
    PipeClosed,

    /// The transport completed its side of the pipe with a failure.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    // ========================================================================
    // Framing Errors
    // ========================================================================
    /// A text batch could not be parsed.
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    // ========================================================================
    // External Errors
    // ========================================================================
    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// FormatError
// ============================================================================

/// Failure while decoding a text message batch.
///
/// Every variant aborts the batch; there is no partial-record recovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Batch is empty or does not start with `T`.
    #[error("Missing 'T' prefix in Text Message Batch.")]
    MissingPrefix,

    /// No `:` terminates the length field.
    #[error("Unexpected end-of-message while reading Length field.")]
    UnterminatedLength,

    /// Length field holds a non-digit or overflows.
    #[error("Invalid length.")]
    InvalidLength,

    /// No `:` terminates the type field.
    #[error("Unexpected end-of-message while reading Type field.")]
    UnterminatedType,

    /// Type field is not exactly one byte.
    #[error("Type field must be exactly one byte long.")]
    InvalidTypeLength,

    /// Type byte is not one of `T`, `B`, `C`, `E`.
    #[error("Unknown Type value: '{0}'.")]
    UnknownType(char),

    /// Fewer payload bytes than declared.
    #[error("Unexpected end-of-message while reading Payload field.")]
    UnterminatedPayload,

    /// Payload is not followed by `;`.
    #[error("Payload is missing trailer character ';'.")]
    MissingTrailer,

    /// Binary payload is not valid Base64.
    ///
    /// The declared length described the encoded form, so this is reported
    /// alongside [`FormatError::InvalidLength`] by
    /// [`FormatError::is_length_error`].
    #[error("Invalid length: binary payload is not valid Base64 ({0}).")]
    InvalidBase64(String),
}

impl FormatError {
    /// Returns `true` if the declared length could not be honoured.
    #[inline]
    #[must_use]
    pub fn is_length_error(&self) -> bool {
        matches!(self, Self::InvalidLength | Self::InvalidBase64(_))
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a negotiation failed error.
    #[inline]
    pub fn negotiation_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NegotiationFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a transport start failed error.
    #[inline]
    pub fn transport_start_failed(
        transport: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TransportStartFailed {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error happened while setting up a connection.
    #[inline]
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::NegotiationFailed { .. }
                | Self::TransportStartFailed { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::PipeClosed | Self::Transport { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
