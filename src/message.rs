//! Message unit exchanged between the application and a transport.
//!
//! A [`Message`] carries an immutable payload, a [`MessageType`] tag and an
//! end-of-message flag. Batches produced by this crate only ever contain
//! complete messages, so the flag is always `true` for decoded messages.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use bytes::Bytes;

// ============================================================================
// MessageType
// ============================================================================

/// Kind of payload carried by a [`Message`].
///
/// | Type | Wire tag | Payload on the wire |
/// |------|----------|---------------------|
/// | `Text` | `T` | verbatim |
/// | `Binary` | `B` | Base64 |
/// | `Close` | `C` | verbatim |
/// | `Error` | `E` | verbatim |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Text payload.
    Text,
    /// Binary payload.
    Binary,
    /// Close notification, payload is the reason.
    Close,
    /// Error notification, payload is the error text.
    Error,
}

impl MessageType {
    /// Returns the single-byte wire tag.
    #[inline]
    #[must_use]
    pub const fn as_tag(self) -> u8 {
        match self {
            Self::Text => b'T',
            Self::Binary => b'B',
            Self::Close => b'C',
            Self::Error => b'E',
        }
    }

    /// Parses a wire tag.
    #[inline]
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'T' => Some(Self::Text),
            b'B' => Some(Self::Binary),
            b'C' => Some(Self::Close),
            b'E' => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "Text",
            Self::Binary => "Binary",
            Self::Close => "Close",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Message
// ============================================================================

/// One logical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
    message_type: MessageType,
    end_of_message: bool,
}

impl Message {
    /// Creates a message.
    #[inline]
    #[must_use]
    pub fn new(payload: impl Into<Bytes>, message_type: MessageType, end_of_message: bool) -> Self {
        Self {
            payload: payload.into(),
            message_type,
            end_of_message,
        }
    }

    /// Creates a complete text message.
    #[inline]
    #[must_use]
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(payload, MessageType::Text, true)
    }

    /// Creates a complete binary message.
    #[inline]
    #[must_use]
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(payload, MessageType::Binary, true)
    }

    /// Creates a complete close message.
    #[inline]
    #[must_use]
    pub fn close(reason: impl Into<Bytes>) -> Self {
        Self::new(reason, MessageType::Close, true)
    }

    /// Creates a complete error message.
    #[inline]
    #[must_use]
    pub fn error(message: impl Into<Bytes>) -> Self {
        Self::new(message, MessageType::Error, true)
    }

    /// Returns the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Returns `true` if this is the final fragment of a logical message.
    #[inline]
    #[must_use]
    pub const fn end_of_message(&self) -> bool {
        self.end_of_message
    }

    /// Consumes the message, returning its payload and type.
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (Bytes, MessageType) {
        (self.payload, self.message_type)
    }

    /// Consumes the message, returning its payload.
    #[inline]
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

// ============================================================================
// Tests
// ============================================================================
