//! Wire framing for message batches.
//!
//! A batch packs any number of complete [`Message`](crate::Message)s into
//! one physical payload so that transports without native message framing
//! (polling, server-sent events) can carry them.
//!
//! # Text Batch Format
//!
//! ```text
//! batch   := 'T' record*
//! record  := length ':' type ':' payload ';'
//! length  := 1*DIGIT
//! type    := 'T' | 'B' | 'C' | 'E'
//! payload := length bytes, verbatim for T/C/E, Base64 for B
//! ```
//!
//! The `length` of a `B` record counts the Base64 characters, not the
//! decoded bytes.
//!
//! # Example
//!
//! ```
//! use sockets_client::format::{decode_all, encode};
//! use sockets_client::{Message, MessageType};
//!
//! let messages = decode_all(b"T3:T:ABC;8:B:q83vEg==;").unwrap();
//! assert_eq!(messages[0].payload().as_ref(), b"ABC");
//! assert_eq!(messages[1].message_type(), MessageType::Binary);
//!
//! let wire = encode(&[Message::text("ABC")]);
//! assert_eq!(wire.as_ref(), b"T3:T:ABC;");
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Text batch reader and writer.
pub mod text;

// ============================================================================
// Re-exports
// ============================================================================

pub use text::{TextBatchReader, decode_all, encode, read_messages, write_messages};
