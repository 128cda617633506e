//! Sockets client - transport-agnostic realtime connection core.
//!
//! This library negotiates a logical connection with a server, pumps
//! messages between the application and a pluggable transport, and reads
//! and writes the text batch framing used by transports without native
//! message boundaries.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  send / received   ┌──────────────┐  channel::pair()  ┌──────────────┐
//! │ Application  │◄──────────────────►│  Connection  │◄─────────────────►│  Transport   │◄──► server
//! └──────────────┘                    └──────────────┘                   └──────────────┘
//! ```
//!
//! Key design principles:
//!
//! - The connection never performs network I/O besides negotiation
//! - Each direction of the channel is an unbounded FIFO queue
//! - Setup errors are returned from `connect`; later errors reach the
//!   closed handler
//!
//! # Quick Start
//!
//! ```no_run
//! use sockets_client::{Connection, Result};
//! use sockets_client::transport::MemoryTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = Connection::builder()
//!         .url("http://localhost:5000/chat")
//!         .transport(MemoryTransport::new())
//!         .http_client(reqwest::Client::new())
//!         .on_received(|payload, message_type| {
//!             println!("{message_type}: {payload:?}");
//!         })
//!         .connect()
//!         .await?;
//!
//!     connection.send(b"Hello".to_vec()).await?;
//!     connection.stop();
//!     connection.closed().await;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`channel`] | Duplex message channel |
//! | [`client`] | Connection, builder and negotiation |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`format`] | Text batch framing |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`message`] | [`Message`] and [`MessageType`] |
//! | [`transport`] | Transport capability |

// ============================================================================
// Modules
// ============================================================================

/// Duplex message channel.
///
/// [`channel::pair`] creates the two ends shared by a connection and its
/// transport.
pub mod channel;

/// Connection runtime.
///
/// Use [`Connection::builder()`] to configure and establish a connection.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Text batch framing.
pub mod format;

/// Type-safe identifiers.
pub mod identifiers;

/// Message unit.
pub mod message;

/// Transport capability.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ConnectOptions, Connection, ConnectionBuilder};

// Channel types
pub use channel::{ChannelEnd, CompletionError};

// Error types
pub use error::{Error, FormatError, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Message types
pub use message::{Message, MessageType};

// Transport types
pub use transport::Transport;
