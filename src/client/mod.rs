//! Connection runtime.
//!
//! This module negotiates a logical connection with the server and runs the
//! message pump between the application and the transport.
//!
//! # Connection Lifecycle
//!
//! 1. `Negotiator::negotiate` - GET `<url>/negotiate` returns the connection id
//! 2. `ConnectOptions::connected_url` - Append `id=<connection id>` to the URL
//! 3. `channel::pair` - Create the duplex channel
//! 4. `Transport::start` - Hand the remote end to the transport
//! 5. `Connection` - Receive loop runs, application sends
//! 6. `Connection::stop` - Dispose the transport, closed handler fires
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent connect API |
//! | `connection` | Connection and receive loop |
//! | `negotiate` | Negotiation collaborators |
//! | `options` | URL composition options |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent connect API.
pub mod builder;

/// Connection and receive loop.
pub mod connection;

/// Negotiation collaborators.
pub mod negotiate;

/// URL composition options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionBuilder;
pub use connection::{ClosedHandler, Connection, ReceivedHandler};
pub use negotiate::{HttpNegotiator, Negotiator, StaticNegotiator};
pub use options::ConnectOptions;
