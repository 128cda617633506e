//! Transport capability.
//!
//! A transport physically moves messages between the process and the
//! server. The connection never talks to the network itself: it hands the
//! transport one end of a duplex [channel](crate::channel) and keeps the
//! other.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    channel::pair()    ┌─────────────────┐
//! │  Connection     │◄─────────────────────►│  Transport      │◄──── network
//! │  (local end)    │                       │  (remote end)   │
//! └─────────────────┘                       └─────────────────┘
//! ```
//!
//! # Contract
//!
//! 1. `start` receives the connected URL and the remote end. Once it returns
//!    `Ok`, the transport owns the end for the rest of the connection.
//! 2. Messages from the server are written to `channel.output`; messages
//!    from the application are read from `channel.input`.
//! 3. `dispose` must eventually complete `channel.output` (cleanly, or with
//!    the failure that ended the connection). The connection's receive loop
//!    only terminates after that completion.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | In-process loopback transport |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use url::Url;

use crate::channel::ChannelEnd;
use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// In-process loopback transport.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::MemoryTransport;

// ============================================================================
// Transport
// ============================================================================

/// Moves messages between a channel end and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts the transport against `url`, taking ownership of `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be started. The connection
    /// then reports [`Error::TransportStartFailed`](crate::Error::TransportStartFailed).
    async fn start(&self, url: Url, channel: ChannelEnd) -> Result<()>;

    /// Shuts the transport down.
    ///
    /// Must lead to the completion of the channel end's output.
    fn dispose(&self);

    /// Name used in logs and errors.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
