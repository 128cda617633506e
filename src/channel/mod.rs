//! In-process duplex message channel.
//!
//! [`pair`] allocates two cross-wired unbounded queues and hands back one
//! [`ChannelEnd`] per party. Whatever one end writes, the other end reads.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                        ┌──────────────────┐
//! │  local end       │   output ──── A→B ───► │  remote end      │
//! │  (Connection)    │                        │  (Transport)     │
//! │                  │ ◄─── B→A ──── output   │                  │
//! └──────────────────┘                        └──────────────────┘
//! ```
//!
//! # Completion
//!
//! A writer may complete its queue, optionally with an error. The reader
//! still drains queued messages and then observes the completion. Dropping
//! a [`MessageWriter`] completes its queue cleanly; dropping a
//! [`MessageReader`] makes further writes fail.

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

// ============================================================================
// Submodules
// ============================================================================

/// Queue halves: reader, writer and shared state.
mod queue;

// ============================================================================
// Re-exports
// ============================================================================

pub use queue::{CompletionError, MessageReader, MessageWriter, TryWriteError};

// ============================================================================
// ChannelEnd
// ============================================================================

/// One party's half of a duplex pair.
#[derive(Debug)]
pub struct ChannelEnd {
    /// Messages written by the other party.
    pub input: MessageReader,
    /// Messages for the other party.
    pub output: MessageWriter,
}

impl ChannelEnd {
    /// Splits the end into its reader and writer.
    #[inline]
    #[must_use]
    pub fn into_split(self) -> (MessageReader, MessageWriter) {
        (self.input, self.output)
    }
}

// ============================================================================
// Constructor
// ============================================================================

/// Creates a connected pair of channel ends, returned as `(local, remote)`.
///
/// The connection keeps `local` and gives `remote` to the transport.
#[must_use]
pub fn pair() -> (ChannelEnd, ChannelEnd) {
    let (local_to_remote_tx, local_to_remote_rx) = queue::unbounded();
    let (remote_to_local_tx, remote_to_local_rx) = queue::unbounded();

    trace!("Duplex channel pair created");

    let local = ChannelEnd {
        input: remote_to_local_rx,
        output: local_to_remote_tx,
    };
    let remote = ChannelEnd {
        input: local_to_remote_rx,
        output: remote_to_local_tx,
    };

    (local, remote)
}

// ============================================================================
// Tests
// ============================================================================
