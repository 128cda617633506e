//! In-process loopback transport.
//!
//! [`MemoryTransport`] plays the server side of a connection inside the
//! process. Messages pushed with [`MemoryTransport::deliver`] or
//! [`MemoryTransport::deliver_batch`] reach the application, and whatever the
//! application sends can be pulled with [`MemoryTransport::next_sent`].
//!
//! # Example
//!
//! ```no_run
//! use sockets_client::transport::MemoryTransport;
//! use sockets_client::client::StaticNegotiator;
//! use sockets_client::Connection;
//!
//! # async fn example() -> sockets_client::Result<()> {
//! let transport = MemoryTransport::new();
//! let connection = Connection::builder()
//!     .url("http://localhost/chat")
//!     .transport(transport.clone())
//!     .negotiator(StaticNegotiator::new("abc"))
//!     .connect()
//!     .await?;
//!
//! transport.deliver_batch(b"T5:T:hello;")?;
//! connection.send(b"hi".to_vec()).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use crate::channel::{ChannelEnd, CompletionError, MessageReader, MessageWriter};
use crate::error::{Error, Result};
use crate::format;
use crate::message::Message;

use super::Transport;

// ============================================================================
// MemoryTransport
// ============================================================================

/// Loopback transport backed by the channel end it is started with.
///
/// Cloning yields another handle to the same transport, so a test can keep
/// one handle while the connection owns the other.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    /// Error message returned by `start`, if configured to fail.
    start_failure: Option<String>,
    /// URL passed to `start`.
    url: Mutex<Option<Url>>,
    /// Messages sent by the application.
    input: Mutex<Option<Arc<MessageReader>>>,
    /// Messages toward the application.
    output: Mutex<Option<MessageWriter>>,
    /// Set once `dispose` ran.
    disposed: AtomicBool,
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("url", &*self.inner.url.lock())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MemoryTransport - Constructors
// ============================================================================

impl MemoryTransport {
    /// Creates a transport that starts successfully.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose `start` fails with `message`.
    #[inline]
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                start_failure: Some(message.into()),
                ..MemoryInner::default()
            }),
        }
    }
}

// ============================================================================
// MemoryTransport - Accessors
// ============================================================================

impl MemoryTransport {
    /// Returns the URL the transport was started with.
    #[must_use]
    pub fn started_url(&self) -> Option<Url> {
        self.inner.url.lock().clone()
    }

    /// Returns `true` once `start` succeeded.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.url.lock().is_some()
    }

    /// Returns `true` once `dispose` ran.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

// ============================================================================
// MemoryTransport - Server Side
// ============================================================================

impl MemoryTransport {
    /// Pushes a message toward the application.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PipeClosed`] if the transport is not started, was
    /// disposed, or the application end is gone.
    pub fn deliver(&self, message: Message) -> Result<()> {
        let output = self.inner.output.lock();
        output
            .as_ref()
            .ok_or(Error::PipeClosed)?
            .write(message)
    }

    /// Decodes a text batch and pushes every message toward the application.
    ///
    /// Records preceding a malformed one are still delivered. Returns the
    /// number of messages delivered.
    ///
    /// # Errors
    ///
    /// - [`Error::Format`] if the batch is malformed
    /// - [`Error::PipeClosed`] if the application end is gone
    pub fn deliver_batch(&self, data: &[u8]) -> Result<usize> {
        let mut delivered = 0;
        for message in format::read_messages(data) {
            self.deliver(message?)?;
            delivered += 1;
        }
        debug!(delivered, "Batch delivered");
        Ok(delivered)
    }

    /// Waits for the next message sent by the application.
    ///
    /// Returns `Ok(None)` if the transport is not started or the application
    /// completed its output.
    ///
    /// # Errors
    ///
    /// Returns the failure the application completed its output with.
    pub async fn next_sent(&self) -> std::result::Result<Option<Message>, CompletionError> {
        let input = self.inner.input.lock().clone();
        match input {
            Some(input) => input.read().await,
            None => Ok(None),
        }
    }

    /// Ends the connection with a failure, as a dropped socket would.
    ///
    /// Returns `false` if the output was already completed.
    pub fn fail(&self, error: Error) -> bool {
        match self.inner.output.lock().take() {
            Some(output) => output.complete(Some(error)),
            None => false,
        }
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait]
impl Transport for MemoryTransport {
    async fn start(&self, url: Url, channel: ChannelEnd) -> Result<()> {
        if let Some(message) = &self.inner.start_failure {
            return Err(Error::transport(message.clone()));
        }

        let mut started = self.inner.url.lock();
        if started.is_some() {
            return Err(Error::transport("transport already started"));
        }

        debug!(url = %url, "Memory transport started");
        *started = Some(url);

        let (input, output) = channel.into_split();
        *self.inner.input.lock() = Some(Arc::new(input));
        *self.inner.output.lock() = Some(output);
        Ok(())
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!("Memory transport disposed");
        if let Some(output) = self.inner.output.lock().take() {
            output.complete(None);
        }
    }

    fn name(&self) -> &'static str {
        "MemoryTransport"
    }
}

// ============================================================================
// Tests
// ============================================================================
