//! Logical connection and receive loop.
//!
//! A [`Connection`] owns the local end of a duplex channel whose remote end
//! was handed to the transport.
//!
//! # Receive Loop
//!
//! The connection spawns a tokio task that:
//!
//! - Waits until the channel input is readable or completed
//! - Drains every queued message into the received handler, in order
//! - Exits when the input completes or the connection is aborted
//! - Fires the closed handler exactly once on exit
//!
//! # Send Path
//!
//! Sends are serialized by an async mutex, so concurrent callers observe
//! their messages on the transport side in lock acquisition order.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, trace, warn};
use url::Url;

use crate::channel::{ChannelEnd, CompletionError, MessageReader, MessageWriter};
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::message::{Message, MessageType};
use crate::transport::Transport;

use super::builder::ConnectionBuilder;
use super::negotiate::HttpNegotiator;

// ============================================================================
// Types
// ============================================================================

/// Received handler callback type.
///
/// Called once per received message with its payload and type.
pub type ReceivedHandler = Arc<dyn Fn(Bytes, MessageType) + Send + Sync>;

/// Closed handler callback type.
///
/// Called once when the connection closes, with the failure that closed it.
pub type ClosedHandler = Box<dyn FnOnce(Option<CompletionError>) + Send>;

/// Terminal state published by the receive loop.
type CloseState = Option<Option<CompletionError>>;

// ============================================================================
// Handlers
// ============================================================================

/// Closed handler slot.
///
/// Moves to `Fired` exactly once; a handler set afterwards runs immediately.
enum ClosedSlot {
    Pending(Option<ClosedHandler>),
    Fired(Option<CompletionError>),
}

/// Handlers shared between the connection and its receive loop.
pub(crate) struct Handlers {
    received: Mutex<Option<ReceivedHandler>>,
    closed: Mutex<ClosedSlot>,
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl Handlers {
    pub(crate) fn new(received: Option<ReceivedHandler>, closed: Option<ClosedHandler>) -> Self {
        Self {
            received: Mutex::new(received),
            closed: Mutex::new(ClosedSlot::Pending(closed)),
        }
    }

    /// Runs the received handler. A panic is logged and swallowed so the
    /// receive loop keeps running.
    fn dispatch_received(&self, payload: Bytes, message_type: MessageType) {
        let handler = self.received.lock().clone();
        if let Some(handler) = handler {
            let result = catch_unwind(AssertUnwindSafe(|| handler(payload, message_type)));
            if let Err(panic) = result {
                error!(panic = %panic_message(&*panic), "Received handler panicked");
            }
        }
    }

    fn dispatch_closed(&self, error: Option<CompletionError>) {
        let fired = ClosedSlot::Fired(error.clone());
        let previous = std::mem::replace(&mut *self.closed.lock(), fired);
        if let ClosedSlot::Pending(Some(handler)) = previous {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(error))) {
                error!(panic = %panic_message(&*panic), "Closed handler panicked");
            }
        }
    }

    fn set_closed(&self, handler: ClosedHandler) {
        let mut slot = self.closed.lock();
        if let ClosedSlot::Fired(error) = &*slot {
            let error = error.clone();
            drop(slot);
            handler(error);
            return;
        }
        *slot = ClosedSlot::Pending(Some(handler));
    }
}

/// Extracts the text of a panic payload.
fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

// ============================================================================
// Connection
// ============================================================================

/// A negotiated connection to a realtime endpoint.
///
/// Created by [`Connection::connect`] or [`Connection::builder`]. The
/// connection is single use: once closed it cannot be reopened. Dropping it
/// stops the transport.
///
/// # Example
///
/// ```no_run
/// use sockets_client::Connection;
/// use sockets_client::transport::MemoryTransport;
///
/// # async fn example() -> sockets_client::Result<()> {
/// let connection = Connection::builder()
///     .url("http://localhost:5000/chat")
///     .transport(MemoryTransport::new())
///     .on_received(|payload, message_type| {
///         println!("{message_type}: {} bytes", payload.len());
///     })
///     .on_closed(|error| println!("closed: {error:?}"))
///     .http_client(reqwest::Client::new())
///     .connect()
///     .await?;
///
/// connection.send(b"hello".to_vec()).await?;
/// connection.stop();
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    /// Endpoint URL the connection was negotiated against.
    url: Url,
    /// Connection id issued by the server.
    connection_id: ConnectionId,
    /// Transport owning the remote channel end.
    transport: Box<dyn Transport>,
    /// Channel input, shared with the receive loop.
    input: Arc<MessageReader>,
    /// Channel output, locked for the duration of a send.
    output: AsyncMutex<MessageWriter>,
    /// Handlers (shared with the receive loop).
    handlers: Arc<Handlers>,
    /// Terminal state published by the receive loop.
    closed_rx: watch::Receiver<CloseState>,
    /// Cancels the receive loop.
    cancel: CancellationToken,
    /// Set once the transport was disposed.
    stopped: AtomicBool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url.as_str())
            .field("connection_id", &self.connection_id)
            .field("transport", &self.transport.name())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl Connection {
    /// Returns a builder for configuring a connection.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Connects to `url` over `transport`, negotiating with a default HTTP
    /// client.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `url` is not a valid base URL
    /// - [`Error::NegotiationFailed`] if no connection id was obtained
    /// - [`Error::TransportStartFailed`] if the transport did not start
    pub async fn connect(url: impl Into<String>, transport: impl Transport + 'static) -> Result<Self> {
        Self::builder()
            .url(url)
            .transport(transport)
            .negotiator(HttpNegotiator::new())
            .connect()
            .await
    }

    /// Wraps the local channel end and spawns the receive loop.
    pub(crate) fn start(
        url: Url,
        connection_id: ConnectionId,
        transport: Box<dyn Transport>,
        channel: ChannelEnd,
        handlers: Handlers,
        span: Span,
    ) -> Self {
        let (input, output) = channel.into_split();
        let input = Arc::new(input);
        let handlers = Arc::new(handlers);
        let cancel = CancellationToken::new();
        let (closed_tx, closed_rx) = watch::channel(None);

        tokio::spawn(
            Self::run_receive_loop(
                Arc::clone(&input),
                Arc::clone(&handlers),
                cancel.clone(),
                closed_tx,
            )
            .instrument(span),
        );

        Self {
            url,
            connection_id,
            transport,
            input,
            output: AsyncMutex::new(output),
            handlers,
            closed_rx,
            cancel,
            stopped: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the negotiated connection id.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Returns `true` once the receive loop has exited.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed_rx.borrow().is_some()
    }
}

// ============================================================================
// Connection - Handlers
// ============================================================================

impl Connection {
    /// Sets the received handler, replacing any previous one.
    ///
    /// Messages pumped before the handler is set are dropped; register it on
    /// the builder to observe every message.
    pub fn set_received_handler(
        &self,
        handler: impl Fn(Bytes, MessageType) + Send + Sync + 'static,
    ) {
        *self.handlers.received.lock() = Some(Arc::new(handler));
    }

    /// Clears the received handler.
    pub fn clear_received_handler(&self) {
        *self.handlers.received.lock() = None;
    }

    /// Sets the closed handler, replacing any previous one.
    ///
    /// If the connection is already closed the handler runs immediately.
    pub fn set_closed_handler(
        &self,
        handler: impl FnOnce(Option<CompletionError>) + Send + 'static,
    ) {
        self.handlers.set_closed(Box::new(handler));
    }

    /// Waits until the connection closes.
    ///
    /// Resolves with the failure that closed the connection, or `None` for a
    /// clean close.
    pub async fn closed(&self) -> Option<CompletionError> {
        let mut closed_rx = self.closed_rx.clone();
        let state = match closed_rx.wait_for(Option::is_some).await {
            Ok(state) => (*state).clone(),
            Err(_) => None,
        };
        state.flatten()
    }
}

// ============================================================================
// Connection - Send / Stop
// ============================================================================

impl Connection {
    /// Sends `data` as a text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection was stopped or
    /// closed.
    pub async fn send(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send_message(Message::text(data)).await
    }

    /// Sends a message of any type.
    ///
    /// Waits until the channel accepts writes. Dropping the returned future
    /// cancels the send without touching the channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection was stopped or
    /// closed.
    pub async fn send_message(&self, message: Message) -> Result<()> {
        if self.is_send_closed() {
            return Err(Error::ConnectionClosed);
        }

        let output = self.output.lock().await;
        let mut message = message;
        loop {
            if !output.wait_writable().await {
                return Err(Error::ConnectionClosed);
            }

            match output.try_write(message) {
                Ok(()) => {
                    trace!("Message sent");
                    return Ok(());
                }
                Err(rejected) => message = rejected.into_inner(),
            }
        }
    }

    /// Stops the connection by disposing the transport.
    ///
    /// The closed handler fires once the transport completes its side of the
    /// channel. Does not wait for that to happen; use [`Connection::closed`].
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!(connection_id = %self.connection_id, "Stopping connection");
        self.transport.dispose();
    }

    /// Cancels the receive loop without waiting for the transport.
    ///
    /// The closed handler fires with `None`. Messages still queued are
    /// discarded and later transport writes fail with
    /// [`Error::PipeClosed`].
    pub fn abort(&self) {
        self.cancel.cancel();
        self.input.close();
    }

    fn is_send_closed(&self) -> bool {
        self.stopped.load(Ordering::Acquire) || self.input.is_completed() || self.is_closed()
    }

    /// Receive loop draining the channel input.
    async fn run_receive_loop(
        input: Arc<MessageReader>,
        handlers: Arc<Handlers>,
        cancel: CancellationToken,
        closed_tx: watch::Sender<CloseState>,
    ) {
        let completion = loop {
            let readable = tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("Receive loop cancelled");
                    break None;
                }

                readable = input.wait_readable() => readable,
            };

            while let Some(message) = input.try_read() {
                let (payload, message_type) = message.into_parts();
                trace!(%message_type, len = payload.len(), "Message received");
                handlers.dispatch_received(payload, message_type);
            }

            match readable {
                Ok(true) => {}
                Ok(false) => break None,
                Err(error) => break Some(error),
            }
        };

        match &completion {
            Some(error) => warn!(error = %error, "Connection closed with error"),
            None => debug!("Connection closed"),
        }

        handlers.dispatch_closed(completion.clone());
        closed_tx.send_replace(Some(completion));

        debug!("Receive loop terminated");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.stop();
        self.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
