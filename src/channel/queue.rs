//! Unbounded single-direction message queue.
//!
//! State lives behind a `parking_lot` mutex that is never held across an
//! await point. Readers park on a [`Notify`] that every write and the
//! completion wake.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use futures_util::Stream;
use futures_util::stream;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use crate::error::{Error, Result};
use crate::message::Message;

// ============================================================================
// Types
// ============================================================================

/// Failure a writer attached when completing its queue.
///
/// Shared so every observer of the completion sees the same error.
pub type CompletionError = Arc<Error>;

/// Returned by [`MessageWriter::try_write`] when the queue no longer accepts
/// messages. Carries the rejected message back to the caller.
#[derive(thiserror::Error)]
#[error("Pipe closed")]
pub struct TryWriteError(pub Message);

impl TryWriteError {
    /// Returns the rejected message.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Message {
        self.0
    }
}

impl fmt::Debug for TryWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryWriteError").finish_non_exhaustive()
    }
}

// ============================================================================
// Shared State
// ============================================================================

struct Shared {
    state: Mutex<State>,
    readable: Notify,
}

#[derive(Default)]
struct State {
    messages: VecDeque<Message>,
    /// `Some` once the writer completed; the inner value is the failure.
    completion: Option<Option<CompletionError>>,
    reader_dropped: bool,
}

impl State {
    fn accepts_writes(&self) -> bool {
        self.completion.is_none() && !self.reader_dropped
    }
}

/// Creates one queue, returning its writer and reader halves.
pub(super) fn unbounded() -> (MessageWriter, MessageReader) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::default()),
        readable: Notify::new(),
    });

    (
        MessageWriter {
            shared: Arc::clone(&shared),
        },
        MessageReader { shared },
    )
}

// ============================================================================
// MessageWriter
// ============================================================================

/// Producing half of a queue.
///
/// Writes never block. Dropping the writer completes the queue cleanly.
pub struct MessageWriter {
    shared: Arc<Shared>,
}

impl fmt::Debug for MessageWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("MessageWriter")
            .field("queued", &state.messages.len())
            .field("completed", &state.completion.is_some())
            .finish()
    }
}

impl MessageWriter {
    /// Enqueues a message without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TryWriteError`] holding the message if the queue was
    /// completed or its reader was dropped.
    pub fn try_write(&self, message: Message) -> std::result::Result<(), TryWriteError> {
        {
            let mut state = self.shared.state.lock();
            if !state.accepts_writes() {
                return Err(TryWriteError(message));
            }
            state.messages.push_back(message);
        }

        self.shared.readable.notify_waiters();
        Ok(())
    }

    /// Enqueues a message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PipeClosed`] if the queue no longer accepts writes.
    #[inline]
    pub fn write(&self, message: Message) -> Result<()> {
        self.try_write(message).map_err(|_| Error::PipeClosed)
    }

    /// Waits until a write may succeed.
    ///
    /// The queue is unbounded, so this resolves immediately. Returns `false`
    /// once the queue was completed or its reader dropped.
    pub async fn wait_writable(&self) -> bool {
        self.shared.state.lock().accepts_writes()
    }

    /// Completes the queue, optionally with a failure.
    ///
    /// Queued messages are still delivered before the reader observes the
    /// completion. Returns `false` if the queue was already completed.
    pub fn complete(&self, error: Option<Error>) -> bool {
        {
            let mut state = self.shared.state.lock();
            if state.completion.is_some() {
                return false;
            }
            trace!(failed = error.is_some(), queued = state.messages.len(), "Queue completed");
            state.completion = Some(error.map(Arc::new));
        }

        self.shared.readable.notify_waiters();
        true
    }

    /// Returns `true` if the queue no longer accepts writes.
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        !self.shared.state.lock().accepts_writes()
    }
}

impl Drop for MessageWriter {
    fn drop(&mut self) {
        self.complete(None);
    }
}

// ============================================================================
// MessageReader
// ============================================================================

/// Consuming half of a queue.
///
/// Intended for a single consumer. Dropping the reader discards queued
/// messages and rejects further writes.
pub struct MessageReader {
    shared: Arc<Shared>,
}

impl fmt::Debug for MessageReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("MessageReader")
            .field("queued", &state.messages.len())
            .field("completed", &state.completion.is_some())
            .finish()
    }
}

impl MessageReader {
    /// Dequeues a message without waiting.
    #[inline]
    #[must_use]
    pub fn try_read(&self) -> Option<Message> {
        self.shared.state.lock().messages.pop_front()
    }

    /// Waits until a message is available or the queue has completed.
    ///
    /// Returns `Ok(true)` when a message can be read and `Ok(false)` once
    /// the queue completed cleanly and is drained. Dropping the returned
    /// future leaves the queue untouched.
    ///
    /// # Errors
    ///
    /// Returns the writer's failure once the queue is drained.
    pub async fn wait_readable(&self) -> std::result::Result<bool, CompletionError> {
        loop {
            let notified = self.shared.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.shared.state.lock();
                if !state.messages.is_empty() {
                    return Ok(true);
                }
                if let Some(completion) = &state.completion {
                    return match completion {
                        None => Ok(false),
                        Some(error) => Err(Arc::clone(error)),
                    };
                }
            }

            notified.await;
        }
    }

    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` once the queue completed cleanly and is drained.
    ///
    /// # Errors
    ///
    /// Returns the writer's failure once the queue is drained.
    pub async fn read(&self) -> std::result::Result<Option<Message>, CompletionError> {
        loop {
            if let Some(message) = self.try_read() {
                return Ok(Some(message));
            }
            if !self.wait_readable().await? {
                return Ok(None);
            }
        }
    }

    /// Returns `true` if the queue completed and every message was read.
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        let state = self.shared.state.lock();
        state.completion.is_some() && state.messages.is_empty()
    }

    /// Stops consuming: queued messages are discarded and further writes
    /// fail with [`Error::PipeClosed`].
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if !state.reader_dropped {
            trace!(discarded = state.messages.len(), "Reader closed");
        }
        state.reader_dropped = true;
        state.messages.clear();
    }

    /// Converts the reader into a stream of messages.
    ///
    /// A failed completion is yielded once as the final item.
    pub fn into_stream(
        self,
    ) -> impl Stream<Item = std::result::Result<Message, CompletionError>> + Send {
        stream::unfold(Some(self), |reader| async move {
            let reader = reader?;
            match reader.read().await {
                Ok(Some(message)) => Some((Ok(message), Some(reader))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }
}

impl Drop for MessageReader {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use futures_util::StreamExt;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_messages_are_read_in_write_order() {
        let (writer, reader) = unbounded();

        for i in 0..10 {
            writer.write(Message::text(format!("m{i}"))).expect("write");
        }

        for i in 0..10 {
            let message = reader.try_read().expect("queued message");
            assert_eq!(message.payload().as_ref(), format!("m{i}").as_bytes());
        }
        assert!(reader.try_read().is_none());
    }

    #[tokio::test]
    async fn test_wait_readable_wakes_on_write() {
        let (writer, reader) = unbounded();

        let waiter = tokio::spawn(async move {
            let ready = reader.wait_readable().await.expect("no failure");
            (ready, reader.try_read())
        });

        tokio::task::yield_now().await;
        writer.write(Message::text("wake")).expect("write");

        let (ready, message) = waiter.await.expect("task");
        assert!(ready);
        assert_eq!(message.expect("message").payload().as_ref(), b"wake");
    }

    #[tokio::test]
    async fn test_completion_after_drain() {
        let (writer, reader) = unbounded();

        writer.write(Message::text("last")).expect("write");
        assert!(writer.complete(None));

        assert!(!reader.is_completed());
        assert!(reader.wait_readable().await.expect("clean"));
        assert!(reader.try_read().is_some());
        assert!(!reader.wait_readable().await.expect("clean"));
        assert!(reader.is_completed());
    }

    #[tokio::test]
    async fn test_completion_error_is_propagated() {
        let (writer, reader) = unbounded();

        writer.write(Message::text("before")).expect("write");
        writer.complete(Some(Error::transport("socket reset")));

        let first = reader.read().await.expect("drained first");
        assert!(first.is_some());

        let err = reader.read().await.expect_err("failure after drain");
        assert!(matches!(*err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_complete_is_once() {
        let (writer, _reader) = unbounded();
        assert!(writer.complete(None));
        assert!(!writer.complete(Some(Error::transport("late"))));
    }

    #[tokio::test]
    async fn test_write_after_complete_fails() {
        let (writer, _reader) = unbounded();
        writer.complete(None);

        assert!(!writer.wait_writable().await);
        let rejected = writer
            .try_write(Message::text("late"))
            .expect_err("completed queue");
        assert_eq!(rejected.into_inner().payload().as_ref(), b"late");
        assert!(matches!(
            writer.write(Message::text("late")),
            Err(Error::PipeClosed)
        ));
    }

    #[tokio::test]
    async fn test_write_after_reader_dropped_fails() {
        let (writer, reader) = unbounded();
        drop(reader);

        assert!(writer.is_completed());
        assert!(writer.try_write(Message::text("nobody")).is_err());
    }

    #[tokio::test]
    async fn test_write_after_reader_closed_fails() {
        let (writer, reader) = unbounded();
        writer.write(Message::text("queued")).expect("write");

        reader.close();

        assert!(writer.is_completed());
        assert!(!writer.wait_writable().await);
        assert!(matches!(
            writer.write(Message::text("late")),
            Err(Error::PipeClosed)
        ));
        assert!(reader.try_read().is_none());
    }

    #[tokio::test]
    async fn test_dropping_writer_completes_cleanly() {
        let (writer, reader) = unbounded();
        drop(writer);

        assert_eq!(reader.read().await.expect("clean"), None);
    }

    #[tokio::test]
    async fn test_cancelled_wait_leaves_queue_intact() {
        let (writer, reader) = unbounded();

        let result = timeout(Duration::from_millis(20), reader.wait_readable()).await;
        assert!(result.is_err());

        writer.write(Message::text("after cancel")).expect("write");
        assert!(reader.wait_readable().await.expect("clean"));
        assert_eq!(
            reader.try_read().expect("message").payload().as_ref(),
            b"after cancel"
        );
    }

    #[tokio::test]
    async fn test_into_stream() {
        let (writer, reader) = unbounded();

        writer.write(Message::text("a")).expect("write");
        writer.write(Message::binary(vec![1, 2])).expect("write");
        writer.complete(Some(Error::transport("gone")));

        let items: Vec<_> = reader.into_stream().collect().await;
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].is_ok());
        assert!(items[2].is_err());
    }
}
