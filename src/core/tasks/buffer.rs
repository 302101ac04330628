//! core::tasks::buffer
//!
//! Single-producer, multi-consumer handoff buffer.
//!
//! # Architecture
//!
//! A [`ResultBuffer`] turns a stream of chunks (or errors) produced by a
//! long-running subprocess into an ordered sequence of awaitable values.
//! Consumers may call [`ResultBuffer::shift`] before or after the value
//! arrives:
//!
//! - A pushed value satisfies the oldest pending waiter, else it is buffered
//! - `shift` returns the oldest buffered value, else registers a waiter
//! - [`ResultBuffer::drain`] fails every pending waiter with
//!   [`BufferError::Reset`] and discards buffered values
//!
//! [`ResultBuffer::close`] is what the batch helper calls when the subprocess
//! goes away: it drains, and every later `shift` on an empty buffer fails
//! with `Reset` at once, so no consumer awaits output that will never come.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::oneshot;

/// Failure observed by a consumer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError<E> {
    /// The producer was torn down while the consumer was waiting.
    #[error("stream was reset")]
    Reset,

    /// The producer pushed an error in place of a value.
    #[error("stream failed: {0}")]
    Failed(E),
}

type Item<T, E> = Result<T, BufferError<E>>;

struct State<T, E> {
    values: VecDeque<Item<T, E>>,
    waiters: VecDeque<oneshot::Sender<Item<T, E>>>,
    closed: bool,
}

/// Ordered handoff between a producer task and awaiting consumers.
pub struct ResultBuffer<T, E> {
    state: Mutex<State<T, E>>,
}

impl<T, E> Default for ResultBuffer<T, E> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                values: VecDeque::new(),
                waiters: VecDeque::new(),
                closed: false,
            }),
        }
    }
}

impl<T, E> std::fmt::Debug for ResultBuffer<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ResultBuffer")
            .field("buffered", &state.values.len())
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

impl<T, E> ResultBuffer<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value.
    pub fn push(&self, value: T) {
        self.deliver(Ok(value));
    }

    /// Append an error; the consumer that receives it sees `Failed`.
    pub fn push_error(&self, err: E) {
        self.deliver(Err(BufferError::Failed(err)));
    }

    /// Take the oldest value, waiting for one if none is buffered.
    pub async fn shift(&self) -> Result<T, BufferError<E>> {
        let rx = {
            let mut state = self.lock();
            if let Some(item) = state.values.pop_front() {
                return item;
            }
            if state.closed {
                return Err(BufferError::Reset);
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        rx.await.unwrap_or(Err(BufferError::Reset))
    }

    /// Fail every pending waiter with `Reset` and drop buffered values.
    pub fn drain(&self) {
        let waiters = {
            let mut state = self.lock();
            state.values.clear();
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(Err(BufferError::Reset));
        }
    }

    /// Drain and refuse to wait from now on.
    pub fn close(&self) {
        self.lock().closed = true;
        self.drain();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of values buffered and not yet shifted.
    pub fn buffered(&self) -> usize {
        self.lock().values.len()
    }

    /// Number of consumers currently waiting.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    fn deliver(&self, mut item: Item<T, E>) {
        let mut state = self.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(item) {
                Ok(()) => return,
                // Waiter gave up; offer the item to the next one.
                Err(returned) => item = returned,
            }
        }
        state.values.push_back(item);
    }

    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn value_pushed_before_shift_is_buffered() {
        let buffer: ResultBuffer<u32, String> = ResultBuffer::new();
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.buffered(), 2);
        assert_eq!(buffer.shift().await, Ok(1));
        assert_eq!(buffer.shift().await, Ok(2));
    }

    #[tokio::test]
    async fn waiter_registered_before_push_is_satisfied() {
        let buffer: Arc<ResultBuffer<u32, String>> = Arc::new(ResultBuffer::new());
        let consumer = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.shift().await })
        };

        while buffer.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        buffer.push(42);

        assert_eq!(consumer.await.unwrap(), Ok(42));
        assert_eq!(buffer.buffered(), 0);
    }

    #[tokio::test]
    async fn errors_reach_the_consumer_in_order() {
        let buffer: ResultBuffer<u32, String> = ResultBuffer::new();
        buffer.push(1);
        buffer.push_error("broken pipe".into());
        assert_eq!(buffer.shift().await, Ok(1));
        assert_eq!(
            buffer.shift().await,
            Err(BufferError::Failed("broken pipe".into()))
        );
    }

    #[tokio::test]
    async fn drain_rejects_all_waiters() {
        let buffer: Arc<ResultBuffer<Vec<u8>, String>> = Arc::new(ResultBuffer::new());
        let mut consumers = Vec::new();
        for _ in 0..3 {
            let buffer = buffer.clone();
            consumers.push(tokio::spawn(async move { buffer.shift().await }));
        }
        while buffer.waiting() < 3 {
            tokio::task::yield_now().await;
        }

        buffer.drain();

        for consumer in consumers {
            let result = tokio::time::timeout(Duration::from_secs(5), consumer)
                .await
                .expect("waiter hung after drain")
                .unwrap();
            assert_eq!(result, Err(BufferError::Reset));
        }
    }

    #[tokio::test]
    async fn drain_discards_buffered_values() {
        let buffer: ResultBuffer<u32, String> = ResultBuffer::new();
        buffer.push(1);
        buffer.drain();
        assert_eq!(buffer.buffered(), 0);

        buffer.push(2);
        assert_eq!(buffer.shift().await, Ok(2));
    }

    #[tokio::test]
    async fn shift_after_close_fails_immediately() {
        let buffer: ResultBuffer<u32, String> = ResultBuffer::new();
        buffer.close();
        assert!(buffer.is_closed());
        let result = tokio::time::timeout(Duration::from_secs(5), buffer.shift())
            .await
            .expect("shift waited on a closed buffer");
        assert_eq!(result, Err(BufferError::Reset));
    }

    #[tokio::test]
    async fn values_pushed_after_close_are_still_served() {
        let buffer: ResultBuffer<u32, String> = ResultBuffer::new();
        buffer.close();
        buffer.push(7);
        assert_eq!(buffer.shift().await, Ok(7));
    }
}
