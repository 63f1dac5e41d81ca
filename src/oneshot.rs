//! Single-use result channel.
//!
//! Carries an admitted task's output from the completion wrapper back to
//! `finish`. Exactly one sender and one receiver, one value. The receiver is
//! itself a future: awaiting it registers the caller's waker, and the send
//! (or the sender being dropped without sending) wakes it.
//!
//! There is no cancellation surface here; if the sender goes away without
//! sending, the receiver resolves to [`RecvError::Closed`] and the scheduler
//! maps that to a lost-task error.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

/// Error returned when sending fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError<T> {
    /// The receiver was dropped before the value could be sent.
    Disconnected(T),
}

impl<T> std::fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected(_) => write!(f, "sending on a closed oneshot channel"),
        }
    }
}

impl<T: std::fmt::Debug> std::error::Error for SendError<T> {}

/// Error returned when receiving fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// The sender was dropped without sending a value.
    Closed,
}

impl std::fmt::Display for RecvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "receiving on a closed oneshot channel"),
        }
    }
}

impl std::error::Error for RecvError {}

#[derive(Debug)]
struct Inner<T> {
    /// The value, if sent and not yet taken.
    value: Option<T>,
    /// Waker registered by a pending receiver.
    waker: Option<Waker>,
    /// Whether the sender is gone (sent or dropped).
    sender_gone: bool,
    /// Whether the receiver has been dropped.
    receiver_dropped: bool,
}

/// Creates a new oneshot channel, returning the sender and receiver halves.
#[must_use]
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(Mutex::new(Inner {
        value: None,
        waker: None,
        sender_gone: false,
        receiver_dropped: false,
    }));
    (
        Sender {
            inner: Arc::clone(&inner),
            done: false,
        },
        Receiver { inner },
    )
}

/// The sending half of a oneshot channel.
#[derive(Debug)]
pub struct Sender<T> {
    inner: Arc<Mutex<Inner<T>>>,
    /// Set once the channel outcome is decided, so Drop stays idempotent.
    done: bool,
}

impl<T> Sender<T> {
    /// Sends a value through the channel, consuming the sender.
    ///
    /// # Errors
    ///
    /// Returns `Err(SendError::Disconnected(value))` if the receiver was
    /// dropped; the value is handed back.
    pub fn send(mut self, value: T) -> Result<(), SendError<T>> {
        let waker = {
            let mut inner = self.inner.lock().expect("oneshot lock poisoned");
            inner.sender_gone = true;
            if inner.receiver_dropped {
                self.done = true;
                return Err(SendError::Disconnected(value));
            }
            inner.value = Some(value);
            inner.waker.take()
        };
        self.done = true;
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    /// Checks whether the receiver has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .expect("oneshot lock poisoned")
            .receiver_dropped
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let waker = {
            let mut inner = self.inner.lock().expect("oneshot lock poisoned");
            inner.sender_gone = true;
            inner.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// The receiving half of a oneshot channel.
///
/// The receiver is a future resolving to `Ok(value)` once the sender sends,
/// or `Err(RecvError::Closed)` if the sender is dropped without sending.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Receiver<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Receiver<T> {
    /// Returns true if a value is ready to receive.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner
            .lock()
            .expect("oneshot lock poisoned")
            .value
            .is_some()
    }
}

impl<T> Future for Receiver<T> {
    type Output = Result<T, RecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.lock().expect("oneshot lock poisoned");
        if let Some(value) = inner.value.take() {
            return Poll::Ready(Ok(value));
        }
        if inner.sender_gone {
            return Poll::Ready(Err(RecvError::Closed));
        }
        inner.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().expect("oneshot lock poisoned");
        inner.receiver_dropped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;

    #[test]
    fn send_then_recv() {
        let (tx, rx) = channel::<u32>();
        tx.send(42).expect("send failed");
        assert!(rx.is_ready());
        assert_eq!(block_on(rx), Ok(42));
    }

    #[test]
    fn recv_waits_for_sender() {
        let (tx, rx) = channel::<u32>();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            tx.send(7).expect("send failed");
        });
        assert_eq!(block_on(rx), Ok(7));
        sender.join().expect("sender thread panicked");
    }

    #[test]
    fn sender_drop_closes_channel() {
        let (tx, rx) = channel::<u32>();
        drop(tx);
        assert_eq!(block_on(rx), Err(RecvError::Closed));
    }

    #[test]
    fn receiver_drop_reports_disconnect() {
        let (tx, rx) = channel::<u32>();
        drop(rx);
        assert_eq!(tx.send(1), Err(SendError::Disconnected(1)));
    }

    #[test]
    fn is_closed_tracks_receiver() {
        let (tx, rx) = channel::<u32>();
        assert!(!tx.is_closed());
        drop(rx);
        assert!(tx.is_closed());
    }
}
