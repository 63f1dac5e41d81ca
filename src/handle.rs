//! Task handles for retrieving spawned results.
//!
//! A [`TaskHandle`] is returned by `spawn` and consumed by exactly one
//! `finish`. It is a two-variant value: an *admitted* task lives on the host
//! executor and the handle only needs to await its result channel; a
//! *deferred* task was never handed out and the handle carries the future
//! itself, which `finish` drives inline on the caller.
//!
//! # Ownership
//!
//! The handle owns the task's frame reservation. `finish` releases it on
//! every exit path. Dropping a handle without finishing it is a programmer
//! error: the reservation stays live (and visible in the arena stats), and
//! a deferred task silently never runs.

use crate::frame::FrameGrant;
use crate::oneshot;
use std::future::Future;
use std::pin::Pin;

pub(crate) enum Mode<T> {
    /// Lives on the host executor; the receiver yields its result.
    Admitted(oneshot::Receiver<T>),
    /// Never handed out; driven inline by `finish`.
    Deferred(Pin<Box<dyn Future<Output = T> + Send>>),
}

/// A handle to a spawned task, bound to a single future `finish`.
#[must_use = "spawned tasks must be finished exactly once"]
pub struct TaskHandle<T> {
    mode: Mode<T>,
    grant: FrameGrant,
}

impl<T> TaskHandle<T> {
    pub(crate) fn admitted(rx: oneshot::Receiver<T>, grant: FrameGrant) -> Self {
        Self {
            mode: Mode::Admitted(rx),
            grant,
        }
    }

    pub(crate) fn deferred(
        future: Pin<Box<dyn Future<Output = T> + Send>>,
        grant: FrameGrant,
    ) -> Self {
        Self {
            mode: Mode::Deferred(future),
            grant,
        }
    }

    pub(crate) fn into_parts(self) -> (Mode<T>, FrameGrant) {
        (self.mode, self.grant)
    }

    /// Returns true if this task was admitted to the host executor.
    ///
    /// A non-admitted task has performed no work yet; it runs on the
    /// caller's own context inside `finish`.
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self.mode, Mode::Admitted(_))
    }

    /// Returns true if the task's result is already available.
    ///
    /// Always false for deferred tasks: they only run inside `finish`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.mode {
            Mode::Admitted(rx) => rx.is_ready(),
            Mode::Deferred(_) => false,
        }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            Mode::Admitted(_) => "admitted",
            Mode::Deferred(_) => "deferred",
        };
        f.debug_struct("TaskHandle")
            .field("mode", &mode)
            .field("frame_bytes", &self.grant.bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameArena;

    #[test]
    fn admission_flag_tracks_mode() {
        let arena = FrameArena::unbounded();

        let (_tx, rx) = oneshot::channel::<u32>();
        let admitted = TaskHandle::admitted(rx, arena.reserve(8).expect("reserve failed"));
        assert!(admitted.is_admitted());

        let deferred = TaskHandle::deferred(
            Box::pin(async { 1u32 }),
            arena.reserve(8).expect("reserve failed"),
        );
        assert!(!deferred.is_admitted());
        assert!(!deferred.is_finished());
    }

    #[test]
    fn is_finished_follows_result_channel() {
        let arena = FrameArena::unbounded();
        let (tx, rx) = oneshot::channel::<u32>();
        let handle = TaskHandle::admitted(rx, arena.reserve(8).expect("reserve failed"));

        assert!(!handle.is_finished());
        tx.send(5).expect("send failed");
        assert!(handle.is_finished());
    }

    #[test]
    fn debug_shows_mode() {
        let arena = FrameArena::unbounded();
        let (_tx, rx) = oneshot::channel::<u32>();
        let handle = TaskHandle::admitted(rx, arena.reserve(16).expect("reserve failed"));
        let text = format!("{handle:?}");
        assert!(text.contains("admitted"));
        assert!(text.contains("16"));
    }
}
