//! Activation-frame accounting.
//!
//! Every spawned task needs storage for its suspended state. In safe Rust
//! that storage is the pinned box the future lives in, so this module does
//! not hand out raw memory; instead it makes the allocator contract
//! observable. A [`FrameArena`] is the gate every frame byte passes through:
//! `spawn` reserves the frame's size before boxing, `finish` releases the
//! reservation, and [`FrameStats`] exposes the live/peak counters that leak
//! tests assert on.
//!
//! # Failure injection
//!
//! Reservations can be made to fail deterministically
//! ([`FrameArena::inject_failure_after`]) or by exhausting a configured byte
//! budget ([`FrameArena::with_capacity`]). Both surface as
//! [`ErrorKind::FrameExhausted`], which is exactly what a caller sees from a
//! failing `spawn`.

use crate::error::{Error, ErrorKind, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Sentinel for "no injected failure armed".
const INJECTION_DISARMED: u64 = u64::MAX;

/// Statistics for frame reservations.
///
/// Used by tests to verify conservation: after every handle has been
/// finished, `frames_live` returns to the number of long-lived reservations
/// (one counter cell per live scheduler) and `bytes_live` shrinks
/// accordingly.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameStats {
    /// Total number of successful reservations.
    pub reservations: u64,
    /// Total number of releases.
    pub released: u64,
    /// Current number of live reservations.
    pub frames_live: usize,
    /// Current reserved bytes.
    pub bytes_live: usize,
    /// High-water mark of reserved bytes.
    pub peak_bytes: usize,
}

#[derive(Debug)]
struct ArenaInner {
    /// Optional byte budget. `None` means unbounded.
    capacity: Option<usize>,
    /// Ordinal of the reservation attempt that should fail.
    fail_at: AtomicU64,
    /// Reservation attempts, successful or not. Drives failure injection.
    attempts: AtomicU64,
    reservations: AtomicU64,
    released: AtomicU64,
    frames_live: AtomicUsize,
    bytes_live: AtomicUsize,
    peak_bytes: AtomicUsize,
}

/// A thread-safe accounting allocator for activation frames.
///
/// Cloning is cheap; clones share the same budget and counters, so one arena
/// can back any number of schedulers.
#[derive(Debug, Clone)]
pub struct FrameArena {
    inner: Arc<ArenaInner>,
}

impl FrameArena {
    /// Creates an arena with no byte budget.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::build(None)
    }

    /// Creates an arena that refuses reservations past `bytes` live bytes.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self::build(Some(bytes))
    }

    fn build(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(ArenaInner {
                capacity,
                fail_at: AtomicU64::new(INJECTION_DISARMED),
                attempts: AtomicU64::new(0),
                reservations: AtomicU64::new(0),
                released: AtomicU64::new(0),
                frames_live: AtomicUsize::new(0),
                bytes_live: AtomicUsize::new(0),
                peak_bytes: AtomicUsize::new(0),
            }),
        }
    }

    /// Arms a one-shot failure: the reservation `attempts_from_now` attempts
    /// ahead fails (`0` fails the next one). Later attempts succeed again.
    pub fn inject_failure_after(&self, attempts_from_now: u64) {
        let now = self.inner.attempts.load(Ordering::Relaxed);
        self.inner
            .fail_at
            .store(now + attempts_from_now, Ordering::Relaxed);
    }

    /// Reserves `bytes` of frame storage.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::FrameExhausted`] if the reservation would exceed
    /// the configured capacity or an injected failure is armed for this
    /// attempt.
    pub fn reserve(&self, bytes: usize) -> Result<FrameGrant> {
        let inner = &self.inner;
        let attempt = inner.attempts.fetch_add(1, Ordering::Relaxed);
        if attempt == inner.fail_at.load(Ordering::Relaxed) {
            tracing::warn!(bytes, attempt, "frame reservation refused (injected)");
            return Err(Error::new(ErrorKind::FrameExhausted)
                .with_context("injected reservation failure"));
        }

        // Same increment-then-undo discipline as the admission counter: the
        // fast path is one fetch_add, the undo path only runs once the
        // budget is already exhausted.
        let prev = inner.bytes_live.fetch_add(bytes, Ordering::Relaxed);
        if let Some(cap) = inner.capacity {
            if prev + bytes > cap {
                inner.bytes_live.fetch_sub(bytes, Ordering::Relaxed);
                tracing::warn!(bytes, capacity = cap, live = prev, "frame budget exhausted");
                return Err(Error::new(ErrorKind::FrameExhausted)
                    .with_context(format!("frame budget exhausted: {prev} + {bytes} > {cap}")));
            }
        }

        inner.frames_live.fetch_add(1, Ordering::Relaxed);
        inner.reservations.fetch_add(1, Ordering::Relaxed);
        inner.peak_bytes.fetch_max(prev + bytes, Ordering::Relaxed);
        Ok(FrameGrant { bytes })
    }

    /// Releases a reservation, returning its bytes to the budget.
    pub fn release(&self, grant: FrameGrant) {
        let inner = &self.inner;
        inner.bytes_live.fetch_sub(grant.bytes, Ordering::Relaxed);
        inner.frames_live.fetch_sub(1, Ordering::Relaxed);
        inner.released.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of the reservation counters.
    #[must_use]
    pub fn stats(&self) -> FrameStats {
        let inner = &self.inner;
        FrameStats {
            reservations: inner.reservations.load(Ordering::Relaxed),
            released: inner.released.load(Ordering::Relaxed),
            frames_live: inner.frames_live.load(Ordering::Relaxed),
            bytes_live: inner.bytes_live.load(Ordering::Relaxed),
            peak_bytes: inner.peak_bytes.load(Ordering::Relaxed),
        }
    }
}

/// An owned reservation of frame storage.
///
/// Grants are released explicitly via [`FrameArena::release`]. A grant that
/// is dropped instead (a handle abandoned without `finish`) stays visible in
/// [`FrameStats`] as a live frame; the arena performs no hidden reclamation.
#[derive(Debug)]
pub struct FrameGrant {
    bytes: usize,
}

impl FrameGrant {
    /// Returns the reserved size in bytes.
    #[must_use]
    pub const fn bytes(&self) -> usize {
        self.bytes
    }
}
