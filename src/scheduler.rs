//! The admission core.
//!
//! A [`Scheduler`] turns every spawn site into a decision point. One shared
//! atomic counter tracks how many tasks are currently out on the host
//! executor; a spawn that finds the counter below `max_tasks` hands its
//! future to the executor (widening the execution graph), and a spawn that
//! finds the bound reached defers the future into the handle, where
//! `finish` later drives it inline on the caller (keeping the graph
//! depth-first).
//!
//! The admission test is increment-then-compare-then-undo: the fast path is
//! a single `fetch_add`, and the undo `fetch_sub` only runs once the bound
//! is already hit, where bookkeeping cost no longer matters. The counter may
//! transiently exceed the bound inside `spawn`; the excess is invisible
//! because it is undone before `spawn` returns. All counter traffic is
//! `Relaxed`: the counter bounds resource use, it does not order memory.
//!
//! Deep recursion under saturation therefore serialises naturally: inline
//! children never touch the counter, and each completing admitted task frees
//! one slot for the next spawner to arrive.

use crate::error::{Error, ErrorKind, Result};
use crate::exec::{yield_now, HostExecutor};
use crate::frame::{FrameArena, FrameGrant};
use crate::handle::{Mode, TaskHandle};
use crate::oneshot;
use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared between a scheduler, its clones, and every admitted task's
/// completion guard. The counter cell is the only mutable state.
struct Shared {
    /// Admission bound. Immutable after construction.
    max_tasks: usize,
    /// Tasks currently admitted and not yet completed.
    active: AtomicUsize,
    arena: FrameArena,
    executor: Option<Arc<dyn HostExecutor>>,
    /// Reservation backing the counter cell, released when the last owner
    /// goes away.
    counter_grant: Option<FrameGrant>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        debug_assert_eq!(
            self.active.load(Ordering::Relaxed),
            0,
            "scheduler dropped with admitted tasks still in flight"
        );
        if let Some(grant) = self.counter_grant.take() {
            self.arena.release(grant);
        }
    }
}

/// Decrements the admission counter exactly once, on every exit path of an
/// admitted task — completion, error, or the executor dropping the task.
struct AdmitGuard {
    shared: Arc<Shared>,
}

impl Drop for AdmitGuard {
    fn drop(&mut self) {
        self.shared.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The wrapper every admitted task runs inside.
///
/// Rust futures are lazy, so the wrapper is suspended from birth: `spawn`
/// publishes the handle before any of this runs. On first poll it yields,
/// handing the worker back to the executor (which is free to migrate the
/// task); then it drives the user future and sends the output through the
/// result channel. The guard travels with the wrapper, so the counter is
/// rebalanced no matter how the wrapper exits.
fn completion_wrapper<F>(
    guard: AdmitGuard,
    future: F,
    tx: oneshot::Sender<F::Output>,
) -> impl Future<Output = ()> + Send
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    async move {
        let _guard = guard;
        yield_now().await;
        let output = future.await;
        // The spawner may have abandoned the handle; nothing to do then.
        let _ = tx.send(output);
    }
}

/// A task-admission scheduler over an externally supplied executor.
///
/// The scheduler value is immutable after construction and cheap to clone;
/// clones share the admission counter and may spawn and finish freely across
/// tasks and threads.
///
/// # Example
///
/// ```ignore
/// let pool = ThreadPool::new(4);
/// let scheduler = Scheduler::new(
///     FrameArena::unbounded(),
///     Some(Arc::new(pool.handle())),
///     64,
/// )?;
///
/// let handle = scheduler.spawn(async { 2 + 2 })?;
/// assert_eq!(scheduler.finish(handle).await?, 4);
/// ```
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Creates a scheduler with the given frame arena, host executor, and
    /// admission bound.
    ///
    /// `max_tasks` of zero is allowed: every spawn is then deferred and all
    /// work runs inline on the caller. Without an executor the scheduler
    /// behaves the same way regardless of the bound.
    ///
    /// # Errors
    ///
    /// Returns the arena's error if the shared counter cell cannot be
    /// reserved.
    pub fn new(
        arena: FrameArena,
        executor: Option<Arc<dyn HostExecutor>>,
        max_tasks: usize,
    ) -> Result<Self> {
        let counter_grant = arena.reserve(mem::size_of::<AtomicUsize>())?;
        tracing::debug!(max_tasks, has_executor = executor.is_some(), "scheduler created");
        Ok(Self {
            shared: Arc::new(Shared {
                max_tasks,
                active: AtomicUsize::new(0),
                arena,
                executor,
                counter_grant: Some(counter_grant),
            }),
        })
    }

    /// Returns the admission bound.
    #[must_use]
    pub fn max_tasks(&self) -> usize {
        self.shared.max_tasks
    }

    /// Returns the number of currently admitted, uncompleted tasks.
    ///
    /// Advisory: the value is stale the moment it is read. After every
    /// outstanding handle has been finished it is exactly zero.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.shared.active.load(Ordering::Relaxed)
    }

    /// Spawns a task.
    ///
    /// If the admission counter is below the bound and an executor is
    /// installed, the task is handed to the executor and starts running
    /// concurrently. Otherwise the future is deferred into the handle and
    /// will run inline when [`finish`](Self::finish) is called. Either way
    /// the returned handle must be finished exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::FrameExhausted`] if the frame reservation is
    /// refused; the admission counter is already rebalanced when the error
    /// is returned.
    pub fn spawn<F>(&self, future: F) -> Result<TaskHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let shared = &self.shared;
        if let Some(executor) = &shared.executor {
            let prev = shared.active.fetch_add(1, Ordering::Relaxed);
            if prev < shared.max_tasks {
                return self.spawn_admitted(Arc::clone(executor), future);
            }
            shared.active.fetch_sub(1, Ordering::Relaxed);
        }
        self.spawn_deferred(future)
    }

    fn spawn_admitted<F>(
        &self,
        executor: Arc<dyn HostExecutor>,
        future: F,
    ) -> Result<TaskHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let guard = AdmitGuard {
            shared: Arc::clone(&self.shared),
        };
        let task = completion_wrapper(guard, future, tx);

        // Dropping `task` on the failure path drops the guard, undoing the
        // admission increment before the error is surfaced.
        let frame_bytes = mem::size_of_val(&task);
        let grant = self.shared.arena.reserve(frame_bytes)?;

        tracing::trace!(
            frame_bytes,
            active = self.shared.active.load(Ordering::Relaxed),
            "task admitted"
        );
        executor.submit(Box::pin(task));
        Ok(TaskHandle::admitted(rx, grant))
    }

    fn spawn_deferred<F>(&self, future: F) -> Result<TaskHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let frame_bytes = mem::size_of_val(&future);
        let grant = self.shared.arena.reserve(frame_bytes)?;
        tracing::trace!(frame_bytes, "task deferred");
        Ok(TaskHandle::deferred(Box::pin(future), grant))
    }

    /// Retrieves a spawned task's result, consuming the handle.
    ///
    /// A deferred task runs here, inline on the caller; an admitted task is
    /// awaited. The frame reservation is released on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::TaskLost`] if the host executor dropped an
    /// admitted task before it completed. User-level errors are not errors
    /// of `finish`: a task whose output is a `Result` comes back as
    /// `Ok(Err(..))`, untouched.
    pub async fn finish<T>(&self, handle: TaskHandle<T>) -> Result<T> {
        let (mode, grant) = handle.into_parts();
        let result = match mode {
            Mode::Deferred(future) => Ok(future.await),
            Mode::Admitted(rx) => rx.await.map_err(|_closed| {
                Error::new(ErrorKind::TaskLost)
                    .with_context("executor dropped the task before completion")
            }),
        };
        self.shared.arena.release(grant);
        result
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("max_tasks", &self.shared.max_tasks)
            .field("active_tasks", &self.active_tasks())
            .field("has_executor", &self.shared.executor.is_some())
            .finish()
    }
}
