//! Host executor contract and the reference thread pool.
//!
//! The admission layer does not bring its own event loop; it hands admitted
//! tasks to whatever implements [`HostExecutor`]. The contract is minimal:
//! accept a boxed task and eventually poll it to completion, honouring
//! wakers. Cooperative yielding is expressed by the task itself via
//! [`yield_now`], so any waker-correct executor works unmodified.
//!
//! [`ThreadPool`] is the reference implementation used by the tests and
//! benchmarks: a fixed set of worker threads, a shared injection queue, and
//! condvar parking. Work re-enters the queue when its waker fires, so a task
//! that yields may resume on a different worker.

use crossbeam_queue::SegQueue;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, JoinHandle};

/// A boxed task as handed to a host executor.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// An externally supplied driver for admitted tasks.
///
/// Implementations must tolerate `submit` from any thread. A submitted task
/// that is dropped before completion is reported to the spawner as lost, so
/// dropping on shutdown is legal, if impolite.
pub trait HostExecutor: Send + Sync {
    /// Starts a detached task. The executor owns it until completion.
    fn submit(&self, task: TaskFuture);
}

/// Cooperatively gives up the current worker.
///
/// The returned future is pending exactly once and wakes itself
/// immediately, so the executor gets a chance to run other ready work (and,
/// on a multi-worker executor, to migrate the caller).
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// A pool-owned task: the future plus the requeue path its waker uses.
struct PoolTask {
    /// The task body. `None` once it has run to completion.
    future: Mutex<Option<TaskFuture>>,
    /// Weak so a task parked in its own queue cannot keep the pool alive.
    pool: Weak<PoolInner>,
}

impl Wake for PoolTask {
    fn wake(self: Arc<Self>) {
        if let Some(inner) = self.pool.upgrade() {
            PoolInner::schedule(&inner, self);
        }
    }
}

struct PoolInner {
    /// Injection queue shared by submitters, wakers, and workers.
    queue: SegQueue<Arc<PoolTask>>,
    shutdown: AtomicBool,
    park_lock: Mutex<()>,
    park_cond: Condvar,
}

impl PoolInner {
    fn schedule(inner: &Arc<Self>, task: Arc<PoolTask>) {
        inner.queue.push(task);
        let _guard = inner.park_lock.lock().expect("pool lock poisoned");
        inner.park_cond.notify_one();
    }

    /// Polls one task. The slot lock is held across the poll so a waker
    /// firing mid-poll re-queues the task and the next worker to pick it up
    /// waits here instead of losing the wakeup.
    fn poll_task(task: &Arc<PoolTask>) {
        let waker = Waker::from(Arc::clone(task));
        let mut cx = Context::from_waker(&waker);
        let mut slot = task.future.lock().expect("task slot poisoned");
        if let Some(future) = slot.as_mut() {
            if future.as_mut().poll(&mut cx).is_ready() {
                *slot = None;
            }
        }
    }

    fn worker(inner: &Arc<Self>, index: usize) {
        tracing::debug!(worker = index, "pool worker started");
        loop {
            while let Some(task) = inner.queue.pop() {
                Self::poll_task(&task);
            }
            let mut guard = inner.park_lock.lock().expect("pool lock poisoned");
            while inner.queue.is_empty() && !inner.shutdown.load(Ordering::Acquire) {
                guard = inner.park_cond.wait(guard).expect("pool lock poisoned");
            }
            if inner.shutdown.load(Ordering::Acquire) {
                // Drop anything still queued so pending result channels
                // disconnect and spawners see their tasks as lost.
                while let Some(task) = inner.queue.pop() {
                    *task.future.lock().expect("task slot poisoned") = None;
                }
                break;
            }
        }
        tracing::debug!(worker = index, "pool worker stopped");
    }
}

/// A fixed-size worker pool driving submitted tasks to completion.
///
/// Dropping the pool shuts it down: workers are woken, joined, and any task
/// still queued or suspended is dropped. Spawners holding handles to such
/// tasks observe them as lost.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    handles: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Creates a pool with `workers` threads.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero or a worker thread cannot be spawned.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "worker count must be at least 1");
        let inner = Arc::new(PoolInner {
            queue: SegQueue::new(),
            shutdown: AtomicBool::new(false),
            park_lock: Mutex::new(()),
            park_cond: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let inner = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("byol-worker-{index}"))
                .spawn(move || PoolInner::worker(&inner, index))
                .expect("failed to spawn pool worker");
            handles.push(handle);
        }

        Self { inner, handles }
    }

    /// Returns a cloneable submission handle to this pool.
    #[must_use]
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.handles.len())
            .field("shutdown", &self.inner.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Release);
        {
            let _guard = self.inner.park_lock.lock().expect("pool lock poisoned");
            self.inner.park_cond.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// A cloneable [`HostExecutor`] front for a [`ThreadPool`].
#[derive(Clone)]
pub struct PoolHandle {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("shutdown", &self.inner.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}

impl HostExecutor for PoolHandle {
    fn submit(&self, task: TaskFuture) {
        if self.inner.shutdown.load(Ordering::Acquire) {
            tracing::warn!("task submitted to a shut-down pool; dropping it");
            return;
        }
        let pool_task = Arc::new(PoolTask {
            future: Mutex::new(Some(task)),
            pool: Arc::downgrade(&self.inner),
        });
        PoolInner::schedule(&self.inner, pool_task);
    }
}
