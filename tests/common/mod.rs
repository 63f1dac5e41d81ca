#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use byol::{FrameArena, Scheduler, ThreadPool};
use std::sync::Arc;

pub use byol::test_utils::init_test_logging;

/// Builds a thread pool plus a scheduler backed by it.
///
/// The pool is returned so the caller keeps it alive for the duration of
/// the test; dropping it shuts the workers down.
pub fn pool_scheduler(workers: usize, max_tasks: usize) -> (ThreadPool, Scheduler, FrameArena) {
    let pool = ThreadPool::new(workers);
    let arena = FrameArena::unbounded();
    let scheduler = Scheduler::new(arena.clone(), Some(Arc::new(pool.handle())), max_tasks)
        .expect("scheduler init failed");
    (pool, scheduler, arena)
}

/// Builds a scheduler with no executor: every spawn is deferred.
pub fn inline_scheduler() -> (Scheduler, FrameArena) {
    let arena = FrameArena::unbounded();
    let scheduler = Scheduler::new(arena.clone(), None, 1).expect("scheduler init failed");
    (scheduler, arena)
}
