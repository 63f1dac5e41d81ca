//! Byol: bounded cooperative task admission on top of an externally supplied
//! executor ("bring your own loop").
//!
//! # Overview
//!
//! Byol lets application code express fine-grained parallel recursion —
//! parallel divide-and-conquer over trees, ranges, partitions — without a
//! work-stealing scheduler and without unbounded memory growth. Every spawn
//! site is a decision point: a single process-wide counter of in-flight
//! tasks decides whether the child future is handed to the host executor
//! (widening the execution graph) or deferred into its handle to run inline
//! when finished (keeping the graph depth-first). The code is written once;
//! both modes look identical at the call site.
//!
//! # Core Guarantees
//!
//! - **Bounded admission**: at most `max_tasks` spawned futures are out on
//!   the executor at any time; everything past the bound runs inline
//! - **Conservation**: every admission is matched by exactly one counter
//!   decrement when the task completes, on every exit path
//! - **Transparent results**: a task's output — including a user-level
//!   `Result` — comes back from `finish` untouched
//! - **Observable frames**: every task frame is reserved through an
//!   accounting arena, so leak checks are plain counter assertions
//!
//! # Module Structure
//!
//! - [`scheduler`]: The admission core (`Scheduler`, spawn/finish)
//! - [`handle`]: Dual-mode task handles
//! - [`frame`]: Activation-frame accounting ([`FrameArena`])
//! - [`exec`]: Host executor contract, [`yield_now`], reference [`ThreadPool`]
//! - [`oneshot`]: Single-use result channel
//! - [`error`]: Error types
//! - [`test_utils`]: Logging setup and macros for tests
//!
//! # Example
//!
//! ```ignore
//! use byol::{FrameArena, Scheduler, ThreadPool};
//! use std::sync::Arc;
//!
//! let pool = ThreadPool::new(4);
//! let scheduler = Scheduler::new(
//!     FrameArena::unbounded(),
//!     Some(Arc::new(pool.handle())),
//!     64,
//! )?;
//!
//! futures_lite::future::block_on(async {
//!     let child = scheduler.spawn(async { heavy_half(&data) })?;
//!     let left = light_half(&data);
//!     let right = scheduler.finish(child).await?;
//!     Ok(left + right)
//! })
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod exec;
pub mod frame;
pub mod handle;
pub mod oneshot;
pub mod scheduler;
pub mod test_utils;

pub use error::{Error, ErrorKind, Result};
pub use exec::{yield_now, HostExecutor, PoolHandle, TaskFuture, ThreadPool, YieldNow};
pub use frame::{FrameArena, FrameGrant, FrameStats};
pub use handle::TaskHandle;
pub use scheduler::Scheduler;
