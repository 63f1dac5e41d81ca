//! Admission-bound, conservation, and error-path properties.

mod common;

use byol::{oneshot, FrameArena, Scheduler};
use common::{init_test_logging, pool_scheduler};
use futures_lite::future::block_on;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The number of admitted, unfinished tasks never exceeds the bound — not
/// at spawn sites and not as observed from inside running tasks.
#[test]
fn admitted_tasks_stay_within_bound() {
    init_test_logging();
    const BOUND: usize = 3;
    let (_pool, scheduler, _arena) = pool_scheduler(4, BOUND);
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..200u64 {
        let observer = scheduler.clone();
        let peak = Arc::clone(&peak);
        let handle = scheduler
            .spawn(async move {
                peak.fetch_max(observer.active_tasks(), Ordering::Relaxed);
                byol::yield_now().await;
                i
            })
            .expect("spawn failed");
        assert!(scheduler.active_tasks() <= BOUND);
        handles.push(handle);
    }

    let mut total = 0;
    for handle in handles {
        total += block_on(scheduler.finish(handle)).expect("finish failed");
    }

    assert_eq!(total, (0..200).sum::<u64>());
    assert!(peak.load(Ordering::Relaxed) <= BOUND);
    // Conservation: all admissions were paid back.
    assert_eq!(scheduler.active_tasks(), 0);
}

/// Under a bound of one, every spawn after the first is deferred, and each
/// spawn costs exactly one frame reservation.
#[test]
fn saturated_spawns_are_deferred() {
    init_test_logging();
    let (_pool, scheduler, arena) = pool_scheduler(2, 1);

    byol::test_section!("fill the single slot");
    let (gate, gate_rx) = oneshot::channel::<()>();
    let first = scheduler
        .spawn(async move {
            let _ = gate_rx.await;
            0u64
        })
        .expect("spawn failed");
    assert!(first.is_admitted());

    byol::test_section!("everything else defers");
    let before = arena.stats();
    let mut rest = Vec::new();
    for i in 1..=50u64 {
        let handle = scheduler.spawn(async move { i }).expect("spawn failed");
        assert!(!handle.is_admitted());
        rest.push(handle);
    }
    assert_eq!(arena.stats().reservations - before.reservations, 50);
    assert_eq!(scheduler.active_tasks(), 1);

    byol::test_section!("drain");
    gate.send(()).expect("gate send failed");
    let mut total = block_on(scheduler.finish(first)).expect("finish failed");
    for handle in rest {
        total += block_on(scheduler.finish(handle)).expect("finish failed");
    }

    assert_eq!(total, (0..=50).sum::<u64>());
    assert_eq!(scheduler.active_tasks(), 0);
    byol::test_complete!("saturated_spawns_are_deferred", total = total);
}

/// A refused reservation surfaces as the allocator error and leaves the
/// admission counter exactly where it was.
#[test]
fn reservation_failure_leaves_counter_unchanged() {
    init_test_logging();
    let (_pool, scheduler, arena) = pool_scheduler(1, 8);

    arena.inject_failure_after(0);
    let before = scheduler.active_tasks();
    let err = scheduler
        .spawn(async { 1u32 })
        .expect_err("expected reservation failure");
    assert!(err.is_frame_exhausted());
    assert_eq!(scheduler.active_tasks(), before);

    // The failure is one-shot; the scheduler is still usable.
    let handle = scheduler.spawn(async { 2u32 }).expect("spawn failed");
    assert_eq!(block_on(scheduler.finish(handle)), Ok(2));
}

/// Scheduler construction itself reports the allocator error when the
/// counter cell cannot be reserved.
#[test]
fn init_fails_on_exhausted_arena() {
    init_test_logging();
    let arena = FrameArena::with_capacity(0);
    let err = Scheduler::new(arena, None, 4).expect_err("expected init failure");
    assert!(err.is_frame_exhausted());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UserFailure;

/// A failing task surfaces its error untouched, and siblings spawned in the
/// same scope still run and release cleanly.
#[test]
fn user_errors_propagate_untouched() {
    init_test_logging();
    let (_pool, scheduler, arena) = pool_scheduler(2, 4);
    let frames_after_init = arena.stats().frames_live;

    let failing = scheduler
        .spawn(async { Err::<u64, UserFailure>(UserFailure) })
        .expect("spawn failed");
    let sibling = scheduler
        .spawn(async { Ok::<u64, UserFailure>(7) })
        .expect("spawn failed");

    let failed = block_on(scheduler.finish(failing)).expect("finish failed");
    assert_eq!(failed, Err(UserFailure));

    let ok = block_on(scheduler.finish(sibling)).expect("finish failed");
    assert_eq!(ok, Ok(7));

    assert_eq!(scheduler.active_tasks(), 0);
    assert_eq!(arena.stats().frames_live, frames_after_init);
}

/// A bound of zero is legal: every handle comes back deferred and all work
/// runs inline on the caller.
#[test]
fn zero_bound_round_trip() {
    init_test_logging();
    let (_pool, scheduler, _arena) = pool_scheduler(2, 0);

    let mut handles = Vec::new();
    for i in 0..32u64 {
        let handle = scheduler.spawn(async move { i * i }).expect("spawn failed");
        assert!(!handle.is_admitted());
        assert_eq!(scheduler.active_tasks(), 0);
        handles.push(handle);
    }

    let mut total = 0;
    for handle in handles {
        total += block_on(scheduler.finish(handle)).expect("finish failed");
    }
    assert_eq!(total, (0..32u64).map(|i| i * i).sum::<u64>());
}

/// Frames are conserved: the arena returns to its post-init level once all
/// handles are finished, and to zero once the scheduler itself is gone.
#[test]
fn frames_are_conserved() {
    init_test_logging();
    let (_pool, scheduler, arena) = pool_scheduler(2, 2);
    let frames_after_init = arena.stats().frames_live;

    let mut handles = Vec::new();
    for i in 0..16u64 {
        handles.push(scheduler.spawn(async move { i }).expect("spawn failed"));
    }
    assert_eq!(arena.stats().frames_live, frames_after_init + 16);

    for handle in handles {
        block_on(scheduler.finish(handle)).expect("finish failed");
    }
    let stats = arena.stats();
    assert_eq!(stats.frames_live, frames_after_init);
    assert!(stats.peak_bytes >= stats.bytes_live);

    drop(scheduler);
    assert_eq!(arena.stats().frames_live, 0);
    assert_eq!(arena.stats().bytes_live, 0);
}
