//! [`HostPort`]: the [`rtk_kernel::Port`] implementation backing this crate.
//!
//! # Cooperative scheduling model
//!
//! Every task runs on its own real OS thread. [`Port::request_switch`] makes
//! "the kernel picked task X to run next" true by opening X's [`Gate`] and,
//! if the call is being made on the very thread that was running the
//! previously-current task, parking that thread on its own gate until it is
//! chosen again — this is the "real OS thread parked on a condition
//! variable" the upstream [`rtk_kernel::Port`] doc comment describes.
//!
//! That covers every switch this kernel actually drives synchronously: a
//! task blocking on a semaphore/queue/event/sleep, a task creating or
//! unblocking a higher-priority task, and so on all happen inline on the
//! calling task's own thread. The one case it does not cover is
//! `tick()`-driven preemption of a CPU-bound task that never re-enters the
//! kernel: called from a dedicated ticker thread (see [`crate::spawn_ticker`]),
//! `tick()` can decide to preempt the currently-running task, but there is no
//! thread to suspend out from under it short of the signal-based remote-park
//! upstream's real threading backend uses. This port does not implement
//! that; a task's own thread keeps running until its next kernel call, at
//! which point the scheduler's bookkeeping (already updated by `tick()`) is
//! honored. Documented in the crate's `DESIGN.md` as a hosted-port
//! limitation, not a kernel semantic gap — every target this kernel actually
//! ships on has a real timer interrupt and does not share this limitation.
use crate::gate::Gate;
use crate::intlock::IntLock;
use rtk_kernel::{Port, TaskSwitchInfo};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Which port slot the calling OS thread represents, if any. Set once by
/// [`crate::spawn_task`] (or by [`crate::start`] for the thread that becomes
/// the idle task) before the thread ever calls into the kernel.
thread_local! {
    static CURRENT_SLOT: Cell<Option<usize>> = const { Cell::new(None) };
}

pub(crate) fn bind_current_thread_to_slot(slot: usize) {
    CURRENT_SLOT.with(|c| c.set(Some(slot)));
}

fn gates() -> &'static [Gate] {
    static GATES: OnceLock<Vec<Gate>> = OnceLock::new();
    GATES.get_or_init(|| {
        (0..rtk_kernel::config::MAX_TASKS)
            .map(|_| Gate::new())
            .collect()
    })
}

static INT_LOCK: IntLock = IntLock::new();
static TICKS: AtomicU64 = AtomicU64::new(0);
static NEXT_ALARM: AtomicU64 = AtomicU64::new(u64::MAX);

pub(crate) fn advance_tick() -> u64 {
    TICKS.fetch_add(1, Ordering::AcqRel) + 1
}

pub(crate) fn next_alarm() -> u64 {
    NEXT_ALARM.load(Ordering::Acquire)
}

/// The hosted [`Port`] used by tests and by any development build that runs
/// on the developer's own machine rather than a target MCU. Zero-sized: like
/// every [`Port`], all of its state lives in module statics rather than on
/// `self` (the trait's methods take none), matching how a real port's
/// "instance data" is just its target's memory-mapped registers.
pub struct HostPort;

// Safety: `INT_LOCK` provides genuine mutual exclusion between every OS
// thread that could be mid-kernel-call, and `Gate` only ever grants one
// thread "running" status at a time (see the module doc above for the one
// acknowledged gap).
unsafe impl Port for HostPort {
    type Cookie = bool;

    unsafe fn ints_disable() -> Self::Cookie {
        INT_LOCK.disable()
    }

    unsafe fn ints_restore(cookie: Self::Cookie) {
        INT_LOCK.restore(cookie);
    }

    fn now_ticks() -> u64 {
        TICKS.load(Ordering::Acquire)
    }

    fn set_next_alarm(absolute_ticks: u64) {
        NEXT_ALARM.store(absolute_ticks, Ordering::Release);
        log::trace!("set_next_alarm({absolute_ticks})");
    }

    // `init_stack`'s default `unimplemented!()` body is never exercised:
    // `rtk_kernel::task::task_create` never calls it (this kernel's tasks
    // are always real OS threads, not a saved stack frame the port resumes).

    fn request_switch(from: Option<TaskSwitchInfo>, to: TaskSwitchInfo) {
        log::trace!("request_switch({from:?}, {to:?})");
        gates()[to.port_task_state_index].open();
        if let Some(from) = from {
            if from.task_id_raw == to.task_id_raw {
                return;
            }
            let am_from = CURRENT_SLOT.with(|c| c.get()) == Some(from.port_task_state_index);
            if am_from {
                gates()[from.port_task_state_index].wait();
            }
        }
    }
}

/// Block the calling thread until its own slot's gate is opened. Used by the
/// thread loop [`crate::spawn_task`] installs for every task, including the
/// idle task's thread, to wait for its first (and, for a task whose body
/// returns, only ever its one) turn to run.
pub(crate) fn wait_for_turn(slot: usize) {
    gates()[slot].wait();
}
