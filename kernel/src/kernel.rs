//! The top-level kernel object: one instance per binary, tying every
//! subsystem's pool together behind the critical section (SPEC_FULL §5).
//!
//! Upstream has no single runtime value playing this role — its state lives
//! in `static`s generated per const-generic `Traits` instantiation by the
//! `build!` macro. This crate has one concrete kernel, so the same state is
//! simply a `struct` an integrator constructs once (typically as a
//! `static`) and passes a `&'static` reference to everywhere.
use crate::config::{MAX_QUEUES, MAX_SEMAPHORES, MAX_TASKS, MAX_TIMERS};
use crate::klock::{CriticalSectionState, KCell};
use crate::port::Port;
use crate::queue::{MsgArena, Qcb};
use crate::semaphore::Scb;
use crate::task::{Scheduler, Tcb};
use crate::timer::{TimerService, Tmcb};
use crate::utils::{Arena, Init};

/// Everything the kernel owns, generic over the integrator-supplied [`Port`].
///
/// Every field that participates in kernel state lives in a [`KCell`],
/// guarded by `cs`. `Kernel` itself holds no `UnsafeCell` of its own; it is
/// `Sync` purely because each field is.
pub struct Kernel<P: Port> {
    pub(crate) cs: CriticalSectionState<P>,
    pub(crate) tasks: KCell<Arena<Tcb, MAX_TASKS>>,
    pub(crate) sched: KCell<Scheduler>,
    pub(crate) sems: KCell<Arena<Scb, MAX_SEMAPHORES>>,
    pub(crate) queues: KCell<Arena<Qcb, MAX_QUEUES>>,
    pub(crate) msg_arena: KCell<MsgArena>,
    pub(crate) timers: KCell<TimerService>,
    pub(crate) timer_pool: KCell<Arena<Tmcb, MAX_TIMERS>>,
}

impl<P: Port> Kernel<P> {
    /// Build a fresh, not-yet-started kernel. Const so it can be placed in a
    /// `static`.
    pub const fn new() -> Self {
        Self {
            cs: CriticalSectionState::new(),
            tasks: KCell::new(Arena::INIT),
            sched: KCell::new(Scheduler::INIT),
            sems: KCell::new(Arena::INIT),
            queues: KCell::new(Arena::INIT),
            msg_arena: KCell::new(MsgArena::INIT),
            timers: KCell::new(TimerService::INIT),
            timer_pool: KCell::new(Arena::INIT),
        }
    }

    /// Bring the kernel up: create the idle task and enter the scheduler for
    /// the first time. Never returns on a real port (the calling context
    /// becomes the idle task's boot stack); returns on the hosted port only
    /// because its idle task is a real, joinable OS thread used solely by
    /// the test suite.
    pub fn start(&'static self) {
        crate::task::init_idle_task(self);
        let cs = self.cs.enter();
        crate::task::unlock_and_check_preemption(self, cs);
    }
}

impl<P: Port> Default for Kernel<P> {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: every field is a `KCell`/`CriticalSectionState`, both `Sync` under
// the same "only touched with interrupts masked" argument.
unsafe impl<P: Port> Sync for Kernel<P> {}
