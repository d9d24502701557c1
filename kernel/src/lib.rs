//! A fixed-priority preemptive microkernel for deeply-embedded targets
//! (SPEC_FULL §1-§2): tasks and an O(1) priority-bucketed scheduler,
//! semaphores, per-task event flags, fixed-size message queues, and a
//! shared timer service driving all three.
//!
//! Every kernel call takes a `&Kernel<P>` explicitly rather than reaching
//! into thread-local or global state, so an integrator can run more than
//! one independent kernel instance (e.g. a hosted test building several
//! kernels in one process) without any of this crate's own state being
//! `static`. A single top-level `static KERNEL: Kernel<MyPort> =
//! Kernel::new();` plus a call to [`Kernel::start`] is the typical
//! integration shape; see `rtk_port_std` for a complete one against a
//! hosted `Port`.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod event;
pub mod kernel;
pub mod klock;
pub mod port;
pub mod queue;
pub mod semaphore;
pub mod task;
pub mod timer;
pub mod utils;

pub use error::ErrorCode;
pub use event::ev_receive;
pub use event::ev_send;
pub use kernel::Kernel;
pub use port::{Port, SavedSp, TaskEntry, TaskSwitchInfo};
pub use queue::{
    queue_broadcast, queue_create, queue_delete, queue_ident, queue_receive, queue_send,
    queue_urgent, QueueId,
};
pub use semaphore::{sem_create, sem_delete, sem_ident, sem_p, sem_v, SemId, WaitOrder};
pub use task::{
    task_create, task_delete, task_getreg, task_ident, task_mode, task_port_slot, task_restart,
    task_resume, task_setpri, task_setreg, task_start, task_suspend, TaskId, TaskMode,
};
pub use timer::{
    tick, timer_cancel, timer_evafter, timer_evevery, timer_evwhen, timer_get, timer_set,
    timer_wkafter, timer_wkwhen, Timeout, TimerId,
};
