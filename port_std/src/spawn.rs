//! Thread-per-task integration glue on top of [`crate::HostPort`].
//!
//! `rtk_kernel` itself never spawns a thread or calls a task's entry
//! function — that is a port responsibility, normally discharged by
//! `Port::init_stack` producing a stack frame that transfers control to
//! `entry(args)` on first resume. `HostPort` does not implement
//! `init_stack` (its default `unimplemented!()` body is never reached);
//! instead, this module is what actually runs a task's body, on its own
//! `std::thread`, parked on its [`crate::port::wait_for_turn`] gate until
//! the scheduler says it is that thread's turn.
use crate::port::{bind_current_thread_to_slot, wait_for_turn, HostPort};
use rtk_kernel::{
    task_create, task_delete, task_port_slot, task_restart, task_start, CreateTaskError, Kernel,
    StartTaskError, TaskEntry, TaskId, TaskMode,
};
use std::thread;
use std::time::Duration;

/// Bring the kernel up and bind the calling thread to the idle task's slot.
///
/// The idle task's `entry` is never actually called (see
/// `rtk_kernel::task::idle_entry`'s doc comment), so unlike every other
/// task this one gets no dedicated thread: the thread that calls `start`
/// simply *becomes* idle from the scheduler's point of view, parking right
/// here (inside a later `request_switch`, transitively, the next time this
/// thread makes a kernel call that yields the CPU) whenever a higher-priority
/// task preempts it, and resuming when the kernel switches back. Matches
/// `Kernel::start`'s own doc comment: it returns on this port specifically
/// because idle is "a real, joinable OS thread" — this one.
pub fn start(kernel: &'static Kernel<HostPort>) {
    let _ = env_logger::try_init();
    bind_current_thread_to_slot(0);
    kernel.start();
}

/// Create a task and give it its own OS thread, parked until the scheduler
/// first switches to it. Returns once the thread is spawned and parked, not
/// once the task has actually run (that only happens once [`task_start`] is
/// called and the scheduler picks it).
pub fn spawn_task(
    kernel: &'static Kernel<HostPort>,
    name: [u8; 4],
    entry: TaskEntry,
    args: [u32; 4],
    priority: u8,
    stack_bytes: usize,
    mode: TaskMode,
) -> Result<TaskId, CreateTaskError> {
    let id = task_create(kernel, name, entry, args, priority, stack_bytes, mode)?;
    let slot = task_port_slot(kernel, id).expect("just created");
    run_task_thread(kernel, id, slot, entry, args, name);
    Ok(id)
}

/// Start a task created with [`spawn_task`]. Thin wrapper kept only so a
/// caller pulls both halves of task bring-up from one module.
pub fn start_task(kernel: &'static Kernel<HostPort>, id: TaskId) -> Result<(), StartTaskError> {
    task_start(kernel, id)
}

/// Restart a task, respawning its OS thread.
///
/// Known limitation of this hosted port: if the task's previous thread is
/// still alive — blocked inside a kernel call rather than having returned
/// from `entry` — it is not forcibly terminated (there is no safe way to do
/// that to a `std::thread`). It leaks, parked on the same slot's gate as the
/// freshly spawned replacement, and whichever of the two happens to observe
/// the gate open first wins the next turn. Safe to call once the task's
/// body has already returned (the pattern `rtk_kernel`'s own integration
/// tests use); not safe to call on a task currently blocked mid-call.
pub fn restart_task(kernel: &'static Kernel<HostPort>, id: TaskId) -> Result<(), StartTaskError> {
    task_restart(kernel, id)?;
    let slot = task_port_slot(kernel, id).expect("task_restart validated id");
    if let Some((entry, args, name)) = crate::registry::lookup(id) {
        run_task_thread(kernel, id, slot, entry, args, name);
    }
    Ok(())
}

fn run_task_thread(
    kernel: &'static Kernel<HostPort>,
    id: TaskId,
    slot: usize,
    entry: TaskEntry,
    args: [u32; 4],
    name: [u8; 4],
) {
    crate::registry::remember(id, entry, args, name);
    thread::Builder::new()
        .name(String::from_utf8_lossy(&name).trim_end_matches('\0').to_owned())
        .spawn(move || {
            bind_current_thread_to_slot(slot);
            wait_for_turn(slot);
            entry(args);
            // The task's own body returned without calling `task_delete`
            // itself (SPEC_FULL has no explicit "task return" operation);
            // treat it the same way a real port's idle-loop-on-return would.
            let _ = task_delete(kernel, id);
        })
        .expect("failed to spawn task thread");
}

/// Advance the port's own tick counter and the kernel's tick pipeline
/// together, synchronously, by exactly one tick.
///
/// `HostPort::now_ticks` (the `TICKS` atomic) and `rtk_kernel`'s internal
/// `tick_count` are two independently-advanced counters; [`spawn_ticker`]
/// is the only other place that advances both together, and it does so on
/// its own background thread at wall-clock pace, which is unsuitable for a
/// test that wants a deterministic, single-step tick with no sleeping or
/// race against a ticker thread. Integration tests should prefer this.
pub fn tick_once(kernel: &'static Kernel<HostPort>) {
    crate::port::advance_tick();
    rtk_kernel::tick(kernel);
}

/// A ticker thread driving [`rtk_kernel::tick`] at a fixed period, for
/// integration tests and development builds that want wall-clock-paced
/// ticks rather than calling `tick` by hand.
pub fn spawn_ticker(kernel: &'static Kernel<HostPort>, period: Duration) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("rtk-ticker".into())
        .spawn(move || loop {
            thread::sleep(period);
            crate::port::advance_tick();
            rtk_kernel::tick(kernel);
        })
        .expect("failed to spawn ticker thread")
}
