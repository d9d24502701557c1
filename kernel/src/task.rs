//! Tasks and the fixed-priority preemptive scheduler (SPEC_FULL §4.2).
//!
//! Upstream spreads this across `task.rs` (the TCB and its public API) and a
//! scheduler woven into `state.rs`/`task.rs` together, both generic over a
//! const-generic `Traits` parameter carrying the application's static task
//! set. This crate's task set is dynamic (`task_create` allocates from a
//! fixed-capacity pool at runtime), so the TCB pool is a plain
//! [`Arena`](crate::utils::Arena) and the scheduler a concrete [`Scheduler`]
//! value living in [`Kernel`].
use bitflags::bitflags;

use crate::config::{MAX_PRIORITY, MAX_TASKS, MIN_STACK_BYTES, PRIO_BITMAP_WORDS, TIME_SLICE_TICKS};
use crate::error::{
    CreateTaskError, DeleteTaskError, IdentError, ResumeTaskError, SetTaskPriorityError,
    StartTaskError, SuspendTaskError, TaskRegError,
};
use crate::kernel::Kernel;
use crate::klock::CriticalSection;
use crate::port::{Port, SavedSp, TaskEntry, TaskSwitchInfo};
use crate::timer::TimerId;
use crate::utils::{DList, Id, Init, Linked, Links, PrioBitmap};

/// A task identifier. Opaque outside the crate; carries a generation so a
/// handle to a deleted (and slot-reused) task is never mistaken for the new
/// occupant (SPEC_FULL §3, "Id" in the GLOSSARY).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) Id);

impl core::fmt::Debug for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TaskId({})", self.0.raw())
    }
}

bitflags! {
    /// Per-task mode bits (SPEC_FULL §4.2, §6 "Flag vocabulary"). Absence of
    /// a bit is always the ordinary, fully-preemptive default; every bit
    /// here is something a task opts *into*, so `TaskMode::empty()` (what
    /// the idle task and every `task_create` caller that doesn't care gets)
    /// is the conventional fixed-priority-preemptive behavior this kernel
    /// started with.
    pub struct TaskMode: u8 {
        /// Rotate this task to the back of its priority bucket after
        /// [`crate::config::TIME_SLICE_TICKS`] ticks of uninterrupted
        /// running, instead of running until it blocks or is preempted.
        const TIME_SLICE = 0b0000_0001;
        /// "no-preempt" (SPEC_FULL §6): while this task is
        /// [`TaskState::Running`], a higher-priority task becoming Ready
        /// does not request a switch away from it — it keeps the CPU until
        /// it blocks, is suspended/deleted, or (if also [`Self::TIME_SLICE`])
        /// its slice runs out. Named from the *disabled* side so the bit's
        /// absence (the common case) matches the kernel's original
        /// behavior.
        const NO_PREEMPT = 0b0000_0010;
        /// Hints to the port that this task uses the FPU and its lazy
        /// context needs saving across a switch (SPEC_FULL §4.1: "The port
        /// is responsible for FPU/lazy context preservation if
        /// applicable"). The kernel core stores and round-trips this bit
        /// but does not itself act on it; a real port reads it via whatever
        /// side channel it keeps per task slot.
        const FPU = 0b0000_0100;
        /// "ASR-mask" (SPEC_FULL §6): masks this task's asynchronous signal
        /// routine. Stored for compatibility with the fixed flag encoding;
        /// the asynchronous-signal subsystem itself is out of this kernel's
        /// scope (SPEC_FULL §1), so the bit has no behavioral effect here.
        const ASR_MASK = 0b0000_1000;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Created but never started.
    Created,
    Ready,
    Running,
    Blocked,
    Suspended,
}

/// Why a blocked task was woken, read back by the blocking call once it
/// resumes (ref. the wait/wake protocol described alongside
/// [`unlock_and_check_preemption`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Signaled,
    TimedOut,
    Deleted,
}

/// What a blocked task is waiting for, kept only so [`task_delete`] and
/// forced [`task_suspend`] know which wait structure to unlink it from.
#[derive(Clone, Copy, Debug)]
pub(crate) enum WaitOn {
    Semaphore(Id),
    /// A queue's internal receive-count semaphore; unlinked exactly like
    /// [`WaitOn::Semaphore`] but recorded separately for clearer bookkeeping.
    QueueRecv(Id),
    Event,
    /// `timer_wkafter`/`timer_wkwhen`: no wait queue to unlink from, the
    /// task's only path back to `Ready` is its own timeout timer firing.
    Sleep,
}

pub(crate) struct Tcb {
    pub(crate) links: Links,
    pub(crate) name: [u8; 4],
    pub(crate) priority: u8,
    pub(crate) base_priority: u8,
    pub(crate) state: TaskState,
    pub(crate) mode: TaskMode,
    pub(crate) entry: TaskEntry,
    pub(crate) args: [u32; 4],
    pub(crate) stack_bytes: usize,
    pub(crate) port_slot: usize,
    pub(crate) saved_sp: Option<SavedSp>,
    /// A small fixed register file read/written by `task_getreg`/
    /// `task_setreg` (SPEC_FULL §4.2, resolving Open Question #5: this
    /// kernel does not interpret these words, it just stores them as an
    /// inter-task scratch area addressed by register number).
    pub(crate) registers: [u32; 4],
    pub(crate) pending_events: u32,
    pub(crate) waiting_events: u32,
    pub(crate) wait_all: bool,
    pub(crate) wait_on: Option<WaitOn>,
    pub(crate) wait_outcome: WaitOutcome,
    /// The event set delivered by the `ev_send` that satisfied this task's
    /// last `ev_receive` wait, read back once it resumes (ref.
    /// [`crate::event`]).
    pub(crate) event_result: u32,
    /// A message handed directly to this task by `queue_broadcast`,
    /// bypassing the ring buffer (ref. [`crate::queue`]).
    pub(crate) direct_message: Option<[u32; 4]>,
    pub(crate) timeout_timer: Option<TimerId>,
    pub(crate) slice_remaining: u32,
}

impl Linked for Tcb {
    fn links(&self) -> &Links {
        &self.links
    }
    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

/// The ready-queue scheduler: one FIFO bucket per priority level plus a
/// bitmap of non-empty buckets for O(1) highest-priority lookup (SPEC_FULL
/// §4.2, "O(1) ready-task selection").
pub(crate) struct Scheduler {
    pub(crate) ready: [DList; MAX_PRIORITY],
    pub(crate) ready_mask: PrioBitmap<PRIO_BITMAP_WORDS>,
    pub(crate) current: Option<TaskId>,
    pub(crate) context_switches: u64,
}

impl Init for Scheduler {
    const INIT: Self = Self {
        ready: Init::INIT,
        ready_mask: PrioBitmap::INIT,
        current: None,
        context_switches: 0,
    };
}

fn idle_entry(_args: [u32; 4]) {
    // Never actually invoked by this crate: the hosted port's idle task
    // loops on a condvar rather than calling back into `entry`, and a real
    // port supplies its own reset-vector-driven idle loop. Kept only so the
    // idle TCB has a well-typed `entry` field.
    loop {}
}

/// Validate a public-facing priority (SPEC_FULL §4.2: `task_create`
/// "validate `priority ∈ 1..255`"). `0` is reserved, and `u8::MAX`
/// (`MAX_PRIORITY - 1`) is the idle task's fixed priority and is never
/// assignable to an application task.
pub(crate) fn validate_priority(pub_priority: u8) -> Result<u8, ()> {
    let _: () = [(); 1][(MAX_PRIORITY != u8::MAX as usize + 1) as usize];
    if pub_priority == 0 || pub_priority as usize == MAX_PRIORITY - 1 {
        return Err(());
    }
    Ok(pub_priority)
}

/// Create the idle task: always task slot 0, priority `u8::MAX` (lowest),
/// always runnable. Every kernel has exactly one, created once by
/// [`Kernel::start`](crate::kernel::Kernel::start).
pub(crate) fn init_idle_task<P: Port>(k: &Kernel<P>) {
    let cs = k.cs.enter();
    let tasks = k.tasks.get_mut(&cs);
    let sched = k.sched.get_mut(&cs);
    let id = tasks
        .insert(Tcb {
            links: Links::INIT,
            name: *b"idle",
            priority: u8::MAX,
            base_priority: u8::MAX,
            state: TaskState::Ready,
            mode: TaskMode::empty(),
            entry: idle_entry,
            args: [0; 4],
            stack_bytes: MIN_STACK_BYTES,
            port_slot: 0,
            saved_sp: None,
            registers: [0; 4],
            pending_events: 0,
            waiting_events: 0,
            wait_all: false,
            wait_on: None,
            wait_outcome: WaitOutcome::Signaled,
            event_result: 0,
            direct_message: None,
            timeout_timer: None,
            slice_remaining: TIME_SLICE_TICKS,
        })
        .ok()
        .expect("idle task must be the first allocation out of an empty arena");
    sched.ready[u8::MAX as usize].push_back(tasks, id);
    sched.ready_mask.set(u8::MAX as usize);
}

/// Create a task in the [`TaskState::Created`] state. It does not run until
/// [`task_start`].
pub fn task_create<P: Port>(
    k: &Kernel<P>,
    name: [u8; 4],
    entry: TaskEntry,
    args: [u32; 4],
    priority: u8,
    stack_bytes: usize,
    mode: TaskMode,
) -> Result<TaskId, CreateTaskError> {
    if stack_bytes < MIN_STACK_BYTES {
        return Err(CreateTaskError::TinyStk);
    }
    let priority = validate_priority(priority).map_err(|_| CreateTaskError::BadPriority)?;

    let cs = k.cs.enter();
    let tasks = k.tasks.get_mut(&cs);
    let id = tasks
        .insert(Tcb {
            links: Links::INIT,
            name,
            priority,
            base_priority: priority,
            state: TaskState::Created,
            mode,
            entry,
            args,
            stack_bytes,
            // Placeholder: the arena slot (and therefore the stable,
            // collision-free port slot a task keeps for its whole life) is
            // only known once `insert` returns the id it landed in.
            port_slot: 0,
            saved_sp: None,
            registers: [0; 4],
            pending_events: 0,
            waiting_events: 0,
            wait_all: false,
            wait_on: None,
            wait_outcome: WaitOutcome::Signaled,
            event_result: 0,
            direct_message: None,
            timeout_timer: None,
            slice_remaining: TIME_SLICE_TICKS,
        })
        .map_err(|_| CreateTaskError::NoTcb)?;
    // The arena index is unique among *live* slots (unlike `tasks.len()`,
    // which a `task_delete` followed by a `task_create` can make two live
    // tasks share), so it doubles safely as the port's per-task slot index.
    tasks.get_mut(id).expect("just inserted").port_slot = id.index();
    drop(cs);
    Ok(TaskId(id))
}

/// Move a [`TaskState::Created`] (or, after [`task_restart`]'s rebuild,
/// freshly-recreated) task to [`TaskState::Ready`].
pub fn task_start<P: Port>(k: &Kernel<P>, id: TaskId) -> Result<(), StartTaskError> {
    let mut cs = k.cs.enter();
    let tasks = k.tasks.get_mut(&cs);
    let task = tasks.get_mut(id.0).ok_or(StartTaskError::ObjDeleted)?;
    if task.state != TaskState::Created {
        return Err(StartTaskError::Active);
    }
    task.state = TaskState::Ready;
    task.slice_remaining = TIME_SLICE_TICKS;
    #[cfg(feature = "log")]
    log::debug!("task_start({})", id.0.raw());
    enqueue_ready(k, &mut cs, id);
    unlock_and_check_preemption(k, cs);
    Ok(())
}

/// Destroy and rebuild the task in place: equivalent to `task_delete`
/// followed by a `task_create` with the same entry/args/priority/stack
/// parameters and the same `id`, then `task_start` (SPEC_FULL §9, resolving
/// Open Question #4). Valid from any state but [`TaskState::Created`]
/// (nothing to restart) and "does not exist".
pub fn task_restart<P: Port>(k: &Kernel<P>, id: TaskId) -> Result<(), StartTaskError> {
    let mut cs = k.cs.enter();
    let (entry, args, base_priority, stack_bytes, mode) = {
        let tasks = k.tasks.get_mut(&cs);
        let task = tasks.get_mut(id.0).ok_or(StartTaskError::ObjDeleted)?;
        if task.state == TaskState::Created {
            return Err(StartTaskError::Active);
        }
        unlink_from_current_structure(k, &cs, id);
        (
            task.entry,
            task.args,
            task.base_priority,
            task.stack_bytes,
            task.mode,
        )
    };
    {
        let tasks = k.tasks.get_mut(&cs);
        let task = tasks.get_mut(id.0).expect("checked above");
        task.priority = base_priority;
        task.state = TaskState::Ready;
        task.entry = entry;
        task.args = args;
        task.stack_bytes = stack_bytes;
        task.mode = mode;
        task.registers = [0; 4];
        task.pending_events = 0;
        task.waiting_events = 0;
        task.event_result = 0;
        task.direct_message = None;
        task.wait_on = None;
        task.timeout_timer = None;
        task.slice_remaining = TIME_SLICE_TICKS;
        task.saved_sp = None;
    }
    enqueue_ready(k, &mut cs, id);
    unlock_and_check_preemption(k, cs);
    Ok(())
}

/// Unlink `id` from whatever ready bucket or wait queue currently holds its
/// links, and cancel any outstanding timeout timer. Used by
/// [`task_suspend`]'s forced-suspend path, [`task_restart`], and
/// [`task_delete`], all of which need to yank a task out of kernel state
/// regardless of what it was doing.
fn unlink_from_current_structure<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>, id: TaskId) {
    let (state, priority, wait_on, timeout_timer) = {
        let tasks = k.tasks.get(cs);
        let task = tasks.get(id.0).expect("caller validated id");
        (task.state, task.priority, task.wait_on, task.timeout_timer)
    };
    match state {
        TaskState::Ready => {
            let sched = k.sched.get_mut(cs);
            let tasks = k.tasks.get_mut(cs);
            sched.ready[priority as usize].remove(tasks, id.0);
            if sched.ready[priority as usize].is_empty() {
                sched.ready_mask.clear(priority as usize);
            }
        }
        TaskState::Blocked => match wait_on {
            Some(WaitOn::Semaphore(sem_id)) => {
                crate::semaphore::unlink_waiter(k, cs, sem_id, id);
            }
            Some(WaitOn::QueueRecv(sem_id)) => {
                crate::semaphore::unlink_waiter(k, cs, sem_id, id);
            }
            Some(WaitOn::Event) | Some(WaitOn::Sleep) | None => {}
        },
        TaskState::Running | TaskState::Created | TaskState::Suspended => {}
    }
    if let Some(timer_id) = timeout_timer {
        crate::timer::cancel_internal(k, cs, timer_id);
    }
    let tasks = k.tasks.get_mut(cs);
    let task = tasks.get_mut(id.0).expect("caller validated id");
    task.wait_on = None;
    task.timeout_timer = None;
}

/// Forcibly suspend a task regardless of what it is doing (SPEC_FULL §4.2:
/// "any -> Suspended"). A task blocked on a semaphore, queue, or event wait
/// is pulled out of that wait (its timeout, if any, is cancelled) rather
/// than left "blocked and suspended" at once — this kernel does not model
/// that combination, a choice recorded in `DESIGN.md`.
pub fn task_suspend<P: Port>(k: &Kernel<P>, id: TaskId) -> Result<(), SuspendTaskError> {
    let mut cs = k.cs.enter();
    {
        let tasks = k.tasks.get(&cs);
        let task = tasks.get(id.0).ok_or(SuspendTaskError::ObjDeleted)?;
        if task.state == TaskState::Suspended {
            return Err(SuspendTaskError::Suspended);
        }
    }
    unlink_from_current_structure(k, &cs, id);
    let tasks = k.tasks.get_mut(&cs);
    tasks.get_mut(id.0).expect("checked above").state = TaskState::Suspended;
    unlock_and_check_preemption(k, cs);
    Ok(())
}

/// Resume a [`TaskState::Suspended`] task to [`TaskState::Ready`]. Never
/// restores whatever wait it was forced out of by [`task_suspend`].
pub fn task_resume<P: Port>(k: &Kernel<P>, id: TaskId) -> Result<(), ResumeTaskError> {
    let mut cs = k.cs.enter();
    {
        let tasks = k.tasks.get_mut(&cs);
        let task = tasks.get_mut(id.0).ok_or(ResumeTaskError::ObjDeleted)?;
        if task.state != TaskState::Suspended {
            return Err(ResumeTaskError::NotSuspended);
        }
        task.state = TaskState::Ready;
    }
    enqueue_ready(k, &mut cs, id);
    unlock_and_check_preemption(k, cs);
    Ok(())
}

/// Delete a task (never the idle task, which has no public `TaskId`
/// reachable via `task_create`'s return value). Frees its pool slot; any
/// subsequent use of `id` fails with `ObjDeleted`/`BadId` thanks to the
/// arena's generation check.
pub fn task_delete<P: Port>(k: &Kernel<P>, id: TaskId) -> Result<(), DeleteTaskError> {
    let mut cs = k.cs.enter();
    if !k.tasks.get(&cs).contains(id.0) {
        return Err(DeleteTaskError::ObjDeleted);
    }
    unlink_from_current_structure(k, &cs, id);
    let was_current = k.sched.get(&cs).current == Some(id);
    k.tasks.get_mut(&cs).remove(id.0);
    #[cfg(feature = "log")]
    log::debug!("task_delete({})", id.0.raw());
    if was_current {
        k.sched.get_mut(&cs).current = None;
    }
    unlock_and_check_preemption(k, cs);
    Ok(())
}

pub fn task_setpri<P: Port>(
    k: &Kernel<P>,
    id: TaskId,
    priority: u8,
) -> Result<(), SetTaskPriorityError> {
    let priority = validate_priority(priority).map_err(|_| SetTaskPriorityError::BadPriority)?;
    let mut cs = k.cs.enter();
    let old_state_and_prio = {
        let tasks = k.tasks.get(&cs);
        let task = tasks.get(id.0).ok_or(SetTaskPriorityError::ObjDeleted)?;
        (task.state, task.priority)
    };
    match old_state_and_prio.0 {
        TaskState::Ready => {
            // Move to the new bucket; re-entering at the tail like any
            // freshly-readied task (a priority change is not a tie-break
            // position within the old bucket).
            {
                let sched = k.sched.get_mut(&cs);
                let tasks = k.tasks.get_mut(&cs);
                let old_prio = old_state_and_prio.1 as usize;
                sched.ready[old_prio].remove(tasks, id.0);
                if sched.ready[old_prio].is_empty() {
                    sched.ready_mask.clear(old_prio);
                }
            }
            k.tasks.get_mut(&cs).get_mut(id.0).unwrap().priority = priority;
            enqueue_ready(k, &mut cs, id);
        }
        _ => {
            k.tasks.get_mut(&cs).get_mut(id.0).unwrap().priority = priority;
        }
    }
    unlock_and_check_preemption(k, cs);
    Ok(())
}

/// Update the modifiable mode bits (currently just
/// [`TaskMode::TIME_SLICE`]) on `current`, returning the previous value
/// (SPEC_FULL §4.2: `task_mode(mask, new_mode) -> old_mode`). Bits outside
/// `mask` are left untouched.
pub fn task_mode<P: Port>(k: &Kernel<P>, mask: TaskMode, new_mode: TaskMode) -> TaskMode {
    let cs = k.cs.enter();
    let id = k.sched.get(&cs).current.expect("a task is always running");
    let tasks = k.tasks.get_mut(&cs);
    let task = tasks.get_mut(id.0).expect("current task always exists");
    let old = task.mode;
    task.mode = (old - mask) | (new_mode & mask);
    old
}

/// The currently running task's id, for use by calls (e.g. `sem_p`) made on
/// "this task's" behalf without an explicit `TaskId` argument. Not part of
/// the public call surface; the public `task_ident` is the name-based
/// lookup below (SPEC_FULL §4.2).
pub(crate) fn current<P: Port>(k: &Kernel<P>) -> TaskId {
    let cs = k.cs.enter();
    k.sched
        .get(&cs)
        .current
        .expect("a task is always running once the kernel has started")
}

/// Look up a task by its 4-byte name (SPEC_FULL §4.2: "linear scan over the
/// active set"). The idle task's name (`b"idle"`) is reachable like any
/// other.
pub fn task_ident<P: Port>(k: &Kernel<P>, name: [u8; 4]) -> Result<TaskId, IdentError> {
    let cs = k.cs.enter();
    k.tasks
        .get(&cs)
        .iter()
        .find(|(_, task)| task.name == name)
        .map(|(id, _)| TaskId(id))
        .ok_or(IdentError::ObjNotFound)
}

pub fn task_getreg<P: Port>(k: &Kernel<P>, id: TaskId, reg: usize) -> Result<u32, TaskRegError> {
    let cs = k.cs.enter();
    let tasks = k.tasks.get(&cs);
    let task = tasks.get(id.0).ok_or(TaskRegError::ObjDeleted)?;
    task.registers.get(reg).copied().ok_or(TaskRegError::RegNum)
}

/// Write a task's register scratch slot. Rejected while the task is
/// [`TaskState::Running`] (SPEC_FULL §4.2): a running task's own registers
/// are presumed to live in the hardware register file and port-specific
/// saved context, not this array, so writing it here while the task could
/// be concurrently reading real registers would be meaningless.
pub fn task_setreg<P: Port>(
    k: &Kernel<P>,
    id: TaskId,
    reg: usize,
    value: u32,
) -> Result<(), TaskRegError> {
    let cs = k.cs.enter();
    let tasks = k.tasks.get_mut(&cs);
    let task = tasks.get_mut(id.0).ok_or(TaskRegError::ObjDeleted)?;
    if task.state == TaskState::Running {
        return Err(TaskRegError::Active);
    }
    let slot = task.registers.get_mut(reg).ok_or(TaskRegError::RegNum)?;
    *slot = value;
    Ok(())
}

/// The port-assigned slot for `id` (see [`TaskSwitchInfo::port_task_state_index`]),
/// for a [`Port`] implementation that needs to correlate a switch notification
/// with whatever per-task resource (OS thread, stack region, ...) it keeps
/// alongside the kernel's own task table.
pub fn task_port_slot<P: Port>(k: &Kernel<P>, id: TaskId) -> Option<usize> {
    let cs = k.cs.enter();
    k.tasks.get(&cs).get(id.0).map(|t| t.port_slot)
}

/// Push `id` onto the tail of its priority bucket and mark the bucket
/// ready. Does not itself trigger a reschedule; callers must follow with
/// [`unlock_and_check_preemption`].
pub(crate) fn enqueue_ready<P: Port>(k: &Kernel<P>, cs: &mut CriticalSection<'_, P>, id: TaskId) {
    let sched = k.sched.get_mut(cs);
    let tasks = k.tasks.get_mut(cs);
    let priority = tasks.get(id.0).expect("caller validated id").priority as usize;
    sched.ready[priority].push_back(tasks, id.0);
    sched.ready_mask.set(priority);
}

/// Block the current task on `wait_on`, with `wait_all`/`waiting_events`
/// meaningful only for [`WaitOn::Event`]. Does not itself trigger a
/// reschedule; callers must follow with [`unlock_and_check_preemption`].
pub(crate) fn block_current<P: Port>(
    k: &Kernel<P>,
    cs: &CriticalSection<'_, P>,
    wait_on: WaitOn,
) -> TaskId {
    let id = k.sched.get(cs).current.expect("a task is always running");
    let tasks = k.tasks.get_mut(cs);
    let task = tasks.get_mut(id.0).expect("current task always exists");
    task.state = TaskState::Blocked;
    task.wait_on = Some(wait_on);
    id
}

/// The scheduling decision made once a critical section is about to be
/// released: compare the running task (if any) against the highest-priority
/// ready task and, if a switch is warranted, hand it to
/// [`Port::request_switch`].
///
/// This is the generalization of upstream's
/// `unlock_cpu_and_check_preemption`: every kernel call that might have
/// changed the ready set (a wakeup, a priority change, the current task
/// blocking or being deleted) ends by calling this instead of dropping its
/// critical section directly. The guard is consumed and dropped *before*
/// `request_switch` is called, so interrupts are unmasked for the actual
/// switch — required for the hosted port, whose `request_switch` blocks the
/// calling OS thread on a condition variable until it is chosen to run
/// again, simulating a suspended call stack.
pub(crate) fn unlock_and_check_preemption<P: Port>(k: &Kernel<P>, mut cs: CriticalSection<'_, P>) {
    let switch = decide_switch(k, &mut cs);
    drop(cs);
    if let Some((from, to)) = switch {
        P::request_switch(from, to);
    }
}

fn decide_switch<P: Port>(
    k: &Kernel<P>,
    cs: &mut CriticalSection<'_, P>,
) -> Option<(Option<TaskSwitchInfo>, TaskSwitchInfo)> {
    let current = k.sched.get(cs).current;
    if let Some(cur_id) = current {
        let tasks = k.tasks.get(cs);
        let cur_task = tasks.get(cur_id.0).expect("current task always exists");
        if cur_task.state == TaskState::Running {
            if cur_task.mode.contains(TaskMode::NO_PREEMPT) {
                // Holds the CPU regardless of what else is ready; only
                // blocking, being suspended/deleted, or its own slice
                // rotation (handled elsewhere, as a voluntary requeue) gives
                // it up.
                return None;
            }
            let top = k.sched.get(cs).ready_mask.find_set()?;
            if top as u8 >= cur_task.priority {
                // Current is still the highest-priority runnable task (or
                // tied, which never preempts: only a strictly higher
                // priority, a block, or a voluntary slice rotation causes a
                // switch).
                return None;
            }
            // Preempted: requeue at the tail of its own bucket.
            let priority = cur_task.priority;
            let sched = k.sched.get_mut(cs);
            let tasks = k.tasks.get_mut(cs);
            tasks.get_mut(cur_id.0).unwrap().state = TaskState::Ready;
            sched.ready[priority as usize].push_back(tasks, cur_id.0);
            sched.ready_mask.set(priority as usize);
        }
    }
    let top = k.sched.get(cs).ready_mask.find_set()?;
    let sched = k.sched.get_mut(cs);
    let tasks = k.tasks.get_mut(cs);
    let to_id = sched.ready[top].pop_front(tasks).expect("bitmap says non-empty");
    if sched.ready[top].is_empty() {
        sched.ready_mask.clear(top);
    }
    let to_task = tasks.get_mut(to_id).expect("just popped");
    to_task.state = TaskState::Running;
    to_task.slice_remaining = TIME_SLICE_TICKS;
    let to_info = TaskSwitchInfo {
        task_id_raw: to_id.raw(),
        port_task_state_index: to_task.port_slot,
    };
    let from_info = current.map(|cur_id| {
        let cur_task = tasks.get(cur_id.0).expect("current task always exists");
        TaskSwitchInfo {
            task_id_raw: cur_id.0.raw(),
            port_task_state_index: cur_task.port_slot,
        }
    });
    if current != Some(TaskId(to_id)) {
        sched.context_switches += 1;
        #[cfg(feature = "log")]
        log::trace!(
            "context switch: {:?} -> {}",
            current.map(|c| c.0.raw()),
            to_id.raw()
        );
    }
    sched.current = Some(TaskId(to_id));
    Some((from_info, to_info))
}

/// Called once per tick (ref. [`crate::timer::tick`]) to rotate a
/// time-sliced running task once its slice is exhausted (SPEC_FULL §4.2,
/// "Time-slicing (ADDED)"). Does not itself reschedule; the caller is
/// `tick()`, which calls [`unlock_and_check_preemption`] once after running
/// both the timer sweep and this.
pub(crate) fn tick_time_slice<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>) {
    let Some(cur_id) = k.sched.get(cs).current else {
        return;
    };
    let tasks = k.tasks.get_mut(cs);
    let task = tasks.get_mut(cur_id.0).expect("current task always exists");
    if !task.mode.contains(TaskMode::TIME_SLICE) || task.state != TaskState::Running {
        return;
    }
    task.slice_remaining = task.slice_remaining.saturating_sub(1);
    if task.slice_remaining > 0 {
        return;
    }
    task.slice_remaining = TIME_SLICE_TICKS;
    task.state = TaskState::Ready;
    let priority = task.priority;
    let sched = k.sched.get_mut(cs);
    sched.ready[priority as usize].push_back(tasks_mut(k, cs), cur_id.0);
    sched.ready_mask.set(priority as usize);
    sched.current = None;
}

// Small helper so `tick_time_slice` can re-borrow `k.tasks` mutably after
// already borrowing it above; avoids fighting the borrow checker over two
// sequential, non-overlapping `get_mut` calls within one function.
fn tasks_mut<'a, P: Port>(
    k: &'a Kernel<P>,
    cs: &CriticalSection<'a, P>,
) -> &'a mut crate::utils::Arena<Tcb, MAX_TASKS> {
    k.tasks.get_mut(cs)
}

/// Record the outcome of a finished wait and move the task back onto the
/// ready queue. Used by `sem_v`, event delivery, queue delivery, object
/// deletion, and timeout expiry alike.
pub(crate) fn wake<P: Port>(
    k: &Kernel<P>,
    cs: &mut CriticalSection<'_, P>,
    id: TaskId,
    outcome: WaitOutcome,
) {
    {
        let tasks = k.tasks.get_mut(cs);
        let task = tasks.get_mut(id.0).expect("waiter must still exist");
        debug_assert_eq!(task.state, TaskState::Blocked);
        task.state = TaskState::Ready;
        task.wait_on = None;
        task.wait_outcome = outcome;
        if let Some(timer_id) = task.timeout_timer.take() {
            if outcome != WaitOutcome::TimedOut {
                crate::timer::cancel_internal(k, cs, timer_id);
            }
        }
    }
    #[cfg(feature = "log")]
    log::trace!("wake({}, {outcome:?})", id.0.raw());
    enqueue_ready(k, cs, id);
}

pub(crate) fn wait_outcome<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>, id: TaskId) -> WaitOutcome {
    k.tasks.get(cs).get(id.0).expect("waiter must still exist").wait_outcome
}

/// Fire a `timer_wkafter`/`timer_wkwhen` wake: resume a task blocked on
/// [`WaitOn::Sleep`]. A silent no-op if `id` was deleted since the timer was
/// armed, or is no longer `Blocked` for some other reason (SPEC_FULL §4.3,
/// "an expired timer whose action refers to a freed task id is silently
/// dropped").
pub(crate) fn fire_wake<P: Port>(k: &Kernel<P>, cs: &mut CriticalSection<'_, P>, id: TaskId) {
    let Some(task) = k.tasks.get(cs).get(id.0) else {
        return;
    };
    if task.state != TaskState::Blocked {
        return;
    }
    wake(k, cs, id, WaitOutcome::Signaled);
}

/// Fire an internal blocking-call timeout: unlink `id` from whatever wait
/// structure it is parked on, then wake it with
/// [`WaitOutcome::TimedOut`]. Shared by every suspension point that accepts
/// a timeout (`sem_p`, `ev_receive`, `queue_receive`); [`WaitOn::Sleep`]
/// carries no wait structure to unlink from.
pub(crate) fn fire_timeout<P: Port>(k: &Kernel<P>, cs: &mut CriticalSection<'_, P>, id: TaskId) {
    let Some(task) = k.tasks.get(cs).get(id.0) else {
        return;
    };
    if task.state != TaskState::Blocked {
        return;
    }
    match task.wait_on {
        Some(WaitOn::Semaphore(scb_id)) | Some(WaitOn::QueueRecv(scb_id)) => {
            crate::semaphore::unlink_waiter(k, cs, scb_id, id);
        }
        Some(WaitOn::Event) => {
            k.tasks.get_mut(cs).get_mut(id.0).unwrap().waiting_events = 0;
        }
        Some(WaitOn::Sleep) | None => {}
    }
    wake(k, cs, id, WaitOutcome::TimedOut);
}
