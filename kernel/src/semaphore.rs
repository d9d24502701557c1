//! Counting semaphores (SPEC_FULL §4.3).
//!
//! Grounded on upstream's `semaphore.rs`/`wait.rs` pair: a semaphore is a
//! count plus a wait queue, and `sem_v` hands a permit directly to the
//! highest-priority (or longest-waiting, depending on the semaphore's wait
//! order) waiter rather than just incrementing the count and letting
//! waiters race to decrement it — direct hand-off, no missed-wakeup window.
//!
//! The wait-queue/block/wake plumbing here (see [`take_or_block`],
//! [`give`], [`delete_wake_all`]) is written generically enough that
//! [`crate::queue`] reuses it verbatim for a queue's internal
//! receive-availability counter, rather than duplicating the same dance.
use crate::error::{CreateSemError, SemSignalError, SemWaitError};
use crate::kernel::Kernel;
use crate::klock::CriticalSection;
use crate::port::Port;
use crate::task::{self, TaskId, WaitOn, WaitOutcome};
use crate::timer::Timeout;
use crate::utils::{Arena, DList, Id, Init};

/// A semaphore identifier (SPEC_FULL §3, GLOSSARY "smid").
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemId(pub(crate) Id);

impl core::fmt::Debug for SemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SemId({})", self.0.raw())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOrder {
    /// Waiters are granted permits in the order they blocked.
    Fifo,
    /// Waiters are granted permits in priority order, ties broken FIFO.
    Priority,
}

pub(crate) struct Scb {
    pub(crate) name: [u8; 4],
    pub(crate) count: u32,
    pub(crate) max_count: u32,
    pub(crate) order: WaitOrder,
    pub(crate) waiters: DList,
}

pub fn sem_create<P: Port>(
    k: &Kernel<P>,
    name: [u8; 4],
    initial_count: u32,
    max_count: u32,
    order: WaitOrder,
) -> Result<SemId, CreateSemError> {
    if initial_count > max_count {
        return Err(CreateSemError::BadParam);
    }
    let cs = k.cs.enter();
    let id = create_internal(k.sems.get_mut(&cs), name, initial_count, max_count, order)
        .map_err(|_| CreateSemError::NoScb)?;
    drop(cs);
    Ok(SemId(id))
}

pub(crate) fn create_internal<const N: usize>(
    sems: &mut Arena<Scb, N>,
    name: [u8; 4],
    initial_count: u32,
    max_count: u32,
    order: WaitOrder,
) -> Result<Id, Scb> {
    sems.insert(Scb {
        name,
        count: initial_count,
        max_count,
        order,
        waiters: DList::INIT,
    })
}

/// Delete a semaphore, waking every waiter with [`SemWaitError::ObjDeleted`].
pub fn sem_delete<P: Port>(k: &Kernel<P>, id: SemId) -> Result<(), crate::error::IdentError> {
    let mut cs = k.cs.enter();
    if !k.sems.get(&cs).contains(id.0) {
        return Err(crate::error::IdentError::ObjNotFound);
    }
    delete_wake_all(k, &mut cs, id.0);
    k.sems.get_mut(&cs).remove(id.0);
    task::unlock_and_check_preemption(k, cs);
    Ok(())
}

/// Look up a semaphore by its 4-byte name (SPEC_FULL §4.4), a linear scan
/// exactly like [`crate::task::task_ident`].
pub fn sem_ident<P: Port>(k: &Kernel<P>, name: [u8; 4]) -> Result<SemId, crate::error::IdentError> {
    let cs = k.cs.enter();
    k.sems
        .get(&cs)
        .iter()
        .find(|(_, scb)| scb.name == name)
        .map(|(id, _)| SemId(id))
        .ok_or(crate::error::IdentError::ObjNotFound)
}

/// Acquire a permit, blocking per `timeout` if none is immediately
/// available.
pub fn sem_p<P: Port>(k: &Kernel<P>, id: SemId, timeout: Timeout) -> Result<(), SemWaitError> {
    let mut cs = k.cs.enter();
    if !k.sems.get(&cs).contains(id.0) {
        return Err(SemWaitError::ObjDeleted);
    }
    match take_or_block(k, &mut cs, id.0, WaitOn::Semaphore(id.0), timeout) {
        TakeOutcome::Taken => {
            task::unlock_and_check_preemption(k, cs);
            Ok(())
        }
        TakeOutcome::WouldBlockNoWait => {
            drop(cs);
            Err(SemWaitError::NoSem)
        }
        TakeOutcome::Blocked(waiter) => {
            task::unlock_and_check_preemption(k, cs);
            let cs2 = k.cs.enter();
            let outcome = task::wait_outcome(k, &cs2, waiter);
            drop(cs2);
            match outcome {
                WaitOutcome::Signaled => Ok(()),
                WaitOutcome::TimedOut => Err(SemWaitError::Timeout),
                WaitOutcome::Deleted => Err(SemWaitError::ObjDeleted),
            }
        }
    }
}

/// Release a permit, handing it directly to the highest-priority (or
/// longest-waiting) blocked waiter if one exists, else incrementing the
/// count. Rejected once `count == max_count` and nobody is waiting.
pub fn sem_v<P: Port>(k: &Kernel<P>, id: SemId) -> Result<(), SemSignalError> {
    let mut cs = k.cs.enter();
    if !k.sems.get(&cs).contains(id.0) {
        return Err(SemSignalError::ObjDeleted);
    }
    match give(k, &mut cs, id.0) {
        Ok(()) => {
            task::unlock_and_check_preemption(k, cs);
            Ok(())
        }
        Err(()) => {
            drop(cs);
            Err(SemSignalError::SemFull)
        }
    }
}

pub(crate) enum TakeOutcome {
    Taken,
    WouldBlockNoWait,
    Blocked(TaskId),
}

/// Try to take a permit from `scb_id` immediately; if none is available and
/// `timeout` permits blocking, enqueue the current task as a waiter (in
/// `scb_id`'s wait order) and arm its timeout.
///
/// Shared between [`sem_p`] and [`crate::queue::queue_receive`]'s internal
/// receive-availability counter.
pub(crate) fn take_or_block<P: Port>(
    k: &Kernel<P>,
    cs: &mut CriticalSection<'_, P>,
    scb_id: Id,
    wait_on: WaitOn,
    timeout: Timeout,
) -> TakeOutcome {
    {
        let sems = k.sems.get_mut(cs);
        let scb = sems.get_mut(scb_id).expect("caller validated id");
        if scb.count > 0 {
            scb.count -= 1;
            return TakeOutcome::Taken;
        }
    }
    if let Timeout::NoWait = timeout {
        return TakeOutcome::WouldBlockNoWait;
    }
    let waiter = task::block_current(k, cs, wait_on);
    enqueue_waiter(k, cs, scb_id, waiter);
    if let Timeout::Ticks(ticks) = timeout {
        let timer_id = crate::timer::arm_timeout(k, cs, waiter, ticks);
        k.tasks.get_mut(cs).get_mut(waiter.0).unwrap().timeout_timer = Some(timer_id);
    }
    TakeOutcome::Blocked(waiter)
}

fn enqueue_waiter<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>, scb_id: Id, waiter: TaskId) {
    let sems = k.sems.get_mut(cs);
    let scb = sems.get_mut(scb_id).expect("caller validated id");
    match scb.order {
        WaitOrder::Fifo => {
            scb.waiters.push_back(k.tasks.get_mut(cs), waiter.0);
        }
        WaitOrder::Priority => {
            let priority = k
                .tasks
                .get(cs)
                .get(waiter.0)
                .expect("just blocked")
                .priority;
            scb.waiters
                .insert_sorted_by_key(k.tasks.get_mut(cs), waiter.0, priority, |t| t.priority);
        }
    }
}

/// Hand a permit to the head waiter if any, else bump the count (rejecting
/// overflow past `max_count`).
pub(crate) fn give<P: Port>(
    k: &Kernel<P>,
    cs: &mut CriticalSection<'_, P>,
    scb_id: Id,
) -> Result<(), ()> {
    let head = k.sems.get(cs).get(scb_id).expect("caller validated id").waiters.front();
    if let Some(waiter_id) = head {
        let sems = k.sems.get_mut(cs);
        let scb = sems.get_mut(scb_id).unwrap();
        scb.waiters.pop_front(k.tasks.get_mut(cs));
        task::wake(k, cs, TaskId(waiter_id), WaitOutcome::Signaled);
        return Ok(());
    }
    let sems = k.sems.get_mut(cs);
    let scb = sems.get_mut(scb_id).unwrap();
    if scb.count >= scb.max_count {
        return Err(());
    }
    scb.count += 1;
    Ok(())
}

/// Wake every waiter on `scb_id` with [`WaitOutcome::Deleted`]. Used by both
/// `sem_delete` and `queue_delete`.
pub(crate) fn delete_wake_all<P: Port>(k: &Kernel<P>, cs: &mut CriticalSection<'_, P>, scb_id: Id) {
    loop {
        let head = k.sems.get(cs).get(scb_id).expect("caller validated id").waiters.front();
        let Some(waiter_id) = head else { break };
        k.sems
            .get_mut(cs)
            .get_mut(scb_id)
            .unwrap()
            .waiters
            .pop_front(k.tasks.get_mut(cs));
        task::wake(k, cs, TaskId(waiter_id), WaitOutcome::Deleted);
    }
}

/// Remove a specific waiter from `scb_id`'s wait queue without waking it
/// (used by [`crate::task::task_delete`]/forced [`crate::task::task_suspend`]
/// pulling a task out of a wait it never gets to finish).
pub(crate) fn unlink_waiter<P: Port>(
    k: &Kernel<P>,
    cs: &CriticalSection<'_, P>,
    scb_id: Id,
    waiter: TaskId,
) {
    let sems = k.sems.get_mut(cs);
    let scb = sems.get_mut(scb_id).expect("caller validated id");
    scb.waiters.remove(k.tasks.get_mut(cs), waiter.0);
}
