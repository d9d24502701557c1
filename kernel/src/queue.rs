//! Fixed-size message queues (SPEC_FULL §4.6).
//!
//! Grounded on [`crate::semaphore`]'s wait-queue/block/wake plumbing, reused
//! here verbatim (per that module's doc comment) as the internal
//! receive-availability counter the data model calls for: "an internal
//! semaphore counts available-for-receive messages; waiters on 'queue
//! empty' block on that semaphore." The ring buffer itself is a classic
//! one-sentinel-slot circular buffer (`capacity + 1` reserved slots, "full"
//! iff advancing `nextin` would equal `nextout`, per SPEC_FULL §3) carved
//! out of a process-wide arena via a first-fit scan over a per-slot
//! occupancy table — the simplest allocator that still reclaims a deleted
//! queue's slots for reuse, which a pure bump allocator could not do.
use crate::error::{CreateQueueError, IdentError, QueueReceiveError, QueueSendError};
use crate::kernel::Kernel;
use crate::klock::CriticalSection;
use crate::port::Port;
use crate::semaphore::{self, TakeOutcome, WaitOrder};
use crate::task::{self, TaskId, WaitOn, WaitOutcome};
use crate::timer::Timeout;
use crate::utils::{Id, Init};

/// A message queue identifier (SPEC_FULL §3, GLOSSARY "qid").
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub(crate) Id);

impl core::fmt::Debug for QueueId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "QueueId({})", self.0.raw())
    }
}

pub(crate) struct Qcb {
    name: [u8; 4],
    /// Base index into the kernel's message-buffer arena. The queue owns
    /// `capacity + 1` consecutive slots starting here.
    base: usize,
    /// The number of messages the queue can hold (one less than its
    /// reserved arena slots).
    capacity: usize,
    /// Write cursor, local to `[0, capacity]`.
    nextin: usize,
    /// Read cursor, local to `[0, capacity]`.
    nextout: usize,
    /// The internal "messages available to receive" semaphore.
    recv_sem: Id,
}

impl Qcb {
    #[inline]
    fn buf_size(&self) -> usize {
        self.capacity + 1
    }
}

/// The process-wide arena every queue's ring buffer is carved out of
/// (SPEC_FULL §3/§5).
pub(crate) struct MsgArena {
    buffers: [[u32; 4]; crate::config::MAX_MSG_BUFFERS],
    occupied: [bool; crate::config::MAX_MSG_BUFFERS],
}

impl Init for MsgArena {
    const INIT: Self = Self {
        buffers: [[0; 4]; crate::config::MAX_MSG_BUFFERS],
        occupied: [false; crate::config::MAX_MSG_BUFFERS],
    };
}

impl MsgArena {
    /// First-fit: the first run of `len` consecutive free slots.
    fn alloc(&mut self, len: usize) -> Option<usize> {
        let mut run_start = 0;
        let mut run_len = 0;
        for i in 0..self.occupied.len() {
            if self.occupied[i] {
                run_start = i + 1;
                run_len = 0;
                continue;
            }
            run_len += 1;
            if run_len == len {
                self.occupied[run_start..=i].fill(true);
                return Some(run_start);
            }
        }
        None
    }

    fn free(&mut self, base: usize, len: usize) {
        self.occupied[base..base + len].fill(false);
    }
}

pub fn queue_create<P: Port>(
    k: &Kernel<P>,
    name: [u8; 4],
    capacity: usize,
    order: WaitOrder,
) -> Result<QueueId, CreateQueueError> {
    if capacity == 0 {
        return Err(CreateQueueError::BadParam);
    }
    let buf_size = capacity + 1;
    let cs = k.cs.enter();
    let base = k
        .msg_arena
        .get_mut(&cs)
        .alloc(buf_size)
        .ok_or(CreateQueueError::NoMgb)?;
    let recv_sem = match semaphore::create_internal(
        k.sems.get_mut(&cs),
        [0; 4],
        0,
        capacity as u32,
        order,
    ) {
        Ok(id) => id,
        Err(_) => {
            k.msg_arena.get_mut(&cs).free(base, buf_size);
            return Err(CreateQueueError::NoQcb);
        }
    };
    let id = k
        .queues
        .get_mut(&cs)
        .insert(Qcb {
            name,
            base,
            capacity,
            nextin: 0,
            nextout: 0,
            recv_sem,
        })
        .map_err(|_| {
            k.sems.get_mut(&cs).remove(recv_sem);
            k.msg_arena.get_mut(&cs).free(base, buf_size);
            CreateQueueError::NoQcb
        })?;
    drop(cs);
    Ok(QueueId(id))
}

/// Look up a queue by its 4-byte name (SPEC_FULL §4.6), a linear scan
/// exactly like [`crate::task::task_ident`]/[`crate::semaphore::sem_ident`].
pub fn queue_ident<P: Port>(k: &Kernel<P>, name: [u8; 4]) -> Result<QueueId, IdentError> {
    let cs = k.cs.enter();
    k.queues
        .get(&cs)
        .iter()
        .find(|(_, q)| q.name == name)
        .map(|(id, _)| QueueId(id))
        .ok_or(IdentError::ObjNotFound)
}

/// Release a queue's arena slots and internal semaphore; every blocked
/// receiver is unblocked with [`WaitOutcome::Deleted`] (SPEC_FULL §4.6).
pub fn queue_delete<P: Port>(k: &Kernel<P>, qid: QueueId) -> Result<(), IdentError> {
    let mut cs = k.cs.enter();
    let (base, buf_size, recv_sem) = {
        let q = k.queues.get(&cs).get(qid.0).ok_or(IdentError::ObjNotFound)?;
        (q.base, q.buf_size(), q.recv_sem)
    };
    semaphore::delete_wake_all(k, &mut cs, recv_sem);
    k.sems.get_mut(&cs).remove(recv_sem);
    k.msg_arena.get_mut(&cs).free(base, buf_size);
    k.queues.get_mut(&cs).remove(qid.0);
    task::unlock_and_check_preemption(k, cs);
    Ok(())
}

/// Non-blocking send: copy `msg` to `nextin`, advance, and wake (or credit)
/// a receiver via the internal semaphore. `QFull` if the ring has no room.
pub fn queue_send<P: Port>(k: &Kernel<P>, qid: QueueId, msg: [u32; 4]) -> Result<(), QueueSendError> {
    let mut cs = k.cs.enter();
    let (base, nextin, recv_sem) = {
        let q = k.queues.get(&cs).get(qid.0).ok_or(QueueSendError::ObjDeleted)?;
        if is_full(q) {
            drop(cs);
            return Err(QueueSendError::QFull);
        }
        (q.base, q.nextin, q.recv_sem)
    };
    write_slot(k, &cs, base + nextin, msg);
    {
        let q = k.queues.get_mut(&cs).get_mut(qid.0).expect("checked above");
        q.nextin = (q.nextin + 1) % q.buf_size();
    }
    let _ = semaphore::give(k, &mut cs, recv_sem);
    task::unlock_and_check_preemption(k, cs);
    Ok(())
}

/// Urgent send: insert `msg` at `nextout - 1` (wrapping) so it is the next
/// message received, ahead of everything already queued (SPEC_FULL §4.6).
pub fn queue_urgent<P: Port>(k: &Kernel<P>, qid: QueueId, msg: [u32; 4]) -> Result<(), QueueSendError> {
    let mut cs = k.cs.enter();
    let (base, new_nextout, recv_sem) = {
        let q = k.queues.get(&cs).get(qid.0).ok_or(QueueSendError::ObjDeleted)?;
        if is_full(q) {
            drop(cs);
            return Err(QueueSendError::QFull);
        }
        let buf_size = q.buf_size();
        (q.base, (q.nextout + buf_size - 1) % buf_size, q.recv_sem)
    };
    write_slot(k, &cs, base + new_nextout, msg);
    k.queues.get_mut(&cs).get_mut(qid.0).expect("checked above").nextout = new_nextout;
    let _ = semaphore::give(k, &mut cs, recv_sem);
    task::unlock_and_check_preemption(k, cs);
    Ok(())
}

/// Receive a message, blocking per `timeout` if none is available
/// (SPEC_FULL §4.6): fast path dequeues immediately; slow path parks on the
/// internal semaphore and retries the dequeue once woken.
pub fn queue_receive<P: Port>(
    k: &Kernel<P>,
    qid: QueueId,
    timeout: Timeout,
) -> Result<[u32; 4], QueueReceiveError> {
    let mut cs = k.cs.enter();
    let recv_sem = k
        .queues
        .get(&cs)
        .get(qid.0)
        .ok_or(QueueReceiveError::ObjDeleted)?
        .recv_sem;
    match semaphore::take_or_block(k, &mut cs, recv_sem, WaitOn::QueueRecv(recv_sem), timeout) {
        TakeOutcome::Taken => {
            let msg = dequeue(k, &cs, qid);
            task::unlock_and_check_preemption(k, cs);
            Ok(msg)
        }
        TakeOutcome::WouldBlockNoWait => {
            drop(cs);
            Err(QueueReceiveError::NoMsg)
        }
        TakeOutcome::Blocked(waiter) => {
            task::unlock_and_check_preemption(k, cs);
            let cs2 = k.cs.enter();
            let outcome = task::wait_outcome(k, &cs2, waiter);
            let result = match outcome {
                WaitOutcome::Signaled => Ok(take_delivery(k, &cs2, qid, waiter)),
                WaitOutcome::TimedOut => Err(QueueReceiveError::Timeout),
                WaitOutcome::Deleted => Err(QueueReceiveError::ObjDeleted),
            };
            drop(cs2);
            result
        }
    }
}

/// Wake every currently-parked receiver directly with its own copy of
/// `msg`, bypassing the ring buffer entirely (SPEC_FULL §4.6, resolving
/// Open Question #1 in favor of a full wake-all rather than a degraded
/// single send). Returns the number of receivers woken; if none were
/// waiting, falls back to [`queue_send`] and returns `Ok(0)`.
pub fn queue_broadcast<P: Port>(
    k: &Kernel<P>,
    qid: QueueId,
    msg: [u32; 4],
) -> Result<usize, QueueSendError> {
    let mut cs = k.cs.enter();
    let recv_sem = k
        .queues
        .get(&cs)
        .get(qid.0)
        .ok_or(QueueSendError::ObjDeleted)?
        .recv_sem;
    let mut woken = 0usize;
    loop {
        let head = k
            .sems
            .get(&cs)
            .get(recv_sem)
            .expect("queue owns this sem")
            .waiters
            .front();
        let Some(waiter_id) = head else { break };
        k.sems
            .get_mut(&cs)
            .get_mut(recv_sem)
            .unwrap()
            .waiters
            .pop_front(k.tasks.get_mut(&cs));
        k.tasks.get_mut(&cs).get_mut(waiter_id).unwrap().direct_message = Some(msg);
        task::wake(k, &mut cs, TaskId(waiter_id), WaitOutcome::Signaled);
        woken += 1;
    }
    if woken == 0 {
        drop(cs);
        queue_send(k, qid, msg)?;
        return Ok(0);
    }
    task::unlock_and_check_preemption(k, cs);
    Ok(woken)
}

fn is_full(q: &Qcb) -> bool {
    (q.nextin + 1) % q.buf_size() == q.nextout
}

fn write_slot<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>, abs: usize, msg: [u32; 4]) {
    k.msg_arena.get_mut(cs).buffers[abs] = msg;
}

/// Pull the next message off the ring, assuming the caller already holds a
/// permit on the queue's internal semaphore (i.e. this runs after
/// `TakeOutcome::Taken`, where the permit was either already available or
/// just granted within the current critical section).
fn dequeue<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>, qid: QueueId) -> [u32; 4] {
    let q = k
        .queues
        .get_mut(cs)
        .get_mut(qid.0)
        .expect("still alive: caller holds a permit on it");
    let abs = q.base + q.nextout;
    q.nextout = (q.nextout + 1) % q.buf_size();
    k.msg_arena.get(cs).buffers[abs]
}

/// After a blocked receiver wakes, prefer a `queue_broadcast` direct
/// delivery over retrying the ring dequeue: a direct handoff never touched
/// the ring, so there is nothing there for this waiter to read.
fn take_delivery<P: Port>(
    k: &Kernel<P>,
    cs: &CriticalSection<'_, P>,
    qid: QueueId,
    waiter: TaskId,
) -> [u32; 4] {
    if let Some(msg) = k
        .tasks
        .get_mut(cs)
        .get_mut(waiter.0)
        .and_then(|t| t.direct_message.take())
    {
        return msg;
    }
    dequeue(k, cs, qid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qcb(capacity: usize, nextin: usize, nextout: usize) -> Qcb {
        let mut sems = crate::utils::Arena::<crate::semaphore::Scb, 1>::INIT;
        let recv_sem =
            semaphore::create_internal(&mut sems, [0; 4], 0, capacity as u32, WaitOrder::Fifo).unwrap();
        Qcb {
            name: [0; 4],
            base: 0,
            capacity,
            nextin,
            nextout,
            recv_sem,
        }
    }

    #[test]
    fn is_full_respects_sentinel_slot() {
        assert!(is_full(&qcb(4, 3, 4)));
        assert!(!is_full(&qcb(4, 2, 4)));
    }

    #[test]
    fn empty_when_cursors_equal() {
        let q = qcb(4, 0, 0);
        assert!(!is_full(&q));
    }
}
