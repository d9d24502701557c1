//! Per-task event flags (SPEC_FULL §4.5).
//!
//! Grounded on upstream's `event_group.rs`, but simplified by the data
//! model's choice to scope an event block to a single task rather than a
//! shared, separately-allocated group object (SPEC_FULL §3: "Event block
//! (ECB). One per task, identified by task id."): the `pending`/`waiting`/
//! condition fields this module operates on live directly on the
//! [`crate::task::Tcb`] they belong to (`pending_events`, `waiting_events`,
//! `wait_all`) rather than in a pool of their own, so there is no separate
//! arena, id type, or create/delete pair here — just the two operations.
use crate::error::EventReceiveError;
use crate::kernel::Kernel;
use crate::klock::CriticalSection;
use crate::port::Port;
use crate::task::{self, TaskId, TaskState, WaitOn, WaitOutcome};
use crate::timer::Timeout;

/// `pending |= events`; if the target task is blocked in `ev_receive` and
/// its wait condition is now satisfied, wake it with the event set that
/// satisfied it (SPEC_FULL §4.5).
///
/// Shared by [`ev_send`] and [`crate::timer::fire`]'s `SendEvents` action:
/// the timer tick path is already inside `tick()`'s own critical section
/// and must only enqueue the wakeup here, leaving the single
/// `unlock_and_check_preemption` at the end of `tick()` to decide whether a
/// switch is warranted — calling it again from in here would try to
/// request a switch while still nested inside that outer section.
///
/// Returns [`crate::error::EventSendError::BadId`] for an invalid or
/// deleted task id; this is the only case not already covered by
/// SPEC_FULL's textual description of `ev_send`, added for API uniformity
/// with every other kernel call.
pub(crate) fn deliver_events<P: Port>(
    k: &Kernel<P>,
    cs: &mut CriticalSection<'_, P>,
    target: TaskId,
    events: u32,
) -> Result<(), crate::error::EventSendError> {
    let tasks = k.tasks.get_mut(cs);
    let task = tasks.get_mut(target.0).ok_or(crate::error::EventSendError::BadId)?;
    task.pending_events |= events;

    let satisfied = task.state == TaskState::Blocked
        && matches!(task.wait_on, Some(WaitOn::Event))
        && condition_met(task.pending_events, task.waiting_events, task.wait_all);

    if satisfied {
        let received = if task.wait_all {
            task.waiting_events
        } else {
            task.pending_events & task.waiting_events
        };
        task.pending_events &= !received;
        task.event_result = received;
        task::wake(k, cs, target, WaitOutcome::Signaled);
    }
    Ok(())
}

pub fn ev_send<P: Port>(
    k: &Kernel<P>,
    target: TaskId,
    events: u32,
) -> Result<(), crate::error::EventSendError> {
    let mut cs = k.cs.enter();
    let result = deliver_events(k, &mut cs, target, events);
    task::unlock_and_check_preemption(k, cs);
    result
}

/// Wait for `events` under `wait_all` (ANY if `false`, ALL if `true`),
/// blocking per `timeout` if the condition is not already satisfied
/// (SPEC_FULL §4.5). `events == 0` is [`EventReceiveError::BadParam`].
pub fn ev_receive<P: Port>(
    k: &Kernel<P>,
    events: u32,
    wait_all: bool,
    timeout: Timeout,
) -> Result<u32, EventReceiveError> {
    if events == 0 {
        return Err(EventReceiveError::BadParam);
    }
    let mut cs = k.cs.enter();
    let id = task::current(k);
    {
        let tasks = k.tasks.get_mut(&cs);
        let task = tasks.get_mut(id.0).expect("current task always exists");
        task.waiting_events = events;
        task.wait_all = wait_all;
        if condition_met(task.pending_events, events, wait_all) {
            let received = if wait_all {
                events
            } else {
                task.pending_events & events
            };
            task.pending_events &= !received;
            drop(cs);
            return Ok(received);
        }
    }
    if timeout == Timeout::NoWait {
        drop(cs);
        return Err(EventReceiveError::NoEvs);
    }
    let waiter = task::block_current(k, &cs, WaitOn::Event);
    if let Timeout::Ticks(ticks) = timeout {
        let timer_id = crate::timer::arm_timeout(k, &mut cs, waiter, ticks);
        k.tasks.get_mut(&cs).get_mut(waiter.0).unwrap().timeout_timer = Some(timer_id);
    }
    task::unlock_and_check_preemption(k, cs);

    let cs2 = k.cs.enter();
    let outcome = task::wait_outcome(k, &cs2, waiter);
    let result = match outcome {
        WaitOutcome::Signaled => {
            let received = k.tasks.get(&cs2).get(waiter.0).expect("waiter still exists").event_result;
            Ok(received)
        }
        WaitOutcome::TimedOut => Err(EventReceiveError::Timeout),
        // Not reachable via the documented call surface (no object is
        // deleted out from under an event wait), kept only so a future
        // cross-task delete-while-blocked path has a defined outcome.
        WaitOutcome::Deleted => Err(EventReceiveError::Timeout),
    };
    drop(cs2);
    result
}

fn condition_met(pending: u32, waiting: u32, wait_all: bool) -> bool {
    if wait_all {
        (pending & waiting) == waiting
    } else {
        (pending & waiting) != 0
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn condition_any_vs_all() {
        use super::condition_met;
        assert!(condition_met(0b01, 0b11, false));
        assert!(!condition_met(0b01, 0b11, true));
        assert!(condition_met(0b11, 0b11, true));
    }
}
