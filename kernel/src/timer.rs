//! Timer service and tick pipeline (SPEC_FULL §4.3).
//!
//! Grounded on upstream's `timer.rs`/`timeout.rs` pair: a single
//! sorted-by-expiry list of armed timers, drained from the front by `tick()`
//! while the head has expired. Upstream threads its timeout list through a
//! binary heap (`utils::binary_heap`) keyed by a 32-bit wrapping time value;
//! this crate's timer count is small and bounded
//! ([`crate::config::MAX_TIMERS`]), so a single [`DList`] kept sorted by
//! [`DList::insert_sorted_by_key`] (the same primitive
//! [`crate::semaphore`]'s priority-ordered wait queues use) is simpler and
//! just as asymptotically fine for this kernel's scale — both give stable
//! (insertion-order) tie-breaking for free, which SPEC_FULL requires.
//!
//! Two families of timer share one pool and one active list:
//! - **User timers**, armed by `timer_evafter`/`timer_evevery`/`timer_evwhen`
//!   (send events) and `timer_wkafter`/`timer_wkwhen` (resume a sleeping
//!   task), returned to callers as a [`TimerId`] they can `timer_cancel`.
//! - **Internal timeouts**, armed by [`crate::semaphore::take_or_block`],
//!   [`crate::event::ev_receive`], and [`crate::queue::queue_receive`] to
//!   bound a blocking wait; these are never exposed to callers, and firing
//!   one routes through [`crate::task::fire_timeout`] rather than
//!   [`crate::event::ev_send`]/`task_resume` so the waiting task is first
//!   unlinked from whatever wait queue it is parked on.
use crate::config::TICK_HZ;
use crate::error::{ArmTimerAtError, ArmTimerError, CancelTimerError};
use crate::kernel::Kernel;
use crate::klock::CriticalSection;
use crate::port::Port;
use crate::task::{self, TaskId};
use crate::utils::{DList, Id, Init};

/// A timer identifier (SPEC_FULL §3, "TCB_T").
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) Id);

impl core::fmt::Debug for TimerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TimerId({})", self.0.raw())
    }
}

/// What to do when a timer's `expire_ticks` is reached.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TimerAction {
    /// `timer_evafter`/`timer_evevery`/`timer_evwhen`: deliver events to a
    /// task, exactly as `ev_send` would.
    SendEvents(TaskId, u32),
    /// `timer_wkafter`/`timer_wkwhen`: resume a task that suspended itself
    /// after arming this timer. Unconditional wake, not a timeout.
    WakeTask(TaskId),
    /// An internal timeout arming a blocking wait (`sem_p`, `ev_receive`,
    /// `queue_receive`). Firing removes the task from its wait structure and
    /// wakes it with [`crate::task::WaitOutcome::TimedOut`].
    CancelWait(TaskId),
}

/// Whether a timer is rearmed on expiry. Kept distinct from
/// [`TimerAction`] so `tick()` can decide "rearm or free" without inspecting
/// what the timer actually does (SPEC_FULL §3: `Kind ∈ {OneShot, Periodic,
/// Absolute}` — `Absolute` is just a `OneShot` whose `expire_ticks` was
/// computed from a wall-clock conversion at arming time, so it carries no
/// separate runtime representation here).
#[derive(Clone, Copy, Debug)]
pub(crate) enum TimerKind {
    OneShot,
    Periodic { period_ticks: u64 },
}

pub(crate) struct Tmcb {
    pub(crate) links: crate::utils::Links,
    pub(crate) expire_ticks: u64,
    pub(crate) kind: TimerKind,
    pub(crate) action: TimerAction,
}

impl crate::utils::Linked for Tmcb {
    fn links(&self) -> &crate::utils::Links {
        &self.links
    }
    fn links_mut(&mut self) -> &mut crate::utils::Links {
        &mut self.links
    }
}

/// The wall-clock correspondence read/written by `timer_get`/`timer_set`
/// (SPEC_FULL §4.3, Open Question #2). `date` is a day count and `time` is
/// seconds-within-day; both are opaque `u32`s to callers. `base_ticks` is
/// the monotonic tick count recorded at the moment `(date, time)` was last
/// set, so converting a target `(date, time, sub_ticks)` to an absolute
/// monotonic expiry is: seconds-difference from the base, scaled to ticks
/// by [`TICK_HZ`], plus `base_ticks`, plus `sub_ticks`.
#[derive(Clone, Copy)]
struct WallClock {
    date: u32,
    time: u32,
    base_ticks: u64,
}

impl Init for WallClock {
    const INIT: Self = Self {
        date: 0,
        time: 0,
        base_ticks: 0,
    };
}

fn to_seconds(date: u32, time: u32) -> i64 {
    date as i64 * 86_400 + time as i64
}

impl WallClock {
    /// Convert `(date, time, sub_ticks)` to an absolute tick, saturating to
    /// `now` if the target is already in the past (SPEC_FULL §4.3: "arming
    /// with a past absolute time fires at the next `tick()`").
    fn to_absolute_tick(&self, date: u32, time: u32, sub_ticks: u32, now: u64) -> u64 {
        let delta_seconds = to_seconds(date, time) - to_seconds(self.date, self.time);
        let delta_ticks = delta_seconds.saturating_mul(TICK_HZ as i64);
        let target = (self.base_ticks as i64)
            .saturating_add(delta_ticks)
            .saturating_add(sub_ticks as i64);
        target.max(now as i64) as u64
    }
}

pub(crate) struct TimerService {
    pub(crate) active: DList,
    pub(crate) tick_count: u64,
    wall_clock: WallClock,
}

impl Init for TimerService {
    const INIT: Self = Self {
        active: DList::INIT,
        tick_count: 0,
        wall_clock: WallClock::INIT,
    };
}

/// The caller's chosen blocking behavior, shared by every suspension point
/// (SPEC_FULL §5, "Suspension points"). `Forever` blocks with no timeout
/// timer armed at all; `Ticks(0)` is rejected by the individual calls that
/// treat a zero duration as `IllTicks` (`timer_evafter`/`timer_wkafter`),
/// but is a legal "expire essentially immediately" value for a blocking
/// call's timeout (matching `sem_p(smid, WAIT, 0)` semantics, which are
/// distinct from `NOWAIT`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    NoWait,
    Ticks(u32),
    Forever,
}

pub fn timer_evafter<P: Port>(
    k: &Kernel<P>,
    ticks: u32,
    events: u32,
) -> Result<TimerId, ArmTimerError> {
    if ticks == 0 {
        return Err(ArmTimerError::IllTicks);
    }
    let mut cs = k.cs.enter();
    let target = task::current(k);
    let now = now_ticks::<P>();
    let id = arm(
        k,
        &mut cs,
        now + ticks as u64,
        TimerKind::OneShot,
        TimerAction::SendEvents(target, events),
    )
    .map_err(|_| ArmTimerError::NoTimers)?;
    drop(cs);
    Ok(TimerId(id))
}

pub fn timer_evevery<P: Port>(
    k: &Kernel<P>,
    ticks: u32,
    events: u32,
) -> Result<TimerId, ArmTimerError> {
    if ticks == 0 {
        return Err(ArmTimerError::IllTicks);
    }
    let mut cs = k.cs.enter();
    let target = task::current(k);
    let now = now_ticks::<P>();
    let id = arm(
        k,
        &mut cs,
        now + ticks as u64,
        TimerKind::Periodic {
            period_ticks: ticks as u64,
        },
        TimerAction::SendEvents(target, events),
    )
    .map_err(|_| ArmTimerError::NoTimers)?;
    drop(cs);
    Ok(TimerId(id))
}

pub fn timer_evwhen<P: Port>(
    k: &Kernel<P>,
    date: u32,
    time: u32,
    sub_ticks: u32,
    events: u32,
) -> Result<TimerId, ArmTimerAtError> {
    let mut cs = k.cs.enter();
    let target = task::current(k);
    let now = now_ticks::<P>();
    let expire = k.timers.get(&cs).wall_clock.to_absolute_tick(date, time, sub_ticks, now);
    let id = arm(
        k,
        &mut cs,
        expire,
        TimerKind::OneShot,
        TimerAction::SendEvents(target, events),
    )
    .map_err(|_| ArmTimerAtError::NoTimers)?;
    drop(cs);
    Ok(TimerId(id))
}

/// Arm a one-shot timer that resumes the caller, then suspend the caller
/// via the same blocked-task machinery `sem_p`/`ev_receive` use (a
/// perpetual "wait with no wait queue"), rather than literally the public
/// `task_suspend`/`task_resume` pair: those model an *external* operator
/// suspending a task and must stay idempotent against concurrent explicit
/// suspension, neither of which applies to a task putting itself to sleep.
pub fn timer_wkafter<P: Port>(k: &Kernel<P>, ticks: u32) -> Result<(), ArmTimerError> {
    if ticks == 0 {
        return Err(ArmTimerError::IllTicks);
    }
    let mut cs = k.cs.enter();
    let now = now_ticks::<P>();
    let id = task::block_current(k, &cs, task::WaitOn::Sleep);
    arm(k, &mut cs, now + ticks as u64, TimerKind::OneShot, TimerAction::WakeTask(id))
        .map_err(|_| ArmTimerError::NoTimers)?;
    task::unlock_and_check_preemption(k, cs);
    Ok(())
}

pub fn timer_wkwhen<P: Port>(
    k: &Kernel<P>,
    date: u32,
    time: u32,
    sub_ticks: u32,
) -> Result<(), ArmTimerAtError> {
    let mut cs = k.cs.enter();
    let now = now_ticks::<P>();
    let expire = k.timers.get(&cs).wall_clock.to_absolute_tick(date, time, sub_ticks, now);
    let id = task::block_current(k, &cs, task::WaitOn::Sleep);
    arm(k, &mut cs, expire, TimerKind::OneShot, TimerAction::WakeTask(id))
        .map_err(|_| ArmTimerAtError::NoTimers)?;
    task::unlock_and_check_preemption(k, cs);
    Ok(())
}

pub fn timer_cancel<P: Port>(k: &Kernel<P>, id: TimerId) -> Result<(), CancelTimerError> {
    let mut cs = k.cs.enter();
    if !k.timer_pool.get(&cs).contains(id.0) {
        return Err(CancelTimerError::BadTmid);
    }
    free(k, &mut cs, id.0);
    reprogram_alarm(k, &cs);
    Ok(())
}

/// Read the wall-clock correspondence (SPEC_FULL §4.3).
pub fn timer_get<P: Port>(k: &Kernel<P>) -> (u32, u32) {
    let cs = k.cs.enter();
    let wc = k.timers.get(&cs).wall_clock;
    (wc.date, wc.time)
}

/// Write the wall-clock correspondence. Does not affect already-armed
/// timers' monotonic expiries (SPEC_FULL §4.3): only future
/// `timer_evwhen`/`timer_wkwhen` conversions are affected.
pub fn timer_set<P: Port>(k: &Kernel<P>, date: u32, time: u32) {
    let cs = k.cs.enter();
    let now = now_ticks::<P>();
    let timers = k.timers.get_mut(&cs);
    timers.wall_clock = WallClock {
        date,
        time,
        base_ticks: now,
    };
}

/// The single interrupt-context entry point (SPEC_FULL §4.3/§5): advance
/// `tick_count`, fire every timer whose expiry has arrived, rotate a
/// time-sliced running task, then reprogram the alarm and decide whether a
/// preemption is warranted. Never blocks; `P::request_switch` is the only
/// thing it may call back into the port with.
pub fn tick<P: Port>(k: &Kernel<P>) {
    let mut cs = k.cs.enter();
    let timers = k.timers.get_mut(&cs);
    timers.tick_count += 1;
    let now = timers.tick_count;

    loop {
        let Some(head) = k.timers.get(&cs).active.front() else {
            break;
        };
        let expire = k
            .timer_pool
            .get(&cs)
            .get(head)
            .expect("active list entries are always live")
            .expire_ticks;
        if expire > now {
            break;
        }
        fire(k, &mut cs, head);
    }

    task::tick_time_slice(k, &cs);
    reprogram_alarm(k, &cs);
    task::unlock_and_check_preemption(k, cs);
}

fn fire<P: Port>(k: &Kernel<P>, cs: &mut CriticalSection<'_, P>, id: Id) {
    let (action, kind) = {
        let pool = k.timer_pool.get(cs);
        let tm = pool.get(id).expect("caller validated id");
        (tm.action, tm.kind)
    };
    #[cfg(feature = "log")]
    log::trace!("timer fire({})", id.raw());
    k.timers.get_mut(cs).active.remove(k.timer_pool.get_mut(cs), id);
    match kind {
        TimerKind::OneShot => {
            k.timer_pool.get_mut(cs).remove(id);
        }
        TimerKind::Periodic { period_ticks } => {
            let tm = k.timer_pool.get_mut(cs).get_mut(id).expect("just removed from list only");
            tm.expire_ticks += period_ticks.max(1);
            let new_expire = tm.expire_ticks;
            insert_sorted(k, cs, id, new_expire);
        }
    }
    match action {
        TimerAction::SendEvents(target, events) => {
            // Not `ev_send`: that drops its own critical-section guard and
            // requests a switch, but `fire` runs nested inside `tick()`'s
            // critical section, which must stay held until `tick()`'s own
            // `unlock_and_check_preemption` runs at the very end.
            let _ = crate::event::deliver_events(k, cs, target, events);
        }
        TimerAction::WakeTask(target) => {
            task::fire_wake(k, cs, target);
        }
        TimerAction::CancelWait(target) => {
            task::fire_timeout(k, cs, target);
        }
    }
}

/// Arm `timeout` on behalf of a task that just blocked on `waiter`
/// (SPEC_FULL §5, "Timeouts and cancellation"). Shared by
/// [`crate::semaphore::take_or_block`], [`crate::event::ev_receive`], and
/// [`crate::queue::queue_receive`].
pub(crate) fn arm_timeout<P: Port>(
    k: &Kernel<P>,
    cs: &mut CriticalSection<'_, P>,
    waiter: TaskId,
    ticks: u32,
) -> TimerId {
    let now = now_ticks::<P>();
    let id = arm(
        k,
        cs,
        now + ticks as u64,
        TimerKind::OneShot,
        TimerAction::CancelWait(waiter),
    )
    .expect("internal timeout arming must not exhaust the timer pool in a well-sized system");
    TimerId(id)
}

/// Cancel a timer without the `BadTmid` bookkeeping `timer_cancel` does for
/// a user-facing, possibly-already-fired id; used when a wait completes
/// normally and its timeout timer must be torn down.
pub(crate) fn cancel_internal<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>, id: TimerId) {
    if k.timer_pool.get(cs).contains(id.0) {
        free(k, cs, id.0);
        reprogram_alarm(k, cs);
    }
}

fn arm<P: Port>(
    k: &Kernel<P>,
    cs: &mut CriticalSection<'_, P>,
    expire_ticks: u64,
    kind: TimerKind,
    action: TimerAction,
) -> Result<Id, ()> {
    let id = k
        .timer_pool
        .get_mut(cs)
        .insert(Tmcb {
            links: crate::utils::Links::INIT,
            expire_ticks,
            kind,
            action,
        })
        .map_err(|_| ())?;
    insert_sorted(k, cs, id, expire_ticks);
    reprogram_alarm(k, cs);
    Ok(id)
}

fn insert_sorted<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>, id: Id, expire_ticks: u64) {
    let timers = k.timers.get_mut(cs);
    let pool = k.timer_pool.get_mut(cs);
    timers.active.insert_sorted_by_key(pool, id, expire_ticks, |tm| tm.expire_ticks);
}

fn free<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>, id: Id) {
    k.timers.get_mut(cs).active.remove(k.timer_pool.get_mut(cs), id);
    k.timer_pool.get_mut(cs).remove(id);
}

fn reprogram_alarm<P: Port>(k: &Kernel<P>, cs: &CriticalSection<'_, P>) {
    match k.timers.get(cs).active.front() {
        Some(head) => {
            let expire = k.timer_pool.get(cs).get(head).expect("just looked up").expire_ticks;
            P::set_next_alarm(expire);
        }
        None => {
            // No armed timer: request an alarm so far out it is
            // effectively "none" without a dedicated port call for
            // cancellation (SPEC_FULL §4.1 names only `set_next_alarm`).
            P::set_next_alarm(u64::MAX);
        }
    }
}

fn now_ticks<P: Port>() -> u64 {
    P::now_ticks()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_converts_forward_delta() {
        let wc = WallClock {
            date: 10,
            time: 0,
            base_ticks: 1_000,
        };
        // One day later, same time of day: 86_400 seconds * TICK_HZ ticks/s.
        let expire = wc.to_absolute_tick(11, 0, 0, 0);
        assert_eq!(expire, 1_000 + 86_400 * TICK_HZ as u64);
    }

    #[test]
    fn wall_clock_past_target_saturates_to_now() {
        let wc = WallClock {
            date: 10,
            time: 0,
            base_ticks: 1_000,
        };
        let expire = wc.to_absolute_tick(1, 0, 0, 5_000);
        assert_eq!(expire, 5_000, "a past absolute time fires at the next tick()");
    }
}
