//! SPEC_FULL §8, "Boundaries": the documented edge-case error returns for a
//! handful of calls, each exercised in isolation against its own kernel so
//! one boundary's setup can't interfere with another's.
use rtk_kernel::error::{ArmTimerError, CreateQueueError, CreateTaskError, EventReceiveError, SemWaitError};
use rtk_kernel::{
    ev_receive, queue_create, sem_create, sem_p, task_create, timer_evafter, Kernel, TaskMode,
    Timeout, WaitOrder,
};
use rtk_port_std::{start, HostPort};

fn noop_entry(_args: [u32; 4]) {}

#[test]
fn timer_evafter_zero_ticks_is_rejected() {
    static KERNEL: Kernel<HostPort> = Kernel::new();
    start(&KERNEL);
    assert_eq!(timer_evafter(&KERNEL, 0, 0x1), Err(ArmTimerError::IllTicks));
}

#[test]
fn queue_create_zero_capacity_is_rejected() {
    static KERNEL: Kernel<HostPort> = Kernel::new();
    start(&KERNEL);
    assert_eq!(
        queue_create(&KERNEL, *b"zero", 0, WaitOrder::Fifo),
        Err(CreateQueueError::BadParam)
    );
}

#[test]
fn ev_receive_zero_events_is_rejected() {
    static KERNEL: Kernel<HostPort> = Kernel::new();
    start(&KERNEL);
    assert_eq!(
        ev_receive(&KERNEL, 0, false, Timeout::NoWait),
        Err(EventReceiveError::BadParam)
    );
}

#[test]
fn sem_p_nowait_on_empty_sem_returns_no_sem() {
    static KERNEL: Kernel<HostPort> = Kernel::new();
    start(&KERNEL);
    let sem = sem_create(&KERNEL, *b"empt", 0, 1, WaitOrder::Fifo).expect("sem_create");
    assert_eq!(sem_p(&KERNEL, sem, Timeout::NoWait), Err(SemWaitError::NoSem));
}

#[test]
fn task_create_rejects_priority_zero_and_idle_priority() {
    static KERNEL: Kernel<HostPort> = Kernel::new();
    start(&KERNEL);
    assert_eq!(
        task_create(&KERNEL, *b"task", noop_entry, [0; 4], 0, 4096, TaskMode::empty()),
        Err(CreateTaskError::BadPriority)
    );
    assert_eq!(
        task_create(&KERNEL, *b"task", noop_entry, [0; 4], 255, 4096, TaskMode::empty()),
        Err(CreateTaskError::BadPriority)
    );
}
