//! Scenario 6 (SPEC_FULL §8): a timed `sem_p` with nobody ever signaling the
//! semaphore returns `Timeout`, and the task is fully unlinked from the
//! semaphore's wait queue afterward (verified indirectly: a late `sem_v`
//! must credit the semaphore's count rather than vanish into a stale
//! waiter).
use rtk_kernel::error::SemWaitError;
use rtk_kernel::{sem_create, sem_ident, sem_p, sem_v, task_start, Kernel, TaskMode, Timeout, WaitOrder};
use rtk_port_std::{spawn_task, start, tick_once, HostPort};
use std::sync::atomic::{AtomicU32, Ordering};

static KERNEL: Kernel<HostPort> = Kernel::new();
static TIMED_OUT: AtomicU32 = AtomicU32::new(0);

fn impatient_waiter(_args: [u32; 4]) {
    let sem = sem_ident(&KERNEL, *b"tmot").expect("sem created before this task starts");
    let result = sem_p(&KERNEL, sem, Timeout::Ticks(50));
    if result == Err(SemWaitError::Timeout) {
        TIMED_OUT.store(1, Ordering::SeqCst);
    }
}

#[test]
fn unsignaled_semaphore_wait_times_out_and_unlinks_the_waiter() {
    start(&KERNEL);
    let sem = sem_create(&KERNEL, *b"tmot", 0, 1, WaitOrder::Fifo).expect("sem_create");
    let task = spawn_task(&KERNEL, *b"wait", impatient_waiter, [0; 4], 10, 4096, TaskMode::empty())
        .expect("task_create");
    task_start(&KERNEL, task).expect("task_start");

    for _ in 0..60u32 {
        tick_once(&KERNEL);
    }

    assert_eq!(TIMED_OUT.load(Ordering::SeqCst), 1, "sem_p must report Timeout");

    // The timed-out task must be gone from the wait queue: a late signal
    // has nobody to hand off to and simply credits the count.
    sem_v(&KERNEL, sem).expect("sem_v after the waiter timed out");
    assert_eq!(sem_p(&KERNEL, sem, Timeout::NoWait), Ok(()), "the credited permit must be collectible");
}
