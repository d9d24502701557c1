//! Scenario 1 (SPEC_FULL §8, "End-to-end scenarios"): priority preemption.
//!
//! A lower-priority task is parked on its own one-shot sleep timer (so it
//! cannot wake without a `tick()` nobody drives during this test); a
//! higher-priority task blocks on an empty semaphore. Signaling the
//! semaphore must run the higher-priority waiter to completion — the lower-
//! priority task never gets a chance to interleave.
use rtk_kernel::{sem_create, sem_ident, sem_p, sem_v, task_start, timer_wkafter, Kernel, TaskMode, Timeout, WaitOrder};
use rtk_port_std::{spawn_task, start, HostPort};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

static KERNEL: Kernel<HostPort> = Kernel::new();
static LOW_WAKES: AtomicU32 = AtomicU32::new(0);
static HIGH_RAN: AtomicU32 = AtomicU32::new(0);

fn low_prio_sleeper(_args: [u32; 4]) {
    timer_wkafter(&KERNEL, 1).expect("timer_wkafter");
    LOW_WAKES.fetch_add(1, Ordering::SeqCst);
}

fn high_prio_waiter(_args: [u32; 4]) {
    let sem = sem_ident(&KERNEL, *b"pre1").expect("sem created before this task starts");
    sem_p(&KERNEL, sem, Timeout::Forever).expect("sem_p");
    HIGH_RAN.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn higher_priority_waiter_runs_before_lower_priority_task_resumes() {
    start(&KERNEL);
    let sem = sem_create(&KERNEL, *b"pre1", 0, 1, WaitOrder::Priority).expect("sem_create");

    let low = spawn_task(&KERNEL, *b"loww", low_prio_sleeper, [0; 4], 200, 4096, TaskMode::empty())
        .expect("task_create low");
    task_start(&KERNEL, low).expect("task_start low");
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(LOW_WAKES.load(Ordering::SeqCst), 0, "no tick was driven; low task must still be parked");

    let high = spawn_task(&KERNEL, *b"high", high_prio_waiter, [0; 4], 5, 4096, TaskMode::empty())
        .expect("task_create high");
    task_start(&KERNEL, high).expect("task_start high");
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(HIGH_RAN.load(Ordering::SeqCst), 0, "high task should still be blocked on the semaphore");

    sem_v(&KERNEL, sem).expect("sem_v");
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(HIGH_RAN.load(Ordering::SeqCst), 1, "high-priority waiter must run once signaled");
    assert_eq!(LOW_WAKES.load(Ordering::SeqCst), 0, "low-priority task never got a chance to run");
}
