//! Scenario 5 (SPEC_FULL §8): waiters on a priority-ordered semaphore are
//! granted permits by priority, independent of the order they blocked in.
use rtk_kernel::{sem_create, sem_ident, sem_p, sem_v, task_start, Kernel, TaskMode, Timeout, WaitOrder};
use rtk_port_std::{spawn_task, start, HostPort};
use std::sync::Mutex;

static KERNEL: Kernel<HostPort> = Kernel::new();
static WAKE_ORDER: Mutex<Vec<u8>> = Mutex::new(Vec::new());

fn waiter(args: [u32; 4]) {
    let sem = sem_ident(&KERNEL, *b"prio").expect("sem created before waiters start");
    sem_p(&KERNEL, sem, Timeout::Forever).expect("sem_p");
    WAKE_ORDER.lock().unwrap().push(args[0] as u8);
}

#[test]
fn waiters_wake_in_priority_order_not_arrival_order() {
    start(&KERNEL);
    let sem = sem_create(&KERNEL, *b"prio", 0, 1, WaitOrder::Priority).expect("sem_create");

    // Blocked in arrival order 2, 5, 3 (priorities, lower number = higher).
    for priority in [2u8, 5, 3] {
        let id = spawn_task(
            &KERNEL,
            *b"waitr",
            waiter,
            [priority as u32, 0, 0, 0],
            priority,
            4096,
            TaskMode::empty(),
        )
        .expect("task_create");
        task_start(&KERNEL, id).expect("task_start");
    }

    sem_v(&KERNEL, sem).expect("sem_v 1");
    sem_v(&KERNEL, sem).expect("sem_v 2");
    sem_v(&KERNEL, sem).expect("sem_v 3");

    assert_eq!(*WAKE_ORDER.lock().unwrap(), vec![2, 3, 5], "woken strictly by priority, not FIFO arrival");
}
