//! SPEC_FULL §8, "Round-trip laws": each exercised against its own kernel,
//! entirely from the calling (idle) task, with no other task in the system
//! to interfere.
use rtk_kernel::{ev_receive, ev_send, sem_create, sem_p, sem_v, task_ident, queue_create, queue_receive, queue_send, Kernel, Timeout, WaitOrder};
use rtk_port_std::{start, HostPort};

#[test]
fn queue_send_then_receive_returns_the_same_four_words_in_order() {
    static KERNEL: Kernel<HostPort> = Kernel::new();
    start(&KERNEL);
    let q = queue_create(&KERNEL, *b"rtrp", 2, WaitOrder::Fifo).expect("queue_create");
    let sent = [7, 13, 42, 255];
    queue_send(&KERNEL, q, sent).expect("queue_send");
    let received = queue_receive(&KERNEL, q, Timeout::NoWait).expect("queue_receive");
    assert_eq!(received, sent);
}

#[test]
fn matched_sem_p_and_sem_v_pairs_leave_the_count_unchanged() {
    static KERNEL: Kernel<HostPort> = Kernel::new();
    start(&KERNEL);
    let sem = sem_create(&KERNEL, *b"rtrp", 3, 5, WaitOrder::Fifo).expect("sem_create");
    for _ in 0..4 {
        sem_p(&KERNEL, sem, Timeout::NoWait).expect("sem_p");
        sem_v(&KERNEL, sem).expect("sem_v");
    }
    // Count is private kernel state; observe it indirectly by draining
    // exactly the original count (3) before a fourth `sem_p` sees `NoSem`.
    sem_p(&KERNEL, sem, Timeout::NoWait).expect("sem_p 1 of 3");
    sem_p(&KERNEL, sem, Timeout::NoWait).expect("sem_p 2 of 3");
    sem_p(&KERNEL, sem, Timeout::NoWait).expect("sem_p 3 of 3");
    assert_eq!(
        sem_p(&KERNEL, sem, Timeout::NoWait),
        Err(rtk_kernel::error::SemWaitError::NoSem),
        "count must be exactly the original 3, neither drifted up nor down"
    );
}

#[test]
fn ev_send_then_ev_receive_any_returns_the_same_set() {
    static KERNEL: Kernel<HostPort> = Kernel::new();
    start(&KERNEL);
    // The idle task itself is a valid `ev_send`/`ev_receive` target: there is
    // no other task in this kernel to race with it.
    let idle = task_ident(&KERNEL, *b"idle").expect("idle task always exists once started");
    ev_send(&KERNEL, idle, 0x5).expect("ev_send");
    let received = ev_receive(&KERNEL, 0x5, false, Timeout::NoWait).expect("ev_receive");
    assert_eq!(received, 0x5);
}
