//! Scenario 4 (SPEC_FULL §8): `queue_urgent` jumps its message ahead of
//! everything already queued.
use rtk_kernel::{queue_create, queue_receive, queue_send, queue_urgent, Kernel, Timeout, WaitOrder};
use rtk_port_std::{start, HostPort};

static KERNEL: Kernel<HostPort> = Kernel::new();

#[test]
fn urgent_send_is_received_before_everything_already_queued() {
    start(&KERNEL);
    let q = queue_create(&KERNEL, *b"urge", 4, WaitOrder::Fifo).expect("queue_create");

    queue_send(&KERNEL, q, [1, 0, 0, 0]).expect("send 1");
    queue_send(&KERNEL, q, [2, 0, 0, 0]).expect("send 2");
    queue_urgent(&KERNEL, q, [9, 0, 0, 0]).expect("urgent 9");

    assert_eq!(queue_receive(&KERNEL, q, Timeout::NoWait).unwrap(), [9, 0, 0, 0]);
    assert_eq!(queue_receive(&KERNEL, q, Timeout::NoWait).unwrap(), [1, 0, 0, 0]);
    assert_eq!(queue_receive(&KERNEL, q, Timeout::NoWait).unwrap(), [2, 0, 0, 0]);
}
