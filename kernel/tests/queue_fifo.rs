//! Scenario 3 (SPEC_FULL §8): a capacity-4 queue delivers messages in FIFO
//! order and reports `NoMsg` once drained.
use rtk_kernel::error::QueueReceiveError;
use rtk_kernel::{queue_create, queue_receive, queue_send, Kernel, Timeout, WaitOrder};
use rtk_port_std::{start, HostPort};

static KERNEL: Kernel<HostPort> = Kernel::new();

#[test]
fn messages_are_received_in_send_order() {
    start(&KERNEL);
    let q = queue_create(&KERNEL, *b"fifo", 4, WaitOrder::Fifo).expect("queue_create");

    queue_send(&KERNEL, q, [1, 0, 0, 0]).expect("send 1");
    queue_send(&KERNEL, q, [2, 0, 0, 0]).expect("send 2");
    queue_send(&KERNEL, q, [3, 0, 0, 0]).expect("send 3");

    assert_eq!(queue_receive(&KERNEL, q, Timeout::NoWait).unwrap(), [1, 0, 0, 0]);
    assert_eq!(queue_receive(&KERNEL, q, Timeout::NoWait).unwrap(), [2, 0, 0, 0]);
    assert_eq!(queue_receive(&KERNEL, q, Timeout::NoWait).unwrap(), [3, 0, 0, 0]);

    let fourth = queue_receive(&KERNEL, q, Timeout::NoWait);
    assert_eq!(fourth, Err(QueueReceiveError::NoMsg));
}
