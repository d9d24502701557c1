//! Scenario 7 (SPEC_FULL §8): an ALL-mode event wait is not satisfied by a
//! partial match; it wakes, with the full set, only once every requested bit
//! has arrived.
use rtk_kernel::{ev_send, task_start, Kernel, TaskMode};
use rtk_port_std::{spawn_task, start, HostPort};
use std::sync::atomic::{AtomicU32, Ordering};

static KERNEL: Kernel<HostPort> = Kernel::new();
static RECEIVED: AtomicU32 = AtomicU32::new(0);

fn wait_for_both(_args: [u32; 4]) {
    let got = rtk_kernel::ev_receive(&KERNEL, 0x3, true, rtk_kernel::Timeout::Forever).expect("ev_receive");
    RECEIVED.store(got, Ordering::SeqCst);
}

#[test]
fn all_mode_wait_wakes_only_once_every_bit_has_arrived() {
    start(&KERNEL);
    let target = spawn_task(&KERNEL, *b"both", wait_for_both, [0; 4], 10, 4096, TaskMode::empty())
        .expect("task_create");
    task_start(&KERNEL, target).expect("task_start");

    ev_send(&KERNEL, target, 0x1).expect("ev_send 0x1");
    assert_eq!(RECEIVED.load(Ordering::SeqCst), 0, "a partial match must not wake an ALL-mode wait");

    ev_send(&KERNEL, target, 0x2).expect("ev_send 0x2");
    assert_eq!(RECEIVED.load(Ordering::SeqCst), 0x3, "the full set must be delivered once complete");
}
