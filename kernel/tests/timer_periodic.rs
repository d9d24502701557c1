//! Scenario 2 (SPEC_FULL §8): a periodic timer set with `timer_evevery`
//! delivers its event bit at every period and `ev_receive` reports it exactly
//! once per period.
use rtk_kernel::error::EventReceiveError;
use rtk_kernel::{ev_receive, task_start, timer_evevery, Kernel, TaskMode, Timeout};
use rtk_port_std::{spawn_task, start, tick_once, HostPort};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

static KERNEL: Kernel<HostPort> = Kernel::new();
static RECEIVES: Mutex<Vec<u32>> = Mutex::new(Vec::new());
static DONE: AtomicU32 = AtomicU32::new(0);
static FOURTH_WAS_NO_EVS: AtomicU32 = AtomicU32::new(0);

fn periodic_receiver(_args: [u32; 4]) {
    timer_evevery(&KERNEL, 100, 0x1).expect("timer_evevery");
    for _ in 0..3 {
        let got = ev_receive(&KERNEL, 0x1, false, Timeout::Forever).expect("ev_receive");
        RECEIVES.lock().unwrap().push(got);
    }
    let fourth = ev_receive(&KERNEL, 0x1, false, Timeout::NoWait);
    if fourth == Err(EventReceiveError::NoEvs) {
        FOURTH_WAS_NO_EVS.store(1, Ordering::SeqCst);
    }
    DONE.store(1, Ordering::SeqCst);
}

#[test]
fn periodic_timer_delivers_exactly_once_per_period() {
    start(&KERNEL);
    let task = spawn_task(&KERNEL, *b"peri", periodic_receiver, [0; 4], 50, 4096, TaskMode::empty())
        .expect("task_create");
    task_start(&KERNEL, task).expect("task_start");

    for _ in 0..300u32 {
        tick_once(&KERNEL);
    }

    assert_eq!(DONE.load(Ordering::SeqCst), 1, "receiver task must have run to completion");
    assert_eq!(*RECEIVES.lock().unwrap(), vec![0x1, 0x1, 0x1], "exactly three deliveries, one per period");
    assert_eq!(FOURTH_WAS_NO_EVS.load(Ordering::SeqCst), 1, "a fourth non-blocking receive must see NoEvs");
}
