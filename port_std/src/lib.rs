//! Hosted (std) simulation port for `rtk_kernel`: every task runs on a real
//! OS thread, time is driven by the host's own clock (or by hand, one tick
//! at a time), and interrupts are simulated with an ordinary lock. Intended
//! for development and the kernel's own integration tests, not as a template
//! for a production target — a real port drives this same [`rtk_kernel::Port`]
//! contract from an actual timer interrupt and a saved hardware stack frame
//! per task, neither of which exists here.
//!
//! Grounded loosely on upstream's `r3_port_std`: same idea (a hosted port for
//! testing), much simpler mechanism. Upstream's `threading_unix.rs` has to
//! suspend a task thread that might be anywhere in arbitrary user code,
//! asynchronously, via a signal handler and a raw `longjmp` — a genuine
//! simulation of what a hardware interrupt does. This kernel only ever
//! drives a switch synchronously, inline on the task's own call stack (see
//! [`port::HostPort`]'s doc comment for the one case that doesn't hold), so
//! a condition variable per task is enough; see [`gate::Gate`].
mod gate;
mod intlock;
mod port;
mod registry;
mod spawn;

pub use port::HostPort;
pub use spawn::{restart_task, spawn_task, spawn_ticker, start, start_task, tick_once};

#[cfg(test)]
mod tests {
    use super::*;
    use rtk_kernel::{sem_create, sem_p, sem_v, Kernel, TaskMode, Timeout, WaitOrder};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    static KERNEL: Kernel<HostPort> = Kernel::new();
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn bump(_args: [u32; 4]) {
        COUNTER.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn a_started_task_runs_and_idle_resumes() {
        start(&KERNEL);
        let id = spawn_task(&KERNEL, *b"bump", bump, [0; 4], 10, 4096, TaskMode::empty())
            .expect("task_create");
        start_task(&KERNEL, id).expect("task_start");
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(COUNTER.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn semaphore_hand_off_between_two_real_threads() {
        static K2: Kernel<HostPort> = Kernel::new();
        static TAKEN: AtomicU32 = AtomicU32::new(0);

        fn waiter(_args: [u32; 4]) {
            let sem = rtk_kernel::sem_ident(&K2, *b"sigx").expect("created before waiter starts");
            sem_p(&K2, sem, Timeout::Forever).expect("sem_p");
            TAKEN.fetch_add(1, Ordering::SeqCst);
        }

        start(&K2);
        let sem = sem_create(&K2, *b"sigx", 0, 1, WaitOrder::Priority).expect("sem_create");
        let id = spawn_task(&K2, *b"wait", waiter, [0; 4], 10, 4096, TaskMode::empty())
            .expect("task_create");
        start_task(&K2, id).expect("task_start");
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(TAKEN.load(Ordering::SeqCst), 0, "waiter must block with no permit available");
        sem_v(&K2, sem).expect("sem_v");
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(TAKEN.load(Ordering::SeqCst), 1, "waiter must wake once a permit is handed off");
    }
}
