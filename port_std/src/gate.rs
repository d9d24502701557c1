//! One condition-variable gate per task slot: the mechanism
//! [`crate::HostPort::request_switch`] uses to make "the calling OS thread
//! becomes whichever task the kernel picked" true.
//!
//! Grounded on the same idea upstream's `threading` module calls park/unpark,
//! but stripped to the one primitive this port actually needs: a thread
//! parks on its own gate and is woken by whoever opens it, nothing more. The
//! teacher's real implementation (`threading_unix.rs`) additionally has to
//! suspend a thread that is *not* cooperating — mid-instruction, via a
//! signal handler and a raw `longjmp` — because a genuine preemptive target
//! can interrupt task code at any point. This port only ever switches away
//! from a task on that task's own call stack (it is always the one making
//! the kernel call that triggers the switch), so a plain "wait until it's my
//! turn" condvar is enough; see the module doc on [`crate::HostPort`] for the
//! one case that does not hold.
use std::sync::{Condvar, Mutex};

pub(crate) struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub(crate) const fn new() -> Self {
        Self {
            open: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    /// Allow the thread parked on this gate to proceed.
    pub(crate) fn open(&self) {
        let mut guard = self.open.lock().unwrap();
        *guard = true;
        self.cv.notify_all();
    }

    /// Block the calling thread until this gate is opened, then close it
    /// again so the next visit parks too.
    pub(crate) fn wait(&self) {
        let mut guard = self.open.lock().unwrap();
        while !*guard {
            guard = self.cv.wait(guard).unwrap();
        }
        *guard = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_blocks_until_open() {
        let gate = Arc::new(Gate::new());
        let g2 = Arc::clone(&gate);
        let handle = thread::spawn(move || {
            g2.wait();
        });
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        gate.open();
        handle.join().unwrap();
    }
}
