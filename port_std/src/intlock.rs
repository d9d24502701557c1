//! The hosted port's stand-in for a hardware interrupt mask.
//!
//! A real port's `ints_disable`/`ints_restore` pair is reentrant because a
//! single core trivially nests ("already disabled" is just a flag read). On
//! a host running every task as a genuine OS thread there is no single core
//! to mask, so the same reentrant-disable contract has to be rebuilt on top
//! of a lock: whichever thread currently holds it is "the one with
//! interrupts off", and any other thread calling `ints_disable` blocks until
//! it is released, exactly as a second core spinning on a hardware spinlock
//! would.
//!
//! Spins rather than parks on contention. Kernel critical sections are brief
//! (SPEC_FULL §5), so this is cheaper than a condvar round-trip and avoids
//! pulling a second synchronization primitive into what is otherwise a
//! hardware-register-flavored operation.
use spin::Mutex;
use std::thread::{self, ThreadId};

pub struct IntLock {
    holder: Mutex<Option<ThreadId>>,
}

impl IntLock {
    pub const fn new() -> Self {
        Self {
            holder: Mutex::new(None),
        }
    }

    /// Mask. Returns whether the calling thread already held the lock
    /// (the `Cookie` the kernel hands back to `ints_restore`).
    pub fn disable(&self) -> bool {
        let me = thread::current().id();
        loop {
            let mut holder = self.holder.lock();
            match *holder {
                Some(h) if h == me => return true,
                None => {
                    *holder = Some(me);
                    return false;
                }
                Some(_) => {
                    drop(holder);
                    thread::yield_now();
                }
            }
        }
    }

    /// Unmask. `was_nested` must be the value `disable` returned for the
    /// matching outermost call; the kernel only ever calls this once per
    /// nesting level, at the outermost `leave()`, so `was_nested` is always
    /// `false` in practice, but a defensive check costs nothing.
    pub fn restore(&self, was_nested: bool) {
        if was_nested {
            return;
        }
        let mut holder = self.holder.lock();
        *holder = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn nested_disable_on_same_thread_does_not_deadlock() {
        let lock = IntLock::new();
        let outer = lock.disable();
        let inner = lock.disable();
        assert!(!outer);
        assert!(inner);
        lock.restore(inner);
        lock.restore(outer);
    }

    #[test]
    fn other_thread_blocks_until_released() {
        let lock = Arc::new(IntLock::new());
        let cookie = lock.disable();
        let lock2 = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            let c = lock2.disable();
            lock2.restore(c);
        });
        thread::sleep(std::time::Duration::from_millis(20));
        lock.restore(cookie);
        handle.join().unwrap();
    }
}
