//! Kernel state locking mechanism.
//!
//! Upstream guards every mutable kernel field with a `CpuLockCell`, a cell
//! type unlockable only by presenting a `CpuLockToken` minted while CPU Lock
//! (the interrupt-masking critical section) is active; the token type is
//! itself generic over the kernel's const-generic `Traits` parameter because
//! a single build can link many differently-configured kernel instantiations.
//! This crate has exactly one kernel instantiation per binary, so the token
//! machinery collapses to one concrete guard type, [`CriticalSection`], and
//! one concrete cell type, [`KCell`] — same idea (accessing kernel state
//! requires proof that interrupts are masked), far less ceremony.
use core::cell::UnsafeCell;

use crate::port::Port;

/// Cell type that can only be read or written while holding a
/// [`CriticalSection`]. Plays the role of upstream's `CpuLockCell`.
pub struct KCell<T>(UnsafeCell<T>);

// Safety: access is only ever granted through `&CriticalSection`/`&mut
// CriticalSection`, which can only be constructed while the kernel's single
// interrupt-masking critical section is held, so there is never concurrent
// (non-reentrant, single-core) access.
unsafe impl<T> Sync for KCell<T> {}

impl<T> KCell<T> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    #[inline]
    pub fn get<'a, P: Port>(&'a self, _cs: &CriticalSection<'a, P>) -> &'a T {
        // Safety: `_cs` proves the critical section is held by the caller,
        // and `KCell` is only ever touched under it.
        unsafe { &*self.0.get() }
    }

    /// Borrow the contents mutably.
    ///
    /// Takes `&CriticalSection` rather than `&mut CriticalSection`
    /// deliberately: the proof that matters is "the critical section is
    /// held", not Rust-level exclusivity of the guard itself, and different
    /// `KCell`s (e.g. the scheduler's and the task pool's) must be
    /// borrowable mutably at once. Soundness instead rests on never calling
    /// `get_mut` twice concurrently for the *same* cell, which the kernel's
    /// call shape (one pass of straight-line code per cell per critical
    /// section) upholds.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub fn get_mut<'a, P: Port>(&'a self, _cs: &CriticalSection<'a, P>) -> &'a mut T {
        // Safety: see `get`.
        unsafe { &mut *self.0.get() }
    }
}

impl<T> KCell<T> {
    #[inline]
    pub fn set<P: Port>(&self, cs: &CriticalSection<'_, P>, value: T) {
        *self.get_mut(cs) = value;
    }
}

/// Kernel-wide critical-section bookkeeping: a nesting depth and the cookie
/// saved at the outermost `enter`, restored at the outermost `drop`. Lives
/// alongside (not behind) a [`KCell`], since acquiring/releasing the section
/// is what makes `KCell` access sound in the first place.
pub struct CriticalSectionState<P: Port> {
    depth: UnsafeCell<u32>,
    cookie: UnsafeCell<Option<P::Cookie>>,
}

// Safety: `depth`/`cookie` are only touched from `enter`/`Drop::drop`, which
// run with interrupts masked (or are themselves what establishes that), on a
// single core.
unsafe impl<P: Port> Sync for CriticalSectionState<P> {}

impl<P: Port> CriticalSectionState<P> {
    pub const fn new() -> Self {
        Self {
            depth: UnsafeCell::new(0),
            cookie: UnsafeCell::new(None),
        }
    }

    /// Enter the critical section, masking interrupts if this is the
    /// outermost call. Always succeeds: the section is reentrant by
    /// construction (ref. SPEC_FULL §5, "the critical section is nestable").
    #[inline]
    pub fn enter(&self) -> CriticalSection<'_, P> {
        // Safety: `ints_disable` is required by the `Port` contract to be
        // safely callable even while already masked; it is the primitive
        // that makes the depth check below race-free.
        let cookie = unsafe { P::ints_disable() };

        // Safety: single-core, and we just masked interrupts (or already
        // were), so nothing else can be concurrently touching `depth`.
        let depth = unsafe { &mut *self.depth.get() };
        if *depth == 0 {
            unsafe { *self.cookie.get() = Some(cookie) };
        }
        *depth += 1;

        CriticalSection {
            state: self,
            _not_send_sync: core::marker::PhantomData,
        }
    }

    #[inline]
    fn leave(&self) {
        // Safety: see `enter`.
        let depth = unsafe { &mut *self.depth.get() };
        debug_assert!(*depth > 0, "unbalanced critical section exit");
        *depth -= 1;
        if *depth == 0 {
            let cookie = unsafe { (*self.cookie.get()).take() }
                .expect("outermost critical section must have a saved cookie");
            // Safety: this is indeed the outermost exit.
            unsafe { P::ints_restore(cookie) };
        }
    }
}

/// RAII guard for the kernel's critical section. Dropping it leaves the
/// section (and, if it was the outermost guard, unmasks interrupts).
pub struct CriticalSection<'a, P: Port> {
    state: &'a CriticalSectionState<P>,
    // Neither `Send` nor `Sync`: a guard minted on one "thread" of execution
    // (task or ISR) must not be observed from another.
    _not_send_sync: core::marker::PhantomData<*const ()>,
}

impl<P: Port> Drop for CriticalSection<'_, P> {
    fn drop(&mut self) {
        self.state.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct TestPort;
    thread_local! {
        static DISABLE_COUNT: Cell<u32> = Cell::new(0);
        static MASKED: Cell<bool> = Cell::new(false);
    }
    unsafe impl Port for TestPort {
        type Cookie = bool;
        unsafe fn ints_disable() -> bool {
            let was_masked = MASKED.with(|m| m.replace(true));
            DISABLE_COUNT.with(|c| c.set(c.get() + 1));
            was_masked
        }
        unsafe fn ints_restore(cookie: bool) {
            MASKED.with(|m| m.set(cookie));
        }
        fn now_ticks() -> u64 {
            0
        }
        fn set_next_alarm(_absolute_ticks: u64) {}
        fn request_switch(_from: Option<crate::port::TaskSwitchInfo>, _to: crate::port::TaskSwitchInfo) {}
    }

    #[test]
    fn nested_sections_restore_only_at_outermost() {
        let state = CriticalSectionState::<TestPort>::new();
        assert!(!MASKED.with(|m| m.get()));
        let outer = state.enter();
        assert!(MASKED.with(|m| m.get()));
        {
            let inner = state.enter();
            assert!(MASKED.with(|m| m.get()));
            drop(inner);
        }
        assert!(MASKED.with(|m| m.get()), "inner exit must not unmask");
        drop(outer);
        assert!(!MASKED.with(|m| m.get()), "outer exit must unmask");
    }
}
