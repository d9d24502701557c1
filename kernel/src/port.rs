//! The port contract (SPEC_FULL §4.1): the capability set an integrator must
//! supply to bring this kernel up on a specific target.
//!
//! Upstream expresses the equivalent contract as a family of traits
//! (`PortThreading`, `PortTimer`, ...) implemented on a zero-sized `Traits`
//! type that the whole kernel is generic over, so that the const-generic
//! static configuration can specialize per port at compile time. This crate
//! has one concrete kernel, so the contract collapses to a single trait,
//! `Port`, implemented once by each integrator (a real-MCU port, or the
//! hosted simulation port in the sibling `rtk_port_std` crate).
use core::fmt;

/// A task's entry point: called with the four 32-bit argument-vector words
/// positionally, as required by SPEC_FULL §4.1.
pub type TaskEntry = fn([u32; 4]);

/// An opaque saved-stack-pointer value. The kernel never dereferences it; it
/// only ever hands it back to the port that produced it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SavedSp(pub usize);

impl fmt::Debug for SavedSp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SavedSp({:#x})", self.0)
    }
}

/// The integrator-supplied capability set a port must provide.
///
/// # Safety
///
/// Implementations must uphold the contract described on each method: in
/// particular, `ints_disable`/`ints_restore` must provide a true
/// interrupt-masking critical section (reentrant-safe to call
/// `ints_disable` while already masked, per [`crate::klock`]), and
/// `init_stack` must produce a stack frame that, when first resumed,
/// transfers control to `entry(args)` and nowhere else. Failure in any port
/// call is fatal (SPEC_FULL §4.1): implementations should abort/panic rather
/// than return an unusable state.
pub unsafe trait Port: 'static {
    /// The value returned by `ints_disable` and consumed by `ints_restore`.
    /// Typically "were interrupts already masked before this call".
    type Cookie: Copy;

    /// Mask interrupts and return a cookie describing the previous state.
    /// Must be safe to call while already masked (the kernel uses this to
    /// implement a nestable critical section on top of a non-nestable
    /// hardware primitive; see [`crate::klock`]).
    ///
    /// # Safety
    /// Must only be called by the kernel's critical-section implementation.
    unsafe fn ints_disable() -> Self::Cookie;

    /// Restore the interrupt state described by `cookie`.
    ///
    /// # Safety
    /// Must only be called by the kernel's critical-section implementation,
    /// exactly once per `ints_disable` call, at the outermost nesting level.
    unsafe fn ints_restore(cookie: Self::Cookie);

    /// The monotonic tick count since boot. Must never move backward.
    fn now_ticks() -> u64;

    /// Request a `tick()` call no later than `absolute_ticks`. If
    /// `absolute_ticks <= now_ticks()`, a `tick()` call must follow
    /// immediately or very soon.
    fn set_next_alarm(absolute_ticks: u64);

    /// Prepare an initial stack frame of `stack_size` bytes starting at
    /// `stack_base` such that a first resume invokes `entry(args)`.
    ///
    /// The default implementation is suitable only for ports that do not
    /// perform real context switches (e.g. a port under test that never
    /// resumes a saved context); a real port must override this.
    ///
    /// # Safety
    /// `stack_base` must point to at least `stack_size` writable bytes, and
    /// that memory must remain reserved for the task's exclusive use until
    /// the task is deleted.
    unsafe fn init_stack(
        stack_base: *mut u8,
        stack_size: usize,
        entry: TaskEntry,
        args: [u32; 4],
    ) -> SavedSp {
        let _ = (stack_base, stack_size, entry, args);
        unimplemented!("this port does not support resuming a saved context")
    }

    /// Request a deferred context switch from `from` (`None` at boot, before
    /// any task has ever run) to `to`. Called with the kernel's critical
    /// section already released, so interrupts are unmasked for the
    /// duration of the call.
    ///
    /// May return with the switch still pending on a real target; it is
    /// then guaranteed to occur no later than the next return from the
    /// outermost interrupt handler. A synchronous switch — block the
    /// calling context until it is `to` again — is permitted, and is what
    /// the hosted simulation port does: it is how a "suspended" call stack
    /// is simulated using a real OS thread parked on a condition variable.
    fn request_switch(from: Option<TaskSwitchInfo>, to: TaskSwitchInfo);
}

/// The minimal information the kernel exposes to [`Port::request_switch`]
/// about each side of a switch, without exposing the scheduler's internal
/// control-block representation to the port.
#[derive(Clone, Copy, Debug)]
pub struct TaskSwitchInfo {
    pub task_id_raw: u32,
    pub port_task_state_index: usize,
}
