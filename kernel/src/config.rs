//! Compile-time kernel capacities.
//!
//! Upstream derives these from a const-generic `CfgBuilder` filled in by an
//! application's static configuration function. This kernel's public API is
//! runtime-dynamic (`task_create` et al. return freshly allocated ids rather
//! than being named at compile time), so there is no builder to drive;
//! instead the pool capacities are plain `const`s, gathered here the way the
//! reference crate gathers its `KernelCfg1` associated constants. An
//! application wanting different capacities forks this module — there is
//! intentionally no `Cargo` feature matrix for it, matching upstream's
//! preference for compile-time specialization over runtime configuration.

/// Maximum number of tasks that can exist simultaneously (includes the idle
/// task).
pub const MAX_TASKS: usize = 64;

/// Number of priority levels. The public API's priority is a `u8` taken
/// directly as the internal level (`0` is highest), so this is also the
/// number of distinct values a `u8` can hold; see
/// [`crate::task::validate_priority`].
pub const MAX_PRIORITY: usize = 256;

/// Maximum number of semaphores.
pub const MAX_SEMAPHORES: usize = 128;

/// Maximum number of message queues.
pub const MAX_QUEUES: usize = 32;

/// Maximum number of armed timers (independent of [`MAX_TASKS`], since a
/// task may have at most one timeout-driven timer outstanding but
/// `timer_evafter`/`timer_evevery`/`timer_evwhen` are not bound to a task
/// count).
pub const MAX_TIMERS: usize = 256;

/// Total capacity of the message-buffer arena, in 16-byte slots, shared by
/// every queue's ring buffer. Each queue reserves `capacity + 1` slots (one
/// sentinel slot so "full" and "empty" are distinguishable by index
/// comparison alone; see [`crate::queue`]).
pub const MAX_MSG_BUFFERS: usize = 2048;

/// Default tick rate assumed by documentation and the host test port. The
/// kernel itself is agnostic to the physical tick rate; it only ever deals
/// in tick counts.
pub const TICK_HZ: u32 = 100;

/// Minimum stack size accepted by `task_create`, in bytes.
pub const MIN_STACK_BYTES: usize = 256;

/// Ticks a time-sliced task runs before `tick()` rotates it to the back of
/// its priority bucket (ref. SPEC_FULL §4.2, "Time-slicing (ADDED)").
pub const TIME_SLICE_TICKS: u32 = 10;

/// `PrioBitmap` words needed to cover [`MAX_PRIORITY`] levels.
pub const PRIO_BITMAP_WORDS: usize = (MAX_PRIORITY + 63) / 64;
