//! A small side table from [`TaskId`] back to the `(entry, args, name)` a
//! task was created with, so [`crate::restart_task`] can respawn a thread
//! without the caller having to repeat itself. `rtk_kernel` itself has no
//! public getter for a `Tcb`'s stored `entry`/`args` (nothing in the
//! port-agnostic API needs one); this is purely a convenience for this
//! port's own `restart_task`.
use rtk_kernel::{TaskEntry, TaskId};
use std::collections::HashMap;
use std::sync::Mutex;

static REGISTRY: Mutex<Option<HashMap<TaskId, ([u8; 4], TaskEntry, [u32; 4])>>> = Mutex::new(None);

pub(crate) fn remember(id: TaskId, entry: TaskEntry, args: [u32; 4], name: [u8; 4]) {
    let mut guard = REGISTRY.lock().unwrap();
    guard.get_or_insert_with(HashMap::new).insert(id, (name, entry, args));
}

pub(crate) fn lookup(id: TaskId) -> Option<(TaskEntry, [u32; 4], [u8; 4])> {
    let guard = REGISTRY.lock().unwrap();
    guard
        .as_ref()
        .and_then(|m| m.get(&id))
        .map(|(name, entry, args)| (*entry, *args, *name))
}
