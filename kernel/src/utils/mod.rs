//! Utility data structures shared by the kernel's subsystems.
//!
//! **This module is exempt from the API stability guarantee.**

pub mod arena;
pub mod dlist;
pub mod init;
pub mod prio_bitmap;

pub use arena::{Arena, Id};
pub use dlist::{DList, Linked, Links};
pub use init::Init;
pub use prio_bitmap::PrioBitmap;
