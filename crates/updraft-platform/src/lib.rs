#![forbid(unsafe_code)]

//! Platform primitives for updraft.
//!
//! - [`IoPool`]: dedicated pool for blocking filesystem work (existence checks, copies,
//!   deletions) so decision logic on async tasks never waits on a slow disk.
//! - [`write_atomic`]: crash-safe whole-file replacement.
//! - Lock types re-exported from [`parking_lot`].

mod atomic;
mod pool;

pub use atomic::write_atomic;
pub use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use pool::IoPool;
