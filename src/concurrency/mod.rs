pub mod run_lock;

pub use run_lock::{RunLock, RunLockGuard};
