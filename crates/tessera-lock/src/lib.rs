//! The distributed lock consumed interface (§6) and an in-process
//! implementation for tests and single-node deployments.

mod error;
mod in_process;
mod lock;

pub use error::LockError;
pub use in_process::InProcessLock;
pub use lock::{DistributedLock, LockGuard, DEFAULT_LOCK_TIMEOUT};
