use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::error::LockError;

/// Ceiling on how long a distributed lock is held before a dead holder is
/// assumed (§5, §9). Blocks that legitimately run longer while holding a
/// credential lock need a deployment-specific override.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Released automatically when dropped, including on panic, so a crashed
/// lock holder never leaves a key stuck (§4.2 step 3, §4.1 error modes).
pub struct LockGuard {
  _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
  pub(crate) fn new(guard: OwnedMutexGuard<()>) -> Self {
    Self { _guard: guard }
  }
}

/// Keyed mutual exclusion with a timeout, safe across processes and hosts
/// (§6). Used for `upsert_input-{sink}-{graph_exec}` (§4.1 step 2) and for
/// credential acquisition (§4.2 step 3, §5).
#[async_trait]
pub trait DistributedLock: Send + Sync {
  async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockGuard, LockError>;

  async fn acquire_default(&self, key: &str) -> Result<LockGuard, LockError> {
    self.acquire(key, DEFAULT_LOCK_TIMEOUT).await
  }
}
