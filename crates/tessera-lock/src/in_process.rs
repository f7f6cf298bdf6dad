use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::LockError;
use crate::lock::{DistributedLock, LockGuard};

/// Single-process stand-in for a cluster-wide lock backend: one
/// `tokio::sync::Mutex` per key, created lazily. Correct within one process,
/// which is all a single-node deployment (or a test) needs; a clustered
/// deployment swaps this for a real distributed lock without the engine
/// noticing, since it only depends on [`DistributedLock`].
#[derive(Default)]
pub struct InProcessLock {
  mutexes: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl InProcessLock {
  pub fn new() -> Self {
    Self::default()
  }

  async fn entry(&self, key: &str) -> Arc<Mutex<()>> {
    if let Some(existing) = self.mutexes.read().await.get(key) {
      return existing.clone();
    }
    let mut mutexes = self.mutexes.write().await;
    mutexes.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
  }
}

#[async_trait]
impl DistributedLock for InProcessLock {
  async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockGuard, LockError> {
    let mutex = self.entry(key).await;
    match tokio::time::timeout(timeout, mutex.lock_owned()).await {
      Ok(guard) => Ok(LockGuard::new(guard)),
      Err(_) => Err(LockError::Timeout {
        key: key.to_string(),
        timeout_secs: timeout.as_secs(),
      }),
    }
  }
}
