use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tessera_lock::{DistributedLock, InProcessLock};

use crate::credentials::{CredentialError, CredentialStore};

/// A fixed `(user_id, credential_id) -> payload` table, locked through an
/// in-process [`InProcessLock`]. The real credential store and its provider
/// integrations are out of scope for this engine (§1); this exists for
/// tests and single-node embedding.
pub struct StaticCredentialStore {
  credentials: HashMap<(String, String), Value>,
  lock: InProcessLock,
}

impl StaticCredentialStore {
  pub fn new(credentials: HashMap<(String, String), Value>) -> Self {
    Self {
      credentials,
      lock: InProcessLock::new(),
    }
  }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
  async fn get_creds_by_id(&self, user_id: &str, credential_id: &str) -> Result<Value, CredentialError> {
    self
      .credentials
      .get(&(user_id.to_string(), credential_id.to_string()))
      .cloned()
      .ok_or_else(|| CredentialError::NotFound {
        user_id: user_id.to_string(),
        credential_id: credential_id.to_string(),
      })
  }

  async fn acquire(
    &self,
    user_id: &str,
    credential_id: &str,
  ) -> Result<(Value, tessera_lock::LockGuard), CredentialError> {
    let value = self.get_creds_by_id(user_id, credential_id).await?;
    let key = format!("credential-{user_id}-{credential_id}");
    let guard = self.lock.acquire_default(&key).await?;
    Ok((value, guard))
  }

  async fn release_all_locks(&self) {
    // InProcessLock releases are purely RAII (guard Drop); there is no
    // process-wide handle to sweep here. A real distributed backend's
    // implementation of this trait would disconnect its client.
  }
}
