use async_trait::async_trait;
use serde_json::Value;
use tessera_lock::{LockError, LockGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
  #[error("credential {credential_id} not found for user {user_id}")]
  NotFound { user_id: String, credential_id: String },
  #[error("credential {credential_id} provider mismatch: expected {expected}, got {actual}")]
  ProviderMismatch {
    credential_id: String,
    expected: String,
    actual: String,
  },
  #[error("credential {credential_id} type mismatch: expected {expected}, got {actual}")]
  TypeMismatch {
    credential_id: String,
    expected: String,
    actual: String,
  },
  #[error(transparent)]
  Lock(#[from] LockError),
}

/// The credential store consumed interface (§6). `acquire` takes the
/// system-wide `(user_id, credential_id)` lock (§4.2 step 3) and returns the
/// resolved credential payload alongside the guard that releases it; holding
/// the guard for the duration of block execution is what the "only one
/// running block per credential across the cluster" invariant requires.
#[async_trait]
pub trait CredentialStore: Send + Sync {
  async fn get_creds_by_id(&self, user_id: &str, credential_id: &str) -> Result<Value, CredentialError>;

  async fn acquire(&self, user_id: &str, credential_id: &str) -> Result<(Value, LockGuard), CredentialError>;

  /// Signal-handler escape hatch (§5 "Signal handling"): release every lock
  /// this process holds, used from a SIGTERM handler where individual
  /// `(user_id, credential_id)` pairs are no longer known.
  async fn release_all_locks(&self);
}
