use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
  #[error("timed out acquiring lock {key:?} after {timeout_secs}s")]
  Timeout { key: String, timeout_secs: u64 },
}
