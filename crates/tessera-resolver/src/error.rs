use tessera_lock::LockError;
use tessera_store::StoreError;
use thiserror::Error;

/// §4.1 error modes. `BlockNotFound` is non-fatal for the graph (the
/// resolver logs and drops the offending link); `LockTimeout` and `Store`
/// surface as a node-level error to the caller.
#[derive(Debug, Error)]
pub enum ResolverError {
  #[error(transparent)]
  Lock(#[from] LockError),
  #[error(transparent)]
  Store(#[from] StoreError),
}
