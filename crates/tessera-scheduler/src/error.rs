use tessera_credit::InsufficientBalanceError;
use tessera_store::StoreError;
use thiserror::Error;

/// Failure of the per-node usage charge (§4.4). Only the insufficient-balance
/// case carries product meaning (it aborts the run and fires `LOW_BALANCE`);
/// every other store failure is treated as an infrastructure error.
#[derive(Debug, Error)]
pub enum ChargeError {
  #[error(transparent)]
  InsufficientBalance(#[from] InsufficientBalanceError),
  #[error(transparent)]
  Store(StoreError),
}

impl From<StoreError> for ChargeError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::InsufficientBalance(err) => ChargeError::InsufficientBalance(err),
      other => ChargeError::Store(other),
    }
  }
}
