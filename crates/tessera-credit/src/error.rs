use thiserror::Error;

/// Raised when a debit would take the user's balance below zero (§4.4, §7).
/// Aborts the whole graph run.
#[derive(Debug, Clone, Error)]
#[error("insufficient balance: have {balance}, need {amount}")]
pub struct InsufficientBalanceError {
  pub balance: u64,
  pub amount: u64,
}

impl InsufficientBalanceError {
  pub fn new(balance: u64, amount: u64) -> Self {
    Self { balance, amount }
  }

  /// `balance - amount`, surfaced in the `LOW_BALANCE` notification payload
  /// (§4.4, §9 open question). Negative when the requested debit genuinely
  /// exceeds the balance.
  pub fn shortfall(&self) -> i64 {
    self.balance as i64 - self.amount as i64
  }
}
