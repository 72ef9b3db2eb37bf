//! Bank-side values consumed by the bootstrap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The business's account at the external bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Account number assigned by the bank.
    pub account_number: String,
}

/// The bank's answer to a single loan application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDecision {
    /// Whether the loan was granted.
    pub approved: bool,
    /// Loan number, present when approved.
    pub loan_number: Option<String>,
}

/// Record of the loan step of a bootstrap run.
///
/// `attempted_amount` equals `requested_amount` unless the first
/// application was declined and a smaller amount was tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanAttempt {
    /// Amount the purchase plan asked for.
    pub requested_amount: Decimal,
    /// Amount of the last application sent to the bank.
    pub attempted_amount: Decimal,
    /// Whether the last application was approved.
    pub approved: bool,
}
