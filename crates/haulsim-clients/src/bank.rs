//! Client for the external bank.
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | create account | `POST /account` | `{"accountNumber"}` |
//! | apply for loan | `POST /loan {"amount"}` | `{"success", "loanNumber"?}` |
//! | post transaction | `POST /transaction {"toAccountNumber", "amount", "description"}` | any 2xx |

use haulsim_types::{BankAccount, LoanDecision};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::http::{self, HttpClientConfig};

/// Service name used in errors and logs.
const SERVICE: &str = "bank";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    account_number: String,
}

#[derive(Debug, Serialize)]
struct LoanRequest {
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoanResponse {
    #[serde(alias = "approved")]
    success: bool,
    #[serde(default)]
    loan_number: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRequest<'a> {
    to_account_number: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    description: &'a str,
}

/// HTTP client for the bank.
#[derive(Debug, Clone)]
pub struct BankClient {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl BankClient {
    /// Create a bank client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] if the HTTP client cannot be built.
    pub fn new(config: HttpClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: config.build_client()?,
            config,
        })
    }

    /// Open the business's account.
    pub async fn create_account(&self) -> Result<BankAccount, ClientError> {
        let request = self
            .client
            .post(self.config.url("/account"))
            .json(&serde_json::json!({}));
        let response: AccountResponse = http::send_json(request, SERVICE).await?;
        tracing::debug!(account = %response.account_number, "Bank account created");
        Ok(BankAccount {
            account_number: response.account_number,
        })
    }

    /// Apply for a loan of `amount`.
    ///
    /// A declined application is a successful call with
    /// `approved == false`, not an error.
    pub async fn apply_for_loan(&self, amount: Decimal) -> Result<LoanDecision, ClientError> {
        let request = self
            .client
            .post(self.config.url("/loan"))
            .json(&LoanRequest { amount });
        let response: LoanResponse = http::send_json(request, SERVICE).await?;
        Ok(LoanDecision {
            approved: response.success,
            loan_number: response.loan_number,
        })
    }

    /// Pay `amount` into `to_account`.
    pub async fn post_transaction(
        &self,
        to_account: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<(), ClientError> {
        let request = self
            .client
            .post(self.config.url("/transaction"))
            .json(&TransactionRequest {
                to_account_number: to_account,
                amount,
                description,
            });
        http::send(request, SERVICE).await?;
        Ok(())
    }
}
