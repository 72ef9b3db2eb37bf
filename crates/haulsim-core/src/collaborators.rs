//! Seams between the orchestrator and the outside world.
//!
//! The orchestrator is generic over these traits so tests can swap in
//! in-memory fakes. The engine binary implements them on top of the
//! `PostgreSQL` store and the HTTP clients.
//!
//! Methods return `impl Future + Send` so the orchestrator's own future
//! stays `Send` and can run on a multi-threaded runtime.

use std::error::Error;
use std::future::Future;

use haulsim_types::{BankAccount, LoanDecision, MarketOrder, SeedRow, TruckOffer, TruckSpec};
use rust_decimal::Decimal;

/// Boxed error from a collaborator.
type BoxError = Box<dyn Error + Send + Sync>;

/// A failure in the persistence layer.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct GatewayError(BoxError);

impl GatewayError {
    /// Wrap any error (or message) from the persistence layer.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self(source.into())
    }
}

/// A failure calling the bank or the market.
///
/// These are always retried or absorbed by a fallback; they never abort a
/// bootstrap run.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct IntegrationError(BoxError);

impl IntegrationError {
    /// Wrap any error (or message) from an external service.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self(source.into())
    }
}

/// The transaction that seeds the reference tables.
///
/// Dropping the transaction releases its connection. Dropping it without
/// committing must discard its rows.
pub trait SeedTransaction: Send {
    /// Insert one reference row.
    fn insert(&mut self, row: &SeedRow) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Commit every inserted row.
    fn commit(self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Discard every inserted row.
    fn rollback(self) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Persistent storage for the simulated business.
pub trait PersistenceGateway: Send + Sync {
    /// Transaction type returned by [`begin_seed`](Self::begin_seed).
    type Transaction: SeedTransaction;

    /// Connect if not already connected. Calling this again is a no-op.
    fn ensure_connected(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Drop every table.
    fn drop_schema(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Create the schema from scratch.
    fn migrate(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Open the seed transaction.
    fn begin_seed(&self) -> impl Future<Output = Result<Self::Transaction, GatewayError>> + Send;

    /// Number of trucks currently owned.
    fn count_trucks(&self) -> impl Future<Output = Result<u64, GatewayError>> + Send;

    /// Record `quantity` newly bought trucks.
    fn insert_trucks(
        &self,
        spec: &TruckSpec,
        quantity: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// The external bank.
pub trait BankService: Send + Sync {
    /// Open the business's account.
    fn create_account(&self) -> impl Future<Output = Result<BankAccount, IntegrationError>> + Send;

    /// Apply for a loan. A decline is `Ok` with `approved == false`.
    fn apply_for_loan(
        &self,
        amount: Decimal,
    ) -> impl Future<Output = Result<LoanDecision, IntegrationError>> + Send;

    /// Pay `amount` into `to_account`.
    fn post_transaction(
        &self,
        to_account: &str,
        amount: Decimal,
        description: &str,
    ) -> impl Future<Output = Result<(), IntegrationError>> + Send;
}

/// The external truck market.
pub trait MarketService: Send + Sync {
    /// List the truck variants currently for sale.
    fn list_offers(&self) -> impl Future<Output = Result<Vec<TruckOffer>, IntegrationError>> + Send;

    /// Order `quantity` trucks of variant `name`.
    fn place_order(
        &self,
        name: &str,
        quantity: u32,
    ) -> impl Future<Output = Result<MarketOrder, IntegrationError>> + Send;
}
