//! Bindings from the orchestrator's collaborator traits to the real
//! `PostgreSQL` store and HTTP clients.

use haulsim_clients::{BankClient, ClientError, MarketClient};
use haulsim_core::collaborators::{
    BankService, GatewayError, IntegrationError, MarketService, PersistenceGateway,
    SeedTransaction,
};
use haulsim_db::{DbError, PostgresConfig, PostgresPool};
use haulsim_types::{BankAccount, LoanDecision, MarketOrder, SeedRow, TruckOffer, TruckSpec};
use rust_decimal::Decimal;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Persistence gateway over a lazily connected [`PostgresPool`].
#[derive(Debug)]
pub struct PgGateway {
    config: PostgresConfig,
    pool: OnceCell<PostgresPool>,
}

impl PgGateway {
    /// Create a gateway that connects on the first
    /// [`ensure_connected`](PersistenceGateway::ensure_connected).
    pub fn new(config: PostgresConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    fn pool(&self) -> Result<&PostgresPool, GatewayError> {
        self.pool
            .get()
            .ok_or_else(|| GatewayError::new("database is not connected"))
    }

    /// Close the pool if it was ever opened.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

fn gateway_error(err: DbError) -> GatewayError {
    GatewayError::new(err)
}

impl PersistenceGateway for PgGateway {
    type Transaction = PgSeedTransaction;

    async fn ensure_connected(&self) -> Result<(), GatewayError> {
        self.pool
            .get_or_try_init(|| async {
                info!("Connecting to PostgreSQL");
                PostgresPool::connect(&self.config).await
            })
            .await
            .map_err(gateway_error)?;
        Ok(())
    }

    async fn drop_schema(&self) -> Result<(), GatewayError> {
        self.pool()?.drop_schema().await.map_err(gateway_error)
    }

    async fn migrate(&self) -> Result<(), GatewayError> {
        self.pool()?.run_migrations().await.map_err(gateway_error)
    }

    async fn begin_seed(&self) -> Result<PgSeedTransaction, GatewayError> {
        let tx = self.pool()?.begin_seed().await.map_err(gateway_error)?;
        Ok(PgSeedTransaction(tx))
    }

    async fn count_trucks(&self) -> Result<u64, GatewayError> {
        self.pool()?
            .fleet()
            .count_trucks()
            .await
            .map_err(gateway_error)
    }

    async fn insert_trucks(&self, spec: &TruckSpec, quantity: u32) -> Result<(), GatewayError> {
        let ids = self
            .pool()?
            .fleet()
            .insert_trucks(spec, quantity)
            .await
            .map_err(gateway_error)?;
        debug!(truck_type = %spec.type_name, inserted = ids.len(), "Truck rows written");
        Ok(())
    }
}

/// The seed transaction of a [`PgGateway`].
#[derive(Debug)]
pub struct PgSeedTransaction(haulsim_db::SeedTransaction);

impl SeedTransaction for PgSeedTransaction {
    async fn insert(&mut self, row: &SeedRow) -> Result<(), GatewayError> {
        self.0.insert(row).await.map_err(gateway_error)
    }

    async fn commit(self) -> Result<(), GatewayError> {
        let rows = self.0.commit().await.map_err(gateway_error)?;
        debug!(rows, "Seed transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<(), GatewayError> {
        self.0.rollback().await.map_err(gateway_error)
    }
}

fn integration_error(err: ClientError) -> IntegrationError {
    IntegrationError::new(err)
}

/// [`BankService`] over the HTTP [`BankClient`].
#[derive(Debug, Clone)]
pub struct HttpBank(pub BankClient);

impl BankService for HttpBank {
    async fn create_account(&self) -> Result<BankAccount, IntegrationError> {
        self.0.create_account().await.map_err(integration_error)
    }

    async fn apply_for_loan(&self, amount: Decimal) -> Result<LoanDecision, IntegrationError> {
        self.0.apply_for_loan(amount).await.map_err(integration_error)
    }

    async fn post_transaction(
        &self,
        to_account: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<(), IntegrationError> {
        self.0
            .post_transaction(to_account, amount, description)
            .await
            .map_err(integration_error)
    }
}

/// [`MarketService`] over the HTTP [`MarketClient`].
#[derive(Debug, Clone)]
pub struct HttpMarket(pub MarketClient);

impl MarketService for HttpMarket {
    async fn list_offers(&self) -> Result<Vec<TruckOffer>, IntegrationError> {
        self.0.list_offers().await.map_err(integration_error)
    }

    async fn place_order(
        &self,
        name: &str,
        quantity: u32,
    ) -> Result<MarketOrder, IntegrationError> {
        self.0
            .place_order(name, quantity)
            .await
            .map_err(integration_error)
    }
}
