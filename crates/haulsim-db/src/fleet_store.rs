//! Truck persistence.

use haulsim_types::{TruckId, TruckSpec};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Read and write access to the `truck` table.
#[derive(Debug, Clone)]
pub struct FleetStore {
    pool: PgPool,
}

impl FleetStore {
    /// Create a new fleet store backed by the given pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of trucks currently owned.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count_trucks(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM truck")
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).map_err(|_e| DbError::OutOfRange {
            column: "truck.count",
            value: count.to_string(),
        })
    }

    /// Insert `quantity` identical trucks in one transaction.
    ///
    /// The truck type is created on first use, so market variant names
    /// that are not in the seeded reference data are still accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::OutOfRange`] if the load does not fit the column,
    /// or [`DbError::Postgres`] if any statement fails.
    pub async fn insert_trucks(
        &self,
        spec: &TruckSpec,
        quantity: u32,
    ) -> Result<Vec<TruckId>, DbError> {
        if quantity == 0 {
            return Ok(Vec::new());
        }
        let max_load = i32::try_from(spec.max_load).map_err(|_e| DbError::OutOfRange {
            column: "truck.max_load",
            value: spec.max_load.to_string(),
        })?;

        let mut tx = self.pool.begin().await?;

        let type_id: i32 = sqlx::query_scalar(
            r"INSERT INTO truck_type (name) VALUES ($1)
              ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
              RETURNING id",
        )
        .bind(&spec.type_name)
        .fetch_one(&mut *tx)
        .await?;

        let ids: Vec<TruckId> = (0..quantity).map(|_| TruckId::generate()).collect();
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        let len = uuids.len();
        let type_ids = vec![type_id; len];
        let loads = vec![max_load; len];
        let costs: Vec<Decimal> = vec![spec.daily_operating_cost; len];

        sqlx::query(
            r"INSERT INTO truck (id, truck_type_id, max_load, daily_operating_cost)
              SELECT * FROM UNNEST($1::UUID[], $2::INTEGER[], $3::INTEGER[], $4::NUMERIC[])",
        )
        .bind(&uuids)
        .bind(&type_ids)
        .bind(&loads)
        .bind(&costs)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            truck_type = %spec.type_name,
            quantity,
            "Inserted trucks (batch UNNEST)"
        );
        Ok(ids)
    }
}
