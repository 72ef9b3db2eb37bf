//! Transactional insert of the core reference rows.
//!
//! A [`SeedTransaction`] owns one pooled connection for the whole seed.
//! Dropping it without calling [`commit`](SeedTransaction::commit) rolls
//! the transaction back and returns the connection to the pool, so the
//! connection is released on every exit path.

use haulsim_types::SeedRow;
use sqlx::{Postgres, Transaction};

use crate::error::DbError;

/// An open transaction inserting reference rows.
#[derive(Debug)]
pub struct SeedTransaction {
    tx: Transaction<'static, Postgres>,
    inserted: usize,
}

impl SeedTransaction {
    pub(crate) const fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx, inserted: 0 }
    }

    /// Insert one reference row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails. The transaction
    /// is then aborted on the server and must be rolled back.
    pub async fn insert(&mut self, row: &SeedRow) -> Result<(), DbError> {
        match row {
            SeedRow::PickupStatus { name } => {
                sqlx::query("INSERT INTO pickup_status (name) VALUES ($1)")
                    .bind(name)
                    .execute(&mut *self.tx)
                    .await?;
            }
            SeedRow::ServiceType { id, name } => {
                sqlx::query("INSERT INTO service_type (id, name) VALUES ($1, $2)")
                    .bind(id)
                    .bind(name)
                    .execute(&mut *self.tx)
                    .await?;
            }
            SeedRow::TruckType { name } => {
                sqlx::query("INSERT INTO truck_type (name) VALUES ($1)")
                    .bind(name)
                    .execute(&mut *self.tx)
                    .await?;
            }
        }
        self.inserted = self.inserted.saturating_add(1);
        Ok(())
    }

    /// Commit every inserted row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the commit fails.
    pub async fn commit(self) -> Result<usize, DbError> {
        let inserted = self.inserted;
        self.tx.commit().await?;
        tracing::debug!(rows = inserted, "Committed core seed");
        Ok(inserted)
    }

    /// Discard every inserted row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback().await?;
        tracing::debug!("Rolled back core seed");
        Ok(())
    }
}
