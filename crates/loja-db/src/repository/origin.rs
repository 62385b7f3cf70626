//! # Origin Repository
//!
//! Read access to the sales and service records a charge bills.
//!
//! The back-office CRUD layer owns both tables. The ledger only reads
//! `sales(id, total_cents, canceled)` and
//! `service_records(id, total_price_cents)`; the write helpers here exist so
//! the seed binary and tests can stand those rows up.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use loja_core::{Money, SaleRef, ServiceRef};

use crate::error::{DbError, DbResult};

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: i64,
    total_cents: i64,
    canceled: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ServiceRow {
    id: i64,
    total_price_cents: i64,
}

impl From<SaleRow> for SaleRef {
    fn from(row: SaleRow) -> Self {
        SaleRef {
            id: row.id,
            total: Money::from_cents(row.total_cents),
            cancelled: row.canceled,
        }
    }
}

impl From<ServiceRow> for ServiceRef {
    fn from(row: ServiceRow) -> Self {
        ServiceRef {
            id: row.id,
            total_price: Money::from_cents(row.total_price_cents),
        }
    }
}

pub(crate) async fn fetch_sale(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<SaleRef>> {
    let row: Option<SaleRow> =
        sqlx::query_as("SELECT id, total_cents, canceled FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(row.map(SaleRef::from))
}

pub(crate) async fn fetch_service(
    conn: &mut SqliteConnection,
    id: i64,
) -> DbResult<Option<ServiceRef>> {
    let row: Option<ServiceRow> =
        sqlx::query_as("SELECT id, total_price_cents FROM service_records WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(row.map(ServiceRef::from))
}

/// Repository for sale / service snapshots.
#[derive(Debug, Clone)]
pub struct OriginRepository {
    pool: SqlitePool,
}

impl OriginRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OriginRepository { pool }
    }

    pub async fn get_sale(&self, id: i64) -> DbResult<Option<SaleRef>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut *conn, id).await
    }

    pub async fn get_service(&self, id: i64) -> DbResult<Option<ServiceRef>> {
        let mut conn = self.pool.acquire().await?;
        fetch_service(&mut *conn, id).await
    }

    /// Inserts a sale row.
    pub async fn insert_sale(&self, sale: &SaleRef) -> DbResult<()> {
        debug!(id = sale.id, total = sale.total.cents(), "Inserting sale");

        sqlx::query("INSERT INTO sales (id, total_cents, canceled) VALUES (?1, ?2, ?3)")
            .bind(sale.id)
            .bind(sale.total.cents())
            .bind(sale.cancelled)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Inserts a service record row.
    pub async fn insert_service(&self, service: &ServiceRef) -> DbResult<()> {
        debug!(
            id = service.id,
            total_price = service.total_price.cents(),
            "Inserting service record"
        );

        sqlx::query("INSERT INTO service_records (id, total_price_cents) VALUES (?1, ?2)")
            .bind(service.id)
            .bind(service.total_price.cents())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn update_sale_total(&self, id: i64, total: Money) -> DbResult<()> {
        let result = sqlx::query("UPDATE sales SET total_cents = ?1 WHERE id = ?2")
            .bind(total.cents())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id.to_string()));
        }
        Ok(())
    }

    pub async fn set_sale_cancelled(&self, id: i64, cancelled: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE sales SET canceled = ?1 WHERE id = ?2")
            .bind(cancelled)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id.to_string()));
        }
        Ok(())
    }

    /// Highest sale id so far (0 on an empty table).
    pub async fn max_sale_id(&self) -> DbResult<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(max.unwrap_or(0))
    }
}
