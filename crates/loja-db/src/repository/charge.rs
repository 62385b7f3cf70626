//! # Charge Repository
//!
//! Loads and stores charges together with their installments and the origin
//! snapshot they bill.
//!
//! ## Row Mapping
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │  charges c                                                              │
//! │    LEFT JOIN sales s            ON s.id  = c.sale_id                    │
//! │    LEFT JOIN service_records sr ON sr.id = c.service_record_id          │
//! │        │                                                                 │
//! │        ▼                                                                 │
//! │  ChargeRow ──┬── sale_id + s.*     ──► ChargeOrigin::Sale(SaleRef)       │
//! │              └── service_id + sr.* ──► ChargeOrigin::Service(ServiceRef) │
//! │                                                                          │
//! │  charge_installments (ORDER BY installment_number)                       │
//! │        │                                                                 │
//! │        ▼                                                                 │
//! │  InstallmentRow ──► Installment                                          │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Writes
//! `update_charge` is a compare-and-swap on `version`:
//! ```sql
//! UPDATE charges SET ..., version = version + 1 WHERE id = ? AND version = ?
//! ```
//! Zero affected rows means another writer got there first.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use loja_core::{
    Charge, ChargeOrigin, ChargeStatus, Installment, Money, PaymentMethod, SaleRef, ServiceRef,
};

use crate::error::{DbError, DbResult};

// =============================================================================
// Row Types
// =============================================================================

const CHARGE_SELECT: &str = r#"
    SELECT
        c.id,
        c.sale_id,
        c.service_record_id,
        s.total_cents AS sale_total_cents,
        s.canceled AS sale_canceled,
        sr.total_price_cents AS service_total_price_cents,
        c.reference,
        c.due_date,
        c.amount_cents,
        c.amount_paid_cents,
        c.status,
        c.payment_method,
        c.is_installment,
        c.installment_count,
        c.installment_value_cents,
        c.payment_confirmed_at,
        c.created_at,
        c.updated_at,
        c.version
    FROM charges c
    LEFT JOIN sales s ON s.id = c.sale_id
    LEFT JOIN service_records sr ON sr.id = c.service_record_id
"#;

const INSTALLMENT_SELECT: &str = r#"
    SELECT
        charge_id,
        installment_number,
        due_date,
        amount_cents,
        amount_paid_cents,
        status,
        payment_confirmed_at
    FROM charge_installments
"#;

#[derive(Debug, sqlx::FromRow)]
struct ChargeRow {
    id: String,
    sale_id: Option<i64>,
    service_record_id: Option<i64>,
    sale_total_cents: Option<i64>,
    sale_canceled: Option<bool>,
    service_total_price_cents: Option<i64>,
    reference: String,
    due_date: Option<NaiveDate>,
    amount_cents: i64,
    amount_paid_cents: i64,
    status: ChargeStatus,
    payment_method: PaymentMethod,
    is_installment: bool,
    installment_count: i64,
    installment_value_cents: i64,
    payment_confirmed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct InstallmentRow {
    charge_id: String,
    installment_number: i64,
    due_date: NaiveDate,
    amount_cents: i64,
    amount_paid_cents: i64,
    status: ChargeStatus,
    payment_confirmed_at: Option<DateTime<Utc>>,
}

fn to_u32(table: &str, column: &str, value: i64) -> DbResult<u32> {
    u32::try_from(value).map_err(|_| DbError::corrupt(table, format!("{column} = {value}")))
}

fn to_i64(value: u32) -> i64 {
    i64::from(value)
}

impl InstallmentRow {
    fn into_installment(self) -> DbResult<Installment> {
        Ok(Installment {
            number: to_u32("charge_installments", "installment_number", self.installment_number)?,
            charge_id: self.charge_id,
            due_date: self.due_date,
            amount: Money::from_cents(self.amount_cents),
            amount_paid: Money::from_cents(self.amount_paid_cents),
            status: self.status,
            payment_confirmed_at: self.payment_confirmed_at,
        })
    }
}

impl ChargeRow {
    fn into_charge(self, installments: Vec<Installment>) -> DbResult<Charge> {
        let sale = self.sale_id.map(|id| SaleRef {
            id,
            total: Money::from_cents(self.sale_total_cents.unwrap_or(0)),
            cancelled: self.sale_canceled.unwrap_or(false),
        });
        let service = self.service_record_id.map(|id| ServiceRef {
            id,
            total_price: Money::from_cents(self.service_total_price_cents.unwrap_or(0)),
        });
        let origin = ChargeOrigin::from_columns(&self.id, sale, service)?;

        Ok(Charge {
            installment_count: to_u32("charges", "installment_count", self.installment_count)?,
            id: self.id,
            origin,
            reference: self.reference,
            due_date: self.due_date,
            amount: Money::from_cents(self.amount_cents),
            amount_paid: Money::from_cents(self.amount_paid_cents),
            status: self.status,
            payment_method: self.payment_method,
            is_installment: self.is_installment,
            installment_value: Money::from_cents(self.installment_value_cents),
            payment_confirmed_at: self.payment_confirmed_at,
            installments,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

// =============================================================================
// Connection-level Operations
// =============================================================================
// These take a bare connection so BillingService can run them inside its
// transaction (`&mut *tx`) and the repository can run them on a pooled one.

/// Which charges a list query returns.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ChargeFilter {
    All,
    Sale(i64),
    Service(i64),
}

impl ChargeFilter {
    fn where_clause(&self) -> &'static str {
        match self {
            ChargeFilter::All => "",
            ChargeFilter::Sale(_) => "WHERE c.sale_id = ?1",
            ChargeFilter::Service(_) => "WHERE c.service_record_id = ?1",
        }
    }

    fn installment_clause(&self) -> &'static str {
        match self {
            ChargeFilter::All => "",
            ChargeFilter::Sale(_) => {
                "WHERE charge_id IN (SELECT id FROM charges WHERE sale_id = ?1)"
            }
            ChargeFilter::Service(_) => {
                "WHERE charge_id IN (SELECT id FROM charges WHERE service_record_id = ?1)"
            }
        }
    }

    fn origin_id(&self) -> Option<i64> {
        match self {
            ChargeFilter::All => None,
            ChargeFilter::Sale(id) | ChargeFilter::Service(id) => Some(*id),
        }
    }
}

/// Loads one charge with its installments and origin snapshot.
pub(crate) async fn fetch_charge(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Charge>> {
    let row: Option<ChargeRow> = sqlx::query_as(&format!("{CHARGE_SELECT} WHERE c.id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let installments: Vec<InstallmentRow> = sqlx::query_as(&format!(
        "{INSTALLMENT_SELECT} WHERE charge_id = ?1 ORDER BY installment_number"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let installments = installments
        .into_iter()
        .map(InstallmentRow::into_installment)
        .collect::<DbResult<Vec<_>>>()?;

    row.into_charge(installments).map(Some)
}

/// Loads every charge matching `filter`, oldest first.
pub(crate) async fn fetch_charges(
    conn: &mut SqliteConnection,
    filter: ChargeFilter,
) -> DbResult<Vec<Charge>> {
    let charge_sql = format!(
        "{CHARGE_SELECT} {} ORDER BY c.created_at, c.id",
        filter.where_clause()
    );
    let installment_sql = format!(
        "{INSTALLMENT_SELECT} {} ORDER BY charge_id, installment_number",
        filter.installment_clause()
    );

    let mut charge_query = sqlx::query_as::<_, ChargeRow>(&charge_sql);
    let mut installment_query = sqlx::query_as::<_, InstallmentRow>(&installment_sql);
    if let Some(origin_id) = filter.origin_id() {
        charge_query = charge_query.bind(origin_id);
        installment_query = installment_query.bind(origin_id);
    }

    let rows = charge_query.fetch_all(&mut *conn).await?;
    let installment_rows = installment_query.fetch_all(&mut *conn).await?;

    let mut by_charge: HashMap<String, Vec<Installment>> = HashMap::new();
    for row in installment_rows {
        let installment = row.into_installment()?;
        by_charge
            .entry(installment.charge_id.clone())
            .or_default()
            .push(installment);
    }

    rows.into_iter()
        .map(|row| {
            let installments = by_charge.remove(&row.id).unwrap_or_default();
            row.into_charge(installments)
        })
        .collect()
}

/// Inserts a new charge and its installments.
pub(crate) async fn insert_charge(conn: &mut SqliteConnection, charge: &Charge) -> DbResult<()> {
    charge.check_invariants()?;

    debug!(id = %charge.id, reference = %charge.reference, "Inserting charge");

    sqlx::query(
        r#"
        INSERT INTO charges (
            id, sale_id, service_record_id, reference, due_date,
            amount_cents, amount_paid_cents, status, payment_method,
            is_installment, installment_count, installment_value_cents,
            payment_confirmed_at, created_at, updated_at, version
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12,
            ?13, ?14, ?15, ?16
        )
        "#,
    )
    .bind(&charge.id)
    .bind(charge.origin.sale_id())
    .bind(charge.origin.service_id())
    .bind(&charge.reference)
    .bind(charge.due_date)
    .bind(charge.amount.cents())
    .bind(charge.amount_paid.cents())
    .bind(charge.status)
    .bind(charge.payment_method)
    .bind(charge.is_installment)
    .bind(to_i64(charge.installment_count))
    .bind(charge.installment_value.cents())
    .bind(charge.payment_confirmed_at)
    .bind(charge.created_at)
    .bind(charge.updated_at)
    .bind(charge.version)
    .execute(&mut *conn)
    .await?;

    sync_installments(conn, charge).await
}

/// Writes `charge` back if nobody else has since it was loaded.
///
/// Returns the new version. The caller's `charge.version` must be the
/// version it was loaded with.
pub(crate) async fn update_charge(conn: &mut SqliteConnection, charge: &Charge) -> DbResult<i64> {
    charge.check_invariants()?;

    let result = sqlx::query(
        r#"
        UPDATE charges SET
            reference = ?1,
            due_date = ?2,
            amount_cents = ?3,
            amount_paid_cents = ?4,
            status = ?5,
            payment_method = ?6,
            is_installment = ?7,
            installment_count = ?8,
            installment_value_cents = ?9,
            payment_confirmed_at = ?10,
            updated_at = ?11,
            version = version + 1
        WHERE id = ?12 AND version = ?13
        "#,
    )
    .bind(&charge.reference)
    .bind(charge.due_date)
    .bind(charge.amount.cents())
    .bind(charge.amount_paid.cents())
    .bind(charge.status)
    .bind(charge.payment_method)
    .bind(charge.is_installment)
    .bind(to_i64(charge.installment_count))
    .bind(charge.installment_value.cents())
    .bind(charge.payment_confirmed_at)
    .bind(charge.updated_at)
    .bind(&charge.id)
    .bind(charge.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM charges WHERE id = ?1")
            .bind(&charge.id)
            .fetch_optional(&mut *conn)
            .await?;

        return match exists {
            None => Err(DbError::not_found("Charge", &charge.id)),
            Some(current) => {
                warn!(
                    id = %charge.id,
                    expected_version = charge.version,
                    current_version = current,
                    "Charge version conflict"
                );
                Err(DbError::version_conflict(&charge.id, charge.version))
            }
        };
    }

    sync_installments(conn, charge).await?;

    debug!(id = %charge.id, version = charge.version + 1, "Charge updated");
    Ok(charge.version + 1)
}

/// Makes the installment rows match `charge.installments`.
///
/// Rows beyond the current count are dropped; the rest are upserted by
/// `(charge_id, installment_number)`.
async fn sync_installments(conn: &mut SqliteConnection, charge: &Charge) -> DbResult<()> {
    let kept = i64::try_from(charge.installments.len())
        .map_err(|_| DbError::Internal("installment count overflow".to_string()))?;

    let removed = sqlx::query(
        "DELETE FROM charge_installments WHERE charge_id = ?1 AND installment_number > ?2",
    )
    .bind(&charge.id)
    .bind(kept)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    for installment in &charge.installments {
        sqlx::query(
            r#"
            INSERT INTO charge_installments (
                charge_id, installment_number, due_date,
                amount_cents, amount_paid_cents, status, payment_confirmed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (charge_id, installment_number) DO UPDATE SET
                due_date = excluded.due_date,
                amount_cents = excluded.amount_cents,
                amount_paid_cents = excluded.amount_paid_cents,
                status = excluded.status,
                payment_confirmed_at = excluded.payment_confirmed_at
            "#,
        )
        .bind(&charge.id)
        .bind(to_i64(installment.number))
        .bind(installment.due_date)
        .bind(installment.amount.cents())
        .bind(installment.amount_paid.cents())
        .bind(installment.status)
        .bind(installment.payment_confirmed_at)
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        id = %charge.id,
        written = charge.installments.len(),
        removed,
        "Installments synced"
    );
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for charge reads and administrative deletes.
///
/// Ledger mutations go through [`crate::BillingService`], which owns the
/// transaction; this type covers everything that does not need one.
#[derive(Debug, Clone)]
pub struct ChargeRepository {
    pool: SqlitePool,
}

impl ChargeRepository {
    /// Creates a new ChargeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ChargeRepository { pool }
    }

    /// Gets a charge by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Charge>> {
        let mut conn = self.pool.acquire().await?;
        fetch_charge(&mut *conn, id).await
    }

    /// Lists every charge, oldest first.
    pub async fn list(&self) -> DbResult<Vec<Charge>> {
        let mut conn = self.pool.acquire().await?;
        fetch_charges(&mut *conn, ChargeFilter::All).await
    }

    /// Lists the charges billing a sale.
    pub async fn list_for_sale(&self, sale_id: i64) -> DbResult<Vec<Charge>> {
        let mut conn = self.pool.acquire().await?;
        fetch_charges(&mut *conn, ChargeFilter::Sale(sale_id)).await
    }

    /// Lists the charges billing a service record.
    pub async fn list_for_service(&self, service_id: i64) -> DbResult<Vec<Charge>> {
        let mut conn = self.pool.acquire().await?;
        fetch_charges(&mut *conn, ChargeFilter::Service(service_id)).await
    }

    /// Inserts a charge built elsewhere (imports, seed data).
    pub async fn insert(&self, charge: &Charge) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_charge(&mut *tx, charge).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Saves a loaded-then-modified charge with the version check.
    ///
    /// Returns the new version.
    pub async fn save(&self, charge: &Charge) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let version = update_charge(&mut *tx, charge).await?;
        tx.commit().await?;
        Ok(version)
    }

    /// Physically deletes a charge and its installments.
    ///
    /// Administrative only; everyday removal is cancellation.
    pub async fn purge(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM charges WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Charge", id));
        }

        info!(id = %id, "Charge purged");
        Ok(())
    }

    /// Counts charges in a given persisted status.
    pub async fn count_by_status(&self, status: ChargeStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM charges WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use loja_core::{NewCharge, PaymentFlow};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    async fn db_with_sale(total_cents: i64) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.origins()
            .insert_sale(&SaleRef {
                id: 7,
                total: Money::from_cents(total_cents),
                cancelled: false,
            })
            .await
            .unwrap();
        db
    }

    fn opened(origin: ChargeOrigin, count: u32) -> Charge {
        Charge::open(
            "7c9e6679-7425-40de-944b-e07fc1f90ae7".to_string(),
            NewCharge {
                origin,
                reference: None,
                due_date: None,
                discount: Money::zero(),
                down_payment: Money::zero(),
                payment_method: PaymentMethod::Boleto,
                installment_count: count,
                installment_due_dates: Vec::new(),
                flow: PaymentFlow::Deferred,
            },
            at(2026, 1, 5),
        )
        .unwrap()
    }

    fn sale_origin(total_cents: i64) -> ChargeOrigin {
        ChargeOrigin::Sale(SaleRef {
            id: 7,
            total: Money::from_cents(total_cents),
            cancelled: false,
        })
    }

    #[tokio::test]
    async fn test_insert_and_load_roundtrip() {
        let db = db_with_sale(10000).await;
        let charge = opened(sale_origin(10000), 3);

        db.charges().insert(&charge).await.unwrap();
        let loaded = db.charges().get_by_id(&charge.id).await.unwrap().unwrap();

        assert_eq!(loaded, charge);
        assert_eq!(loaded.installments.len(), 3);
        assert_eq!(loaded.reference, "VENDA-7");
        assert_eq!(loaded.payment_method, PaymentMethod::Boleto);
    }

    #[tokio::test]
    async fn test_missing_charge_is_none() {
        let db = db_with_sale(100).await;
        assert!(db.charges().get_by_id("nope").await.unwrap().is_none());
        assert!(matches!(
            db.charges().purge("nope").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_rejects_stale_copy() {
        let db = db_with_sale(9000).await;
        let charge = opened(sale_origin(9000), 1);
        db.charges().insert(&charge).await.unwrap();

        let mut first = db.charges().get_by_id(&charge.id).await.unwrap().unwrap();
        let mut second = first.clone();

        first
            .apply_payment(Money::from_cents(1000), None, at(2026, 1, 6))
            .unwrap();
        assert_eq!(db.charges().save(&first).await.unwrap(), 1);

        second
            .apply_payment(Money::from_cents(2000), None, at(2026, 1, 6))
            .unwrap();
        let err = db.charges().save(&second).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::VersionConflict { expected_version: 0, .. }
        ));

        let stored = db.charges().get_by_id(&charge.id).await.unwrap().unwrap();
        assert_eq!(stored.amount_paid.cents(), 1000);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_shrinking_installments_drops_rows() {
        let db = db_with_sale(12000).await;
        let charge = opened(sale_origin(12000), 4);
        db.charges().insert(&charge).await.unwrap();

        let mut loaded = db.charges().get_by_id(&charge.id).await.unwrap().unwrap();
        loaded.installment_count = 2;
        loaded
            .regenerate_installments(&[], at(2026, 1, 6).date_naive())
            .unwrap();
        loaded.normalize_status(at(2026, 1, 6));
        db.charges().save(&loaded).await.unwrap();

        let rows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM charge_installments WHERE charge_id = ?1")
                .bind(&charge.id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn test_list_filters_by_origin_and_purge_cascades() {
        let db = db_with_sale(5000).await;
        db.origins()
            .insert_service(&ServiceRef {
                id: 3,
                total_price: Money::from_cents(4000),
            })
            .await
            .unwrap();

        let sale_charge = opened(sale_origin(5000), 2);
        let mut service_charge = opened(
            ChargeOrigin::Service(ServiceRef {
                id: 3,
                total_price: Money::from_cents(4000),
            }),
            1,
        );
        service_charge.id = "0f8fad5b-d9cb-469f-a165-70867728950e".to_string();

        db.charges().insert(&sale_charge).await.unwrap();
        db.charges().insert(&service_charge).await.unwrap();

        assert_eq!(db.charges().list().await.unwrap().len(), 2);
        let for_sale = db.charges().list_for_sale(7).await.unwrap();
        assert_eq!(for_sale.len(), 1);
        assert_eq!(for_sale[0].installments.len(), 2);
        assert_eq!(db.charges().list_for_service(3).await.unwrap().len(), 1);
        assert_eq!(
            db.charges()
                .count_by_status(ChargeStatus::Pending)
                .await
                .unwrap(),
            2
        );

        db.charges().purge(&sale_charge.id).await.unwrap();
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM charge_installments")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_origin_snapshot_follows_sale_table() {
        let db = db_with_sale(3000).await;
        let mut charge = opened(sale_origin(3000), 1);
        // Zero amount bills the sale total at read time.
        charge.amount = Money::zero();
        charge.installment_value = Money::zero();
        db.charges().insert(&charge).await.unwrap();

        db.origins()
            .update_sale_total(7, Money::from_cents(4500))
            .await
            .unwrap();

        let loaded = db.charges().get_by_id(&charge.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_amount().cents(), 4500);
    }
}
