//! # Billing Service
//!
//! Transaction boundary for every ledger mutation.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BillingService::apply_payment(id, amount, installment)                │
//! │                                                                         │
//! │   BEGIN                                                                 │
//! │     │                                                                   │
//! │     ├── fetch_charge(id)   charge + installments + origin snapshot     │
//! │     │                                                                   │
//! │     ├── charge.apply_payment(...)   pure loja-core rule                │
//! │     │        │                                                          │
//! │     │        └── Err ──► drop tx (ROLLBACK) ──► DbError::Core          │
//! │     │                                                                   │
//! │     ├── update_charge(charge)   WHERE id = ? AND version = ?            │
//! │     │        │                                                          │
//! │     │        └── 0 rows ──► ROLLBACK ──► DbError::VersionConflict      │
//! │     │                                                                   │
//! │   COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads (summary, reports, payment codes) load a fresh snapshot and run the
//! matching pure function from loja-core.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use loja_core::pix::payment_code_for_charge;
use loja_core::report::{delinquency_report, is_origin_settled};
use loja_core::{
    Charge, ChargeEdit, ChargeOrigin, ChargeStatement, ChargeStatus, CoreError, CoreResult,
    DelinquencyReport, InstallmentDiff, LedgerSummary, Money, NewCharge, PaymentCode,
    PaymentOutcome, PixSettings,
};

use crate::error::{DbError, DbResult};
use crate::repository::charge::{
    fetch_charge, fetch_charges, insert_charge, update_charge, ChargeFilter, ChargeRepository,
};
use crate::repository::origin::{fetch_sale, fetch_service};
use crate::repository::settings::fetch_or_init;

/// Ledger operations over the database.
///
/// ## Example
/// ```rust,ignore
/// let billing = db.billing(config.pix.clone());
///
/// let charge = billing.open_charge(new_charge).await?;
/// let outcome = billing.apply_payment(&charge.id, Money::parse("33,34")?, Some(3)).await?;
/// let code = billing.payment_code(&charge.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct BillingService {
    pool: SqlitePool,
    pix_defaults: PixSettings,
    fixed_now: Option<DateTime<Utc>>,
}

impl BillingService {
    pub fn new(pool: SqlitePool, pix_defaults: PixSettings) -> Self {
        BillingService {
            pool,
            pix_defaults,
            fixed_now: None,
        }
    }

    /// Pins the clock (backfills, tests).
    pub fn at_time(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Opens a charge for a sale or service.
    ///
    /// The origin snapshot in `new` is replaced with the one currently
    /// stored, so the amount is always computed from the live sale total.
    pub async fn open_charge(&self, mut new: NewCharge) -> DbResult<Charge> {
        let now = self.now();
        let mut tx = self.pool.begin().await?;

        new.origin = match new.origin {
            ChargeOrigin::Sale(sale) => fetch_sale(&mut *tx, sale.id)
                .await?
                .map(ChargeOrigin::Sale)
                .ok_or_else(|| DbError::not_found("Sale", sale.id.to_string()))?,
            ChargeOrigin::Service(service) => fetch_service(&mut *tx, service.id)
                .await?
                .map(ChargeOrigin::Service)
                .ok_or_else(|| DbError::not_found("Service record", service.id.to_string()))?,
        };

        let charge = Charge::open(Uuid::new_v4().to_string(), new, now)?;
        insert_charge(&mut *tx, &charge).await?;
        tx.commit().await?;

        info!(
            id = %charge.id,
            reference = %charge.reference,
            amount = charge.amount.cents(),
            paid = charge.amount_paid.cents(),
            installments = charge.installment_count,
            status = %charge.status,
            "Charge opened"
        );
        Ok(charge)
    }

    /// Records a payment against the charge or one of its installments.
    pub async fn apply_payment(
        &self,
        id: &str,
        amount: Money,
        installment: Option<u32>,
    ) -> DbResult<PaymentOutcome> {
        let (_, outcome) = self
            .mutate(id, "payment", |charge, now| {
                charge.apply_payment(amount, installment, now)
            })
            .await?;

        info!(
            id = %id,
            installment = ?installment,
            applied = outcome.applied.cents(),
            balance = outcome.balance_after.cents(),
            status = %outcome.status,
            "Payment recorded"
        );
        Ok(outcome)
    }

    /// Marks the charge (and every installment) as fully paid.
    pub async fn mark_paid(&self, id: &str) -> DbResult<Charge> {
        let (charge, ()) = self
            .mutate(id, "mark_paid", |charge, now| charge.mark_fully_paid(now))
            .await?;
        Ok(charge)
    }

    /// Cancels the charge.
    pub async fn cancel(&self, id: &str) -> DbResult<Charge> {
        let (charge, ()) = self
            .mutate(id, "cancel", |charge, now| charge.cancel(now))
            .await?;
        Ok(charge)
    }

    /// Applies the charge edit form.
    pub async fn edit(&self, id: &str, edit: ChargeEdit) -> DbResult<Charge> {
        let (charge, ()) = self
            .mutate(id, "edit", |charge, now| charge.apply_edit(edit, now))
            .await?;
        Ok(charge)
    }

    /// Edits a single installment's amount and (optionally) due date.
    pub async fn edit_installment(
        &self,
        id: &str,
        number: u32,
        amount: Money,
        due_date: Option<NaiveDate>,
    ) -> DbResult<Charge> {
        let (charge, ()) = self
            .mutate(id, "edit_installment", |charge, now| {
                charge.edit_installment(number, amount, due_date, now)
            })
            .await?;
        Ok(charge)
    }

    /// Re-splits the charge into `count` installments.
    ///
    /// Payments already recorded are carried over (see
    /// [`Charge::regenerate_installments`]).
    pub async fn regenerate(
        &self,
        id: &str,
        count: u32,
        due_dates: &[Option<NaiveDate>],
    ) -> DbResult<(Charge, InstallmentDiff)> {
        self.mutate(id, "regenerate", |charge, now| {
            if charge.status == ChargeStatus::Cancelled {
                return Err(CoreError::ChargeCancelled {
                    charge_id: charge.id.clone(),
                });
            }
            charge.installment_count = count;
            charge.is_installment = count > 1;
            let diff = charge.regenerate_installments(due_dates, now.date_naive())?;
            charge.updated_at = now;
            charge.normalize_status(now);
            Ok(diff)
        })
        .await
    }

    /// Re-derives statuses of every open charge (e.g. `pendente` that went
    /// past due becomes `atrasado`). Returns how many charges changed.
    pub async fn refresh_statuses(&self) -> DbResult<usize> {
        let now = self.now();
        let mut tx = self.pool.begin().await?;
        let charges = fetch_charges(&mut *tx, ChargeFilter::All).await?;

        let mut changed = 0;
        for charge in charges.into_iter().filter(|c| !c.status.is_terminal()) {
            let mut refreshed = charge.clone();
            refreshed.normalize_status(now);
            if refreshed.status == charge.status && refreshed.installments == charge.installments
            {
                continue;
            }
            refreshed.updated_at = now;
            update_charge(&mut *tx, &refreshed).await?;
            changed += 1;
        }

        tx.commit().await?;
        info!(changed, "Charge statuses refreshed");
        Ok(changed)
    }

    /// Physically deletes a charge.
    pub async fn purge(&self, id: &str) -> DbResult<()> {
        ChargeRepository::new(self.pool.clone()).purge(id).await
    }

    /// Loads, mutates and saves one charge inside a transaction.
    async fn mutate<T, F>(
        &self,
        id: &str,
        operation: &'static str,
        apply: F,
    ) -> DbResult<(Charge, T)>
    where
        F: FnOnce(&mut Charge, DateTime<Utc>) -> CoreResult<T>,
    {
        let now = self.now();
        let mut tx = self.pool.begin().await?;

        let mut charge = fetch_charge(&mut *tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Charge", id))?;
        debug!(id = %id, operation, version = charge.version, "Charge loaded");

        let value = apply(&mut charge, now)?;
        charge.version = update_charge(&mut *tx, &charge).await?;
        tx.commit().await?;

        info!(
            id = %id,
            operation,
            status = %charge.status,
            version = charge.version,
            "Charge saved"
        );
        Ok((charge, value))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// PIX settings in effect (stored row, seeded from env defaults).
    pub async fn pix_settings(&self) -> DbResult<PixSettings> {
        let mut conn = self.pool.acquire().await?;
        fetch_or_init(&mut *conn, &self.pix_defaults).await
    }

    /// PIX payload and QR URL for the outstanding balance.
    ///
    /// `None` when PIX is disabled, the charge is cancelled or nothing is
    /// owed.
    pub async fn payment_code(&self, id: &str) -> DbResult<Option<PaymentCode>> {
        let mut conn = self.pool.acquire().await?;
        let settings = fetch_or_init(&mut *conn, &self.pix_defaults).await?;
        let charge = fetch_charge(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Charge", id))?;

        Ok(payment_code_for_charge(&charge, &settings)?)
    }

    /// Totals for the charges page header.
    pub async fn summary(&self) -> DbResult<LedgerSummary> {
        let mut conn = self.pool.acquire().await?;
        let charges = fetch_charges(&mut *conn, ChargeFilter::All).await?;
        Ok(LedgerSummary::from_charges(&charges, self.today()))
    }

    /// Open debts, most overdue first.
    pub async fn delinquency_report(&self) -> DbResult<DelinquencyReport> {
        let mut conn = self.pool.acquire().await?;
        let charges = fetch_charges(&mut *conn, ChargeFilter::All).await?;
        Ok(delinquency_report(&charges, self.today()))
    }

    /// Partial-payment receipt data.
    pub async fn statement(&self, id: &str) -> DbResult<ChargeStatement> {
        let mut conn = self.pool.acquire().await?;
        let charge = fetch_charge(&mut *conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Charge", id))?;
        Ok(ChargeStatement::of(&charge))
    }

    /// True when the sale has live charges and all of them are paid.
    pub async fn is_sale_settled(&self, sale_id: i64) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let charges = fetch_charges(&mut *conn, ChargeFilter::Sale(sale_id)).await?;
        Ok(is_origin_settled(&charges))
    }

    /// True when the service record has live charges and all are paid.
    pub async fn is_service_settled(&self, service_id: i64) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let charges = fetch_charges(&mut *conn, ChargeFilter::Service(service_id)).await?;
        Ok(is_origin_settled(&charges))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
