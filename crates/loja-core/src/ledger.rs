//! # Ledger State Resolver
//!
//! Balances, payment application and status derivation for charges and
//! their installments.
//!
//! ## Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  normalize_status(now)                                                  │
//! │                                                                         │
//! │  1. cancelado?  ──yes──► clear stamp, stop (installments untouched)     │
//! │                                                                         │
//! │  2. each installment:                                                   │
//! │       paid >= amount  → confirmado (stamp once)                         │
//! │       paid > 0        → parcial                                         │
//! │       due < today     → atrasado                                        │
//! │       otherwise       → pendente                                        │
//! │     charge.amount = Σ amount, charge.paid = Σ paid,                     │
//! │     charge.due    = min(due)                                            │
//! │                                                                         │
//! │  3. charge (balance = total - paid):                                    │
//! │       balance <= 0    → confirmado (stamp once)                         │
//! │       paid > 0        → parcial                                         │
//! │       due < today     → atrasado                                        │
//! │       otherwise       → pendente                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payments Are Monotone
//! A payment never lowers what is already recorded as paid and never pushes
//! a row past its cap:
//!
//! ```text
//! new_paid = max(paid, min(cap, paid + amount))
//! ```
//!
//! Every operation here takes `now` from the caller; nothing reads the clock.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ConsistencyError, CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::origin::ChargeOrigin;
use crate::types::{Charge, ChargeStatus, PaymentMethod, UiStatus};
use crate::validation::{
    validate_covers_paid, validate_installment_count, validate_non_negative,
    validate_payment_amount, validate_reference,
};
use crate::DEFERRED_DUE_DAYS;

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// How a sale or service is being paid when its charge is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFlow {
    /// "À vista": paid in full at the counter.
    Upfront,
    /// "A prazo": billed for later, due in 30 days unless a date is given.
    Deferred,
}

/// Everything needed to open a charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCharge {
    pub origin: ChargeOrigin,
    /// Defaults to `VENDA-{id}` / `SERV-{id}`.
    pub reference: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub discount: Money,
    /// Paid when the charge is opened (deferred flow only).
    pub down_payment: Money,
    pub payment_method: PaymentMethod,
    pub installment_count: u32,
    /// Optional per-installment due dates, by position.
    pub installment_due_dates: Vec<Option<NaiveDate>>,
    pub flow: PaymentFlow,
}

/// A full edit of the charge form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeEdit {
    pub reference: String,
    pub payment_method: PaymentMethod,
    pub due_date: Option<NaiveDate>,
    /// New declared amount. Zero means "bill the origin total".
    pub amount: Money,
    /// Added to what is already paid.
    pub paid_increment: Money,
    pub installment_count: u32,
    pub installment_due_dates: Vec<Option<NaiveDate>>,
}

/// Result of [`Charge::apply_payment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentOutcome {
    /// What was actually recorded after capping.
    pub applied: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub status: ChargeStatus,
}

/// `max(paid, min(cap, paid + amount))`, saturating at the `i64` edges.
fn capped_add(paid: Money, amount: Money, cap: Money) -> Money {
    paid.max(cap.min(paid.saturating_add(amount)))
}

fn is_past_due(due_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    due_date.is_some_and(|due| due < today)
}

// =============================================================================
// Charge Operations
// =============================================================================

impl Charge {
    /// What is still owed: `total - paid`. Negative means overpaid.
    pub fn balance(&self) -> Money {
        self.total_amount() - self.amount_paid
    }

    /// Opens a charge for a sale or service.
    ///
    /// ## Flow
    /// ```text
    /// origin total - discount ──► amount
    ///        │
    ///        ├── Upfront  → due today, paid in full
    ///        └── Deferred → due in 30 days (or given), down payment applied
    ///        │
    ///        ▼
    /// split into installments ──► allocate paid ──► normalize
    /// ```
    pub fn open(id: String, new: NewCharge, now: DateTime<Utc>) -> CoreResult<Charge> {
        validate_non_negative(new.discount, "discount")?;
        validate_non_negative(new.down_payment, "down payment")?;
        validate_installment_count(new.installment_count)?;

        if let ChargeOrigin::Sale(sale) = &new.origin {
            if sale.cancelled {
                return Err(CoreError::OriginCancelled { sale_id: sale.id });
            }
        }

        let origin_total = new.origin.billable_total();
        // A zero amount reads as "bill the origin", so a discount may not
        // consume the whole total.
        if new.discount.is_positive() && new.discount >= origin_total {
            return Err(ValidationError::OutOfRange {
                field: "discount".to_string(),
                min: 0,
                max: (origin_total.cents() - 1).max(0),
            }
            .into());
        }
        let amount = origin_total - new.discount;

        let reference = match new.reference.as_deref().map(str::trim) {
            Some(typed) if !typed.is_empty() => validate_reference(typed)?,
            _ => new.origin.default_reference(),
        };

        let today = now.date_naive();
        let due_date = match new.flow {
            PaymentFlow::Upfront => new.due_date.or(Some(today)),
            PaymentFlow::Deferred => match new.due_date {
                Some(date) => Some(date),
                None => today.checked_add_signed(Duration::days(DEFERRED_DUE_DAYS)),
            },
        };

        let mut charge = Charge {
            id,
            origin: new.origin,
            reference,
            due_date,
            amount,
            amount_paid: Money::zero(),
            status: ChargeStatus::Pending,
            payment_method: new.payment_method,
            is_installment: new.installment_count > 1,
            installment_count: new.installment_count,
            installment_value: amount,
            payment_confirmed_at: None,
            installments: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        charge.regenerate_installments(&new.installment_due_dates, today)?;

        match new.flow {
            PaymentFlow::Upfront => {
                let total = charge.total_amount();
                charge.allocate_paid(total);
            }
            PaymentFlow::Deferred => {
                charge.allocate_paid(new.down_payment);
            }
        }

        charge.normalize_status(now);
        Ok(charge)
    }

    /// Re-derives installment and charge statuses from amounts and dates.
    pub fn normalize_status(&mut self, now: DateTime<Utc>) {
        if self.status == ChargeStatus::Cancelled {
            self.payment_confirmed_at = None;
            return;
        }

        let today = now.date_naive();

        if self.has_installments() {
            for installment in self.installments.iter_mut() {
                if installment.amount_paid >= installment.amount {
                    installment.status = ChargeStatus::Confirmed;
                    installment.payment_confirmed_at.get_or_insert(now);
                    continue;
                }

                installment.payment_confirmed_at = None;
                installment.status = if installment.amount_paid.is_positive() {
                    ChargeStatus::Partial
                } else if installment.due_date < today {
                    ChargeStatus::Overdue
                } else {
                    ChargeStatus::Pending
                };
            }

            self.amount = self.installments.iter().map(|i| i.amount).sum();
            self.amount_paid = self.installments.iter().map(|i| i.amount_paid).sum();
            self.due_date = self.installments.iter().map(|i| i.due_date).min();
        }

        if !self.balance().is_positive() {
            self.status = ChargeStatus::Confirmed;
            self.payment_confirmed_at.get_or_insert(now);
            return;
        }

        self.payment_confirmed_at = None;
        self.status = if self.amount_paid.is_positive() {
            ChargeStatus::Partial
        } else if is_past_due(self.due_date, today) {
            ChargeStatus::Overdue
        } else {
            ChargeStatus::Pending
        };
    }

    /// Records a payment.
    ///
    /// A split charge needs the installment number; an unsplit charge
    /// accepts `None` (or `Some(1)`, the charge being its own installment).
    ///
    /// ## Example
    /// ```rust,ignore
    /// let outcome = charge.apply_payment(Money::from_cents(3334), Some(3), now)?;
    /// assert_eq!(outcome.status, ChargeStatus::Partial);
    /// ```
    pub fn apply_payment(
        &mut self,
        amount: Money,
        installment_number: Option<u32>,
        now: DateTime<Utc>,
    ) -> CoreResult<PaymentOutcome> {
        validate_payment_amount(amount)?;
        self.ensure_open()?;

        let balance_before = self.balance();

        let applied = if self.has_installments() {
            let number = installment_number.ok_or_else(|| ValidationError::Required {
                field: "installment number".to_string(),
            })?;
            let charge_id = self.id.clone();
            let installment = self
                .installment_mut(number)
                .ok_or(CoreError::InstallmentNotFound { charge_id, number })?;

            let before = installment.amount_paid;
            installment.amount_paid = capped_add(before, amount, installment.amount);
            installment.amount_paid - before
        } else {
            if let Some(number) = installment_number.filter(|n| *n != 1) {
                return Err(CoreError::InstallmentNotFound {
                    charge_id: self.id.clone(),
                    number,
                });
            }
            let before = self.amount_paid;
            self.amount_paid = capped_add(before, amount, self.total_amount());
            self.amount_paid - before
        };

        self.updated_at = now;
        self.normalize_status(now);

        Ok(PaymentOutcome {
            applied,
            balance_before,
            balance_after: self.balance(),
            status: self.status,
        })
    }

    /// Marks everything as paid.
    pub fn mark_fully_paid(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_open()?;

        if self.has_installments() {
            for installment in self.installments.iter_mut() {
                installment.amount_paid = installment.amount_paid.max(installment.amount);
                installment.status = ChargeStatus::Confirmed;
                installment.payment_confirmed_at.get_or_insert(now);
            }
        } else {
            self.amount_paid = self.amount_paid.max(self.total_amount());
        }

        self.payment_confirmed_at.get_or_insert(now);
        self.updated_at = now;
        self.normalize_status(now);
        Ok(())
    }

    /// Cancels the charge. Cancellation is terminal.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        match self.status {
            ChargeStatus::Cancelled => Err(CoreError::ChargeCancelled {
                charge_id: self.id.clone(),
            }),
            ChargeStatus::Confirmed => Err(CoreError::ChargeAlreadyConfirmed {
                charge_id: self.id.clone(),
            }),
            _ => {
                self.status = ChargeStatus::Cancelled;
                self.payment_confirmed_at = None;
                self.updated_at = now;
                Ok(())
            }
        }
    }

    /// Applies a full edit of the charge form.
    ///
    /// The new total may not drop below what was already paid; the edit is
    /// rejected and the charge left untouched.
    pub fn apply_edit(&mut self, edit: ChargeEdit, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_open()?;

        let reference = validate_reference(&edit.reference)?;
        validate_non_negative(edit.amount, "amount")?;
        validate_non_negative(edit.paid_increment, "paid increment")?;
        validate_installment_count(edit.installment_count)?;

        let new_total = if edit.amount.is_positive() {
            edit.amount
        } else {
            self.origin.billable_total()
        };
        validate_covers_paid(new_total, self.amount_paid, "amount")?;

        self.reference = reference;
        self.payment_method = edit.payment_method;
        self.due_date = edit.due_date;
        self.amount = edit.amount;
        self.installment_count = edit.installment_count;

        self.regenerate_installments(&edit.installment_due_dates, now.date_naive())?;
        self.allocate_paid(edit.paid_increment);

        self.updated_at = now;
        self.normalize_status(now);
        Ok(())
    }

    /// Edits one installment's amount and due date.
    ///
    /// The charge amount follows the new installment sum. A `None` due date
    /// keeps the current one. The amount may not go below what was already
    /// paid on that installment.
    pub fn edit_installment(
        &mut self,
        number: u32,
        amount: Money,
        due_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.ensure_open()?;
        validate_non_negative(amount, "installment amount")?;

        let charge_id = self.id.clone();
        let installment = self
            .installment_mut(number)
            .ok_or(CoreError::InstallmentNotFound { charge_id, number })?;
        validate_covers_paid(amount, installment.amount_paid, "installment amount")?;

        installment.amount = amount;
        if let Some(date) = due_date {
            installment.due_date = date;
        }

        self.updated_at = now;
        self.normalize_status(now);
        Ok(())
    }

    /// Display status for the charges page.
    ///
    /// Unlike `UiStatus::from(self.status)`, a partially paid charge past its
    /// due date shows as overdue here.
    pub fn ui_status(&self, today: NaiveDate) -> UiStatus {
        if self.status == ChargeStatus::Cancelled {
            UiStatus::Cancelled
        } else if !self.balance().is_positive() {
            UiStatus::Received
        } else if is_past_due(self.due_date, today) {
            UiStatus::Overdue
        } else {
            UiStatus::Pending
        }
    }

    /// Verifies the installment invariants.
    pub fn check_invariants(&self) -> CoreResult<()> {
        validate_installment_count(self.installment_count)?;

        let expected_rows = if self.installment_count > 1 {
            self.installment_count as usize
        } else {
            0
        };
        if self.installments.len() != expected_rows {
            return Err(ConsistencyError::InstallmentCountMismatch {
                charge_id: self.id.clone(),
                declared: self.installment_count,
                actual: self.installments.len(),
            }
            .into());
        }

        for (expected, installment) in (1u32..).zip(self.installments.iter()) {
            if installment.number != expected {
                return Err(ConsistencyError::InstallmentSequenceGap {
                    charge_id: self.id.clone(),
                    expected,
                    found: installment.number,
                }
                .into());
            }
            if installment.amount_paid > installment.amount {
                return Err(ConsistencyError::InstallmentOverpaid {
                    charge_id: self.id.clone(),
                    number: installment.number,
                }
                .into());
            }
        }

        if self.has_installments() {
            let sum: Money = self.installments.iter().map(|i| i.amount).sum();
            if sum != self.amount {
                return Err(ConsistencyError::InstallmentSumMismatch {
                    expected: self.amount,
                    actual: sum,
                }
                .into());
            }
        }

        Ok(())
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.status == ChargeStatus::Cancelled {
            return Err(CoreError::ChargeCancelled {
                charge_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Adds `increment` to what is paid: installments in order, each up to
    /// its amount, or the charge itself up to its total. Returns what fit.
    fn allocate_paid(&mut self, increment: Money) -> Money {
        if !increment.is_positive() {
            return Money::zero();
        }

        if !self.has_installments() {
            let before = self.amount_paid;
            self.amount_paid = capped_add(before, increment, self.total_amount());
            return self.amount_paid - before;
        }

        let mut remaining = increment;
        for installment in self.installments.iter_mut() {
            if !remaining.is_positive() {
                break;
            }
            let room = installment.amount.saturating_sub(installment.amount_paid);
            if room.is_positive() {
                let take = room.min(remaining);
                installment.amount_paid += take;
                remaining -= take;
            }
        }
        self.amount_paid = self.installments.iter().map(|i| i.amount_paid).sum();
        increment - remaining
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
