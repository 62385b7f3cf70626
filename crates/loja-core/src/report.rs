//! # Reports
//!
//! Read-only aggregations over charges: dashboard totals, the delinquency
//! report, partial-payment statements and the "is this sale settled" check.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  LedgerSummary (charges page header)                             │
//! │                                                                  │
//! │   vencido  + balance > 0                 ──► overdue_total       │
//! │   pendente + due in [today, today+7]                             │
//! │            + balance > 0                 ──► due_soon_total      │
//! │   recebido                               ──► received_total      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Charge, ChargeStatus, UiStatus};
use crate::DUE_SOON_WINDOW_DAYS;

// =============================================================================
// Dashboard Summary
// =============================================================================

/// Totals shown above the charges list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerSummary {
    /// Outstanding balance of overdue charges.
    pub overdue_total: Money,
    /// Outstanding balance due within the next 7 days.
    pub due_soon_total: Money,
    /// Totals of charges fully received.
    pub received_total: Money,
}

impl LedgerSummary {
    pub fn from_charges(charges: &[Charge], today: NaiveDate) -> Self {
        let window_end = today
            .checked_add_signed(Duration::days(DUE_SOON_WINDOW_DAYS))
            .unwrap_or(NaiveDate::MAX);
        let mut summary = LedgerSummary::default();

        for charge in charges {
            let balance = charge.balance();
            match charge.ui_status(today) {
                UiStatus::Overdue if balance.is_positive() => summary.overdue_total += balance,
                UiStatus::Pending if balance.is_positive() => {
                    if charge
                        .due_date
                        .is_some_and(|due| today <= due && due <= window_end)
                    {
                        summary.due_soon_total += balance;
                    }
                }
                UiStatus::Received => summary.received_total += charge.total_amount(),
                _ => {}
            }
        }

        summary
    }
}

// =============================================================================
// Delinquency Report
// =============================================================================

/// One open debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DelinquencyLine {
    pub charge_id: String,
    pub reference: String,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub balance: Money,
    /// Zero when not yet due (or no due date).
    pub days_overdue: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DelinquencyReport {
    pub lines: Vec<DelinquencyLine>,
    pub total: Money,
}

/// Every non-cancelled charge that still has something owed, most overdue
/// first.
pub fn delinquency_report(charges: &[Charge], today: NaiveDate) -> DelinquencyReport {
    let mut lines: Vec<DelinquencyLine> = charges
        .iter()
        .filter(|charge| charge.status != ChargeStatus::Cancelled)
        .filter(|charge| charge.balance().is_positive())
        .map(|charge| DelinquencyLine {
            charge_id: charge.id.clone(),
            reference: charge.reference.clone(),
            due_date: charge.due_date,
            balance: charge.balance(),
            days_overdue: charge
                .due_date
                .filter(|due| *due < today)
                .map(|due| (today - due).num_days())
                .unwrap_or(0),
        })
        .collect();

    lines.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue));
    let total = lines.iter().map(|line| line.balance).sum();

    DelinquencyReport { lines, total }
}

// =============================================================================
// Statements
// =============================================================================

/// Data printed on a partial-payment receipt: total - paid = balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChargeStatement {
    pub charge_id: String,
    pub reference: String,
    pub total: Money,
    pub paid: Money,
    pub balance: Money,
}

impl ChargeStatement {
    pub fn of(charge: &Charge) -> Self {
        ChargeStatement {
            charge_id: charge.id.clone(),
            reference: charge.reference.clone(),
            total: charge.total_amount(),
            paid: charge.amount_paid,
            balance: charge.balance(),
        }
    }
}

/// True when a sale or service has at least one live charge and every live
/// charge is paid in full. Cancelled charges are ignored.
pub fn is_origin_settled(charges: &[Charge]) -> bool {
    let mut live = charges
        .iter()
        .filter(|charge| charge.status != ChargeStatus::Cancelled)
        .peekable();

    live.peek().is_some() && live.all(|charge| charge.amount_paid >= charge.total_amount())
}

// =============================================================================
// Unit Tests
// =============================================================================
