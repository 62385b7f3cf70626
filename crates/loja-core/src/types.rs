//! # Domain Types
//!
//! Billing ledger types shared by loja-core and loja-db.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌─────────────────┐                         │
//! │  │     Charge      │ 1    n │   Installment   │                         │
//! │  │  ─────────────  │───────►│  ─────────────  │                         │
//! │  │  id (UUID)      │        │  number (1..n)  │                         │
//! │  │  origin         │        │  due_date       │                         │
//! │  │  reference      │        │  amount         │                         │
//! │  │  amount / paid  │        │  amount_paid    │                         │
//! │  │  status         │        │  status         │                         │
//! │  │  version        │        └─────────────────┘                         │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ChargeStatus   │   │    UiStatus     │   │ PaymentMethod   │       │
//! │  │  (persisted)    │   │  (display only) │   │  ─────────────  │       │
//! │  │  pendente       │   │  pendente       │   │  credito        │       │
//! │  │  parcial        │──►│  recebido       │   │  dinheiro       │       │
//! │  │  confirmado     │   │  vencido        │   │  pix (default)  │       │
//! │  │  atrasado       │   │  cancelado      │   │  boleto         │       │
//! │  │  cancelado      │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Installment Invariant
//! `installment_count > 1` means exactly that many [`Installment`] rows,
//! numbered `1..=count`, summing to the charge amount. A count of 1 means
//! the charge is its own single installment and has no rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::origin::ChargeOrigin;

// =============================================================================
// Charge Status
// =============================================================================

/// Persisted status of a charge or installment.
///
/// ## State Machine
/// ```text
///                 pay (partial)          pay (rest)
///   ┌──────────┐ ─────────────► ┌───────┐ ─────────► ┌────────────┐
///   │ pendente │                │parcial│            │ confirmado │
///   └────┬─────┘                └───────┘            └────────────┘
///        │ due date passed, nothing paid
///        ▼
///   ┌──────────┐
///   │ atrasado │         any non-terminal ──cancel──► cancelado
///   └──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum ChargeStatus {
    #[serde(rename = "pendente")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "pendente"))]
    Pending,
    #[serde(rename = "parcial")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "parcial"))]
    Partial,
    #[serde(rename = "confirmado")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "confirmado"))]
    Confirmed,
    #[serde(rename = "atrasado")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "atrasado"))]
    Overdue,
    #[serde(rename = "cancelado")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "cancelado"))]
    Cancelled,
}

impl ChargeStatus {
    /// Wire string, as stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "pendente",
            ChargeStatus::Partial => "parcial",
            ChargeStatus::Confirmed => "confirmado",
            ChargeStatus::Overdue => "atrasado",
            ChargeStatus::Cancelled => "cancelado",
        }
    }

    /// Cancellation is terminal.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ChargeStatus::Cancelled)
    }
}

impl Default for ChargeStatus {
    fn default() -> Self {
        ChargeStatus::Pending
    }
}

impl std::fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// UI Status
// =============================================================================

/// Display status shown on the charges page. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum UiStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "recebido")]
    Received,
    #[serde(rename = "vencido")]
    Overdue,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl UiStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            UiStatus::Pending => "pendente",
            UiStatus::Received => "recebido",
            UiStatus::Overdue => "vencido",
            UiStatus::Cancelled => "cancelado",
        }
    }
}

/// Pure mapping from the persisted status.
///
/// A partially paid charge still shows as pending; use
/// [`Charge::ui_status`] when the due date must be taken into account.
impl From<ChargeStatus> for UiStatus {
    fn from(status: ChargeStatus) -> Self {
        match status {
            ChargeStatus::Pending | ChargeStatus::Partial => UiStatus::Pending,
            ChargeStatus::Confirmed => UiStatus::Received,
            ChargeStatus::Overdue => UiStatus::Overdue,
            ChargeStatus::Cancelled => UiStatus::Cancelled,
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Credit card.
    Credito,
    /// Cash.
    Dinheiro,
    /// PIX instant transfer.
    Pix,
    /// Bank slip.
    Boleto,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Credito => "credito",
            PaymentMethod::Dinheiro => "dinheiro",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Boleto => "boleto",
        }
    }

    /// Parses a form value, falling back to PIX for anything unknown.
    pub fn from_form(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "credito" => PaymentMethod::Credito,
            "dinheiro" => PaymentMethod::Dinheiro,
            "boleto" => PaymentMethod::Boleto,
            _ => PaymentMethod::Pix,
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Pix
    }
}

// =============================================================================
// Charge
// =============================================================================

/// A billable obligation tied to exactly one sale or service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Charge {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The sale or service this charge bills.
    pub origin: ChargeOrigin,

    /// Free-text identifier shown to the payer (also the PIX txid).
    pub reference: String,

    /// Due date; the earliest installment due date when installments exist.
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,

    /// Declared amount. Zero means "bill the origin total".
    pub amount: Money,

    /// Cumulative amount paid.
    pub amount_paid: Money,

    pub status: ChargeStatus,
    pub payment_method: PaymentMethod,

    pub is_installment: bool,

    /// Number of installments (>= 1).
    pub installment_count: u32,

    /// Nominal value of each installment (the floored base slice).
    pub installment_value: Money,

    #[ts(as = "Option<String>")]
    pub payment_confirmed_at: Option<DateTime<Utc>>,

    /// Installment rows, ordered by number. Empty when `installment_count == 1`.
    pub installments: Vec<Installment>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency counter, bumped on every save.
    pub version: i64,
}

impl Charge {
    /// True when the charge is split into installment rows.
    pub fn has_installments(&self) -> bool {
        !self.installments.is_empty()
    }

    pub fn installment(&self, number: u32) -> Option<&Installment> {
        self.installments.iter().find(|i| i.number == number)
    }

    pub fn installment_mut(&mut self, number: u32) -> Option<&mut Installment> {
        self.installments.iter_mut().find(|i| i.number == number)
    }
}

// =============================================================================
// Installment
// =============================================================================

/// One scheduled slice of a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Installment {
    pub charge_id: String,

    /// 1-based sequence number, unique per charge.
    pub number: u32,

    #[ts(as = "String")]
    pub due_date: NaiveDate,

    pub amount: Money,

    /// Never exceeds `amount`.
    pub amount_paid: Money,

    pub status: ChargeStatus,

    #[ts(as = "Option<String>")]
    pub payment_confirmed_at: Option<DateTime<Utc>>,
}

impl Installment {
    /// What is still owed on this installment.
    pub fn balance(&self) -> Money {
        self.amount - self.amount_paid
    }
}
