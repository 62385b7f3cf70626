//! # loja-core: Pure Billing Ledger for LojaWeb
//!
//! This crate is the **heart** of the back-office billing flow. It contains
//! the ledger rules and the PIX payment-code codec as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     LojaWeb Billing Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Back-office CRUD + receipt templates               │   │
//! │  │     Sales ──► Services ──► Charges page ──► Receipt / QR        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                loja-db :: BillingService                        │   │
//! │  │   open_charge, apply_payment, cancel, edit, payment_code        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ loja-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌────────────┐ ┌──────────┐ ┌───────┐ ┌────────┐  │   │
//! │  │  │  money  │ │installments│ │  ledger  │ │  pix  │ │ crc16  │  │   │
//! │  │  │  text   │ │   split    │ │  status  │ │  TLV  │ │ CCITT  │  │   │
//! │  │  └─────────┘ └────────────┘ └──────────┘ └───────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Charge, Installment, statuses, payment methods
//! - [`money`] - Money type with integer centavos (no floating point!)
//! - [`text`] - ASCII folding for PIX text fields
//! - [`crc16`] - CRC-16/CCITT-FALSE checksum
//! - [`pix`] - PIX BR Code (EMV-QRCPS-MPM) encoder and re-parser
//! - [`origin`] - Charge origin (sale or service) and the total resolver
//! - [`installments`] - Installment splitting and regeneration
//! - [`ledger`] - Payment application and status resolution
//! - [`report`] - Dashboard totals, delinquency, statements
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use loja_core::money::Money;
//! use loja_core::installments::split_installments;
//! use chrono::NaiveDate;
//!
//! let first_due = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
//! let plan = split_installments(Money::from_cents(10000), 3, first_due, &[]).unwrap();
//!
//! let amounts: Vec<i64> = plan.iter().map(|p| p.amount.cents()).collect();
//! assert_eq!(amounts, vec![3333, 3333, 3334]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod crc16;
pub mod error;
pub mod installments;
pub mod ledger;
pub mod money;
pub mod origin;
pub mod pix;
pub mod report;
pub mod text;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ConsistencyError, CoreError, CoreResult, ValidationError};
pub use installments::{InstallmentDiff, InstallmentPlan};
pub use ledger::{ChargeEdit, NewCharge, PaymentFlow, PaymentOutcome};
pub use money::Money;
pub use origin::{ChargeOrigin, SaleRef, ServiceRef};
pub use pix::{PaymentCode, PixSettings};
pub use report::{ChargeStatement, DelinquencyLine, DelinquencyReport, LedgerSummary};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Days between consecutive installment due dates.
pub const INSTALLMENT_INTERVAL_DAYS: i64 = 30;

/// Default term for a deferred ("a prazo") charge without an explicit due date.
pub const DEFERRED_DUE_DAYS: i64 = 30;

/// Window, in days, used by the dashboard "due soon" total.
pub const DUE_SOON_WINDOW_DAYS: i64 = 7;

/// Maximum number of installments a charge can be split into.
///
/// ## Business Reason
/// Keeps a mistyped count (e.g. 120 instead of 12) from generating a
/// ten-year schedule.
pub const MAX_INSTALLMENT_COUNT: u32 = 60;
