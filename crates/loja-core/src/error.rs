//! # Error Types
//!
//! Domain-specific error types for loja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  loja-core errors (this file)                                          │
//! │  ├── CoreError         - Ledger rule rejections                        │
//! │  ├── ValidationError   - User-correctable input failures               │
//! │  └── ConsistencyError  - Broken invariants (data/programmer error)     │
//! │                                                                         │
//! │  loja-db errors (separate crate)                                       │
//! │  └── DbError           - Database failures, version conflicts          │
//! │                                                                         │
//! │  Flow: ValidationError ─┐                                               │
//! │        ConsistencyError ┴─► CoreError ─► DbError ─► caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (charge id, installment number)
//! 3. Consistency failures are never "fixed" silently, they surface here
//! 4. A missing PIX key is NOT an error (the encoder returns `None`)

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The selected installment does not exist on this charge.
    ///
    /// ## User Workflow
    /// ```text
    /// Charge with 3 installments
    ///      │
    ///      ▼
    /// apply_payment(amount, installment: 5)
    ///      │
    ///      ▼
    /// InstallmentNotFound { charge_id, number: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Installment 5 not found"
    /// ```
    #[error("Installment {number} not found for charge {charge_id}")]
    InstallmentNotFound { charge_id: String, number: u32 },

    /// Charge is cancelled; cancellation is terminal.
    ///
    /// ## When This Occurs
    /// - Paying a cancelled charge
    /// - Editing a cancelled charge
    /// - Cancelling twice
    #[error("Charge {charge_id} is cancelled")]
    ChargeCancelled { charge_id: String },

    /// Charge is already fully paid and cannot be cancelled.
    #[error("Charge {charge_id} is already confirmed")]
    ChargeAlreadyConfirmed { charge_id: String },

    /// The origin sale was cancelled, so no new charge can be opened for it.
    #[error("Sale {sale_id} is cancelled")]
    OriginCancelled { sale_id: i64 },

    /// A PIX payload could not be parsed.
    #[error("Malformed PIX payload: {reason}")]
    MalformedPayload { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Invariant violation (wraps ConsistencyError).
    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),
}

impl CoreError {
    /// True when the caller can fix the problem by changing the input.
    pub fn is_user_correctable(&self) -> bool {
        !matches!(self, CoreError::Consistency(_))
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before ledger logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., non-numeric amount, bad date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A new amount would not cover what has already been received.
    #[error("{field} cannot be less than the {paid} already paid")]
    BelowAmountPaid { field: String, paid: Money },
}

// =============================================================================
// Consistency Error
// =============================================================================

/// Broken ledger invariants.
///
/// These never come from user input. They mean stored data or a code path
/// produced a state the ledger must not be in.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    /// Installment amounts do not add up to the charge total.
    #[error("Installments sum to {actual}, expected {expected}")]
    InstallmentSumMismatch { expected: Money, actual: Money },

    /// Installment numbers are not contiguous `1..count`.
    #[error("Charge {charge_id}: expected installment {expected}, found {found}")]
    InstallmentSequenceGap {
        charge_id: String,
        expected: u32,
        found: u32,
    },

    /// Installment row count disagrees with `installment_count`.
    #[error("Charge {charge_id} declares {declared} installments but has {actual}")]
    InstallmentCountMismatch {
        charge_id: String,
        declared: u32,
        actual: usize,
    },

    /// An installment records more paid than its nominal amount.
    #[error("Charge {charge_id}: installment {number} is overpaid")]
    InstallmentOverpaid { charge_id: String, number: u32 },

    /// Charge row references both a sale and a service.
    #[error("Charge {charge_id} is attached to both a sale and a service")]
    AmbiguousOrigin { charge_id: String },

    /// Charge row references neither a sale nor a service.
    #[error("Charge {charge_id} has no origin")]
    MissingOrigin { charge_id: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InstallmentNotFound {
            charge_id: "c-1".to_string(),
            number: 5,
        };
        assert_eq!(err.to_string(), "Installment 5 not found for charge c-1");

        let err = ConsistencyError::InstallmentSumMismatch {
            expected: Money::from_cents(10000),
            actual: Money::from_cents(9999),
        };
        assert_eq!(
            err.to_string(),
            "Installments sum to R$ 99.99, expected R$ 100.00"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert!(core_err.is_user_correctable());
    }

    #[test]
    fn test_consistency_is_not_user_correctable() {
        let err: CoreError = ConsistencyError::MissingOrigin {
            charge_id: "c-9".to_string(),
        }
        .into();
        assert!(!err.is_user_correctable());
    }
}
