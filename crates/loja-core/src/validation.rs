//! # Validation Module
//!
//! Input validation for the billing forms.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form parsing                                                 │
//! │  ├── Money::parse (amounts), parse_date_input (dates)                  │
//! │  └── Wrong shapes are rejected before anything else runs               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Signs, ranges, lengths, required fields                           │
//! │  └── Called at the top of every ledger operation                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (installment_count >= 1)                                    │
//! │  ├── CHECK (amount_paid_cents <= amount_cents)                         │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use loja_core::money::Money;
//! use loja_core::validation::{validate_installment_count, validate_payment_amount};
//!
//! validate_payment_amount(Money::from_cents(1500)).unwrap();
//! assert!(validate_installment_count(0).is_err());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::Money;
use crate::pix::PIX_KEY_MAX_LEN;
use crate::MAX_INSTALLMENT_COUNT;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of a charge reference.
pub const REFERENCE_MAX_LEN: usize = 120;

// =============================================================================
// Money Validators
// =============================================================================

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Cannot pay zero or negative amounts
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates an amount that may be zero (discounts, down payments, edits).
///
/// ```rust
/// use loja_core::money::Money;
/// use loja_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative(Money::zero(), "discount").is_ok());
/// assert!(validate_non_negative(Money::from_cents(-1), "discount").is_err());
/// ```
pub fn validate_non_negative(amount: Money, field: &str) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Installment Validators
// =============================================================================

/// Validates an installment count.
///
/// ## Rules
/// - At least 1 (a single installment means "not split")
/// - At most [`MAX_INSTALLMENT_COUNT`]
pub fn validate_installment_count(count: u32) -> ValidationResult<()> {
    if count == 0 || count > MAX_INSTALLMENT_COUNT {
        return Err(ValidationError::OutOfRange {
            field: "installment count".to_string(),
            min: 1,
            max: i64::from(MAX_INSTALLMENT_COUNT),
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a charge reference and returns it trimmed.
///
/// ## Example
/// ```rust
/// use loja_core::validation::validate_reference;
///
/// assert_eq!(validate_reference("  VENDA-12 ").unwrap(), "VENDA-12");
/// assert!(validate_reference("   ").is_err());
/// ```
pub fn validate_reference(reference: &str) -> ValidationResult<String> {
    let reference = reference.trim();

    if reference.is_empty() {
        return Err(ValidationError::Required {
            field: "reference".to_string(),
        });
    }

    if reference.chars().count() > REFERENCE_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: "reference".to_string(),
            max: REFERENCE_MAX_LEN,
        });
    }

    Ok(reference.to_string())
}

/// Validates a PIX key typed in the settings form.
///
/// A blank key is valid and means "PIX disabled".
pub fn validate_pix_key(key: &str) -> ValidationResult<Option<String>> {
    let key = key.trim();

    if key.is_empty() {
        return Ok(None);
    }

    if key.chars().count() > PIX_KEY_MAX_LEN {
        return Err(ValidationError::TooLong {
            field: "pix key".to_string(),
            max: PIX_KEY_MAX_LEN,
        });
    }

    if key.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "pix key".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }

    Ok(Some(key.to_string()))
}

/// Checks that a new amount still covers what was already paid.
///
/// Lowering a total under the recorded payments would either drop money
/// from the rows or leave a negative balance behind.
pub fn validate_covers_paid(amount: Money, paid: Money, field: &str) -> ValidationResult<()> {
    if amount < paid {
        return Err(ValidationError::BelowAmountPaid {
            field: field.to_string(),
            paid,
        });
    }
    Ok(())
}

// =============================================================================
// Date Parsing
// =============================================================================

/// Parses a due date typed as `YYYY-MM-DD` or `DD/MM/YYYY`.
///
/// Blank input is `Ok(None)` (no due date).
///
/// ```rust
/// use chrono::NaiveDate;
/// use loja_core::validation::parse_date_input;
///
/// let expected = NaiveDate::from_ymd_opt(2026, 3, 9);
/// assert_eq!(parse_date_input("2026-03-09").unwrap(), expected);
/// assert_eq!(parse_date_input("09/03/2026").unwrap(), expected);
/// assert_eq!(parse_date_input("").unwrap(), None);
/// assert!(parse_date_input("March 9").is_err());
/// ```
pub fn parse_date_input(raw: &str) -> ValidationResult<Option<NaiveDate>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    ["%Y-%m-%d", "%d/%m/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .map(Some)
        .ok_or_else(|| ValidationError::InvalidFormat {
            field: "due date".to_string(),
            reason: "use YYYY-MM-DD or DD/MM/YYYY".to_string(),
        })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(Money::from_cents(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_payment_amount(Money::from_cents(-100)).is_err());
    }

    #[test]
    fn test_validate_installment_count() {
        assert!(validate_installment_count(1).is_ok());
        assert!(validate_installment_count(MAX_INSTALLMENT_COUNT).is_ok());
        assert!(validate_installment_count(0).is_err());
        assert!(validate_installment_count(MAX_INSTALLMENT_COUNT + 1).is_err());
    }

    #[test]
    fn test_validate_reference() {
        assert!(validate_reference("COB-1").is_ok());
        assert!(validate_reference("").is_err());
        assert!(validate_reference(&"R".repeat(REFERENCE_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_pix_key() {
        assert_eq!(validate_pix_key("  ").unwrap(), None);
        assert_eq!(
            validate_pix_key(" loja@example.com ").unwrap().as_deref(),
            Some("loja@example.com")
        );
        assert!(validate_pix_key("two words").is_err());
        assert!(validate_pix_key(&"k".repeat(78)).is_err());
    }

    #[test]
    fn test_validate_covers_paid() {
        let paid = Money::from_cents(5000);
        assert!(validate_covers_paid(Money::from_cents(5000), paid, "amount").is_ok());
        assert!(validate_covers_paid(Money::from_cents(9000), Money::zero(), "amount").is_ok());
        assert!(matches!(
            validate_covers_paid(Money::from_cents(4999), paid, "amount"),
            Err(ValidationError::BelowAmountPaid { .. })
        ));
    }

    #[test]
    fn test_parse_date_input_rejects_impossible_dates() {
        assert!(parse_date_input("31/02/2026").is_err());
        assert!(parse_date_input("2026-13-01").is_err());
        assert_eq!(
            parse_date_input(" 2026-01-31 ").unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31)
        );
    }
}
