//! # Installment Splitter
//!
//! Turns a charge total into a schedule of installments, and keeps that
//! schedule in step with later edits without losing recorded payments.
//!
//! ## Splitting
//! ```text
//! total R$ 100.00, count 3, first due 2026-01-10
//!
//!   base = floor(10000 / 3) = 3333     remainder = 1 centavo
//!
//!   #1  2026-01-10  R$ 33.33
//!   #2  2026-02-09  R$ 33.33           (+30 days)
//!   #3  2026-03-11  R$ 33.34  ◄── last one absorbs the remainder
//!                   ────────
//!                   R$ 100.00          sum checked, never assumed
//! ```
//!
//! ## Regeneration
//! ```text
//! ┌────────────────────────────┬──────────────────────────────────────────┐
//! │ Situation                  │ Result                                   │
//! ├────────────────────────────┼──────────────────────────────────────────┤
//! │ count == 1                 │ rows removed, paid folded into charge    │
//! │ same count, same sum,      │ no-op (manual per-row edits survive)     │
//! │ same first due, no dates   │                                          │
//! │ sum changed                │ amounts re-split                         │
//! │ first due moved / dates    │ due dates re-planned                     │
//! │ anything else              │ matched by number, paid re-allocated     │
//! └────────────────────────────┴──────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ConsistencyError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Charge, ChargeStatus, Installment};
use crate::validation::{validate_covers_paid, validate_installment_count, validate_non_negative};
use crate::INSTALLMENT_INTERVAL_DAYS;

/// One planned installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
}

/// Installment numbers touched by a regeneration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentDiff {
    pub added: Vec<u32>,
    pub updated: Vec<u32>,
    pub removed: Vec<u32>,
}

impl InstallmentDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// `date + days`, as a validation error instead of a panic on overflow.
fn add_days(date: NaiveDate, days: i64) -> CoreResult<NaiveDate> {
    date.checked_add_signed(Duration::days(days)).ok_or_else(|| {
        ValidationError::InvalidFormat {
            field: "due date".to_string(),
            reason: "out of range".to_string(),
        }
        .into()
    })
}

/// Splits `total` into `count` installments.
///
/// ## Rules
/// - `count == 1` returns an empty plan (the charge is its own installment)
/// - Amounts are floored to the centavo; the last one takes the remainder
/// - Due date `i` is `explicit_due_dates[i]` when given, else
///   `first_due + 30 * i` days
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use loja_core::installments::split_installments;
/// use loja_core::money::Money;
///
/// let first = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
/// let plan = split_installments(Money::from_cents(10000), 3, first, &[]).unwrap();
///
/// assert_eq!(plan[2].amount.cents(), 3334);
/// assert_eq!(plan[1].due_date, NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
/// ```
pub fn split_installments(
    total: Money,
    count: u32,
    first_due: NaiveDate,
    explicit_due_dates: &[Option<NaiveDate>],
) -> CoreResult<Vec<InstallmentPlan>> {
    validate_installment_count(count)?;
    validate_non_negative(total, "total")?;

    if count == 1 {
        return Ok(Vec::new());
    }

    let (base, remainder) = total.split_even(count);
    let mut plan = Vec::with_capacity(count as usize);

    for index in 0..count {
        let amount = if index + 1 == count {
            base + remainder
        } else {
            base
        };
        let due_date = match explicit_due_dates.get(index as usize).copied().flatten() {
            Some(date) => date,
            None => add_days(first_due, INSTALLMENT_INTERVAL_DAYS * i64::from(index))?,
        };

        plan.push(InstallmentPlan {
            number: index + 1,
            due_date,
            amount,
        });
    }

    let sum: Money = plan.iter().map(|p| p.amount).sum();
    if sum != total {
        return Err(ConsistencyError::InstallmentSumMismatch {
            expected: total,
            actual: sum,
        }
        .into());
    }

    Ok(plan)
}

impl Charge {
    /// Brings the installment rows in line with `installment_count` and the
    /// current total.
    ///
    /// Recorded payments are carried over: each surviving row keeps what was
    /// paid on it (capped at its new amount) and whatever no longer fits is
    /// re-allocated to the earliest rows with room. A total smaller than what
    /// is already paid is rejected, so no payment is ever dropped.
    pub fn regenerate_installments(
        &mut self,
        explicit_due_dates: &[Option<NaiveDate>],
        today: NaiveDate,
    ) -> CoreResult<InstallmentDiff> {
        validate_installment_count(self.installment_count)?;

        let total = self.total_amount();
        let count = self.installment_count;
        let mut diff = InstallmentDiff::default();

        let paid_before: Money = if self.has_installments() {
            self.installments.iter().map(|i| i.amount_paid).sum()
        } else {
            self.amount_paid
        };
        validate_covers_paid(total, paid_before, "amount")?;

        if count == 1 {
            if self.has_installments() {
                self.amount_paid = paid_before;
                diff.removed = self.installments.iter().map(|i| i.number).collect();
                self.installments.clear();
            }
            self.is_installment = false;
            self.installment_value = total;
            return Ok(diff);
        }

        let existing_sum: Money = self.installments.iter().map(|i| i.amount).sum();
        let earliest_due = self.installments.iter().map(|i| i.due_date).min();
        let has_explicit = explicit_due_dates.iter().any(Option::is_some);
        let same_shape = self.installments.len() == count as usize && existing_sum == total;

        if same_shape && !has_explicit && earliest_due == self.due_date {
            self.is_installment = true;
            return Ok(diff);
        }

        let first_due = self.due_date.unwrap_or(today);
        let plan = split_installments(total, count, first_due, explicit_due_dates)?;
        let keep_dates = !has_explicit && earliest_due == Some(first_due);

        let mut old: BTreeMap<u32, Installment> = self
            .installments
            .drain(..)
            .map(|installment| (installment.number, installment))
            .collect();

        let mut rows = Vec::with_capacity(plan.len());
        for slot in &plan {
            let previous = old.remove(&slot.number);
            let amount = match &previous {
                Some(row) if same_shape => row.amount,
                _ => slot.amount,
            };
            let due_date = match &previous {
                Some(row) if keep_dates => row.due_date,
                _ => slot.due_date,
            };
            let amount_paid = previous
                .as_ref()
                .map(|row| row.amount_paid.min(amount))
                .unwrap_or_default();

            match &previous {
                Some(row) if row.amount != amount || row.due_date != due_date => {
                    diff.updated.push(slot.number)
                }
                Some(_) => {}
                None => diff.added.push(slot.number),
            }

            rows.push(Installment {
                charge_id: self.id.clone(),
                number: slot.number,
                due_date,
                amount,
                amount_paid,
                status: previous
                    .as_ref()
                    .map(|row| row.status)
                    .unwrap_or(ChargeStatus::Pending),
                payment_confirmed_at: previous.and_then(|row| row.payment_confirmed_at),
            });
        }
        diff.removed = old.into_keys().collect();

        // Whatever did not survive on its own row goes to the earliest rows
        // with room left.
        let kept: Money = rows.iter().map(|row| row.amount_paid).sum();
        let mut overflow = paid_before - kept;
        for row in rows.iter_mut() {
            if !overflow.is_positive() {
                break;
            }
            let room = row.amount - row.amount_paid;
            if room.is_positive() {
                let take = room.min(overflow);
                row.amount_paid += take;
                overflow -= take;
                if !diff.added.contains(&row.number) && !diff.updated.contains(&row.number) {
                    diff.updated.push(row.number);
                }
            }
        }
        diff.updated.sort_unstable();

        self.installments = rows;
        self.amount_paid = self.installments.iter().map(|i| i.amount_paid).sum();
        self.is_installment = true;
        self.installment_value = plan.first().map(|p| p.amount).unwrap_or(total);

        Ok(diff)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, charge, date, split_charge};
    use crate::{CoreError, MAX_INSTALLMENT_COUNT};

    #[test]
    fn test_split_hundred_in_three() {
        let plan = split_installments(Money::from_cents(10000), 3, date(2026, 1, 10), &[]).unwrap();

        let amounts: Vec<i64> = plan.iter().map(|p| p.amount.cents()).collect();
        assert_eq!(amounts, vec![3333, 3333, 3334]);

        let dates: Vec<NaiveDate> = plan.iter().map(|p| p.due_date).collect();
        assert_eq!(
            dates,
            vec![date(2026, 1, 10), date(2026, 2, 9), date(2026, 3, 11)]
        );
    }

    #[test]
    fn test_split_single_is_empty_and_zero_is_rejected() {
        assert!(split_installments(Money::from_cents(500), 1, date(2026, 1, 1), &[])
            .unwrap()
            .is_empty());
        assert!(matches!(
            split_installments(Money::from_cents(500), 0, date(2026, 1, 1), &[]),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(matches!(
            split_installments(Money::from_cents(-1), 2, date(2026, 1, 1), &[]),
            Err(CoreError::Validation(ValidationError::MustNotBeNegative { .. }))
        ));
    }

    #[test]
    fn test_split_uses_explicit_dates_where_given() {
        let explicit = [None, Some(date(2026, 5, 1))];
        let plan = split_installments(Money::from_cents(900), 3, date(2026, 1, 1), &explicit).unwrap();

        assert_eq!(plan[0].due_date, date(2026, 1, 1));
        assert_eq!(plan[1].due_date, date(2026, 5, 1));
        assert_eq!(plan[2].due_date, date(2026, 3, 2));
    }

    #[test]
    fn test_split_tiny_total_keeps_every_centavo() {
        let plan = split_installments(Money::from_cents(5), 4, date(2026, 1, 1), &[]).unwrap();
        let amounts: Vec<i64> = plan.iter().map(|p| p.amount.cents()).collect();
        assert_eq!(amounts, vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_split_sums_to_total_for_every_count() {
        let first_due = date(2026, 1, 31);
        for cents in [1, 2, 7, 99, 100, 101, 9999, 10000, 123457, 999_999_999_999] {
            let total = Money::from_cents(cents);
            assert!(split_installments(total, 1, first_due, &[]).unwrap().is_empty());

            for count in 2..=MAX_INSTALLMENT_COUNT {
                let plan = split_installments(total, count, first_due, &[]).unwrap();
                assert_eq!(plan.len(), count as usize);

                let sum: Money = plan.iter().map(|p| p.amount).sum();
                assert_eq!(sum, total, "{cents} in {count}");

                let base = plan[0].amount;
                assert!(plan[..plan.len() - 1].iter().all(|p| p.amount == base));
                assert!(plan[plan.len() - 1].amount >= base);
                assert!(plan.windows(2).all(|w| w[0].due_date < w[1].due_date));
            }
        }
    }

    #[test]
    fn test_regenerate_never_drops_paid() {
        let now = at(2026, 1, 5);
        let mut charge = split_charge(10000, 2, date(2026, 2, 1));
        charge.mark_fully_paid(now).unwrap();
        let before = charge.clone();

        charge.amount = Money::from_cents(6000);
        assert!(matches!(
            charge.regenerate_installments(&[], now.date_naive()),
            Err(CoreError::Validation(ValidationError::BelowAmountPaid { .. }))
        ));
        assert_eq!(charge.installments, before.installments);

        charge.installment_count = 1;
        assert!(charge.regenerate_installments(&[], now.date_naive()).is_err());
        assert_eq!(charge.installments, before.installments);
        assert_eq!(charge.amount_paid.cents(), 10000);
    }

    #[test]
    fn test_regenerate_is_noop_with_unchanged_inputs() {
        let mut charge = split_charge(10000, 3, date(2026, 2, 1));
        let before = charge.installments.clone();

        let diff = charge.regenerate_installments(&[], date(2026, 2, 1)).unwrap();

        assert!(diff.is_empty());
        assert_eq!(charge.installments, before);
    }

    #[test]
    fn test_regenerate_keeps_manual_row_edits() {
        let mut charge = split_charge(10000, 3, date(2026, 2, 1));
        charge
            .edit_installment(2, Money::from_cents(3000), Some(date(2026, 4, 15)), at(2026, 1, 2))
            .unwrap();

        let diff = charge.regenerate_installments(&[], date(2026, 1, 2)).unwrap();

        assert!(diff.is_empty());
        assert_eq!(charge.installments[1].due_date, date(2026, 4, 15));
        assert_eq!(charge.installments[1].amount.cents(), 3000);
    }

    #[test]
    fn test_count_change_preserves_total_paid() {
        let now = at(2026, 1, 5);
        let mut charge = split_charge(10000, 3, date(2026, 2, 1));
        charge.apply_payment(Money::from_cents(3333), Some(1), now).unwrap();
        charge.apply_payment(Money::from_cents(1000), Some(2), now).unwrap();

        charge.installment_count = 2;
        let diff = charge.regenerate_installments(&[], now.date_naive()).unwrap();
        charge.normalize_status(now);

        assert_eq!(diff.removed, vec![3]);
        assert_eq!(charge.installments.len(), 2);
        assert_eq!(charge.amount_paid.cents(), 4333);
        assert_eq!(charge.installments[0].amount.cents(), 5000);
        assert_eq!(charge.installments[0].amount_paid.cents(), 3333);
        assert_eq!(charge.installments[1].amount_paid.cents(), 1000);
        assert_eq!(charge.balance().cents(), 5667);
    }

    #[test]
    fn test_shrinking_rows_reallocates_overflow() {
        let now = at(2026, 1, 5);
        let mut charge = split_charge(9000, 3, date(2026, 2, 1));
        charge.mark_fully_paid(now).unwrap();
        // Each row fully paid at 30.00; shrink to 2 rows of 45.00.
        charge.installment_count = 2;
        charge.regenerate_installments(&[], now.date_naive()).unwrap();

        let paid: Vec<i64> = charge.installments.iter().map(|i| i.amount_paid.cents()).collect();
        assert_eq!(paid, vec![4500, 4500]);
        assert_eq!(charge.amount_paid.cents(), 9000);
    }

    #[test]
    fn test_first_split_moves_charge_level_payment_into_rows() {
        let mut charge = charge(10000, Some(date(2026, 2, 1)));
        charge.amount_paid = Money::from_cents(4000);
        charge.installment_count = 3;

        let diff = charge.regenerate_installments(&[], date(2026, 1, 1)).unwrap();

        assert_eq!(diff.added, vec![1, 2, 3]);
        let paid: Vec<i64> = charge.installments.iter().map(|i| i.amount_paid.cents()).collect();
        assert_eq!(paid, vec![3333, 667, 0]);
        assert_eq!(charge.installment_value.cents(), 3333);
        assert!(charge.is_installment);
    }

    #[test]
    fn test_moving_due_date_rebases_schedule() {
        let mut charge = split_charge(10000, 3, date(2026, 2, 1));
        charge.due_date = Some(date(2026, 3, 1));

        let diff = charge.regenerate_installments(&[], date(2026, 1, 1)).unwrap();

        assert_eq!(diff.updated, vec![1, 2, 3]);
        assert_eq!(charge.installments[0].due_date, date(2026, 3, 1));
        assert_eq!(charge.installments[2].due_date, date(2026, 4, 30));
    }

    #[test]
    fn test_back_to_single_folds_paid_into_charge() {
        let now = at(2026, 1, 5);
        let mut charge = split_charge(10000, 3, date(2026, 2, 1));
        charge.apply_payment(Money::from_cents(2000), Some(2), now).unwrap();

        charge.installment_count = 1;
        let diff = charge.regenerate_installments(&[], now.date_naive()).unwrap();

        assert_eq!(diff.removed, vec![1, 2, 3]);
        assert!(charge.installments.is_empty());
        assert!(!charge.is_installment);
        assert_eq!(charge.amount_paid.cents(), 2000);
        assert_eq!(charge.installment_value.cents(), 10000);
    }
}
