//! Fixtures shared by the unit tests of this crate.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::money::Money;
use crate::origin::{ChargeOrigin, SaleRef, ServiceRef};
use crate::types::{Charge, ChargeStatus, PaymentMethod};

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Noon UTC on the given day.
pub(crate) fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub(crate) fn sale(id: i64, total_cents: i64) -> ChargeOrigin {
    ChargeOrigin::Sale(SaleRef {
        id,
        total: Money::from_cents(total_cents),
        cancelled: false,
    })
}

pub(crate) fn service(id: i64, total_cents: i64) -> ChargeOrigin {
    ChargeOrigin::Service(ServiceRef {
        id,
        total_price: Money::from_cents(total_cents),
    })
}

/// A fresh, unsplit charge for `amount_cents` due on `due`.
pub(crate) fn charge(amount_cents: i64, due: Option<NaiveDate>) -> Charge {
    let created = at(2026, 1, 1);
    Charge {
        id: "0b6c2a52-3d0e-4f5e-9a57-2f4f8f3b9a11".to_string(),
        origin: sale(1, amount_cents),
        reference: "VENDA-1".to_string(),
        due_date: due,
        amount: Money::from_cents(amount_cents),
        amount_paid: Money::zero(),
        status: ChargeStatus::Pending,
        payment_method: PaymentMethod::Pix,
        is_installment: false,
        installment_count: 1,
        installment_value: Money::from_cents(amount_cents),
        payment_confirmed_at: None,
        installments: Vec::new(),
        created_at: created,
        updated_at: created,
        version: 0,
    }
}

/// A charge split into `count` installments, first due on `first_due`.
pub(crate) fn split_charge(amount_cents: i64, count: u32, first_due: NaiveDate) -> Charge {
    let mut charge = charge(amount_cents, Some(first_due));
    charge.installment_count = count;
    charge.regenerate_installments(&[], first_due).unwrap();
    charge.normalize_status(at(2026, 1, 1));
    charge
}
