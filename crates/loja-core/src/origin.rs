//! # Charge Origin
//!
//! Every charge bills exactly one sale or one service record. The ledger only
//! reads origin data; sales and services are owned by the CRUD layer.
//!
//! ## Total Resolution
//! ```text
//! Charge.amount > 0 ? ──yes──► Charge.amount
//!        │ no
//!        ▼
//! Sale (not cancelled) ? ──yes──► Sale.total
//!        │ no
//!        ▼
//! Service ? ──yes──► Service.total_price
//!        │ no
//!        ▼
//!      R$ 0.00
//! ```
//!
//! The origin snapshot is loaded together with the charge, so the resolved
//! total always reflects the current origin row.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ConsistencyError, CoreResult};
use crate::money::Money;
use crate::types::Charge;

/// Read-only snapshot of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRef {
    pub id: i64,
    pub total: Money,
    pub cancelled: bool,
}

/// Read-only snapshot of a service record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ServiceRef {
    pub id: i64,
    pub total_price: Money,
}

/// What a charge bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChargeOrigin {
    Sale(SaleRef),
    Service(ServiceRef),
}

impl ChargeOrigin {
    /// Builds the origin from the two nullable foreign-key columns.
    ///
    /// Exactly one must be present; anything else is a consistency failure.
    pub fn from_columns(
        charge_id: &str,
        sale: Option<SaleRef>,
        service: Option<ServiceRef>,
    ) -> CoreResult<ChargeOrigin> {
        match (sale, service) {
            (Some(sale), None) => Ok(ChargeOrigin::Sale(sale)),
            (None, Some(service)) => Ok(ChargeOrigin::Service(service)),
            (Some(_), Some(_)) => Err(ConsistencyError::AmbiguousOrigin {
                charge_id: charge_id.to_string(),
            }
            .into()),
            (None, None) => Err(ConsistencyError::MissingOrigin {
                charge_id: charge_id.to_string(),
            }
            .into()),
        }
    }

    pub fn sale_id(&self) -> Option<i64> {
        match self {
            ChargeOrigin::Sale(sale) => Some(sale.id),
            ChargeOrigin::Service(_) => None,
        }
    }

    pub fn service_id(&self) -> Option<i64> {
        match self {
            ChargeOrigin::Sale(_) => None,
            ChargeOrigin::Service(service) => Some(service.id),
        }
    }

    /// Billable total of the origin itself. A cancelled sale bills nothing.
    pub fn billable_total(&self) -> Money {
        match self {
            ChargeOrigin::Sale(sale) if !sale.cancelled => sale.total,
            ChargeOrigin::Sale(_) => Money::zero(),
            ChargeOrigin::Service(service) => service.total_price,
        }
    }

    /// Reference used when the user does not type one.
    pub fn default_reference(&self) -> String {
        match self {
            ChargeOrigin::Sale(sale) => format!("VENDA-{}", sale.id),
            ChargeOrigin::Service(service) => format!("SERV-{}", service.id),
        }
    }
}

impl Charge {
    /// Total this charge bills (see module docs for the resolution order).
    pub fn total_amount(&self) -> Money {
        if self.amount.is_positive() {
            self.amount
        } else {
            self.origin.billable_total()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(total: i64, cancelled: bool) -> SaleRef {
        SaleRef {
            id: 7,
            total: Money::from_cents(total),
            cancelled,
        }
    }

    #[test]
    fn test_from_columns_requires_exactly_one() {
        let service = ServiceRef {
            id: 3,
            total_price: Money::from_cents(500),
        };

        assert!(matches!(
            ChargeOrigin::from_columns("c", Some(sale(100, false)), None),
            Ok(ChargeOrigin::Sale(_))
        ));
        assert!(matches!(
            ChargeOrigin::from_columns("c", None, Some(service)),
            Ok(ChargeOrigin::Service(_))
        ));

        let both = ChargeOrigin::from_columns("c", Some(sale(100, false)), Some(service));
        assert!(matches!(
            both,
            Err(crate::CoreError::Consistency(ConsistencyError::AmbiguousOrigin { .. }))
        ));

        let neither = ChargeOrigin::from_columns("c", None, None);
        assert!(matches!(
            neither,
            Err(crate::CoreError::Consistency(ConsistencyError::MissingOrigin { .. }))
        ));
    }

    #[test]
    fn test_cancelled_sale_bills_nothing() {
        assert_eq!(
            ChargeOrigin::Sale(sale(9900, false)).billable_total().cents(),
            9900
        );
        assert!(ChargeOrigin::Sale(sale(9900, true)).billable_total().is_zero());
    }

    #[test]
    fn test_default_reference() {
        assert_eq!(ChargeOrigin::Sale(sale(1, false)).default_reference(), "VENDA-7");
        let service = ChargeOrigin::Service(ServiceRef {
            id: 12,
            total_price: Money::zero(),
        });
        assert_eq!(service.default_reference(), "SERV-12");
    }

    #[test]
    fn test_origin_serializes_tagged() {
        let json = serde_json::to_value(ChargeOrigin::Sale(sale(100, false))).unwrap();
        assert_eq!(json["kind"], "sale");
        assert_eq!(json["id"], 7);
        assert_eq!(json["total"], 100);
    }
}
