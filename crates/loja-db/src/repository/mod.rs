//! # Repository Module
//!
//! SQL access for the billing ledger.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layer                                     │
//! │                                                                         │
//! │  BillingService (transaction owner)                                    │
//! │       │  fetch_charge / update_charge / fetch_sale / fetch_or_init     │
//! │       │  (connection-level fns, run on `&mut *tx`)                     │
//! │       ▼                                                                 │
//! │  ChargeRepository      OriginRepository      SettingsRepository        │
//! │  ├── get_by_id         ├── get_sale          ├── get_or_init           │
//! │  ├── list*             ├── get_service       └── update_pix_settings   │
//! │  ├── insert / save     └── insert_* (seed)                             │
//! │  └── purge                                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`charge::ChargeRepository`] - Charge + installment reads, saves, purge
//! - [`origin::OriginRepository`] - Sale / service snapshots
//! - [`settings::SettingsRepository`] - Store PIX settings

pub mod charge;
pub mod origin;
pub mod settings;
