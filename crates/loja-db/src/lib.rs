//! # loja-db: Persistence Layer for LojaWeb Billing
//!
//! Stores charges and installments in SQLite and runs every ledger mutation
//! from loja-core inside a transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Billing Data Flow                                │
//! │                                                                         │
//! │  Back-office handler (register payment)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     loja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │BillingService │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (billing.rs)  │───►│ charge.rs     │    │  (embedded)  │  │   │
//! │  │   │ BEGIN ..      │    │ origin.rs     │    │ 001_billing_ │  │   │
//! │  │   │ COMMIT        │    │ settings.rs   │    │ schema.sql   │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ pure rules                                         │   │
//! │  │           ▼                                                     │   │
//! │  │       loja-core                                                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment configuration (`LOJA_*`)
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Charge, origin and settings repositories
//! - [`billing`] - Transactional ledger operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loja_db::{BillingConfig, Database};
//!
//! let config = BillingConfig::from_env()?;
//! let db = Database::new(config.db_config()).await?;
//! let billing = db.billing(config.pix.clone());
//!
//! let outcome = billing.apply_payment(&charge_id, amount, Some(2)).await?;
//! let summary = billing.summary().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use billing::BillingService;
pub use config::BillingConfig;
pub use error::{ConfigError, DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::charge::ChargeRepository;
pub use repository::origin::OriginRepository;
pub use repository::settings::{PixSettingsForm, SettingsRepository};
