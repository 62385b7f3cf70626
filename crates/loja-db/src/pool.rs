//! # Billing Store
//!
//! Opens the SQLite file that holds the charge ledger (sales and service
//! snapshots, charges, installments and the single `store_settings` row)
//! and hands out the repositories and the billing service over one pool.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BillingConfig::from_env()                                              │
//! │       │  LOJA_DATABASE_PATH, LOJA_MAX_CONNECTIONS, PIX defaults         │
//! │       ▼                                                                 │
//! │  Database::new(config.db_config())                                      │
//! │       │  open ledger file ──► WAL ──► foreign keys ──► migrations       │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────────┐                                      │
//! │  │  SqlitePool (max_connections) │                                      │
//! │  └───────────────────────────────┘                                      │
//! │       │                                                                 │
//! │       ├── db.billing(pix) ──► BillingService (one tx per mutation)      │
//! │       ├── db.charges()    ──► ChargeRepository (listings, purge)        │
//! │       ├── db.origins()    ──► OriginRepository (sale/service totals)    │
//! │       └── db.settings()   ──► SettingsRepository (PIX receiver)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrent Payments
//! WAL lets the charges page read while a payment is being written. Two
//! payments racing on the same charge are not serialized by SQLite: the
//! loser fails the `version` check and gets `DbError::VersionConflict`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use loja_core::PixSettings;

use crate::billing::BillingService;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::charge::ChargeRepository;
use crate::repository::origin::OriginRepository;
use crate::repository::settings::SettingsRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the ledger file lives and how many connections may touch it.
///
/// Usually built by [`crate::BillingConfig::db_config`].
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/loja/loja.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Ledger file. Created empty on first start.
    pub database_path: PathBuf,

    /// Upper bound on concurrent billing operations. Default: 5
    pub max_connections: u32,

    /// Connections kept open between requests. Default: 1
    pub min_connections: u32,

    /// How long an operation waits for a free connection before failing
    /// with `PoolExhausted`. Default: 30 seconds
    pub connect_timeout: Duration,

    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Apply the billing schema on open. Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Points at a ledger file, creating it if needed.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Skips the schema step, for a ledger file managed elsewhere.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// A throwaway ledger that lives only as long as the pool.
    ///
    /// Every unit test in this crate starts from one:
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            // each in-memory connection would be its own empty database
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle on the billing store.
///
/// Cheap to clone: the pool is reference counted, so each repository or
/// service gets its own clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the ledger file and brings its schema up to date.
    ///
    /// ## Steps
    /// 1. Create the file if missing
    /// 2. WAL journal, NORMAL sync, foreign keys on (installments cascade
    ///    with their charge only when they are enforced)
    /// 3. Build the pool
    /// 4. Apply `migrations/sqlite` unless disabled
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening billing store"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Billing store pool ready"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending billing schema migrations. Safe to call again.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Applying billing schema");
        migrations::run_migrations(&self.pool).await?;
        info!("Billing schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Charge listings by origin, status counts and the administrative purge.
    pub fn charges(&self) -> ChargeRepository {
        ChargeRepository::new(self.pool.clone())
    }

    /// Sale and service snapshots that charges bill against.
    pub fn origins(&self) -> OriginRepository {
        OriginRepository::new(self.pool.clone())
    }

    /// The PIX receiver settings row.
    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    /// Returns the billing service.
    ///
    /// `pix_defaults` seed the `store_settings` row on first access.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let billing = db.billing(config.pix.clone());
    /// let outcome = billing.apply_payment(&charge_id, amount, Some(2)).await?;
    /// ```
    pub fn billing(&self, pix_defaults: PixSettings) -> BillingService {
        BillingService::new(self.pool.clone(), pix_defaults)
    }

    /// Waits for in-flight billing operations, then closes every connection.
    pub async fn close(&self) {
        info!("Closing billing store");
        self.pool.close().await;
    }

    /// True when the ledger file answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/loja-test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
    }
}
