//! # Settings Repository
//!
//! The single `store_settings` row holding the shop's PIX configuration.
//!
//! ```text
//! first access ──► INSERT OR IGNORE (env defaults) ──► SELECT
//! settings form ──► validate key, sanitize name/city ──► UPDATE
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use loja_core::pix::DEFAULT_QR_ENDPOINT;
use loja_core::text::{sanitize_pix_text_or, MERCHANT_CITY_MAX_LEN, MERCHANT_NAME_MAX_LEN};
use loja_core::validation::validate_pix_key;
use loja_core::{CoreError, PixSettings};

use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    pix_key: Option<String>,
    pix_receiver_name: String,
    pix_receiver_city: String,
    qr_endpoint: String,
}

impl From<SettingsRow> for PixSettings {
    fn from(row: SettingsRow) -> Self {
        PixSettings {
            key: row.pix_key,
            receiver_name: row.pix_receiver_name,
            receiver_city: row.pix_receiver_city,
            qr_endpoint: row.qr_endpoint,
        }
    }
}

/// Values typed in the settings form.
#[derive(Debug, Clone, Default)]
pub struct PixSettingsForm {
    pub key: String,
    pub receiver_name: String,
    pub receiver_city: String,
    /// Blank keeps the stored endpoint.
    pub qr_endpoint: Option<String>,
}

/// Loads the settings row, creating it from `defaults` if absent.
pub(crate) async fn fetch_or_init(
    conn: &mut SqliteConnection,
    defaults: &PixSettings,
) -> DbResult<PixSettings> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO store_settings (
            id, pix_key, pix_receiver_name, pix_receiver_city, qr_endpoint, updated_at
        ) VALUES (1, ?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(defaults.key())
    .bind(&defaults.receiver_name)
    .bind(&defaults.receiver_city)
    .bind(&defaults.qr_endpoint)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    let row: SettingsRow = sqlx::query_as(
        r#"
        SELECT pix_key, pix_receiver_name, pix_receiver_city, qr_endpoint
        FROM store_settings
        WHERE id = 1
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Repository for the store settings row.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Current PIX settings; the row is seeded from `defaults` on first use.
    pub async fn get_or_init(&self, defaults: &PixSettings) -> DbResult<PixSettings> {
        let mut conn = self.pool.acquire().await?;
        fetch_or_init(&mut *conn, defaults).await
    }

    /// Saves the settings form.
    ///
    /// The key is validated (blank disables PIX). Name and city are stored
    /// already folded to the BR Code alphabet so the settings screen shows
    /// what payers will see.
    pub async fn update_pix_settings(
        &self,
        form: &PixSettingsForm,
        defaults: &PixSettings,
    ) -> DbResult<PixSettings> {
        let key = validate_pix_key(&form.key).map_err(CoreError::from)?;
        let receiver_name =
            sanitize_pix_text_or(&form.receiver_name, MERCHANT_NAME_MAX_LEN, &defaults.receiver_name);
        let receiver_city =
            sanitize_pix_text_or(&form.receiver_city, MERCHANT_CITY_MAX_LEN, &defaults.receiver_city);

        let mut tx = self.pool.begin().await?;
        let current = fetch_or_init(&mut *tx, defaults).await?;

        let qr_endpoint = form
            .qr_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .map(str::to_string)
            .unwrap_or(current.qr_endpoint);
        let qr_endpoint = if qr_endpoint.starts_with("http") {
            qr_endpoint
        } else {
            DEFAULT_QR_ENDPOINT.to_string()
        };

        sqlx::query(
            r#"
            UPDATE store_settings SET
                pix_key = ?1,
                pix_receiver_name = ?2,
                pix_receiver_city = ?3,
                qr_endpoint = ?4,
                updated_at = ?5
            WHERE id = 1
            "#,
        )
        .bind(key.as_deref())
        .bind(&receiver_name)
        .bind(&receiver_city)
        .bind(&qr_endpoint)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            pix_enabled = key.is_some(),
            receiver_name = %receiver_name,
            receiver_city = %receiver_city,
            "PIX settings saved"
        );

        Ok(PixSettings {
            key,
            receiver_name,
            receiver_city,
            qr_endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_seeded_from_defaults_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let defaults = PixSettings {
            key: Some("11999999999".to_string()),
            ..PixSettings::default()
        };

        let first = db.settings().get_or_init(&defaults).await.unwrap();
        assert_eq!(first, defaults);

        // Later defaults do not overwrite the stored row.
        let second = db
            .settings()
            .get_or_init(&PixSettings::default())
            .await
            .unwrap();
        assert_eq!(second.key.as_deref(), Some("11999999999"));
    }

    #[tokio::test]
    async fn test_update_sanitizes_name_and_city() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let defaults = PixSettings::default();

        let saved = db
            .settings()
            .update_pix_settings(
                &PixSettingsForm {
                    key: " loja@example.com ".to_string(),
                    receiver_name: "Padaria São João & Filhos Ltda.".to_string(),
                    receiver_city: "Ribeirão Preto - SP".to_string(),
                    qr_endpoint: None,
                },
                &defaults,
            )
            .await
            .unwrap();

        assert_eq!(saved.key.as_deref(), Some("loja@example.com"));
        assert_eq!(saved.receiver_name, "PADARIA SAO JOAO  FILHOS ");
        assert_eq!(saved.receiver_city, "RIBEIRAO PRETO ");
        assert_eq!(saved.qr_endpoint, defaults.qr_endpoint);

        let stored = db.settings().get_or_init(&defaults).await.unwrap();
        assert_eq!(stored, saved);
    }

    #[tokio::test]
    async fn test_update_rejects_bad_key_and_blank_disables() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let defaults = PixSettings::default();

        let err = db
            .settings()
            .update_pix_settings(
                &PixSettingsForm {
                    key: "two words".to_string(),
                    ..PixSettingsForm::default()
                },
                &defaults,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));

        let saved = db
            .settings()
            .update_pix_settings(&PixSettingsForm::default(), &defaults)
            .await
            .unwrap();
        assert!(!saved.is_enabled());
        assert_eq!(saved.receiver_name, defaults.receiver_name);
        assert_eq!(saved.receiver_city, defaults.receiver_city);
    }
}
