//! # Billing Configuration
//!
//! Environment-driven settings for the ledger process.
//!
//! | Variable                  | Default                                   |
//! |---------------------------|-------------------------------------------|
//! | `LOJA_DATABASE_PATH`      | `loja.db`                                 |
//! | `LOJA_MAX_CONNECTIONS`    | `5`                                       |
//! | `LOJA_PIX_KEY`            | unset (PIX disabled)                      |
//! | `LOJA_PIX_RECEIVER_NAME`  | `LOJAWEB TECNOLOGIA`                      |
//! | `LOJA_PIX_RECEIVER_CITY`  | `SAO PAULO`                               |
//! | `LOJA_QR_ENDPOINT`        | `https://quickchart.io/qr?size=220&text=` |
//!
//! The PIX values only seed `store_settings`; once the row exists, what the
//! shop saved in the settings screen wins.

use std::env;
use std::path::PathBuf;

use loja_core::validation::validate_pix_key;
use loja_core::PixSettings;

use crate::error::ConfigError;
use crate::pool::DbConfig;

pub const DEFAULT_DATABASE_PATH: &str = "loja.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Process configuration for the billing ledger.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    /// Defaults for the `store_settings` row.
    pub pix: PixSettings,
}

impl Default for BillingConfig {
    fn default() -> Self {
        BillingConfig {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            pix: PixSettings::default(),
        }
    }
}

impl BillingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup (tests, `.env` maps).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PixSettings::default();
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_path = non_blank("LOJA_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        let max_connections = match non_blank("LOJA_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|max| *max > 0)
                .ok_or_else(|| ConfigError::InvalidValue("LOJA_MAX_CONNECTIONS".to_string()))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let key = match lookup("LOJA_PIX_KEY") {
            Some(raw) => validate_pix_key(&raw)
                .map_err(|_| ConfigError::InvalidValue("LOJA_PIX_KEY".to_string()))?,
            None => None,
        };

        let qr_endpoint = non_blank("LOJA_QR_ENDPOINT").unwrap_or(defaults.qr_endpoint);
        if !qr_endpoint.starts_with("http://") && !qr_endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue("LOJA_QR_ENDPOINT".to_string()));
        }

        Ok(BillingConfig {
            database_path,
            max_connections,
            pix: PixSettings {
                key,
                receiver_name: non_blank("LOJA_PIX_RECEIVER_NAME")
                    .unwrap_or(defaults.receiver_name),
                receiver_city: non_blank("LOJA_PIX_RECEIVER_CITY")
                    .unwrap_or(defaults.receiver_city),
                qr_endpoint,
            },
        })
    }

    /// Pool settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = BillingConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.database_path, PathBuf::from("loja.db"));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.pix, PixSettings::default());
        assert!(!config.pix.is_enabled());
    }

    #[test]
    fn test_reads_overrides() {
        let config = BillingConfig::from_lookup(lookup(&[
            ("LOJA_DATABASE_PATH", "/data/loja.db"),
            ("LOJA_MAX_CONNECTIONS", "8"),
            ("LOJA_PIX_KEY", " 11999999999 "),
            ("LOJA_PIX_RECEIVER_NAME", "Padaria Central"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 8);
        assert_eq!(config.pix.key.as_deref(), Some("11999999999"));
        assert_eq!(config.pix.receiver_name, "Padaria Central");
        assert_eq!(config.pix.receiver_city, "SAO PAULO");

        let db = config.db_config();
        assert_eq!(db.database_path, PathBuf::from("/data/loja.db"));
        assert_eq!(db.max_connections, 8);
    }

    #[test]
    fn test_rejects_invalid_values() {
        for (name, value) in [
            ("LOJA_MAX_CONNECTIONS", "many"),
            ("LOJA_MAX_CONNECTIONS", "0"),
            ("LOJA_PIX_KEY", "has spaces"),
            ("LOJA_QR_ENDPOINT", "ftp://qr"),
        ] {
            let err = BillingConfig::from_lookup(lookup(&[(name, value)])).unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue(var) if var == name),
                "{name}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_blank_pix_key_disables_pix() {
        let config = BillingConfig::from_lookup(lookup(&[("LOJA_PIX_KEY", "   ")])).unwrap();
        assert_eq!(config.pix.key, None);
    }
}
