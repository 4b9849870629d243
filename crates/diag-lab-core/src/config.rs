//! Runtime configuration.
//!
//! Values come from an optional `diag-lab.toml` next to the process, then from
//! `DIAG_LAB__*` environment variables (a `.env` file is read first), e.g.
//! `DIAG_LAB__INVOICE_PREFIX=NPL`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use config::{Config as Cfg, File};
use serde::Deserialize;

use crate::billing::DEFAULT_INVOICE_PREFIX;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LabConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Alphabetic prefix of every invoice number
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,

    /// Maximum tests plus consumables on one invoice
    #[serde(default = "default_max_line_items")]
    pub max_line_items: usize,

    /// How long a writer waits for the store lock
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("diag-lab.db")
}

fn default_invoice_prefix() -> String {
    DEFAULT_INVOICE_PREFIX.to_string()
}

fn default_max_line_items() -> usize {
    15
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            invoice_prefix: default_invoice_prefix(),
            max_line_items: default_max_line_items(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl LabConfig {
    /// Load from `diag-lab.toml` and the environment.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from("diag-lab")
    }

    /// Load from the given file (optional) and the environment.
    pub fn load_from(file: &str) -> anyhow::Result<Self> {
        let config = Cfg::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("DIAG_LAB").separator("__"))
            .build()
            .context("reading lab configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("parsing lab configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.invoice_prefix.is_empty()
            || !self.invoice_prefix.chars().all(|c| c.is_ascii_alphabetic())
        {
            bail!(
                "invoice_prefix must be non-empty ASCII letters, got {:?}",
                self.invoice_prefix
            );
        }
        if self.max_line_items == 0 {
            bail!("max_line_items must be at least 1");
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LabConfig::default();
        assert_eq!(config.invoice_prefix, "NPL");
        assert_eq!(config.max_line_items, 15);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = LabConfig::load_from("/nonexistent/diag-lab").unwrap();
        assert_eq!(config.database_path, PathBuf::from("diag-lab.db"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "invoice_prefix = \"LAB\"\nmax_line_items = 4").unwrap();

        let config = LabConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.invoice_prefix, "LAB");
        assert_eq!(config.max_line_items, 4);
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LabConfig::default();
        config.invoice_prefix = "NP-1".into();
        assert!(config.validate().is_err());

        config.invoice_prefix = String::new();
        assert!(config.validate().is_err());

        let config = LabConfig {
            max_line_items: 0,
            ..LabConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
