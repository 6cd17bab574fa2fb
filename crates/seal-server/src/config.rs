//! Configuration loading and validation for the field-seal service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is present but invalid.

use anyhow::{Context, Result};
use seal_core::crypto::entropy::{has_minimum_entropy, SHARED_KEY_MIN_LENGTH};
use seal_core::wipe::WipeConfig;
use serde::Deserialize;

/// Smallest storage threshold accepted; lower values are raised to this.
pub const MIN_STORAGE_THRESHOLD_BYTES: u64 = 1024;

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Root secret from which field keys are derived. Optional at startup;
    /// encryption endpoints answer 503 until it is set.
    #[serde(default)]
    pub master_secret: Option<String>,

    /// Share of available cores used when flushing wipe sets.
    #[serde(default = "default_wipe_thread_limit_percentage")]
    pub wipe_thread_limit_percentage: f64,

    /// Content above this size is hashed as a stream rather than in one pass.
    #[serde(default = "default_storage_threshold_bytes")]
    pub storage_threshold_bytes: u64,

    /// Record and verify a digest for every stored document.
    #[serde(default = "default_integrity_check_enabled")]
    pub integrity_check_enabled: bool,

    /// Directory of OpenAPI documents describing the entity types.
    #[serde(default)]
    pub schema_dir: Option<String>,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// OTLP endpoint of the OTEL collector. Spans are not exported when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_wipe_thread_limit_percentage() -> f64 {
    seal_core::wipe::registry::DEFAULT_THREAD_LIMIT_PERCENTAGE
}
fn default_storage_threshold_bytes() -> u64 {
    16 * 1024 * 1024
}
fn default_integrity_check_enabled() -> bool {
    true
}
fn default_listen_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("failed to build configuration from environment")?;

        let mut c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.normalise();
        c.validate()?;
        Ok(c)
    }

    /// Apply floors and clamps that adjust rather than reject values.
    fn normalise(&mut self) {
        self.storage_threshold_bytes = self.storage_threshold_bytes.max(MIN_STORAGE_THRESHOLD_BYTES);
        if self.wipe_thread_limit_percentage > 1.0 {
            self.wipe_thread_limit_percentage = 1.0;
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if !self.wipe_thread_limit_percentage.is_finite() || self.wipe_thread_limit_percentage <= 0.0 {
            anyhow::bail!("WIPE_THREAD_LIMIT_PERCENTAGE must be a number in (0, 1]");
        }
        if let Some(secret) = &self.master_secret {
            let strong = has_minimum_entropy(secret, SHARED_KEY_MIN_LENGTH)
                .context("entropy gate misconfigured")?;
            if !strong {
                anyhow::bail!(
                    "MASTER_SECRET must be at least {SHARED_KEY_MIN_LENGTH} characters with sufficient entropy"
                );
            }
        }
        if let Some(dir) = &self.schema_dir {
            ensure_non_empty(dir, "SCHEMA_DIR")?;
        }
        Ok(())
    }

    /// Wipe pool sizing derived from this configuration.
    pub fn wipe(&self) -> WipeConfig {
        WipeConfig {
            thread_limit_percentage: self.wipe_thread_limit_percentage,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("master_secret", &self.master_secret.as_ref().map(|_| "[REDACTED]"))
            .field("wipe_thread_limit_percentage", &self.wipe_thread_limit_percentage)
            .field("storage_threshold_bytes", &self.storage_threshold_bytes)
            .field("integrity_check_enabled", &self.integrity_check_enabled)
            .field("schema_dir", &self.schema_dir)
            .field("listen_port", &self.listen_port)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty when set");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            master_secret: None,
            wipe_thread_limit_percentage: default_wipe_thread_limit_percentage(),
            storage_threshold_bytes: default_storage_threshold_bytes(),
            integrity_check_enabled: default_integrity_check_enabled(),
            schema_dir: None,
            listen_port: default_listen_port(),
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_wipe_thread_limit_percentage(), 0.34);
        assert_eq!(default_storage_threshold_bytes(), 16 * 1024 * 1024);
        assert!(default_integrity_check_enabled());
        assert_eq!(default_listen_port(), 8080);
        assert_eq!(default_log_level(), "info");
        assert!(base().validate().is_ok());
    }

    #[test]
    fn storage_threshold_is_floored() {
        let mut cfg = base();
        cfg.storage_threshold_bytes = 10;
        cfg.normalise();
        assert_eq!(cfg.storage_threshold_bytes, MIN_STORAGE_THRESHOLD_BYTES);
    }

    #[test]
    fn thread_percentage_is_clamped() {
        let mut cfg = base();
        cfg.wipe_thread_limit_percentage = 3.0;
        cfg.normalise();
        assert_eq!(cfg.wipe().thread_limit_percentage, 1.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_positive_percentage() {
        let mut cfg = base();
        cfg.wipe_thread_limit_percentage = 0.0;
        assert!(cfg.validate().is_err());
        cfg.wipe_thread_limit_percentage = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_weak_master_secret() {
        let mut cfg = base();
        cfg.master_secret = Some("aaaaaaaaaaaaaaaaaaaaaaaa".into());
        assert!(cfg.validate().is_err());
        cfg.master_secret = Some("Jx7#qL2m!Vb9@rT4wZ8$kP1nC6".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_schema_dir() {
        let mut cfg = base();
        cfg.schema_dir = Some("  ".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_redacts_master_secret() {
        let mut cfg = base();
        cfg.master_secret = Some("Jx7#qL2m!Vb9@rT4wZ8$kP1nC6".into());
        let out = format!("{cfg:?}");
        assert!(out.contains("REDACTED"));
        assert!(!out.contains("Jx7#"));
    }
}
