//! # Application Configuration Loader
//!
//! Provides a unified configuration loader for the settings this crate needs
//! at startup.
//!
//! Automatically loads `.env` files for non-production environments.
//! It checks for a custom `DOTENV_FILE` path first, then falls back to
//! `.env.{APP_ENV}` or `.env`.
//!
//! This configuration is typically initialized once at application startup
//! and shared throughout the system.
//!
//! # Environment Variables
//! | Variable | Description | Default |
//! |-----------|-------------|----------|
//! | `APP_ENV` | Current environment (`development`, `production`, etc.) | `"development"` |
//! | `DOTENV_FILE` | Optional path to a custom dotenv file | *none* |
//! | `CSRF_SECRET` | CSRF signing secret (auto-generated if missing) | random |
//! | `CSRF_COOKIE_SECURE` | `Secure` flag of the CSRF cookie | `true` outside local development |
//! | `CSRF_TTL_SECS` | Expiry window of a token pair | `3600` |
//!
//! # Example
//! ```rust,no_run
//! use wzs_guard::config::app::AppConfig;
//! use wzs_guard::web::protection::CsrfProtection;
//!
//! let cfg = AppConfig::from_env();
//! let csrf = CsrfProtection::new(cfg.csrf);
//! ```

use std::env;

use crate::config::{csrf::CsrfConfig, env::is_local_env};

/// Top-level application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Value of `APP_ENV`.
    pub app_env: String,
    /// CSRF secret, cookie flags and expiry window.
    pub csrf: CsrfConfig,
}

impl AppConfig {
    /// Loads application configuration from environment variables.
    ///
    /// ## Behavior
    /// - Reads `APP_ENV` (defaults to `"development"`).
    /// - Loads `.env` or `.env.{APP_ENV}` for non-production environments.
    /// - Parses all supported environment variables and falls back to defaults.
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        if app_env != "production" {
            if let Ok(path) = env::var("DOTENV_FILE") {
                if let Err(err) = dotenvy::from_filename(&path) {
                    tracing::warn!(path = %path, error = %err, "failed to load DOTENV_FILE");
                }
            } else {
                let candidate = format!(".env.{}", app_env);
                dotenvy::from_filename(&candidate)
                    .or_else(|_| dotenvy::dotenv())
                    .ok();
            }
        }

        AppConfig {
            app_env,
            csrf: CsrfConfig::from_env(),
        }
    }

    /// Returns `true` when running in local development.
    pub fn is_local(&self) -> bool {
        is_local_env(&self.app_env)
    }
}
