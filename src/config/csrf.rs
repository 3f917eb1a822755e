//! # CSRF Configuration
//!
//! Provides the process-wide configuration for the double-submit token
//! protocol: the signing secret, the cookie `Secure` flag and the expiry window.
//!
//! The configuration reads from environment variables:
//! - `APP_ENV` — `development`, `local` or `test` count as local development
//! - `CSRF_SECRET` — base string used to derive a 32-byte secret
//!   (if missing, random key is generated)
//! - `CSRF_COOKIE_SECURE` — overrides the `Secure` cookie flag
//!   (default: `true` outside local development, an empty value counts as unset)
//! - `CSRF_TTL_SECS` — expiry window of a token pair in seconds (default: `3600`)
//!
//! The secret is never printed: the [`Debug`] output redacts it.
//!
//! # Examples
//! ```rust
//! use wzs_guard::config::csrf::CsrfConfig;
//!
//! let cfg = CsrfConfig::from_env_with(|k| match k {
//!     "APP_ENV" => Some("production".into()),
//!     _ => None,
//! });
//! assert!(cfg.cookie_secure);
//! assert_eq!(cfg.ttl_secs, 3600);
//! ```

use std::env as std_env;
use std::fmt;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::config::env::{is_local_env, read_flag_from, read_u32_from};

/// Expiry window used when `CSRF_TTL_SECS` is missing or invalid.
pub const DEFAULT_TTL_SECS: u32 = 60 * 60;

/// Configuration for CSRF protection.
///
/// Built once at startup and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfConfig {
    pub secret: [u8; 32],
    pub cookie_secure: bool,
    pub ttl_secs: u32,
}

impl CsrfConfig {
    /// Builds a configuration from an explicit secret string.
    ///
    /// Cookies are marked `Secure` and the default expiry window applies.
    pub fn new(secret: &str) -> Self {
        Self {
            secret: derive_secret_from_string(secret),
            cookie_secure: true,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// # Environment variables
    /// - `APP_ENV`
    /// - `CSRF_SECRET`
    /// - `CSRF_COOKIE_SECURE`
    /// - `CSRF_TTL_SECS`
    pub fn from_env() -> Self {
        Self::from_env_with(|k| std_env::var(k).ok())
    }

    /// Loads configuration using a custom key provider (for testing/mocking).
    pub fn from_env_with<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env = get("APP_ENV").unwrap_or_else(|| "development".into());

        let secret = match get("CSRF_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(s) => derive_secret_from_string(&s),
            None => {
                tracing::warn!("CSRF_SECRET is not set, tokens will not survive a restart");
                random_secret()
            }
        };

        let cookie_secure = read_flag_from(&get, "CSRF_COOKIE_SECURE", !is_local_env(&app_env));

        let ttl_secs = match read_u32_from(&get, "CSRF_TTL_SECS", DEFAULT_TTL_SECS) {
            0 => DEFAULT_TTL_SECS,
            secs => secs,
        };

        Self {
            secret,
            cookie_secure,
            ttl_secs,
        }
    }

    /// Returns a copy with a different expiry window.
    pub fn with_ttl_secs(mut self, ttl_secs: u32) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Returns a copy with a different `Secure` cookie flag.
    pub fn with_cookie_secure(mut self, cookie_secure: bool) -> Self {
        self.cookie_secure = cookie_secure;
        self
    }
}

impl fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("secret", &"<redacted>")
            .field("cookie_secure", &self.cookie_secure)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Derives a deterministic 32-byte secret key from a string.
///
/// Useful for converting an environment string (e.g. `CSRF_SECRET`)
/// into a fixed-length HMAC key.
pub fn derive_secret_from_string(s: &str) -> [u8; 32] {
    let digest = Sha256::digest(s.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest[..32]);
    key
}

/// Generates a new random 32-byte secret key.
pub fn random_secret() -> [u8; 32] {
    let mut key = [0u8; 32];
    rand::rng().fill_bytes(&mut key);
    key
}
