//! # Double-Submit Token Pairs
//!
//! Generation and validation of stateless CSRF token pairs.
//!
//! A pair consists of a **raw value**, placed in a hidden form field (or the
//! `X-CSRF-Token` header), and a **signed value**, stored in the `csrf_token`
//! cookie. The signed value has the format:
//!
//! ```text
//! v1.<issued_at>.<digest_b64>.<mac_b64>
//! ```
//!
//! - `issued_at`: Unix seconds at issuance
//! - `digest`: SHA-256 of the raw value
//! - `mac`: HMAC-SHA256 over `v1.<issued_at>.<digest_b64>` with the configured secret
//! - Encoded using Base64 (URL-safe, no padding)
//!
//! Nothing is stored server-side: a pair is verified, never looked up.
//!
//! # Example
//! ```rust
//! use chrono::Utc;
//! use wzs_guard::config::csrf::CsrfConfig;
//! use wzs_guard::web::csrf::{generate_token_pair, validate_token_pair};
//!
//! let cfg = CsrfConfig::new("example-secret");
//! let now = Utc::now();
//! let pair = generate_token_pair(&cfg, now);
//!
//! let checked = validate_token_pair(&cfg, Some(pair.signed_value()), Some(pair.raw_value()), now);
//! assert!(checked.is_ok());
//! ```

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::csrf::CsrfConfig;
use crate::error::csrf::CsrfError;

/// Cookie name used to store the signed value.
pub const CSRF_COOKIE_NAME: &str = "csrf_token";

/// Form field name carrying the raw value.
pub const CSRF_FIELD_NAME: &str = "csrf_token";

/// HTTP header carrying the raw value for programmatic clients.
pub const CSRF_HEADER_NAME: &str = "X-CSRF-Token";

/// Tokens issued this many seconds in the future are still accepted.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

const TOKEN_VERSION: &str = "v1";
const RAW_TOKEN_BYTES: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// A freshly issued raw/signed token pair.
///
/// Values are redacted from the [`Debug`] output.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    raw: String,
    signed: String,
}

impl TokenPair {
    /// Value for the hidden form field or the `X-CSRF-Token` header.
    pub fn raw_value(&self) -> &str {
        &self.raw
    }

    /// Value for the `csrf_token` cookie.
    pub fn signed_value(&self) -> &str {
        &self.signed
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// Generates a new token pair stamped with `now`.
///
/// The raw value carries 32 bytes from the thread-local CSPRNG.
pub fn generate_token_pair(cfg: &CsrfConfig, now: DateTime<Utc>) -> TokenPair {
    let nonce: [u8; RAW_TOKEN_BYTES] = rand::random();
    let raw = URL_SAFE_NO_PAD.encode(nonce);
    let signed = sign_token(cfg, &raw, now.timestamp());

    TokenPair { raw, signed }
}

/// Derives the signed value for `raw` issued at `issued_at` (Unix seconds).
pub fn sign_token(cfg: &CsrfConfig, raw: &str, issued_at: i64) -> String {
    let digest = URL_SAFE_NO_PAD.encode(Sha256::digest(raw.as_bytes()));
    let payload = format!("{TOKEN_VERSION}.{issued_at}.{digest}");
    let tag = compute_mac(cfg, &payload);

    format!("{payload}.{}", URL_SAFE_NO_PAD.encode(tag))
}

/// Validates a submitted raw value against the cookie's signed value.
///
/// Empty strings count as missing. Checks run cheapest first:
/// presence, signature, age, then value equality.
pub fn validate_token_pair(
    cfg: &CsrfConfig,
    cookie: Option<&str>,
    submitted: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), CsrfError> {
    let cookie = cookie
        .filter(|s| !s.is_empty())
        .ok_or(CsrfError::MissingCookie)?;
    let submitted = submitted
        .filter(|s| !s.is_empty())
        .ok_or(CsrfError::MissingSubmittedValue)?;

    let signed = SignedToken::parse(cookie).ok_or(CsrfError::SignatureInvalid)?;

    let expected = compute_mac(cfg, signed.payload);
    if expected.ct_eq(&signed.mac).unwrap_u8() != 1 {
        return Err(CsrfError::SignatureInvalid);
    }

    let age = now.timestamp().saturating_sub(signed.issued_at);
    if age > i64::from(cfg.ttl_secs) || age < -MAX_CLOCK_SKEW_SECS {
        return Err(CsrfError::Expired);
    }

    let digest = Sha256::digest(submitted.as_bytes());
    if (&digest[..]).ct_eq(&signed.digest).unwrap_u8() != 1 {
        return Err(CsrfError::ValueMismatch);
    }

    Ok(())
}

fn compute_mac(cfg: &CsrfConfig, payload: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(&cfg.secret).expect("HMAC key");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// A structurally valid, not yet verified cookie value.
struct SignedToken<'a> {
    payload: &'a str,
    issued_at: i64,
    digest: Vec<u8>,
    mac: Vec<u8>,
}

impl<'a> SignedToken<'a> {
    fn parse(value: &'a str) -> Option<Self> {
        let (payload, mac_b64) = value.rsplit_once('.')?;

        let mut parts = payload.split('.');
        let (Some(v), Some(issued_at), Some(digest_b64)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        if parts.next().is_some() || v != TOKEN_VERSION {
            return None;
        }

        let issued_at = issued_at.parse::<i64>().ok()?;
        let digest = URL_SAFE_NO_PAD.decode(digest_b64).ok()?;
        let mac = URL_SAFE_NO_PAD.decode(mac_b64).ok()?;
        if digest.len() != 32 || mac.len() != 32 {
            return None;
        }

        Some(Self {
            payload,
            issued_at,
            digest,
            mac,
        })
    }
}
