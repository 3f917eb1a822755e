//! # CSRF Protection Handle
//!
//! [`CsrfProtection`] bundles the immutable [`CsrfConfig`] with a [`Clock`]
//! and is injected into the router as an [`Extension`](axum::Extension).
//! Every form-serving endpoint obtains a token pair through
//! [`CsrfProtection::issue`]; every state-changing endpoint is guarded by the
//! extractors in [`crate::web::guard`].
//!
//! # Example
//! ```rust,no_run
//! use axum::{Extension, Router, response::Html, routing::get};
//! use axum_extra::extract::cookie::CookieJar;
//! use wzs_guard::config::csrf::CsrfConfig;
//! use wzs_guard::web::protection::CsrfProtection;
//!
//! async fn signup_form(
//!     Extension(csrf): Extension<CsrfProtection>,
//!     jar: CookieJar,
//! ) -> (CookieJar, Html<String>) {
//!     let (jar, field) = csrf.issue(jar);
//!     let html = format!(r#"<form method="post">{field}<input name="username"></form>"#);
//!     (jar, Html(html))
//! }
//!
//! let csrf = CsrfProtection::new(CsrfConfig::from_env());
//! let app: Router = Router::new()
//!     .route("/signup", get(signup_form))
//!     .layer(Extension(csrf));
//! ```

use std::fmt;
use std::sync::Arc;

use axum::{
    Extension, Json,
    http::{HeaderName, header::CACHE_CONTROL},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;
use serde::Serialize;

use crate::config::csrf::CsrfConfig;
use crate::error::csrf::CsrfError;
use crate::time::{clock::Clock, system_clock::SystemClock};
use crate::web::csrf::{
    CSRF_COOKIE_NAME, CSRF_FIELD_NAME, TokenPair, generate_token_pair, validate_token_pair,
};

/// Process-wide CSRF handle: configuration plus time source.
///
/// Cheap to clone; holds no mutable state.
#[derive(Clone)]
pub struct CsrfProtection {
    config: Arc<CsrfConfig>,
    clock: Arc<dyn Clock>,
}

impl CsrfProtection {
    /// Creates a handle backed by the system clock.
    pub fn new(config: CsrfConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a handle with an explicit clock.
    pub fn with_clock(config: CsrfConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            clock,
        }
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Generates a fresh token pair.
    pub fn generate(&self) -> TokenPair {
        generate_token_pair(&self.config, self.clock.now())
    }

    /// Validates a cookie value against a submitted raw value.
    pub fn validate(&self, cookie: Option<&str>, submitted: Option<&str>) -> Result<(), CsrfError> {
        validate_token_pair(&self.config, cookie, submitted, self.clock.now())
    }

    /// Validates the submitted raw value against the token cookie in `jar`.
    pub fn validate_jar(&self, jar: &CookieJar, submitted: Option<&str>) -> Result<(), CsrfError> {
        self.validate(jar.get(CSRF_COOKIE_NAME).map(Cookie::value), submitted)
    }

    /// Form-render hook: issues a new pair, sets its cookie and returns the
    /// hidden field to embed as the first field of the form.
    pub fn issue(&self, jar: CookieJar) -> (CookieJar, CsrfField) {
        let pair = self.generate();
        let jar = set_csrf_cookie(jar, &self.config, &pair);

        (jar, CsrfField::new(pair.raw_value()))
    }
}

impl fmt::Debug for CsrfProtection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfProtection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Sets the signed value of `pair` as the token cookie.
///
/// The cookie is `SameSite=Strict`, readable by scripts (partial-update
/// tooling resubmits it), `Secure` per configuration, and lives exactly as
/// long as the signed value stays valid.
pub fn set_csrf_cookie(jar: CookieJar, cfg: &CsrfConfig, pair: &TokenPair) -> CookieJar {
    let cookie = Cookie::build((CSRF_COOKIE_NAME, pair.signed_value().to_string()))
        .path("/")
        .same_site(SameSite::Strict)
        .secure(cfg.cookie_secure)
        .http_only(false)
        .max_age(Duration::seconds(i64::from(cfg.ttl_secs)))
        .build();
    jar.add(cookie)
}

/// Hidden form field carrying a raw token value.
///
/// Renders as `<input type="hidden" name="csrf_token" value="...">` through
/// [`Display`](fmt::Display), so it can be interpolated into templates.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfField {
    value: String,
}

impl CsrfField {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        CSRF_FIELD_NAME
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Markup of the hidden input.
    pub fn hidden_input(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CsrfField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"<input type="hidden" name="{}" value="{}">"#,
            CSRF_FIELD_NAME,
            escape_attr(&self.value)
        )
    }
}

impl fmt::Debug for CsrfField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfField").finish_non_exhaustive()
    }
}

/// JSON response schema returned by [`csrf_handler`].
#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
}

/// Axum handler that issues a token pair to programmatic clients.
///
/// A new pair is issued on every call: the raw value of an existing cookie
/// cannot be recovered from its signed value. The raw value is returned as
/// JSON and must be sent back in the `X-CSRF-Token` header.
///
/// # Example
/// ```rust,no_run
/// use axum::{routing::get, Router, Extension};
/// use wzs_guard::config::csrf::CsrfConfig;
/// use wzs_guard::web::protection::{csrf_handler, CsrfProtection};
///
/// let csrf = CsrfProtection::new(CsrfConfig::from_env());
/// let app: Router = Router::new()
///     .route("/csrf", get(csrf_handler))
///     .layer(Extension(csrf));
/// ```
pub async fn csrf_handler(
    Extension(csrf): Extension<CsrfProtection>,
    jar: CookieJar,
) -> (CookieJar, [(HeaderName, &'static str); 1], Json<CsrfResponse>) {
    let (jar, field) = csrf.issue(jar);

    let json = Json(CsrfResponse {
        csrf_token: field.value().to_string(),
    });

    (jar, [(CACHE_CONTROL, "no-store")], json)
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
