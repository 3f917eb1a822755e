//! # Rotated Responses
//!
//! Every response that sends a form back to the client, whether after a CSRF
//! rejection or after a business-validation failure, carries a freshly issued
//! token pair. [`RotatedResponse`] is the single place that builds them.
//!
//! The body depends on the [`ResponseShape`] of the request:
//!
//! | Shape | Body |
//! |-------|------|
//! | `FullPage` | complete HTML page: banner + form (or bare hidden field) |
//! | `Fragment` | HTML fragment: banner + form, for in-place replacement |
//! | `Api` | JSON `{ "error": ..., "csrfToken": ... }` and the `X-CSRF-Token` header |
//!
//! CSRF rejections always use [`GENERIC_FAILURE_MESSAGE`], whatever the reason.

use std::fmt;

use askama::Template;
use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::web::{
    classify::ResponseShape,
    protection::{CsrfField, CsrfProtection},
    template::render_template_with_status,
};

/// The only message a client ever sees for a CSRF failure.
pub const GENERIC_FAILURE_MESSAGE: &str = "Security validation failed, please retry.";

const TOKEN_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

#[derive(Template)]
#[template(path = "csrf/page.html")]
struct RetryPage<'a> {
    message: &'a str,
    csrf: &'a CsrfField,
    form: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "csrf/fragment.html")]
struct RetryFragment<'a> {
    message: &'a str,
    csrf: &'a CsrfField,
    form: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RetryBody<'a> {
    error: &'a str,
    #[serde(rename = "csrfToken")]
    csrf_token: &'a str,
}

/// A form re-presentation carrying a newly issued token pair.
///
/// # Example
/// ```rust,no_run
/// use axum::http::StatusCode;
/// use axum_extra::extract::cookie::CookieJar;
/// use wzs_guard::config::csrf::CsrfConfig;
/// use wzs_guard::web::classify::ResponseShape;
/// use wzs_guard::web::protection::CsrfProtection;
/// use wzs_guard::web::rejection::RotatedResponse;
///
/// let csrf = CsrfProtection::new(CsrfConfig::new("secret"));
/// let resp = RotatedResponse::forbidden(&csrf, CookieJar::new(), ResponseShape::Fragment)
///     .with_form(|field| Ok(format!(r#"<form method="post">{field}</form>"#)));
/// ```
pub struct RotatedResponse {
    status: StatusCode,
    shape: ResponseShape,
    message: String,
    jar: CookieJar,
    field: CsrfField,
    form: Option<String>,
}

impl RotatedResponse {
    /// `403 Forbidden` with the generic failure message.
    pub fn forbidden(csrf: &CsrfProtection, jar: CookieJar, shape: ResponseShape) -> Self {
        Self::new(csrf, jar, shape, StatusCode::FORBIDDEN, GENERIC_FAILURE_MESSAGE)
    }

    /// Issues a new pair into `jar` and prepares a response with `status` and
    /// the banner `message`.
    pub fn new(
        csrf: &CsrfProtection,
        jar: CookieJar,
        shape: ResponseShape,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        let (jar, field) = csrf.issue(jar);

        Self {
            status,
            shape,
            message: message.into(),
            jar,
            field,
            form: None,
        }
    }

    /// Embeds form markup rendered with the new hidden field.
    ///
    /// A render failure is logged and the response falls back to the bare
    /// hidden field, so a retry stays possible.
    pub fn with_form<F>(mut self, render: F) -> Self
    where
        F: FnOnce(&CsrfField) -> askama::Result<String>,
    {
        match render(&self.field) {
            Ok(markup) => self.form = Some(markup),
            Err(err) => tracing::error!(error = %err, "failed to render retry form"),
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    /// Hidden field carrying the newly issued raw value.
    pub fn field(&self) -> &CsrfField {
        &self.field
    }
}

impl fmt::Debug for RotatedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatedResponse")
            .field("status", &self.status)
            .field("shape", &self.shape)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl IntoResponse for RotatedResponse {
    fn into_response(self) -> Response {
        let Self {
            status,
            shape,
            message,
            jar,
            field,
            form,
        } = self;

        let body = match shape {
            ResponseShape::FullPage => render_template_with_status(
                RetryPage {
                    message: &message,
                    csrf: &field,
                    form: form.as_deref(),
                },
                status,
            ),
            ResponseShape::Fragment => render_template_with_status(
                RetryFragment {
                    message: &message,
                    csrf: &field,
                    form: form.as_deref(),
                },
                status,
            ),
            ResponseShape::Api => {
                let mut resp = (
                    status,
                    Json(RetryBody {
                        error: &message,
                        csrf_token: field.value(),
                    }),
                )
                    .into_response();
                if let Ok(value) = HeaderValue::from_str(field.value()) {
                    resp.headers_mut().insert(TOKEN_HEADER, value);
                }
                resp
            }
        };

        (jar, [(CACHE_CONTROL, "no-store")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::csrf::CsrfConfig;
    use crate::web::csrf::CSRF_COOKIE_NAME;
    use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
    use axum_extra::extract::cookie::Cookie;
    use http_body_util::BodyExt;

    struct Broken;

    impl std::fmt::Display for Broken {
        fn fmt(&self, _: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            Err(std::fmt::Error)
        }
    }

    #[derive(Template)]
    #[template(source = "<form>{{ value }}</form>", ext = "html")]
    struct BrokenForm {
        value: Broken,
    }

    fn csrf() -> CsrfProtection {
        CsrfProtection::new(CsrfConfig::new("rejection-tests"))
    }

    async fn body_string(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn set_cookie_value(resp: &Response) -> String {
        resp.headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| Cookie::parse(v.to_string()).ok())
            .find(|c| c.name() == CSRF_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .expect("csrf cookie set")
    }

    #[tokio::test]
    async fn full_page_embeds_new_token_and_generic_message() {
        let csrf = csrf();
        let rotated = RotatedResponse::forbidden(&csrf, CookieJar::new(), ResponseShape::FullPage)
            .with_form(|field| Ok(format!(r#"<form id="signup">{field}</form>"#)));
        let raw = rotated.field().value().to_string();

        let resp = rotated.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(resp.headers().get(CACHE_CONTROL).unwrap(), "no-store");

        let cookie = set_cookie_value(&resp);
        assert_eq!(csrf.validate(Some(&cookie), Some(&raw)), Ok(()));

        let body = body_string(resp).await;
        assert!(body.contains("<!DOCTYPE html>"));
        assert!(body.contains(GENERIC_FAILURE_MESSAGE));
        assert!(body.contains(r#"<form id="signup"><input type="hidden" name="csrf_token""#));
        assert!(body.contains(&raw));
    }

    #[tokio::test]
    async fn fragment_is_not_a_full_document() {
        let csrf = csrf();
        let rotated = RotatedResponse::forbidden(&csrf, CookieJar::new(), ResponseShape::Fragment)
            .with_form(|field| Ok(format!(r#"<form id="link">{field}</form>"#)));
        let raw = rotated.field().value().to_string();

        let resp = rotated.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body = body_string(resp).await;
        assert!(!body.contains("<html"));
        assert!(body.contains(r#"role="alert""#));
        assert!(body.contains(r#"<form id="link">"#));
        assert!(body.contains(&raw));
    }

    #[tokio::test]
    async fn api_returns_json_with_token_header() {
        let csrf = csrf();
        let rotated = RotatedResponse::forbidden(&csrf, CookieJar::new(), ResponseShape::Api);
        let raw = rotated.field().value().to_string();

        let resp = rotated.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(resp.headers().get(TOKEN_HEADER).unwrap(), raw.as_str());
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "application/json");

        let json: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["error"], GENERIC_FAILURE_MESSAGE);
        assert_eq!(json["csrfToken"], raw.as_str());
    }

    #[tokio::test]
    async fn failed_form_render_falls_back_to_hidden_field() {
        let csrf = csrf();
        let rotated = RotatedResponse::forbidden(&csrf, CookieJar::new(), ResponseShape::Fragment)
            .with_form(|_| BrokenForm { value: Broken }.render());
        let raw = rotated.field().value().to_string();

        let body = body_string(rotated.into_response()).await;
        assert!(body.contains(r#"class="csrf-retry""#));
        assert!(body.contains(&raw));
    }

    #[tokio::test]
    async fn custom_status_and_message_for_business_errors() {
        let csrf = csrf();
        let rotated = RotatedResponse::new(
            &csrf,
            CookieJar::new(),
            ResponseShape::FullPage,
            StatusCode::UNPROCESSABLE_ENTITY,
            "Passwords do not match.",
        );
        assert_eq!(rotated.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rotated.shape(), ResponseShape::FullPage);

        let body = body_string(rotated.into_response()).await;
        assert!(body.contains("Passwords do not match."));
        assert!(!body.contains(GENERIC_FAILURE_MESSAGE));
    }

    #[test]
    fn debug_output_hides_values() {
        let csrf = csrf();
        let rotated = RotatedResponse::new(
            &csrf,
            CookieJar::new(),
            ResponseShape::FullPage,
            StatusCode::UNPROCESSABLE_ENTITY,
            "Passwords do not match.",
        )
        .with_form(|field| Ok(format!("<form>{field}</form>")));

        let debug = format!("{rotated:?}");
        assert!(!debug.contains(rotated.field().value()));
        assert!(!debug.contains(CSRF_COOKIE_NAME));
        assert!(debug.contains("Passwords do not match."));
        assert!(debug.contains("UNPROCESSABLE") || debug.contains("422"));
    }

    #[test]
    fn rotation_replaces_the_previous_pair() {
        let csrf = csrf();
        let (jar, old) = csrf.issue(CookieJar::new());

        let rotated = RotatedResponse::forbidden(&csrf, jar, ResponseShape::FullPage);
        assert_ne!(rotated.field(), &old);
    }
}
