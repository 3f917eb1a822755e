//! # Guard Extractors
//!
//! State-changing endpoints take one of these extractors instead of
//! `Form<T>` / `Json<T>`. The token pair is validated while the request is
//! extracted, so the handler body, and with it every side effect, only runs
//! for authorized requests.
//!
//! - [`CsrfForm<T>`] — URL-encoded form bodies; the raw value is read from the
//!   `csrf_token` field, falling back to the `X-CSRF-Token` header.
//! - [`CsrfJson<T>`] — JSON bodies from programmatic clients; the raw value is
//!   read from the `X-CSRF-Token` header.
//!
//! Rejections are `403 Forbidden` [`RotatedResponse`]s carrying a new pair.
//!
//! # Example
//! ```rust,no_run
//! use askama::Template;
//! use axum::{
//!     Extension, Router,
//!     http::StatusCode,
//!     response::{IntoResponse, Response},
//!     routing::post,
//! };
//! use serde::Deserialize;
//! use wzs_guard::config::csrf::CsrfConfig;
//! use wzs_guard::web::guard::{CsrfForm, ProtectedForm};
//! use wzs_guard::web::protection::{CsrfField, CsrfProtection};
//!
//! #[derive(Template)]
//! #[template(
//!     source = r#"<form method="post">{{ csrf|safe }}<input name="email"></form>"#,
//!     ext = "html"
//! )]
//! struct LinkFormTemplate<'a> {
//!     csrf: &'a CsrfField,
//! }
//!
//! #[derive(Deserialize)]
//! struct LinkForm {
//!     email: String,
//! }
//!
//! impl ProtectedForm for LinkForm {
//!     fn blank_form(csrf: &CsrfField) -> askama::Result<String> {
//!         LinkFormTemplate { csrf }.render()
//!     }
//! }
//!
//! async fn link(form: CsrfForm<LinkForm>) -> Response {
//!     if !form.form.email.contains('@') {
//!         return form
//!             .rerender(StatusCode::UNPROCESSABLE_ENTITY, "Invalid email.", |csrf| {
//!                 LinkFormTemplate { csrf }.render()
//!             })
//!             .into_response();
//!     }
//!     StatusCode::NO_CONTENT.into_response()
//! }
//!
//! let app: Router = Router::new()
//!     .route("/link", post(link))
//!     .layer(Extension(CsrfProtection::new(CsrfConfig::from_env())));
//! ```

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, de::DeserializeOwned};

use crate::web::{
    classify::{ResponseShape, classify},
    csrf::CSRF_HEADER_NAME,
    protection::{CsrfField, CsrfProtection},
    rejection::RotatedResponse,
};

/// Banner shown when a form passed the token check but could not be parsed.
pub const INVALID_FORM_MESSAGE: &str = "The submitted form is invalid, please check it and retry.";

/// A form protected by the guard.
pub trait ProtectedForm: DeserializeOwned + Send {
    /// Renders this form, empty, with `csrf` as its first field.
    ///
    /// Used when a submission is refused before its fields could be read.
    fn blank_form(csrf: &CsrfField) -> askama::Result<String>;
}

/// Runs the validator against the request's cookie and `submitted` raw value.
///
/// On failure the reason is logged and a `403` [`RotatedResponse`] in the
/// request's [`ResponseShape`] is returned. Handlers that extract the token
/// themselves call this before any side effect.
pub fn guard(
    csrf: &CsrfProtection,
    headers: &HeaderMap,
    submitted: Option<&str>,
) -> Result<(), RotatedResponse> {
    let jar = CookieJar::from_headers(headers);

    csrf.validate_jar(&jar, submitted).map_err(|reason| {
        let shape = classify(headers);
        tracing::warn!(reason = reason.code(), ?shape, "csrf validation failed");
        RotatedResponse::forbidden(csrf, jar, shape)
    })
}

#[derive(Deserialize)]
struct SubmittedToken {
    csrf_token: Option<String>,
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn protection_from(req: &Request) -> Result<CsrfProtection, Response> {
    req.extensions().get::<CsrfProtection>().cloned().ok_or_else(|| {
        tracing::error!("couldn't extract `CsrfProtection`, is the extension added to the router?");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    })
}

/// URL-encoded form that passed token validation.
pub struct CsrfForm<T> {
    pub form: T,
    shape: ResponseShape,
    jar: CookieJar,
    csrf: CsrfProtection,
}

impl<T> CsrfForm<T> {
    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    pub fn into_inner(self) -> T {
        self.form
    }

    /// Sends the form back after a business-validation failure.
    ///
    /// A new token pair is issued and `render` receives its hidden field;
    /// `message` is shown in the error banner.
    pub fn rerender<F>(
        &self,
        status: StatusCode,
        message: impl Into<String>,
        render: F,
    ) -> RotatedResponse
    where
        F: FnOnce(&CsrfField) -> askama::Result<String>,
    {
        RotatedResponse::new(&self.csrf, self.jar.clone(), self.shape, status, message)
            .with_form(render)
    }
}

impl<S, T> FromRequest<S> for CsrfForm<T>
where
    S: Send + Sync,
    T: ProtectedForm,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let csrf = protection_from(&req)?;
        let headers = req.headers().clone();

        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let submitted = serde_urlencoded::from_bytes::<SubmittedToken>(&body)
            .ok()
            .and_then(|t| t.csrf_token)
            .filter(|s| !s.is_empty())
            .or_else(|| header_token(&headers));

        guard(&csrf, &headers, submitted.as_deref())
            .map_err(|rejected| rejected.with_form(T::blank_form).into_response())?;

        let shape = classify(&headers);
        let jar = CookieJar::from_headers(&headers);

        // The deserializer error may echo submitted values.
        let form = serde_urlencoded::from_bytes::<T>(&body).map_err(|_| {
            tracing::debug!(?shape, "failed to deserialize protected form");
            RotatedResponse::new(
                &csrf,
                jar.clone(),
                shape,
                StatusCode::UNPROCESSABLE_ENTITY,
                INVALID_FORM_MESSAGE,
            )
            .with_form(T::blank_form)
            .into_response()
        })?;

        Ok(Self {
            form,
            shape,
            jar,
            csrf,
        })
    }
}

/// JSON body that passed token validation.
pub struct CsrfJson<T>(pub T);

impl<S, T> FromRequest<S> for CsrfJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let csrf = protection_from(&req)?;

        let submitted = header_token(req.headers());
        guard(&csrf, req.headers(), submitted.as_deref()).map_err(IntoResponse::into_response)?;

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::csrf::CsrfConfig;
    use crate::web::csrf::CSRF_COOKIE_NAME;
    use axum::{
        body::Body,
        http::{
            HeaderValue, Method,
            header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        },
    };
    use axum_extra::extract::cookie::Cookie;
    use futures::executor::block_on;
    use http_body_util::BodyExt;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Debug, Deserialize)]
    struct NoteForm {
        title: String,
    }

    impl ProtectedForm for NoteForm {
        fn blank_form(csrf: &CsrfField) -> askama::Result<String> {
            Ok(format!(r#"<form id="note">{csrf}<input name="title"></form>"#))
        }
    }

    fn csrf() -> CsrfProtection {
        CsrfProtection::new(CsrfConfig::new("guard-tests"))
    }

    fn set_cookie_value(resp: &Response) -> Option<String> {
        resp.headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| Cookie::parse(v.to_string()).ok())
            .find(|c| c.name() == CSRF_COOKIE_NAME)
            .map(|c| c.value().to_string())
    }

    async fn body_string(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn hidden_value(body: &str) -> Option<String> {
        let marker = r#"name="csrf_token" value=""#;
        let start = body.find(marker)? + marker.len();
        let end = body[start..].find('"')?;
        Some(body[start..start + end].to_string())
    }

    fn form_request(csrf: &CsrfProtection, cookie: Option<&str>, body: String) -> Request {
        let mut builder = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/notes")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .extension(csrf.clone());
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, format!("{CSRF_COOKIE_NAME}={cookie}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn form_with_valid_pair_is_extracted() {
        let csrf = csrf();
        let pair = csrf.generate();
        let req = form_request(
            &csrf,
            Some(pair.signed_value()),
            format!("csrf_token={}&title=hello", pair.raw_value()),
        );

        let extracted = CsrfForm::<NoteForm>::from_request(req, &()).await.unwrap();
        assert_eq!(extracted.shape(), ResponseShape::FullPage);
        assert_eq!(extracted.into_inner().title, "hello");
    }

    #[tokio::test]
    async fn header_is_used_when_field_is_absent() {
        let csrf = csrf();
        let pair = csrf.generate();
        let mut req = form_request(&csrf, Some(pair.signed_value()), "title=hello".into());
        req.headers_mut().insert(
            "x-csrf-token",
            HeaderValue::from_str(pair.raw_value()).unwrap(),
        );

        assert!(CsrfForm::<NoteForm>::from_request(req, &()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_field_is_forbidden() {
        let csrf = csrf();
        let pair = csrf.generate();
        let req = form_request(&csrf, Some(pair.signed_value()), "title=hello".into());

        let resp = CsrfForm::<NoteForm>::from_request(req, &())
            .await
            .err()
            .expect("rejected");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unparseable_form_after_valid_token_is_rerendered() {
        let csrf = csrf();
        let pair = csrf.generate();
        let req = form_request(
            &csrf,
            Some(pair.signed_value()),
            format!("csrf_token={}", pair.raw_value()),
        );

        let resp = CsrfForm::<NoteForm>::from_request(req, &())
            .await
            .err()
            .expect("rejected");
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let cookie = set_cookie_value(&resp).expect("rotated cookie");
        assert_ne!(cookie, pair.signed_value());

        let body = body_string(resp).await;
        assert!(body.contains(INVALID_FORM_MESSAGE));
        assert!(body.contains(r#"<form id="note">"#));
        let raw = hidden_value(&body).expect("rotated hidden field");
        assert_ne!(raw, pair.raw_value());
        assert_eq!(csrf.validate(Some(&cookie), Some(&raw)), Ok(()));
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Visibility {
        Public,
        Private,
    }

    #[derive(Debug, Deserialize)]
    struct ShareForm {
        #[allow(dead_code)]
        visibility: Visibility,
    }

    impl ProtectedForm for ShareForm {
        fn blank_form(csrf: &CsrfField) -> askama::Result<String> {
            Ok(format!(r#"<form id="share">{csrf}<select name="visibility"></select></form>"#))
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn unparseable_form_is_logged_without_submitted_values() {
        let csrf = csrf();
        let pair = csrf.generate();
        let req = form_request(
            &csrf,
            Some(pair.signed_value()),
            format!("csrf_token={}&visibility=leaked-user-input", pair.raw_value()),
        );

        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();

        let resp = tracing::subscriber::with_default(subscriber, || {
            block_on(CsrfForm::<ShareForm>::from_request(req, &()))
        })
        .err()
        .expect("rejected");
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let output = logs.contents();
        assert!(output.contains("failed to deserialize protected form"));
        assert!(!output.contains("leaked-user-input"));
        assert!(!output.contains(pair.raw_value()));
    }

    #[tokio::test]
    async fn missing_extension_is_internal_error() {
        let req = axum::http::Request::builder()
            .method(Method::POST)
            .body(Body::from("title=x"))
            .unwrap();

        let resp = CsrfForm::<NoteForm>::from_request(req, &())
            .await
            .err()
            .expect("rejected");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn json_requires_header_token() {
        let csrf = csrf();
        let pair = csrf.generate();

        let build = |token: Option<&str>| {
            let mut builder = axum::http::Request::builder()
                .method(Method::POST)
                .header(CONTENT_TYPE, "application/json")
                .header(COOKIE, format!("{CSRF_COOKIE_NAME}={}", pair.signed_value()))
                .extension(csrf.clone());
            if let Some(token) = token {
                builder = builder.header(CSRF_HEADER_NAME, token);
            }
            builder.body(Body::from(r#"{"title":"sync"}"#)).unwrap()
        };

        let ok =
            CsrfJson::<serde_json::Value>::from_request(build(Some(pair.raw_value())), &()).await;
        assert_eq!(ok.ok().map(|j| j.0["title"].clone()), Some("sync".into()));

        let rejected = CsrfJson::<serde_json::Value>::from_request(build(None), &())
            .await
            .err()
            .expect("rejected");
        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn guard_rejects_request_without_cookie_and_rotates() {
        let csrf = csrf();
        let mut headers = HeaderMap::new();
        headers.insert("hx-request", HeaderValue::from_static("true"));

        let rejected = guard(&csrf, &headers, Some("anything")).err().expect("rejected");

        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
        assert_eq!(rejected.shape(), ResponseShape::Fragment);
        assert_ne!(rejected.field().value(), "anything");
    }
}
