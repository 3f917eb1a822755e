//! # Response Shape Classification
//!
//! Decides from request headers how a client expects a failure to be
//! delivered. The decision is a pure function over headers and yields one of a
//! closed set of shapes.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap,
        header::{ACCEPT, CONTENT_TYPE},
        request::Parts,
    },
};

/// Header sent by partial-update tooling (htmx) on every request it issues.
pub const HX_REQUEST_HEADER: &str = "HX-Request";

const X_REQUESTED_WITH: &str = "X-Requested-With";

/// How a response must be shaped for the requesting client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseShape {
    /// Full-page navigation: a complete HTML document.
    FullPage,
    /// Partial-update interaction: an HTML fragment replacing the form in place.
    Fragment,
    /// Programmatic client: a JSON payload.
    Api,
}

/// Classifies a request by its content-negotiation headers.
///
/// - `HX-Request: true` → [`ResponseShape::Fragment`]
/// - `Accept` preferring JSON over HTML, a JSON `Content-Type`, or
///   `X-Requested-With: XMLHttpRequest` → [`ResponseShape::Api`]
/// - anything else → [`ResponseShape::FullPage`]
///
/// # Example
/// ```rust
/// use axum::http::{HeaderMap, HeaderValue};
/// use wzs_guard::web::classify::{classify, ResponseShape};
///
/// let mut headers = HeaderMap::new();
/// assert_eq!(classify(&headers), ResponseShape::FullPage);
///
/// headers.insert("hx-request", HeaderValue::from_static("true"));
/// assert_eq!(classify(&headers), ResponseShape::Fragment);
/// ```
pub fn classify(headers: &HeaderMap) -> ResponseShape {
    if header_str(headers, HX_REQUEST_HEADER).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return ResponseShape::Fragment;
    }

    if accepts_json(headers)
        || header_str(headers, CONTENT_TYPE.as_str())
            .is_some_and(|v| v.trim().to_ascii_lowercase().starts_with("application/json"))
        || header_str(headers, X_REQUESTED_WITH)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("XMLHttpRequest"))
    {
        return ResponseShape::Api;
    }

    ResponseShape::FullPage
}

fn accepts_json(headers: &HeaderMap) -> bool {
    let Some(accept) = header_str(headers, ACCEPT.as_str()) else {
        return false;
    };
    let accept = accept.to_ascii_lowercase();

    accept.contains("application/json") && !accept.contains("text/html")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl<S> FromRequestParts<S> for ResponseShape
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        Ok(classify(&parts.headers))
    }
}
